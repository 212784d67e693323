use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use crate::{
    Error, PanelKind, Record,
    upstream::{FetchFuture, RecordSource},
};

/// An in-memory [RecordSource] that counts how often it is fetched from.
///
/// Panels without a configured response return no records.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    responses: Mutex<HashMap<PanelKind, Result<Vec<Record>, Error>>>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_records(self, panel: PanelKind, records: Vec<Record>) -> Self {
        self.set(panel, Ok(records));
        self
    }

    pub(crate) fn set(&self, panel: PanelKind, response: Result<Vec<Record>, Error>) {
        self.responses.lock().unwrap().insert(panel, response);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecordSource for FakeSource {
    fn fetch(&self, panel: PanelKind) -> FetchFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&panel)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()));

        Box::pin(async move { response })
    }
}
