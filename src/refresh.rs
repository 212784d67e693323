//! Keeps the cached panel records up to date.
//!
//! The [RefreshController] owns a single polling task that refetches every
//! panel on an interval, and the [PanelStore] holds the latest records for
//! each panel. Each fetch takes a sequence number when it is issued and its
//! response is only stored if nothing newer has been stored already, so a
//! slow response can never overwrite a fresher one.
//!
//! Every loaded dashboard page registers as a viewer and reports its own
//! visibility. Polling pauses only when every known viewer is hidden.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use serde::Deserialize;
use ::time::OffsetDateTime;
use tokio::{
    task::{JoinHandle, JoinSet},
    time::{self, MissedTickBehavior},
};

use crate::{Error, PanelKind, Record, upstream::RecordSource};

/// Whether the dashboard is currently being looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// The page is in the foreground.
    Visible,
    /// The page is hidden, e.g. in a background tab.
    Hidden,
}

/// The cached records of one panel at some point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelSnapshot {
    /// Every record from the last successful fetch, in upstream order.
    pub records: Arc<Vec<Record>>,
    /// When the records were stored, `None` if the panel has never been fetched.
    pub refreshed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct PanelSlot {
    snapshot: PanelSnapshot,
    issued: u64,
    applied: u64,
}

/// The latest records for every panel.
#[derive(Debug, Clone, Default)]
pub struct PanelStore {
    slots: Arc<RwLock<HashMap<PanelKind, PanelSlot>>>,
}

impl PanelStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the sequence number for a new fetch of `panel`.
    ///
    /// # Errors
    /// Returns [Error::StoreLockError] if the lock is poisoned.
    pub fn begin_request(&self, panel: PanelKind) -> Result<u64, Error> {
        let mut slots = self.slots.write().map_err(|_| Error::StoreLockError)?;
        let slot = slots.entry(panel).or_default();
        slot.issued += 1;

        Ok(slot.issued)
    }

    /// Store the response to fetch number `sequence` of `panel`.
    ///
    /// Returns `false` and leaves the store untouched if a response to a
    /// later fetch has already been stored.
    ///
    /// # Errors
    /// Returns [Error::StoreLockError] if the lock is poisoned.
    pub fn apply(
        &self,
        panel: PanelKind,
        sequence: u64,
        records: Vec<Record>,
        refreshed_at: OffsetDateTime,
    ) -> Result<bool, Error> {
        let mut slots = self.slots.write().map_err(|_| Error::StoreLockError)?;
        let slot = slots.entry(panel).or_default();

        if sequence <= slot.applied {
            return Ok(false);
        }

        slot.applied = sequence;
        slot.snapshot = PanelSnapshot {
            records: Arc::new(records),
            refreshed_at: Some(refreshed_at),
        };

        Ok(true)
    }

    /// The records currently cached for `panel`.
    ///
    /// # Errors
    /// Returns [Error::StoreLockError] if the lock is poisoned.
    pub fn snapshot(&self, panel: PanelKind) -> Result<PanelSnapshot, Error> {
        let slots = self.slots.read().map_err(|_| Error::StoreLockError)?;

        Ok(slots
            .get(&panel)
            .map(|slot| slot.snapshot.clone())
            .unwrap_or_default())
    }
}

/// How a refresh of a single panel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Applied,
    Stale,
    Failed,
}

/// Counts of how each panel's refresh ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Panels whose records were replaced.
    pub applied: usize,
    /// Panels whose response was older than the stored one.
    pub stale: usize,
    /// Panels that could not be fetched.
    pub failed: usize,
}

/// Identifies one loaded dashboard page.
pub type ViewerId = u64;

/// A hidden viewer that has not reported for this long is forgotten.
pub const HIDDEN_VIEWER_TTL: Duration = Duration::from_secs(60 * 60);

/// The shortest time a visible viewer is kept without polling.
pub const MIN_VISIBLE_VIEWER_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Viewer {
    visibility: Visibility,
    last_seen: Instant,
}

/// The pages currently showing the dashboard and whether each is visible.
///
/// Visible pages poll their panel lists, so a visible viewer that stops
/// being seen is assumed closed. With no known viewers the dashboard counts
/// as visible.
#[derive(Debug)]
struct Viewers {
    entries: HashMap<ViewerId, Viewer>,
    visible_ttl: Duration,
}

impl Viewers {
    fn new(visible_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            visible_ttl,
        }
    }

    fn report(&mut self, id: ViewerId, visibility: Visibility, now: Instant) {
        self.entries.insert(
            id,
            Viewer {
                visibility,
                last_seen: now,
            },
        );
    }

    fn touch(&mut self, id: ViewerId, now: Instant) {
        let viewer = self.entries.entry(id).or_insert(Viewer {
            visibility: Visibility::Visible,
            last_seen: now,
        });
        viewer.last_seen = now;
    }

    fn prune(&mut self, now: Instant) {
        let visible_ttl = self.visible_ttl;

        self.entries.retain(|_, viewer| {
            let ttl = match viewer.visibility {
                Visibility::Visible => visible_ttl,
                Visibility::Hidden => HIDDEN_VIEWER_TTL,
            };

            now.saturating_duration_since(viewer.last_seen) <= ttl
        });
    }

    fn any_visible(&mut self, now: Instant) -> bool {
        self.prune(now);

        self.entries.is_empty()
            || self
                .entries
                .values()
                .any(|viewer| viewer.visibility == Visibility::Visible)
    }
}

struct Refresher {
    source: Arc<dyn RecordSource>,
    store: PanelStore,
    viewers: Mutex<Viewers>,
}

impl Refresher {
    fn is_visible(&self) -> bool {
        self.viewers().any_visible(Instant::now())
    }

    fn viewers(&self) -> MutexGuard<'_, Viewers> {
        self.viewers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `update` to the viewers and refresh every panel if that made
    /// the dashboard visible again. Returns whether a refresh was done.
    async fn update_viewers(self: &Arc<Self>, update: impl FnOnce(&mut Viewers, Instant)) -> bool {
        let became_visible = {
            let mut viewers = self.viewers();
            let now = Instant::now();
            let was_visible = viewers.any_visible(now);
            update(&mut viewers, now);

            !was_visible && viewers.any_visible(now)
        };

        if became_visible {
            tracing::debug!("Dashboard visible again, refreshing now");
            self.refresh_all().await;
        }

        became_visible
    }

    async fn refresh_all(self: &Arc<Self>) -> RefreshSummary {
        let mut tasks = JoinSet::new();

        for panel in PanelKind::ALL {
            let refresher = Arc::clone(self);
            tasks.spawn(async move { refresher.refresh_panel(panel).await });
        }

        let mut summary = RefreshSummary::default();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RefreshOutcome::Applied) => summary.applied += 1,
                Ok(RefreshOutcome::Stale) => summary.stale += 1,
                Ok(RefreshOutcome::Failed) => summary.failed += 1,
                Err(error) => {
                    tracing::error!("Panel refresh task did not complete: {error}");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            "Refreshed panels: {} updated, {} stale, {} failed",
            summary.applied,
            summary.stale,
            summary.failed
        );

        summary
    }

    async fn refresh_panel(&self, panel: PanelKind) -> RefreshOutcome {
        let sequence = match self.store.begin_request(panel) {
            Ok(sequence) => sequence,
            Err(error) => {
                tracing::error!("Could not start refresh of the {panel} panel: {error}");
                return RefreshOutcome::Failed;
            }
        };

        let records = match self.source.fetch(panel).await {
            Ok(records) => records,
            Err(error) => {
                tracing::error!("Could not refresh the {panel} panel: {error}");
                return RefreshOutcome::Failed;
            }
        };

        let count = records.len();

        match self
            .store
            .apply(panel, sequence, records, OffsetDateTime::now_utc())
        {
            Ok(true) => {
                tracing::debug!("Stored {count} records for the {panel} panel (request #{sequence})");
                RefreshOutcome::Applied
            }
            Ok(false) => {
                tracing::warn!("Discarded stale response #{sequence} for the {panel} panel");
                RefreshOutcome::Stale
            }
            Err(error) => {
                tracing::error!("Could not store records for the {panel} panel: {error}");
                RefreshOutcome::Failed
            }
        }
    }
}

/// Polls the upstream endpoints and keeps the [PanelStore] current.
///
/// At most one polling task runs at a time. It is stopped by [RefreshController::stop]
/// or when the controller is dropped.
pub struct RefreshController {
    refresher: Arc<Refresher>,
    refresh_interval: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
    next_viewer: AtomicU64,
}

impl RefreshController {
    /// Create a controller that fetches from `source` into `store` every `refresh_interval`.
    ///
    /// The dashboard is assumed to be visible until a viewer reports otherwise.
    /// A visible viewer is forgotten after three refresh intervals without
    /// polling, or [MIN_VISIBLE_VIEWER_TTL] if that is longer.
    pub fn new(
        source: Arc<dyn RecordSource>,
        store: PanelStore,
        refresh_interval: Duration,
    ) -> Self {
        let visible_ttl = refresh_interval
            .saturating_mul(3)
            .max(MIN_VISIBLE_VIEWER_TTL);

        Self {
            refresher: Arc::new(Refresher {
                source,
                store,
                viewers: Mutex::new(Viewers::new(visible_ttl)),
            }),
            refresh_interval,
            timer: Mutex::new(None),
            next_viewer: AtomicU64::new(1),
        }
    }

    /// The store this controller writes to.
    pub fn store(&self) -> &PanelStore {
        &self.refresher.store
    }

    /// Fetch every panel now, concurrently.
    ///
    /// Failures are logged and leave the affected panel's records unchanged.
    pub async fn refresh_all(&self) -> RefreshSummary {
        self.refresher.refresh_all().await
    }

    /// Start polling: refresh once immediately, then on every interval tick
    /// while the dashboard is visible.
    ///
    /// Any previously started polling task is stopped first. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        let refresher = Arc::clone(&self.refresher);
        let period = self.refresh_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // The first tick completes immediately.
            interval.tick().await;
            refresher.refresh_all().await;

            loop {
                interval.tick().await;

                if refresher.is_visible() {
                    refresher.refresh_all().await;
                } else {
                    tracing::debug!("Dashboard hidden, skipping refresh");
                }
            }
        });

        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = timer.replace(handle) {
            previous.abort();
        }

        tracing::info!(
            "Refreshing panels every {} ms",
            self.refresh_interval.as_millis()
        );
    }

    /// Stop polling. Does nothing if polling was not started.
    pub fn stop(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            handle.abort();
            tracing::info!("Stopped refreshing panels");
        }
    }

    /// Whether the polling task is running.
    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Whether any viewer is looking at the dashboard.
    pub fn visibility(&self) -> Visibility {
        if self.refresher.is_visible() {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }

    /// Register a newly loaded, visible dashboard page.
    ///
    /// If every other viewer was hidden, every panel is refreshed before
    /// returning so the page starts with current data.
    pub async fn register_viewer(&self) -> ViewerId {
        let id = self.next_viewer.fetch_add(1, Ordering::SeqCst);

        self.refresher
            .update_viewers(|viewers, now| viewers.report(id, Visibility::Visible, now))
            .await;
        tracing::debug!("Registered dashboard viewer #{id}");

        id
    }

    /// Note that viewer `id` is still polling its panels.
    pub fn touch_viewer(&self, id: ViewerId) {
        self.refresher.viewers().touch(id, Instant::now());
    }

    /// Record whether viewer `id` is visible.
    ///
    /// If this makes the dashboard visible after every viewer was hidden,
    /// every panel is refreshed before returning. Returns whether a refresh
    /// was done.
    pub async fn set_visibility(&self, id: ViewerId, visibility: Visibility) -> bool {
        self.refresher
            .update_viewers(|viewers, now| viewers.report(id, visibility, now))
            .await
    }
}

impl Drop for RefreshController {
    fn drop(&mut self) {
        if let Some(handle) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        time::{Duration, Instant},
    };

    use serde_json::json;
    use time::macros::datetime;

    use crate::{
        Error, PanelKind,
        test_utils::{FakeSource, record},
    };

    use super::{
        HIDDEN_VIEWER_TTL, PanelStore, RefreshController, RefreshSummary, Viewers, Visibility,
    };

    fn new_controller(source: &Arc<FakeSource>, refresh_interval: Duration) -> RefreshController {
        RefreshController::new(source.clone(), PanelStore::new(), refresh_interval)
    }

    async fn wait_for_calls(source: &FakeSource, want: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while source.calls() < want {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("want {want} fetches, got {}", source.calls()));
    }

    #[test]
    fn stale_response_never_overwrites_newer_one() {
        let store = PanelStore::new();
        let first = store.begin_request(PanelKind::Invoice).unwrap();
        let second = store.begin_request(PanelKind::Invoice).unwrap();
        let newer = vec![record(json!({"id": 2}))];

        let applied_second = store
            .apply(
                PanelKind::Invoice,
                second,
                newer.clone(),
                datetime!(2026-10-15 09:00 UTC),
            )
            .unwrap();
        let applied_first = store
            .apply(
                PanelKind::Invoice,
                first,
                vec![record(json!({"id": 1}))],
                datetime!(2026-10-15 09:01 UTC),
            )
            .unwrap();

        assert!(applied_second);
        assert!(!applied_first);
        let snapshot = store.snapshot(PanelKind::Invoice).unwrap();
        assert_eq!(*snapshot.records, newer);
        assert_eq!(snapshot.refreshed_at, Some(datetime!(2026-10-15 09:00 UTC)));
    }

    #[test]
    fn sequence_numbers_are_per_panel() {
        let store = PanelStore::new();

        assert_eq!(store.begin_request(PanelKind::Invoice), Ok(1));
        assert_eq!(store.begin_request(PanelKind::Invoice), Ok(2));
        assert_eq!(store.begin_request(PanelKind::Journal), Ok(1));
    }

    #[test]
    fn unfetched_panel_is_empty() {
        let store = PanelStore::new();

        let snapshot = store.snapshot(PanelKind::Customer).unwrap();

        assert!(snapshot.records.is_empty());
        assert_eq!(snapshot.refreshed_at, None);
    }

    #[tokio::test]
    async fn refresh_all_fetches_every_panel() {
        let source = Arc::new(
            FakeSource::new()
                .with_records(PanelKind::Invoice, vec![record(json!({"id": 1}))])
                .with_records(PanelKind::Overshoot, vec![record(json!({"id": 9}))]),
        );
        let controller = new_controller(&source, Duration::from_secs(60));

        let summary = controller.refresh_all().await;

        assert_eq!(
            summary,
            RefreshSummary {
                applied: 6,
                stale: 0,
                failed: 0
            }
        );
        assert_eq!(source.calls(), 6);
        let invoices = controller.store().snapshot(PanelKind::Invoice).unwrap();
        assert_eq!(*invoices.records, vec![record(json!({"id": 1}))]);
        let overshoot = controller.store().snapshot(PanelKind::Overshoot).unwrap();
        assert_eq!(*overshoot.records, vec![record(json!({"id": 9}))]);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_records() {
        let source = Arc::new(
            FakeSource::new().with_records(PanelKind::Journal, vec![record(json!({"id": 3}))]),
        );
        let controller = new_controller(&source, Duration::from_secs(60));
        controller.refresh_all().await;
        let before = controller.store().snapshot(PanelKind::Journal).unwrap();

        source.set(
            PanelKind::Journal,
            Err(Error::UpstreamStatus {
                url: "http://localhost:5000/api/journals".to_owned(),
                status: 502,
            }),
        );
        let summary = controller.refresh_all().await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.applied, 5);
        let after = controller.store().snapshot(PanelKind::Journal).unwrap();
        assert_eq!(after, before);
    }

    #[test]
    fn no_viewers_counts_as_visible() {
        let mut viewers = Viewers::new(Duration::from_secs(30));

        assert!(viewers.any_visible(Instant::now()));
    }

    #[test]
    fn one_visible_viewer_is_enough() {
        let mut viewers = Viewers::new(Duration::from_secs(30));
        let now = Instant::now();

        viewers.report(1, Visibility::Hidden, now);
        assert!(!viewers.any_visible(now));

        viewers.report(2, Visibility::Visible, now);
        assert!(viewers.any_visible(now));
    }

    #[test]
    fn silent_visible_viewer_is_forgotten() {
        let mut viewers = Viewers::new(Duration::from_secs(30));
        let start = Instant::now();
        viewers.report(1, Visibility::Hidden, start);
        viewers.report(2, Visibility::Visible, start);

        assert!(viewers.any_visible(start + Duration::from_secs(30)));
        assert!(!viewers.any_visible(start + Duration::from_secs(31)));
    }

    #[test]
    fn polling_keeps_visible_viewer_alive() {
        let mut viewers = Viewers::new(Duration::from_secs(30));
        let start = Instant::now();
        viewers.report(1, Visibility::Hidden, start);
        viewers.report(2, Visibility::Visible, start);

        viewers.touch(2, start + Duration::from_secs(25));

        assert!(viewers.any_visible(start + Duration::from_secs(50)));
    }

    #[test]
    fn hidden_viewer_is_eventually_forgotten() {
        let mut viewers = Viewers::new(Duration::from_secs(30));
        let start = Instant::now();
        viewers.report(1, Visibility::Hidden, start);

        assert!(!viewers.any_visible(start + HIDDEN_VIEWER_TTL));
        assert!(viewers.any_visible(start + HIDDEN_VIEWER_TTL + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn becoming_visible_refreshes_immediately() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_secs(60));
        let viewer = controller.register_viewer().await;
        assert_eq!(source.calls(), 0);

        let refreshed_when_hidden = controller.set_visibility(viewer, Visibility::Hidden).await;
        assert!(!refreshed_when_hidden);
        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert_eq!(source.calls(), 0);

        let refreshed_when_shown = controller.set_visibility(viewer, Visibility::Visible).await;
        assert!(refreshed_when_shown);
        assert_eq!(source.calls(), 6);

        let refreshed_again = controller.set_visibility(viewer, Visibility::Visible).await;
        assert!(!refreshed_again);
        assert_eq!(source.calls(), 6);
    }

    #[tokio::test]
    async fn hidden_viewer_does_not_hide_other_viewers() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_secs(60));
        let first = controller.register_viewer().await;
        controller.register_viewer().await;

        controller.set_visibility(first, Visibility::Hidden).await;

        assert_eq!(controller.visibility(), Visibility::Visible);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn new_page_after_hidden_resumes_polling() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_millis(10));
        let closed_tab = controller.register_viewer().await;
        controller.set_visibility(closed_tab, Visibility::Hidden).await;
        controller.start();
        wait_for_calls(&source, 6).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.calls(), 6);

        controller.register_viewer().await;

        assert!(source.calls() >= 12, "got {} fetches", source.calls());
        assert_eq!(controller.visibility(), Visibility::Visible);
        wait_for_calls(&source, 24).await;
        controller.stop();
    }

    #[tokio::test]
    async fn start_refreshes_immediately() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_secs(3600));

        controller.start();
        wait_for_calls(&source, 6).await;

        assert!(controller.is_running());
        controller.stop();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn hidden_dashboard_skips_ticks() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_millis(10));
        let viewer = controller.register_viewer().await;
        controller.set_visibility(viewer, Visibility::Hidden).await;

        controller.start();
        wait_for_calls(&source, 6).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(source.calls(), 6);
        controller.stop();
    }

    #[tokio::test]
    async fn visible_dashboard_polls_on_interval() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_millis(10));

        controller.start();

        wait_for_calls(&source, 18).await;
        controller.stop();
    }

    #[tokio::test]
    async fn restarting_keeps_one_timer() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_secs(3600));

        controller.start();
        wait_for_calls(&source, 6).await;
        controller.start();
        wait_for_calls(&source, 12).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(controller.is_running());
        assert!(source.calls() <= 12, "got {} fetches", source.calls());
    }

    #[tokio::test]
    async fn dropping_controller_stops_polling() {
        let source = Arc::new(FakeSource::new());
        let controller = new_controller(&source, Duration::from_millis(10));
        controller.start();
        wait_for_calls(&source, 6).await;

        drop(controller);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls_after_drop = source.calls();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(source.calls(), calls_after_drop);
    }
}
