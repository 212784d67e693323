#![allow(missing_docs)]

pub(crate) mod form;
pub(crate) mod html;
pub(crate) mod http;
pub(crate) mod source;

use serde_json::Value;

use crate::Record;

pub(crate) use form::assert_hx_endpoint;
pub(crate) use html::{assert_valid_html, parse_html_document, parse_html_fragment};
pub(crate) use http::{assert_content_type, assert_status_ok, get_header};
pub(crate) use source::FakeSource;

/// Build a [Record] from a JSON object literal.
#[track_caller]
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(fields) => Record::from(fields),
        other => panic!("want a JSON object for a record, got {other}"),
    }
}
