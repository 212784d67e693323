//! Grouping of a panel's records into contiguous date buckets.

use maud::{Markup, html};

use crate::{
    PanelKind, Record,
    dashboard::cards::{CardContext, render_card},
    format::{format_group_date, year_month_key},
    panel::BucketGranularity,
};

/// The fields a record's date is read from, in order of preference.
const DATE_FIELDS: [&str; 5] = [
    "date_invoice",
    "invoice_date",
    "date",
    "date_order",
    "create_date",
];

/// The key records are grouped under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketKey {
    /// A month ("YYYY-MM") or a day ("YYYY-MM-DD").
    Date(String),
    /// A journal entry without a usable date.
    Unknown,
    /// Any other record without a date.
    Other,
}

impl BucketKey {
    /// The text shown above the bucket, if any.
    pub fn header(&self) -> Option<String> {
        match self {
            BucketKey::Date(key) => format_group_date(key),
            BucketKey::Unknown => Some("UNKNOWN DATE".to_owned()),
            BucketKey::Other => None,
        }
    }
}

/// The raw date string of `record`.
pub fn date_field(record: &Record) -> Option<&str> {
    record.first_text(&DATE_FIELDS)
}

/// The bucket `record` belongs to on `panel`.
pub fn bucket_key(panel: PanelKind, record: &Record) -> BucketKey {
    let granularity = panel.bucket_granularity();

    let Some(raw) = date_field(record) else {
        return match granularity {
            BucketGranularity::ParsedMonth => BucketKey::Unknown,
            _ => BucketKey::Other,
        };
    };

    match granularity {
        BucketGranularity::MonthPrefix => BucketKey::Date(raw.chars().take(7).collect()),
        BucketGranularity::ParsedMonth => year_month_key(raw)
            .map(BucketKey::Date)
            .unwrap_or(BucketKey::Unknown),
        BucketGranularity::Day => {
            let day = raw.split(' ').next().unwrap_or(raw);
            BucketKey::Date(day.to_owned())
        }
    }
}

/// A run of adjacent records sharing a [BucketKey].
#[derive(Debug, PartialEq)]
pub struct DateBucket<'a> {
    /// The key shared by every record in the bucket.
    pub key: BucketKey,
    /// The records, in their original order.
    pub records: Vec<&'a Record>,
}

/// Split `records` into buckets of adjacent records with the same key.
///
/// Records are assumed to arrive sorted by date. A key that reappears after
/// a different one starts a new bucket.
pub fn group_records<'a>(panel: PanelKind, records: &[&'a Record]) -> Vec<DateBucket<'a>> {
    let mut buckets: Vec<DateBucket<'a>> = Vec::new();

    for &record in records {
        let key = bucket_key(panel, record);

        match buckets.last_mut() {
            Some(current) if current.key == key => current.records.push(record),
            _ => buckets.push(DateBucket {
                key,
                records: vec![record],
            }),
        }
    }

    buckets
}

/// The contents of a panel's list: the cards grouped under date headers.
pub fn grouped_list_view(
    panel: PanelKind,
    records: &[&Record],
    context: &CardContext<'_>,
) -> Markup {
    if records.is_empty() {
        return html! {
            div class="empty-list" { "No records found" }
        };
    }

    let buckets = group_records(panel, records);

    html! {
        @for bucket in &buckets {
            div class="date-group"
            {
                @if let Some(header) = bucket.key.header() {
                    div class="date-header" { (header) }
                }

                @for record in &bucket.records {
                    (render_card(panel, record, context))
                }
            }
        }
    }
}
