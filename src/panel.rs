//! The six dashboard panels and the static facts about each one.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// One of the dashboard panels, each showing one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelKind {
    /// Sale orders that are missing an invoice, reference or payment.
    Invoice,
    /// Unposted bank deposits and draft journal entries.
    Journal,
    /// Pending quotations, filterable by warehouse.
    Quotation,
    /// Recently created customers.
    Customer,
    /// Customers whose orders exceed their available balance.
    Overshoot,
    /// Unreconciled bank statement lines.
    Reconciliation,
}

/// The tag filter a panel supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDimension {
    /// Match tags as substrings of the record's warehouse name.
    Warehouse,
    /// Match tags exactly against the record's source.
    Source,
}

/// How coarsely a panel groups its records by date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketGranularity {
    /// Group by the date part of the raw date string.
    Day,
    /// Group by the first seven characters (year-month) of the raw date string.
    MonthPrefix,
    /// Group by the year-month of the parsed date, "UNKNOWN" if there is none.
    ParsedMonth,
}

impl PanelKind {
    /// Every panel, in the order they are shown on the dashboard.
    pub const ALL: [PanelKind; 6] = [
        PanelKind::Invoice,
        PanelKind::Journal,
        PanelKind::Quotation,
        PanelKind::Customer,
        PanelKind::Overshoot,
        PanelKind::Reconciliation,
    ];

    /// The name used for this panel in URLs.
    pub fn slug(self) -> &'static str {
        match self {
            PanelKind::Invoice => "invoice",
            PanelKind::Journal => "journal",
            PanelKind::Quotation => "quotation",
            PanelKind::Customer => "customer",
            PanelKind::Overshoot => "overshoot",
            PanelKind::Reconciliation => "reconciliation",
        }
    }

    /// The heading shown above the panel.
    pub fn title(self) -> &'static str {
        match self {
            PanelKind::Invoice => "Incomplete Orders",
            PanelKind::Journal => "Unposted Journals",
            PanelKind::Quotation => "Active Quotations",
            PanelKind::Customer => "New Customers",
            PanelKind::Overshoot => "Balance Overshoot",
            PanelKind::Reconciliation => "Reconciliation",
        }
    }

    /// The upstream endpoint the panel's records are fetched from.
    pub fn endpoint(self) -> &'static str {
        match self {
            PanelKind::Invoice => "/api/invoices",
            PanelKind::Journal => "/api/journals",
            PanelKind::Quotation => "/api/quotations/pending",
            PanelKind::Customer => "/api/customers",
            PanelKind::Overshoot => "/api/overshoot",
            PanelKind::Reconciliation => "/api/reconciliation",
        }
    }

    /// The key the record array is nested under, if the endpoint wraps it.
    pub fn response_key(self) -> Option<&'static str> {
        match self {
            PanelKind::Quotation => Some("data"),
            _ => None,
        }
    }

    /// The id of the element holding the panel's rendered list.
    pub fn container_id(self) -> &'static str {
        match self {
            PanelKind::Invoice => "list-incomplete-invoice",
            PanelKind::Journal => "list-unposted-journal",
            PanelKind::Quotation => "list-active-quotation",
            PanelKind::Customer => "list-new-customers",
            PanelKind::Overshoot => "list-balance-overshoot",
            PanelKind::Reconciliation => "list-reconciliation",
        }
    }

    /// The id of the element showing the panel's item count.
    pub fn count_id(self) -> &'static str {
        match self {
            PanelKind::Invoice => "count-invoice",
            PanelKind::Journal => "count-journal",
            PanelKind::Quotation => "count-quotation",
            PanelKind::Customer => "count-new-customers",
            PanelKind::Overshoot => "count-overshoot",
            PanelKind::Reconciliation => "count-reconciliation",
        }
    }

    /// The id of the panel's section element.
    pub fn panel_id(self) -> String {
        format!("panel-{}", self.slug())
    }

    /// The id of the element holding the panel's tag toggles.
    pub fn tabs_id(self) -> String {
        format!("tabs-{}", self.slug())
    }

    /// The tag filter this panel supports, if any.
    pub fn tag_dimension(self) -> Option<TagDimension> {
        match self {
            PanelKind::Quotation => Some(TagDimension::Warehouse),
            PanelKind::Journal => Some(TagDimension::Source),
            _ => None,
        }
    }

    /// How the panel's records are grouped by date.
    pub fn bucket_granularity(self) -> BucketGranularity {
        match self {
            PanelKind::Invoice => BucketGranularity::MonthPrefix,
            PanelKind::Journal => BucketGranularity::ParsedMonth,
            _ => BucketGranularity::Day,
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for PanelKind {
    type Err = Error;

    fn from_str(slug: &str) -> Result<Self, Self::Err> {
        PanelKind::ALL
            .into_iter()
            .find(|panel| panel.slug() == slug)
            .ok_or_else(|| Error::UnknownPanel(slug.to_owned()))
    }
}
