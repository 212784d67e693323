//! Search and tag filtering of a panel's cached records.

use std::collections::BTreeSet;

use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    PanelKind, Record,
    format::format_warehouse_display,
    panel::TagDimension,
    refresh::ViewerId,
};

/// The tag value that stands for "no tag filter".
pub const ALL_TAG: &str = "all";

/// The journal sources that can be toggled.
const JOURNAL_SOURCES: [&str; 2] = ["Deposit", "Journal"];

/// The filter state sent with a panel list request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PanelQuery {
    /// The text typed into the panel's search box.
    #[serde(default)]
    pub search: String,
    /// The checked tag toggles.
    #[serde(default)]
    pub tag: Vec<String>,
    /// The page asking, as registered when it was loaded.
    #[serde(default)]
    pub viewer: Option<ViewerId>,
}

/// The normalised filter for one panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    search: String,
    tags: Vec<String>,
    dimension: Option<TagDimension>,
}

impl FilterCriteria {
    /// Build the criteria for `panel` from the request's query.
    ///
    /// Search text and tags are lower-cased. Empty tags and the "all" tag are
    /// dropped, as are all tags for panels without a tag filter.
    pub fn for_panel(panel: PanelKind, query: &PanelQuery) -> Self {
        let dimension = panel.tag_dimension();
        let tags = match dimension {
            Some(_) => query
                .tag
                .iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty() && tag != ALL_TAG)
                .collect(),
            None => Vec::new(),
        };

        Self {
            search: query.search.to_lowercase(),
            tags,
            dimension,
        }
    }

    /// Whether `tag` is one of the active tags.
    pub fn is_active(&self, tag: &str) -> bool {
        self.tags.iter().any(|active| active == tag)
    }

    /// Whether no tag is active.
    pub fn has_no_tags(&self) -> bool {
        self.tags.is_empty()
    }

    /// Whether `record` passes the search text and tag filters.
    pub fn matches(&self, record: &Record) -> bool {
        self.matches_search(record) && self.matches_tags(record)
    }

    fn matches_search(&self, record: &Record) -> bool {
        self.search.is_empty() || record.search_name().to_lowercase().contains(&self.search)
    }

    fn matches_tags(&self, record: &Record) -> bool {
        if self.tags.is_empty() {
            return true;
        }

        match self.dimension {
            Some(TagDimension::Warehouse) => {
                let raw = record.relation("warehouse_id").name().unwrap_or_default();
                // Tag options are built from the display label, which may not
                // be a substring of the raw name.
                let warehouse = raw.to_lowercase();
                let label = format_warehouse_display(raw).to_lowercase();

                self.tags
                    .iter()
                    .any(|tag| warehouse.contains(tag.as_str()) || label.contains(tag.as_str()))
            }
            Some(TagDimension::Source) => {
                let source = record.text("source").unwrap_or_default().to_lowercase();

                self.tags.iter().any(|tag| *tag == source)
            }
            None => true,
        }
    }
}

/// The records that pass `criteria`, in their original order.
pub fn filter_records<'a>(records: &'a [Record], criteria: &FilterCriteria) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| criteria.matches(record))
        .collect()
}

/// The item count text, e.g. "12 items" or "12 of 3 items" when filtered.
pub fn count_text(total: usize, visible: usize) -> String {
    if total == visible {
        format!("{total} items")
    } else {
        format!("{total} of {visible} items")
    }
}

/// The item count shown next to a panel's title.
///
/// Set `out_of_band` when the label is sent alongside a list fragment.
pub fn count_label(panel: PanelKind, total: usize, visible: usize, out_of_band: bool) -> Markup {
    html! {
        span
            id=(panel.count_id())
            class="panel-count"
            title=(count_text(total, visible))
            hx-swap-oob=[out_of_band.then_some("true")]
        {
            (total)
            @if total != visible {
                " " span class="count-unit" { "of" } " " (visible)
            }
            " " span class="count-unit" { "items" }
        }
    }
}

/// One toggle in a panel's tag filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOption {
    /// The value sent in the query string.
    pub value: String,
    /// The text shown on the toggle.
    pub label: String,
    /// Whether the toggle is checked.
    pub active: bool,
}

/// The tag toggles for `panel`, or nothing if the panel has no tag filter.
///
/// Warehouse tags are the distinct warehouse labels of the cached records.
/// The first option is always "All", checked when no other tag is.
pub fn tag_options(
    panel: PanelKind,
    records: &[Record],
    criteria: &FilterCriteria,
) -> Vec<TagOption> {
    let labels: Vec<String> = match panel.tag_dimension() {
        None => return Vec::new(),
        Some(TagDimension::Source) => JOURNAL_SOURCES.map(str::to_owned).to_vec(),
        Some(TagDimension::Warehouse) => records
            .iter()
            .filter_map(|record| record.relation("warehouse_id").name())
            .map(format_warehouse_display)
            .filter(|label| !label.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let all = TagOption {
        value: ALL_TAG.to_owned(),
        label: "All".to_owned(),
        active: criteria.has_no_tags(),
    };

    std::iter::once(all)
        .chain(labels.into_iter().map(|label| {
            let value = label.to_lowercase();

            TagOption {
                active: criteria.is_active(&value),
                value,
                label,
            }
        }))
        .collect()
}

/// The tag toggles of a panel.
pub fn tag_tabs_view(panel: PanelKind, options: &[TagOption], out_of_band: bool) -> Markup {
    html! {
        div
            id=(panel.tabs_id())
            class="panel-tabs"
            hx-swap-oob=[out_of_band.then_some("true")]
        {
            @for option in options {
                label class={ "tab-btn" @if option.active { " active" } }
                {
                    input
                        type="checkbox"
                        name="tag"
                        value=(option.value)
                        checked[option.active];

                    (option.label)
                }
            }
        }
    }
}
