//! Dashboard HTTP handlers and view rendering.
//!
//! This module contains:
//! - The full dashboard page with all six panels
//! - The per-panel list fragment requested by htmx on search, tag toggles and polling
//! - The visibility report sent when the browser tab is hidden or shown

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{Form, Query};
use axum_htmx::HX_TRIGGER;
use maud::{Markup, html};
use serde::Deserialize;
use time::OffsetDateTime;

use crate::{
    AppState, Error, PanelKind, RefreshController, Visibility,
    dashboard::{
        cards::CardContext,
        filter::{
            FilterCriteria, PanelQuery, count_label, filter_records, tag_options, tag_tabs_view,
        },
        grouping::grouped_list_view,
    },
    endpoints::{self, format_endpoint},
    format::format_long_date,
    html::base,
    refresh::{PanelSnapshot, PanelStore, ViewerId},
    timezone::get_local_offset,
};

/// The htmx event that makes every panel reload its list.
pub const REFRESH_PANELS_EVENT: &str = "refresh-panels";

/// The state needed for displaying the dashboard.
#[derive(Clone)]
pub struct DashboardState {
    /// The latest records for each panel.
    pub store: PanelStore,
    /// The controller that keeps `store` current.
    pub controller: Arc<RefreshController>,
    /// The Odoo web client that cards link to.
    pub odoo_base_url: String,
    /// The local timezone as a canonical timezone name, e.g. "Africa/Addis_Ababa".
    pub local_timezone: String,
    /// How often the page reloads each panel's list.
    pub refresh_interval: Duration,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            controller: state.controller.clone(),
            odoo_base_url: state.config.odoo_url.clone(),
            local_timezone: state.config.local_timezone.clone(),
            refresh_interval: state.config.refresh_interval,
        }
    }
}

/// Query parameters for the dashboard page.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    /// The slug of the panel to show expanded.
    pub expanded: Option<String>,
}

/// Form data for the visibility report.
#[derive(Debug, Deserialize)]
pub struct VisibilityForm {
    /// The page reporting, as registered when it was loaded.
    pub viewer: ViewerId,
    /// Whether the page is visible or hidden.
    pub state: Visibility,
}

/// Display the dashboard with every panel's unfiltered list.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Response, Error> {
    let expanded = query
        .expanded
        .filter(|slug| !slug.is_empty())
        .map(|slug| slug.parse::<PanelKind>())
        .transpose()?;

    let local_offset = get_local_offset(&state.local_timezone).ok_or_else(|| {
        tracing::error!("Invalid timezone {}", state.local_timezone);
        Error::InvalidTimezoneError(state.local_timezone.clone())
    })?;
    let today = OffsetDateTime::now_utc().to_offset(local_offset).date();

    // A freshly loaded page is visible, which resumes polling if every other
    // page was hidden.
    let viewer = state.controller.register_viewer().await;

    let context = CardContext {
        odoo_base_url: &state.odoo_base_url,
    };
    let criteria_query = PanelQuery::default();
    let mut panels = Vec::with_capacity(PanelKind::ALL.len());

    for panel in PanelKind::ALL {
        let snapshot = state
            .store
            .snapshot(panel)
            .inspect_err(|error| tracing::error!("could not read {panel} panel: {error}"))?;
        let criteria = FilterCriteria::for_panel(panel, &criteria_query);

        panels.push(panel_view(
            panel,
            &snapshot,
            &criteria,
            PanelViewOptions {
                expanded: expanded == Some(panel),
                poll_interval: state.refresh_interval,
                viewer,
            },
            &context,
        ));
    }

    Ok(dashboard_view(&format_long_date(today), viewer, &panels).into_response())
}

/// Render a panel's filtered list, with its count label and tag toggles
/// swapped out-of-band.
pub async fn get_panel_list(
    State(state): State<DashboardState>,
    Path(slug): Path<String>,
    Query(query): Query<PanelQuery>,
) -> Result<Response, Error> {
    let panel: PanelKind = slug.parse()?;
    if let Some(viewer) = query.viewer {
        state.controller.touch_viewer(viewer);
    }

    let snapshot = state
        .store
        .snapshot(panel)
        .inspect_err(|error| tracing::error!("could not read {panel} panel: {error}"))?;
    let criteria = FilterCriteria::for_panel(panel, &query);
    let context = CardContext {
        odoo_base_url: &state.odoo_base_url,
    };

    let visible = filter_records(&snapshot.records, &criteria);
    let options = tag_options(panel, &snapshot.records, &criteria);

    Ok(html! {
        (grouped_list_view(panel, &visible, &context))
        (count_label(panel, snapshot.records.len(), visible.len(), true))
        @if !options.is_empty() {
            (tag_tabs_view(panel, &options, true))
        }
    }
    .into_response())
}

/// Record whether the dashboard is visible and tell the page to reload its panels.
///
/// A hidden page becoming visible refreshes every panel from upstream before
/// responding, so the reload shows current data.
pub async fn post_visibility(
    State(state): State<DashboardState>,
    Form(form): Form<VisibilityForm>,
) -> Response {
    let refreshed = state
        .controller
        .set_visibility(form.viewer, form.state)
        .await;
    tracing::debug!(
        "Viewer #{} reported {:?}, refreshed: {refreshed}",
        form.viewer,
        form.state
    );

    (
        StatusCode::NO_CONTENT,
        [(HX_TRIGGER, REFRESH_PANELS_EVENT)],
    )
        .into_response()
}

#[derive(Debug, Clone, Copy)]
struct PanelViewOptions {
    expanded: bool,
    poll_interval: Duration,
    viewer: ViewerId,
}

fn panel_view(
    panel: PanelKind,
    snapshot: &PanelSnapshot,
    criteria: &FilterCriteria,
    options: PanelViewOptions,
    context: &CardContext<'_>,
) -> Markup {
    let visible = filter_records(&snapshot.records, criteria);
    let tags = tag_options(panel, &snapshot.records, criteria);
    let list_endpoint = format_endpoint(endpoints::PANEL_LIST, panel.slug());
    let list_target = format!("#{}", panel.container_id());
    let trigger = format!(
        "input[target.matches('.search-input')] delay:300ms, change, \
        every {}s [!document.hidden], {REFRESH_PANELS_EVENT} from:body",
        options.poll_interval.as_secs().max(1)
    );
    let expand_link = format!("{}?expanded={}", endpoints::DASHBOARD_VIEW, panel.slug());

    html! {
        section
            id=(panel.panel_id())
            class={ "panel" @if options.expanded { " expanded" } }
        {
            form
                class="panel-header"
                hx-get=(list_endpoint)
                hx-target=(list_target)
                hx-swap="innerHTML"
                hx-trigger=(trigger)
                onsubmit="return false;"
            {
                h2 class="panel-title"
                {
                    (panel.title()) " "
                    (count_label(panel, snapshot.records.len(), visible.len(), false))
                }

                input type="hidden" name="viewer" value=(options.viewer);

                input
                    type="search"
                    name="search"
                    class="search-input"
                    placeholder="Search..."
                    autocomplete="off";

                @if !tags.is_empty() {
                    details class="filter-box"
                    {
                        summary { "Filter" }
                        (tag_tabs_view(panel, &tags, false))
                    }
                }

                @if options.expanded {
                    a class="close-trigger" href=(endpoints::DASHBOARD_VIEW) { "Close" }
                } @else {
                    a class="expand-trigger" href=(expand_link) { "Expand" }
                }
            }

            div id=(panel.container_id()) class="panel-content"
            {
                (grouped_list_view(panel, &visible, context))
            }
        }
    }
}

fn dashboard_view(today: &str, viewer: ViewerId, panels: &[Markup]) -> Markup {
    let report_values = format!(
        "js:{{viewer: {viewer}, state: document.visibilityState === 'hidden' ? 'hidden' : 'visible'}}"
    );

    let content = html! {
        header class="dashboard-header"
        {
            h1 { "Odoo Dashboard" }
            span id="current-date-display" { (today) }
        }

        main class="dashboard-grid"
        {
            @for panel in panels {
                (panel)
            }
        }

        // Reports tab visibility so polling pauses while nobody is looking.
        div
            id="visibility-reporter"
            hx-post=(endpoints::VISIBILITY)
            hx-trigger="visibilitychange from:document"
            hx-vals=(report_values)
            hx-swap="none"
        {}
    };

    base("Dashboard", &content)
}
