//! Odoo Dashboard is a wall-display dashboard for an Odoo back office.
//!
//! It polls six list endpoints (incomplete orders, unposted journals,
//! pending quotations, new customers, balance overshoots and unreconciled
//! bank lines), keeps the latest records in memory and serves them as HTML
//! cards grouped by date, with search and tag filters applied on the server.
//!
//! This library provides a REST API that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::response::{IntoResponse, Response};
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod config;
mod dashboard;
mod endpoints;
mod format;
mod html;
mod logging;
mod not_found;
mod panel;
mod record;
mod refresh;
mod routing;
mod timezone;
mod upstream;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use config::{DEFAULT_REFRESH_INTERVAL, DashboardConfig};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use panel::PanelKind;
pub use record::Record;
pub use refresh::{PanelStore, RefreshController, ViewerId, Visibility};
pub use routing::build_router;
pub use upstream::{RecordSource, UpstreamClient};

use crate::{html::error_view, not_found::get_404_not_found_response};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request to an upstream endpoint could not be completed, e.g. the
    /// connection was refused.
    #[error("could not fetch {url}: {reason}")]
    UpstreamRequest {
        /// The URL that was requested.
        url: String,
        /// The underlying error message.
        reason: String,
    },

    /// An upstream endpoint responded with a non-success status code.
    #[error("{url} responded with status {status}")]
    UpstreamStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code of the response.
        status: u16,
    },

    /// An upstream endpoint returned something other than a list of records.
    #[error("could not read records from {url}: {reason}")]
    MalformedPayload {
        /// The URL that was requested.
        url: String,
        /// Why the payload was rejected.
        reason: String,
    },

    /// The HTTP client for the upstream endpoints could not be created.
    #[error("could not create the HTTP client: {0}")]
    HttpClient(String),

    /// The requested panel does not exist.
    #[error("there is no panel called \"{0}\"")]
    UnknownPanel(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// A configuration value was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not acquire the lock on the cached panel records.
    #[error("could not acquire the panel store lock")]
    StoreLockError,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::UnknownPanel(_) => get_404_not_found_response(),
            Error::InvalidTimezoneError(timezone) => {
                tracing::error!("Invalid timezone {timezone}");
                render_internal_server_error(
                    "Invalid Timezone Settings",
                    &format!(
                        "Could not get local timezone \"{timezone}\". Check your server settings and \
                        ensure the timezone has been set to valid, canonical timezone string"
                    ),
                )
            }
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                render_internal_server_error(
                    "Sorry, something went wrong.",
                    "Try again later or check the server logs",
                )
            }
        }
    }
}

fn render_internal_server_error(description: &str, fix: &str) -> Response {
    (
        axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        error_view("Internal Server Error", "500", description, fix),
    )
        .into_response()
}
