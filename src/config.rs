//! Validated server configuration.

use std::time::Duration;

use crate::{Error, timezone::get_local_offset};

/// How often the panels are refreshed unless configured otherwise.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(10_000);

/// The settings the dashboard runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// The base URL of the API serving the six list endpoints.
    pub upstream_url: String,
    /// The base URL of the Odoo web client, used for links on cards.
    pub odoo_url: String,
    /// How often every panel is refetched.
    pub refresh_interval: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Africa/Addis_Ababa".
    pub local_timezone: String,
}

impl DashboardConfig {
    /// Create a validated configuration.
    ///
    /// Trailing slashes are removed from the URLs.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if a URL is empty or the refresh interval
    /// is zero, and [Error::InvalidTimezoneError] if `local_timezone` is not a
    /// canonical timezone name.
    pub fn new(
        upstream_url: &str,
        odoo_url: &str,
        refresh_interval: Duration,
        local_timezone: &str,
    ) -> Result<Self, Error> {
        let upstream_url = normalize_url("upstream URL", upstream_url)?;
        let odoo_url = normalize_url("Odoo URL", odoo_url)?;

        if refresh_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "the refresh interval must be greater than zero".to_owned(),
            ));
        }

        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        Ok(Self {
            upstream_url,
            odoo_url,
            refresh_interval,
            local_timezone: local_timezone.to_owned(),
        })
    }
}

fn normalize_url(name: &str, url: &str) -> Result<String, Error> {
    let url = url.trim().trim_end_matches('/');

    if url.is_empty() {
        return Err(Error::InvalidConfig(format!("the {name} must not be empty")));
    }

    Ok(url.to_owned())
}
