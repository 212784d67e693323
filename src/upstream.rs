//! Fetching panel records from the upstream JSON endpoints.

use std::{future::Future, pin::Pin};

use axum::http::header::CACHE_CONTROL;
use serde_json::Value;
use time::OffsetDateTime;

use crate::{Error, PanelKind, Record};

/// The future returned by [RecordSource::fetch].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Record>, Error>> + Send + 'a>>;

/// Somewhere the records for a panel can be fetched from.
pub trait RecordSource: Send + Sync {
    /// Fetch the current records for `panel`.
    fn fetch(&self, panel: PanelKind) -> FetchFuture<'_>;
}

/// Fetches panel records over HTTP from the upstream API.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Create a client for the API served at `base_url`.
    ///
    /// # Errors
    /// Returns [Error::HttpClient] if the underlying HTTP client could not be built.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| Error::HttpClient(error.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// The URL of the endpoint for `panel`, without the cache buster.
    pub fn url_for(&self, panel: PanelKind) -> String {
        format!("{}{}", self.base_url, panel.endpoint())
    }

    async fn fetch_records(&self, panel: PanelKind) -> Result<Vec<Record>, Error> {
        let url = cache_busted_url(&self.url_for(panel), unix_millis())?;

        let response = self
            .client
            .get(&url)
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|error| Error::UpstreamRequest {
                url: url.clone(),
                reason: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus {
                url,
                status: status.as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| Error::MalformedPayload {
                url: url.clone(),
                reason: error.to_string(),
            })?;

        extract_records(payload, panel.response_key())
            .map_err(|reason| Error::MalformedPayload { url, reason })
    }
}

impl RecordSource for UpstreamClient {
    fn fetch(&self, panel: PanelKind) -> FetchFuture<'_> {
        Box::pin(self.fetch_records(panel))
    }
}

fn unix_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Append the `_=<millis>` cache-busting parameter to `url`.
fn cache_busted_url(url: &str, millis: i64) -> Result<String, Error> {
    let param = serde_urlencoded::to_string([("_", millis)]).map_err(|error| {
        Error::UpstreamRequest {
            url: url.to_owned(),
            reason: format!("could not encode cache buster: {error}"),
        }
    })?;
    let separator = if url.contains('?') { '&' } else { '?' };

    Ok(format!("{url}{separator}{param}"))
}

/// Pull the list of records out of an upstream payload.
///
/// With a `key` the list is read from that property of a top-level object,
/// otherwise the payload itself must be the list. Every element must be an
/// object.
fn extract_records(payload: Value, key: Option<&str>) -> Result<Vec<Record>, String> {
    let list = match (payload, key) {
        (Value::Object(mut object), Some(key)) => object
            .remove(key)
            .ok_or_else(|| format!("missing \"{key}\" property"))?,
        (_, Some(key)) => return Err(format!("want an object with a \"{key}\" property")),
        (payload, None) => payload,
    };

    let Value::Array(items) = list else {
        return Err("want an array of records".to_owned());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(Record::from(fields)),
            other => Err(format!("item {index} is not an object: {other}")),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        Json, Router,
        extract::RawQuery,
        http::{HeaderMap, StatusCode},
        routing::get,
    };
    use serde_json::{Value, json};

    use crate::{Error, PanelKind, test_utils::record};

    use super::{RecordSource, UpstreamClient, cache_busted_url, extract_records};

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Could not bind test listener");
        let address = listener.local_addr().expect("Could not get local address");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Test server stopped unexpectedly");
        });

        address
    }

    fn upstream_app() -> Router {
        Router::new()
            .route(
                "/api/invoices",
                get(|| async { Json(json!([{"id": 1, "name": "S00001"}])) }),
            )
            .route(
                "/api/quotations/pending",
                get(|| async { Json(json!({"data": [{"id": 2, "name": "S00002"}]})) }),
            )
            .route(
                "/api/journals",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/api/customers",
                get(|| async { Json(json!({"error": "odoo is down"})) }),
            )
            .route(
                "/api/overshoot",
                get(|RawQuery(query): RawQuery, headers: HeaderMap| async move {
                    let cache_control = headers
                        .get("cache-control")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or_default()
                        .to_owned();

                    Json(json!([{"query": query, "cache_control": cache_control}]))
                }),
            )
    }

    #[tokio::test]
    async fn fetches_top_level_array() {
        let address = serve(upstream_app()).await;
        let client = UpstreamClient::new(&format!("http://{address}/")).unwrap();

        let records = client.fetch(PanelKind::Invoice).await;

        assert_eq!(
            records,
            Ok(vec![record(json!({"id": 1, "name": "S00001"}))])
        );
    }

    #[tokio::test]
    async fn fetches_array_under_response_key() {
        let address = serve(upstream_app()).await;
        let client = UpstreamClient::new(&format!("http://{address}")).unwrap();

        let records = client.fetch(PanelKind::Quotation).await;

        assert_eq!(
            records,
            Ok(vec![record(json!({"id": 2, "name": "S00002"}))])
        );
    }

    #[tokio::test]
    async fn sends_cache_buster_and_no_store() {
        let address = serve(upstream_app()).await;
        let client = UpstreamClient::new(&format!("http://{address}")).unwrap();

        let records = client.fetch(PanelKind::Overshoot).await.unwrap();

        let echoed = &records[0];
        let query = echoed.text("query").expect("query was not sent");
        assert!(query.starts_with("_="), "got query {query:?}");
        assert!(query[2..].parse::<i64>().is_ok(), "got query {query:?}");
        assert_eq!(echoed.text("cache_control"), Some("no-store"));
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let address = serve(upstream_app()).await;
        let client = UpstreamClient::new(&format!("http://{address}")).unwrap();

        let result = client.fetch(PanelKind::Journal).await;

        assert!(
            matches!(result, Err(Error::UpstreamStatus { status: 500, .. })),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn object_payload_is_malformed() {
        let address = serve(upstream_app()).await;
        let client = UpstreamClient::new(&format!("http://{address}")).unwrap();

        let result = client.fetch(PanelKind::Customer).await;

        assert!(
            matches!(result, Err(Error::MalformedPayload { .. })),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn missing_route_is_a_status_error() {
        let address = serve(upstream_app()).await;
        let client = UpstreamClient::new(&format!("http://{address}")).unwrap();

        let result = client.fetch(PanelKind::Reconciliation).await;

        assert!(
            matches!(result, Err(Error::UpstreamStatus { status: 404, .. })),
            "got {result:?}"
        );
    }

    #[test]
    fn cache_buster_respects_existing_query() {
        assert_eq!(
            cache_busted_url("http://host/api/invoices", 42),
            Ok("http://host/api/invoices?_=42".to_owned())
        );
        assert_eq!(
            cache_busted_url("http://host/api/invoices?state=draft", 42),
            Ok("http://host/api/invoices?state=draft&_=42".to_owned())
        );
    }

    #[test]
    fn rejects_non_object_items() {
        let payload: Value = json!([{"id": 1}, 5]);

        let result = extract_records(payload, None);

        assert!(result.is_err());
    }

    #[test]
    fn rejects_unwrapped_array_when_key_expected() {
        let result = extract_records(json!([{"id": 1}]), Some("data"));

        assert!(result.is_err());
    }
}
