use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{debug, error};

use super::types::{SearchMode, SearchResponse, SearchWindow, TagValuesResponse, TraceResponse};
use super::TraceBackend;
use crate::config::ConnectionConfig;
use crate::error::{AppResult, TempoError, TempoResult};

/// Client for the Tempo HTTP API
#[derive(Clone)]
pub struct TempoClient {
    client: Client,
    connection: ConnectionConfig,
}

impl TempoClient {
    /// Create a new Tempo client
    pub fn new(connection: &ConnectionConfig) -> AppResult<Self> {
        let client = connection.http_client()?;
        let mut connection = connection.clone();
        connection.url = connection.url.trim_end_matches('/').to_string();

        Ok(Self { client, connection })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.connection.url
    }

    /// GET `path` and decode the body, mapping every "nothing usable"
    /// outcome to a [`TempoError`].
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> TempoResult<T> {
        let url = format!("{}{}", self.connection.url, path);
        let start = Instant::now();

        let response = self
            .connection
            .authorize(self.client.get(&url))
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!(url = %path, error = %e, "Connection to tempo failed");
                TempoError::Transport(e)
            })?;

        let status = response.status();
        debug!(
            url = %path,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis(),
            "Tempo request completed"
        );

        if status != StatusCode::OK {
            return Err(TempoError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            error!(url = %path, error = %e, "Reading tempo response failed");
            TempoError::Transport(e)
        })?;

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TempoError::InvalidResponse {
                path: path.to_string(),
                message: format!("Failed to parse response: {}", e),
            })?;

        if is_falsy(&value) {
            return Err(TempoError::Empty {
                path: path.to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| TempoError::InvalidResponse {
            path: path.to_string(),
            message: format!("Unexpected response shape: {}", e),
        })
    }
}

#[async_trait]
impl TraceBackend for TempoClient {
    async fn tag_values(&self, tag: &str) -> TempoResult<TagValuesResponse> {
        self.get_json(&format!("/search/tag/{}/values", tag), &[])
            .await
    }

    async fn search(
        &self,
        tag: &str,
        value: &str,
        window: SearchWindow,
    ) -> TempoResult<SearchResponse> {
        let query = [
            ("tags", tag_query(tag, value)),
            ("start", window.start.to_string()),
            ("end", window.end.to_string()),
        ];
        self.get_json("/search", &query).await
    }

    async fn trace(&self, trace_id: &str, mode: SearchMode) -> TempoResult<TraceResponse> {
        let query = [("mode", mode.as_str().to_string())];
        self.get_json(&format!("/traces/{}", trace_id), &query)
            .await
    }
}

/// Build the logfmt `tags` search expression, quoting values that need it.
fn tag_query(tag: &str, value: &str) -> String {
    if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '"' || c == '=') {
        format!("{}=\"{}\"", tag, value.replace('"', "\\\""))
    } else {
        format!("{}={}", tag, value)
    }
}

/// Mirror of "no data" for JSON: null, false, zero, and empty containers.
fn is_falsy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        serde_json::Value::Array(a) => a.is_empty(),
        serde_json::Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let connection = ConnectionConfig::new("http://tempo:3200/");
        let client = TempoClient::new(&connection).unwrap();
        assert_eq!(client.base_url(), "http://tempo:3200");
    }

    #[test]
    fn test_client_rejects_invalid_header() {
        let connection = ConnectionConfig::new("http://tempo:3200").with_header("bad header", "x");
        assert!(TempoClient::new(&connection).is_err());
    }

    #[test]
    fn test_tag_query_plain_value() {
        assert_eq!(
            tag_query("service.name", "cortex-ingester"),
            "service.name=cortex-ingester"
        );
    }

    #[test]
    fn test_tag_query_quotes_value_with_spaces() {
        assert_eq!(tag_query("http.route", "GET /api"), "http.route=\"GET /api\"");
        assert_eq!(tag_query("msg", "say \"hi\""), "msg=\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_is_falsy() {
        assert!(is_falsy(&json!(null)));
        assert!(is_falsy(&json!({})));
        assert!(is_falsy(&json!([])));
        assert!(is_falsy(&json!("")));
        assert!(is_falsy(&json!(0)));
        assert!(is_falsy(&json!(false)));
        assert!(!is_falsy(&json!({"tagValues": []})));
        assert!(!is_falsy(&json!(1)));
    }
}
