//! Default transport built on a blocking `reqwest` client.

use crate::error::DbHydroError;
use crate::rest_adapters::{QueryParams, RawResponse, RestAdapter};
use bon::bon;
use log::{debug, warn};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub fn default_user_agent() -> String {
    format!("dbhydro-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// Sends requests with `reqwest::blocking`.
///
/// # Examples
///
/// ```
/// use dbhydro::ReqwestAdapter;
/// use std::time::Duration;
///
/// let adapter = ReqwestAdapter::builder()
///     .timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestAdapter {
    client: Client,
}

#[bon]
impl ReqwestAdapter {
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_TIMEOUT)] timeout: Duration,
        #[builder(into, default = default_user_agent())] user_agent: String,
    ) -> Result<Self, DbHydroError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(DbHydroError::HttpClient)?;
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one configured with a proxy.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl RestAdapter for ReqwestAdapter {
    fn get(&self, url: &str, params: &QueryParams) -> RawResponse {
        debug!("GET {}", url);
        let pairs: Vec<(&str, &str)> = params.iter().collect();
        let response = match self.client.get(url).query(&pairs).send() {
            Ok(response) => response,
            Err(e) => {
                // The error text may embed the full URL, credentials included.
                let e = e.without_url();
                warn!("Request to {} failed: {}", url, e);
                return RawResponse::transport_failure(format!("Request failed: {}", e));
            }
        };

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        if !status.is_success() {
            warn!("HTTP error for {}: {}", url, status);
        }

        let data = match response.bytes() {
            Ok(body) => serde_json::from_slice(&body).unwrap_or(Value::Null),
            Err(e) => {
                warn!("Failed reading response body from {}: {}", url, e.without_url());
                Value::Null
            }
        };
        RawResponse::new(status.as_u16(), reason, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    fn json_response(
        status: u16,
        body: String,
    ) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
        tiny_http::Response::from_string(body)
            .with_status_code(tiny_http::StatusCode::from(status))
            .with_header(
                tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                    .unwrap(),
            )
    }

    /// Serves exactly one request and hands back the URL and User-Agent it saw.
    fn serve_once(
        status: u16,
        body: String,
    ) -> (String, thread::JoinHandle<(String, Option<String>)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = thread::spawn(move || {
            let request = server.recv().unwrap();
            let url = request.url().to_string();
            let agent = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("User-Agent"))
                .map(|h| h.value.to_string());
            request.respond(json_response(status, body)).unwrap();
            (url, agent)
        });
        (format!("http://127.0.0.1:{}/v1/ext/data/timeseries", port), handle)
    }

    #[test]
    fn test_get_sends_query_and_user_agent() {
        let (url, handle) = serve_once(200, json!({"timeSeriesResponse": {}}).to_string());
        let adapter = ReqwestAdapter::builder().build().unwrap();

        let mut params = QueryParams::new();
        params.insert("names", "S79-E,S80");
        params.insert("format", "json");
        let response = adapter.get(&url, &params);

        let (seen_url, agent) = handle.join().unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(response.message, "OK");
        assert_eq!(response.data, json!({"timeSeriesResponse": {}}));
        assert_eq!(seen_url, "/v1/ext/data/timeseries?names=S79-E%2CS80&format=json");
        assert_eq!(agent, Some(default_user_agent()));
    }

    #[test]
    fn test_http_error_with_non_json_body() {
        let (url, handle) = serve_once(404, "<html>not found</html>".to_string());
        let adapter = ReqwestAdapter::builder()
            .user_agent("custom-agent/1.0")
            .build()
            .unwrap();

        let response = adapter.get(&url, &QueryParams::new());
        let (_, agent) = handle.join().unwrap();

        assert_eq!(response.status_code, 404);
        assert_eq!(response.message, "Not Found");
        assert_eq!(response.data, Value::Null);
        assert_eq!(agent.as_deref(), Some("custom-agent/1.0"));
    }

    #[test]
    fn test_connection_failure_reports_status_zero() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
            server.server_addr().to_ip().unwrap().port()
        };
        let adapter = ReqwestAdapter::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        let response = adapter.get(&format!("http://127.0.0.1:{}/", port), &QueryParams::new());
        assert!(response.is_transport_failure());
        assert!(response.message.starts_with("Request failed: "));
        assert_eq!(response.data, Value::Null);
    }
}
