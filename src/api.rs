//! Blocking HTTP client for the agensight backend
//!
//! Thin wrapper over `reqwest::blocking`: one method per backend route, every
//! response checked for a 2xx status before its body is decoded. No retries;
//! each call either returns the decoded body or a [`StudioError`] that says
//! whether the request never arrived (`Transport`) or was refused (`Backend`).

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, StudioError};
use crate::model::{
    CommitRequest, ConfigDocument, ConfigVersion, SpanDetails, SyncRequest, Trace, TraceDetail,
    UpdateAgentRequest, VersionResult,
};

/// The configuration-versioning half of the backend
///
/// [`crate::versions::VersionWorkflow`] is written against this trait so it can
/// be driven by [`ApiClient`] or by an in-memory backend in tests.
pub trait ConfigBackend {
    /// `GET /api/config/versions`, unfiltered
    fn fetch_versions(&self) -> Result<Vec<ConfigVersion>>;
    /// `GET /api/config[?version=V]`
    fn fetch_config(&self, version: Option<&str>) -> Result<ConfigDocument>;
    /// `POST /api/config/commit`
    fn commit(&self, request: &CommitRequest) -> Result<VersionResult>;
    /// `POST /api/config/sync`
    fn sync(&self, request: &SyncRequest) -> Result<Value>;
    /// `POST /api/update_agent`
    fn update_agent(&self, request: &UpdateAgentRequest) -> Result<VersionResult>;
}

impl<B: ConfigBackend + ?Sized> ConfigBackend for Arc<B> {
    fn fetch_versions(&self) -> Result<Vec<ConfigVersion>> {
        (**self).fetch_versions()
    }
    fn fetch_config(&self, version: Option<&str>) -> Result<ConfigDocument> {
        (**self).fetch_config(version)
    }
    fn commit(&self, request: &CommitRequest) -> Result<VersionResult> {
        (**self).commit(request)
    }
    fn sync(&self, request: &SyncRequest) -> Result<Value> {
        (**self).sync(request)
    }
    fn update_agent(&self, request: &UpdateAgentRequest) -> Result<VersionResult> {
        (**self).update_agent(request)
    }
}

/// Undecoded backend response, used by the proxy server
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for the backend HTTP API
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// Create a client with the given request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StudioError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api.base_url.clone(),
            Duration::from_secs(config.api.timeout_secs.max(1)),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_get(&self, path: &str) -> Result<Response> {
        debug!(path, "GET");
        self.http
            .get(self.url(path))
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .map_err(|e| StudioError::Transport(e.to_string()))
    }

    fn send_post(&self, path: &str, body: String) -> Result<Response> {
        debug!(path, "POST");
        self.http
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .map_err(|e| StudioError::Transport(e.to_string()))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        decode(self.send_get(path)?)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_string(body)
            .map_err(|e| StudioError::validation(format!("unserializable request: {}", e)))?;
        decode(self.send_post(path, body)?)
    }

    // --- Raw forwarding ---

    /// GET without status checking; only transport failures are errors
    pub fn raw_get(&self, path_and_query: &str) -> Result<RawResponse> {
        raw(self.send_get(path_and_query)?)
    }

    /// POST a JSON body without status checking
    pub fn raw_post(&self, path: &str, body: &str) -> Result<RawResponse> {
        raw(self.send_post(path, body.to_string())?)
    }

    // --- Traces ---

    /// `GET /api/traces`
    pub fn list_traces(&self) -> Result<Vec<Trace>> {
        let values: Vec<Value> = self.get_json("/api/traces")?;
        Ok(values
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Trace>(v) {
                Ok(trace) => Some(trace),
                Err(e) => {
                    warn!(error = %e, "dropping malformed trace record");
                    None
                }
            })
            .collect())
    }

    /// `GET /api/traces/{id}`
    pub fn get_trace(&self, id: &str) -> Result<TraceDetail> {
        let value: Value = self.get_json(&trace_path(id))?;
        TraceDetail::from_value(value).map_err(|e| StudioError::malformed(200, e))
    }

    /// `GET /api/traces/span/{id}`
    pub fn get_span_details(&self, span_id: &str) -> Result<SpanDetails> {
        self.get_json(&span_path(span_id))
    }

    /// `POST /api/update_prompt`; `sync_to_main` defaults to false
    pub fn update_prompt(&self, mut payload: Value) -> Result<VersionResult> {
        if let Some(obj) = payload.as_object_mut() {
            obj.entry("sync_to_main").or_insert(Value::Bool(false));
        } else {
            return Err(StudioError::validation("prompt payload must be a JSON object"));
        }
        self.post_json("/api/update_prompt", &payload)
    }
}

impl ConfigBackend for ApiClient {
    fn fetch_versions(&self) -> Result<Vec<ConfigVersion>> {
        self.get_json("/api/config/versions")
    }

    fn fetch_config(&self, version: Option<&str>) -> Result<ConfigDocument> {
        let path = match version {
            Some(v) => {
                let query = serde_urlencoded::to_string([("version", v)])
                    .map_err(|e| StudioError::validation(e.to_string()))?;
                format!("/api/config?{}", query)
            }
            None => "/api/config".to_string(),
        };
        self.get_json(&path)
    }

    fn commit(&self, request: &CommitRequest) -> Result<VersionResult> {
        self.post_json("/api/config/commit", request)
    }

    fn sync(&self, request: &SyncRequest) -> Result<Value> {
        self.post_json("/api/config/sync", request)
    }

    fn update_agent(&self, request: &UpdateAgentRequest) -> Result<VersionResult> {
        self.post_json("/api/update_agent", request)
    }
}

/// Ids are a single path segment; `/`, `?` and `#` must not change the route
fn trace_path(id: &str) -> String {
    format!("/api/traces/{}", urlencoding::encode(id))
}

fn span_path(span_id: &str) -> String {
    format!("/api/traces/span/{}", urlencoding::encode(span_id))
}

fn raw(response: Response) -> Result<RawResponse> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .map_err(|e| StudioError::Transport(e.to_string()))?;
    Ok(RawResponse { status, body })
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let RawResponse { status, body } = raw(response)?;
    if !(200..300).contains(&status) {
        warn!(status, body = %body, "backend returned an error");
        return Err(StudioError::Backend { status, body });
    }
    serde_json::from_str(&body).map_err(|e| StudioError::malformed(status, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = ApiClient::new("http://127.0.0.1:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5000");
        assert_eq!(client.url("/api/traces"), "http://127.0.0.1:5000/api/traces");
    }

    #[test]
    fn test_raw_response_success_range() {
        let ok = RawResponse { status: 204, body: String::new() };
        let err = RawResponse { status: 403, body: String::new() };
        assert!(ok.is_success());
        assert!(!err.is_success());
    }

    #[test]
    fn test_update_prompt_rejects_non_object() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.update_prompt(Value::Null).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) is essentially never listening on loopback
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.fetch_versions().unwrap_err();
        assert!(err.is_transport(), "got {err:?}");
    }

    #[test]
    fn test_ids_are_encoded_as_one_segment() {
        assert_eq!(trace_path("42"), "/api/traces/42");
        assert_eq!(trace_path("a/b?c#d"), "/api/traces/a%2Fb%3Fc%23d");
        assert_eq!(span_path("span/../1"), "/api/traces/span/span%2F..%2F1");
    }
}
