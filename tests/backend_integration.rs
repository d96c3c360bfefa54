//! Integration tests against an in-process backend
//!
//! A small tiny_http server stands in for the agensight backend. It keeps its
//! versions and configs in memory and records every request it sees, so the
//! tests can assert both on results and on how many calls were made.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use agensight::serve::{self, FALLBACK_HEADER};
use agensight::{AgentData, ApiClient, ConfigBackend, StudioError, VersionWorkflow};
use serde_json::{json, Value};
use tiny_http::{Header, Method, Response, Server};

// =============================================================================
// Mock backend
// =============================================================================

struct MockState {
    requests: Vec<String>,
    versions: Vec<Value>,
    configs: BTreeMap<String, Value>,
    main_config: Value,
    versions_status: u16,
}

impl MockState {
    fn new() -> Self {
        let base = json!({
            "agents": [{
                "name": "Planner",
                "prompt": "Plan the trip to {{city}}",
                "variables": ["city"],
                "modelParams": { "model": "gpt-4o", "temperature": 0.2, "top_p": 1, "max_tokens": 1000 }
            }],
            "connections": []
        });
        let mut configs = BTreeMap::new();
        configs.insert("1.0.0".to_string(), base.clone());
        Self {
            requests: Vec::new(),
            versions: vec![json!({
                "version": "1.0.0",
                "commit_message": "Initial",
                "timestamp": "2025-01-01T00:00:00Z",
                "is_current": true
            })],
            configs,
            main_config: base,
            versions_status: 200,
        }
    }

    fn next_version(&self) -> String {
        format!("1.0.{}", self.versions.len())
    }

    fn handle(&mut self, method: &Method, url: &str, body: &str) -> (u16, Value) {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        match (method, path) {
            (Method::Get, "/api/config/versions") => {
                if self.versions_status != 200 {
                    return (self.versions_status, json!({ "error": "forbidden" }));
                }
                (200, Value::Array(self.versions.clone()))
            }
            (Method::Get, "/api/config") => {
                let version = query.strip_prefix("version=");
                match version {
                    Some(v) => match self.configs.get(v) {
                        Some(doc) => (200, doc.clone()),
                        None => (404, json!({ "error": "Version not found" })),
                    },
                    None => (200, self.main_config.clone()),
                }
            }
            (Method::Post, "/api/config/commit") => {
                let data: Value = serde_json::from_str(body).unwrap();
                let source = data["source_version"].as_str().unwrap_or_default().to_string();
                let Some(doc) = self.configs.get(&source).cloned() else {
                    return (404, json!({ "error": "Source version not found" }));
                };
                let version = self.next_version();
                let sync = data["sync_to_main"] == json!(true);
                if sync {
                    self.main_config = doc.clone();
                    for v in &mut self.versions {
                        v["is_current"] = json!(false);
                    }
                }
                self.configs.insert(version.clone(), doc);
                self.versions.push(json!({
                    "version": version,
                    "commit_message": data["commit_message"],
                    "timestamp": "2025-01-02T00:00:00Z",
                    "is_current": sync
                }));
                (
                    200,
                    json!({ "version": version, "success": true, "synced_to_main": sync }),
                )
            }
            (Method::Post, "/api/config/sync") => {
                let data: Value = serde_json::from_str(body).unwrap();
                let version = data["version"].as_str().unwrap_or_default().to_string();
                let Some(doc) = self.configs.get(&version).cloned() else {
                    return (404, json!({ "error": "Version not found" }));
                };
                self.main_config = doc;
                for v in &mut self.versions {
                    let current = v["version"] == json!(version);
                    v["is_current"] = json!(current);
                }
                (200, json!({ "success": true }))
            }
            (Method::Post, "/api/update_agent") => {
                let data: Value = serde_json::from_str(body).unwrap();
                let version = data["version"].as_str().unwrap_or_default().to_string();
                let Some(doc) = self.configs.get_mut(&version) else {
                    return (404, json!({ "error": "Version not found" }));
                };
                let agent = data["agent"].clone();
                if let Some(agents) = doc["agents"].as_array_mut() {
                    for existing in agents.iter_mut() {
                        if existing["name"] == agent["name"] {
                            *existing = agent.clone();
                        }
                    }
                }
                (
                    200,
                    json!({ "version": version, "success": true, "synced_to_main": false }),
                )
            }
            (Method::Get, "/api/traces/garbled") => (200, json!("not a trace")),
            (Method::Get, p) if p.starts_with("/api/traces/") => {
                (404, json!({ "error": "Trace not found" }))
            }
            _ => (404, json!({ "error": "Not found" })),
        }
    }
}

struct MockBackend {
    server: Arc<Server>,
    state: Arc<Mutex<MockState>>,
    handle: Option<JoinHandle<()>>,
    url: String,
}

impl MockBackend {
    fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind mock backend"));
        let addr = server.server_addr().to_ip().expect("ip listener");
        let state = Arc::new(Mutex::new(MockState::new()));

        let handle = {
            let server = Arc::clone(&server);
            let state = Arc::clone(&state);
            thread::spawn(move || {
                for mut request in server.incoming_requests() {
                    let method = request.method().clone();
                    let url = request.url().to_string();
                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);

                    let (status, value) = {
                        let mut state = state.lock().unwrap();
                        state.requests.push(format!("{} {}", method, url));
                        state.handle(&method, &url, &body)
                    };
                    let header =
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                    let response = Response::from_string(value.to_string())
                        .with_status_code(status)
                        .with_header(header);
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            server,
            state,
            handle: Some(handle),
            url: format!("http://{}", addr),
        }
    }

    fn client(&self) -> ApiClient {
        ApiClient::new(self.url.clone(), Duration::from_secs(5)).unwrap()
    }

    fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    fn deny_versions(&self, status: u16) {
        self.state.lock().unwrap().versions_status = status;
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn edited_planner() -> AgentData {
    serde_json::from_value(json!({
        "name": "Planner",
        "prompt": "Plan a weekend in {{city}}",
        "variables": ["city"],
        "modelParams": { "model": "gpt-4o", "temperature": 0.7, "top_p": 1, "max_tokens": 1000 }
    }))
    .unwrap()
}

// =============================================================================
// Client and workflow
// =============================================================================

#[test]
fn test_validation_errors_never_touch_network() {
    let backend = MockBackend::start();
    let mut workflow = VersionWorkflow::new(backend.client());

    let err = workflow.commit("1.0.0", "   ", true).unwrap_err();
    assert_eq!(err.to_string(), "Please enter a commit message");
    let err = workflow.commit("", "Tune prompt", true).unwrap_err();
    assert_eq!(err.to_string(), "No version selected to commit from");
    let err = workflow.sync("").unwrap_err();
    assert_eq!(err.to_string(), "Missing required version parameter");
    let err = workflow.update_agent("", edited_planner()).unwrap_err();
    assert!(err.is_validation());

    assert_eq!(backend.request_count(), 0);
}

#[test]
fn test_denied_version_list_falls_back() {
    let backend = MockBackend::start();
    backend.deny_versions(403);
    let mut workflow = VersionWorkflow::new(backend.client());

    let listing = workflow.list_versions().clone();
    assert!(listing.fallback);
    let current = listing.current().expect("fallback has a current version");
    assert_eq!(current.version, "1.0.0");
    assert!(workflow.state().is_fallback());
}

#[test]
fn test_commit_without_sync_leaves_main_untouched() {
    let backend = MockBackend::start();
    let client = backend.client();
    let main_before = client.fetch_config(None).unwrap();

    let mut workflow = VersionWorkflow::new(backend.client());
    workflow.list_versions();
    let result = workflow
        .commit_and_reload("1.0.0", "Experiment", false)
        .unwrap();
    assert_eq!(result.version, "1.0.1");
    assert_eq!(result.synced_to_main, Some(false));

    let main_after = client.fetch_config(None).unwrap();
    assert_eq!(main_before, main_after);

    // Reloaded list shows the new version, newest first, and selects it
    let state = workflow.state();
    assert_eq!(state.versions()[0].version, "1.0.1");
    assert!(!state.versions()[0].is_current);
    assert_eq!(state.selected(), Some("1.0.1"));
    assert_eq!(state.config_version(), Some("1.0.1"));
}

#[test]
fn test_sync_promotes_and_relists() {
    let backend = MockBackend::start();
    let mut workflow = VersionWorkflow::new(backend.client());
    workflow.commit("1.0.0", "Second", false).unwrap();

    let before = backend.request_count();
    workflow.sync("1.0.1").unwrap();
    let requests = backend.requests();
    assert_eq!(requests[before], "POST /api/config/sync");
    assert_eq!(requests[before + 1], "GET /api/config/versions");

    let current = workflow.state().listing().current().unwrap();
    assert_eq!(current.version, "1.0.1");
}

#[test]
fn test_select_version_loads_config() {
    let backend = MockBackend::start();
    let mut workflow = VersionWorkflow::new(backend.client());
    workflow.list_versions();

    let doc = workflow.select_version("1.0.0").unwrap();
    assert_eq!(doc.agents[0].name, "Planner");
    assert_eq!(doc.agents[0].model_params.max_tokens, 1000);

    let err = workflow.select_version("9.9.9").unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn test_update_agent_in_place() {
    let backend = MockBackend::start();
    let mut workflow = VersionWorkflow::new(backend.client());

    let outcome = workflow.update_agent("1.0.0", edited_planner()).unwrap();
    assert_eq!(outcome.result.version, "1.0.0");
    assert!(!outcome.version_mismatch());

    let doc = backend.client().fetch_config(Some("1.0.0")).unwrap();
    assert_eq!(doc.agents[0].prompt, "Plan a weekend in {{city}}");
}

#[test]
fn test_trace_errors() {
    let backend = MockBackend::start();
    let client = backend.client();

    let err = client.get_trace("missing").unwrap_err();
    assert_eq!(err.status(), Some(404));
    match err {
        StudioError::Backend { body, .. } => assert!(body.contains("Trace not found")),
        other => panic!("unexpected error: {:?}", other),
    }

    let err = client.get_trace("garbled").unwrap_err();
    assert_eq!(err.status(), Some(200));
}

#[test]
fn test_unreachable_backend_is_transport_error() {
    let client = ApiClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let err = client.fetch_versions().unwrap_err();
    assert!(err.is_transport());
    assert!(err.allows_fallback());
}

// =============================================================================
// Proxy against the mock
// =============================================================================

#[test]
fn test_proxy_versions_pass_through_and_fallback() {
    let backend = MockBackend::start();
    let client = backend.client();

    let reply = serve::route(&client, &Method::Get, "/api/config/versions", "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header(FALLBACK_HEADER), None);
    assert_eq!(reply.header("cache-control"), Some("no-store"));

    backend.deny_versions(500);
    let reply = serve::route(&client, &Method::Get, "/api/config/versions", "");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header(FALLBACK_HEADER), Some("true"));
    let body: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body[0]["version"], "1.0.0");
    assert_eq!(body[0]["is_current"], true);
}

#[test]
fn test_proxy_commit_defaults() {
    let backend = MockBackend::start();
    let client = backend.client();

    let reply = serve::route(
        &client,
        &Method::Post,
        "/api/config/commit",
        r#"{"source_version":"1.0.0"}"#,
    );
    assert_eq!(reply.status, 200);
    let body: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["version"], "1.0.1");
    assert_eq!(body["synced_to_main"], false);

    let versions = client.fetch_versions().unwrap();
    let created = versions.iter().find(|v| v.version == "1.0.1").unwrap();
    assert_eq!(created.commit_message, "Configuration update");
}

#[test]
fn test_proxy_sync_requires_version() {
    let backend = MockBackend::start();
    let client = backend.client();

    let reply = serve::route(&client, &Method::Post, "/api/config/sync", "{}");
    assert_eq!(reply.status, 400);
    assert_eq!(backend.request_count(), 0);

    let reply = serve::route(
        &client,
        &Method::Post,
        "/api/config/sync",
        r#"{"version":"4.0.0"}"#,
    );
    assert_eq!(reply.status, 500);
    let body: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["success"], false);
}

#[test]
fn test_proxy_update_agent_reports_backend_refusal() {
    let backend = MockBackend::start();
    let client = backend.client();

    let body = json!({
        "agent": { "name": "Planner", "prompt": "Plan" },
        "commit_message": "Updated agent: Planner",
        "sync_to_main": false,
        "version": "9.9.9"
    })
    .to_string();
    let reply = serve::route(&client, &Method::Post, "/api/update_agent", &body);
    assert_eq!(reply.status, 500);
    let body: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Failed to update agent");
    assert!(body["details"].as_str().unwrap().contains("404"));
    assert_eq!(backend.request_count(), 1);
}

#[test]
fn test_proxy_update_agent_forwards_success() {
    let backend = MockBackend::start();
    let client = backend.client();

    let body = serde_json::to_string(&agensight::model::UpdateAgentRequest::in_place(
        "1.0.0",
        edited_planner(),
    ))
    .unwrap();
    let reply = serve::route(&client, &Method::Post, "/api/update_agent", &body);
    assert_eq!(reply.status, 200);
    let body: Value = serde_json::from_str(&reply.body).unwrap();
    assert_eq!(body["version"], "1.0.0");
    assert!(body.get("message").is_none());
}
