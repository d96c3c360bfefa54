//! HTTP proxy in front of the agensight backend
//!
//! `agensight serve` → listens locally and forwards `/api/*` to the configured
//! backend. Read routes degrade to bundled data when the backend is down
//! (marked with `X-Fallback-Data: true`); write routes report the failure.

use std::io::Cursor;

use colored::Colorize;
use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, RawResponse};
use crate::error::{Result, StudioError};
use crate::fallback;

pub const FALLBACK_HEADER: &str = "X-Fallback-Data";

const ROUTES: &[&str] = &[
    "GET  /api/config[?version=V]",
    "GET  /api/config/versions",
    "POST /api/config/commit",
    "POST /api/config/sync",
    "POST /api/update_agent",
    "POST /api/update_prompt",
    "GET  /api/traces",
    "GET  /api/traces/{id}",
    "GET  /api/traces/span/{id}",
];

/// A response before it is handed to tiny_http
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl Reply {
    fn json(status: u16, value: &Value) -> Self {
        Self {
            status,
            body: value.to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn fallback(value: &Value) -> Self {
        Self::json(200, value).with_header(FALLBACK_HEADER, "true")
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let mut response = Response::from_string(self.body).with_status_code(self.status);
        for (name, value) in &self.headers {
            if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                response.add_header(header);
            }
        }
        response
    }
}

/// Bind the proxy listener
pub fn bind(addr: &str) -> Result<Server> {
    Server::http(addr)
        .map_err(|e| StudioError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))
}

/// Start the proxy on `127.0.0.1:port` and block forever
pub fn start_proxy_server(port: u16, client: ApiClient) -> Result<()> {
    let server = bind(&format!("127.0.0.1:{}", port))?;

    eprintln!("\n{}", "agensight studio proxy".green().bold());
    eprintln!("   Listening: http://localhost:{}", port);
    eprintln!("   Backend:   {}", client.base_url());
    eprintln!("   Press Ctrl+C to stop\n");
    info!(port, backend = client.base_url(), "proxy server started");

    serve(&server, &client);
    Ok(())
}

/// Answer requests until the server is dropped
pub fn serve(server: &Server, client: &ApiClient) {
    for request in server.incoming_requests() {
        if let Err(e) = handle_request(client, request) {
            error!(error = %e, "failed to answer request");
        }
    }
}

fn handle_request(client: &ApiClient, mut request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();
    let mut body = String::new();
    if method == Method::Post {
        request.as_reader().read_to_string(&mut body)?;
    }

    let reply = route(client, &method, &url, &body);
    debug!(%method, url = %url, status = reply.status, "proxied");
    request.respond(reply.into_response())
}

/// Map one request onto a reply
pub fn route(client: &ApiClient, method: &Method, url: &str, body: &str) -> Reply {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    match (method, path) {
        (&Method::Get, "/") => Reply::json(200, &json!({ "service": "agensight", "routes": ROUTES })),

        (&Method::Get, "/api/config") => get_config(client, query),
        (&Method::Get, "/api/config/versions") => get_versions(client),
        (&Method::Post, "/api/config/commit") => post_commit(client, body),
        (&Method::Post, "/api/config/sync") => post_sync(client, body),
        (&Method::Post, "/api/update_agent") => post_update_agent(client, body),
        (&Method::Post, "/api/update_prompt") => post_update_prompt(client, body),

        (&Method::Get, "/api/traces") => get_traces(client),
        (&Method::Get, p) if p.starts_with("/api/traces/span/") => {
            get_span(client, &p["/api/traces/span/".len()..])
        }
        (&Method::Get, p) if p.starts_with("/api/traces/") => {
            get_trace(client, &p["/api/traces/".len()..])
        }

        _ => Reply::json(404, &json!({ "error": "Not found" })),
    }
}

/// Decoded 2xx JSON body, or a description of why there is none
fn forwarded(result: Result<RawResponse>) -> std::result::Result<Value, String> {
    let raw = result.map_err(|e| e.to_string())?;
    if !raw.is_success() {
        return Err(format!("API error: {} - {}", raw.status, raw.body));
    }
    serde_json::from_str(&raw.body).map_err(|e| format!("invalid JSON from backend: {}", e))
}

fn parse_body(body: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(body).map_err(|e| format!("invalid JSON body: {}", e))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Bool(b)) => !b,
        _ => false,
    }
}

// --- Configuration ---

fn get_config(client: &ApiClient, query: &str) -> Reply {
    let version = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .unwrap_or_default()
        .into_iter()
        .find(|(k, v)| k == "version" && !v.is_empty())
        .map(|(_, v)| v);
    let path = match &version {
        Some(v) => match serde_urlencoded::to_string([("version", v)]) {
            Ok(q) => format!("/api/config?{}", q),
            Err(_) => "/api/config".to_string(),
        },
        None => "/api/config".to_string(),
    };

    match forwarded(client.raw_get(&path)) {
        Ok(doc) => Reply::json(200, &doc),
        Err(details) => {
            warn!(version = ?version, details = %details, "config fetch failed");
            Reply::json(
                500,
                &json!({
                    "error": "Failed to fetch configuration data",
                    "details": details,
                    "status": "error"
                }),
            )
        }
    }
}

fn get_versions(client: &ApiClient) -> Reply {
    let reply = match forwarded(client.raw_get("/api/config/versions")) {
        Ok(versions) => Reply::json(200, &versions),
        Err(details) => {
            warn!(details = %details, "version list unavailable, serving fallback");
            Reply::fallback(&json!(fallback::fallback_versions()))
        }
    };
    reply.with_header("Cache-Control", "no-store")
}

fn post_commit(client: &ApiClient, body: &str) -> Reply {
    let failure = |details: String| {
        error!(details = %details, "commit failed");
        Reply::json(
            500,
            &json!({ "error": "Failed to commit version", "details": details, "success": false }),
        )
    };
    let data = match parse_body(body) {
        Ok(data) => data,
        Err(e) => return failure(e),
    };

    let message = data
        .get("commit_message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or("Configuration update");
    let payload = json!({
        "commit_message": message,
        "sync_to_main": data.get("sync_to_main") == Some(&Value::Bool(true)),
        "source_version": data.get("source_version").cloned().unwrap_or(Value::Null),
    });
    info!(message, "forwarding commit");

    match forwarded(client.raw_post("/api/config/commit", &payload.to_string())) {
        Ok(result) => Reply::json(200, &result),
        Err(details) => failure(details),
    }
}

fn post_sync(client: &ApiClient, body: &str) -> Reply {
    let failure = |details: String| {
        error!(details = %details, "sync failed");
        Reply::json(
            500,
            &json!({
                "error": "Failed to sync version to main config",
                "details": details,
                "success": false
            }),
        )
    };
    let data = match parse_body(body) {
        Ok(data) => data,
        Err(e) => return failure(e),
    };
    if is_blank(data.get("version")) {
        return Reply::json(400, &json!({ "error": "Missing required version parameter" }));
    }

    match forwarded(client.raw_post("/api/config/sync", &data.to_string())) {
        Ok(result) => Reply::json(200, &result),
        Err(details) => failure(details),
    }
}

fn post_update_agent(client: &ApiClient, body: &str) -> Reply {
    let data = match parse_body(body) {
        Ok(data) => data,
        Err(e) => return Reply::json(400, &json!({ "error": e })),
    };
    if is_blank(data.get("agent").and_then(|a| a.get("name"))) {
        return Reply::json(400, &json!({ "error": "Missing required agent data" }));
    }

    // Demo mode only when the backend cannot be reached; a refusal is an error
    match client.raw_post("/api/update_agent", &data.to_string()) {
        Ok(raw) => match forwarded(Ok(raw)) {
            Ok(result) => Reply::json(200, &result),
            Err(details) => {
                error!(details = %details, "agent update failed");
                Reply::json(
                    500,
                    &json!({
                        "error": "Failed to update agent",
                        "details": details,
                        "success": false
                    }),
                )
            }
        },
        Err(e) => {
            warn!(error = %e, "backend unreachable, answering agent update in demo mode");
            Reply::json(
                200,
                &json!({
                    "success": true,
                    "version": fallback::DEMO_UPDATE_VERSION,
                    "synced_to_main": false,
                    "message": "Agent updated successfully (demo mode)"
                }),
            )
        }
    }
}

fn post_update_prompt(client: &ApiClient, body: &str) -> Reply {
    let failure = |details: String| {
        error!(details = %details, "prompt update failed");
        Reply::json(
            500,
            &json!({
                "error": "Failed to update prompt",
                "success": false,
                "version": fallback::DEFAULT_VERSION,
                "synced_to_main": false,
                "message": "Failed to update prompt (demo mode)"
            }),
        )
    };
    let mut data = match parse_body(body) {
        Ok(data) => data,
        Err(e) => return failure(e),
    };
    match data.as_object_mut() {
        Some(obj) => {
            obj.entry("sync_to_main").or_insert(Value::Bool(false));
        }
        None => return failure("prompt payload must be a JSON object".to_string()),
    }

    match client.raw_post("/api/update_prompt", &data.to_string()) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw.body) {
            Ok(result) => Reply::json(raw.status, &result),
            Err(e) => failure(format!("invalid JSON from backend: {}", e)),
        },
        Err(e) => failure(e.to_string()),
    }
}

// --- Traces ---

fn trace_not_found() -> Reply {
    Reply::json(404, &json!({ "error": "Trace not found" }))
}

fn get_traces(client: &ApiClient) -> Reply {
    match forwarded(client.raw_get("/api/traces")) {
        Ok(traces) => Reply::json(200, &traces),
        Err(details) => {
            warn!(details = %details, "trace list unavailable, serving demo traces");
            Reply::fallback(&json!(fallback::demo_traces()))
        }
    }
}

fn get_trace(client: &ApiClient, id: &str) -> Reply {
    if id.is_empty() {
        return trace_not_found();
    }
    match client.raw_get(&format!("/api/traces/{}", id)) {
        Ok(raw) if raw.status == 404 => trace_not_found(),
        result => match forwarded(result) {
            Ok(detail) => Reply::json(200, &detail),
            Err(details) => {
                warn!(id, details = %details, "trace unavailable, trying demo data");
                match fallback::demo_trace_detail(id) {
                    Some(detail) => Reply::fallback(&json!(detail)),
                    None => trace_not_found(),
                }
            }
        },
    }
}

fn get_span(client: &ApiClient, span_id: &str) -> Reply {
    if span_id.is_empty() {
        return Reply::json(404, &json!({ "error": "Span not found" }));
    }
    match forwarded(client.raw_get(&format!("/api/traces/span/{}", span_id))) {
        Ok(details) => Reply::json(200, &details),
        Err(details) => {
            warn!(span_id, details = %details, "span details unavailable, serving demo data");
            Reply::fallback(&json!(fallback::demo_span_details(span_id)))
        }
    }
}
