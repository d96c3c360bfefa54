//! Trace, span and configuration-version records
//!
//! The backend is loose about shapes (ids arrive as numbers or strings,
//! timestamps as ISO strings or epoch seconds, metadata as a JSON string or a
//! raw object). Everything is normalized here, at the API boundary, so the rest
//! of the crate works with strict types.
//!
//! Spans are validated one at a time: a span missing its id or a usable time
//! range is dropped (and logged) instead of failing the whole trace.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

// =============================================================================
// Timestamps
// =============================================================================

/// A point in time as the backend sends it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Seconds since the Unix epoch (fractional)
    Epoch(f64),
    /// ISO 8601 / RFC 3339 string
    Iso(String),
}

impl Timestamp {
    /// Seconds since the Unix epoch, if the value can be interpreted
    pub fn epoch_seconds(&self) -> Option<f64> {
        match self {
            Timestamp::Epoch(secs) if secs.is_finite() => Some(*secs),
            Timestamp::Epoch(_) => None,
            Timestamp::Iso(s) => parse_iso_seconds(s),
        }
    }
}

fn parse_iso_seconds(s: &str) -> Option<f64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64 / 1000.0);
    }
    // Timezone-less timestamps are treated as UTC
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis() as f64 / 1000.0)
}

// =============================================================================
// Traces
// =============================================================================

/// Metadata keys surfaced in trace listings, in display order
pub const METADATA_PRIORITY_KEYS: [&str; 3] = ["status", "priority", "user_id"];

/// One end-to-end agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub session_id: String,
    pub started_at: Timestamp,
    #[serde(default)]
    pub ended_at: Option<Timestamp>,
    /// JSON-encoded metadata object
    #[serde(default = "empty_object", deserialize_with = "json_text")]
    pub metadata: String,
    #[serde(default, deserialize_with = "lenient_spans", skip_serializing_if = "Vec::is_empty")]
    pub spans: Vec<Span>,
}

fn empty_object() -> String {
    "{}".to_string()
}

impl Trace {
    /// Wall-clock latency in seconds; `None` when unknown or negative
    pub fn latency_seconds(&self) -> Option<f64> {
        let start = self.started_at.epoch_seconds()?;
        let end = self.ended_at.as_ref()?.epoch_seconds()?;
        let latency = end - start;
        (latency >= 0.0).then_some(latency)
    }

    /// Human-readable latency, or a short reason why it can't be shown
    pub fn latency_label(&self) -> String {
        match self.ended_at {
            None => "Missing data".to_string(),
            Some(_) => match self.latency_seconds() {
                Some(secs) => format_latency((secs * 1000.0).round() as i64),
                None => "Invalid duration".to_string(),
            },
        }
    }

    /// Up to three priority metadata entries, `None` if metadata isn't valid JSON
    pub fn metadata_summary(&self) -> Option<Vec<(String, String)>> {
        let parsed: Map<String, Value> = serde_json::from_str(&self.metadata).ok()?;
        Some(
            METADATA_PRIORITY_KEYS
                .iter()
                .filter_map(|key| parsed.get(*key).map(|v| (key.to_string(), value_text(v))))
                .collect(),
        )
    }
}

/// Format a latency given in milliseconds
pub fn format_latency(ms: i64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1000)
    }
}

/// Render a JSON value the way a user expects to read it (strings unquoted)
pub fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A trace plus the agent spans and the run's overall input/output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceDetail {
    pub trace: Trace,
    #[serde(default)]
    pub trace_input: String,
    #[serde(default)]
    pub trace_output: String,
    #[serde(default, deserialize_with = "lenient_spans")]
    pub agents: Vec<Span>,
}

impl TraceDetail {
    /// Interpret a `/api/traces/{id}` body, which is either a detail record or a bare trace
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.get("trace").is_some() {
            return serde_json::from_value(value);
        }
        let trace: Trace = serde_json::from_value(value)?;
        let agents = trace.spans.clone();
        Ok(TraceDetail {
            trace,
            trace_input: String::new(),
            trace_output: String::new(),
            agents,
        })
    }
}

// =============================================================================
// Spans and tool calls
// =============================================================================

/// One agent's execution segment within a trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub span_id: String,
    pub name: String,
    /// Epoch seconds
    pub start_time: f64,
    /// Epoch seconds, never before `start_time`
    pub end_time: f64,
    /// Seconds; authoritative for display width
    pub duration: f64,
    pub tools_called: Vec<ToolCall>,
    pub final_completion: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawSpan {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    span_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    start_time: Option<f64>,
    #[serde(default)]
    end_time: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    tools_called: Vec<Value>,
    #[serde(default)]
    final_completion: Option<String>,
}

impl TryFrom<RawSpan> for Span {
    type Error = String;

    fn try_from(raw: RawSpan) -> Result<Self, Self::Error> {
        let span_id = raw
            .span_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "missing span_id".to_string())?;
        let start_time = raw
            .start_time
            .filter(|t| t.is_finite())
            .ok_or_else(|| format!("span {}: missing start_time", span_id))?;
        let end_time = raw
            .end_time
            .filter(|t| t.is_finite())
            .ok_or_else(|| format!("span {}: missing end_time", span_id))?;
        if end_time < start_time {
            return Err(format!("span {}: end_time precedes start_time", span_id));
        }
        let duration = raw
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(end_time - start_time);

        let tools_called = raw
            .tools_called
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<ToolCall>(v) {
                Ok(mut tool) => {
                    if tool.span_id.is_empty() {
                        tool.span_id = span_id.clone();
                    }
                    Some(tool)
                }
                Err(e) => {
                    warn!(span_id = %span_id, error = %e, "dropping malformed tool call");
                    None
                }
            })
            .collect();

        Ok(Span {
            span_id,
            name: raw.name.unwrap_or_default(),
            start_time,
            end_time,
            duration,
            tools_called,
            final_completion: raw.final_completion.unwrap_or_default(),
        })
    }
}

impl Span {
    /// Validate one raw span record
    pub fn from_value(value: Value) -> Result<Self, String> {
        let raw: RawSpan = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Span::try_from(raw)
    }

    pub fn end_of_duration(&self) -> f64 {
        self.start_time + self.duration
    }
}

impl<'de> Deserialize<'de> for Span {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawSpan::deserialize(deserializer)?;
        Span::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Keep the well-formed spans of a list, logging the rest
pub fn validate_spans(values: Vec<Value>) -> Vec<Span> {
    values
        .into_iter()
        .filter_map(|v| match Span::from_value(v) {
            Ok(span) => Some(span),
            Err(reason) => {
                warn!(%reason, "dropping malformed span");
                None
            }
        })
        .collect()
}

/// A tool invocation made inside a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, deserialize_with = "string_or_number")]
    pub span_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default, deserialize_with = "non_negative")]
    pub duration: f64,
    #[serde(default, deserialize_with = "json_text")]
    pub output: String,
    /// Real start time, when the backend records one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
}

// =============================================================================
// Span details
// =============================================================================

/// Prompts, completions and tool rows recorded for one span
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanDetails {
    #[serde(default, deserialize_with = "string_or_number")]
    pub span_id: String,
    #[serde(default)]
    pub prompts: Vec<PromptMessage>,
    #[serde(default)]
    pub completions: Vec<Completion>,
    #[serde(default)]
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub prompt_tokens: Option<i64>,
    #[serde(default)]
    pub completion_tokens: Option<i64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
}

// =============================================================================
// Configuration versions
// =============================================================================

/// An immutable snapshot of agent/prompt configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigVersion {
    pub version: String,
    #[serde(default)]
    pub commit_message: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub is_current: bool,
}

/// A full configuration document (`GET /api/config`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub agents: Vec<AgentData>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    pub fn agent(&self, name: &str) -> Option<&AgentData> {
        self.agents.iter().find(|a| a.name == name)
    }
}

/// One agent's prompt and model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentData {
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(rename = "modelParams", default)]
    pub model_params: ModelParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_top_p() -> f64 {
    1.0
}

fn default_max_tokens() -> u32 {
    2000
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: 0.0,
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Edge in the agent graph
///
/// The backend does not fix a shape for connections, so the object is kept
/// exactly as received and endpoints are looked up under the common key names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Connection {
    pub fields: Map<String, Value>,
}

const FROM_KEYS: &[&str] = &["from", "source", "from_agent"];
const TO_KEYS: &[&str] = &["to", "target", "to_agent"];

impl Connection {
    fn first_text(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .find_map(|k| self.fields.get(*k).and_then(Value::as_str))
    }

    pub fn from_agent(&self) -> Option<&str> {
        self.first_text(FROM_KEYS)
    }

    pub fn to_agent(&self) -> Option<&str> {
        self.first_text(TO_KEYS)
    }

    /// `from → to` when both endpoints are known, otherwise the raw object
    pub fn label(&self) -> String {
        match (self.from_agent(), self.to_agent()) {
            (Some(from), Some(to)) => format!("{} → {}", from, to),
            _ => Value::Object(self.fields.clone()).to_string(),
        }
    }
}

// =============================================================================
// Request / response bodies
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRequest {
    pub commit_message: String,
    pub sync_to_main: bool,
    pub source_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAgentRequest {
    pub agent: AgentData,
    pub commit_message: String,
    pub sync_to_main: bool,
    pub version: String,
}

impl UpdateAgentRequest {
    /// In-place edit of `agent` within `version`, never synced to main
    pub fn in_place(version: &str, agent: AgentData) -> Self {
        Self {
            commit_message: format!("Updated agent: {}", agent.name),
            agent,
            sync_to_main: false,
            version: version.to_string(),
        }
    }
}

/// Body returned by commit, update-agent and update-prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionResult {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub synced_to_main: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Serde helpers
// =============================================================================

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

/// Accept a string as-is, or re-encode any other JSON value as text
fn json_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    })
}

fn non_negative<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let v = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    Ok(if v.is_finite() && v > 0.0 { v } else { 0.0 })
}

fn lenient_spans<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Span>, D::Error> {
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(validate_spans(values))
}
