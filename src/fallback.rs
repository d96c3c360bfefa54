//! Bundled data used when the backend is unreachable
//!
//! Only read paths fall back here (version listing, trace listing, trace
//! detail). Anything served from this module is marked as fallback-sourced so
//! the UI can show that it is running in degraded mode.

use chrono::Utc;
use serde_json::{json, Value};

use crate::model::{ConfigVersion, SpanDetails, Trace, TraceDetail};

/// Version reported as current when nothing has been saved yet
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Version echoed by the proxy's demo-mode agent update
pub const DEMO_UPDATE_VERSION: &str = "1.0.2";

/// Example versions bundled with the studio
const EXAMPLE_VERSIONS: &[(&str, &str, &str)] = &[
    (
        "0.9.0",
        "Initial planner/writer split",
        "2025-04-28T10:12:00Z",
    ),
    (
        "0.10.0",
        "Tighten router prompt",
        "2025-05-02T16:40:00Z",
    ),
];

/// Default current version followed by the bundled examples
pub fn fallback_versions() -> Vec<ConfigVersion> {
    let mut versions = vec![ConfigVersion {
        version: DEFAULT_VERSION.to_string(),
        commit_message: "Default configuration (no versions saved yet)".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        is_current: true,
    }];
    versions.extend(
        EXAMPLE_VERSIONS
            .iter()
            .map(|(version, message, timestamp)| ConfigVersion {
                version: version.to_string(),
                commit_message: message.to_string(),
                timestamp: timestamp.to_string(),
                is_current: false,
            }),
    );
    versions
}

fn demo_trace_values() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "name": "Weather and Trip Planning",
            "session_id": "sess_aB3cD8eF9gH0iJ1",
            "started_at": "2023-10-10T09:32:15Z",
            "ended_at": "2023-10-10T09:33:45Z",
            "metadata": json!({
                "user_id": "usr_123456",
                "request_type": "general_query",
                "priority": "medium",
                "status": "completed"
            }).to_string()
        }),
        json!({
            "id": 2,
            "name": "User Authentication Flow",
            "session_id": "sess_kL2mN3oP4qR5sT6",
            "started_at": "2023-10-11T14:21:08Z",
            "ended_at": "2023-10-11T14:21:58Z",
            "metadata": json!({"user_id": "usr_789012", "auth_method": "2fa"}).to_string()
        }),
        json!({
            "id": 3,
            "name": "Data Processing Pipeline",
            "session_id": "sess_uV7wX8yZ9aB0cD1",
            "started_at": "2023-10-12T03:45:22Z",
            "ended_at": "2023-10-12T04:12:17Z",
            "metadata": json!({"dataset_id": "ds_456789", "status": "completed", "errors": 12}).to_string()
        }),
    ]
}

/// Demo trace list
pub fn demo_traces() -> Vec<Trace> {
    demo_trace_values()
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

fn demo_agents(id: &str) -> Value {
    match id {
        "1" => json!([
            {
                "span_id": "8f4dfbea3ed048d3",
                "name": "Agent 1",
                "start_time": 1746780321.5,
                "end_time": 1746780323.51,
                "duration": 2.01,
                "final_completion": "The weather in New York is partly cloudy, 68°F.",
                "tools_called": [
                    {
                        "name": "get_weather",
                        "args": {"location": "New York"},
                        "duration": 1.16,
                        "output": "{\"location\": \"New York\", \"temperature\": \"68°F\"}",
                        "span_id": "8f4dfbea3ed048d3"
                    },
                    {
                        "name": "get_news",
                        "args": {"topic": "technology"},
                        "duration": 0.72,
                        "output": "{\"headlines\": [\"New iPhone announced\"]}",
                        "span_id": "8f4dfbea3ed048d3"
                    }
                ]
            },
            {
                "span_id": "f239d3d2a0c652e0",
                "name": "Agent 2",
                "start_time": 1746780323.6,
                "end_time": 1746780326.9,
                "duration": 3.3,
                "final_completion": "Here's a suggested day trip itinerary for New York City.",
                "tools_called": []
            },
            {
                "span_id": "c7e1d9b354a82f06",
                "name": "Presenter",
                "start_time": 1746780327.0,
                "end_time": 1746780329.4,
                "duration": 2.4,
                "final_completion": "Today in New York it's 68°F and partly cloudy.",
                "tools_called": []
            }
        ]),
        _ => json!([]),
    }
}

/// Demo trace detail for a known demo id
pub fn demo_trace_detail(id: &str) -> Option<TraceDetail> {
    let trace = demo_trace_values()
        .into_iter()
        .find(|t| t["id"].to_string() == id)?;
    TraceDetail::from_value(json!({
        "trace": trace,
        "trace_input": "What's the weather in New York and the latest news about technology? Also, can you help me plan a day trip to the city?",
        "trace_output": "Today in New York, it's 68°F and partly cloudy.",
        "agents": demo_agents(id)
    }))
    .ok()
}

/// Demo span details (a single prompt/completion pair)
pub fn demo_span_details(span_id: &str) -> SpanDetails {
    serde_json::from_value(json!({
        "span_id": span_id,
        "prompts": [
            {"role": "user", "content": "Present this nicely: outdoor activities for a sunny day", "message_index": 0}
        ],
        "completions": [
            {
                "role": "assistant",
                "content": "Looking for some fun outdoor activities to enjoy the beautiful weather?",
                "finish_reason": "stop",
                "prompt_tokens": 100,
                "completion_tokens": 150,
                "total_tokens": 250
            }
        ],
        "tools": []
    }))
    .unwrap_or_default()
}
