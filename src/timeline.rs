//! Timeline model builder
//!
//! Turns the spans of a trace into geometry for a horizontal Gantt-style view:
//! time bounds, six tick labels, one bar per span and one sub-segment per tool
//! call. Positions are fractions of the trace's total duration in `[0, 1]`;
//! converting them to columns or pixels is the renderer's job
//! ([`bar_columns`] does it for character cells).
//!
//! Tool calls carry a duration but (usually) no start time. Their start is
//! synthesized by laying the tools out as equal sequential slots along the
//! parent span, each segment capped at 95% of its slot. This is a display
//! approximation, not a timestamp. When the backend does record a real tool
//! start it is used instead, clamped into the owning span.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::model::{Span, Trace};

/// Number of tick labels along the time axis
pub const TICK_COUNT: usize = 6;

/// Smallest visible bar, as a fraction of the axis
pub const DEFAULT_MIN_WIDTH: f64 = 0.005;

/// Fraction of a synthesized tool slot a tool segment may fill
const TOOL_SLOT_FILL: f64 = 0.95;

pub const USER_KEY: &str = "User";
pub const ASSISTANT_KEY: &str = "Assistant";
pub const DEFAULT_COLOR: &str = "#a9a9a9";

/// Built-in name → color table
pub fn default_palette() -> BTreeMap<String, String> {
    [
        (USER_KEY, "#4f86f7"),
        (ASSISTANT_KEY, "#4ae0a0"),
        ("flight-search", "#ffa559"),
        ("hotel-recommendation", "#ff5995"),
        ("database-lookup", "#9370db"),
        ("gpt-4o-mini", "#66cdaa"),
        ("get_weather", "#ffd700"),
        ("get_news", "#ff6b6b"),
        ("router", "#8a2be2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Which row group a span is drawn in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Lane {
    /// User input spans, all sharing one row
    User,
    /// Everything else, one row per span
    Agent,
}

impl Lane {
    pub fn for_span_name(name: &str) -> Lane {
        let lower = name.to_lowercase();
        if lower.contains("user") || lower.contains("input") {
            Lane::User
        } else {
            Lane::Agent
        }
    }
}

/// Geometry for one span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanBar {
    /// Position in the input span list
    pub index: usize,
    pub span_id: String,
    pub name: String,
    pub lane: Lane,
    /// Start position as a fraction of the axis
    pub offset: f64,
    /// Length as a fraction of the axis (before the minimum-width floor)
    pub width: f64,
    pub color: String,
    pub tools: Vec<ToolSegment>,
}

/// Geometry for one tool call inside a span
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSegment {
    /// Position in the owning span's `tools_called`
    pub index: usize,
    pub name: String,
    /// Start in epoch seconds (synthesized unless `synthesized` is false)
    pub start: f64,
    /// Drawn length in seconds
    pub length: f64,
    pub offset: f64,
    pub width: f64,
    pub color: String,
    pub synthesized: bool,
}

/// Everything a renderer needs to draw a trace timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineModel {
    pub start_time: f64,
    pub end_time: f64,
    pub total_duration: f64,
    pub time_marks: Vec<String>,
    pub type_colors: BTreeMap<String, String>,
    pub bars: Vec<SpanBar>,
    pub min_width: f64,
}

impl TimelineModel {
    /// Spans in the shared user row, in input order
    pub fn user_bars(&self) -> impl Iterator<Item = &SpanBar> {
        self.bars.iter().filter(|b| b.lane == Lane::User)
    }

    /// Spans drawn one per row, in input order
    pub fn agent_bars(&self) -> impl Iterator<Item = &SpanBar> {
        self.bars.iter().filter(|b| b.lane == Lane::Agent)
    }

    /// Bar width with the minimum-width floor applied
    pub fn visible_width(&self, width: f64) -> f64 {
        width.max(self.min_width).min(1.0)
    }

    /// Map an epoch time to an axis fraction
    pub fn position_of(&self, time: f64) -> f64 {
        fraction(time - self.start_time, self.total_duration)
    }

    pub fn color_for(&self, name: &str) -> &str {
        self.type_colors
            .get(name)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COLOR)
    }
}

/// Which clock tick labels are rendered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickClock {
    #[default]
    Local,
    Utc,
}

/// Configurable timeline construction
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    palette: BTreeMap<String, String>,
    min_width: f64,
    clock: TickClock,
}

impl Default for TimelineBuilder {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            min_width: DEFAULT_MIN_WIDTH,
            clock: TickClock::Local,
        }
    }
}

impl TimelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace palette entries
    pub fn with_colors<I, K, V>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.palette
            .extend(colors.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_min_width(mut self, min_width: f64) -> Self {
        self.min_width = if min_width.is_finite() {
            min_width.clamp(0.0, 1.0)
        } else {
            DEFAULT_MIN_WIDTH
        };
        self
    }

    pub fn with_clock(mut self, clock: TickClock) -> Self {
        self.clock = clock;
        self
    }

    /// Build the model; `None` means "nothing to draw", never an error
    pub fn build(&self, spans: &[Span], trace: Option<&Trace>) -> Option<TimelineModel> {
        if trace.is_none() || spans.is_empty() {
            return None;
        }

        let start_time = spans
            .iter()
            .map(|s| s.start_time)
            .fold(f64::INFINITY, f64::min);
        let end_time = spans
            .iter()
            .map(|s| s.end_time)
            .fold(f64::NEG_INFINITY, f64::max);
        let total_duration = (end_time - start_time).max(0.0);

        let time_marks = (0..TICK_COUNT)
            .map(|k| {
                let t = start_time + (k as f64 / (TICK_COUNT - 1) as f64) * total_duration;
                format_tick(t, self.clock)
            })
            .collect();

        let bars = spans
            .iter()
            .enumerate()
            .map(|(index, span)| self.span_bar(index, span, start_time, total_duration))
            .collect();

        Some(TimelineModel {
            start_time,
            end_time,
            total_duration,
            time_marks,
            type_colors: self.palette.clone(),
            bars,
            min_width: self.min_width,
        })
    }

    fn span_bar(&self, index: usize, span: &Span, start_time: f64, total: f64) -> SpanBar {
        let lane = Lane::for_span_name(&span.name);
        let color = match lane {
            Lane::User => self.color(USER_KEY),
            Lane::Agent => self
                .palette
                .get(&span.name)
                .cloned()
                .unwrap_or_else(|| self.color(ASSISTANT_KEY)),
        };

        let tools = tool_layout(span)
            .into_iter()
            .map(|(tool_index, start, length, synthesized)| {
                let tool = &span.tools_called[tool_index];
                ToolSegment {
                    index: tool_index,
                    name: tool.name.clone(),
                    start,
                    length,
                    offset: fraction(start - start_time, total),
                    width: fraction(length, total),
                    color: self.color(&tool.name),
                    synthesized,
                }
            })
            .collect();

        SpanBar {
            index,
            span_id: span.span_id.clone(),
            name: span.name.clone(),
            lane,
            offset: fraction(span.start_time - start_time, total),
            width: fraction(span.duration, total),
            color,
            tools,
        }
    }

    fn color(&self, name: &str) -> String {
        self.palette
            .get(name)
            .cloned()
            .unwrap_or_else(|| DEFAULT_COLOR.to_string())
    }
}

/// Build with default palette, local-time ticks and default minimum width
pub fn build(spans: &[Span], trace: Option<&Trace>) -> Option<TimelineModel> {
    TimelineBuilder::default().build(spans, trace)
}

/// Lay out a span's tool calls as `(tool index, start, length, synthesized)`
///
/// Starts always fall within `[span.start_time, span.start_time + span.duration]`.
pub fn tool_layout(span: &Span) -> Vec<(usize, f64, f64, bool)> {
    let count = span.tools_called.len().max(1) as f64;
    let span_end = span.end_of_duration();
    let slot = span.duration / count;

    span.tools_called
        .iter()
        .enumerate()
        .map(|(i, tool)| match tool.start_time.filter(|t| t.is_finite()) {
            Some(real) => {
                let start = real.clamp(span.start_time, span_end);
                (i, start, tool.duration.min(span_end - start).max(0.0), false)
            }
            None => {
                let start = span.start_time + span.duration * (i as f64 / count);
                let length = tool.duration.min(slot * TOOL_SLOT_FILL).max(0.0);
                (i, start.min(span_end), length, true)
            }
        })
        .collect()
}

/// `part / total` clamped to `[0, 1]`; zero when the axis has no length
fn fraction(part: f64, total: f64) -> f64 {
    if total > 0.0 && part.is_finite() {
        (part / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn format_tick(secs: f64, clock: TickClock) -> String {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    let Some(utc) = DateTime::<Utc>::from_timestamp(whole as i64, nanos) else {
        return "--:--:--".to_string();
    };
    match clock {
        TickClock::Utc => utc.format("%H:%M:%S").to_string(),
        TickClock::Local => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
    }
}

/// Convert an axis fraction pair to a `(start column, length)` within `cols`
///
/// The length is at least one cell so every bar stays visible and clickable.
pub fn bar_columns(offset: f64, width: f64, cols: u16) -> (u16, u16) {
    if cols == 0 {
        return (0, 0);
    }
    let max_start = cols - 1;
    let start = ((offset.clamp(0.0, 1.0) * cols as f64).floor() as u16).min(max_start);
    let len = (width.clamp(0.0, 1.0) * cols as f64).round() as u16;
    (start, len.clamp(1, cols - start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Timestamp, ToolCall};
    use proptest::prelude::*;
    use serde_json::Map;

    fn trace() -> Trace {
        Trace {
            id: "1".to_string(),
            name: "Weather and Trip Planning".to_string(),
            session_id: "sess".to_string(),
            started_at: Timestamp::Epoch(1000.0),
            ended_at: Some(Timestamp::Epoch(1010.0)),
            metadata: "{}".to_string(),
            spans: vec![],
        }
    }

    fn tool(name: &str, duration: f64) -> ToolCall {
        ToolCall {
            span_id: String::new(),
            name: name.to_string(),
            args: Map::new(),
            duration,
            output: String::new(),
            start_time: None,
        }
    }

    fn span(id: &str, name: &str, start: f64, end: f64, tools: Vec<ToolCall>) -> Span {
        Span {
            span_id: id.to_string(),
            name: name.to_string(),
            start_time: start,
            end_time: end,
            duration: end - start,
            tools_called: tools,
            final_completion: String::new(),
        }
    }

    #[test]
    fn test_empty_spans_yield_none() {
        assert!(build(&[], Some(&trace())).is_none());
    }

    #[test]
    fn test_missing_trace_yields_none() {
        let spans = vec![span("a", "Agent 1", 0.0, 1.0, vec![])];
        assert!(build(&spans, None).is_none());
    }

    #[test]
    fn test_bounds_and_ticks() {
        let spans = vec![
            span("a", "Agent 1", 1000.0, 1004.0, vec![]),
            span("b", "Agent 2", 1002.0, 1010.0, vec![]),
        ];
        let model = TimelineBuilder::new()
            .with_clock(TickClock::Utc)
            .build(&spans, Some(&trace()))
            .unwrap();

        assert_eq!(model.start_time, 1000.0);
        assert_eq!(model.end_time, 1010.0);
        assert_eq!(model.total_duration, 10.0);
        assert_eq!(model.time_marks.len(), TICK_COUNT);
        assert_eq!(model.time_marks[0], "00:16:40");
        assert_eq!(model.time_marks[5], "00:16:50");
        assert_eq!(model.time_marks[1], "00:16:42");
    }

    #[test]
    fn test_offsets_and_widths() {
        let spans = vec![
            span("a", "Agent 1", 1000.0, 1004.0, vec![]),
            span("b", "Agent 2", 1002.0, 1010.0, vec![]),
        ];
        let model = build(&spans, Some(&trace())).unwrap();
        assert_eq!(model.bars[0].offset, 0.0);
        assert!((model.bars[0].width - 0.4).abs() < 1e-9);
        assert!((model.bars[1].offset - 0.2).abs() < 1e-9);
        assert!((model.bars[1].width - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_duration_is_guarded() {
        let spans = vec![
            span("a", "Agent 1", 5.0, 5.0, vec![tool("get_weather", 1.0)]),
            span("b", "Agent 2", 5.0, 5.0, vec![]),
        ];
        let model = build(&spans, Some(&trace())).unwrap();
        assert_eq!(model.total_duration, 0.0);
        for bar in &model.bars {
            assert_eq!(bar.offset, 0.0);
            assert_eq!(bar.width, 0.0);
            assert_eq!(model.visible_width(bar.width), DEFAULT_MIN_WIDTH);
        }
        assert_eq!(model.bars[0].tools[0].offset, 0.0);
        assert_eq!(model.time_marks.len(), TICK_COUNT);
    }

    #[test]
    fn test_lanes_preserve_order() {
        let spans = vec![
            span("u", "User Input", 0.0, 1.0, vec![]),
            span("a", "Planner", 1.0, 2.0, vec![]),
            span("i", "input-parser", 1.5, 2.0, vec![]),
            span("b", "Writer", 2.0, 3.0, vec![]),
        ];
        let model = build(&spans, Some(&trace())).unwrap();
        let users: Vec<_> = model.user_bars().map(|b| b.span_id.as_str()).collect();
        let agents: Vec<_> = model.agent_bars().map(|b| b.span_id.as_str()).collect();
        assert_eq!(users, vec!["u", "i"]);
        assert_eq!(agents, vec!["a", "b"]);
    }

    #[test]
    fn test_colors() {
        let spans = vec![
            span("u", "USER", 0.0, 1.0, vec![]),
            span("r", "router", 0.0, 1.0, vec![tool("get_news", 0.5), tool("mystery", 0.1)]),
            span("x", "Agent 7", 0.0, 1.0, vec![]),
        ];
        let model = build(&spans, Some(&trace())).unwrap();
        assert_eq!(model.bars[0].color, "#4f86f7");
        assert_eq!(model.bars[1].color, "#8a2be2");
        assert_eq!(model.bars[2].color, "#4ae0a0");
        assert_eq!(model.bars[1].tools[0].color, "#ff6b6b");
        assert_eq!(model.bars[1].tools[1].color, DEFAULT_COLOR);
    }

    #[test]
    fn test_palette_overrides() {
        let spans = vec![span("x", "Agent 7", 0.0, 1.0, vec![])];
        let model = TimelineBuilder::new()
            .with_colors([("Agent 7", "#000000")])
            .build(&spans, Some(&trace()))
            .unwrap();
        assert_eq!(model.bars[0].color, "#000000");
        assert_eq!(model.color_for("unknown"), DEFAULT_COLOR);
    }

    #[test]
    fn test_tool_synthesis() {
        let s = span(
            "a",
            "Agent 1",
            100.0,
            110.0,
            vec![tool("get_weather", 1.0), tool("get_news", 9.0)],
        );
        let layout = tool_layout(&s);
        assert_eq!(layout[0], (0, 100.0, 1.0, true));
        // Second slot starts halfway and is capped at 95% of a 5s slot
        assert_eq!(layout[1].1, 105.0);
        assert!((layout[1].2 - 4.75).abs() < 1e-9);
    }

    #[test]
    fn test_real_tool_start_is_preferred() {
        let mut t = tool("get_weather", 5.0);
        t.start_time = Some(108.0);
        let mut early = tool("get_news", 1.0);
        early.start_time = Some(50.0);
        let s = span("a", "Agent 1", 100.0, 110.0, vec![t, early]);
        let layout = tool_layout(&s);
        assert_eq!(layout[0], (0, 108.0, 2.0, false));
        assert_eq!(layout[1].1, 100.0);
    }

    #[test]
    fn test_bar_columns_floor() {
        assert_eq!(bar_columns(0.0, 0.0, 50), (0, 1));
        assert_eq!(bar_columns(0.5, 0.5, 50), (25, 25));
        assert_eq!(bar_columns(1.0, 0.3, 50), (49, 1));
        assert_eq!(bar_columns(0.2, 0.0001, 0), (0, 0));
    }

    fn arb_span() -> impl Strategy<Value = Span> {
        (
            0.0f64..10_000.0,
            0.0f64..500.0,
            0.0f64..2.0,
            prop::collection::vec(0.0f64..600.0, 0..5),
        )
            .prop_map(|(start, len, stretch, tool_durations)| {
                let tools = tool_durations
                    .into_iter()
                    .map(|d| tool("t", d))
                    .collect();
                Span {
                    span_id: "s".to_string(),
                    name: "agent".to_string(),
                    start_time: start,
                    end_time: start + len,
                    duration: len * stretch,
                    tools_called: tools,
                    final_completion: String::new(),
                }
            })
    }

    proptest! {
        #[test]
        fn prop_fractions_stay_in_unit_range(spans in prop::collection::vec(arb_span(), 1..12)) {
            let model = build(&spans, Some(&trace())).unwrap();
            for bar in &model.bars {
                prop_assert!((0.0..=1.0).contains(&bar.offset));
                prop_assert!((0.0..=1.0).contains(&bar.width));
                for seg in &bar.tools {
                    prop_assert!((0.0..=1.0).contains(&seg.offset));
                    prop_assert!((0.0..=1.0).contains(&seg.width));
                }
            }
        }

        #[test]
        fn prop_synthesized_tools_stay_inside_span(s in arb_span()) {
            for (_, start, length, _) in tool_layout(&s) {
                prop_assert!(start >= s.start_time);
                prop_assert!(start <= s.start_time + s.duration);
                prop_assert!(length >= 0.0);
            }
        }
    }
}
