//! Timeline selection and keyboard focus (pure state, no I/O)
//!
//! Two independent axes:
//! - **selection**: nothing, a span, or a tool call together with its owning span
//! - **focus**: a keyboard cursor over the flattened span list that wraps at both ends
//!
//! Clicking changes the selection only; arrow keys move the focus only; `Enter`
//! is the one transition that reads the focus and writes the selection.

/// What the detail pane shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Span {
        span: usize,
    },
    /// A tool call; `span` is kept for the "back" affordance
    Tool {
        span: usize,
        tool: usize,
    },
}

/// Keys the timeline reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKey {
    Up,
    Down,
    Enter,
    Escape,
}

/// Selection + focus state for one timeline view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineCursor {
    selection: Selection,
    focused: Option<usize>,
    span_count: usize,
}

impl TimelineCursor {
    pub fn new(span_count: usize) -> Self {
        Self {
            selection: Selection::None,
            focused: None,
            span_count,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn span_count(&self) -> usize {
        self.span_count
    }

    /// Span shown in the detail pane, directly or as a tool's owner
    pub fn selected_span(&self) -> Option<usize> {
        match self.selection {
            Selection::None => None,
            Selection::Span { span } | Selection::Tool { span, .. } => Some(span),
        }
    }

    pub fn selected_tool(&self) -> Option<(usize, usize)> {
        match self.selection {
            Selection::Tool { span, tool } => Some((span, tool)),
            _ => None,
        }
    }

    /// Replace the span list; drops a selection or focus that no longer fits
    pub fn reset(&mut self, span_count: usize) {
        self.span_count = span_count;
        if self.selected_span().is_some_and(|s| s >= span_count) {
            self.selection = Selection::None;
        }
        if self.focused.is_some_and(|f| f >= span_count) {
            self.focused = None;
        }
    }

    // --- Pointer ---

    pub fn click_span(&mut self, span: usize) {
        if span < self.span_count {
            self.selection = Selection::Span { span };
        }
    }

    pub fn click_tool(&mut self, span: usize, tool: usize) {
        if span < self.span_count {
            self.selection = Selection::Tool { span, tool };
        }
    }

    // --- Explicit transitions ---

    /// Escape or an explicit close
    pub fn close(&mut self) {
        self.selection = Selection::None;
    }

    /// From a tool back to its owning span; no-op otherwise
    pub fn back(&mut self) {
        if let Selection::Tool { span, .. } = self.selection {
            self.selection = Selection::Span { span };
        }
    }

    /// Step to the next tool of the selected span, wrapping
    pub fn next_tool(&mut self, tool_count: usize) {
        if tool_count == 0 {
            return;
        }
        match self.selection {
            Selection::Span { span } => self.selection = Selection::Tool { span, tool: 0 },
            Selection::Tool { span, tool } => {
                self.selection = Selection::Tool {
                    span,
                    tool: (tool + 1) % tool_count,
                }
            }
            Selection::None => {}
        }
    }

    pub fn prev_tool(&mut self, tool_count: usize) {
        if tool_count == 0 {
            return;
        }
        let last = tool_count - 1;
        match self.selection {
            Selection::Span { span } => self.selection = Selection::Tool { span, tool: last },
            Selection::Tool { span, tool } => {
                self.selection = Selection::Tool {
                    span,
                    tool: if tool == 0 { last } else { (tool - 1).min(last) },
                }
            }
            Selection::None => {}
        }
    }

    // --- Keyboard focus ---

    pub fn focus_prev(&mut self) {
        if self.span_count == 0 {
            return;
        }
        self.focused = Some(match self.focused {
            None | Some(0) => self.span_count - 1,
            Some(i) => i - 1,
        });
    }

    pub fn focus_next(&mut self) {
        if self.span_count == 0 {
            return;
        }
        self.focused = Some(match self.focused {
            Some(i) if i + 1 < self.span_count => i + 1,
            Some(_) => 0,
            None => 0,
        });
    }

    /// Promote the focused span to the selection
    pub fn activate_focused(&mut self) {
        if let Some(span) = self.focused.filter(|f| *f < self.span_count) {
            self.selection = Selection::Span { span };
        }
    }

    pub fn handle_key(&mut self, key: TimelineKey) {
        match key {
            TimelineKey::Up => self.focus_prev(),
            TimelineKey::Down => self.focus_next(),
            TimelineKey::Enter => self.activate_focused(),
            TimelineKey::Escape => self.close(),
        }
    }
}
