//! TEA Message Types for the dashboard
//!
//! Two sources of messages:
//! - key presses, translated by [`key_to_msg`] (pure)
//! - worker replies, produced by [`super::worker`] once a request finishes
//!
//! Worker replies carry the sequence number or ticket they were issued with so
//! the update function can drop responses that a newer request superseded.

use crossterm::event::{KeyCode, KeyModifiers};

use crate::error::Result;
use crate::model::{ConfigDocument, Trace, TraceDetail, VersionResult};
use crate::versions::{Ticket, VersionListing};

/// All possible messages in the dashboard
#[derive(Debug)]
pub enum Msg {
    // === Navigation ===
    MoveUp,
    MoveDown,
    /// Enter: select version, open trace, or promote timeline focus
    Activate,
    NextView,
    PrevView,
    SwitchToView(ViewKind),

    // === Versions ===
    Refresh,
    OpenCommitDialog,
    SyncSelected,

    // === Commit dialog ===
    DialogInput(char),
    DialogBackspace,
    DialogToggleSync,
    DialogSubmit,
    DialogCancel,

    // === Timeline ===
    NextTool,
    PrevTool,
    Back,
    ClearSelection,

    // === Worker replies ===
    VersionsLoaded {
        seq: u64,
        listing: VersionListing,
        preserve_selection: bool,
    },
    ConfigLoaded {
        ticket: Ticket,
        result: Result<ConfigDocument>,
    },
    Committed(Result<VersionResult>),
    Synced {
        version: String,
        result: Result<()>,
    },
    TracesLoaded {
        seq: u64,
        result: Result<Vec<Trace>>,
    },
    TraceLoaded {
        seq: u64,
        id: String,
        result: Result<TraceDetail>,
    },

    // === Lifecycle ===
    ToggleHelp,
    Quit,
    Tick,
    Noop,
}

/// Views in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewKind {
    #[default]
    Versions,
    Traces,
    Timeline,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Versions, ViewKind::Traces, ViewKind::Timeline];

    pub fn next(self) -> Self {
        match self {
            ViewKind::Versions => ViewKind::Traces,
            ViewKind::Traces => ViewKind::Timeline,
            ViewKind::Timeline => ViewKind::Versions,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ViewKind::Versions => ViewKind::Timeline,
            ViewKind::Traces => ViewKind::Versions,
            ViewKind::Timeline => ViewKind::Traces,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ViewKind::Versions => "Versions",
            ViewKind::Traces => "Traces",
            ViewKind::Timeline => "Timeline",
        }
    }
}

/// Convert a key press into a message
///
/// `dialog_open` routes every key to the commit dialog; the dialog itself
/// ignores input while a submission is pending.
pub fn key_to_msg(
    code: KeyCode,
    modifiers: KeyModifiers,
    view: ViewKind,
    dialog_open: bool,
) -> Msg {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Msg::Quit;
    }

    if dialog_open {
        return match code {
            KeyCode::Enter => Msg::DialogSubmit,
            KeyCode::Esc => Msg::DialogCancel,
            KeyCode::Backspace => Msg::DialogBackspace,
            KeyCode::Tab => Msg::DialogToggleSync,
            KeyCode::Char(c) => Msg::DialogInput(c),
            _ => Msg::Noop,
        };
    }

    // Global keys
    match code {
        KeyCode::Char('q') => return Msg::Quit,
        KeyCode::Char('?') => return Msg::ToggleHelp,
        KeyCode::Tab => return Msg::NextView,
        KeyCode::BackTab => return Msg::PrevView,
        KeyCode::Char('1') => return Msg::SwitchToView(ViewKind::Versions),
        KeyCode::Char('2') => return Msg::SwitchToView(ViewKind::Traces),
        KeyCode::Char('3') => return Msg::SwitchToView(ViewKind::Timeline),
        KeyCode::Char('j') | KeyCode::Down => return Msg::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => return Msg::MoveUp,
        KeyCode::Enter => return Msg::Activate,
        KeyCode::Char('r') => return Msg::Refresh,
        _ => {}
    }

    match view {
        ViewKind::Versions => match code {
            KeyCode::Char('c') => Msg::OpenCommitDialog,
            KeyCode::Char('s') => Msg::SyncSelected,
            _ => Msg::Noop,
        },
        ViewKind::Traces => Msg::Noop,
        ViewKind::Timeline => match code {
            KeyCode::Char('t') => Msg::NextTool,
            KeyCode::Char('T') => Msg::PrevTool,
            KeyCode::Char('b') => Msg::Back,
            KeyCode::Esc => Msg::ClearSelection,
            _ => Msg::Noop,
        },
    }
}
