//! TEA Update Function
//!
//! ```text
//! update : Msg -> Model -> (Model, Cmd)
//! ```
//!
//! No I/O happens here. Network work is returned as [`Cmd::Request`] and run by
//! the worker; its reply comes back later as another [`Msg`]. Every request
//! that can be superseded carries a sequence number, and replies whose number
//! is no longer the latest are dropped.

use tracing::{debug, warn};

use super::msg::{Msg, ViewKind};
use super::worker::Request;
use crate::commit_dialog::CommitDialog;
use crate::error::StudioError;
use crate::fallback;
use crate::model::{Trace, TraceDetail};
use crate::selection::TimelineCursor;
use crate::timeline::{SpanBar, TimelineBuilder, TimelineModel};
use crate::versions::VersionState;

/// Side effects for the runtime (imperative shell) to execute
#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    None,
    Batch(Vec<Cmd>),
    Quit,
    Request(Request),
}

impl Cmd {
    pub fn batch(cmds: Vec<Cmd>) -> Cmd {
        let mut cmds: Vec<Cmd> = cmds
            .into_iter()
            .filter(|c| !matches!(c, Cmd::None))
            .collect();
        match cmds.len() {
            0 => Cmd::None,
            1 => cmds.pop().unwrap_or(Cmd::None),
            _ => Cmd::Batch(cmds),
        }
    }

    pub fn is_quit(&self) -> bool {
        matches!(self, Cmd::Quit)
    }

    /// Flatten into the requests to hand to the worker
    pub fn requests(self) -> Vec<Request> {
        match self {
            Cmd::Request(r) => vec![r],
            Cmd::Batch(cmds) => cmds.into_iter().flat_map(Cmd::requests).collect(),
            Cmd::None | Cmd::Quit => Vec::new(),
        }
    }
}

/// Everything the dashboard draws
#[derive(Debug, Clone)]
pub struct Model {
    pub view: ViewKind,
    pub help_open: bool,
    pub status_message: Option<String>,

    // Versions view
    pub versions: VersionState,
    pub version_index: usize,
    pub dialog: CommitDialog,

    // Traces view
    pub traces: Vec<Trace>,
    pub traces_fallback: bool,
    pub traces_loading: bool,
    pub trace_index: usize,

    // Timeline view
    pub detail: Option<TraceDetail>,
    pub detail_fallback: bool,
    pub detail_loading: bool,
    pub timeline: Option<TimelineModel>,
    pub cursor: TimelineCursor,
    pub builder: TimelineBuilder,

    seq: u64,
    versions_seq: u64,
    traces_seq: u64,
    trace_seq: u64,
    /// Version to select once the next listing arrives (set after a commit)
    pending_select: Option<String>,
}

impl Model {
    pub fn new(builder: TimelineBuilder) -> Self {
        Self {
            view: ViewKind::Versions,
            help_open: false,
            status_message: None,
            versions: VersionState::new(),
            version_index: 0,
            dialog: CommitDialog::new(),
            traces: Vec::new(),
            traces_fallback: false,
            traces_loading: false,
            trace_index: 0,
            detail: None,
            detail_fallback: false,
            detail_loading: false,
            timeline: None,
            cursor: TimelineCursor::default(),
            builder,
            seq: 0,
            versions_seq: 0,
            traces_seq: 0,
            trace_seq: 0,
            pending_select: None,
        }
    }

    /// Model plus the requests that populate it on startup
    pub fn init(builder: TimelineBuilder) -> (Self, Cmd) {
        let mut model = Self::new(builder);
        let cmd = Cmd::batch(vec![model.load_versions(false), model.load_traces()]);
        (model, cmd)
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn load_versions(&mut self, preserve_selection: bool) -> Cmd {
        self.versions_seq = self.next_seq();
        Cmd::Request(Request::Versions {
            seq: self.versions_seq,
            preserve_selection,
        })
    }

    fn load_traces(&mut self) -> Cmd {
        self.traces_seq = self.next_seq();
        self.traces_loading = true;
        Cmd::Request(Request::Traces {
            seq: self.traces_seq,
        })
    }

    fn load_trace(&mut self, id: String) -> Cmd {
        self.trace_seq = self.next_seq();
        self.detail_loading = true;
        Cmd::Request(Request::Trace {
            seq: self.trace_seq,
            id,
        })
    }

    fn select_version(&mut self, version: &str) -> Cmd {
        let ticket = self.versions.begin_select(version);
        self.sync_version_index();
        Cmd::Request(Request::Config(ticket))
    }

    fn sync_version_index(&mut self) {
        if let Some(selected) = self.versions.selected() {
            if let Some(i) = self
                .versions
                .versions()
                .iter()
                .position(|v| v.version == selected)
            {
                self.version_index = i;
            }
        }
        self.version_index = clamp(self.version_index, self.versions.versions().len());
    }

    fn set_detail(&mut self, detail: TraceDetail, fallback: bool) {
        self.timeline = self.builder.build(&detail.agents, Some(&detail.trace));
        let bars = self.timeline.as_ref().map_or(0, |t| t.bars.len());
        self.cursor = TimelineCursor::new(bars);
        self.detail = Some(detail);
        self.detail_fallback = fallback;
    }

    /// Bar of the span currently shown in the detail pane
    pub fn selected_bar(&self) -> Option<&SpanBar> {
        let span = self.cursor.selected_span()?;
        self.timeline.as_ref()?.bars.get(span)
    }

    pub fn selected_trace(&self) -> Option<&Trace> {
        self.traces.get(self.trace_index)
    }
}

fn clamp(index: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        index.min(len - 1)
    }
}

/// Process one message
pub fn update(msg: Msg, mut model: Model) -> (Model, Cmd) {
    let cmd = match msg {
        // === Lifecycle ===
        Msg::Quit => Cmd::Quit,
        Msg::Tick | Msg::Noop => Cmd::None,
        Msg::ToggleHelp => {
            model.help_open = !model.help_open;
            Cmd::None
        }

        // === View switching ===
        Msg::NextView => {
            model.view = model.view.next();
            Cmd::None
        }
        Msg::PrevView => {
            model.view = model.view.prev();
            Cmd::None
        }
        Msg::SwitchToView(view) => {
            model.view = view;
            Cmd::None
        }

        // === Navigation ===
        Msg::MoveUp => {
            match model.view {
                ViewKind::Versions => model.version_index = model.version_index.saturating_sub(1),
                ViewKind::Traces => model.trace_index = model.trace_index.saturating_sub(1),
                ViewKind::Timeline => model.cursor.focus_prev(),
            }
            Cmd::None
        }
        Msg::MoveDown => {
            match model.view {
                ViewKind::Versions => {
                    model.version_index =
                        clamp(model.version_index + 1, model.versions.versions().len())
                }
                ViewKind::Traces => {
                    model.trace_index = clamp(model.trace_index + 1, model.traces.len())
                }
                ViewKind::Timeline => model.cursor.focus_next(),
            }
            Cmd::None
        }
        Msg::Activate => match model.view {
            ViewKind::Versions => match model.versions.versions().get(model.version_index) {
                Some(v) => {
                    let version = v.version.clone();
                    model.select_version(&version)
                }
                None => Cmd::None,
            },
            ViewKind::Traces => match model.selected_trace() {
                Some(trace) => {
                    let id = trace.id.clone();
                    model.view = ViewKind::Timeline;
                    model.load_trace(id)
                }
                None => Cmd::None,
            },
            ViewKind::Timeline => {
                model.cursor.activate_focused();
                Cmd::None
            }
        },
        Msg::Refresh => match model.view {
            ViewKind::Versions => model.load_versions(true),
            ViewKind::Traces => model.load_traces(),
            ViewKind::Timeline => match model.detail.as_ref() {
                Some(detail) => {
                    let id = detail.trace.id.clone();
                    model.load_trace(id)
                }
                None => Cmd::None,
            },
        },

        // === Versions ===
        Msg::OpenCommitDialog => {
            model.dialog.open();
            Cmd::None
        }
        Msg::SyncSelected => {
            let selected = model.versions.selected().map(str::to_string);
            match selected {
                Some(version) => match model.versions.begin_sync(&version) {
                    Ok(request) => {
                        model.status_message = Some(format!("Syncing {} to main...", version));
                        Cmd::Request(Request::Sync(request))
                    }
                    Err(e) => {
                        model.status_message = Some(e.to_string());
                        Cmd::None
                    }
                },
                None => {
                    model.status_message = Some("No version selected to sync".to_string());
                    Cmd::None
                }
            }
        }

        // === Commit dialog ===
        Msg::DialogInput(c) => {
            model.dialog.push_char(c);
            Cmd::None
        }
        Msg::DialogBackspace => {
            model.dialog.backspace();
            Cmd::None
        }
        Msg::DialogToggleSync => {
            model.dialog.toggle_sync();
            Cmd::None
        }
        Msg::DialogSubmit => {
            let source = model.versions.selected().map(str::to_string);
            match model.dialog.submit(source.as_deref()) {
                Some(request) => match model.versions.begin_commit(
                    &request.source_version,
                    &request.commit_message,
                    request.sync_to_main,
                ) {
                    Ok(request) => Cmd::Request(Request::Commit(request)),
                    Err(e) => {
                        model.dialog.finish(&Err(e));
                        Cmd::None
                    }
                },
                None => Cmd::None,
            }
        }
        Msg::DialogCancel => {
            if !model.dialog.cancel() {
                model.status_message = Some("Commit in progress".to_string());
            }
            Cmd::None
        }

        // === Timeline ===
        Msg::NextTool => {
            let tools = model.selected_bar().map_or(0, |b| b.tools.len());
            model.cursor.next_tool(tools);
            Cmd::None
        }
        Msg::PrevTool => {
            let tools = model.selected_bar().map_or(0, |b| b.tools.len());
            model.cursor.prev_tool(tools);
            Cmd::None
        }
        Msg::Back => {
            model.cursor.back();
            Cmd::None
        }
        Msg::ClearSelection => {
            model.cursor.close();
            Cmd::None
        }

        // === Worker replies ===
        Msg::VersionsLoaded {
            seq,
            listing,
            preserve_selection,
        } => {
            if seq != model.versions_seq {
                debug!(seq, latest = model.versions_seq, "discarding stale version list");
                return (model, Cmd::None);
            }
            if listing.fallback {
                model.status_message =
                    Some("Backend unavailable: showing fallback versions".to_string());
            }
            let mut fetch = model.versions.apply_listing(listing, preserve_selection);
            if let Some(target) = model.pending_select.take() {
                if model.versions.listing().contains(&target) {
                    fetch = Some(target);
                }
            }
            model.sync_version_index();
            match fetch {
                Some(version) => model.select_version(&version),
                None => Cmd::None,
            }
        }
        Msg::ConfigLoaded { ticket, result } => {
            if model.versions.finish_select(&ticket, result) {
                if let Some(e) = model.versions.last_error() {
                    model.status_message = Some(e.to_string());
                }
            }
            Cmd::None
        }
        Msg::Committed(result) => {
            model.versions.finish_commit(&result);
            model.dialog.finish(&result);
            match result {
                Ok(committed) => {
                    model.status_message = Some(format!("Committed version {}", committed.version));
                    if !committed.version.is_empty() {
                        model.pending_select = Some(committed.version);
                    }
                    model.load_versions(true)
                }
                Err(e) => {
                    model.status_message = Some(format!("Failed to commit: {}", e));
                    Cmd::None
                }
            }
        }
        Msg::Synced { version, result } => {
            model.versions.finish_sync(&result);
            match result {
                Ok(()) => {
                    model.status_message = Some(format!("Synced {} to main config", version));
                    model.load_versions(true)
                }
                Err(e) => {
                    model.status_message = Some(format!("Failed to sync {}: {}", version, e));
                    Cmd::None
                }
            }
        }
        Msg::TracesLoaded { seq, result } => {
            if seq != model.traces_seq {
                debug!(seq, latest = model.traces_seq, "discarding stale trace list");
                return (model, Cmd::None);
            }
            model.traces_loading = false;
            match result {
                Ok(traces) => {
                    model.traces = traces;
                    model.traces_fallback = false;
                }
                Err(e) => {
                    warn!(error = %e, "trace list unavailable, using demo traces");
                    model.traces = fallback::demo_traces();
                    model.traces_fallback = true;
                    model.status_message =
                        Some("Backend unavailable: showing demo traces".to_string());
                }
            }
            model.trace_index = clamp(model.trace_index, model.traces.len());
            Cmd::None
        }
        Msg::TraceLoaded { seq, id, result } => {
            if seq != model.trace_seq {
                debug!(seq, latest = model.trace_seq, id = %id, "discarding stale trace");
                return (model, Cmd::None);
            }
            model.detail_loading = false;
            match result {
                Ok(detail) => model.set_detail(detail, false),
                Err(StudioError::Backend { status: 404, .. }) => {
                    model.detail = None;
                    model.timeline = None;
                    model.cursor = TimelineCursor::default();
                    model.status_message = Some(format!("Trace {} not found", id));
                }
                Err(e) => match fallback::demo_trace_detail(&id) {
                    Some(detail) if e.allows_fallback() => {
                        warn!(id = %id, error = %e, "trace unavailable, using demo data");
                        model.set_detail(detail, true);
                        model.status_message =
                            Some("Backend unavailable: showing demo trace".to_string());
                    }
                    _ => {
                        model.status_message = Some(format!("Failed to load trace {}: {}", id, e));
                    }
                },
            }
            Cmd::None
        }
    };
    (model, cmd)
}
