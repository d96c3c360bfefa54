//! Agensight Studio - agent trace timelines and prompt/config versioning
//!
//! Inspect recorded multi-agent traces as Gantt-style timelines and manage the
//! versioned prompt/model configuration those agents run with.
//!
//! # Overview
//!
//! The studio talks to an agensight backend over HTTP. Reads (version lists,
//! traces) degrade to bundled fallback data when the backend is down; writes
//! (commit, sync, agent updates) never do.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`timeline`] | Trace spans → normalized lanes, bars and tick labels |
//! | [`selection`] | Span/tool selection state for the timeline |
//! | [`versions`] | Version listing, validation and the commit/sync workflow |
//! | [`commit_dialog`] | Commit dialog state machine |
//! | [`api`] | Blocking HTTP client for the backend |
//! | [`serve`] | Pass-through proxy server with fallback data |
//! | [`tui`] | Terminal dashboard |
//!
//! # Quick Start
//!
//! ```no_run
//! use agensight::{ApiClient, Config, VersionWorkflow};
//!
//! let client = ApiClient::from_config(&Config::default()).unwrap();
//! let mut workflow = VersionWorkflow::new(client);
//!
//! // Newest first; falls back to bundled versions if the backend is down
//! let listing = workflow.list_versions();
//! println!("{} versions (fallback: {})", listing.versions.len(), listing.fallback);
//!
//! // Create 1.0.x from the current version without touching main
//! workflow.commit("1.0.0", "Tighten summarizer prompt", false).unwrap();
//! ```

pub mod api;
pub mod commit_dialog;
pub mod config;
pub mod error;
pub mod fallback;
pub mod logging;
pub mod model;
pub mod selection;
pub mod serve;
pub mod timeline;
pub mod tui;
pub mod versions;

pub use api::{ApiClient, ConfigBackend};
pub use commit_dialog::{CommitDialog, DialogPhase};
pub use config::Config;
pub use error::{Result, StudioError};
pub use model::{
    AgentData, ConfigDocument, ConfigVersion, Span, ToolCall, Trace, TraceDetail, VersionResult,
};
pub use selection::Selection;
pub use timeline::{TimelineBuilder, TimelineModel};
pub use versions::{VersionListing, VersionState, VersionWorkflow};
