//! Configuration version workflow
//!
//! Tracks the known versions, the selected version and its configuration
//! document, and drives list / select / commit / sync / update-agent against a
//! [`ConfigBackend`].
//!
//! The state half ([`VersionState`]) is pure: every network operation is split
//! into a `begin_*` step (validation + in-flight guard, returns the request to
//! send) and a `finish_*` step (applies the response). [`VersionWorkflow`]
//! chains both halves synchronously; the dashboard runs the request on a worker
//! thread instead and feeds the result back in.
//!
//! Config fetches carry a monotonically increasing sequence number. A response
//! whose ticket is older than the latest `begin_select` is discarded, so rapid
//! reselection can never leave the view showing a stale version's config.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::api::ConfigBackend;
use crate::error::{Result, StudioError};
use crate::fallback;
use crate::model::{
    AgentData, CommitRequest, ConfigDocument, ConfigVersion, SyncRequest, UpdateAgentRequest,
    VersionResult,
};

/// Pseudo-version the backend may list for the working copy
pub const CURRENT_PSEUDO_VERSION: &str = "current";

// =============================================================================
// Listing: filter, sort, fallback
// =============================================================================

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("static regex"))
}

/// Numeric `(major, minor, patch)` for a strict `X.Y.Z` string
pub fn parse_version(version: &str) -> Option<(u64, u64, u64)> {
    let caps = version_pattern().captures(version)?;
    let part = |i: usize| caps.get(i)?.as_str().parse::<u64>().ok();
    Some((part(1)?, part(2)?, part(3)?))
}

/// Numeric semver ordering; unparsable versions sort below parsable ones
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

/// Drop `"current"` and non-`X.Y.Z` entries, newest first
pub fn prepare_versions(raw: Vec<ConfigVersion>) -> Vec<ConfigVersion> {
    let mut versions: Vec<ConfigVersion> = raw
        .into_iter()
        .filter(|v| v.version != CURRENT_PSEUDO_VERSION && parse_version(&v.version).is_some())
        .collect();
    versions.sort_by(|a, b| compare_versions(&b.version, &a.version));
    versions
}

/// A version list plus where it came from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VersionListing {
    pub versions: Vec<ConfigVersion>,
    /// True when the backend failed and bundled data was substituted
    pub fallback: bool,
}

impl VersionListing {
    pub fn from_backend(raw: Vec<ConfigVersion>) -> Self {
        Self {
            versions: prepare_versions(raw),
            fallback: false,
        }
    }

    pub fn fallback() -> Self {
        Self {
            versions: prepare_versions(fallback::fallback_versions()),
            fallback: true,
        }
    }

    /// Interpret a fetch result, substituting fallback data on failure
    pub fn from_result(result: Result<Vec<ConfigVersion>>) -> Self {
        match result {
            Ok(raw) => Self::from_backend(raw),
            Err(e) => {
                warn!(error = %e, "version list unavailable, using fallback data");
                Self::fallback()
            }
        }
    }

    pub fn contains(&self, version: &str) -> bool {
        self.versions.iter().any(|v| v.version == version)
    }

    pub fn current(&self) -> Option<&ConfigVersion> {
        self.versions.iter().find(|v| v.is_current)
    }
}

/// Fetch, filter and sort the version list; never fails
pub fn list_versions<B: ConfigBackend + ?Sized>(backend: &B) -> VersionListing {
    VersionListing::from_result(backend.fetch_versions())
}

// =============================================================================
// Validation
// =============================================================================

/// Build a commit request, rejecting empty input before any network call
pub fn validate_commit(
    source_version: &str,
    message: &str,
    sync_to_main: bool,
) -> Result<CommitRequest> {
    if message.trim().is_empty() {
        return Err(StudioError::validation("Please enter a commit message"));
    }
    if source_version.trim().is_empty() {
        return Err(StudioError::validation("No version selected to commit from"));
    }
    Ok(CommitRequest {
        commit_message: message.trim().to_string(),
        sync_to_main,
        source_version: source_version.trim().to_string(),
    })
}

pub fn validate_sync(version: &str) -> Result<SyncRequest> {
    if version.trim().is_empty() {
        return Err(StudioError::validation("Missing required version parameter"));
    }
    Ok(SyncRequest {
        version: version.trim().to_string(),
    })
}

pub fn validate_update_agent(version: &str, agent: AgentData) -> Result<UpdateAgentRequest> {
    if version.trim().is_empty() {
        return Err(StudioError::validation("No version selected to update"));
    }
    if agent.name.trim().is_empty() {
        return Err(StudioError::validation("Missing required agent data"));
    }
    Ok(UpdateAgentRequest::in_place(version.trim(), agent))
}

// =============================================================================
// State
// =============================================================================

/// Classes of operation that may each have one request in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Loading,
    Committing,
    Syncing,
    UpdatingAgent,
}

impl Operation {
    fn busy_message(self) -> &'static str {
        match self {
            Operation::Loading => "A configuration load is already in progress",
            Operation::Committing => "A commit is already in progress",
            Operation::Syncing => "A sync is already in progress",
            Operation::UpdatingAgent => "An agent update is already in progress",
        }
    }
}

/// Identifies one config fetch; stale tickets are ignored on completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub seq: u64,
    pub version: String,
}

/// Result of an in-place agent edit
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub requested_version: String,
    pub result: VersionResult,
}

impl UpdateOutcome {
    /// Backend reports a different version than the one edited
    pub fn version_mismatch(&self) -> bool {
        self.result.version != self.requested_version
    }
}

/// Everything the UI knows about configuration versions
#[derive(Debug, Clone, Default)]
pub struct VersionState {
    listing: VersionListing,
    selected: Option<String>,
    config: Option<ConfigDocument>,
    config_version: Option<String>,
    loading: bool,
    committing: bool,
    syncing: bool,
    updating_agent: bool,
    next_seq: u64,
    latest_select: u64,
    last_error: Option<String>,
}

impl VersionState {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Getters ---

    pub fn versions(&self) -> &[ConfigVersion] {
        &self.listing.versions
    }

    pub fn listing(&self) -> &VersionListing {
        &self.listing
    }

    pub fn is_fallback(&self) -> bool {
        self.listing.fallback
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn config(&self) -> Option<&ConfigDocument> {
        self.config.as_ref()
    }

    /// Version the cached config document belongs to
    pub fn config_version(&self) -> Option<&str> {
        self.config_version.as_deref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        match op {
            Operation::Loading => self.loading,
            Operation::Committing => self.committing,
            Operation::Syncing => self.syncing,
            Operation::UpdatingAgent => self.updating_agent,
        }
    }

    /// Any mutation (commit / sync / agent update) pending
    pub fn mutation_pending(&self) -> bool {
        self.committing || self.syncing || self.updating_agent
    }

    fn set_busy(&mut self, op: Operation, busy: bool) {
        match op {
            Operation::Loading => self.loading = busy,
            Operation::Committing => self.committing = busy,
            Operation::Syncing => self.syncing = busy,
            Operation::UpdatingAgent => self.updating_agent = busy,
        }
    }

    fn claim(&mut self, op: Operation) -> Result<()> {
        if self.is_busy(op) {
            return Err(StudioError::validation(op.busy_message()));
        }
        self.set_busy(op, true);
        Ok(())
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    // --- Listing ---

    /// Replace the version list
    ///
    /// Keeps the selection when `preserve_selection` is set and it is still
    /// listed; otherwise selects the newest version. Returns the version whose
    /// config must now be fetched, if the selection changed.
    pub fn apply_listing(
        &mut self,
        listing: VersionListing,
        preserve_selection: bool,
    ) -> Option<String> {
        self.listing = listing;
        let keep = preserve_selection
            && self
                .selected
                .as_deref()
                .is_some_and(|s| self.listing.contains(s));
        if keep {
            return None;
        }
        let newest = self.listing.versions.first()?.version.clone();
        if self.selected.as_deref() == Some(newest.as_str()) {
            return None;
        }
        debug!(version = %newest, "selecting newest version");
        self.selected = Some(newest.clone());
        Some(newest)
    }

    // --- Select ---

    /// Mark `version` selected and issue a ticket for its config fetch
    pub fn begin_select(&mut self, version: &str) -> Ticket {
        self.next_seq += 1;
        self.latest_select = self.next_seq;
        self.selected = Some(version.to_string());
        self.loading = true;
        Ticket {
            seq: self.next_seq,
            version: version.to_string(),
        }
    }

    /// Apply a config fetch result; returns false for a stale ticket
    pub fn finish_select(&mut self, ticket: &Ticket, result: Result<ConfigDocument>) -> bool {
        match result {
            Ok(doc) => self.complete_select(ticket, Ok(doc)),
            Err(e) => self.complete_select(ticket, Err(&e)),
        }
    }

    fn complete_select(
        &mut self,
        ticket: &Ticket,
        result: std::result::Result<ConfigDocument, &StudioError>,
    ) -> bool {
        if ticket.seq != self.latest_select {
            debug!(
                version = %ticket.version,
                seq = ticket.seq,
                latest = self.latest_select,
                "discarding stale config response"
            );
            return false;
        }
        self.loading = false;
        match result {
            Ok(doc) => {
                self.config = Some(doc);
                self.config_version = Some(ticket.version.clone());
                self.last_error = None;
            }
            Err(e) => {
                warn!(version = %ticket.version, error = %e, "failed to load configuration");
                self.last_error = Some(format!("Failed to load configuration: {}", e));
            }
        }
        true
    }

    // --- Commit ---

    pub fn begin_commit(
        &mut self,
        source_version: &str,
        message: &str,
        sync_to_main: bool,
    ) -> Result<CommitRequest> {
        let request = validate_commit(source_version, message, sync_to_main)?;
        self.claim(Operation::Committing)?;
        Ok(request)
    }

    /// Clear the commit flag; cached versions are left for the caller to refresh
    pub fn finish_commit(&mut self, result: &Result<VersionResult>) {
        self.committing = false;
        self.record(result.as_ref().map(|_| ()), "commit");
    }

    // --- Sync ---

    pub fn begin_sync(&mut self, version: &str) -> Result<SyncRequest> {
        let request = validate_sync(version)?;
        self.claim(Operation::Syncing)?;
        Ok(request)
    }

    pub fn finish_sync<T>(&mut self, result: &Result<T>) {
        self.syncing = false;
        self.record(result.as_ref().map(|_| ()), "sync");
    }

    // --- Agent update ---

    pub fn begin_update_agent(
        &mut self,
        version: &str,
        agent: AgentData,
    ) -> Result<UpdateAgentRequest> {
        let request = validate_update_agent(version, agent)?;
        self.claim(Operation::UpdatingAgent)?;
        Ok(request)
    }

    pub fn finish_update_agent(&mut self, result: &Result<VersionResult>) {
        self.updating_agent = false;
        self.record(result.as_ref().map(|_| ()), "agent update");
    }

    fn record(&mut self, outcome: std::result::Result<(), &StudioError>, what: &str) {
        match outcome {
            Ok(()) => self.last_error = None,
            Err(e) => self.last_error = Some(format!("Failed to {}: {}", what, e)),
        }
    }
}

// =============================================================================
// Synchronous driver
// =============================================================================

/// Version workflow bound to a backend, one blocking call at a time
pub struct VersionWorkflow<B> {
    backend: B,
    state: VersionState,
}

impl<B: ConfigBackend> VersionWorkflow<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: VersionState::new(),
        }
    }

    pub fn state(&self) -> &VersionState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch the version list (fallback on failure) and cache it
    pub fn list_versions(&mut self) -> &VersionListing {
        self.state.loading = true;
        let listing = list_versions(&self.backend);
        self.state.loading = false;
        self.state.apply_listing(listing, true);
        self.state.listing()
    }

    /// Re-list, then load the config of whatever ends up selected
    pub fn refresh(&mut self, preserve_selection: bool) -> Result<()> {
        self.state.loading = true;
        let listing = list_versions(&self.backend);
        self.state.loading = false;
        if let Some(version) = self.state.apply_listing(listing, preserve_selection) {
            self.select_version(&version)?;
        }
        Ok(())
    }

    /// Select `version` and load its configuration document
    pub fn select_version(&mut self, version: &str) -> Result<&ConfigDocument> {
        let ticket = self.state.begin_select(version);
        match self.backend.fetch_config(Some(version)) {
            Ok(doc) => {
                self.state.complete_select(&ticket, Ok(doc));
                self.state
                    .config()
                    .ok_or_else(|| StudioError::validation("no configuration loaded"))
            }
            Err(e) => {
                self.state.complete_select(&ticket, Err(&e));
                Err(e)
            }
        }
    }

    /// Create a new version from `source_version`; cached state is not touched
    pub fn commit(
        &mut self,
        source_version: &str,
        message: &str,
        sync_to_main: bool,
    ) -> Result<VersionResult> {
        let request = self.state.begin_commit(source_version, message, sync_to_main)?;
        info!(
            source = %request.source_version,
            sync_to_main = request.sync_to_main,
            "committing new version"
        );
        let result = self.backend.commit(&request);
        self.state.finish_commit(&result);
        let committed = result?;
        info!(version = %committed.version, "commit created");
        Ok(committed)
    }

    /// Commit, then re-list and switch to the new version
    pub fn commit_and_reload(
        &mut self,
        source_version: &str,
        message: &str,
        sync_to_main: bool,
    ) -> Result<VersionResult> {
        let committed = self.commit(source_version, message, sync_to_main)?;
        let listing = list_versions(&self.backend);
        self.state.apply_listing(listing, true);
        if !committed.version.is_empty() {
            if let Err(e) = self.select_version(&committed.version) {
                warn!(version = %committed.version, error = %e, "could not load committed version");
            }
        }
        Ok(committed)
    }

    /// Promote an existing version to the main configuration
    pub fn sync(&mut self, version: &str) -> Result<()> {
        let request = self.state.begin_sync(version)?;
        let result = self.backend.sync(&request);
        self.state.finish_sync(&result);
        result?;
        info!(version = %request.version, "synced version to main config");
        self.state.loading = true;
        let listing = list_versions(&self.backend);
        self.state.loading = false;
        self.state.apply_listing(listing, true);
        Ok(())
    }

    /// Edit one agent in place within `version`
    pub fn update_agent(&mut self, version: &str, agent: AgentData) -> Result<UpdateOutcome> {
        let request = self.state.begin_update_agent(version, agent)?;
        let result = self.backend.update_agent(&request);
        self.state.finish_update_agent(&result);
        let outcome = UpdateOutcome {
            requested_version: request.version.clone(),
            result: result?,
        };
        if outcome.version_mismatch() {
            warn!(
                requested = %outcome.requested_version,
                returned = %outcome.result.version,
                "backend created a new version instead of updating in place"
            );
        }
        Ok(outcome)
    }

    /// Independent fetch of the main (unversioned) configuration
    pub fn fetch_main_config(&self) -> Result<ConfigDocument> {
        self.backend.fetch_config(None)
    }
}
