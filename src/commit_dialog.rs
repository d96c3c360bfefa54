//! Commit dialog state machine
//!
//! ```text
//!   Closed --open--> Open --submit(valid)--> Submitting --ok--> Closed
//!                     ^  \--cancel--> Closed       |
//!                     +-------------- error -------+
//! ```
//!
//! Input is only accepted while `Open`. A submission that fails validation
//! stays `Open` with the error shown and never reaches the network.

use crate::error::Result;
use crate::model::{CommitRequest, VersionResult};
use crate::versions::validate_commit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogPhase {
    #[default]
    Closed,
    Open,
    Submitting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitDialog {
    phase: DialogPhase,
    message: String,
    sync_to_main: bool,
    error: Option<String>,
}

impl Default for CommitDialog {
    fn default() -> Self {
        Self {
            phase: DialogPhase::Closed,
            message: String::new(),
            sync_to_main: true,
            error: None,
        }
    }
}

impl CommitDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> DialogPhase {
        self.phase
    }

    pub fn is_visible(&self) -> bool {
        self.phase != DialogPhase::Closed
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == DialogPhase::Submitting
    }

    pub fn inputs_enabled(&self) -> bool {
        self.phase == DialogPhase::Open
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sync_to_main(&self) -> bool {
        self.sync_to_main
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Open with a blank message and sync enabled; no-op unless closed
    pub fn open(&mut self) {
        if self.phase == DialogPhase::Closed {
            *self = Self {
                phase: DialogPhase::Open,
                ..Self::default()
            };
        }
    }

    /// Close without committing; refused while a submission is pending
    pub fn cancel(&mut self) -> bool {
        match self.phase {
            DialogPhase::Open => {
                *self = Self::default();
                true
            }
            DialogPhase::Closed => true,
            DialogPhase::Submitting => false,
        }
    }

    pub fn push_char(&mut self, c: char) {
        if self.inputs_enabled() {
            self.message.push(c);
            self.error = None;
        }
    }

    pub fn backspace(&mut self) {
        if self.inputs_enabled() {
            self.message.pop();
        }
    }

    pub fn toggle_sync(&mut self) {
        if self.inputs_enabled() {
            self.sync_to_main = !self.sync_to_main;
        }
    }

    /// Validate and move to `Submitting`; returns the request to send
    pub fn submit(&mut self, source_version: Option<&str>) -> Option<CommitRequest> {
        if self.phase != DialogPhase::Open {
            return None;
        }
        match validate_commit(source_version.unwrap_or(""), &self.message, self.sync_to_main) {
            Ok(request) => {
                self.phase = DialogPhase::Submitting;
                self.error = None;
                Some(request)
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Apply the backend's answer to a pending submission
    pub fn finish(&mut self, result: &Result<VersionResult>) {
        if self.phase != DialogPhase::Submitting {
            return;
        }
        match result {
            Ok(_) => *self = Self::default(),
            Err(e) => {
                self.phase = DialogPhase::Open;
                self.error = Some(format!("Failed to commit: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StudioError;

    fn typed(text: &str) -> CommitDialog {
        let mut dialog = CommitDialog::new();
        dialog.open();
        text.chars().for_each(|c| dialog.push_char(c));
        dialog
    }

    fn committed() -> VersionResult {
        serde_json::from_value(serde_json::json!({"version": "1.0.3"})).unwrap()
    }

    #[test]
    fn test_open_defaults() {
        let dialog = typed("");
        assert_eq!(dialog.phase(), DialogPhase::Open);
        assert!(dialog.sync_to_main());
        assert_eq!(dialog.message(), "");
    }

    #[test]
    fn test_empty_message_stays_open() {
        let mut dialog = typed("  ");
        assert!(dialog.submit(Some("1.0.0")).is_none());
        assert_eq!(dialog.phase(), DialogPhase::Open);
        assert_eq!(dialog.error(), Some("Please enter a commit message"));
    }

    #[test]
    fn test_missing_source_version() {
        let mut dialog = typed("fix");
        assert!(dialog.submit(None).is_none());
        assert_eq!(dialog.error(), Some("No version selected to commit from"));
    }

    #[test]
    fn test_submit_locks_inputs_and_cancel() {
        let mut dialog = typed("Tune prompt");
        dialog.toggle_sync();
        let request = dialog.submit(Some("1.0.0")).unwrap();
        assert_eq!(request.commit_message, "Tune prompt");
        assert!(!request.sync_to_main);
        assert!(dialog.is_submitting());

        dialog.push_char('x');
        dialog.toggle_sync();
        assert_eq!(dialog.message(), "Tune prompt");
        assert!(!dialog.sync_to_main());
        assert!(!dialog.cancel());
        assert!(dialog.submit(Some("1.0.0")).is_none());
    }

    #[test]
    fn test_success_closes_and_resets() {
        let mut dialog = typed("msg");
        dialog.submit(Some("1.0.0"));
        dialog.finish(&Ok(committed()));
        assert_eq!(dialog.phase(), DialogPhase::Closed);
        dialog.open();
        assert_eq!(dialog.message(), "");
        assert!(dialog.sync_to_main());
    }

    #[test]
    fn test_failure_reopens_with_error() {
        let mut dialog = typed("msg");
        dialog.submit(Some("1.0.0"));
        dialog.finish(&Err(StudioError::Backend {
            status: 500,
            body: "boom".into(),
        }));
        assert_eq!(dialog.phase(), DialogPhase::Open);
        assert_eq!(dialog.message(), "msg");
        assert!(dialog.error().unwrap().contains("500"));
        assert!(dialog.cancel());
        assert!(!dialog.is_visible());
    }
}
