use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Remote entries created by a push.
    pub inserted: u64,
    /// Remote entries replaced by a push, plus completed pulls.
    pub updated: u64,
    /// Remote entries removed because the local photo was removed.
    pub deleted: u64,
    /// Contacts left unsynced this pass.
    pub skipped: u64,
    pub io_errors: u64,
    pub auth_errors: u64,
    /// Contacts that needed no action.
    pub unchanged: u64,
    /// The run stopped on a cancellation request.
    pub cancelled: bool,
    /// The run stopped on a run-level error.
    pub aborted: bool,
}

impl SyncReport {
    pub fn processed(&self) -> u64 {
        self.inserted + self.updated + self.deleted + self.skipped + self.unchanged
    }

    /// Whether nothing changed and nothing failed.
    pub fn is_idle(&self) -> bool {
        self.inserted == 0
            && self.updated == 0
            && self.deleted == 0
            && self.skipped == 0
            && !self.has_errors()
    }

    pub fn has_errors(&self) -> bool {
        self.io_errors > 0 || self.auth_errors > 0
    }

    /// Count a failure that skipped one contact.
    pub(crate) fn record_contact_error(&mut self, err: &SyncError) {
        self.skipped += 1;
        match err {
            SyncError::Auth(_) => self.auth_errors += 1,
            SyncError::Io(_) | SyncError::AlbumBootstrap(_) => self.io_errors += 1,
            SyncError::RemoteNotFound(_)
            | SyncError::CorruptLocalImage { .. }
            | SyncError::Cancelled => {}
        }
    }

    /// Count a failure that stopped the run.
    pub(crate) fn record_run_error(&mut self, err: &SyncError) {
        self.aborted = true;
        if err.is_auth() {
            self.auth_errors += 1;
        } else {
            self.io_errors += 1;
        }
    }
}
