//! Direction policy for one contact.

use bridge_traits::album::RemotePhoto;
use core_runtime::events::ContactAction;
use serde::{Deserialize, Serialize};

use crate::hasher::ContentHash;
use crate::state::{OverrideDirection, SyncState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncAction {
    Push,
    Pull,
    None,
}

impl From<SyncAction> for ContactAction {
    fn from(action: SyncAction) -> Self {
        match action {
            SyncAction::Push => ContactAction::Push,
            SyncAction::Pull => ContactAction::Pull,
            SyncAction::None => ContactAction::None,
        }
    }
}

/// Choose what to do for a contact, in priority order:
///
/// 1. a pending override (a forced pull needs a remote entry)
/// 2. local content differs from the last synced hash
/// 3. the remote entry's version differs from the last synced version
///
/// Local changes are checked first, so when both sides changed the local
/// photo wins.
pub fn decide(
    state: &SyncState,
    local_hash: &ContentHash,
    remote: Option<&RemotePhoto>,
) -> SyncAction {
    match state.override_direction {
        Some(OverrideDirection::ForcePush) => return SyncAction::Push,
        Some(OverrideDirection::ForcePull) => {
            return if remote.is_some() {
                SyncAction::Pull
            } else {
                SyncAction::None
            };
        }
        None => {}
    }

    if *local_hash != state.local_hash {
        return SyncAction::Push;
    }

    match remote {
        Some(photo) if remote_version(photo) != state.remote_version => SyncAction::Pull,
        _ => SyncAction::None,
    }
}

/// Version string of a remote entry as stored in [`SyncState`].
pub fn remote_version(photo: &RemotePhoto) -> &str {
    photo.updated.as_deref().unwrap_or_default()
}
