//! Per-contact sync marker and its storage codec.
//!
//! The store keeps the marker as free text, `"<remoteVersion>|<localHash>"`.
//! Everything above this module works with [`SyncState`].

use serde::{Deserialize, Serialize};

use crate::hasher::ContentHash;

const SEPARATOR: char = '|';

/// Stored in place of the remote version to force a push on the next pass.
pub const OVERRIDE_PUSH: &str = "OVERRIDE_PUSH";
/// Stored in place of the local hash to force a pull on the next pass.
pub const OVERRIDE_PULL: &str = "OVERRIDE_PULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideDirection {
    ForcePush,
    ForcePull,
}

/// Last state known to be in sync on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Remote `updated` value, empty if never synced.
    pub remote_version: String,
    pub local_hash: ContentHash,
    pub override_direction: Option<OverrideDirection>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::never_synced()
    }
}

impl SyncState {
    pub fn never_synced() -> Self {
        Self {
            remote_version: String::new(),
            local_hash: ContentHash::empty(),
            override_direction: None,
        }
    }

    pub fn synced(remote_version: impl Into<String>, local_hash: ContentHash) -> Self {
        Self {
            remote_version: remote_version.into(),
            local_hash,
            override_direction: None,
        }
    }

    /// Request a one-shot forced direction for the next pass.
    pub fn with_override(mut self, direction: OverrideDirection) -> Self {
        self.override_direction = Some(direction);
        self
    }

    /// Remove and return the pending override.
    pub fn take_override(&mut self) -> Option<OverrideDirection> {
        self.override_direction.take()
    }

    /// Parse a stored token; a missing or blank token means never synced.
    ///
    /// The token is split on its last separator. A token without one is
    /// treated as a bare remote version with an unknown local hash. An
    /// override sentinel is honoured in either slot; the slot it occupies
    /// carries no value afterwards.
    pub fn decode(token: Option<&str>) -> Self {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Self::never_synced(),
        };

        let (remote, local) = match token.rsplit_once(SEPARATOR) {
            Some((remote, local)) => (remote, Some(local)),
            None => (token, None),
        };

        let mut override_direction = None;

        let remote_version = match sentinel(remote) {
            Some(direction) => {
                override_direction = Some(direction);
                String::new()
            }
            None => remote.to_string(),
        };

        let local_hash = match local {
            None => ContentHash::unknown(),
            Some("") => ContentHash::empty(),
            Some(local) => match sentinel(local) {
                Some(direction) => {
                    override_direction = Some(direction);
                    ContentHash::unknown()
                }
                None => ContentHash::from_stored(local),
            },
        };

        Self {
            remote_version,
            local_hash,
            override_direction,
        }
    }

    /// Render the storage token. A pending override replaces the slot it is
    /// keyed on.
    pub fn encode(&self) -> String {
        match self.override_direction {
            Some(OverrideDirection::ForcePush) => {
                format!("{OVERRIDE_PUSH}{SEPARATOR}{}", self.local_hash)
            }
            Some(OverrideDirection::ForcePull) => {
                format!("{}{SEPARATOR}{OVERRIDE_PULL}", self.remote_version)
            }
            None => format!("{}{SEPARATOR}{}", self.remote_version, self.local_hash),
        }
    }
}

fn sentinel(value: &str) -> Option<OverrideDirection> {
    match value {
        OVERRIDE_PUSH => Some(OverrideDirection::ForcePush),
        OVERRIDE_PULL => Some(OverrideDirection::ForcePull),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_bytes;

    #[test]
    fn missing_token_is_never_synced() {
        assert_eq!(SyncState::decode(None), SyncState::never_synced());
        assert_eq!(SyncState::decode(Some("")), SyncState::never_synced());
        assert_eq!(SyncState::decode(Some("  ")), SyncState::never_synced());
        assert_eq!(SyncState::never_synced().local_hash, ContentHash::empty());
    }

    #[test]
    fn synced_state_survives_storage() {
        let state = SyncState::synced("2012-06-01T10:00:00.000Z", hash_bytes(b"photo"));

        let token = state.encode();

        assert_eq!(token, format!("2012-06-01T10:00:00.000Z|{}", hash_bytes(b"photo")));
        assert_eq!(SyncState::decode(Some(&token)), state);
    }

    #[test]
    fn version_containing_separator_splits_on_last() {
        let state = SyncState::decode(Some("a|b|h1"));

        assert_eq!(state.remote_version, "a|b");
        assert_eq!(state.local_hash.as_str(), "h1");
    }

    #[test]
    fn token_without_separator_has_unknown_local_hash() {
        let state = SyncState::decode(Some("v1"));

        assert_eq!(state.remote_version, "v1");
        assert!(state.local_hash.is_unknown());
        assert_eq!(state.override_direction, None);
    }

    #[test]
    fn empty_local_slot_means_no_photo() {
        let state = SyncState::decode(Some("v1|"));

        assert_eq!(state.local_hash, ContentHash::empty());
    }

    #[test]
    fn push_override_keeps_local_hash() {
        let state = SyncState::synced("v1", hash_bytes(b"x"))
            .with_override(OverrideDirection::ForcePush);

        let token = state.encode();
        let decoded = SyncState::decode(Some(&token));

        assert_eq!(token, format!("OVERRIDE_PUSH|{}", hash_bytes(b"x")));
        assert_eq!(decoded.override_direction, Some(OverrideDirection::ForcePush));
        assert_eq!(decoded.remote_version, "");
        assert_eq!(decoded.local_hash, hash_bytes(b"x"));
    }

    #[test]
    fn pull_override_keeps_remote_version() {
        let state = SyncState::synced("v1", hash_bytes(b"x"))
            .with_override(OverrideDirection::ForcePull);

        let token = state.encode();
        let decoded = SyncState::decode(Some(&token));

        assert_eq!(token, "v1|OVERRIDE_PULL");
        assert_eq!(decoded.override_direction, Some(OverrideDirection::ForcePull));
        assert_eq!(decoded.remote_version, "v1");
        assert!(decoded.local_hash.is_unknown());
    }

    #[test]
    fn sentinels_are_recognised_in_either_slot() {
        let pull = SyncState::decode(Some("OVERRIDE_PULL|h1"));
        let push = SyncState::decode(Some("v1|OVERRIDE_PUSH"));

        assert_eq!(pull.override_direction, Some(OverrideDirection::ForcePull));
        assert_eq!(pull.local_hash.as_str(), "h1");
        assert_eq!(push.override_direction, Some(OverrideDirection::ForcePush));
        assert_eq!(push.remote_version, "v1");
    }

    #[test]
    fn take_override_fires_once() {
        let mut state = SyncState::never_synced().with_override(OverrideDirection::ForcePull);

        assert_eq!(state.take_override(), Some(OverrideDirection::ForcePull));
        assert_eq!(state.take_override(), None);
        assert_eq!(state.encode(), format!("|{}", ContentHash::empty()));
    }
}
