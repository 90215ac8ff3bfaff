//! # Contact Photo Sync
//!
//! Keeps address-book photos and a remote album in step, one contact at a
//! time.
//!
//! ## Overview
//!
//! Change detection is content addressed: each contact stores the hash of
//! its last synced photo and the remote version it was synced against. A
//! pass compares both with their current values and pushes, pulls or leaves
//! the contact alone. Local changes take priority when both sides moved.
//!
//! ## Components
//!
//! - **Content Hasher** (`hasher`): SHA-256 digests of photo bytes
//! - **Sync State** (`state`): the per-contact marker and its storage codec
//! - **Decision Policy** (`decision`): push, pull or nothing
//! - **Remote Index** (`remote_index`): album photos keyed by title, with
//!   adoption of photos uploaded before titles carried a prefix
//! - **Sync Engine** (`engine`): one pass over an account's contacts

pub mod decision;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod remote_index;
pub mod report;
pub mod state;

pub use decision::{decide, SyncAction};
pub use engine::PhotoSyncEngine;
pub use error::{Result, SyncError};
pub use hasher::{hash_bytes, ContentHash, ContentHasher, EMPTY_CONTENT_HASH};
pub use remote_index::RemoteIndex;
pub use report::SyncReport;
pub use state::{OverrideDirection, SyncState, OVERRIDE_PULL, OVERRIDE_PUSH};
