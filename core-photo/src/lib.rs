//! # Contact Photo Writer
//!
//! Stores images as contact photos at their original quality.
//!
//! The address book's public write path recompresses every image it
//! receives. [`HighFidelityPhotoWriter`] still goes through that path, so the
//! store allocates a photo file for the contact, then replaces the allocated
//! file with the original bytes through the [`PrivilegedChannel`] and signals
//! the store's process to restart so it drops cached copies.
//!
//! ## Components
//!
//! - [`BoundedPoller`](poll::BoundedPoller) - waits for the store's
//!   eventually-consistent state within a fixed budget
//! - [`PrivilegedChannel`](privileged::PrivilegedChannel) - serializes
//!   scripts sent to the host's privileged shell
//! - [`HighFidelityPhotoWriter`](writer::HighFidelityPhotoWriter) - the
//!   write protocol itself

pub mod error;
pub mod poll;
pub mod privileged;
pub mod writer;

pub use error::{PhotoError, Result};
pub use poll::{BoundedPoller, PollOutcome, PollPolicy};
pub use privileged::{PrivilegedChannel, PrivilegedScript};
pub use writer::{HighFidelityPhotoWriter, WriteOutcome};
