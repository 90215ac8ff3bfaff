//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on
//! `contact-photo-sync-workspace` and enable `desktop-shims` to get the
//! reqwest HTTP client and `su`-backed privileged shell without wiring
//! `core-service` and `bridge-desktop` themselves.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreError, CoreService};
