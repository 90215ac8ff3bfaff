//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for contact photo sync:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus carrying sync progress and photo-changed notifications
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types,
//! logging conventions and event broadcasting.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
