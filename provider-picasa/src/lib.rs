//! # Picasa Web Albums Provider
//!
//! Implements [`PhotoAlbumProvider`](bridge_traits::album::PhotoAlbumProvider)
//! against the Picasa Web Albums data API.
//!
//! ## Overview
//!
//! This crate provides:
//! - ClientLogin authentication (`Authorization: GoogleLogin auth=<token>`)
//! - Album and photo feeds parsed by scoped pattern extraction over `<entry>`
//!   spans, with entity decoding of the five XML special characters
//! - Metadata-only and `multipart/related` photo uploads with a streamed body
//! - Streamed photo downloads
//!
//! Credential rejection (HTTP 403) surfaces as `BridgeError::Unauthorized`
//! from every operation and vanished content (HTTP 404 on download) as
//! `BridgeError::NotFound`.

pub mod client;
pub mod error;
pub mod multipart;
mod templates;
pub mod xml;

pub use client::PicasaClient;
pub use error::{PicasaError, Result};
