//! # Host Bridge Traits
//!
//! Capability traits that a host must implement for the contact photo sync
//! core.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry, streamed upload and download
//! - [`PhotoAlbumProvider`](album::PhotoAlbumProvider) - Remote album CRUD and binary transfer
//! - [`AuthTokenProvider`](auth::AuthTokenProvider) - Per-account service tokens
//!
//! ### Device Integration
//! - [`ContactPhotoStore`](contacts::ContactPhotoStore) - Address book photos and sync markers
//! - [`PrivilegedShell`](privileged::PrivilegedShell) - Elevated script execution
//!
//! ### Utilities
//! - [`Clock`](time::Clock) / [`Timer`](time::Timer) - Injectable time for deterministic tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! must report credential rejection as `Unauthorized` and vanished remote
//! content as `NotFound`; the sync engine relies on both distinctions.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! across async tasks.

pub mod album;
pub mod auth;
pub mod contacts;
pub mod error;
pub mod http;
pub mod io;
pub mod privileged;
pub mod time;

pub use error::BridgeError;

pub use album::{PhotoAlbumProvider, RemoteAlbum, RemotePhoto};
pub use auth::AuthTokenProvider;
pub use contacts::{ContactPhotoStore, ContactRecord, PhotoSink, StoreOwner};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse, RetryPolicy};
pub use io::{DynAsyncRead, DynAsyncWrite, UploadBody};
pub use privileged::{PrivilegedShell, UnprivilegedShell};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock, Timer, TokioTimer};
