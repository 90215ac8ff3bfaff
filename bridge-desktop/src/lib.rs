//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and rooted-device
//! hosts:
//! - `HttpClient` using `reqwest`, with streamed uploads and downloads
//! - `PrivilegedShell` piping scripts into `su`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SuShell};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new()?);
//! let shell = Arc::new(SuShell::new());
//! // Hand both to CoreConfig::builder()
//! ```

mod http;
mod shell;

pub use http::ReqwestHttpClient;
pub use shell::SuShell;
