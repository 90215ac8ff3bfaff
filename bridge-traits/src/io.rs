//! Boxed async I/O handles shared across bridge traits.

use tokio::io::{AsyncRead, AsyncWrite};

/// A readable byte stream handed across crate boundaries.
pub type DynAsyncRead = dyn AsyncRead + Send + Unpin;

/// A writable byte sink handed across crate boundaries.
pub type DynAsyncWrite = dyn AsyncWrite + Send + Unpin;

/// A request body that may be moved into an HTTP client's worker.
pub type UploadBody = Box<dyn AsyncRead + Send + Sync + Unpin>;
