use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Remote photo vanished: {0}")]
    RemoteNotFound(String),

    #[error("Local photo of contact {contact_id} is not a decodable image")]
    CorruptLocalImage { contact_id: i64 },

    #[error("Album bootstrap failed: {0}")]
    AlbumBootstrap(String),

    #[error("Sync cancelled")]
    Cancelled,
}

impl SyncError {
    /// Errors that stop the whole run rather than one contact.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::AlbumBootstrap(_))
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth(_))
    }

    /// Classify a failure while locating the album; auth stays auth.
    pub(crate) fn bootstrap(err: BridgeError) -> Self {
        match SyncError::from(err) {
            SyncError::Auth(message) => SyncError::Auth(message),
            SyncError::Cancelled => SyncError::Cancelled,
            other => SyncError::AlbumBootstrap(other.to_string()),
        }
    }
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Unauthorized(message) => SyncError::Auth(message),
            BridgeError::NotFound(message) => SyncError::RemoteNotFound(message),
            BridgeError::Cancelled => SyncError::Cancelled,
            other => SyncError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
