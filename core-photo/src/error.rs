use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Photo store error: {0}")]
    Store(#[from] BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No photo file allocated for contact {contact_id} after {waited:?}")]
    FileIdTimeout { contact_id: i64, waited: Duration },

    #[error("Photo file of contact {contact_id} not readable after {waited:?}")]
    FileUnreadable { contact_id: i64, waited: Duration },

    #[error("Photo write cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, PhotoError>;
