use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Sync already in progress for account {account}")]
    SyncInProgress { account: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
