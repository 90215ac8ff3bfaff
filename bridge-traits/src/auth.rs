//! Account Token Source

use async_trait::async_trait;

use crate::error::Result;

/// Supplies the service token for an account.
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    /// Current token for `account`, possibly cached.
    async fn auth_token(&self, account: &str) -> Result<String>;

    /// Drop a cached token so the next call fetches a fresh one.
    async fn invalidate_token(&self, _account: &str, _token: &str) -> Result<()> {
        Ok(())
    }
}
