//! Privileged Execution Capability

use async_trait::async_trait;

/// Runs a shell script with elevated rights.
///
/// Returns `true` only when the interpreter was granted and the script
/// exited successfully. Implementations are not required to be reentrant;
/// callers serialize access.
#[async_trait]
pub trait PrivilegedShell: Send + Sync {
    async fn run_privileged(&self, script: &str) -> bool;
}

/// A shell that is never granted. Used when the host offers no elevation.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnprivilegedShell;

#[async_trait]
impl PrivilegedShell for UnprivilegedShell {
    async fn run_privileged(&self, _script: &str) -> bool {
        false
    }
}
