//! Privileged shell backed by `su`

use async_trait::async_trait;
use bridge_traits::privileged::PrivilegedShell;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs scripts by piping them into an `su` interpreter.
///
/// The script is followed by `exit` so the interpreter terminates once the
/// script finishes. A script counts as successful when `su` exits with
/// status 0.
#[derive(Debug, Clone)]
pub struct SuShell {
    program: String,
}

impl SuShell {
    pub fn new() -> Self {
        Self::with_program("su")
    }

    /// Use a different interpreter binary, e.g. `sh` on test hosts.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, script: &str) -> std::io::Result<bool> {
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await?;
            stdin.write_all(b"\nexit\n").await?;
            stdin.flush().await?;
        }

        let status = child.wait().await?;
        debug!(program = %self.program, code = ?status.code(), "Privileged script finished");
        Ok(status.success())
    }
}

impl Default for SuShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrivilegedShell for SuShell {
    async fn run_privileged(&self, script: &str) -> bool {
        match self.run(script).await {
            Ok(success) => success,
            Err(e) => {
                warn!(program = %self.program, error = %e, "Privileged shell unavailable");
                false
            }
        }
    }
}
