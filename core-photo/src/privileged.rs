//! Serialized access to the host's privileged shell.

use bridge_traits::privileged::PrivilegedShell;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A shell script run under `set -e`, so the first failing command fails
/// the whole script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivilegedScript {
    lines: Vec<String>,
}

/// Single-quote `value` for the shell.
fn quote(value: impl Display) -> String {
    format!("'{}'", value.to_string().replace('\'', r"'\''"))
}

impl PrivilegedScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chown(mut self, path: &Path, uid: u32) -> Self {
        self.lines
            .push(format!("chown {uid}:{uid} {}", quote(path.display())));
        self
    }

    pub fn chmod(mut self, path: &Path, mode: &str) -> Self {
        self.lines
            .push(format!("chmod {mode} {}", quote(path.display())));
        self
    }

    /// Same-filesystem `mv`, i.e. an atomic rename.
    pub fn rename(mut self, from: &Path, to: &Path) -> Self {
        self.lines.push(format!(
            "mv {} {}",
            quote(from.display()),
            quote(to.display())
        ));
        self
    }

    /// Signal a process to terminate. A process that already exited does
    /// not fail the script.
    pub fn kill(mut self, pid: u32) -> Self {
        self.lines.push(format!("kill {pid} || true"));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn render(&self) -> String {
        let mut script = String::from("set -e\n");
        for line in &self.lines {
            script.push_str(line);
            script.push('\n');
        }
        script
    }
}

/// Runs [`PrivilegedScript`]s one at a time.
///
/// The host shell is usually a single interpreter session, so concurrent
/// callers queue on an async mutex instead of interleaving scripts.
pub struct PrivilegedChannel {
    shell: Arc<dyn PrivilegedShell>,
    lock: Mutex<()>,
}

impl PrivilegedChannel {
    pub fn new(shell: Arc<dyn PrivilegedShell>) -> Self {
        Self {
            shell,
            lock: Mutex::new(()),
        }
    }

    pub async fn run(&self, script: &PrivilegedScript) -> bool {
        let _guard = self.lock.lock().await;
        let text = script.render();
        debug!(commands = script.lines.len(), "Running privileged script");
        let granted = self.shell.run_privileged(&text).await;
        debug!(granted, "Privileged script finished");
        granted
    }

    /// Whether the shell is granted at all, checked with an empty script.
    pub async fn check_access(&self) -> bool {
        self.run(&PrivilegedScript::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn substitution_script_layout() {
        let src = PathBuf::from("/tmp/pull-1.jpg");
        let dst = PathBuf::from("/data/provider/files/photos/17");
        let script = PrivilegedScript::new()
            .chown(&src, 10023)
            .chmod(&src, "600")
            .rename(&src, &dst)
            .kill(812);

        assert_eq!(
            script.render(),
            "set -e\n\
             chown 10023:10023 '/tmp/pull-1.jpg'\n\
             chmod 600 '/tmp/pull-1.jpg'\n\
             mv '/tmp/pull-1.jpg' '/data/provider/files/photos/17'\n\
             kill 812 || true\n"
        );
    }

    #[test]
    fn quotes_are_escaped() {
        let script = PrivilegedScript::new().chmod(Path::new("/tmp/o'brien.jpg"), "600");
        assert!(script.render().contains(r"'/tmp/o'\''brien.jpg'"));
    }

    struct CountingShell {
        running: AtomicBool,
        overlaps: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PrivilegedShell for CountingShell {
        async fn run_privileged(&self, _script: &str) -> bool {
            if self.running.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            self.running.store(false, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scripts_never_interleave() {
        let shell = Arc::new(CountingShell {
            running: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        });
        let channel = Arc::new(PrivilegedChannel::new(shell.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let channel = channel.clone();
            handles.push(tokio::spawn(async move { channel.check_access().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(shell.runs.load(Ordering::SeqCst), 8);
        assert_eq!(shell.overlaps.load(Ordering::SeqCst), 0);
    }
}
