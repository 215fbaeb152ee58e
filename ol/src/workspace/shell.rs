//! Local `sh -c` execution

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::ShellExecutor;
use crate::outcome::Outcome;

/// Runs commands with the target root as working directory
pub struct LocalShell {
    root: PathBuf,
    max_timeout_secs: u64,
}

impl LocalShell {
    pub fn new(root: impl Into<PathBuf>, max_timeout_secs: u64) -> Self {
        let root = root.into();
        debug!(root = %root.display(), %max_timeout_secs, "LocalShell::new: called");
        Self { root, max_timeout_secs }
    }

    fn command(&self, cmd: &str) -> Command {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(cmd)
            .current_dir(&self.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl ShellExecutor for LocalShell {
    async fn execute(&self, cmd: &str, block: bool, timeout_secs: u64) -> Outcome {
        debug!(%cmd, %block, %timeout_secs, "LocalShell::execute: called");

        if !block {
            let mut command = self.command(cmd);
            command.stdout(Stdio::null()).stderr(Stdio::null());
            return match command.spawn() {
                Ok(child) => Outcome::success(format!(
                    "Command started in background (PID: {})",
                    child.id().map_or_else(|| "unknown".to_string(), |id| id.to_string())
                )),
                Err(e) => Outcome::error(format!("Error executing command '{}': {}", cmd, e)),
            };
        }

        let timeout_secs = timeout_secs.min(self.max_timeout_secs);
        let child = match self.command(cmd).kill_on_drop(true).spawn() {
            Ok(child) => child,
            Err(e) => return Outcome::error(format!("Error executing command '{}': {}", cmd, e)),
        };

        let output = match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Outcome::error(format!("Error executing command '{}': {}", cmd, e)),
            Err(_) => {
                warn!(%cmd, %timeout_secs, "Command timed out");
                return Outcome::error(format!("Command timed out after {} seconds: {}", timeout_secs, cmd));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut parts = Vec::new();
        if !stdout.is_empty() {
            parts.push(stdout.into_owned());
        }
        if !stderr.is_empty() {
            parts.push(format!("STDERR:\n{}", stderr));
        }
        let combined = if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        };

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Outcome::error(format!("Command failed with exit code {}:\n{}", code, combined));
        }

        Outcome::success(combined)
    }
}
