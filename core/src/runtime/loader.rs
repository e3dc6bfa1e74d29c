//! Backend loading

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::info;

use super::RuntimeError;

/// Prints the interpreter version, e.g. `3.12.1`
const VERSION_CHECK: &str = "import sys; print(sys.version.split()[0])";

/// A loaded interpreter, ready to run programs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRuntime {
    pub command: String,
    pub version: String,
}

pub type LoadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LoadedRuntime, RuntimeError>> + Send + 'a>>;

/// Loads the backend once per session
pub trait RuntimeLoader: Send + Sync {
    fn load(&self) -> LoadFuture<'_>;
}

/// Checks a local interpreter executable
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    command: String,
    timeout: Duration,
}

impl ProcessLoader {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl RuntimeLoader for ProcessLoader {
    fn load(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            let check = Command::new(&self.command)
                .arg("-c")
                .arg(VERSION_CHECK)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output();

            let output = tokio::time::timeout(self.timeout, check)
                .await
                .map_err(|_| RuntimeError::Timeout(self.timeout.as_secs()))?
                .map_err(|source| RuntimeError::Spawn {
                    command: self.command.clone(),
                    source,
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(RuntimeError::Check(stderr.trim().to_string()));
            }

            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            info!(command = %self.command, version = %version, "python runtime loaded");
            Ok(LoadedRuntime {
                command: self.command.clone(),
                version,
            })
        })
    }
}
