//! External Python runtime
//!
//! Runs Python source in a real interpreter process. The interpreter is
//! checked once per session on first use (or on [`ExternalRuntime::warm_up`]);
//! concurrent callers share the same initialization and a failed attempt is
//! retried by the next run.
//!
//! Each run spawns `python -u -c BOOTSTRAP` and writes the JSON-encoded source
//! as the first stdin line. The bootstrap replaces `builtins.input` with a
//! function that writes a framed prompt to stdout and reads the answer from
//! the following stdin lines, so input requests flow through the session's
//! coordinator like the pseudo engine's.

pub mod bridge;
pub mod loader;

#[cfg(test)]
mod tests;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::console::{InputCoordinator, InputError, OutputSink};
use crate::types::RunOutcome;

pub use bridge::{Bridge, Pump, FRAME_MARKER};
pub use loader::{LoadFuture, LoadedRuntime, ProcessLoader, RuntimeLoader};

pub const COMPLETION: &str = ">>> Execution Completed Successfully";
pub const RETRY_HINT: &str = ">>> Run again to retry loading the Python runtime";
pub const LOADING: &str = ">>> Loading Python runtime...";
pub const LOADED: &str = ">>> Python runtime loaded";

const BOOTSTRAP: &str = r#"
import builtins, json, sys

def _loom_input(prompt=""):
    sys.stdout.write("\x1e" + json.dumps(str(prompt)) + "\n")
    sys.stdout.flush()
    line = sys.stdin.readline()
    if not line:
        raise EOFError("EOF when reading a line")
    return line.rstrip("\n")

_source = json.loads(sys.stdin.readline())
builtins.input = _loom_input
sys.argv = ["main.py"]
exec(compile(_source, "main.py", "exec"), {"__name__": "__main__"})
"#;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("interpreter did not start within {0}s")]
    Timeout(u64),

    #[error("interpreter check failed: {0}")]
    Check(String),

    #[error("interpreter {0} pipe unavailable")]
    Pipe(&'static str),

    #[error("malformed input request: {0}")]
    Frame(#[from] serde_json::Error),

    #[error("failed to encode program source: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("I/O error talking to the interpreter: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Input(#[from] InputError),
}

pub struct ExternalRuntime {
    loader: Arc<dyn RuntimeLoader>,
    ready: OnceCell<LoadedRuntime>,
}

impl ExternalRuntime {
    pub fn new(loader: Arc<dyn RuntimeLoader>) -> Self {
        Self {
            loader,
            ready: OnceCell::new(),
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(Arc::new(ProcessLoader::new(
            config.python_command.clone(),
            Duration::from_secs(config.init_timeout_secs),
        )))
    }

    /// Load the interpreter if it is not loaded yet
    pub async fn warm_up(&self) -> Result<&LoadedRuntime, RuntimeError> {
        self.ready.get_or_try_init(|| self.loader.load()).await
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Run `source`, reporting every failure in the transcript
    pub async fn run(
        &self,
        source: &str,
        sink: &OutputSink,
        input: &InputCoordinator,
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let loading = !self.is_ready();
        if loading {
            sink.info(LOADING).await;
        }

        let runtime = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RunOutcome::Stopped,
            loaded = self.warm_up() => match loaded {
                Ok(runtime) => {
                    if loading {
                        sink.info(LOADED).await;
                    }
                    runtime
                }
                Err(err) => {
                    warn!(error = %err, "python runtime unavailable");
                    sink.error(format!("Error: Python runtime unavailable: {err}")).await;
                    sink.info(RETRY_HINT).await;
                    return RunOutcome::Failed(err.to_string());
                }
            },
        };

        match execute(runtime, source, sink, input, cancel).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "python run failed");
                sink.error(format!("Error: {err}")).await;
                RunOutcome::Failed(err.to_string())
            }
        }
    }
}

async fn execute(
    runtime: &LoadedRuntime,
    source: &str,
    sink: &OutputSink,
    input: &InputCoordinator,
    cancel: &CancellationToken,
) -> Result<RunOutcome, RuntimeError> {
    let mut child = Command::new(&runtime.command)
        .arg("-u")
        .arg("-c")
        .arg(BOOTSTRAP)
        .env("PYTHONIOENCODING", "utf-8")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RuntimeError::Spawn {
            command: runtime.command.clone(),
            source,
        })?;
    info!(pid = ?child.id(), version = %runtime.version, "python process started");

    let mut stdin = child.stdin.take().ok_or(RuntimeError::Pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or(RuntimeError::Pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or(RuntimeError::Pipe("stderr"))?;

    // argv is length-limited, so the program travels as the first stdin line
    let mut payload = serde_json::to_string(source).map_err(RuntimeError::Encode)?;
    payload.push('\n');
    stdin.write_all(payload.as_bytes()).await?;
    stdin.flush().await?;

    let mut bridge = Bridge::new(sink, input, cancel, stdin);
    let pumped = bridge
        .pump(BufReader::new(stdout), BufReader::new(stderr))
        .await?;
    drop(bridge);

    if pumped == Pump::Cancelled {
        terminate(&mut child).await;
        return Ok(RunOutcome::Stopped);
    }

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            terminate(&mut child).await;
            return Ok(RunOutcome::Stopped);
        }
        status = child.wait() => status?,
    };

    if status.success() {
        sink.info(COMPLETION).await;
        return Ok(RunOutcome::Completed);
    }

    let code = status
        .code()
        .map_or_else(|| "terminated by signal".to_string(), |code| code.to_string());
    let message = format!("Process exited with status {code}");
    sink.error(message.as_str()).await;
    Ok(RunOutcome::Failed(message))
}

async fn terminate(child: &mut Child) {
    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill python process");
    }
}
