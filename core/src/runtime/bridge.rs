//! Stream bridge between a child interpreter and the session
//!
//! Child stdout lines become `output`, stderr lines become `error`. A stdout
//! line containing [`FRAME_MARKER`] is an input request: the marker is
//! followed by the JSON-encoded prompt, and any text before it is output the
//! program left on the open line (`print(..., end="")`).

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RuntimeError;
use crate::console::{echo_line, InputCoordinator, OutputSink};

pub const FRAME_MARKER: char = '\x1e';

/// How the streams ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pump {
    /// Both streams reached end of file
    Drained,
    Cancelled,
}

pub struct Bridge<'a, W> {
    sink: &'a OutputSink,
    input: &'a InputCoordinator,
    cancel: &'a CancellationToken,
    stdin: W,
}

impl<'a, W> Bridge<'a, W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        sink: &'a OutputSink,
        input: &'a InputCoordinator,
        cancel: &'a CancellationToken,
        stdin: W,
    ) -> Self {
        Self {
            sink,
            input,
            cancel,
            stdin,
        }
    }

    /// Forward both streams until they close or the run is cancelled
    pub async fn pump<O, E>(&mut self, stdout: O, stderr: E) -> Result<Pump, RuntimeError>
    where
        O: AsyncBufRead + Unpin,
        E: AsyncBufRead + Unpin,
    {
        let mut out_lines = stdout.lines();
        let mut err_lines = stderr.lines();
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(Pump::Cancelled),
                line = out_lines.next_line(), if out_open => match line? {
                    Some(line) => {
                        if !self.stdout_line(&line).await? {
                            return Ok(Pump::Cancelled);
                        }
                    }
                    None => out_open = false,
                },
                line = err_lines.next_line(), if err_open => match line? {
                    Some(line) => self.sink.error(line).await,
                    None => err_open = false,
                },
            }
        }

        Ok(Pump::Drained)
    }

    /// Returns false if cancelled while waiting for input
    async fn stdout_line(&mut self, line: &str) -> Result<bool, RuntimeError> {
        let Some((open_line, frame)) = line.split_once(FRAME_MARKER) else {
            self.sink.output(line).await;
            return Ok(true);
        };

        let prompt: String = serde_json::from_str(frame)?;
        let prompt = format!("{open_line}{prompt}");
        debug!(prompt = %prompt, "input frame");

        let answer = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.input.cancel().await;
                return Ok(false);
            }
            answer = self.input.request(prompt.as_str()) => answer?,
        };
        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        self.sink.input_echo(echo_line(&prompt, &answer)).await;
        self.stdin.write_all(answer.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(true)
    }

    pub fn into_stdin(self) -> W {
        self.stdin
    }
}
