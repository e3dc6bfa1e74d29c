//! Output Sink
//!
//! Ordered, append-only transcript of a run. Lines are also broadcast to live
//! subscribers so a shell can render them as they arrive.

use tokio::sync::{broadcast, Mutex};
use tracing::trace;

use crate::types::{OutputKind, OutputLine};

/// Terminal line appended when a run is stopped
pub const STOPPED_MARKER: &str = ">>> Execution stopped";

const LIVE_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct SinkState {
    lines: Vec<OutputLine>,
    /// Set once the stopped marker has been written; nothing follows it
    stopped: bool,
}

/// Append-only transcript shared by the engine, the runtime adapter and the shell
#[derive(Debug)]
pub struct OutputSink {
    state: Mutex<SinkState>,
    live: broadcast::Sender<OutputLine>,
}

impl OutputSink {
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(LIVE_CAPACITY);
        Self {
            state: Mutex::new(SinkState::default()),
            live,
        }
    }

    /// Append a line; ignored once the stopped marker is in place
    pub async fn push(&self, line: OutputLine) {
        let mut state = self.state.lock().await;
        if state.stopped {
            trace!(text = %line.text, "dropping line after stop marker");
            return;
        }
        let _ = self.live.send(line.clone());
        state.lines.push(line);
    }

    pub async fn info(&self, text: impl Into<String>) {
        self.push(OutputLine::info(text)).await;
    }

    pub async fn output(&self, text: impl Into<String>) {
        self.push(OutputLine::output(text)).await;
    }

    pub async fn error(&self, text: impl Into<String>) {
        self.push(OutputLine::error(text)).await;
    }

    pub async fn warning(&self, text: impl Into<String>) {
        self.push(OutputLine::warning(text)).await;
    }

    pub async fn input_echo(&self, text: impl Into<String>) {
        self.push(OutputLine::input_echo(text)).await;
    }

    /// Append the stopped marker unless it is already there
    ///
    /// Returns true if this call wrote the marker.
    pub async fn mark_stopped(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.stopped {
            return false;
        }
        let line = OutputLine::new(STOPPED_MARKER, OutputKind::Warning);
        let _ = self.live.send(line.clone());
        state.lines.push(line);
        state.stopped = true;
        true
    }

    /// Reset for a new run
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.lines.clear();
        state.stopped = false;
    }

    /// Snapshot of the transcript so far
    pub async fn lines(&self) -> Vec<OutputLine> {
        self.state.lock().await.lines.clone()
    }

    pub async fn is_stopped(&self) -> bool {
        self.state.lock().await.stopped
    }

    /// Receive lines as they are appended
    pub fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.live.subscribe()
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_keep_append_order() {
        let sink = OutputSink::new();
        sink.info("start").await;
        sink.output("a").await;
        sink.output("a").await;
        sink.warning("w").await;

        let lines = sink.lines().await;
        assert_eq!(
            lines,
            vec![
                OutputLine::info("start"),
                OutputLine::output("a"),
                OutputLine::output("a"),
                OutputLine::warning("w"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_marker_written_once_and_is_terminal() {
        let sink = OutputSink::new();
        sink.output("before").await;

        assert!(sink.mark_stopped().await);
        assert!(!sink.mark_stopped().await);
        sink.output("after").await;

        let lines = sink.lines().await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], OutputLine::warning(STOPPED_MARKER));
    }

    #[tokio::test]
    async fn test_clear_resets_stop_state() {
        let sink = OutputSink::new();
        sink.mark_stopped().await;
        sink.clear().await;

        assert!(sink.lines().await.is_empty());
        assert!(!sink.is_stopped().await);
        sink.output("fresh").await;
        assert_eq!(sink.lines().await, vec![OutputLine::output("fresh")]);
    }

    #[tokio::test]
    async fn test_subscribers_see_live_lines() {
        let sink = OutputSink::new();
        let mut rx = sink.subscribe();

        sink.output("one").await;
        sink.mark_stopped().await;

        assert_eq!(rx.recv().await.unwrap(), OutputLine::output("one"));
        assert_eq!(rx.recv().await.unwrap().kind, OutputKind::Warning);
    }
}
