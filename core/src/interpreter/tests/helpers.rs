//! Test helpers for engine tests
//!
//! Runs a program against a fresh sink and coordinator, answering prompts
//! from a fixed list.

use tokio_util::sync::CancellationToken;

use crate::console::{InputCoordinator, OutputSink};
use crate::interpreter::{run_program, Dialect, ExecutionContext};
use crate::types::{InputMode, OutputKind, OutputLine, RunOutcome};

/// Session-like resources for one run
#[derive(Default)]
pub struct Harness {
    pub sink: OutputSink,
    pub input: InputCoordinator,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self, mode: InputMode) -> ExecutionContext<'_> {
        ExecutionContext {
            sink: &self.sink,
            input: &self.input,
            cancel: &self.cancel,
            mode,
        }
    }

    /// Run `source`, submitting `inputs` in order as prompts appear
    pub async fn run(
        &self,
        source: &str,
        dialect: Dialect,
        mode: InputMode,
        inputs: &[&str],
    ) -> RunOutcome {
        let feeder = async {
            for value in inputs {
                self.input.next_prompt().await;
                self.input.submit(value).await.expect("Submit failed");
            }
        };

        let (outcome, ()) = tokio::join!(run_program(source, dialect, self.context(mode)), feeder);
        outcome.expect("Run failed")
    }
}

/// Run without input and return the outcome and transcript
pub async fn run_python(source: &str) -> (RunOutcome, Vec<OutputLine>) {
    run_source(source, Dialect::Python, &[]).await
}

pub async fn run_java(source: &str) -> (RunOutcome, Vec<OutputLine>) {
    run_source(source, Dialect::Java, &[]).await
}

pub async fn run_source(
    source: &str,
    dialect: Dialect,
    inputs: &[&str],
) -> (RunOutcome, Vec<OutputLine>) {
    let harness = Harness::new();
    let outcome = harness.run(source, dialect, InputMode::PerCall, inputs).await;
    (outcome, harness.sink.lines().await)
}

/// Texts of the `output` lines only
pub fn outputs(lines: &[OutputLine]) -> Vec<&str> {
    lines
        .iter()
        .filter(|line| line.kind == OutputKind::Output)
        .map(|line| line.text.as_str())
        .collect()
}

/// Texts of the lines of one kind
pub fn of_kind(lines: &[OutputLine], kind: OutputKind) -> Vec<&str> {
    lines
        .iter()
        .filter(|line| line.kind == kind)
        .map(|line| line.text.as_str())
        .collect()
}
