//! Session
//!
//! Owns everything one editor shell talks to: the transcript sink, the input
//! coordinator, the lazily loaded external runtime and the active-run slot.
//! At most one run is active at a time; a run always releases the slot when
//! it settles, whatever the outcome.

use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::classify::{classify, ClassifiedSpan};
use crate::config::Config;
use crate::console::{InputCoordinator, InputError, OutputSink};
use crate::interpreter::{run_program, Dialect, ExecutionContext};
use crate::runtime::{ExternalRuntime, LoadedRuntime, RuntimeError};
use crate::types::{LanguageId, OutputLine, RunOutcome, RuntimeMode};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a run is already in progress")]
    RunInProgress,
}

pub struct Session {
    config: Config,
    sink: OutputSink,
    input: InputCoordinator,
    runtime: ExternalRuntime,
    /// Cancellation token of the active run
    active: Mutex<Option<CancellationToken>>,
}

impl Session {
    pub fn new(config: Config) -> Self {
        let runtime = ExternalRuntime::from_config(&config.runtime);
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: Config, runtime: ExternalRuntime) -> Self {
        Self {
            config,
            sink: OutputSink::new(),
            input: InputCoordinator::new(),
            runtime,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Classify `source` with the configured profile for `language`
    pub fn highlight(&self, source: &str, language: LanguageId) -> Vec<ClassifiedSpan> {
        classify(source, self.config.profile(language))
    }

    /// Run `source` to completion, cancellation or failure
    ///
    /// Every run-level problem is reported in the transcript and the outcome;
    /// `Err` means the session refused to start the run.
    #[instrument(skip(self, source), fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self, source: &str, language: LanguageId) -> Result<RunOutcome, SessionError> {
        let token = {
            let mut active = self.active.lock().await;
            if active.is_some() {
                return Err(SessionError::RunInProgress);
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };

        self.sink.clear().await;
        self.input.cancel().await;
        info!(bytes = source.len(), "run started");

        let outcome = self.dispatch(source, language, &token).await;

        let outcome = {
            let mut active = self.active.lock().await;
            *active = None;
            if token.is_cancelled() {
                self.sink.mark_stopped().await;
                RunOutcome::Stopped
            } else {
                outcome
            }
        };

        info!(outcome = ?outcome, "run finished");
        Ok(outcome)
    }

    async fn dispatch(&self, source: &str, language: LanguageId, token: &CancellationToken) -> RunOutcome {
        let external = language == LanguageId::Python
            && self.config.engine.python_runtime == RuntimeMode::External;
        if external {
            return self.runtime.run(source, &self.sink, &self.input, token).await;
        }

        let Some(dialect) = Dialect::for_language(language) else {
            // markup is handed back for the shell to embed
            return RunOutcome::Document(source.to_string());
        };

        let ctx = ExecutionContext {
            sink: &self.sink,
            input: &self.input,
            cancel: token,
            mode: self.config.engine.input_mode,
        };
        match run_program(source, dialect, ctx).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.sink.error(format!("Error: {err}")).await;
                RunOutcome::Failed(err.to_string())
            }
        }
    }

    /// Stop the active run, or mark the transcript stopped if none is active
    pub async fn stop(&self) {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(token) => {
                info!("stop requested");
                token.cancel();
                self.input.cancel().await;
            }
            None => {
                self.sink.mark_stopped().await;
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Answer the pending input request
    pub async fn submit(&self, text: &str) -> Result<(), InputError> {
        self.input.submit(text).await
    }

    pub async fn pending_prompt(&self) -> Option<String> {
        self.input.pending_prompt().await
    }

    /// Watch the pending prompt (`None` while no input is requested)
    pub fn prompts(&self) -> watch::Receiver<Option<String>> {
        self.input.prompts()
    }

    /// Transcript of the current (or last) run
    pub async fn lines(&self) -> Vec<OutputLine> {
        self.sink.lines().await
    }

    /// Live transcript lines as they are written
    pub fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.sink.subscribe()
    }

    /// Load the external runtime ahead of the first run
    pub async fn warm_up(&self) -> Result<&LoadedRuntime, RuntimeError> {
        self.runtime.warm_up().await
    }
}
