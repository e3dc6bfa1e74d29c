//! Input Coordinator
//!
//! Bridges a "read a value" request inside a running program to a value the
//! human supplies later. The coordinator is a two-state machine:
//!
//! ```text
//! Idle --request(prompt)--> AwaitingInput --submit(value) | cancel()--> Idle
//! ```
//!
//! The suspended side holds a oneshot receiver; the pending side keeps the
//! matching sender in [`PendingInputRequest`]. Nothing here blocks a thread.

use tokio::sync::{oneshot, watch, Mutex};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// A request is already outstanding; only one may exist at a time
    #[error("an input request is already pending")]
    RequestPending,

    #[error("input must not be empty")]
    EmptySubmission,

    #[error("no input request is pending")]
    NotAwaiting,
}

/// The one outstanding request, with the continuation that resumes it
#[derive(Debug)]
pub struct PendingInputRequest {
    pub prompt: String,
    resolver: oneshot::Sender<String>,
}

#[derive(Debug, Default)]
enum InputState {
    #[default]
    Idle,
    AwaitingInput(PendingInputRequest),
}

#[derive(Debug)]
pub struct InputCoordinator {
    state: Mutex<InputState>,
    /// Mirrors the pending prompt so a shell can await it without polling
    prompts: watch::Sender<Option<String>>,
}

impl InputCoordinator {
    pub fn new() -> Self {
        let (prompts, _) = watch::channel(None);
        Self {
            state: Mutex::new(InputState::Idle),
            prompts,
        }
    }

    /// Suspend until the shell answers `prompt`
    ///
    /// Resolves with the trimmed submission, or with an empty string if the
    /// request is cancelled.
    pub async fn request(&self, prompt: impl Into<String>) -> Result<String, InputError> {
        let prompt = prompt.into();

        let receiver = {
            let mut state = self.state.lock().await;
            if let InputState::AwaitingInput(_) = *state {
                return Err(InputError::RequestPending);
            }

            let (resolver, receiver) = oneshot::channel();
            debug!(prompt = %prompt, "awaiting input");
            *state = InputState::AwaitingInput(PendingInputRequest {
                prompt: prompt.clone(),
                resolver,
            });
            self.prompts.send_replace(Some(prompt));
            receiver
        };

        // A dropped resolver means the request was torn down; unwind with the sentinel
        Ok(receiver.await.unwrap_or_default())
    }

    /// Answer the pending request
    ///
    /// The value is trimmed; an all-whitespace value is rejected and the
    /// request stays pending.
    pub async fn submit(&self, value: &str) -> Result<(), InputError> {
        let mut state = self.state.lock().await;
        if let InputState::Idle = *state {
            return Err(InputError::NotAwaiting);
        }

        let value = value.trim();
        if value.is_empty() {
            return Err(InputError::EmptySubmission);
        }

        if let InputState::AwaitingInput(pending) = std::mem::take(&mut *state) {
            self.prompts.send_replace(None);
            pending
                .resolver
                .send(value.to_string())
                .map_err(|_| InputError::NotAwaiting)?;
        }
        Ok(())
    }

    /// Resolve any pending request with an empty string and return to Idle
    ///
    /// Returns true if a request was pending.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.lock().await;
        match std::mem::take(&mut *state) {
            InputState::AwaitingInput(pending) => {
                debug!(prompt = %pending.prompt, "input request cancelled");
                self.prompts.send_replace(None);
                let _ = pending.resolver.send(String::new());
                true
            }
            InputState::Idle => false,
        }
    }

    pub async fn is_idle(&self) -> bool {
        matches!(*self.state.lock().await, InputState::Idle)
    }

    pub async fn pending_prompt(&self) -> Option<String> {
        match &*self.state.lock().await {
            InputState::AwaitingInput(pending) => Some(pending.prompt.clone()),
            InputState::Idle => None,
        }
    }

    /// Watch the pending prompt (`None` while idle)
    pub fn prompts(&self) -> watch::Receiver<Option<String>> {
        self.prompts.subscribe()
    }

    /// Wait until a request is pending and return its prompt
    pub async fn next_prompt(&self) -> String {
        let mut prompts = self.prompts();
        let prompt = match prompts.wait_for(Option::is_some).await {
            Ok(prompt) => prompt.clone().unwrap_or_default(),
            // sender lives as long as self, so the channel cannot close here
            Err(_) => String::new(),
        };
        prompt
    }
}

/// Transcript text pairing a prompt with its answer: `"<prompt> <value>"`,
/// without doubling a space the prompt already ends with
pub fn echo_line(prompt: &str, value: &str) -> String {
    if prompt.is_empty() {
        value.to_string()
    } else if prompt.ends_with(char::is_whitespace) {
        format!("{prompt}{value}")
    } else {
        format!("{prompt} {value}")
    }
}

impl Default for InputCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn test_request_suspends_until_submit() {
        let coordinator = Arc::new(InputCoordinator::new());
        let mut request = task::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request("Name: ").await }
        });

        assert_pending!(request.poll());
        assert_eq!(coordinator.pending_prompt().await.as_deref(), Some("Name: "));

        coordinator.submit("  Ada  ").await.unwrap();
        assert!(request.is_woken());
        assert_ready_eq!(request.poll(), Ok("Ada".to_string()));
        assert!(coordinator.is_idle().await);
    }

    #[tokio::test]
    async fn test_blank_submission_is_rejected() {
        let coordinator = Arc::new(InputCoordinator::new());
        let mut request = task::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request("Age: ").await }
        });
        assert_pending!(request.poll());

        assert_eq!(
            coordinator.submit("   ").await,
            Err(InputError::EmptySubmission)
        );
        assert!(!coordinator.is_idle().await);
        assert_pending!(request.poll());

        coordinator.submit("7").await.unwrap();
        assert_ready_eq!(request.poll(), Ok("7".to_string()));
    }

    #[tokio::test]
    async fn test_second_request_is_refused() {
        let coordinator = Arc::new(InputCoordinator::new());
        let mut first = task::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request("first").await }
        });
        assert_pending!(first.poll());

        assert_eq!(
            coordinator.request("second").await,
            Err(InputError::RequestPending)
        );
        assert_eq!(coordinator.pending_prompt().await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_cancel_resolves_with_empty_string() {
        let coordinator = Arc::new(InputCoordinator::new());
        let mut request = task::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request("x").await }
        });
        assert_pending!(request.poll());

        assert!(coordinator.cancel().await);
        assert_ready_eq!(request.poll(), Ok(String::new()));
        assert!(coordinator.is_idle().await);
        assert!(!coordinator.cancel().await);
    }

    #[tokio::test]
    async fn test_submit_while_idle() {
        let coordinator = InputCoordinator::new();
        assert_eq!(coordinator.submit("x").await, Err(InputError::NotAwaiting));
    }

    #[tokio::test]
    async fn test_next_prompt_follows_requests() {
        let coordinator = Arc::new(InputCoordinator::new());
        let handle = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.request("Enter: ").await }
        });

        assert_eq!(coordinator.next_prompt().await, "Enter: ");
        coordinator.submit("ok").await.unwrap();
        assert_eq!(handle.await.unwrap(), Ok("ok".to_string()));
        assert_eq!(*coordinator.prompts().borrow(), None);
    }
}
