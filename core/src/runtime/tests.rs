use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_pending, assert_ready, task};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::console::{InputCoordinator, OutputSink};
use crate::types::{OutputKind, OutputLine};

/// Counts loads; fails the first `failures` attempts
struct CountingLoader {
    loads: AtomicUsize,
    failures: usize,
}

impl CountingLoader {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
            failures,
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl RuntimeLoader for CountingLoader {
    fn load(&self) -> LoadFuture<'_> {
        Box::pin(async move {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            // give a concurrent caller the chance to race us
            tokio::task::yield_now().await;
            if attempt < self.failures {
                return Err(RuntimeError::Check("not installed".to_string()));
            }
            Ok(LoadedRuntime {
                command: "python3".to_string(),
                version: "3.12.0".to_string(),
            })
        })
    }
}

/* ===================== Initialization ===================== */

#[tokio::test]
async fn test_concurrent_warm_up_loads_once() {
    let loader = CountingLoader::new(0);
    let runtime = ExternalRuntime::new(loader.clone());

    let (first, second) = tokio::join!(runtime.warm_up(), runtime.warm_up());
    let first = first.expect("First init failed");
    let second = second.expect("Second init failed");

    assert_eq!(loader.loads(), 1);
    assert!(std::ptr::eq(first, second));
    assert!(runtime.is_ready());

    runtime.warm_up().await.expect("Third init failed");
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn test_failed_init_is_retried() {
    let loader = CountingLoader::new(1);
    let runtime = ExternalRuntime::new(loader.clone());

    assert!(runtime.warm_up().await.is_err());
    assert!(!runtime.is_ready());

    let loaded = runtime.warm_up().await.expect("Retry failed");
    assert_eq!(loaded.version, "3.12.0");
    assert_eq!(loader.loads(), 2);
}

#[tokio::test]
async fn test_init_failure_reported_in_transcript() {
    let runtime = ExternalRuntime::new(CountingLoader::new(usize::MAX));
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let outcome = runtime.run("print(1)", &sink, &input, &cancel).await;

    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(
        sink.lines().await,
        vec![
            OutputLine::info(LOADING),
            OutputLine::error("Error: Python runtime unavailable: interpreter check failed: not installed"),
            OutputLine::info(RETRY_HINT),
        ]
    );
}

#[tokio::test]
async fn test_missing_interpreter_is_a_spawn_error() {
    let loader = ProcessLoader::new("loom-no-such-python", Duration::from_secs(5));
    let result = loader.load().await;
    assert!(matches!(result, Err(RuntimeError::Spawn { .. })));
}

/* ===================== Bridge ===================== */

#[tokio::test]
async fn test_bridge_routes_streams() {
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let stdout: &[u8] = b"hello\n\x1e\"Name: \"\nHi Ada\n";
    let stderr: &[u8] = b"Traceback\n";
    let mut bridge = Bridge::new(&sink, &input, &cancel, Vec::new());

    let answer = async {
        let prompt = input.next_prompt().await;
        input.submit("Ada").await.expect("Submit failed");
        prompt
    };
    let (pumped, prompt) = tokio::join!(bridge.pump(stdout, stderr), answer);

    assert_eq!(pumped.expect("Pump failed"), Pump::Drained);
    assert_eq!(prompt, "Name: ");
    assert_eq!(bridge.into_stdin(), b"Ada\n".to_vec());

    let lines = sink.lines().await;
    let of = |kind| {
        lines
            .iter()
            .filter(|line| line.kind == kind)
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
    };
    assert_eq!(of(OutputKind::Output), vec!["hello", "Hi Ada"]);
    assert_eq!(of(OutputKind::InputEcho), vec!["Name: Ada"]);
    assert_eq!(of(OutputKind::Error), vec!["Traceback"]);
}

#[tokio::test]
async fn test_bridge_prefixes_open_line_to_prompt() {
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let stdout: &[u8] = b"Age? \x1e\"\"\n";
    let mut bridge = Bridge::new(&sink, &input, &cancel, Vec::new());

    let answer = async {
        let prompt = input.next_prompt().await;
        input.submit("7").await.expect("Submit failed");
        prompt
    };
    let (pumped, prompt) = tokio::join!(bridge.pump(stdout, &b""[..]), answer);

    assert_eq!(pumped.expect("Pump failed"), Pump::Drained);
    assert_eq!(prompt, "Age? ");
    assert_eq!(sink.lines().await, vec![OutputLine::input_echo("Age? 7")]);
}

#[tokio::test]
async fn test_bridge_cancel_while_awaiting_input() {
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let stdout: &[u8] = b"\x1e\"x: \"\nnever\n";
    let mut bridge = Bridge::new(&sink, &input, &cancel, Vec::new());

    let mut pump = task::spawn(bridge.pump(stdout, &b""[..]));
    assert_pending!(pump.poll());
    assert_eq!(input.pending_prompt().await, Some("x: ".to_string()));

    cancel.cancel();
    let pumped = assert_ready!(pump.poll()).expect("Pump failed");
    drop(pump);

    assert_eq!(pumped, Pump::Cancelled);
    assert!(input.is_idle().await);
    assert!(sink.lines().await.is_empty());
    assert!(bridge.into_stdin().is_empty());
}

#[tokio::test]
async fn test_bridge_rejects_malformed_frame() {
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let stdout: &[u8] = b"\x1enot json\n";
    let mut bridge = Bridge::new(&sink, &input, &cancel, Vec::new());
    let result = bridge.pump(stdout, &b""[..]).await;
    assert!(matches!(result, Err(RuntimeError::Frame(_))));
}

/* ===================== Interpreter process ===================== */

/// A runtime backed by the local `python3`, or `None` when it is not installed
async fn local_python() -> Option<ExternalRuntime> {
    let runtime = ExternalRuntime::from_config(&RuntimeConfig::default());
    match runtime.warm_up().await {
        Ok(_) => Some(runtime),
        Err(err) => {
            eprintln!("skipping: python3 unavailable ({err})");
            None
        }
    }
}

#[tokio::test]
async fn test_process_success_appends_completion() {
    let Some(runtime) = local_python().await else {
        return;
    };
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let outcome = runtime
        .run("print('hi')\nprint('héllo')", &sink, &input, &cancel)
        .await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        sink.lines().await,
        vec![
            OutputLine::output("hi"),
            OutputLine::output("héllo"),
            OutputLine::info(COMPLETION),
        ]
    );
}

#[tokio::test]
async fn test_process_input_and_exit_status() {
    let Some(runtime) = local_python().await else {
        return;
    };
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();
    let source = "name = input('Name: ')\nprint('hi', name)\nimport sys\nsys.exit(3)";

    let answer = async {
        input.next_prompt().await;
        input.submit("Ada").await.expect("Submit failed");
    };
    let (outcome, ()) = tokio::join!(runtime.run(source, &sink, &input, &cancel), answer);

    assert_eq!(
        outcome,
        RunOutcome::Failed("Process exited with status 3".to_string())
    );
    assert_eq!(
        sink.lines().await,
        vec![
            OutputLine::input_echo("Name: Ada"),
            OutputLine::output("hi Ada"),
            OutputLine::error("Process exited with status 3"),
        ]
    );
}

#[tokio::test]
async fn test_process_stop_while_awaiting_input() {
    let Some(runtime) = local_python().await else {
        return;
    };
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let stop = async {
        input.next_prompt().await;
        cancel.cancel();
    };
    let (outcome, ()) = tokio::join!(
        runtime.run("x = input('x: ')\nprint('never')", &sink, &input, &cancel),
        stop
    );

    assert_eq!(outcome, RunOutcome::Stopped);
    assert!(input.is_idle().await);
    assert!(sink.lines().await.is_empty());
}

#[tokio::test]
async fn test_process_runs_source_larger_than_an_argument() {
    let Some(runtime) = local_python().await else {
        return;
    };
    let sink = OutputSink::new();
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    // well past the 128 KiB single-argument limit
    let mut source = "x = 1\n".repeat(40_000);
    source.push_str("print(x + 1)\n");

    let outcome = runtime.run(&source, &sink, &input, &cancel).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(
        sink.lines().await,
        vec![OutputLine::output("2"), OutputLine::info(COMPLETION)]
    );
}

#[tokio::test]
async fn test_first_run_reports_loading() {
    if local_python().await.is_none() {
        return;
    }
    let runtime = ExternalRuntime::from_config(&RuntimeConfig::default());
    let input = InputCoordinator::new();
    let cancel = CancellationToken::new();

    let first = OutputSink::new();
    runtime.run("print('a')", &first, &input, &cancel).await;
    assert_eq!(
        first.lines().await,
        vec![
            OutputLine::info(LOADING),
            OutputLine::info(LOADED),
            OutputLine::output("a"),
            OutputLine::info(COMPLETION),
        ]
    );

    let second = OutputSink::new();
    runtime.run("print('a')", &second, &input, &cancel).await;
    assert_eq!(
        second.lines().await,
        vec![OutputLine::output("a"), OutputLine::info(COMPLETION)]
    );
}
