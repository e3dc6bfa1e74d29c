//! Tests for batch input collection

use super::helpers::Harness;
use crate::interpreter::{run_program, Dialect};
use crate::types::{InputMode, OutputKind, RunOutcome};

const SURVEY: &str = r#"
name = input("Name: ")
print(f"Hello {name}")
age = int(input("Age: "))
print("In ten years:", age + 10)
"#;

#[tokio::test]
async fn test_batch_matches_per_call_transcript() {
    let per_call = Harness::new();
    per_call
        .run(SURVEY, Dialect::Python, InputMode::PerCall, &["Ada", "36"])
        .await;

    let batch = Harness::new();
    let outcome = batch
        .run(SURVEY, Dialect::Python, InputMode::Batch, &["Ada", "36"])
        .await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(batch.sink.lines().await, per_call.sink.lines().await);
}

#[tokio::test]
async fn test_batch_collects_before_any_output() {
    let harness = Harness::new();

    let observer = async {
        harness.input.next_prompt().await;
        let before_first = harness.sink.lines().await.len();
        harness.input.submit("Ada").await.expect("Submit failed");

        let second = harness.input.next_prompt().await;
        let before_second = harness.sink.lines().await.len();
        harness.input.submit("36").await.expect("Submit failed");
        (before_first, second, before_second)
    };

    let (outcome, (before_first, second, before_second)) = tokio::join!(
        run_program(SURVEY, Dialect::Python, harness.context(InputMode::Batch)),
        observer
    );

    assert_eq!(outcome.expect("Run failed"), RunOutcome::Completed);
    assert_eq!(before_first, 0);
    assert_eq!(second, "Age: ");
    // nothing executes until every value is in
    assert_eq!(before_second, 0);
}

#[tokio::test]
async fn test_batch_warning_lands_at_its_site() {
    let harness = Harness::new();
    harness
        .run(SURVEY, Dialect::Python, InputMode::Batch, &["Ada", "old"])
        .await;

    let lines = harness.sink.lines().await;
    let kinds: Vec<_> = lines.iter().map(|line| line.kind).collect();
    assert_eq!(
        kinds,
        vec![
            OutputKind::InputEcho,
            OutputKind::Output,
            OutputKind::InputEcho,
            OutputKind::Warning,
            OutputKind::Output,
            OutputKind::Info,
        ]
    );
    assert_eq!(lines[4].text, "In ten years: 10");
}

#[tokio::test]
async fn test_batch_java_prompts_from_literal_prints() {
    let source = r#"
System.out.print("Count: ");
int n = sc.nextInt();
System.out.println(n * 2);
"#;
    let harness = Harness::new();
    let prompt = async {
        let prompt = harness.input.next_prompt().await;
        harness.input.submit("21").await.expect("Submit failed");
        prompt
    };
    let (outcome, prompt) = tokio::join!(
        run_program(source, Dialect::Java, harness.context(InputMode::Batch)),
        prompt
    );

    assert_eq!(outcome.expect("Run failed"), RunOutcome::Completed);
    assert_eq!(prompt, "Count: ");
    let lines = harness.sink.lines().await;
    assert_eq!(lines[2].text, "Count: 21");
    assert_eq!(lines[3].text, "42");
}
