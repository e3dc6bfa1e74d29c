use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::warn;

use crate::classify::{Category, ClassifiedSpan, LanguageProfile};
use crate::config::Config;
use crate::console::InputError;
use crate::session::Session;
use crate::types::{InputMode, LanguageId, OutputKind, OutputLine, RunOutcome, RuntimeMode};

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Loom - highlight and preview-run Python, Java and HTML sources", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a source file with syntax highlighting
    Highlight {
        /// Source file
        file: PathBuf,

        /// Language (inferred from the file extension if omitted)
        #[arg(short = 'l', long = "language")]
        language: Option<String>,

        /// Print classified spans as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a source file; input is read from stdin, Ctrl-C stops the run
    Run {
        /// Source file
        file: PathBuf,

        /// Language (inferred from the file extension if omitted)
        #[arg(short = 'l', long = "language")]
        language: Option<String>,

        /// Collect every input value before running
        #[arg(long)]
        batch: bool,

        /// Run Python in a real interpreter process
        #[arg(long)]
        external: bool,

        /// Print transcript lines as JSON objects
        #[arg(long)]
        json: bool,
    },

    /// List supported languages
    Languages,

    /// Print the effective configuration
    Config,
}

/// Run the CLI with arguments from the process
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let builder = Config::builder().config_path(cli.config.map(PathBuf::from));

    match cli.command {
        Commands::Highlight {
            file,
            language,
            json,
        } => {
            let config = builder.build().context("Failed to load configuration")?;
            let source = read_source(&file).await?;
            let language = resolve_language(&file, language.as_deref())?;
            let spans = crate::classify::classify(&source, config.profile(language));

            if json {
                println!("{}", serde_json::to_string_pretty(&spans)?);
            } else {
                let painted: String = spans.iter().map(paint).collect();
                print!("{painted}");
                if !painted.ends_with('\n') {
                    println!();
                }
            }
        }

        Commands::Run {
            file,
            language,
            batch,
            external,
            json,
        } => {
            let config = builder
                .input_mode(batch.then_some(InputMode::Batch))
                .python_runtime(external.then_some(RuntimeMode::External))
                .build()
                .context("Failed to load configuration")?;
            let source = read_source(&file).await?;
            let language = resolve_language(&file, language.as_deref())?;

            let session = Session::new(config);
            let outcome = run_interactive(&session, &source, language, json).await?;
            report_outcome(&outcome, json)?;
        }

        Commands::Languages => {
            for language in LanguageId::ALL {
                let profile = LanguageProfile::defaults(language);
                println!(
                    "{:<8} {} keywords, {} builtins, comments: {}",
                    language.as_str(),
                    profile.keywords.len(),
                    profile.builtins.len(),
                    describe_comments(profile),
                );
            }
        }

        Commands::Config => {
            let config = builder.build().context("Failed to load configuration")?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn read_source(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

fn resolve_language(file: &Path, flag: Option<&str>) -> Result<LanguageId> {
    match flag {
        Some(name) => Ok(name.parse::<LanguageId>()?),
        None => LanguageId::from_path(file).ok_or_else(|| {
            anyhow!(
                "Cannot infer the language of {}; pass --language",
                file.display()
            )
        }),
    }
}

/* ===================== Run ===================== */

/// Drive a run, printing lines as they arrive and answering prompts from stdin
async fn run_interactive(
    session: &Session,
    source: &str,
    language: LanguageId,
    json: bool,
) -> Result<RunOutcome> {
    let mut live = session.subscribe();
    let mut prompts = session.prompts();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let echo_answers = !std::io::stdin().is_terminal();

    let run = session.run(source, language);
    tokio::pin!(run);

    let outcome = loop {
        tokio::select! {
            outcome = &mut run => break outcome?,
            line = live.recv() => match line {
                Ok(line) => print_line(&line, json, echo_answers),
                Err(err) => warn!(error = %err, "transcript receiver lagged"),
            },
            changed = prompts.changed() => {
                if changed.is_err() {
                    continue;
                }
                let prompt = prompts.borrow_and_update().clone();
                if let Some(prompt) = prompt {
                    drain(&mut live, json, echo_answers);
                    answer_prompt(session, &prompt, &mut stdin, json).await?;
                }
            },
            _ = tokio::signal::ctrl_c() => session.stop().await,
        }
    };

    drain(&mut live, json, echo_answers);
    Ok(outcome)
}

/// Read lines from stdin until one is accepted; blank answers re-prompt
async fn answer_prompt<R>(
    session: &Session,
    prompt: &str,
    stdin: &mut Lines<R>,
    json: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        show_prompt(prompt, json)?;
        let answer = tokio::select! {
            answer = stdin.next_line() => answer?,
            _ = tokio::signal::ctrl_c() => {
                session.stop().await;
                return Ok(());
            }
        };

        let Some(answer) = answer else {
            // stdin closed: nothing can answer
            session.stop().await;
            return Ok(());
        };
        match session.submit(&answer).await {
            Ok(()) => return Ok(()),
            Err(InputError::EmptySubmission) => continue,
            Err(err) => {
                warn!(error = %err, "submission rejected");
                return Ok(());
            }
        }
    }
}

fn drain(live: &mut tokio::sync::broadcast::Receiver<OutputLine>, json: bool, echo_answers: bool) {
    loop {
        match live.try_recv() {
            Ok(line) => print_line(&line, json, echo_answers),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "transcript receiver lagged"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn print_line(line: &OutputLine, json: bool, echo_answers: bool) {
    if json {
        match serde_json::to_string(line) {
            Ok(text) => println!("{text}"),
            Err(err) => warn!(error = %err, "failed to encode line"),
        }
        return;
    }

    match line.kind {
        OutputKind::Error => eprintln!("{}", line.text),
        // the terminal already shows what was typed
        OutputKind::InputEcho if !echo_answers => {}
        _ => println!("{}", line.text),
    }
}

fn show_prompt(prompt: &str, json: bool) -> Result<()> {
    let mut stdout = std::io::stdout();
    if json {
        writeln!(stdout, "{}", json!({ "prompt": prompt }))?;
    } else {
        write!(stdout, "{prompt}")?;
    }
    stdout.flush()?;
    Ok(())
}

fn report_outcome(outcome: &RunOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(outcome)?);
        return Ok(());
    }

    match outcome {
        RunOutcome::Completed | RunOutcome::Stopped => Ok(()),
        RunOutcome::Document(markup) => {
            print!("{markup}");
            Ok(())
        }
        RunOutcome::Failed(reason) => bail!("Run failed: {reason}"),
    }
}

/* ===================== Highlight ===================== */

fn paint(span: &ClassifiedSpan) -> String {
    let color = match span.category {
        Category::Keyword => "35",
        Category::Builtin => "36",
        Category::String => "32",
        Category::Number => "33",
        Category::Comment => "90",
        Category::FunctionName => "34",
        Category::Plain => return span.text.clone(),
    };
    format!("\x1b[{color}m{}\x1b[0m", span.text)
}

fn describe_comments(profile: &LanguageProfile) -> String {
    let mut forms: Vec<String> = profile.line_comment.iter().cloned().collect();
    forms.extend(
        profile
            .block_comments
            .iter()
            .map(|block| format!("{} ... {}", block.open, block.close)),
    );
    if forms.is_empty() {
        "none".to_string()
    } else {
        forms.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::parse_from(["loom", "run", "main.py", "--batch", "--json"]);
        match cli.command {
            Commands::Run {
                file,
                language,
                batch,
                external,
                json,
            } => {
                assert_eq!(file, PathBuf::from("main.py"));
                assert_eq!(language, None);
                assert!(batch);
                assert!(!external);
                assert!(json);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_resolve_language() {
        let path = Path::new("Main.java");
        assert_eq!(resolve_language(path, None).unwrap(), LanguageId::Java);
        assert_eq!(resolve_language(path, Some("py")).unwrap(), LanguageId::Python);
        assert!(resolve_language(Path::new("notes.txt"), None).is_err());
        assert!(resolve_language(path, Some("cobol")).is_err());
    }

    #[test]
    fn test_paint_leaves_plain_text_alone() {
        let plain = ClassifiedSpan {
            text: "x = ".to_string(),
            category: Category::Plain,
            start: 0,
            end: 4,
        };
        assert_eq!(paint(&plain), "x = ");

        let keyword = ClassifiedSpan {
            text: "def".to_string(),
            category: Category::Keyword,
            start: 0,
            end: 3,
        };
        assert_eq!(paint(&keyword), "\x1b[35mdef\x1b[0m");
    }

    #[test]
    fn test_describe_comments() {
        assert_eq!(
            describe_comments(LanguageProfile::defaults(LanguageId::Html)),
            "<!-- ... -->"
        );
        assert!(describe_comments(LanguageProfile::defaults(LanguageId::Java)).starts_with("//"));
    }
}
