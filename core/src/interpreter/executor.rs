//! Pseudo-Execution Engine
//!
//! Runs the statements recognized by the scanner in one top-to-bottom pass,
//! writing the transcript into the session's sink and suspending at input
//! sites through the coordinator. Cancellation is checked between statements
//! and raced against every pending input request.

use std::collections::VecDeque;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::dialect::Dialect;
use super::env::Environment;
use super::expressions::{dequote_loose, eval_expr, render, Evaluation};
use super::statements::{scan_lines, InputSite, Line, PrintEnd, Stmt, Stream};
use super::values::{Val, ValueError};
use crate::console::{echo_line, InputCoordinator, InputError, OutputSink};
use crate::types::{InputMode, RunOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("input coordinator refused the request: {0}")]
    Input(#[from] InputError),
}

/// Session-owned resources a run borrows
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub sink: &'a OutputSink,
    pub input: &'a InputCoordinator,
    pub cancel: &'a CancellationToken,
    pub mode: InputMode,
}

/// Run `source` to completion, cancellation, or a coordinator fault
pub async fn run_program(
    source: &str,
    dialect: Dialect,
    ctx: ExecutionContext<'_>,
) -> Result<RunOutcome, ExecError> {
    let lines = scan_lines(source, dialect);
    let mut machine = Machine::new(dialect, ctx);
    machine.run(&lines).await
}

/// A value gathered ahead of execution in batch mode
#[derive(Debug)]
struct Collected {
    raw: String,
    value: Result<Val, ValueError>,
}

struct Machine<'a> {
    dialect: Dialect,
    ctx: ExecutionContext<'a>,
    env: Environment,
    /// Output written without a trailing newline yet
    pending: String,
    collected: VecDeque<Collected>,
}

impl<'a> Machine<'a> {
    fn new(dialect: Dialect, ctx: ExecutionContext<'a>) -> Self {
        Self {
            dialect,
            ctx,
            env: Environment::new(),
            pending: String::new(),
            collected: VecDeque::new(),
        }
    }

    async fn run(&mut self, lines: &[Line]) -> Result<RunOutcome, ExecError> {
        for text in self.dialect.preamble() {
            self.ctx.sink.info(*text).await;
        }

        if self.ctx.mode == InputMode::Batch && !self.collect(lines).await? {
            return Ok(RunOutcome::Stopped);
        }

        for line in lines {
            if self.ctx.cancel.is_cancelled() {
                return Ok(RunOutcome::Stopped);
            }

            let Some(stmt) = line.stmt.executable() else {
                debug!(line = line.number, stmt = ?line.stmt, "skipping line");
                continue;
            };
            debug!(line = line.number, stmt = ?stmt, "executing");

            if !self.execute(stmt).await? {
                return Ok(RunOutcome::Stopped);
            }
        }

        self.flush_pending().await;
        self.ctx.sink.info(self.dialect.completion()).await;
        Ok(RunOutcome::Completed)
    }

    /// Execute one statement; false once the run has been cancelled
    async fn execute(&mut self, stmt: &Stmt) -> Result<bool, ExecError> {
        match stmt {
            Stmt::Print {
                args,
                sep,
                end,
                stream,
            } => {
                let text = self.print_text(args, sep.as_deref(), end, &self.env);
                match stream {
                    Stream::Stdout => self.write_stdout(&text).await,
                    Stream::Stderr => {
                        for line in text.strip_suffix('\n').unwrap_or(&text).split('\n') {
                            self.ctx.sink.error(line).await;
                        }
                    }
                }
            }
            Stmt::Input(site) => return self.read_input(site).await,
            Stmt::Assign { target, expr } => {
                let value = match eval_expr(expr, &self.env, self.dialect) {
                    Evaluation::Value(v) => v,
                    Evaluation::Fault(marker) => Val::Str(marker),
                    Evaluation::Unresolved => Val::Str(dequote_loose(expr)),
                };
                self.env.assign(target.as_str(), value);
            }
            _ => {}
        }
        Ok(true)
    }

    fn print_text(&self, args: &[String], sep: Option<&str>, end: &PrintEnd, env: &Environment) -> String {
        let sep = sep.map_or_else(|| " ".to_string(), |s| render(s, env, self.dialect));
        let mut text = args
            .iter()
            .map(|arg| render(arg, env, self.dialect))
            .collect::<Vec<_>>()
            .join(&sep);

        match end {
            PrintEnd::Newline => text.push('\n'),
            PrintEnd::Nothing => {}
            PrintEnd::Expr(expr) => text.push_str(&render(expr, env, self.dialect)),
        }
        text
    }

    /// Append to the open line, emitting every line a newline completes
    async fn write_stdout(&mut self, text: &str) {
        self.pending.push_str(text);
        while let Some(idx) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=idx).collect();
            self.ctx.sink.output(line.trim_end_matches('\n')).await;
        }
    }

    async fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.ctx.sink.output(line).await;
        }
    }

    /// Prompt for an input site: the open output line plus the explicit prompt
    fn prompt_for(site: &InputSite, pending: &mut String, env: &Environment, dialect: Dialect) -> String {
        let mut prompt = std::mem::take(pending);
        if let Some(expr) = &site.prompt {
            prompt.push_str(&render(expr, env, dialect));
        }
        prompt
    }

    async fn read_input(&mut self, site: &InputSite) -> Result<bool, ExecError> {
        let prompt = Self::prompt_for(site, &mut self.pending, &self.env, self.dialect);

        let collected = match self.collected.pop_front() {
            Some(collected) => collected,
            None => match self.read_live(&prompt).await? {
                Some(raw) => {
                    let value = Val::coerce(&raw, site.kind);
                    Collected { raw, value }
                }
                None => return Ok(false),
            },
        };

        self.ctx.sink.input_echo(echo_line(&prompt, &collected.raw)).await;

        let value = match collected.value {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "input coercion failed");
                self.ctx
                    .sink
                    .warning(format!(
                        "Invalid input '{}' for {}; using {}",
                        collected.raw,
                        site.kind,
                        site.kind.zero()
                    ))
                    .await;
                site.kind.zero()
            }
        };

        if let Some(target) = &site.target {
            self.env.assign(target.as_str(), value);
        }
        Ok(true)
    }

    /// Ask the shell for one value, or `None` if the run is cancelled first
    async fn read_live(&self, prompt: &str) -> Result<Option<String>, ExecError> {
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => {
                self.ctx.input.cancel().await;
                Ok(None)
            }
            answer = self.ctx.input.request(prompt) => {
                let answer = answer?;
                if self.ctx.cancel.is_cancelled() {
                    Ok(None)
                } else {
                    Ok(Some(answer))
                }
            }
        }
    }

    /// Batch mode: gather a value for every input site before executing
    ///
    /// Prompts are computed from literal text only, since no statement has
    /// run yet. Returns false if the run was cancelled while collecting.
    async fn collect(&mut self, lines: &[Line]) -> Result<bool, ExecError> {
        let empty = Environment::new();
        let mut pending = String::new();

        for stmt in lines.iter().filter_map(|line| line.stmt.executable()) {
            match stmt {
                Stmt::Print {
                    args,
                    sep,
                    end,
                    stream: Stream::Stdout,
                } => {
                    pending.push_str(&self.print_text(args, sep.as_deref(), end, &empty));
                    if let Some(idx) = pending.rfind('\n') {
                        pending.drain(..=idx);
                    }
                }
                Stmt::Input(site) => {
                    let prompt = Self::prompt_for(site, &mut pending, &empty, self.dialect);
                    let Some(raw) = self.read_live(&prompt).await? else {
                        return Ok(false);
                    };
                    let value = Val::coerce(&raw, site.kind);
                    self.collected.push_back(Collected { raw, value });
                }
                _ => {}
            }
        }

        debug!(values = self.collected.len(), "collected batch input");
        Ok(true)
    }
}
