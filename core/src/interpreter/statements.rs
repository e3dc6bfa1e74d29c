//! Statement Scanner
//!
//! Recognizes each source line as one [`Stmt`] for the dialect. Recognition
//! is line-local apart from block comments, which carry state to the next
//! line. Indentation and braces never open a scope: control-flow headers are
//! recorded and the lines below them are scanned like any other.

use super::dialect::Dialect;
use super::expressions::{is_identifier, matching_close, scan_top_level, split_top_level};
use super::values::ValueKind;

/// Where a print statement writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// What follows the printed arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintEnd {
    Newline,
    /// `System.out.print`: the line stays open
    Nothing,
    /// Python `end=<expr>`
    Expr(String),
}

/// A site that reads one line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSite {
    /// Variable receiving the value; `None` discards it
    pub target: Option<String>,
    pub kind: ValueKind,
    /// Prompt expression (Python `input("...")` argument)
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    Blank,
    Comment,
    Print {
        args: Vec<String>,
        sep: Option<String>,
        end: PrintEnd,
        stream: Stream,
    },
    Input(InputSite),
    Assign {
        target: String,
        expr: String,
    },
    /// Control-flow or structural line, with an inline body if present
    Header {
        keyword: String,
        body: Option<Box<Stmt>>,
    },
    Other(String),
}

impl Stmt {
    /// The statement to execute for this line, looking through headers
    pub fn executable(&self) -> Option<&Stmt> {
        match self {
            Stmt::Header { body: Some(body), .. } => body.executable(),
            Stmt::Print { .. } | Stmt::Input(_) | Stmt::Assign { .. } => Some(self),
            _ => None,
        }
    }
}

/// A recognized line, numbered from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub stmt: Stmt,
}

/// Recognize every line of `source`
pub fn scan_lines(source: &str, dialect: Dialect) -> Vec<Line> {
    let mut block_close: Option<&'static str> = None;
    let mut lines = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let text = raw.trim();

        let stmt = if let Some(close) = block_close {
            if text.contains(close) {
                block_close = None;
            }
            Stmt::Comment
        } else if let Some(close) = opens_block_comment(text, dialect) {
            block_close = Some(close);
            Stmt::Comment
        } else {
            match dialect {
                Dialect::Python => scan_python(text),
                Dialect::Java => scan_java(text),
            }
        };

        lines.push(Line {
            number: idx + 1,
            stmt,
        });
    }

    lines
}

/// Closing delimiter if `text` starts a block comment that runs past the line
fn opens_block_comment(text: &str, dialect: Dialect) -> Option<&'static str> {
    let delimiters: &[(&str, &'static str)] = match dialect {
        Dialect::Python => &[("\"\"\"", "\"\"\""), ("'''", "'''")],
        Dialect::Java => &[("/*", "*/")],
    };

    delimiters.iter().find_map(|(open, close)| {
        let rest = text.strip_prefix(open)?;
        (!rest.contains(close)).then_some(*close)
    })
}

/* ===================== Python ===================== */

pub(crate) fn scan_python(line: &str) -> Stmt {
    let text = strip_trailing_comment(line, Dialect::Python).trim();
    if text.is_empty() {
        return blank_or_comment(line);
    }
    if is_docstring_line(text) {
        return Stmt::Comment;
    }

    let (word, rest) = leading_word(text);
    if Dialect::Python.is_structural_keyword(word) && !is_assignment_start(rest) {
        return python_header(word, rest);
    }

    if word == "print" {
        if let Some(inner) = call_arguments(rest) {
            return python_print(inner);
        }
    }

    if let Some(site) = python_input(text, None) {
        return Stmt::Input(site);
    }

    if let Some((target, op, rhs)) = split_assignment(text) {
        let target = target.split(':').next().unwrap_or(target).trim();
        if !is_identifier(target) {
            return Stmt::Other(text.to_string());
        }
        if op.is_none() {
            if let Some(site) = python_input(rhs, Some(target)) {
                return Stmt::Input(site);
            }
        }
        return assignment(target, op, rhs);
    }

    Stmt::Other(text.to_string())
}

fn python_header(keyword: &str, rest: &str) -> Stmt {
    let colon = scan_top_level(rest)
        .into_iter()
        .find(|tc| tc.top && tc.c == ':');
    let body = colon
        .map(|tc| rest[tc.idx + 1..].trim())
        .filter(|body| !body.is_empty())
        .map(|body| Box::new(scan_python(body)));

    Stmt::Header {
        keyword: keyword.to_string(),
        body,
    }
}

fn python_print(inner: &str) -> Stmt {
    let mut args = Vec::new();
    let mut sep = None;
    let mut end = PrintEnd::Newline;
    let mut stream = Stream::Stdout;

    for arg in split_top_level(inner, ',') {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        match keyword_argument(arg) {
            Some(("sep", value)) => sep = Some(value.to_string()),
            Some(("end", value)) => end = PrintEnd::Expr(value.to_string()),
            Some(("file", value)) if value == "sys.stderr" => stream = Stream::Stderr,
            Some(_) => {}
            None => args.push(arg.to_string()),
        }
    }

    Stmt::Print {
        args,
        sep,
        end,
        stream,
    }
}

/// `input(p)`, or `int(input(p))` / `float(...)` / `str(...)`
fn python_input(expr: &str, target: Option<&str>) -> Option<InputSite> {
    let (name, inner) = split_call(expr.trim())?;
    let (kind, inner) = match name {
        "input" => return Some(input_site(target, ValueKind::Str, inner)),
        "int" => (ValueKind::Int, inner),
        "float" => (ValueKind::Float, inner),
        "str" => (ValueKind::Str, inner),
        _ => return None,
    };

    match split_call(inner.trim())? {
        ("input", prompt) => Some(input_site(target, kind, prompt)),
        _ => None,
    }
}

fn input_site(target: Option<&str>, kind: ValueKind, prompt: &str) -> InputSite {
    let prompt = prompt.trim();
    InputSite {
        target: target.map(str::to_string),
        kind,
        prompt: (!prompt.is_empty()).then(|| prompt.to_string()),
    }
}

fn is_docstring_line(text: &str) -> bool {
    ["\"\"\"", "'''"]
        .iter()
        .any(|q| text.starts_with(q) && text.len() >= 6 && text.ends_with(q))
}

/* ===================== Java ===================== */

const JAVA_MODIFIERS: [&str; 7] = [
    "public",
    "private",
    "protected",
    "static",
    "final",
    "abstract",
    "synchronized",
];

pub(crate) fn scan_java(line: &str) -> Stmt {
    let stripped = strip_trailing_comment(line, Dialect::Java).trim();
    if stripped.is_empty() {
        return blank_or_comment(line);
    }
    if stripped.starts_with("/*") || stripped.starts_with('*') {
        return Stmt::Comment;
    }
    if stripped.chars().all(|c| c == '{' || c == '}' || c == ';') {
        return Stmt::Blank;
    }

    // `} else {` closes a block before opening the next
    let text = stripped.trim_start_matches(|c: char| c == '}' || c.is_whitespace());
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();

    let mut body = text;
    loop {
        let (word, rest) = leading_word(body);
        if JAVA_MODIFIERS.contains(&word) {
            body = rest.trim_start();
            continue;
        }
        if Dialect::Java.is_structural_keyword(word) {
            return java_header(word, rest);
        }
        break;
    }

    if text.ends_with('{') {
        let (word, _) = leading_word(body);
        return Stmt::Header {
            keyword: word.to_string(),
            body: None,
        };
    }

    if let Some(stmt) = java_print(text) {
        return stmt;
    }

    if let Some((lhs, op, rhs)) = split_assignment(text) {
        let Some(target) = declared_name(lhs) else {
            return Stmt::Other(text.to_string());
        };
        if op.is_none() {
            if let Some(kind) = scanner_read(rhs) {
                return Stmt::Input(InputSite {
                    target: Some(target.to_string()),
                    kind,
                    prompt: None,
                });
            }
            if rhs.trim_start().starts_with("new ") {
                return Stmt::Other(text.to_string());
            }
        }
        return assignment(target, op, rhs);
    }

    if let Some(stmt) = java_increment(text) {
        return stmt;
    }

    Stmt::Other(text.to_string())
}

/// `if (cond) stmt`, `else stmt`, `for (...) stmt`, or a bare header
fn java_header(keyword: &str, rest: &str) -> Stmt {
    let rest = rest.trim();
    let inline = match keyword {
        "if" | "while" | "for" if rest.starts_with('(') => {
            matching_close(rest, 0).map(|close| &rest[close + 1..])
        }
        "else" | "do" => Some(rest),
        _ => None,
    };

    let body = inline
        .map(|body| body.trim().trim_end_matches('{').trim())
        .filter(|body| !body.is_empty())
        .map(|body| {
            // `else if (...)` chains onto another header
            Box::new(scan_java(body))
        });

    Stmt::Header {
        keyword: keyword.to_string(),
        body,
    }
}

/// `System.out.println(expr)` / `System.out.print(expr)` / `System.err...`
fn java_print(text: &str) -> Option<Stmt> {
    let (stream, call) = if let Some(call) = text.strip_prefix("System.out.") {
        (Stream::Stdout, call)
    } else {
        (Stream::Stderr, text.strip_prefix("System.err.")?)
    };

    let (method, inner) = split_call(call)?;
    let end = match method {
        "println" => PrintEnd::Newline,
        "print" => PrintEnd::Nothing,
        _ => return None,
    };

    let inner = inner.trim();
    let args = if inner.is_empty() {
        Vec::new()
    } else {
        vec![inner.to_string()]
    };

    Some(Stmt::Print {
        args,
        sep: None,
        end,
        stream,
    })
}

/// `sc.nextInt()` and friends
fn scanner_read(rhs: &str) -> Option<ValueKind> {
    let (name, inner) = split_call(rhs.trim())?;
    if !inner.trim().is_empty() {
        return None;
    }
    let (_, method) = name.rsplit_once('.')?;
    match method {
        "nextInt" | "nextLong" | "nextShort" | "nextByte" => Some(ValueKind::Int),
        "nextDouble" | "nextFloat" => Some(ValueKind::Float),
        "nextLine" | "next" => Some(ValueKind::Str),
        _ => None,
    }
}

/// Variable name from `int x`, `final String name`, `var y` or `x`
fn declared_name(lhs: &str) -> Option<&str> {
    let lhs = lhs.trim();
    if lhs.contains(['[', '.']) {
        return None;
    }
    let name = lhs.split_whitespace().last()?;
    is_identifier(name).then_some(name)
}

/// `i++`, `++i`, `i--`, `--i`
fn java_increment(text: &str) -> Option<Stmt> {
    let (name, op) = if let Some(name) = text.strip_suffix("++").or_else(|| text.strip_prefix("++")) {
        (name, '+')
    } else if let Some(name) = text.strip_suffix("--").or_else(|| text.strip_prefix("--")) {
        (name, '-')
    } else {
        return None;
    };

    let name = name.trim();
    is_identifier(name).then(|| assignment(name, Some(op), "1"))
}

/* ===================== Shared ===================== */

fn assignment(target: &str, op: Option<char>, rhs: &str) -> Stmt {
    let rhs = rhs.trim();
    let expr = match op {
        Some(op) => format!("{target} {op} ({rhs})"),
        None => rhs.to_string(),
    };
    Stmt::Assign {
        target: target.to_string(),
        expr,
    }
}

/// Split `lhs = rhs` or `lhs op= rhs` at the first top-level assignment
fn split_assignment(text: &str) -> Option<(&str, Option<char>, &str)> {
    let chars = scan_top_level(text);
    for (pos, tc) in chars.iter().enumerate() {
        if !tc.top || tc.c != '=' {
            continue;
        }
        let prev = pos.checked_sub(1).map(|p| chars[p].c);
        let next = chars.get(pos + 1).map(|n| n.c);
        if next == Some('=') || matches!(prev, Some('=' | '!' | '<' | '>')) {
            // comparison, not assignment
            return None;
        }

        return match prev {
            Some(op @ ('+' | '-' | '*' | '/')) => {
                let op_idx = chars[pos - 1].idx;
                Some((&text[..op_idx], Some(op), &text[tc.idx + 1..]))
            }
            _ => Some((&text[..tc.idx], None, &text[tc.idx + 1..])),
        };
    }
    None
}

/// `rest` begins an assignment (`match = 3`), not a header
fn is_assignment_start(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.starts_with('=') && !rest.starts_with("==")
}

/// `name=value` keyword argument
fn keyword_argument(arg: &str) -> Option<(&str, &str)> {
    let (name, value) = arg.split_once('=')?;
    let name = name.trim();
    if !is_identifier(name) || value.starts_with('=') {
        return None;
    }
    Some((name, value.trim()))
}

/// `(args)` spanning the whole of `rest`; returns the inner text
fn call_arguments(rest: &str) -> Option<&str> {
    let rest = rest.trim();
    if !rest.starts_with('(') || matching_close(rest, 0)? != rest.len() - 1 {
        return None;
    }
    Some(&rest[1..rest.len() - 1])
}

/// `name(args)` covering the whole text; returns the name and inner text
fn split_call(text: &str) -> Option<(&str, &str)> {
    let open = text.find('(')?;
    let name = text[..open].trim_end();
    if name.is_empty() || !name.split('.').all(is_identifier) {
        return None;
    }
    Some((name, call_arguments(&text[open..])?))
}

/// First identifier-like word and the remainder of the line
fn leading_word(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}

/// Byte index of a comment starting outside any string
fn comment_start(text: &str, dialect: Dialect) -> Option<usize> {
    let chars = scan_top_level(text);
    chars.iter().enumerate().find_map(|(pos, tc)| {
        let starts = match dialect {
            Dialect::Python => tc.c == '#',
            Dialect::Java => tc.c == '/' && chars.get(pos + 1).is_some_and(|n| n.c == '/'),
        };
        // `#` inside brackets is still a comment, only quotes hide it
        (starts && !in_quotes(&chars, pos)).then_some(tc.idx)
    })
}

fn in_quotes(chars: &[super::expressions::TopChar], pos: usize) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for tc in &chars[..pos] {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if tc.c == '\\' {
                    escaped = true;
                } else if tc.c == q {
                    quote = None;
                }
            }
            None if tc.c == '"' || tc.c == '\'' => quote = Some(tc.c),
            None => {}
        }
    }
    quote.is_some()
}

fn strip_trailing_comment(text: &str, dialect: Dialect) -> &str {
    match comment_start(text, dialect) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// A line with nothing left once its comment is removed
fn blank_or_comment(line: &str) -> Stmt {
    if line.trim().is_empty() {
        Stmt::Blank
    } else {
        Stmt::Comment
    }
}
