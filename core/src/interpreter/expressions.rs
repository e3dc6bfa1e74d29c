//! Expression Evaluator
//!
//! Evaluates the small expression grammar the pseudo engine understands:
//!
//! - string literals (with `f`/`r` prefixes) and numeric literals
//! - bare variable references
//! - binary arithmetic `+ - * /` with the usual precedence
//! - aggregate calls (`sum`, `min`, `max`, `len`) over literal sequences
//! - a handful of conversions and string methods
//!
//! Anything else is reported as [`Evaluation::Unresolved`] and callers show
//! the expression text as written. Division by zero is a
//! [`Evaluation::Fault`] carrying an inline marker, never a panic.

use super::dialect::Dialect;
use super::env::Environment;
use super::values::{ArithError, BinaryOp, Val};

/// Inline marker for a division by zero
pub const DIVISION_BY_ZERO: &str = "ZeroDivisionError: division by zero";

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Value(Val),
    /// Recoverable arithmetic fault, shown inline instead of a value
    Fault(String),
    /// Outside the supported grammar
    Unresolved,
}

impl Evaluation {
    /// Text shown for this result, falling back to the expression itself
    pub fn render(self, expr: &str) -> String {
        match self {
            Evaluation::Value(v) => v.to_string(),
            Evaluation::Fault(marker) => marker,
            Evaluation::Unresolved => expr.trim().to_string(),
        }
    }
}

/* ===================== Public API ===================== */

/// Resolve `{expr}` placeholders inside an interpolated string body
///
/// `{{` and `}}` are literal braces and backslash escapes in the text around
/// placeholders are processed. A placeholder outside the grammar is replaced
/// by its own text; an unterminated `{` is kept verbatim.
pub fn evaluate_interpolated(template: &str, env: &Environment) -> String {
    interpolate(template, env, Dialect::Python, true)
}

/// Evaluate one expression
pub fn eval_expr(text: &str, env: &Environment, dialect: Dialect) -> Evaluation {
    let text = text.trim();
    if text.is_empty() {
        return Evaluation::Unresolved;
    }

    if let Some(inner) = strip_enclosing_parens(text) {
        return eval_expr(inner, env, dialect);
    }

    if let Some(literal) = parse_string_literal(text) {
        let value = if literal.interpolated {
            interpolate(literal.body, env, dialect, !literal.raw)
        } else if literal.raw {
            literal.body.to_string()
        } else {
            unescape(literal.body)
        };
        return Evaluation::Value(Val::Str(value));
    }

    if let Some(number) = parse_number(text) {
        return Evaluation::Value(number);
    }

    if is_identifier(text) {
        return match env.get(text) {
            Some(value) => Evaluation::Value(value.clone()),
            None => Evaluation::Unresolved,
        };
    }

    if let Some((idx, op)) = find_binary_operator(text) {
        return eval_binary(&text[..idx], op, &text[idx + 1..], env, dialect);
    }

    if let Some(operand) = text.strip_prefix('-') {
        return match eval_expr(operand, env, dialect) {
            Evaluation::Value(Val::Int(i)) => Evaluation::Value(
                i.checked_neg()
                    .map_or_else(|| Val::Float(-(i as f64)), Val::Int),
            ),
            Evaluation::Value(Val::Float(f)) => Evaluation::Value(Val::Float(-f)),
            Evaluation::Fault(marker) => Evaluation::Fault(marker),
            _ => Evaluation::Unresolved,
        };
    }

    if let Some((name, args)) = split_call(text) {
        return eval_call(name, &args, env, dialect);
    }

    Evaluation::Unresolved
}

/// Evaluate and render, showing unresolved expressions loosely de-quoted
///
/// An unresolved `a + b + c` chain renders each operand on its own and
/// joins them, so `"Hi " + who` still prints `Hi who` when `who` is unbound.
pub fn render(text: &str, env: &Environment, dialect: Dialect) -> String {
    match eval_expr(text, env, dialect) {
        Evaluation::Unresolved => {
            let parts = split_top_level(text, '+');
            if parts.len() > 1 && parts.iter().all(|p| !p.trim().is_empty()) {
                parts
                    .into_iter()
                    .map(|part| render(part, env, dialect))
                    .collect()
            } else {
                dequote_loose(text)
            }
        }
        resolved => resolved.render(text),
    }
}

/// Strip one leading and one trailing quote character, if present
pub fn dequote_loose(text: &str) -> String {
    let text = text.trim();
    let text = text.strip_prefix(['"', '\'']).unwrap_or(text);
    let text = text.strip_suffix(['"', '\'']).unwrap_or(text);
    text.to_string()
}

/* ===================== Interpolation ===================== */

/// `escapes` is false for raw strings (`rf"..."`); placeholders are never unescaped
fn interpolate(template: &str, env: &Environment, dialect: Dialect, escapes: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut text = String::new();
    let mut rest = template;

    let flush = |text: &mut String, out: &mut String| {
        if escapes {
            out.push_str(&unescape(text));
        } else {
            out.push_str(text);
        }
        text.clear();
    };

    while let Some(idx) = rest.find(|c: char| c == '{' || c == '}') {
        text.push_str(&rest[..idx]);
        let brace = &rest[idx..idx + 1];
        let after = &rest[idx + 1..];

        if brace == "}" {
            text.push('}');
            rest = after.strip_prefix('}').unwrap_or(after);
            continue;
        }
        if let Some(after_escape) = after.strip_prefix('{') {
            text.push('{');
            rest = after_escape;
            continue;
        }

        match after.find('}') {
            Some(close) => {
                flush(&mut text, &mut out);
                out.push_str(&resolve_placeholder(&after[..close], env, dialect));
                rest = &after[close + 1..];
            }
            None => {
                text.push_str(&rest[idx..]);
                rest = "";
            }
        }
    }

    text.push_str(rest);
    flush(&mut text, &mut out);
    out
}

fn resolve_placeholder(inner: &str, env: &Environment, dialect: Dialect) -> String {
    let (expr, spec) = split_format_spec(inner);
    match eval_expr(expr, env, dialect) {
        Evaluation::Value(value) => apply_format_spec(&value, spec),
        Evaluation::Fault(marker) => marker,
        Evaluation::Unresolved => expr.trim().to_string(),
    }
}

fn split_format_spec(inner: &str) -> (&str, Option<&str>) {
    let colon = scan_top_level(inner)
        .into_iter()
        .find(|tc| tc.top && tc.c == ':');
    match colon {
        Some(tc) => (&inner[..tc.idx], Some(&inner[tc.idx + 1..])),
        None => (inner, None),
    }
}

/// Supports `.Nf` (fixed decimals) and `d`; other specs render plainly
fn apply_format_spec(value: &Val, spec: Option<&str>) -> String {
    let Some(spec) = spec.map(str::trim) else {
        return value.to_string();
    };

    if let Some(precision) = spec
        .strip_prefix('.')
        .and_then(|s| s.strip_suffix('f'))
        .and_then(|digits| digits.parse::<usize>().ok())
    {
        if let Some(x) = value.as_f64() {
            return format!("{x:.precision$}");
        }
    }

    if spec == "d" {
        if let Val::Int(i) = value {
            return i.to_string();
        }
    }

    value.to_string()
}

/* ===================== Arithmetic ===================== */

fn eval_binary(
    lhs: &str,
    op: BinaryOp,
    rhs: &str,
    env: &Environment,
    dialect: Dialect,
) -> Evaluation {
    let lhs = match eval_expr(lhs, env, dialect) {
        Evaluation::Value(v) => v,
        other => return other,
    };
    let rhs = match eval_expr(rhs, env, dialect) {
        Evaluation::Value(v) => v,
        other => return other,
    };

    match lhs.binary(op, &rhs, dialect.true_division()) {
        Ok(v) => Evaluation::Value(v),
        Err(ArithError::DivisionByZero) => Evaluation::Fault(DIVISION_BY_ZERO.to_string()),
        Err(ArithError::Unsupported) => Evaluation::Unresolved,
    }
}

/// Position of the operator to split on: the last top-level `+`/`-`,
/// otherwise the last top-level `*`/`/`. Unary signs are skipped.
fn find_binary_operator(text: &str) -> Option<(usize, BinaryOp)> {
    let chars = scan_top_level(text);
    let mut additive = None;
    let mut multiplicative = None;

    for (pos, tc) in chars.iter().enumerate() {
        if !tc.top {
            continue;
        }
        let Some(op) = BinaryOp::from_char(tc.c) else {
            continue;
        };

        let prev = chars[..pos].iter().rev().find(|p| !p.c.is_whitespace());
        let next = chars.get(pos + 1).map(|n| n.c);

        match op {
            BinaryOp::Add | BinaryOp::Sub => {
                let unary = match prev {
                    None => true,
                    Some(p) => "+-*/%(,=<>".contains(p.c) || is_exponent_sign(&chars[..pos]),
                };
                if !unary {
                    additive = Some((tc.idx, op));
                }
            }
            BinaryOp::Mul | BinaryOp::Div => {
                // `**` and `//` are outside the grammar
                let doubled = next == Some(tc.c) || prev.is_some_and(|p| p.c == tc.c);
                if doubled {
                    return None;
                }
                multiplicative = Some((tc.idx, op));
            }
        }
    }

    additive.or(multiplicative)
}

/// `1e-5`: sign directly after an exponent marker that follows a digit
fn is_exponent_sign(before: &[TopChar]) -> bool {
    match before {
        [.., digit, marker] => {
            (marker.c == 'e' || marker.c == 'E') && digit.c.is_ascii_digit()
        }
        _ => false,
    }
}

/* ===================== Calls ===================== */

fn eval_call(name: &str, args: &[&str], env: &Environment, dialect: Dialect) -> Evaluation {
    match (name, args) {
        ("sum", _) => aggregate(args, env, dialect, Aggregate::Sum),
        ("min" | "Math.min", _) => aggregate(args, env, dialect, Aggregate::Min),
        ("max" | "Math.max", _) => aggregate(args, env, dialect, Aggregate::Max),
        ("len", [arg]) => length(arg, env, dialect),

        ("str" | "String.valueOf", [arg]) => match eval_expr(arg, env, dialect) {
            Evaluation::Value(v) => Evaluation::Value(Val::Str(v.to_string())),
            other => other,
        },
        ("int" | "Integer.parseInt", [arg]) => convert(arg, env, dialect, |v| match v {
            Val::Int(i) => Some(Val::Int(i)),
            Val::Float(f) => Some(Val::Int(f.trunc() as i64)),
            Val::Str(s) => s.trim().parse().ok().map(Val::Int),
        }),
        ("float" | "Double.parseDouble", [arg]) => convert(arg, env, dialect, |v| match v {
            Val::Str(s) => s.trim().parse().ok().map(Val::Float),
            other => other.as_f64().map(Val::Float),
        }),
        ("abs" | "Math.abs", [arg]) => convert(arg, env, dialect, |v| match v {
            // |i64::MIN| does not fit
            Val::Int(i) => Some(
                i.checked_abs()
                    .map_or_else(|| Val::Float((i as f64).abs()), Val::Int),
            ),
            Val::Float(f) => Some(Val::Float(f.abs())),
            Val::Str(_) => None,
        }),
        ("round", [arg]) => convert(arg, env, dialect, |v| {
            v.as_f64().map(|f| Val::Int(f.round_ties_even() as i64))
        }),
        ("round", [arg, digits]) => {
            let digits = match eval_expr(digits, env, dialect) {
                Evaluation::Value(Val::Int(d)) => d,
                _ => return Evaluation::Unresolved,
            };
            convert(arg, env, dialect, |v| {
                let scale = 10f64.powi(digits as i32);
                v.as_f64()
                    .map(|f| Val::Float((f * scale).round_ties_even() / scale))
            })
        }
        ("Math.round", [arg]) => convert(arg, env, dialect, |v| {
            v.as_f64().map(|f| Val::Int((f + 0.5).floor() as i64))
        }),
        ("Math.sqrt", [arg]) => convert(arg, env, dialect, |v| v.as_f64().map(|f| Val::Float(f.sqrt()))),
        ("Math.pow", [base, exp]) => {
            let (Evaluation::Value(base), Evaluation::Value(exp)) =
                (eval_expr(base, env, dialect), eval_expr(exp, env, dialect))
            else {
                return Evaluation::Unresolved;
            };
            match (base.as_f64(), exp.as_f64()) {
                (Some(b), Some(e)) => Evaluation::Value(Val::Float(b.powf(e))),
                _ => Evaluation::Unresolved,
            }
        }

        (_, []) => match name.rsplit_once('.') {
            Some((receiver, method)) => string_method(receiver, method, env, dialect),
            None => Evaluation::Unresolved,
        },
        _ => Evaluation::Unresolved,
    }
}

fn convert<F>(arg: &str, env: &Environment, dialect: Dialect, f: F) -> Evaluation
where
    F: FnOnce(Val) -> Option<Val>,
{
    match eval_expr(arg, env, dialect) {
        Evaluation::Value(v) => f(v).map_or(Evaluation::Unresolved, Evaluation::Value),
        other => other,
    }
}

#[derive(Debug, Clone, Copy)]
enum Aggregate {
    Sum,
    Min,
    Max,
}

/// `sum([1, 2])`, `max(3, 5)`, `min((1, 2))`
fn aggregate(args: &[&str], env: &Environment, dialect: Dialect, kind: Aggregate) -> Evaluation {
    let items = match args {
        [single] => match sequence_items(single) {
            Some(items) => items,
            None => return Evaluation::Unresolved,
        },
        [] => return Evaluation::Unresolved,
        many => many.to_vec(),
    };

    let mut values = Vec::with_capacity(items.len());
    for item in items {
        match eval_expr(item, env, dialect) {
            Evaluation::Value(v) if v.is_numeric() => values.push(v),
            Evaluation::Fault(marker) => return Evaluation::Fault(marker),
            _ => return Evaluation::Unresolved,
        }
    }

    let result = match kind {
        Aggregate::Sum => values.into_iter().try_fold(Val::Int(0), |acc, v| {
            acc.binary(BinaryOp::Add, &v, dialect.true_division()).ok()
        }),
        Aggregate::Min => pick(values, |candidate, best| candidate < best),
        Aggregate::Max => pick(values, |candidate, best| candidate > best),
    };

    result.map_or(Evaluation::Unresolved, Evaluation::Value)
}

fn pick(values: Vec<Val>, better: impl Fn(f64, f64) -> bool) -> Option<Val> {
    let mut best: Option<(f64, Val)> = None;
    for v in values {
        let x = v.as_f64()?;
        let replace = match &best {
            Some((current, _)) => better(x, *current),
            None => true,
        };
        if replace {
            best = Some((x, v));
        }
    }
    best.map(|(_, v)| v)
}

fn length(arg: &str, env: &Environment, dialect: Dialect) -> Evaluation {
    if let Some(items) = sequence_items(arg) {
        return Evaluation::Value(Val::Int(items.len() as i64));
    }
    match eval_expr(arg, env, dialect) {
        Evaluation::Value(Val::Str(s)) => Evaluation::Value(Val::Int(s.chars().count() as i64)),
        Evaluation::Fault(marker) => Evaluation::Fault(marker),
        _ => Evaluation::Unresolved,
    }
}

fn string_method(receiver: &str, method: &str, env: &Environment, dialect: Dialect) -> Evaluation {
    let Evaluation::Value(Val::Str(s)) = eval_expr(receiver, env, dialect) else {
        return Evaluation::Unresolved;
    };

    let value = match method {
        "upper" | "toUpperCase" => Val::Str(s.to_uppercase()),
        "lower" | "toLowerCase" => Val::Str(s.to_lowercase()),
        "strip" | "trim" => Val::Str(s.trim().to_string()),
        "length" => Val::Int(s.chars().count() as i64),
        _ => return Evaluation::Unresolved,
    };
    Evaluation::Value(value)
}

/// Items of a `[...]` or `(...)` literal sequence
fn sequence_items(text: &str) -> Option<Vec<&str>> {
    let text = text.trim();
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .or_else(|| strip_enclosing_parens(text))?;

    if inner.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut items = split_top_level(inner, ',');
    // trailing comma: `(1,)`
    if items.last().is_some_and(|item| item.trim().is_empty()) {
        items.pop();
    }
    Some(items)
}

/// `name(args)` where the call's closing paren ends the text
fn split_call(text: &str) -> Option<(&str, Vec<&str>)> {
    let open = text.find('(')?;
    let name = text[..open].trim_end();
    let is_path = !name.is_empty() && name.split('.').all(is_identifier);
    if !is_path || matching_close(text, open)? != text.len() - 1 {
        return None;
    }

    let inner = &text[open + 1..text.len() - 1];
    let args = if inner.trim().is_empty() {
        Vec::new()
    } else {
        split_top_level(inner, ',')
    };
    Some((name, args))
}

/* ===================== Literals ===================== */

struct StringLiteral<'a> {
    body: &'a str,
    interpolated: bool,
    raw: bool,
}

/// A complete string literal: optional prefix, one quoted body, nothing after
fn parse_string_literal(text: &str) -> Option<StringLiteral<'_>> {
    let quote_idx = text.find(|c: char| c == '"' || c == '\'')?;
    let prefix = &text[..quote_idx];
    if prefix.len() > 2 || !prefix.chars().all(|c| "fFrRbBuU".contains(c)) {
        return None;
    }

    let quoted = &text[quote_idx..];
    let quote = &quoted[..1];
    let triple = quote.repeat(3);
    let delim = if quoted.len() >= 6 && quoted.starts_with(&triple) {
        triple.as_str()
    } else {
        quote
    };

    if quoted.len() < delim.len() * 2 || !quoted.ends_with(delim) {
        return None;
    }
    let body = &quoted[delim.len()..quoted.len() - delim.len()];

    // the closing quote must not be escaped, and must be the first unescaped one
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if delim.len() == 1 && quote.starts_with(c) {
            return None;
        }
    }
    if escaped {
        return None;
    }

    let prefix = prefix.to_ascii_lowercase();
    Some(StringLiteral {
        body,
        interpolated: prefix.contains('f'),
        raw: prefix.contains('r'),
    })
}

/// Process backslash escapes in a string body
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '\'')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn parse_number(text: &str) -> Option<Val> {
    let first = text.chars().next()?;
    let starts_numeric = first.is_ascii_digit()
        || (matches!(first, '-' | '+' | '.')
            && text[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.'));
    if !starts_numeric {
        return None;
    }

    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    // Java literal suffixes: 10L, 2.5f, 1.0d
    let cleaned = cleaned
        .strip_suffix(['L', 'l', 'f', 'F', 'd', 'D'])
        .unwrap_or(&cleaned);

    if let Ok(i) = cleaned.parse::<i64>() {
        return Some(Val::Int(i));
    }
    cleaned.parse::<f64>().ok().map(Val::Float)
}

pub(crate) fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/* ===================== Top-level scanning ===================== */

/// A character with whether it sits outside every bracket and quote
#[derive(Debug, Clone, Copy)]
pub(crate) struct TopChar {
    pub idx: usize,
    pub c: char,
    pub top: bool,
}

pub(crate) fn scan_top_level(text: &str) -> Vec<TopChar> {
    let mut out = Vec::with_capacity(text.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            out.push(TopChar { idx, c, top: false });
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(TopChar { idx, c, top: false });
            }
            '(' | '[' | '{' => {
                out.push(TopChar { idx, c, top: false });
                depth += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                out.push(TopChar { idx, c, top: false });
            }
            _ => out.push(TopChar {
                idx,
                c,
                top: depth == 0,
            }),
        }
    }

    out
}

/// Split on a separator that sits outside brackets and quotes
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for tc in scan_top_level(text) {
        if tc.top && tc.c == sep {
            parts.push(&text[start..tc.idx]);
            start = tc.idx + sep.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Byte index of the bracket closing the one at `open`
pub(crate) fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_enclosing_parens(text: &str) -> Option<&str> {
    if !text.starts_with('(') || matching_close(text, 0)? != text.len() - 1 {
        return None;
    }
    Some(&text[1..text.len() - 1])
}
