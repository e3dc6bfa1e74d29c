//! Runtime value types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest string a repetition may build
pub const MAX_REPEAT_BYTES: usize = 1 << 20;

/// Runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Val {
    Str(String),
    Int(i64),
    Float(f64),
}

/// Target kind for input coercion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Str,
    Int,
    Float,
}

impl ValueKind {
    /// The zero-like default used when coercion fails
    pub fn zero(self) -> Val {
        match self {
            ValueKind::Str => Val::Str(String::new()),
            ValueKind::Int => Val::Int(0),
            ValueKind::Float => Val::Float(0.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Str => "str",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("invalid literal for {kind}(): '{raw}'")]
    InvalidLiteral { kind: ValueKind, raw: String },
}

/// Binary arithmetic operators understood by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOp::Add),
            '-' => Some(BinaryOp::Sub),
            '*' => Some(BinaryOp::Mul),
            '/' => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

/// Why an arithmetic operation produced no value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithError {
    DivisionByZero,
    /// Operand types the operator has no meaning for
    Unsupported,
}

impl Val {
    pub fn kind(&self) -> ValueKind {
        match self {
            Val::Str(_) => ValueKind::Str,
            Val::Int(_) => ValueKind::Int,
            Val::Float(_) => ValueKind::Float,
        }
    }

    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Val::Int(i) => Some(*i as f64),
            Val::Float(f) => Some(*f),
            Val::Str(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Val::Str(_))
    }

    /// Convert raw text (typically user input) into a value of `kind`
    ///
    /// Surrounding whitespace is ignored for numeric kinds.
    pub fn coerce(raw: &str, kind: ValueKind) -> Result<Val, ValueError> {
        let invalid = || ValueError::InvalidLiteral {
            kind,
            raw: raw.to_string(),
        };

        match kind {
            ValueKind::Str => Ok(Val::Str(raw.to_string())),
            ValueKind::Int => raw.trim().parse::<i64>().map(Val::Int).map_err(|_| invalid()),
            ValueKind::Float => raw
                .trim()
                .parse::<f64>()
                .map(Val::Float)
                .map_err(|_| invalid()),
        }
    }

    /// Apply a binary operator
    ///
    /// `true_division` selects Python semantics for `/` (always a float);
    /// otherwise integer division truncates as in Java.
    pub fn binary(&self, op: BinaryOp, rhs: &Val, true_division: bool) -> Result<Val, ArithError> {
        match (self, rhs) {
            (Val::Int(a), Val::Int(b)) => int_binary(*a, op, *b, true_division),

            (Val::Str(a), Val::Str(b)) if op == BinaryOp::Add => Ok(Val::Str(format!("{a}{b}"))),
            (Val::Str(s), Val::Int(n)) | (Val::Int(n), Val::Str(s)) if op == BinaryOp::Mul => {
                repeat(s, *n)
            }
            (Val::Str(_), _) | (_, Val::Str(_)) if op == BinaryOp::Add => {
                Ok(Val::Str(format!("{self}{rhs}")))
            }
            (Val::Str(_), _) | (_, Val::Str(_)) => Err(ArithError::Unsupported),

            _ => {
                let (a, b) = match (self.as_f64(), rhs.as_f64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(ArithError::Unsupported),
                };
                float_binary(a, op, b)
            }
        }
    }
}

/// `"ab" * n`; results longer than [`MAX_REPEAT_BYTES`] are refused
fn repeat(s: &str, n: i64) -> Result<Val, ArithError> {
    let count = usize::try_from(n.max(0)).map_err(|_| ArithError::Unsupported)?;
    match s.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_BYTES => Ok(Val::Str(s.repeat(count))),
        _ => Err(ArithError::Unsupported),
    }
}

fn int_binary(a: i64, op: BinaryOp, b: i64, true_division: bool) -> Result<Val, ArithError> {
    let checked = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(ArithError::DivisionByZero);
            }
            if true_division {
                return Ok(Val::Float(a as f64 / b as f64));
            }
            a.checked_div(b)
        }
    };

    match checked {
        Some(v) => Ok(Val::Int(v)),
        // overflow: fall back to floating point
        None => float_binary(a as f64, op, b as f64),
    }
}

fn float_binary(a: f64, op: BinaryOp, b: f64) -> Result<Val, ArithError> {
    let v = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(ArithError::DivisionByZero);
            }
            a / b
        }
    };
    Ok(Val::Float(v))
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Str(s) => f.write_str(s),
            Val::Int(i) => write!(f, "{i}"),
            Val::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

/// Default float stringification: shortest round-trip digits, integral
/// values keep a `.0`, very large or small magnitudes use an exponent.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return format_exponent(x);
    }
    if x.fract() == 0.0 {
        return format!("{x:.1}");
    }
    format!("{x}")
}

/// `1.5e-05` / `1e+16` style exponent notation
fn format_exponent(x: f64) -> String {
    let raw = format!("{x:e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_int() {
        assert_eq!(Val::coerce(" 42 ", ValueKind::Int), Ok(Val::Int(42)));
        assert_eq!(Val::coerce("-7", ValueKind::Int), Ok(Val::Int(-7)));
        assert_eq!(
            Val::coerce("4.5", ValueKind::Int),
            Err(ValueError::InvalidLiteral {
                kind: ValueKind::Int,
                raw: "4.5".to_string()
            })
        );
    }

    #[test]
    fn test_coerce_float_and_str() {
        assert_eq!(Val::coerce("2.5", ValueKind::Float), Ok(Val::Float(2.5)));
        assert_eq!(Val::coerce("3", ValueKind::Float), Ok(Val::Float(3.0)));
        assert!(Val::coerce("abc", ValueKind::Float).is_err());
        assert_eq!(
            Val::coerce(" Ada ", ValueKind::Str),
            Ok(Val::Str(" Ada ".to_string()))
        );
    }

    #[test]
    fn test_zero_defaults() {
        assert_eq!(ValueKind::Int.zero(), Val::Int(0));
        assert_eq!(ValueKind::Float.zero(), Val::Float(0.0));
        assert_eq!(ValueKind::Str.zero(), Val::Str(String::new()));
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_float(3.0), "3.0");
        assert_eq!(format_float(-2.0), "-2.0");
        assert_eq!(format_float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(0.000015), "1.5e-05");
        assert_eq!(format_float(f64::INFINITY), "inf");
        assert_eq!(format_float(0.0), "0.0");
    }

    #[test]
    fn test_int_arithmetic() {
        let two = Val::Int(2);
        assert_eq!(two.binary(BinaryOp::Add, &Val::Int(2), true), Ok(Val::Int(4)));
        assert_eq!(two.binary(BinaryOp::Mul, &Val::Int(3), true), Ok(Val::Int(6)));
        assert_eq!(
            Val::Int(6).binary(BinaryOp::Div, &Val::Int(2), true),
            Ok(Val::Float(3.0))
        );
        assert_eq!(
            Val::Int(7).binary(BinaryOp::Div, &Val::Int(2), false),
            Ok(Val::Int(3))
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            Val::Int(5).binary(BinaryOp::Div, &Val::Int(0), true),
            Err(ArithError::DivisionByZero)
        );
        assert_eq!(
            Val::Float(5.0).binary(BinaryOp::Div, &Val::Float(0.0), true),
            Err(ArithError::DivisionByZero)
        );
    }

    #[test]
    fn test_overflow_falls_back_to_float() {
        let result = Val::Int(i64::MAX).binary(BinaryOp::Add, &Val::Int(1), true);
        assert!(matches!(result, Ok(Val::Float(_))));
    }

    #[test]
    fn test_string_operators() {
        let hi = Val::Str("hi".to_string());
        assert_eq!(
            hi.binary(BinaryOp::Add, &Val::Str("!".to_string()), true),
            Ok(Val::Str("hi!".to_string()))
        );
        assert_eq!(
            hi.binary(BinaryOp::Mul, &Val::Int(3), true),
            Ok(Val::Str("hihihi".to_string()))
        );
        assert_eq!(
            Val::Str("n = ".to_string()).binary(BinaryOp::Add, &Val::Float(1.5), false),
            Ok(Val::Str("n = 1.5".to_string()))
        );
        assert_eq!(
            hi.binary(BinaryOp::Sub, &Val::Int(1), true),
            Err(ArithError::Unsupported)
        );
    }

    #[test]
    fn test_oversized_repetition_is_refused() {
        let ab = Val::Str("ab".to_string());
        assert_eq!(
            ab.binary(BinaryOp::Mul, &Val::Int(4_611_686_018_427_387_904), true),
            Err(ArithError::Unsupported)
        );
        assert_eq!(
            Val::Str("a".to_string()).binary(BinaryOp::Mul, &Val::Int(1_000_000_000_000), true),
            Err(ArithError::Unsupported)
        );
        assert_eq!(
            ab.binary(BinaryOp::Mul, &Val::Int(-3), true),
            Ok(Val::Str(String::new()))
        );

        let limit = (MAX_REPEAT_BYTES / 2) as i64;
        match ab.binary(BinaryOp::Mul, &Val::Int(limit), true) {
            Ok(Val::Str(s)) => assert_eq!(s.len(), MAX_REPEAT_BYTES),
            other => panic!("expected a string, got {other:?}"),
        }
    }
}
