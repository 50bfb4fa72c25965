use std::fmt;

use thiserror::Error;

/// In-band evaluation failure. Stored in a cell's cache like any other value.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormulaError {
    /// The formula references a position outside the sheet.
    #[error("#REF!")]
    Ref,

    /// A referenced cell holds text that is not a number.
    #[error("#VALUE!")]
    Value,

    /// The arithmetic produced no finite result.
    #[error("#DIV/0!")]
    Div0,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Error(FormulaError),
}

impl Default for Value {
    fn default() -> Self {
        Self::Str(String::new())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Num(f)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Num(i as f64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Num(i as f64)
    }
}

impl From<FormulaError> for Value {
    fn from(err: FormulaError) -> Self {
        Self::Error(err)
    }
}

impl From<Result<f64, FormulaError>> for Value {
    fn from(result: Result<f64, FormulaError>) -> Self {
        match result {
            Ok(f) => Self::Num(f),
            Err(err) => Self::Error(err),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
            Self::Error(err) => write!(f, "{err}"),
        }
    }
}

impl Value {
    pub fn is_num(&self) -> bool {
        matches!(self, Self::Num(_))
    }

    pub fn is_str(&self) -> bool {
        matches!(self, Self::Str(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Self::Num(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<FormulaError> {
        match self {
            Self::Error(err) => Some(*err),
            _ => None,
        }
    }
}
