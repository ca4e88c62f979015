//! The Value Type
//!
//! [`Value`] is the type of every Tclua datum: the contents of variables, table fields,
//! command arguments and command results.  It is a closed tagged union of numbers,
//! strings, booleans, null, and references to tables.
//!
//! Values are immutable.  A variable changes by being rebound to a new `Value`; a table
//! changes in place, and every `Value::Table` referring to it sees the change, since the
//! variant holds only the table's [`TableId`] in the interpreter's table arena.
//!
//! # String conversion
//!
//! Every value has a canonical string form, provided by its `Display` implementation:
//!
//! * Integral numbers print without a decimal point: `14`, not `14.0`.
//! * Booleans print as `1` or `0`.
//! * `Null` prints as the empty string.
//! * Tables print as the literal string `table`.
//!
//! ```
//! use tclua::Value;
//!
//! assert_eq!(Value::from(14.0).to_string(), "14");
//! assert_eq!(Value::from(2.5).to_string(), "2.5");
//! assert_eq!(Value::from(true).to_string(), "1");
//! assert_eq!(Value::Null.to_string(), "");
//! ```

use crate::table::TableId;
use std::fmt;
use std::rc::Rc;

/// A Tclua value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// A double-precision number.
    Number(f64),

    /// A UTF-8 string.
    String(Rc<str>),

    /// A boolean, produced by comparisons and logical operators.
    Boolean(bool),

    /// The absence of a value.
    #[default]
    Null,

    /// A reference to a table in the interpreter's table arena.
    Table(TableId),
}

impl Value {
    /// Returns the empty string value.
    pub fn empty() -> Self {
        Value::String(Rc::from(""))
    }

    /// Returns the value as a number, coercing booleans and numeric strings.
    /// Returns `None` if no coercion applies.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => parse_number(s),
            Value::Null | Value::Table(_) => None,
        }
    }

    /// Returns the number if the value is a `Number`, without coercion.
    pub fn number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the table ID if the value is a table reference.
    pub fn as_table(&self) -> Option<TableId> {
        match self {
            Value::Table(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns true if the value is a string.
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// Truthiness for conditions: numbers are true iff nonzero, strings iff non-empty,
    /// booleans as themselves, null is false and a table is always true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Null => false,
            Value::Table(_) => true,
        }
    }

    /// The name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Table(_) => "table",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Value::Null => Ok(()),
            Value::Table(_) => write!(f, "table"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(Rc::from(s.as_str()))
    }
}

impl From<TableId> for Value {
    fn from(id: TableId) -> Self {
        Value::Table(id)
    }
}

/// Formats a number canonically: integral values without a decimal point.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parses a numeric string the way Tclua's numeric coercion does.  Only strings that
/// look like decimal numbers qualify; `inf` and `nan` spellings don't.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let first = s.chars().next()?;

    if !(first.is_ascii_digit() || first == '.' || first == '-' || first == '+') {
        return None;
    }

    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }

    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::from(14.0).to_string(), "14");
        assert_eq!(Value::from(-3.0).to_string(), "-3");
        assert_eq!(Value::from(0.5).to_string(), "0.5");
        assert_eq!(Value::from(false).to_string(), "0");
        assert_eq!(Value::from("abc").to_string(), "abc");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Table(TableId::from_index(3)).to_string(), "table");
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Value::from(2.0).as_number(), Some(2.0));
        assert_eq!(Value::from(true).as_number(), Some(1.0));
        assert_eq!(Value::from(" 42 ").as_number(), Some(42.0));
        assert_eq!(Value::from("1e3").as_number(), Some(1000.0));
        assert_eq!(Value::from("abc").as_number(), None);
        assert_eq!(Value::from("inf").as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
        assert_eq!(Value::from("5").number(), None);
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::from(1.0).is_truthy());
        assert!(!Value::from(0.0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::empty().is_truthy());
        assert!(Value::from(true).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(Value::Table(TableId::from_index(0)).is_truthy());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1e20), "100000000000000000000");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.25), "1.25");
    }
}
