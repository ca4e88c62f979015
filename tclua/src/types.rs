//! Public Type Declarations
//!
//! This module defines the types used to report the outcome of evaluating Tclua code:
//! [`InterpError`] and its [`ErrorKind`], the [`Flow`] of a command, and the
//! [`TcluaResult`] and [`FlowResult`] aliases built from them.  It also holds the
//! helpers used by command implementations, [`check_args`] and [`Subcommand`].
//!
//! # Flow versus errors
//!
//! A command either fails with an [`InterpError`] or completes with a [`Flow`].  An
//! explicit `return`, `break` or `continue` is not an error: it is a `Flow` variant that
//! loops and procedure calls inspect on the way up.  Only genuine faults travel through
//! the `Err` side of a result.

use crate::interp::Interp;
use crate::value::Value;
use thiserror::Error;

/// The standard result of evaluating an expression or a script fragment.
pub type TcluaResult = Result<Value, InterpError>;

/// The result returned by built-in command handlers.
pub type FlowResult = Result<Flow, InterpError>;

/// A function implementing a subcommand of an ensemble command, e.g., `table keys`.
/// The `args` slice excludes the command name but includes the subcommand name.
pub type SubcommandFunc = fn(&mut Interp, &[String]) -> TcluaResult;

/// How a command completed.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// The command completed normally, producing a value.
    Normal(Value),

    /// `return` was executed; unwinds to the nearest procedure call.
    Return(Value),

    /// `break` was executed; unwinds to the nearest loop.
    Break,

    /// `continue` was executed; unwinds to the nearest loop.
    Continue,
}

impl Flow {
    /// Returns the value carried by the flow; `Break` and `Continue` carry `Null`.
    pub fn value(self) -> Value {
        match self {
            Flow::Normal(value) | Flow::Return(value) => value,
            Flow::Break | Flow::Continue => Value::Null,
        }
    }

    /// Returns true if the flow is `Normal`.
    pub fn is_normal(&self) -> bool {
        matches!(self, Flow::Normal(_))
    }
}

/// The kind of an [`InterpError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    /// A malformed expression: bad number, unexpected token, unbalanced parenthesis.
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// A general runtime failure: unknown command, wrong arity, missing table, etc.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Division or modulo by zero.
    #[error("Runtime error: Division by zero")]
    DivisionByZero,

    /// An operand had the wrong type.
    #[error("Runtime error: {0}")]
    TypeMismatch(String),

    /// A variable was not found in any visible scope.
    #[error("Runtime error: Undefined variable: {0}")]
    UndefinedVariable(String),

    /// A table lookup found no such key in the table or its metatable chain.
    #[error("Runtime error: Undefined key: {0}")]
    UndefinedKey(String),
}

/// An interpreter error: a kind, plus the optional source line and context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct InterpError {
    kind: ErrorKind,
    line: Option<usize>,
    context: Option<String>,
}

impl InterpError {
    /// Creates a new error of the given kind, with no line or context.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            line: None,
            context: None,
        }
    }

    /// Creates a syntax error.
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax(msg.into()))
    }

    /// Creates a general runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime(msg.into()))
    }

    /// Creates a type-mismatch runtime error.
    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch(msg.into()))
    }

    /// Creates a division-by-zero runtime error.
    pub fn division_by_zero() -> Self {
        Self::new(ErrorKind::DivisionByZero)
    }

    /// Creates an undefined-variable error naming the variable.
    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable(name.to_string()))
    }

    /// Creates an undefined-key error naming the key.
    pub fn undefined_key(key: &str) -> Self {
        Self::new(ErrorKind::UndefinedKey(key.to_string()))
    }

    /// Attaches a line number, replacing any existing one.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Attaches a line number only if the error doesn't carry one yet.
    pub fn or_line(mut self, line: usize) -> Self {
        if self.line.is_none() {
            self.line = Some(line);
        }
        self
    }

    /// Attaches free-text context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The error's kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The source line, if known.
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// The free-text context, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true for syntax errors.
    pub fn is_syntax(&self) -> bool {
        matches!(self.kind, ErrorKind::Syntax(_))
    }

    /// Returns true for every runtime error kind, i.e., everything but syntax errors.
    pub fn is_runtime(&self) -> bool {
        !self.is_syntax()
    }

    /// Returns true for division-by-zero errors.
    pub fn is_division_by_zero(&self) -> bool {
        matches!(self.kind, ErrorKind::DivisionByZero)
    }

    /// Returns true for undefined-variable errors.
    pub fn is_undefined_variable(&self) -> bool {
        matches!(self.kind, ErrorKind::UndefinedVariable(_))
    }

    /// The message bound to a `try` command's error variable.
    pub fn payload(&self) -> String {
        let msg = self.to_string();
        if msg.is_empty() {
            "Unknown error".to_string()
        } else {
            msg
        }
    }

    /// The message with its line number and context, e.g.,
    /// `Line 3: Runtime error: Division by zero`.
    pub fn full_message(&self) -> String {
        let mut msg = String::new();
        if let Some(line) = self.line {
            msg.push_str(&format!("Line {}: ", line));
        }
        msg.push_str(&self.kind.to_string());
        if let Some(context) = &self.context {
            msg.push_str(&format!(" [Context: {}]", context));
        }
        msg
    }
}

/// Checks the number of arguments passed to a command.  The `args` exclude the command
/// name itself; `min` and `max` bound `args.len()`, with `max == 0` meaning "no limit".
/// On failure, returns the standard `wrong # args` error built from `usage`.
///
/// # Example
///
/// ```
/// use tclua::check_args;
///
/// let args = vec!["x".to_string()];
/// assert!(check_args("set", &args, 1, 2, "name ?expr?").is_ok());
/// assert!(check_args("set", &args, 2, 2, "name expr").is_err());
/// ```
pub fn check_args(
    cmd: &str,
    args: &[String],
    min: usize,
    max: usize,
    usage: &str,
) -> Result<(), InterpError> {
    if args.len() < min || (max > 0 && args.len() > max) {
        if usage.is_empty() {
            Err(InterpError::runtime(format!(
                "wrong # args: should be \"{}\"",
                cmd
            )))
        } else {
            Err(InterpError::runtime(format!(
                "wrong # args: should be \"{} {}\"",
                cmd, usage
            )))
        }
    } else {
        Ok(())
    }
}

/// A subcommand of an ensemble command: its name and implementing function.
pub struct Subcommand(pub &'static str, pub SubcommandFunc);

impl Subcommand {
    /// Looks up a subcommand by name, returning the standard error if it isn't found.
    pub fn find<'a>(ensemble: &'a [Subcommand], sub_name: &str) -> Result<&'a Subcommand, InterpError> {
        for subcmd in ensemble {
            if subcmd.0 == sub_name {
                return Ok(subcmd);
            }
        }

        let mut names = String::new();
        names.push_str(ensemble[0].0);
        let last = ensemble.len() - 1;

        if ensemble.len() > 1 {
            names.push_str(", ");
        }

        if ensemble.len() > 2 {
            let vec: Vec<&str> = ensemble[1..last].iter().map(|x| x.0).collect();
            names.push_str(&vec.join(", "));
        }

        if ensemble.len() > 2 {
            names.push_str(", or ");
        }

        if ensemble.len() > 1 {
            names.push_str(ensemble[last].0);
        }

        Err(InterpError::runtime(format!(
            "unknown or ambiguous subcommand \"{}\": must be {}",
            sub_name, names
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            InterpError::division_by_zero().to_string(),
            "Runtime error: Division by zero"
        );
        assert_eq!(
            InterpError::undefined_variable("x").to_string(),
            "Runtime error: Undefined variable: x"
        );
        assert_eq!(
            InterpError::syntax("Expected ')'").to_string(),
            "Syntax error: Expected ')'"
        );
    }

    #[test]
    fn test_full_message() {
        let err = InterpError::runtime("boom").at_line(3).with_context("set x");
        assert_eq!(err.full_message(), "Line 3: Runtime error: boom [Context: set x]");

        let err = InterpError::runtime("boom");
        assert_eq!(err.full_message(), "Runtime error: boom");
    }

    #[test]
    fn test_or_line() {
        let err = InterpError::runtime("a").at_line(2).or_line(7);
        assert_eq!(err.line(), Some(2));
        let err = InterpError::runtime("a").or_line(7);
        assert_eq!(err.line(), Some(7));
    }

    #[test]
    fn test_kinds() {
        assert!(InterpError::syntax("x").is_syntax());
        assert!(!InterpError::syntax("x").is_runtime());
        assert!(InterpError::undefined_variable("x").is_runtime());
        assert!(InterpError::undefined_variable("x").is_undefined_variable());
        assert!(InterpError::division_by_zero().is_division_by_zero());
    }

    #[test]
    fn test_check_args() {
        let args: Vec<String> = vec!["a".into(), "b".into()];
        assert!(check_args("cmd", &args, 2, 2, "a b").is_ok());
        assert!(check_args("cmd", &args, 1, 0, "a ?b ...?").is_ok());
        assert_eq!(
            check_args("cmd", &args, 0, 1, "?a?"),
            Err(InterpError::runtime("wrong # args: should be \"cmd ?a?\""))
        );
        assert_eq!(
            check_args("step", &args, 0, 0, ""),
            Ok(())
        );
    }

    fn dummy(_: &mut Interp, _: &[String]) -> TcluaResult {
        Ok(Value::Null)
    }

    #[test]
    fn test_subcommand_find() {
        let subs = [
            Subcommand("add", dummy),
            Subcommand("list", dummy),
            Subcommand("remove", dummy),
        ];
        assert!(Subcommand::find(&subs, "list").is_ok());
        let err = Subcommand::find(&subs, "nonesuch").err().map(|e| e.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Runtime error: unknown or ambiguous subcommand \"nonesuch\": must be add, list, or remove")
        );
    }
}
