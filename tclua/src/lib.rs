//! # Tclua: A Tcl-flavored Scripting Language with Tables
//!
//! Tclua is an embeddable interpreter for a small scripting language.  Its surface is
//! Tcl's: a script is a sequence of commands, each a list of words; braces quote, brackets
//! substitute, `$` reads a variable.  Its data model borrows from Lua: a value is a
//! number, a string, a boolean, null, or a reference to a mutable table, and tables
//! inherit fields through a metatable's `__index`.  On top of that it offers procedures,
//! simple classes, `try`/`catch`, `switch`, and a line-oriented debugger.
//!
//! ```
//! use tclua::Interp;
//! use tclua::Value;
//!
//! let mut interp = Interp::new();
//! let value = interp
//!     .eval("proc add {a b} { return [expr $a + $b] }\nadd 2 3")
//!     .unwrap();
//! assert_eq!(value, Value::from(5.0));
//! ```
//!
//! The main entry point is [`Interp`]; see the [`interp`] module for an overview of
//! evaluation, and [`commands`] for the built-in command set.
//!
//! # Features
//!
//! * `debugger` (default): the `breakpoint` and `step` commands and the interactive
//!   pause prompt.
//! * `file` (default): the `file` and `source` commands.

pub use crate::interp::Interp;
pub use crate::interp::ScriptReport;
pub use crate::table::TableId;
pub use crate::table::TableStore;
pub use crate::types::check_args;
pub use crate::types::ErrorKind;
pub use crate::types::Flow;
pub use crate::types::FlowResult;
pub use crate::types::InterpError;
pub use crate::types::Subcommand;
pub use crate::types::TcluaResult;
pub use crate::value::Value;

pub mod commands;
mod expr;
pub mod host;
pub mod interp;
pub mod scope;
pub mod table;
pub mod tokenizer;
pub mod types;
pub mod value;

cfg_if::cfg_if! {
    if #[cfg(feature = "debugger")] {
        pub mod debugger;
        pub use crate::debugger::Debugger;
    }
}

/// A convenience macro for building the success result of a command or subcommand.
///
/// * `tclua_ok!()` returns `Ok(Value::Null)`.
/// * `tclua_ok!(x)` returns `Ok(Value::from(x))`.
/// * `tclua_ok!("fmt", args...)` formats its arguments into a string value.
///
/// # Example
///
/// ```
/// use tclua::*;
///
/// fn cmd() -> TcluaResult {
///     tclua_ok!("{} + {}", 1, 2)
/// }
///
/// assert_eq!(cmd(), Ok(Value::from("1 + 2")));
/// assert_eq!((|| -> TcluaResult { tclua_ok!(5.0) })(), Ok(Value::from(5.0)));
/// ```
#[macro_export]
macro_rules! tclua_ok {
    () => (
        Ok($crate::Value::Null)
    );
    ($arg:expr) => (
        Ok($crate::Value::from($arg))
    );
    ($($arg:tt)*) => (
        Ok($crate::Value::from(format!($($arg)*)))
    )
}

/// A convenience macro for returning a runtime error from a command or subcommand.
///
/// # Example
///
/// ```
/// use tclua::*;
///
/// fn check(n: f64) -> TcluaResult {
///     if n < 0.0 {
///         return tclua_err!("negative value: {}", n);
///     }
///     tclua_ok!(n)
/// }
///
/// assert_eq!(
///     check(-1.0).unwrap_err().to_string(),
///     "Runtime error: negative value: -1"
/// );
/// ```
#[macro_export]
macro_rules! tclua_err {
    ($arg:expr) => (
        Err($crate::InterpError::runtime($arg))
    );
    ($($arg:tt)*) => (
        Err($crate::InterpError::runtime(format!($($arg)*)))
    )
}
