//! Tclua Application Frameworks
//!
//! This crate provides the two ways an application typically runs Tclua code: an
//! interactive REPL with `rustyline` line editing, and a script runner that loads a file
//! and runs it with the script driver.
//!
//! ```no_run
//! use tclua::Interp;
//! use std::env;
//!
//! let args: Vec<String> = env::args().collect();
//! let mut interp = Interp::new();
//!
//! if args.len() > 1 {
//!     tclua_shell::script(&mut interp, &args[1..]);
//! } else {
//!     tclua_shell::repl(&mut interp);
//! }
//! ```

use rustyline::{error::ReadlineError, history::MemHistory, Config, Editor};
use std::fs;
use tclua::{Interp, InterpError, Value};

/// Invokes an interactive REPL for the given interpreter, using `rustyline` line editing.
///
/// The REPL displays the prompt `% `, or `> ` while a command is still incomplete, i.e.,
/// while it has an unmatched brace, bracket or quote.  Each complete command is
/// evaluated; a non-empty result is printed, and so is an error's full message.  Press
/// `^C` or `^D` to terminate the REPL, returning control to the caller.
///
/// # Example
///
/// ```no_run
/// use tclua::Interp;
///
/// // FIRST, create and initialize the interpreter.
/// let mut interp = Interp::new();
///
/// // NOTE: procedures can be defined here with interp.eval().
///
/// // NEXT, invoke the REPL.
/// tclua_shell::repl(&mut interp);
/// ```
pub fn repl(interp: &mut Interp) {
    let mut rl = match Editor::<(), MemHistory>::with_history(Config::default(), MemHistory::new()) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("failed to init rustyline: {}", err);
            return;
        }
    };

    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "% " } else { "> " };

        match rl.readline(prompt) {
            Ok(line) => {
                if !pending.is_empty() {
                    pending.push('\n');
                }
                pending.push_str(&line);

                // Wait for the rest of a multi-line command.
                if !interp.complete(&pending) {
                    continue;
                }

                let script = std::mem::take(&mut pending);
                let script = script.trim();
                if script.is_empty() {
                    continue;
                }

                if let Err(e) = rl.add_history_entry(script) {
                    eprintln!("History error: {e}");
                }

                match interp.eval(script) {
                    Ok(value) => {
                        // Don't output empty values.
                        let text = value.to_string();
                        if !text.is_empty() {
                            println!("{}", text);
                        }
                    }
                    Err(err) => {
                        println!("{}", err.full_message());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("I/O Error: {:?}", err);
                break;
            }
        }
    }
}

/// Executes a script from a set of command line arguments.
///
/// `args[0]` is presumed to be the name of a Tclua script file, with any subsequent
/// arguments being arguments to pass to the script.  The script is run with
/// [`Interp::run`]: each failing command is reported and the script goes on.  If the
/// file can't be read, or any command failed, the process exits with status 1.
///
/// # Tclua Variables
///
/// The calling information is passed to the script in the form of Tclua variables:
///
/// * `argv0` is the name of the script file.
/// * `argc` is the number of script arguments.
/// * `argv` is a table of the script arguments, keyed `0` through `argc - 1`.
pub fn script(interp: &mut Interp, args: &[String]) {
    let arg0 = &args[0];
    let argv = &args[1..];

    match fs::read_to_string(arg0) {
        Ok(script) => execute_script(interp, &script, arg0, argv),
        Err(e) => {
            eprintln!("couldn't read file \"{}\": {}", arg0, e);
            std::process::exit(1);
        }
    }
}

/// Executes a script read from a file, with any command-line arguments, in the context
/// of the given interpreter.
fn execute_script(interp: &mut Interp, script: &str, arg0: &str, argv: &[String]) {
    if let Err(err) = bind_arguments(interp, arg0, argv) {
        eprintln!("{}", err.full_message());
        std::process::exit(1);
    }

    let report = interp.run(script);

    if !report.is_ok() {
        std::process::exit(1);
    }
}

/// Sets the `argv0`, `argc` and `argv` variables.
pub fn bind_arguments(interp: &mut Interp, arg0: &str, argv: &[String]) -> Result<(), InterpError> {
    let table = interp.tables_mut().create();
    for (i, arg) in argv.iter().enumerate() {
        interp
            .tables_mut()
            .set(table, &i.to_string(), Value::from(arg.as_str()));
    }

    interp.set_var("argv0", Value::from(arg0))?;
    interp.set_var("argc", Value::from(argv.len()))?;
    interp.set_var("argv", Value::Table(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_arguments() {
        let mut interp = Interp::new();
        let argv = vec!["alpha".to_string(), "beta".to_string()];
        bind_arguments(&mut interp, "demo.tcl", &argv).unwrap();

        assert_eq!(interp.var("argv0"), Ok(Value::from("demo.tcl")));
        assert_eq!(interp.var("argc"), Ok(Value::from(2.0)));
        assert_eq!(interp.var("argv(0)"), Ok(Value::from("alpha")));
        assert_eq!(interp.var("argv.1"), Ok(Value::from("beta")));
    }
}
