//! The Line Debugger
//!
//! The interpreter consults its [`Debugger`] before dispatching each command.  It pauses
//! when step mode is on, or when breakpoints are enabled and the command's line has a
//! breakpoint whose condition (if any) is truthy.  Conditions are stored as expression
//! text and evaluated afresh each time the line is reached.
//!
//! While paused, the debugger reads commands from the interpreter's
//! [`InputSource`](crate::host::InputSource):
//!
//! | Command           | Effect                                               |
//! |-------------------|------------------------------------------------------|
//! | `c`, `continue`   | Leave step mode and resume.                          |
//! | `s`, `step`       | Enter step mode and resume; pause at the next line.  |
//! | `bt`, `backtrace` | Print the call stack, innermost frame first.         |
//! | `v`, `vars ?pat?` | Print the visible variables, optionally filtered.    |
//!
//! End of input resumes execution with step mode off.  The debugger never changes
//! program variables.
//!
//! The Tclua commands that drive the debugger are `breakpoint` and `step`.

use crate::interp::Interp;
use crate::table::list_element;
use crate::types::*;
use crate::value::Value;
use std::collections::BTreeMap;
use tracing::debug;
use tracing::warn;

/// Breakpoint and stepping state.
#[derive(Debug, Default)]
pub struct Debugger {
    enabled: bool,
    breakpoints: BTreeMap<usize, Option<String>>,
    step_mode: bool,
    paused: bool,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if breakpoints are enabled.  Step mode works either way.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, flag: bool) {
        self.enabled = flag;
    }

    /// Returns true if the debugger will pause before the next command.
    pub fn is_stepping(&self) -> bool {
        self.step_mode
    }

    pub fn set_stepping(&mut self, flag: bool) {
        self.step_mode = flag;
    }

    /// Returns true while the debugger is waiting for input.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Adds a breakpoint at the line, replacing any existing one.
    pub fn add_breakpoint(&mut self, line: usize, condition: Option<String>) {
        self.breakpoints.insert(line, condition);
    }

    /// Removes the line's breakpoint, returning true if there was one.
    pub fn remove_breakpoint(&mut self, line: usize) -> bool {
        self.breakpoints.remove(&line).is_some()
    }

    /// The breakpoints, in line order, with their conditions.
    pub fn breakpoints(&self) -> impl Iterator<Item = (usize, Option<&str>)> {
        self.breakpoints
            .iter()
            .map(|(line, cond)| (*line, cond.as_deref()))
    }
}

/// Pauses for debugger input if the command at `line` should stop.
pub(crate) fn check(interp: &mut Interp, line: usize, words: &[String]) {
    if interp.debugger().is_paused() {
        return;
    }

    if should_break(interp, line) {
        pause(interp, line, words);
    }
}

fn should_break(interp: &mut Interp, line: usize) -> bool {
    let dbg = interp.debugger();

    if dbg.step_mode {
        return true;
    }

    if !dbg.enabled {
        return false;
    }

    let condition = match dbg.breakpoints.get(&line) {
        None => return false,
        Some(None) => return true,
        Some(Some(cond)) => cond.clone(),
    };

    // Commands run by the condition mustn't re-enter the debugger.
    interp.debugger_mut().paused = true;
    let result = interp.expr(&condition);
    interp.debugger_mut().paused = false;

    match result {
        Ok(value) => value.is_truthy(),
        Err(err) => {
            warn!(line, condition = %condition, error = %err, "breakpoint condition failed");
            false
        }
    }
}

fn pause(interp: &mut Interp, line: usize, words: &[String]) {
    debug!(line, command = %words.join(" "), "debugger paused");
    interp.debugger_mut().paused = true;
    interp.write_line(&format!("Breakpoint at line {}: {}", line, words.join(" ")));

    loop {
        interp.write_prompt("> ");

        let input = match interp.read_input() {
            Some(input) => input,
            None => {
                interp.debugger_mut().step_mode = false;
                break;
            }
        };

        let mut parts = input.split_whitespace();

        match parts.next() {
            Some("c") | Some("continue") => {
                interp.debugger_mut().step_mode = false;
                break;
            }
            Some("s") | Some("step") => {
                interp.debugger_mut().step_mode = true;
                break;
            }
            Some("bt") | Some("backtrace") => backtrace(interp),
            Some("v") | Some("vars") => show_vars(interp, parts.next().unwrap_or("")),
            None => {}
            Some(_) => interp.write_line(
                "Unknown debug command. Available: c(continue), s(tep), bt(backtrace), v(ars)",
            ),
        }
    }

    interp.debugger_mut().paused = false;
}

fn backtrace(interp: &mut Interp) {
    let mut lines = vec!["Call stack:".to_string()];

    let frames = interp.vars().call_stack().frames();
    for (i, frame) in frames.iter().rev().enumerate() {
        lines.push(format!(
            "  #{} {} (called at line {})",
            i,
            frame.name(),
            frame.line()
        ));
    }
    lines.push(format!("  #{} <global>", frames.len()));

    for line in lines {
        interp.write_line(&line);
    }
}

fn show_vars(interp: &mut Interp, filter: &str) {
    let lines: Vec<String> = interp
        .vars()
        .visible()
        .into_iter()
        .filter(|(name, _)| name.contains(filter))
        .map(|(name, value)| {
            let text = match value {
                Value::Table(id) => interp.tables().render(id),
                other => other.to_string(),
            };
            format!("  {} = {}", name, text)
        })
        .collect();

    if lines.is_empty() {
        interp.write_line("  (no variables)");
    }

    for line in lines {
        interp.write_line(&line);
    }
}

//-----------------------------------------------------------------------------------------
// Debugger Commands

const BREAKPOINT_SUBCOMMANDS: [Subcommand; 5] = [
    Subcommand("add", cmd_breakpoint_add),
    Subcommand("disable", cmd_breakpoint_disable),
    Subcommand("enable", cmd_breakpoint_enable),
    Subcommand("list", cmd_breakpoint_list),
    Subcommand("remove", cmd_breakpoint_remove),
];

/// # breakpoint ?subcommand? ?arg ...?
///
/// With no arguments, toggles whether breakpoints are enabled.
pub(crate) fn cmd_breakpoint(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    if args.is_empty() {
        let flag = !interp.debugger().is_enabled();
        interp.debugger_mut().set_enabled(flag);
        report_enabled(interp, flag);
        return Ok(Flow::Normal(Value::Null));
    }

    let subcmd = Subcommand::find(&BREAKPOINT_SUBCOMMANDS, &args[0])?;
    (subcmd.1)(interp, args).map(Flow::Normal)
}

/// # breakpoint add *line* ?*condition*?
fn cmd_breakpoint_add(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("breakpoint", args, 2, 3, "add line ?condition?")?;

    let line = parse_line(&args[1])?;
    let condition = args
        .get(2)
        .map(|cond| crate::tokenizer::strip_braces(cond).to_string());

    interp.debugger_mut().add_breakpoint(line, condition);
    interp.write_line(&format!("Breakpoint added at line {}", line));
    Ok(Value::Null)
}

/// # breakpoint disable
fn cmd_breakpoint_disable(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("breakpoint", args, 1, 1, "disable")?;
    interp.debugger_mut().set_enabled(false);
    report_enabled(interp, false);
    Ok(Value::Null)
}

/// # breakpoint enable
fn cmd_breakpoint_enable(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("breakpoint", args, 1, 1, "enable")?;
    interp.debugger_mut().set_enabled(true);
    report_enabled(interp, true);
    Ok(Value::Null)
}

/// # breakpoint list
fn cmd_breakpoint_list(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("breakpoint", args, 1, 1, "list")?;

    let mut text = String::from("Breakpoints:");
    for (line, cond) in interp.debugger().breakpoints() {
        text.push(' ');
        text.push_str(&line.to_string());
        if let Some(cond) = cond {
            text.push(' ');
            text.push_str(&format!("{{{}}}", cond));
        }
    }

    interp.write_line(&text);
    Ok(Value::Null)
}

/// # breakpoint remove *line*
fn cmd_breakpoint_remove(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("breakpoint", args, 2, 2, "remove line")?;

    let line = parse_line(&args[1])?;
    interp.debugger_mut().remove_breakpoint(line);
    interp.write_line(&format!("Breakpoint removed at line {}", line));
    Ok(Value::Null)
}

/// # step
///
/// Turns on step mode: the debugger pauses before the next command.
pub(crate) fn cmd_step(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("step", args, 0, 0, "")?;
    interp.debugger_mut().set_stepping(true);
    interp.write_line("Stepping enabled");
    Ok(Flow::Normal(Value::Null))
}

fn report_enabled(interp: &mut Interp, flag: bool) {
    let state = if flag { "enabled" } else { "disabled" };
    interp.write_line(&format!("Breakpoints {}", state));
}

fn parse_line(text: &str) -> Result<usize, InterpError> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| InterpError::runtime(format!("Invalid line number: {}", list_element(text))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferOutput;
    use crate::host::FsSource;
    use crate::host::ScriptedInput;

    fn debug_interp(input: &[&str]) -> (Interp, BufferOutput) {
        let out = BufferOutput::new();
        let interp = Interp::with_host(
            Box::new(out.clone()),
            Box::new(ScriptedInput::new(input.iter().copied())),
            Box::new(FsSource),
        );
        (interp, out)
    }

    #[test]
    fn test_breakpoint_state() {
        let mut dbg = Debugger::new();
        assert!(!dbg.is_enabled());
        dbg.add_breakpoint(3, None);
        dbg.add_breakpoint(1, Some("$x > 1".into()));

        let bps: Vec<(usize, Option<&str>)> = dbg.breakpoints().collect();
        assert_eq!(bps, vec![(1, Some("$x > 1")), (3, None)]);

        assert!(dbg.remove_breakpoint(3));
        assert!(!dbg.remove_breakpoint(3));
    }

    #[test]
    fn test_breakpoint_commands() {
        let (mut interp, out) = debug_interp(&[]);

        interp.eval("breakpoint").unwrap();
        assert!(interp.debugger().is_enabled());
        interp.eval("breakpoint disable").unwrap();
        interp.eval("breakpoint add 7 {$x > 5}").unwrap();
        interp.eval("breakpoint add 9").unwrap();
        interp.eval("breakpoint list").unwrap();
        interp.eval("breakpoint remove 9").unwrap();

        assert_eq!(
            out.lines(),
            vec![
                "Breakpoints enabled",
                "Breakpoints disabled",
                "Breakpoint added at line 7",
                "Breakpoint added at line 9",
                "Breakpoints: 7 {$x > 5} 9",
                "Breakpoint removed at line 9",
            ]
        );

        assert_eq!(
            interp.eval("breakpoint add x"),
            Err(InterpError::runtime("Invalid line number: x").at_line(1))
        );
        assert!(interp.eval("breakpoint frob").is_err());
    }

    #[test]
    fn test_pause_on_breakpoint() {
        let (mut interp, out) = debug_interp(&["vars", "bogus", "c"]);

        let script = "breakpoint enable\nset x 5\nbreakpoint add 4\nputs $x\nputs done";
        interp.eval(script).unwrap();

        let lines = out.lines();
        assert!(lines.contains(&"Breakpoint at line 4: puts $x".to_string()));
        assert!(lines.contains(&"  x = 5".to_string()));
        assert!(lines
            .iter()
            .any(|l| l.starts_with("Unknown debug command")));
        assert_eq!(lines.last().map(String::as_str), Some("done"));
        assert!(!interp.debugger().is_stepping());
    }

    #[test]
    fn test_condition_gates_pause() {
        let (mut interp, out) = debug_interp(&["c"]);

        let script = "breakpoint enable\nbreakpoint add 5 {$x > 5}\nset x 1\n\nputs $x";
        interp.eval(script).unwrap();
        assert!(!out.lines().iter().any(|l| l.starts_with("Breakpoint at")));

        // A failing condition doesn't pause either.
        interp.debugger_mut().add_breakpoint(1, Some("$nonesuch".into()));
        interp.eval("puts again").unwrap();
        assert!(!out.lines().iter().any(|l| l.starts_with("Breakpoint at")));
    }

    #[test]
    fn test_step_and_backtrace() {
        let (mut interp, out) = debug_interp(&["s", "bt", "c"]);

        let script = "proc f {} {\n  puts inside\n}\nstep\nf";
        interp.eval(script).unwrap();

        let lines = out.lines();
        assert!(lines.contains(&"Stepping enabled".to_string()));
        assert!(lines.contains(&"Breakpoint at line 5: f".to_string()));
        assert!(lines.contains(&"Breakpoint at line 2: puts inside".to_string()));
        assert!(lines.contains(&"  #0 f (called at line 5)".to_string()));
        assert!(lines.contains(&"  #1 <global>".to_string()));
    }

    #[test]
    fn test_eof_resumes() {
        let (mut interp, out) = debug_interp(&[]);
        interp.eval("step\nputs a\nputs b").unwrap();

        let lines = out.lines();
        assert!(lines.contains(&"Breakpoint at line 2: puts a".to_string()));
        assert!(!lines.iter().any(|l| l.contains("line 3")));
        assert_eq!(lines.last().map(String::as_str), Some("b"));
    }
}
