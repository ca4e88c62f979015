//! Host Collaborators
//!
//! The interpreter core performs no I/O of its own.  It talks to the host through three
//! small traits:
//!
//! * [`OutputSink`] receives `puts` output, debugger output and error diagnostics.
//! * [`InputSource`] supplies lines to the debugger while it is paused.
//! * [`ScriptSource`] loads and stores files for the `source` and `file` commands.
//!
//! [`Interp::new`](crate::Interp::new) wires up the standard implementations
//! ([`StdOutput`], [`StdInput`], [`FsSource`]).  Embedders and tests can substitute
//! their own with [`Interp::with_host`](crate::Interp::with_host); [`BufferOutput`] and
//! [`ScriptedInput`] are provided for that purpose.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::rc::Rc;

/// Where the interpreter writes its output.
pub trait OutputSink {
    /// Writes one line of normal output.
    fn write_line(&mut self, text: &str);

    /// Writes one line of diagnostic output.  Defaults to `write_line`.
    fn write_error(&mut self, text: &str) {
        self.write_line(text);
    }

    /// Writes a prompt without a trailing newline.  Defaults to `write_line`.
    fn write_prompt(&mut self, text: &str) {
        self.write_line(text);
    }
}

/// Where the debugger reads its commands.
pub trait InputSource {
    /// Reads one line, without its line ending; `None` at end of input.
    fn read_line(&mut self) -> Option<String>;
}

/// Loads and stores script files.
pub trait ScriptSource {
    /// Reads an entire file as UTF-8 text.
    fn load_file(&self, path: &str) -> io::Result<String>;

    /// Writes an entire file, replacing any existing contents.
    fn write_file(&self, path: &str, contents: &str) -> io::Result<()>;
}

/// Writes output to stdout and diagnostics to stderr.
#[derive(Debug, Default)]
pub struct StdOutput;

impl OutputSink for StdOutput {
    fn write_line(&mut self, text: &str) {
        println!("{}", text);
    }

    fn write_error(&mut self, text: &str) {
        eprintln!("{}", text);
    }

    fn write_prompt(&mut self, text: &str) {
        print!("{}", text);
        let _ = io::stdout().flush();
    }
}

/// Reads debugger commands from stdin.
#[derive(Debug, Default)]
pub struct StdInput;

impl InputSource for StdInput {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(&['\n', '\r'][..]).to_string()),
        }
    }
}

/// Reads and writes files on the local filesystem.
#[derive(Debug, Default)]
pub struct FsSource;

impl ScriptSource for FsSource {
    fn load_file(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn write_file(&self, path: &str, contents: &str) -> io::Result<()> {
        fs::write(path, contents)
    }
}

/// An output sink that records lines in memory.  Clones share the same buffer, so a
/// test can hand one clone to the interpreter and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct BufferOutput {
    lines: Rc<RefCell<Vec<String>>>,
    errors: Rc<RefCell<Vec<String>>>,
}

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// The normal output written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// The diagnostics written so far.
    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    /// Discards everything recorded so far.
    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
        self.errors.borrow_mut().clear();
    }
}

impl OutputSink for BufferOutput {
    fn write_line(&mut self, text: &str) {
        self.lines.borrow_mut().push(text.to_string());
    }

    fn write_error(&mut self, text: &str) {
        self.errors.borrow_mut().push(text.to_string());
    }
}

/// An input source that replays a fixed list of lines.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_output_shares_lines() {
        let out = BufferOutput::new();
        let mut sink: Box<dyn OutputSink> = Box::new(out.clone());
        sink.write_line("a");
        sink.write_error("b");
        sink.write_prompt("> ");

        assert_eq!(out.lines(), vec!["a".to_string(), "> ".to_string()]);
        assert_eq!(out.errors(), vec!["b".to_string()]);

        out.clear();
        assert!(out.lines().is_empty());
    }

    #[test]
    fn test_scripted_input() {
        let mut input = ScriptedInput::new(["vars", "c"]);
        assert_eq!(input.read_line().as_deref(), Some("vars"));
        assert_eq!(input.read_line().as_deref(), Some("c"));
        assert_eq!(input.read_line(), None);
    }
}
