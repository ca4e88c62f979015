//! The Tclua Interpreter
//!
//! The [`Interp`] struct is the primary API for embedding Tclua into a Rust application.
//! Given an `Interp`, the application may:
//!
//! * Evaluate scripts and expressions
//! * Check scripts for completeness
//! * Set and get Tclua variables and table fields
//! * Substitute its own output, input and file collaborators
//!
//! # Interp is not Sync!
//!
//! The [`Interp`] is intended for use in a single thread.  It is safe to have `Interps` in
//! different threads, but pass plain `String` data between them: a [`Value`] holding a
//! table is only meaningful to the interpreter that created the table.
//!
//! # Creating an Interpreter
//!
//! [`Interp::new`] creates an interpreter that writes to stdout and stderr, reads
//! debugger commands from stdin, and loads files from the local filesystem.
//! [`Interp::with_host`] lets the application supply those collaborators instead.
//!
//! ```
//! use tclua::Interp;
//! let mut interp = Interp::new();
//!
//! // evaluate scripts, etc.
//! ```
//!
//! # Evaluating Scripts
//!
//! A script is a sequence of commands separated by newlines or semicolons.  There are two
//! ways to run one.
//!
//! [`Interp::eval`] evaluates the script and stops at the first error, returning it.  It
//! returns the value of the last command, or of an explicit top-level `return`.  This is
//! what the REPL uses.
//!
//! ```
//! use tclua::Interp;
//! use tclua::tclua_ok;
//! use tclua::types::*;
//!
//! # let _ = dummy();
//! # fn dummy() -> TcluaResult {
//! let mut interp = Interp::new();
//! let val = interp.eval("set x 4; expr $x * 2")?;
//! assert_eq!(val.to_string(), "8");
//! # tclua_ok!()
//! # }
//! ```
//!
//! [`Interp::run`] is the script driver.  When a command fails it writes a diagnostic to the
//! output collaborator's error stream, records the error, and goes on with the next
//! command; one bad line doesn't abort the script.  It returns a [`ScriptReport`].
//!
//! Every error that escapes a command carries the source line of the command that
//! raised it.
//!
//! # Evaluating Expressions
//!
//! [`Interp::expr`] evaluates a Tclua expression, as the `expr` command does;
//! [`Interp::expr_bool`] and [`Interp::expr_number`] are convenience wrappers.
//!
//! ```
//! use tclua::Interp;
//! use tclua::Value;
//!
//! let mut interp = Interp::new();
//! assert_eq!(interp.expr("2 + 3 * 4"), Ok(Value::from(14.0)));
//! assert_eq!(interp.expr_bool("1 == 1"), Ok(true));
//! ```
//!
//! # Variables and Procedures
//!
//! Global variables live in the interpreter's global scope; each procedure call pushes a
//! frame holding the procedure's parameters and any new names it sets.  See
//! [`scope`](crate::scope) for the resolution rules.  `a.b` and `a(b)` name field `b` of
//! the table held in `a`.
//!
//! Procedure calls nest up to the [recursion limit](Interp::recursion_limit); a deeper
//! call fails with an error rather than exhausting the Rust stack.

use crate::commands::Builtin;
use crate::expr;
use crate::host::FsSource;
use crate::host::InputSource;
use crate::host::OutputSink;
use crate::host::ScriptSource;
use crate::host::StdInput;
use crate::host::StdOutput;
use crate::scope::VariableManager;
use crate::table::TableId;
use crate::table::TableStore;
use crate::table::INDEX_KEY;
use crate::tclua_err;
use crate::tokenizer;
use crate::types::*;
use crate::value::Value;
use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use std::rc::Rc;
use tracing::debug;
use tracing::trace;

#[cfg(feature = "debugger")]
use crate::debugger;
#[cfg(feature = "debugger")]
use crate::debugger::Debugger;

/// The outcome of [`Interp::run`]: the value of the last successful command (or of a
/// top-level `return`), and every error reported along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptReport {
    pub value: Value,
    pub errors: Vec<InterpError>,
}

impl ScriptReport {
    /// Returns true if no command failed.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The Tclua Interpreter.
///
/// The `Interp` struct is the primary API for embedding Tclua into a Rust application.  The
/// application creates an instance of `Interp` and uses it to evaluate Tclua scripts and
/// expressions.  See the [module level documentation](index.html) for an overview.
///
/// # Example
///
/// ```
/// use tclua::types::*;
/// use tclua::Interp;
/// use tclua::Value;
/// use tclua::tclua_ok;
/// # fn dummy() -> TcluaResult {
/// let mut interp = Interp::new();
/// let four = interp.eval("expr {2 + 2}")?;
/// assert_eq!(four, Value::from(4.0));
/// # tclua_ok!()
/// # }
/// ```
pub struct Interp {
    // Procedure Table
    procedures: IndexMap<String, Rc<Procedure>, FnvBuildHasher>,

    // Class and Module Tables, and the classes or modules whose bodies are executing
    classes: IndexMap<String, TableId, FnvBuildHasher>,
    modules: IndexMap<String, TableId, FnvBuildHasher>,
    owners: Vec<Owner>,

    // Variables and tables
    vars: VariableManager,
    tables: TableStore,

    #[cfg(feature = "debugger")]
    debugger: Debugger,

    // Host collaborators
    output: Box<dyn OutputSink>,
    #[cfg_attr(not(feature = "debugger"), allow(dead_code))]
    input: Box<dyn InputSource>,
    source: Box<dyn ScriptSource>,

    // Defines the recursion limit for procedure calls, sourced scripts and definition
    // bodies.
    recursion_limit: usize,

    // Current number of nested levels.
    num_levels: usize,

    // The line of the command being executed.
    current_line: usize,
}

/// The default limit on nested procedure calls.  Each level costs several Rust stack
/// frames; at this depth the interpreter fits in a 2 MB thread stack.
pub const DEFAULT_RECURSION_LIMIT: usize = 100;

/// A class or module whose body is executing.  Procedures it defines are registered
/// under `prefix` and named in its table.
struct Owner {
    prefix: String,
    table: TableId,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

// NOTE: The order of methods in the generated RustDoc depends on the order in this block.
// Consequently, methods are ordered pedagogically.
impl Interp {
    //--------------------------------------------------------------------------------------------
    // Constructors

    /// Creates a new interpreter using the standard collaborators: output to stdout and
    /// stderr, debugger input from stdin, files from the local filesystem.
    ///
    /// ```
    /// # use tclua::Interp;
    /// # use tclua::Value;
    /// let mut interp = Interp::new();
    /// assert_eq!(interp.eval("expr {2 + 2}"), Ok(Value::from(4.0)));
    /// ```
    pub fn new() -> Self {
        Self::with_host(
            Box::new(StdOutput),
            Box::new(StdInput),
            Box::new(FsSource),
        )
    }

    /// Creates a new interpreter with the given collaborators.
    ///
    /// ```
    /// use tclua::Interp;
    /// use tclua::host::{BufferOutput, FsSource, ScriptedInput};
    ///
    /// let out = BufferOutput::new();
    /// let mut interp = Interp::with_host(
    ///     Box::new(out.clone()),
    ///     Box::new(ScriptedInput::default()),
    ///     Box::new(FsSource),
    /// );
    ///
    /// interp.eval("puts hello").unwrap();
    /// assert_eq!(out.lines(), vec!["hello".to_string()]);
    /// ```
    pub fn with_host(
        output: Box<dyn OutputSink>,
        input: Box<dyn InputSource>,
        source: Box<dyn ScriptSource>,
    ) -> Self {
        Self {
            procedures: IndexMap::default(),
            classes: IndexMap::default(),
            modules: IndexMap::default(),
            owners: Vec::new(),
            vars: VariableManager::new(),
            tables: TableStore::new(),
            #[cfg(feature = "debugger")]
            debugger: Debugger::new(),
            output,
            input,
            source,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            num_levels: 0,
            current_line: 0,
        }
    }

    /// Replaces the output collaborator.
    pub fn set_output(&mut self, output: Box<dyn OutputSink>) {
        self.output = output;
    }

    /// Replaces the debugger's input collaborator.
    pub fn set_input(&mut self, input: Box<dyn InputSource>) {
        self.input = input;
    }

    /// Replaces the file collaborator.
    pub fn set_source(&mut self, source: Box<dyn ScriptSource>) {
        self.source = source;
    }

    //--------------------------------------------------------------------------------------------
    // Script and Expression Evaluation

    /// Evaluates a script one command at a time, stopping at the first error.  Returns the
    /// value of the last command in the script, or the value of any explicit `return`
    /// at the script's top level, or the error.  A `break` or `continue` that escapes
    /// the script is an error.
    ///
    /// Line numbers in errors are relative to the start of the script.
    ///
    /// # Example
    ///
    /// ```
    /// # use tclua::Interp;
    /// let mut interp = Interp::new();
    ///
    /// match interp.eval("set a [expr 1 / 0]") {
    ///    Ok(val) => println!("Value: {}", val),
    ///    Err(err) => println!("Error: {}", err.full_message()),
    /// }
    /// ```
    pub fn eval(&mut self, script: &str) -> TcluaResult {
        self.eval_nested(script, 1)
    }

    /// Runs a script as the script driver does: each failing command is reported to the
    /// output collaborator's error stream as `Error: <message>` and recorded, and
    /// execution continues with the next command.  A top-level `return` ends the script.
    ///
    /// ```
    /// use tclua::Interp;
    /// use tclua::Value;
    /// use tclua::host::{BufferOutput, FsSource, ScriptedInput};
    ///
    /// let out = BufferOutput::new();
    /// let mut interp = Interp::with_host(
    ///     Box::new(out.clone()),
    ///     Box::new(ScriptedInput::default()),
    ///     Box::new(FsSource),
    /// );
    ///
    /// let report = interp.run("set x 1\nnonesuch\nset y 2");
    /// assert_eq!(report.value, Value::from(2.0));
    /// assert_eq!(report.errors.len(), 1);
    /// assert_eq!(out.errors(), vec!["Error: Line 2: Runtime error: Unknown command: nonesuch"]);
    /// ```
    pub fn run(&mut self, script: &str) -> ScriptReport {
        let mut report = ScriptReport {
            value: Value::Null,
            errors: Vec::new(),
        };

        for cmd in tokenizer::split_commands(script) {
            let result = self
                .execute_command(&cmd.text, cmd.line)
                .and_then(|flow| match flow {
                    Flow::Break => tclua_err!("invoked \"break\" outside of a loop"),
                    Flow::Continue => tclua_err!("invoked \"continue\" outside of a loop"),
                    flow => Ok(flow),
                });

            match result {
                Ok(Flow::Return(value)) => {
                    report.value = value;
                    break;
                }
                Ok(flow) => report.value = flow.value(),
                Err(err) => self.report_error(&mut report, err, cmd.line),
            }
        }

        report
    }

    fn report_error(&mut self, report: &mut ScriptReport, err: InterpError, line: usize) {
        self.output
            .write_error(&format!("Error: {}", err.full_message()));

        if err.line().is_none() {
            self.output.write_error(&format!("  At line: {}", line));
        }

        report.errors.push(err.or_line(line));
    }

    /// Determines whether or not the script is syntactically complete, i.e., has no
    /// unmatched quotes, brackets, or braces.
    ///
    /// REPLs use this to determine whether or not to ask for another line of input.
    ///
    /// # Example
    ///
    /// ```
    /// # use tclua::Interp;
    /// let interp = Interp::new();
    /// assert!(interp.complete("set a [expr {1+1}]"));
    /// assert!(!interp.complete("set a [expr {1+1"));
    /// ```
    pub fn complete(&self, script: &str) -> bool {
        tokenizer::is_complete(script)
    }

    /// Evaluates a script as a control structure's body.  `base_line` is the source line
    /// on which the body begins.  Returns the flow of the first command that doesn't
    /// complete normally, or the normal value of the last command.
    pub fn eval_body(&mut self, body: &str, base_line: usize) -> FlowResult {
        let mut result = Value::Null;

        for cmd in tokenizer::split_commands(body) {
            let line = base_line + cmd.line - 1;

            match self.execute_command(&cmd.text, line)? {
                Flow::Normal(value) => result = value,
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal(result))
    }

    /// Evaluates a nested script, e.g., a sourced file, returning its value.  `return`
    /// ends the script; `break` and `continue` may not escape it.
    pub(crate) fn eval_nested(&mut self, script: &str, base_line: usize) -> TcluaResult {
        match self.eval_body(script, base_line)? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
            Flow::Break => tclua_err!("invoked \"break\" outside of a loop"),
            Flow::Continue => tclua_err!("invoked \"continue\" outside of a loop"),
        }
    }

    /// Evaluates the text of a sourced script file.  Sourcing counts against the
    /// recursion limit, so a script that sources itself fails cleanly.
    pub(crate) fn source_script(&mut self, script: &str) -> TcluaResult {
        self.enter_level()?;
        let result = self.eval_nested(script, 1);
        self.leave_level();
        result
    }

    /// Evaluates a bracketed command substitution on the current line.
    pub(crate) fn eval_substitution(&mut self, script: &str) -> TcluaResult {
        let line = self.current_line;
        let result = self.eval_nested(script, line);
        self.current_line = line;
        result
    }

    /// Evaluates a command argument word: a number, a quoted or braced string, a
    /// `$variable`, a `[command]`, or an expression built from them.
    pub fn eval_word(&mut self, word: &str) -> TcluaResult {
        expr::evaluate(self, word)
    }

    /// Evaluates a Tclua expression and returns its value.
    ///
    /// # Example
    ///
    /// ```
    /// # use tclua::Interp;
    /// # use tclua::Value;
    /// let mut interp = Interp::new();
    /// assert_eq!(interp.expr("\"ab\" + \"cd\""), Ok(Value::from("abcd")));
    /// assert!(interp.expr("10 / 0").is_err());
    /// ```
    pub fn expr(&mut self, expr: &str) -> TcluaResult {
        expr::evaluate(self, expr)
    }

    /// Evaluates an expression and returns its truthiness.
    pub fn expr_bool(&mut self, expr: &str) -> Result<bool, InterpError> {
        Ok(self.expr(expr)?.is_truthy())
    }

    /// Evaluates an expression and returns its value as a number, or an error if it
    /// isn't one.
    pub fn expr_number(&mut self, expr: &str) -> Result<f64, InterpError> {
        let value = self.expr(expr)?;
        value.as_number().ok_or_else(|| {
            InterpError::type_mismatch(format!("expected number but got \"{}\"", value))
        })
    }

    //--------------------------------------------------------------------------------------------
    // Command Dispatch

    /// Executes one command: tokenizes it, gives the debugger a chance to pause, and
    /// dispatches it.  Errors leave stamped with `line` unless they already carry a line.
    fn execute_command(&mut self, text: &str, line: usize) -> FlowResult {
        let words = tokenizer::tokenize(text);

        if words.is_empty() {
            return Ok(Flow::Normal(Value::Null));
        }

        let lines: Vec<usize> = tokenizer::word_line_offsets(text, &words)
            .into_iter()
            .map(|offset| line + offset)
            .collect();

        self.current_line = line;
        trace!(line, command = %words[0], "dispatch");

        self.debug_check(line, &words);
        self.current_line = line;

        self.dispatch(&words, &lines)
            .map_err(|err| err.or_line(line))
    }

    fn debug_check(&mut self, line: usize, words: &[String]) {
        cfg_if::cfg_if! {
            if #[cfg(feature = "debugger")] {
                debugger::check(self, line, words);
            } else {
                let _ = (line, words);
            }
        }
    }

    /// Dispatch order: built-in commands, then procedures, then `obj.method` calls.
    fn dispatch(&mut self, words: &[String], lines: &[usize]) -> FlowResult {
        let name = words[0].as_str();
        let args = &words[1..];

        if let Some(builtin) = Builtin::lookup(name) {
            return builtin.execute(self, args, &lines[1..]);
        }

        if let Some(proc) = self.procedures.get(name).cloned() {
            return self
                .call_procedure(&proc, args, None, lines[0])
                .map(Flow::Normal);
        }

        if let Some((this, proc)) = self.resolve_method(name) {
            return self
                .call_procedure(&proc, args, Some(this), lines[0])
                .map(Flow::Normal);
        }

        tclua_err!("Unknown command: {}", name)
    }

    /// Resolves `obj.method` to the object and the procedure named by the object's
    /// `method` field, which may be inherited through its metatable.
    fn resolve_method(&self, name: &str) -> Option<(Value, Rc<Procedure>)> {
        let (obj, method) = name.rsplit_once('.')?;
        let this = self.var(obj).ok()?;
        let proc_name = self.tables.lookup(this.as_table()?, method).ok()?;
        let proc = self.procedures.get(&proc_name.to_string())?.clone();
        Some((this, proc))
    }

    /// Checks arity, evaluates the argument words in the caller's scope, and executes
    /// the procedure.
    fn call_procedure(
        &mut self,
        proc: &Procedure,
        args: &[String],
        this: Option<Value>,
        line: usize,
    ) -> TcluaResult {
        if args.len() != proc.params.len() {
            return tclua_err!("Wrong number of arguments for procedure {}", proc.name);
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_word(arg)?);
        }

        proc.execute(self, values, this, line)
    }

    //--------------------------------------------------------------------------------------------
    // Procedures and Classes

    /// Defines a procedure, replacing any existing procedure of the same name.  While a
    /// class body is executing, the procedure becomes a method: it is registered as
    /// `Class.name` and the class's `name` field names it.  In a module body it is
    /// registered as `module::name` in the same way.
    pub(crate) fn define_proc(&mut self, name: &str, params: Vec<String>, body: &str, body_line: usize) {
        let full_name = match self.owners.last() {
            Some(owner) => {
                let full_name = format!("{}{}", owner.prefix, name);
                self.tables
                    .set(owner.table, name, Value::from(full_name.as_str()));
                full_name
            }
            None => name.to_string(),
        };

        let proc = Procedure {
            name: full_name.clone(),
            params,
            body: body.to_string(),
            body_line,
        };

        self.procedures.insert(full_name, Rc::new(proc));
    }

    /// Creates a class table bound to the variable `name`.  The class's `__index` is
    /// the class itself, so instances inherit its fields.  If there's a body, it is
    /// executed with `self` bound to the class.
    pub(crate) fn define_class(&mut self, name: &str, body: Option<(&str, usize)>) -> Result<TableId, InterpError> {
        // FIRST, create the class table.
        let id = self.tables.create();
        self.tables.set(id, INDEX_KEY, Value::Table(id));
        self.classes.insert(name.to_string(), id);
        self.set_var(name, Value::Table(id))?;
        debug!(class = %name, "class created");

        // NEXT, populate it.
        if let Some((body, body_line)) = body {
            let owner = Owner {
                prefix: format!("{}.", name),
                table: id,
            };
            self.eval_definition(&format!("class {}", name), owner, body, body_line)?;
        }

        Ok(id)
    }

    /// Creates a module: a table bound to the variable `name`, whose fields are read and
    /// written as `name::field`.  Defining an existing module again reopens it.  If
    /// there's a body, it is executed with `self` bound to the module, and the
    /// procedures it defines are registered as `name::proc`.
    pub(crate) fn define_module(&mut self, name: &str, body: Option<(&str, usize)>) -> Result<TableId, InterpError> {
        // FIRST, find or create the module table.
        let id = match self.modules.get(name) {
            Some(&id) => id,
            None => {
                let id = self.tables.create();
                self.modules.insert(name.to_string(), id);
                debug!(module = %name, "module created");
                id
            }
        };
        self.set_var(name, Value::Table(id))?;

        // NEXT, populate it.
        if let Some((body, body_line)) = body {
            let owner = Owner {
                prefix: format!("{}::", name),
                table: id,
            };
            self.eval_definition(&format!("module {}", name), owner, body, body_line)?;
        }

        Ok(id)
    }

    /// Imports a module's procedures: each `name::proc` also becomes callable as
    /// `proc`.  Returns the imported names.
    pub(crate) fn import_module(&mut self, name: &str) -> Result<Vec<String>, InterpError> {
        let id = match self.modules.get(name) {
            Some(&id) => id,
            None => return tclua_err!("Undefined module: {}", name),
        };

        let mut imported = Vec::new();
        for (key, value) in self.tables.get(id).iter() {
            let full_name = format!("{}::{}", name, key);
            if value.to_string() != full_name {
                continue;
            }
            if let Some(proc) = self.procedures.get(&full_name) {
                imported.push((key.clone(), proc.clone()));
            }
        }

        debug!(module = %name, count = imported.len(), "module imported");

        Ok(imported
            .into_iter()
            .map(|(key, proc)| {
                self.procedures.insert(key.clone(), proc);
                key
            })
            .collect())
    }

    /// Executes a class or module body in a frame of its own, with `self` bound to the
    /// owner's table.
    fn eval_definition(&mut self, frame: &str, owner: Owner, body: &str, body_line: usize) -> Result<(), InterpError> {
        self.enter_level()?;

        let table = owner.table;
        self.owners.push(owner);
        self.vars.call_stack_mut().push(frame, self.current_line);
        self.vars.bind_local("self", Value::Table(table));

        let result = self.eval_body(body, body_line);

        self.vars.call_stack_mut().pop();
        self.owners.pop();
        self.leave_level();

        match result? {
            Flow::Normal(_) | Flow::Return(_) => Ok(()),
            Flow::Break => tclua_err!("invoked \"break\" outside of a loop"),
            Flow::Continue => tclua_err!("invoked \"continue\" outside of a loop"),
        }
    }

    /// Creates an instance of the class: a table whose metatable is the class.  If the
    /// class defines an `init` method, it is called with the arguments.
    pub(crate) fn new_instance(&mut self, class: &str, args: &[String]) -> Result<TableId, InterpError> {
        let class_id = match self.classes.get(class) {
            Some(&id) => id,
            None => return tclua_err!("Undefined class: {}", class),
        };

        let id = self.tables.create();
        self.tables.set_metatable(id, Some(class_id));

        let init = self
            .tables
            .lookup(class_id, "init")
            .ok()
            .and_then(|name| self.procedures.get(&name.to_string()).cloned());

        match init {
            Some(proc) => {
                let line = self.current_line;
                self.call_procedure(&proc, args, Some(Value::Table(id)), line)?;
            }
            None if !args.is_empty() => {
                return tclua_err!("class {} has no init method to take arguments", class);
            }
            None => (),
        }

        Ok(id)
    }

    /// Returns true if a procedure with the name is defined.
    pub fn has_proc(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    /// The names of the defined procedures, in definition order.
    pub fn proc_names(&self) -> Vec<String> {
        self.procedures.keys().cloned().collect()
    }

    /// The body of the named procedure.
    pub fn proc_body(&self, name: &str) -> Option<&str> {
        self.procedures.get(name).map(|proc| proc.body.as_str())
    }

    /// Returns the class table with the given name.
    pub fn class(&self, name: &str) -> Option<TableId> {
        self.classes.get(name).copied()
    }

    /// Returns the module table with the given name.
    pub fn module(&self, name: &str) -> Option<TableId> {
        self.modules.get(name).copied()
    }

    //--------------------------------------------------------------------------------------------
    // Variable Handling

    /// Retrieves the value of the named variable or table field in the current scope.
    ///
    /// # Example
    ///
    /// ```
    /// # use tclua::Interp;
    /// # use tclua::Value;
    /// let mut interp = Interp::new();
    /// interp.eval("set p.name Ann").unwrap();
    /// assert_eq!(interp.var("p.name"), Ok(Value::from("Ann")));
    /// assert_eq!(interp.var("p(name)"), Ok(Value::from("Ann")));
    /// ```
    pub fn var(&self, name: &str) -> TcluaResult {
        self.vars.get(&self.tables, name)
    }

    /// Returns true if the named variable or table field resolves.
    pub fn var_exists(&self, name: &str) -> bool {
        self.vars.exists(&self.tables, name)
    }

    /// Sets the named variable or table field in the current scope.
    pub fn set_var(&mut self, name: &str, value: Value) -> Result<(), InterpError> {
        self.vars.set(&mut self.tables, name, value)
    }

    /// The interpreter's variables.
    pub fn vars(&self) -> &VariableManager {
        &self.vars
    }

    /// The interpreter's tables.
    pub fn tables(&self) -> &TableStore {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut TableStore {
        &mut self.tables
    }

    //--------------------------------------------------------------------------------------------
    // Host Access

    /// Writes a line to the output collaborator.
    pub(crate) fn write_line(&mut self, text: &str) {
        self.output.write_line(text);
    }

    #[cfg_attr(not(feature = "debugger"), allow(dead_code))]
    pub(crate) fn write_prompt(&mut self, text: &str) {
        self.output.write_prompt(text);
    }

    #[cfg_attr(not(feature = "debugger"), allow(dead_code))]
    pub(crate) fn read_input(&mut self) -> Option<String> {
        self.input.read_line()
    }

    #[cfg_attr(not(feature = "file"), allow(dead_code))]
    pub(crate) fn source(&self) -> &dyn ScriptSource {
        self.source.as_ref()
    }

    /// The debugger's state.
    #[cfg(feature = "debugger")]
    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    #[cfg(feature = "debugger")]
    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    /// The line of the command most recently dispatched.
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    //--------------------------------------------------------------------------------------------
    // Interpreter Configuration

    /// Gets the interpreter's recursion limit: how deep the stack of procedure calls may be.
    ///
    /// # Example
    /// ```
    /// # use tclua::interp::Interp;
    /// let interp = Interp::new();
    /// assert_eq!(interp.recursion_limit(), 100);
    /// ```
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Sets the interpreter's recursion limit: how deep the stack of procedure calls may
    /// be.  Sourced scripts and class and module bodies count as levels too.  The default
    /// is 100.
    ///
    /// Each call level consumes Rust stack, so raise the limit only when the interpreter
    /// runs on a thread with a correspondingly large stack.
    ///
    /// # Example
    /// ```
    /// # use tclua::interp::Interp;
    /// let mut interp = Interp::new();
    /// interp.set_recursion_limit(50);
    /// assert_eq!(interp.recursion_limit(), 50);
    /// ```
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    fn enter_level(&mut self) -> Result<(), InterpError> {
        if self.num_levels >= self.recursion_limit {
            return tclua_err!("too many nested calls (infinite recursion?)");
        }
        self.num_levels += 1;
        Ok(())
    }

    fn leave_level(&mut self) {
        self.num_levels -= 1;
    }
}

/// How a procedure is defined: as a parameter list and a body script, plus the line on
/// which the body begins, so that errors and breakpoints inside it get true line numbers.
struct Procedure {
    /// The procedure's full name: `name`, `Class.name` for a method, or `module::name`.
    name: String,

    /// The procedure's formal parameters.
    params: Vec<String>,

    /// The procedure's body.
    body: String,

    /// The source line on which the body begins.
    body_line: usize,
}

impl Procedure {
    fn execute(&self, interp: &mut Interp, args: Vec<Value>, this: Option<Value>, line: usize) -> TcluaResult {
        // FIRST, check the number of nesting levels.
        interp.enter_level()?;

        // NEXT, push the proc's frame onto the stack and bind its parameters.
        interp.vars.call_stack_mut().push(&self.name, line);

        if let Some(this) = this {
            interp.vars.bind_local("self", this);
        }

        for (param, arg) in self.params.iter().zip(args) {
            interp.vars.bind_local(param, arg);
        }

        debug!(proc = %self.name, depth = interp.num_levels, "enter procedure");

        // NEXT, evaluate the proc's body, getting the result.
        let result = interp.eval_body(&self.body, self.body_line);

        // NEXT, pop the frame off of the stack; we're done with it.
        interp.vars.call_stack_mut().pop();
        interp.leave_level();

        debug!(proc = %self.name, "leave procedure");

        match result? {
            Flow::Normal(_) => Ok(Value::from(0.0)),
            Flow::Return(value) => Ok(value),
            Flow::Break => tclua_err!("invoked \"break\" outside of a loop"),
            Flow::Continue => tclua_err!("invoked \"continue\" outside of a loop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BufferOutput;
    use crate::host::ScriptedInput;

    fn buffered() -> (Interp, BufferOutput) {
        let out = BufferOutput::new();
        let mut interp = Interp::with_host(
            Box::new(out.clone()),
            Box::new(ScriptedInput::default()),
            Box::new(FsSource),
        );
        interp.set_recursion_limit(50);
        (interp, out)
    }

    // Shows that the result is an error with the given message.  Ignores the line.
    fn err_match(r: &TcluaResult, expected: &str) -> bool {
        match r {
            Err(e) => e.to_string() == expected,
            Ok(_) => false,
        }
    }

    #[test]
    fn test_new() {
        let interp = Interp::new();
        assert!(interp.proc_names().is_empty());
        assert_eq!(interp.recursion_limit(), DEFAULT_RECURSION_LIMIT);
    }

    #[test]
    fn test_eval() {
        let (mut interp, _) = buffered();

        assert_eq!(interp.eval("set a 1"), Ok(Value::from(1.0)));
        assert_eq!(interp.eval("return 3"), Ok(Value::from(3.0)));
        assert_eq!(interp.eval("return 3; set a 4"), Ok(Value::from(3.0)));
        assert_eq!(interp.eval("set a"), Ok(Value::from(1.0)));
        assert_eq!(interp.eval(""), Ok(Value::Null));
        assert!(err_match(
            &interp.eval("break"),
            "Runtime error: invoked \"break\" outside of a loop"
        ));
        assert!(err_match(
            &interp.eval("continue"),
            "Runtime error: invoked \"continue\" outside of a loop"
        ));
        assert!(err_match(
            &interp.eval("nonesuch 1 2"),
            "Runtime error: Unknown command: nonesuch"
        ));
    }

    #[test]
    fn test_eval_stops_at_first_error() {
        let (mut interp, out) = buffered();

        let err = interp.eval("puts a\nset x [expr 1 / 0]\nputs b").unwrap_err();
        assert!(err.is_division_by_zero());
        assert_eq!(err.line(), Some(2));
        assert_eq!(out.lines(), vec!["a".to_string()]);
    }

    #[test]
    fn test_run_reports_and_continues() {
        let (mut interp, out) = buffered();

        let report = interp.run("puts a\nset x $nonesuch\nputs b\nexpr 1 +");
        assert!(!report.is_ok());
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].line(), Some(2));
        assert!(report.errors[0].is_undefined_variable());
        assert!(report.errors[1].is_syntax());

        assert_eq!(out.lines(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            out.errors()[0],
            "Error: Line 2: Runtime error: Undefined variable: nonesuch"
        );
    }

    #[test]
    fn test_run_return_ends_script() {
        let (mut interp, out) = buffered();

        let report = interp.run("puts a\nreturn 7\nputs b");
        assert!(report.is_ok());
        assert_eq!(report.value, Value::from(7.0));
        assert_eq!(out.lines(), vec!["a".to_string()]);

        let report = interp.run("break\nputs c");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(out.lines(), vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_complete() {
        let interp = Interp::new();

        assert!(interp.complete("abc"));
        assert!(interp.complete("a {bc} [def] \"ghi\" xyz"));

        assert!(!interp.complete("a {bc"));
        assert!(!interp.complete("a [bc"));
        assert!(!interp.complete("a \"bc"));
    }

    #[test]
    fn test_expr() {
        let (mut interp, _) = buffered();
        assert_eq!(interp.expr("1 + 2"), Ok(Value::from(3.0)));
        assert_eq!(interp.expr_bool("1 < 2"), Ok(true));
        assert_eq!(interp.expr_bool("\"\""), Ok(false));
        assert_eq!(interp.expr_number("1.5 * 2"), Ok(3.0));
        assert!(interp.expr_number("\"abc\"").is_err());
    }

    #[test]
    fn test_procedures() {
        let (mut interp, _) = buffered();

        interp.eval("proc add {a b} { return [expr $a + $b] }").unwrap();
        assert!(interp.has_proc("add"));
        assert_eq!(interp.eval("add 2 3"), Ok(Value::from(5.0)));
        assert!(err_match(
            &interp.eval("add 1"),
            "Runtime error: Wrong number of arguments for procedure add"
        ));

        // No return yields 0.
        interp.eval("proc noop {} { set x 1 }").unwrap();
        assert_eq!(interp.eval("noop"), Ok(Value::from(0.0)));

        // Redefinition replaces the body.
        interp.eval("proc add {a b} { return [expr $a * $b] }").unwrap();
        assert_eq!(interp.eval("add 2 3"), Ok(Value::from(6.0)));
        assert_eq!(interp.proc_body("add"), Some(" return [expr $a * $b] "));
    }

    #[test]
    fn test_proc_scope() {
        let (mut interp, _) = buffered();

        interp.eval("set g 1").unwrap();
        interp
            .eval("proc f {a} { set g [expr $g + $a]; set tmp 5; return $g }")
            .unwrap();

        assert_eq!(interp.eval("f 10"), Ok(Value::from(11.0)));
        assert_eq!(interp.var("g"), Ok(Value::from(11.0)));
        assert!(!interp.var_exists("tmp"));
        assert!(!interp.var_exists("a"));
        assert_eq!(interp.vars().call_stack().depth(), 0);

        // Frames are popped on error, too.
        interp.eval("proc bad {} { expr 1 / 0 }").unwrap();
        assert!(interp.eval("bad").is_err());
        assert_eq!(interp.vars().call_stack().depth(), 0);
    }

    #[test]
    fn test_break_escaping_proc() {
        let (mut interp, _) = buffered();
        interp.eval("proc f {} { break }").unwrap();
        assert!(err_match(
            &interp.eval("while {1} { f }"),
            "Runtime error: invoked \"break\" outside of a loop"
        ));
    }

    #[test]
    fn test_recursion() {
        let (mut interp, _) = buffered();

        interp
            .eval("proc fact {n} { if {$n <= 1} { return 1 }; return [expr $n * [fact [expr $n - 1]]] }")
            .unwrap();
        assert_eq!(interp.eval("fact 5"), Ok(Value::from(120.0)));
    }

    #[test]
    fn test_recursion_limit() {
        let (mut interp, _) = buffered();

        assert_eq!(interp.recursion_limit(), 50);
        interp.set_recursion_limit(20);
        assert_eq!(interp.recursion_limit(), 20);

        assert!(interp.eval("proc myproc {} { myproc }").is_ok());
        assert!(err_match(
            &interp.eval("myproc"),
            "Runtime error: too many nested calls (infinite recursion?)"
        ));
        assert_eq!(interp.vars().call_stack().depth(), 0);
    }

    #[test]
    fn test_error_lines_in_bodies() {
        let (mut interp, _) = buffered();

        let script = "proc f {} {\n  set a 1\n  expr $a / 0\n}\nf";
        let err = interp.eval(script).unwrap_err();
        assert_eq!(err.line(), Some(3));

        let script = "if {0} {\n  puts a\n} else {\n  nonesuch\n}";
        let err = interp.eval(script).unwrap_err();
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_classes() {
        let (mut interp, out) = buffered();

        let script = "class Person {\n\
                      set self.species human\n\
                      proc init {name} { set self.name $name }\n\
                      proc greet {} { puts \"Hi, I'm $self.name\" }\n\
                      }\n\
                      set p [new Person Ann]\n\
                      p.greet";
        interp.eval(script).unwrap();

        assert_eq!(out.lines(), vec!["Hi, I'm Ann".to_string()]);
        assert_eq!(interp.var("p.name"), Ok(Value::from("Ann")));
        assert_eq!(interp.var("p.species"), Ok(Value::from("human")));
        assert!(interp.has_proc("Person.greet"));
        assert!(interp.class("Person").is_some());

        assert!(err_match(
            &interp.eval("new Robot"),
            "Runtime error: Undefined class: Robot"
        ));
        assert!(err_match(
            &interp.eval("p.fly"),
            "Runtime error: Unknown command: p.fly"
        ));
    }

    #[test]
    fn test_class_without_init() {
        let (mut interp, _) = buffered();

        interp.eval("class Point").unwrap();
        interp.eval("set pt [new Point]").unwrap();
        interp.eval("set pt.x 3").unwrap();
        assert_eq!(interp.var("pt.x"), Ok(Value::from(3.0)));
        assert!(interp.eval("new Point 1 2").is_err());
    }

    #[test]
    fn test_class_bodies_count_as_levels() {
        let (mut interp, _) = buffered();
        interp.set_recursion_limit(3);

        assert!(interp.eval("class A { class B { class C {} } }").is_ok());
        assert!(err_match(
            &interp.eval("class W { class X { class Y { class Z {} } } }"),
            "Runtime error: too many nested calls (infinite recursion?)"
        ));
        assert_eq!(interp.vars().call_stack().depth(), 0);
    }

    #[test]
    fn test_modules() {
        let (mut interp, out) = buffered();

        let script = "module shapes {\n\
                      set self.sides 4\n\
                      proc area {w h} { return [expr $w * $h] }\n\
                      }\n\
                      set shapes::name square\n\
                      puts \"$shapes::name has $shapes::sides sides\"\n\
                      puts [shapes::area 2 3]";
        interp.eval(script).unwrap();

        assert_eq!(out.lines(), vec!["square has 4 sides".to_string(), "6".to_string()]);
        assert!(interp.module("shapes").is_some());
        assert!(interp.has_proc("shapes::area"));
        assert!(!interp.has_proc("area"));

        assert_eq!(interp.eval("import shapes"), Ok(Value::from("area")));
        assert_eq!(interp.eval("area 4 5"), Ok(Value::from(20.0)));

        // Reopening keeps what's there.
        interp.eval("module shapes { proc perimeter {w h} { return [expr 2 * ($w + $h)] } }").unwrap();
        assert_eq!(interp.var("shapes::sides"), Ok(Value::from(4.0)));
        assert_eq!(interp.eval("shapes::perimeter 1 2"), Ok(Value::from(6.0)));

        assert!(err_match(
            &interp.eval("import nowhere"),
            "Runtime error: Undefined module: nowhere"
        ));
    }
}
