//! Standard Tclua Command Definitions
//!
//! The built-in commands form a closed set, [`Builtin`], matched once by name when a
//! command is dispatched.  User-defined procedures live in a separate registry in the
//! [`Interp`] and are consulted only when no built-in matches.
//!
//! Each command is implemented by a function with the signature
//!
//! ```ignore
//! fn cmd_name(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult
//! ```
//!
//! where `args` are the command's raw argument words (excluding the command name) and
//! `lines[i]` is the source line on which `args[i]` begins.  Commands evaluate their
//! own arguments, so control structures can defer evaluation of their bodies.
//!
//! Ensemble commands such as `table` and `string` dispatch on their first argument
//! through a table of [`Subcommand`]s.

use crate::expr::evaluate_condition;
use crate::interp::Interp;
use crate::table::list_element;
use crate::table::TableId;
use crate::tokenizer::strip_braces;
use crate::tokenizer::tokenize;
use crate::tokenizer::word_line_offsets;
use crate::types::*;
use crate::value::Value;
use tracing::debug;

/// The signature of a built-in command.
pub(crate) type BuiltinFunc = fn(&mut Interp, &[String], &[usize]) -> FlowResult;

/// The built-in commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Break,
    Class,
    Continue,
    Expr,
    For,
    If,
    Import,
    Incr,
    Math,
    Module,
    New,
    Proc,
    Puts,
    Return,
    Set,
    Setmetatable,
    String,
    Switch,
    Table,
    Try,
    While,
    #[cfg(feature = "file")]
    File,
    #[cfg(feature = "file")]
    Source,
    #[cfg(feature = "debugger")]
    Breakpoint,
    #[cfg(feature = "debugger")]
    Step,
}

impl Builtin {
    /// Looks up a built-in command by name.
    pub fn lookup(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "break" => Builtin::Break,
            "class" => Builtin::Class,
            "continue" => Builtin::Continue,
            "expr" => Builtin::Expr,
            "for" => Builtin::For,
            "if" => Builtin::If,
            "import" => Builtin::Import,
            "incr" => Builtin::Incr,
            "math" => Builtin::Math,
            "module" => Builtin::Module,
            "new" => Builtin::New,
            "proc" => Builtin::Proc,
            "puts" => Builtin::Puts,
            "return" => Builtin::Return,
            "set" => Builtin::Set,
            "setmetatable" => Builtin::Setmetatable,
            "string" => Builtin::String,
            "switch" => Builtin::Switch,
            "table" => Builtin::Table,
            "try" => Builtin::Try,
            "while" => Builtin::While,
            #[cfg(feature = "file")]
            "file" => Builtin::File,
            #[cfg(feature = "file")]
            "source" => Builtin::Source,
            #[cfg(feature = "debugger")]
            "breakpoint" => Builtin::Breakpoint,
            #[cfg(feature = "debugger")]
            "step" => Builtin::Step,
            _ => return None,
        };

        Some(builtin)
    }

    /// Executes the command with its raw argument words and their source lines.
    pub(crate) fn execute(self, interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
        let func: BuiltinFunc = match self {
            Builtin::Break => cmd_break,
            Builtin::Class => cmd_class,
            Builtin::Continue => cmd_continue,
            Builtin::Expr => cmd_expr,
            Builtin::For => cmd_for,
            Builtin::If => cmd_if,
            Builtin::Import => cmd_import,
            Builtin::Incr => cmd_incr,
            Builtin::Math => cmd_math,
            Builtin::Module => cmd_module,
            Builtin::New => cmd_new,
            Builtin::Proc => cmd_proc,
            Builtin::Puts => cmd_puts,
            Builtin::Return => cmd_return,
            Builtin::Set => cmd_set,
            Builtin::Setmetatable => cmd_setmetatable,
            Builtin::String => cmd_string,
            Builtin::Switch => cmd_switch,
            Builtin::Table => cmd_table,
            Builtin::Try => cmd_try,
            Builtin::While => cmd_while,
            #[cfg(feature = "file")]
            Builtin::File => cmd_file,
            #[cfg(feature = "file")]
            Builtin::Source => cmd_source,
            #[cfg(feature = "debugger")]
            Builtin::Breakpoint => crate::debugger::cmd_breakpoint,
            #[cfg(feature = "debugger")]
            Builtin::Step => crate::debugger::cmd_step,
        };

        func(interp, args, lines)
    }
}

fn normal(value: Value) -> FlowResult {
    Ok(Flow::Normal(value))
}

//-----------------------------------------------------------------------------------------
// Variables and Expressions

/// # set *varName* ?*value*?
///
/// Sets the variable to the value of the expression, returning the value.  With one
/// argument, returns the variable's current value.
pub fn cmd_set(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("set", args, 1, 2, "varName ?value?")?;

    if args.len() == 1 {
        return normal(interp.var(&args[0])?);
    }

    let value = interp.eval_word(&args[1])?;
    interp.set_var(&args[0], value.clone())?;
    normal(value)
}

/// # expr *expr* ?*expr* ...?
///
/// Concatenates the arguments with spaces and evaluates the result as an expression.
/// A single braced argument is evaluated without its braces.
pub fn cmd_expr(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("expr", args, 1, 0, "expr ?expr ...?")?;
    normal(interp.expr(&joined_expr(args))?)
}

fn joined_expr(args: &[String]) -> String {
    if args.len() == 1 {
        strip_braces(&args[0]).to_string()
    } else {
        args.join(" ")
    }
}

/// # incr *varName* ?*increment*?
pub fn cmd_incr(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("incr", args, 1, 2, "varName ?increment?")?;

    let step = match args.get(1) {
        Some(word) => number_arg(interp, word)?,
        None => 1.0,
    };

    let current = interp.var(&args[0])?;
    let base = match current {
        Value::Number(n) => n,
        Value::String(_) => current.as_number().ok_or_else(|| not_a_number(&current))?,
        _ => return Err(not_a_number(&current)),
    };

    let value = Value::from(base + step);
    interp.set_var(&args[0], value.clone())?;
    normal(value)
}

/// # puts ?*value* ...?
///
/// Writes each argument's value to the output on a line of its own.
pub fn cmd_puts(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    for arg in args {
        let text = interp.eval_word(arg)?.to_string();
        interp.write_line(&text);
    }

    normal(Value::Null)
}

//-----------------------------------------------------------------------------------------
// Control Structures

/// # if *cond* *body* ?elseif *cond* *body* ...? ?else *body*?
pub fn cmd_if(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    const USAGE: &str = "cond body ?elseif cond body ...? ?else body?";
    check_args("if", args, 2, 0, USAGE)?;

    let mut i = 0;

    loop {
        if i + 1 >= args.len() {
            return Err(usage_error("if", USAGE));
        }

        if evaluate_condition(interp, &args[i])? {
            return interp.eval_body(strip_braces(&args[i + 1]), lines[i + 1]);
        }

        i += 2;

        if i >= args.len() {
            return normal(Value::Null);
        }

        match args[i].as_str() {
            "elseif" => i += 1,
            "else" if i + 2 == args.len() => {
                return interp.eval_body(strip_braces(&args[i + 1]), lines[i + 1]);
            }
            _ => return Err(usage_error("if", USAGE)),
        }
    }
}

/// # while *cond* *body*
pub fn cmd_while(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    check_args("while", args, 2, 2, "cond body")?;

    let body = strip_braces(&args[1]);

    while evaluate_condition(interp, &args[0])? {
        match interp.eval_body(body, lines[1])? {
            Flow::Normal(_) | Flow::Continue => (),
            Flow::Break => break,
            flow @ Flow::Return(_) => return Ok(flow),
        }
    }

    normal(Value::Null)
}

/// # for *start* *test* *next* *body*
pub fn cmd_for(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    check_args("for", args, 4, 4, "start test next body")?;

    let start = strip_braces(&args[0]);
    let next = strip_braces(&args[2]);
    let body = strip_braces(&args[3]);

    // Start
    match interp.eval_body(start, lines[0])? {
        Flow::Normal(_) => (),
        flow => return Ok(flow),
    }

    while evaluate_condition(interp, &args[1])? {
        match interp.eval_body(body, lines[3])? {
            Flow::Normal(_) | Flow::Continue => (),
            Flow::Break => break,
            flow @ Flow::Return(_) => return Ok(flow),
        }

        match interp.eval_body(next, lines[2])? {
            Flow::Normal(_) => (),
            flow => return Ok(flow),
        }
    }

    normal(Value::Null)
}

/// # break
pub fn cmd_break(_interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    if !args.is_empty() {
        return Err(usage_error("break", ""));
    }
    Ok(Flow::Break)
}

/// # continue
pub fn cmd_continue(_interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    if !args.is_empty() {
        return Err(usage_error("continue", ""));
    }
    Ok(Flow::Continue)
}

/// # return ?*value*?
///
/// Returns from the enclosing procedure.  The value defaults to 0; several arguments are
/// joined and evaluated as one expression.
pub fn cmd_return(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    let value = match args.len() {
        0 => Value::from(0.0),
        1 => interp.eval_word(&args[0])?,
        _ => interp.expr(&args.join(" "))?,
    };

    Ok(Flow::Return(value))
}

/// # switch *value* *pattern* *body* ?*pattern* *body* ...?
///
/// The arms may also be given as a single braced list.  Patterns are evaluated and
/// compared with the value as strings; `default` matches anything.
pub fn cmd_switch(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    check_args("switch", args, 2, 0, "value pattern body ?pattern body ...?")?;

    let value = interp.eval_word(&args[0])?.to_string();

    let (arms, arm_lines): (Vec<String>, Vec<usize>) = if args.len() == 2 {
        let text = strip_braces(&args[1]);
        let words = tokenize(text);
        let arm_lines = word_line_offsets(text, &words)
            .into_iter()
            .map(|offset| lines[1] + offset)
            .collect();
        (words, arm_lines)
    } else {
        (args[1..].to_vec(), lines[1..].to_vec())
    };

    if arms.len() % 2 != 0 {
        return Err(InterpError::runtime("extra switch pattern with no body"));
    }

    for (i, pair) in arms.chunks(2).enumerate() {
        let matched = pair[0] == "default" || interp.eval_word(&pair[0])?.to_string() == value;

        if matched {
            return interp.eval_body(strip_braces(&pair[1]), arm_lines[2 * i + 1]);
        }
    }

    Err(InterpError::runtime(format!(
        "switch: no matching case for \"{}\"",
        value
    )))
}

/// # try *body* ?catch *errVar* *catchBody*?
///
/// Executes the body.  If it fails, binds the error message to *errVar* and executes
/// the catch body; the error goes no further.  `return`, `break` and `continue` in the
/// body are not errors, and pass through.
pub fn cmd_try(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    const USAGE: &str = "body ?catch errVar catchBody?";
    check_args("try", args, 1, 4, USAGE)?;

    if args.len() != 1 && (args.len() != 4 || args[1] != "catch") {
        return Err(usage_error("try", USAGE));
    }

    match interp.eval_body(strip_braces(&args[0]), lines[0]) {
        Ok(flow) => Ok(flow),
        Err(err) => {
            debug!(error = %err, "try caught error");

            if args.len() == 1 {
                return normal(Value::Null);
            }

            interp.set_var(&args[2], Value::from(err.payload()))?;
            interp.eval_body(strip_braces(&args[3]), lines[3])
        }
    }
}

//-----------------------------------------------------------------------------------------
// Procedures and Classes

/// # proc *name* *params* *body*
///
/// Defines a procedure, replacing any existing procedure with the same name.  Inside a
/// class body, defines a method of the class.
pub fn cmd_proc(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    check_args("proc", args, 3, 3, "name params body")?;

    let params: Vec<String> = strip_braces(&args[1])
        .split_whitespace()
        .map(String::from)
        .collect();

    interp.define_proc(&args[0], params, strip_braces(&args[2]), lines[2]);
    normal(Value::Null)
}

/// # class *name* ?*body*?
pub fn cmd_class(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    check_args("class", args, 1, 2, "name ?body?")?;

    let body = args.get(1).map(|body| (strip_braces(body), lines[1]));
    let id = interp.define_class(&args[0], body)?;
    normal(Value::Table(id))
}

/// # module *name* ?*body*?
///
/// Creates or reopens a module.  Its variables are `name::var`; procedures defined in
/// the body are `name::proc`.
pub fn cmd_module(interp: &mut Interp, args: &[String], lines: &[usize]) -> FlowResult {
    check_args("module", args, 1, 2, "name ?body?")?;

    let body = args.get(1).map(|body| (strip_braces(body), lines[1]));
    let id = interp.define_module(&args[0], body)?;
    normal(Value::Table(id))
}

/// # import *name*
///
/// Makes a module's procedures callable without the `name::` prefix.  Returns the list
/// of imported names.
pub fn cmd_import(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("import", args, 1, 1, "name")?;

    let names = interp.import_module(&args[0])?;
    normal(Value::from(names.join(" ")))
}

/// # new *className* ?*arg* ...?
pub fn cmd_new(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("new", args, 1, 0, "className ?arg ...?")?;

    let id = interp.new_instance(&args[0], &args[1..])?;
    normal(Value::Table(id))
}

/// # setmetatable *table* *metatable*
pub fn cmd_setmetatable(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("setmetatable", args, 2, 2, "table metatable")?;

    let target = table_arg(interp, &args[0])?;
    let meta = table_arg(interp, &args[1])?;
    interp.tables_mut().set_metatable(target, Some(meta));
    normal(Value::Table(target))
}

//-----------------------------------------------------------------------------------------
// Tables

const TABLE_SUBCOMMANDS: [Subcommand; 8] = [
    Subcommand("create", cmd_table_create),
    Subcommand("exists", cmd_table_exists),
    Subcommand("get", cmd_table_get),
    Subcommand("keys", cmd_table_keys),
    Subcommand("set", cmd_table_set),
    Subcommand("setdefault", cmd_table_setdefault),
    Subcommand("size", cmd_table_size),
    Subcommand("values", cmd_table_values),
];

/// # table *subcommand* ?*arg* ...?
pub fn cmd_table(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    call_subcommand(interp, "table", args, &TABLE_SUBCOMMANDS)
}

/// # table create ?*varName*?
fn cmd_table_create(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 1, 2, "create ?varName?")?;

    let value = Value::Table(interp.tables_mut().create());
    if let Some(name) = args.get(1) {
        interp.set_var(name, value.clone())?;
    }
    Ok(value)
}

/// # table exists *table* *key*
fn cmd_table_exists(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 3, 3, "exists table key")?;

    let id = table_arg(interp, &args[1])?;
    let key = interp.eval_word(&args[2])?.to_string();
    Ok(Value::from(interp.tables().has(id, &key)))
}

/// # table get *table* ?*key*?
///
/// Without a key, returns the table's own fields as a `{key value ...}` list.
fn cmd_table_get(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 2, 3, "get table ?key?")?;

    let id = table_arg(interp, &args[1])?;
    match args.get(2) {
        Some(word) => {
            let key = interp.eval_word(word)?.to_string();
            interp.tables().lookup(id, &key)
        }
        None => Ok(Value::from(interp.tables().render(id))),
    }
}

/// # table keys *table*
fn cmd_table_keys(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 2, 2, "keys table")?;

    let id = table_arg(interp, &args[1])?;
    let keys: Vec<String> = interp
        .tables()
        .get(id)
        .keys()
        .iter()
        .map(|k| list_element(k))
        .collect();
    Ok(Value::from(keys.join(" ")))
}

/// # table set *table* *key* *value*
fn cmd_table_set(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 4, 4, "set table key value")?;

    let id = table_arg(interp, &args[1])?;
    let key = interp.eval_word(&args[2])?.to_string();
    let value = interp.eval_word(&args[3])?;
    interp.tables_mut().set(id, &key, value.clone());
    Ok(value)
}

/// # table setdefault *table* *key* *value*
///
/// Sets the key only if the table doesn't already define it; returns the key's value.
fn cmd_table_setdefault(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 4, 4, "setdefault table key value")?;

    let id = table_arg(interp, &args[1])?;
    let key = interp.eval_word(&args[2])?.to_string();

    if let Some(value) = interp.tables().get(id).raw_get(&key) {
        return Ok(value.clone());
    }

    let value = interp.eval_word(&args[3])?;
    interp.tables_mut().set(id, &key, value.clone());
    Ok(value)
}

/// # table size *table*
fn cmd_table_size(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 2, 2, "size table")?;

    let id = table_arg(interp, &args[1])?;
    Ok(Value::from(interp.tables().get(id).len()))
}

/// # table values *table*
fn cmd_table_values(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("table", args, 2, 2, "values table")?;

    let id = table_arg(interp, &args[1])?;
    let values: Vec<String> = interp
        .tables()
        .get(id)
        .values()
        .iter()
        .map(|v| list_element(&v.to_string()))
        .collect();
    Ok(Value::from(values.join(" ")))
}

/// Resolves a command argument naming a table: `$var` and `[cmd]` words are evaluated,
/// anything else is taken as a variable name.
fn table_arg(interp: &mut Interp, word: &str) -> Result<TableId, InterpError> {
    let value = if word.starts_with('$') || word.starts_with('[') {
        interp.eval_word(word)?
    } else {
        interp.var(word)?
    };

    value
        .as_table()
        .ok_or_else(|| InterpError::runtime(format!("\"{}\" is not a table", word)))
}

//-----------------------------------------------------------------------------------------
// Strings

const STRING_SUBCOMMANDS: [Subcommand; 8] = [
    Subcommand("equal", cmd_string_equal),
    Subcommand("index", cmd_string_index),
    Subcommand("length", cmd_string_length),
    Subcommand("range", cmd_string_range),
    Subcommand("repeat", cmd_string_repeat),
    Subcommand("tolower", cmd_string_tolower),
    Subcommand("toupper", cmd_string_toupper),
    Subcommand("trim", cmd_string_trim),
];

/// # string *subcommand* ?*arg* ...?
pub fn cmd_string(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    call_subcommand(interp, "string", args, &STRING_SUBCOMMANDS)
}

fn cmd_string_equal(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 3, 3, "equal string1 string2")?;
    let a = interp.eval_word(&args[1])?.to_string();
    let b = interp.eval_word(&args[2])?.to_string();
    Ok(Value::from(a == b))
}

fn cmd_string_index(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 3, 3, "index string charIndex")?;
    let s = interp.eval_word(&args[1])?.to_string();
    let index = int_arg(interp, &args[2])?;

    if index < 0 {
        return Ok(Value::empty());
    }

    Ok(s.chars()
        .nth(index as usize)
        .map(|c| Value::from(c.to_string()))
        .unwrap_or_else(Value::empty))
}

fn cmd_string_length(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 2, 2, "length string")?;
    let s = interp.eval_word(&args[1])?.to_string();
    Ok(Value::from(s.chars().count()))
}

fn cmd_string_range(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 4, 4, "range string first last")?;
    let s = interp.eval_word(&args[1])?.to_string();
    let len = s.chars().count() as i64;
    let first = int_arg(interp, &args[2])?.max(0);
    let last = int_arg(interp, &args[3])?.min(len - 1);

    if first > last {
        return Ok(Value::empty());
    }

    let range: String = s
        .chars()
        .skip(first as usize)
        .take((last - first + 1) as usize)
        .collect();
    Ok(Value::from(range))
}

/// The longest string `string repeat` will build.
const MAX_STRING_LEN: usize = 1 << 24;

fn cmd_string_repeat(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 3, 3, "repeat string count")?;
    let s = interp.eval_word(&args[1])?.to_string();
    let count = int_arg(interp, &args[2])?;

    if count <= 0 {
        return Ok(Value::empty());
    }

    let too_long = usize::try_from(count)
        .ok()
        .and_then(|count| count.checked_mul(s.len()))
        .map_or(true, |len| len > MAX_STRING_LEN);

    if too_long {
        return Err(InterpError::runtime(format!(
            "string repeat: result would exceed {} bytes",
            MAX_STRING_LEN
        )));
    }

    Ok(Value::from(s.repeat(count as usize)))
}

fn cmd_string_tolower(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 2, 2, "tolower string")?;
    Ok(Value::from(interp.eval_word(&args[1])?.to_string().to_lowercase()))
}

fn cmd_string_toupper(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 2, 2, "toupper string")?;
    Ok(Value::from(interp.eval_word(&args[1])?.to_string().to_uppercase()))
}

fn cmd_string_trim(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("string", args, 2, 2, "trim string")?;
    Ok(Value::from(interp.eval_word(&args[1])?.to_string().trim()))
}

//-----------------------------------------------------------------------------------------
// Math

const MATH_SUBCOMMANDS: [Subcommand; 14] = [
    Subcommand("abs", cmd_math_unary),
    Subcommand("ceil", cmd_math_unary),
    Subcommand("cos", cmd_math_unary),
    Subcommand("exp", cmd_math_unary),
    Subcommand("floor", cmd_math_unary),
    Subcommand("int", cmd_math_unary),
    Subcommand("log", cmd_math_unary),
    Subcommand("max", cmd_math_extreme),
    Subcommand("min", cmd_math_extreme),
    Subcommand("pow", cmd_math_pow),
    Subcommand("round", cmd_math_unary),
    Subcommand("sin", cmd_math_unary),
    Subcommand("sqrt", cmd_math_unary),
    Subcommand("tan", cmd_math_unary),
];

/// # math *function* *arg* ?*arg* ...?
pub fn cmd_math(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    call_subcommand(interp, "math", args, &MATH_SUBCOMMANDS)
}

fn cmd_math_unary(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("math", args, 2, 2, &format!("{} x", args[0]))?;
    let x = number_arg(interp, &args[1])?;

    let result = match args[0].as_str() {
        "abs" => x.abs(),
        "ceil" => x.ceil(),
        "cos" => x.cos(),
        "exp" => x.exp(),
        "floor" => x.floor(),
        "int" => x.trunc(),
        "round" => x.round(),
        "sin" => x.sin(),
        "tan" => x.tan(),
        "log" => {
            if x <= 0.0 {
                return Err(InterpError::runtime(format!(
                    "math log: argument out of range: {}",
                    Value::from(x)
                )));
            }
            x.ln()
        }
        _ => {
            if x < 0.0 {
                return Err(InterpError::runtime(format!(
                    "math sqrt: argument out of range: {}",
                    Value::from(x)
                )));
            }
            x.sqrt()
        }
    };

    Ok(Value::from(result))
}

fn cmd_math_pow(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("math", args, 3, 3, "pow x y")?;
    let x = number_arg(interp, &args[1])?;
    let y = number_arg(interp, &args[2])?;
    Ok(Value::from(x.powf(y)))
}

fn cmd_math_extreme(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("math", args, 2, 0, &format!("{} x ?x ...?", args[0]))?;

    let mut result = number_arg(interp, &args[1])?;
    for word in &args[2..] {
        let x = number_arg(interp, word)?;
        result = if args[0] == "max" {
            result.max(x)
        } else {
            result.min(x)
        };
    }

    Ok(Value::from(result))
}

//-----------------------------------------------------------------------------------------
// Files

#[cfg(feature = "file")]
const FILE_SUBCOMMANDS: [Subcommand; 2] = [
    Subcommand("read", cmd_file_read),
    Subcommand("write", cmd_file_write),
];

/// # file read|write *path* ?*text*?
#[cfg(feature = "file")]
pub fn cmd_file(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    call_subcommand(interp, "file", args, &FILE_SUBCOMMANDS)
}

#[cfg(feature = "file")]
fn cmd_file_read(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("file", args, 2, 2, "read path")?;

    let path = interp.eval_word(&args[1])?.to_string();
    let text = interp.source().load_file(&path).map_err(|err| {
        InterpError::runtime(format!("couldn't read file \"{}\": {}", path, err))
    })?;
    Ok(Value::from(text))
}

#[cfg(feature = "file")]
fn cmd_file_write(interp: &mut Interp, args: &[String]) -> TcluaResult {
    check_args("file", args, 3, 3, "write path text")?;

    let path = interp.eval_word(&args[1])?.to_string();
    let text = interp.eval_word(&args[2])?.to_string();
    interp.source().write_file(&path, &text).map_err(|err| {
        InterpError::runtime(format!("couldn't write file \"{}\": {}", path, err))
    })?;
    Ok(Value::Null)
}

/// # source *path*
///
/// Loads a script file and evaluates it in the current scope.  A `return` at the file's
/// top level ends the file.
#[cfg(feature = "file")]
pub fn cmd_source(interp: &mut Interp, args: &[String], _lines: &[usize]) -> FlowResult {
    check_args("source", args, 1, 1, "path")?;

    let path = interp.eval_word(&args[0])?.to_string();
    let script = interp.source().load_file(&path).map_err(|err| {
        InterpError::runtime(format!("couldn't read file \"{}\": {}", path, err))
    })?;

    debug!(path = %path, "sourcing script");
    normal(interp.source_script(&script)?)
}

//-----------------------------------------------------------------------------------------
// Helpers

fn call_subcommand(
    interp: &mut Interp,
    cmd: &str,
    args: &[String],
    ensemble: &[Subcommand],
) -> FlowResult {
    check_args(cmd, args, 1, 0, "subcommand ?arg ...?")?;
    let subcmd = Subcommand::find(ensemble, &args[0])?;
    (subcmd.1)(interp, args).map(Flow::Normal)
}

/// The standard `wrong # args` error, for commands whose argument structure
/// `check_args` can't express.
fn usage_error(cmd: &str, usage: &str) -> InterpError {
    if usage.is_empty() {
        InterpError::runtime(format!("wrong # args: should be \"{}\"", cmd))
    } else {
        InterpError::runtime(format!("wrong # args: should be \"{} {}\"", cmd, usage))
    }
}

fn not_a_number(value: &Value) -> InterpError {
    InterpError::type_mismatch(format!("expected number but got \"{}\"", value))
}

fn number_arg(interp: &mut Interp, word: &str) -> Result<f64, InterpError> {
    let value = interp.eval_word(word)?;
    value.as_number().ok_or_else(|| not_a_number(&value))
}

fn int_arg(interp: &mut Interp, word: &str) -> Result<i64, InterpError> {
    let value = interp.eval_word(word)?;
    match value.as_number() {
        Some(n) if n.fract() == 0.0 => Ok(n as i64),
        _ => Err(InterpError::type_mismatch(format!(
            "expected integer but got \"{}\"",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Interp {
        let mut interp = Interp::new();
        interp.set_recursion_limit(50);
        interp
    }

    fn err_msg(result: TcluaResult) -> String {
        match result {
            Err(err) => err.to_string(),
            Ok(value) => panic!("expected error, got {:?}", value),
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::lookup("set"), Some(Builtin::Set));
        assert_eq!(Builtin::lookup("setmetatable"), Some(Builtin::Setmetatable));
        assert_eq!(Builtin::lookup("nonesuch"), None);
    }

    #[test]
    fn test_set() {
        let mut interp = interp();
        assert_eq!(interp.eval("set a 1"), Ok(Value::from(1.0)));
        assert_eq!(interp.eval("set a"), Ok(Value::from(1.0)));
        assert_eq!(interp.eval("set b {x y}"), Ok(Value::from("x y")));
        assert_eq!(
            err_msg(interp.eval("set")),
            "Runtime error: wrong # args: should be \"set varName ?value?\""
        );
    }

    #[test]
    fn test_expr() {
        let mut interp = interp();
        assert_eq!(interp.eval("expr 1 + 2"), Ok(Value::from(3.0)));
        assert_eq!(interp.eval("expr {2 * 3}"), Ok(Value::from(6.0)));
        assert_eq!(interp.eval("set x 4; expr $x * $x"), Ok(Value::from(16.0)));
    }

    #[test]
    fn test_incr() {
        let mut interp = interp();
        interp.eval("set n 1").unwrap();
        assert_eq!(interp.eval("incr n"), Ok(Value::from(2.0)));
        assert_eq!(interp.eval("incr n 5"), Ok(Value::from(7.0)));
        assert_eq!(interp.eval("incr n -2"), Ok(Value::from(5.0)));

        interp.eval("set s abc").unwrap();
        assert_eq!(
            err_msg(interp.eval("incr s")),
            "Runtime error: expected number but got \"abc\""
        );
        assert!(interp.eval("incr nonesuch").unwrap_err().is_undefined_variable());
    }

    #[test]
    fn test_if() {
        let mut interp = interp();
        let script = "proc sign {x} {\n\
                      if {$x > 0} { return pos } elseif {$x < 0} { return neg } else { return zero }\n\
                      }";
        interp.eval(script).unwrap();
        assert_eq!(interp.eval("sign 3"), Ok(Value::from("pos")));
        assert_eq!(interp.eval("sign -3"), Ok(Value::from("neg")));
        assert_eq!(interp.eval("sign 0"), Ok(Value::from("zero")));

        assert_eq!(interp.eval("if {0} {set y 1}"), Ok(Value::Null));
        assert!(interp.eval("if {1}").is_err());
        assert!(interp.eval("if {0} {a} bogus {b}").is_err());
    }

    #[test]
    fn test_loops_break_continue() {
        let mut interp = interp();
        let script = "set total 0\n\
                      for {set i 0} {$i < 10} {incr i} {\n\
                          if {$i == 2} { continue }\n\
                          if {$i == 5} { break }\n\
                          set total [expr $total + $i]\n\
                      }\n\
                      set total";
        assert_eq!(interp.eval(script), Ok(Value::from(8.0)));

        let script = "set n 0; while {1} { incr n; if {$n >= 3} { break } }; set n";
        assert_eq!(interp.eval(script), Ok(Value::from(3.0)));
    }

    #[test]
    fn test_break_outside_loop() {
        let mut interp = interp();
        assert_eq!(
            err_msg(interp.eval("break")),
            "Runtime error: invoked \"break\" outside of a loop"
        );
        assert_eq!(
            err_msg(interp.eval("continue")),
            "Runtime error: invoked \"continue\" outside of a loop"
        );
    }

    #[test]
    fn test_switch() {
        let mut interp = interp();
        interp.eval("set v b").unwrap();
        assert_eq!(
            interp.eval("switch $v a {set r 1} b {set r 2} default {set r 3}"),
            Ok(Value::from(2.0))
        );
        assert_eq!(
            interp.eval("switch zz {\n  a {set r 1}\n  default {set r 3}\n}"),
            Ok(Value::from(3.0))
        );
        assert_eq!(
            err_msg(interp.eval("switch q a {set r 1}")),
            "Runtime error: switch: no matching case for \"q\""
        );
        assert!(interp.eval("switch q a").is_err());
    }

    #[test]
    fn test_try() {
        let mut interp = interp();
        assert_eq!(
            interp.eval("try { expr 1 / 0 } catch err { set caught $err }"),
            Ok(Value::from("Runtime error: Division by zero"))
        );
        assert_eq!(interp.eval("try { set q 1 } catch e { set q 2 }"), Ok(Value::from(1.0)));
        assert_eq!(interp.eval("try { nonesuch }"), Ok(Value::Null));
        assert!(interp.eval("try {a} grab e {b}").is_err());

        // The error variable may name a table field.
        interp.eval("try { expr 1 / 0 } catch e.msg { }").unwrap();
        assert_eq!(
            interp.eval("set e.msg"),
            Ok(Value::from("Runtime error: Division by zero"))
        );
        assert!(interp.var("e").unwrap().as_table().is_some());
    }

    #[test]
    fn test_table_commands() {
        let mut interp = interp();
        interp.eval("table create person").unwrap();
        interp.eval("table set person name \"John Smith\"").unwrap();
        interp.eval("table set person age 30").unwrap();

        assert_eq!(interp.eval("table get person name"), Ok(Value::from("John Smith")));
        assert_eq!(
            interp.eval("table get person"),
            Ok(Value::from("{age 30 name {John Smith}}"))
        );
        assert_eq!(interp.eval("table keys person"), Ok(Value::from("age name")));
        assert_eq!(interp.eval("table values $person"), Ok(Value::from("30 {John Smith}")));
        assert_eq!(interp.eval("table size person"), Ok(Value::from(2.0)));
        assert_eq!(interp.eval("table exists person age"), Ok(Value::from(true)));
        assert_eq!(interp.eval("table exists person zip"), Ok(Value::from(false)));
        assert_eq!(interp.eval("table setdefault person age 99"), Ok(Value::from(30.0)));
        assert_eq!(interp.eval("table setdefault person zip 12345"), Ok(Value::from(12345.0)));
        assert_eq!(interp.eval("set person.zip"), Ok(Value::from(12345.0)));

        assert!(interp.eval("table get person nonesuch").is_err());
        assert!(interp.eval("table frob person").is_err());
        interp.eval("set scalar 1").unwrap();
        assert_eq!(
            err_msg(interp.eval("table keys scalar")),
            "Runtime error: \"scalar\" is not a table"
        );
    }

    #[test]
    fn test_string_commands() {
        let mut interp = interp();
        assert_eq!(interp.eval("string length \"hello\""), Ok(Value::from(5.0)));
        assert_eq!(interp.eval("string toupper abc"), Ok(Value::from("ABC")));
        assert_eq!(interp.eval("string tolower ABC"), Ok(Value::from("abc")));
        assert_eq!(interp.eval("string trim \"  a b  \""), Ok(Value::from("a b")));
        assert_eq!(interp.eval("string index hello 1"), Ok(Value::from("e")));
        assert_eq!(interp.eval("string index hello 10"), Ok(Value::from("")));
        assert_eq!(interp.eval("string range hello 1 3"), Ok(Value::from("ell")));
        assert_eq!(interp.eval("string range hello 3 100"), Ok(Value::from("lo")));
        assert_eq!(interp.eval("string equal abc abc"), Ok(Value::from(true)));
        assert_eq!(interp.eval("string repeat ab 3"), Ok(Value::from("ababab")));
        assert_eq!(interp.eval("string repeat ab 0"), Ok(Value::empty()));
        assert_eq!(
            interp.eval("string repeat abc 1e18"),
            Err(InterpError::runtime("string repeat: result would exceed 16777216 bytes").at_line(1))
        );
        assert_eq!(
            err_msg(interp.eval("string frob x")),
            "Runtime error: unknown or ambiguous subcommand \"frob\": must be equal, index, \
             length, range, repeat, tolower, toupper, or trim"
        );
    }

    #[test]
    fn test_math_commands() {
        let mut interp = interp();
        assert_eq!(interp.eval("math sqrt 16"), Ok(Value::from(4.0)));
        assert_eq!(interp.eval("math abs -3"), Ok(Value::from(3.0)));
        assert_eq!(interp.eval("math floor 2.7"), Ok(Value::from(2.0)));
        assert_eq!(interp.eval("math ceil 2.1"), Ok(Value::from(3.0)));
        assert_eq!(interp.eval("math pow 2 10"), Ok(Value::from(1024.0)));
        assert_eq!(interp.eval("math max 1 7 3"), Ok(Value::from(7.0)));
        assert_eq!(interp.eval("math min 4 2 8"), Ok(Value::from(2.0)));
        assert_eq!(interp.eval("math sin 0"), Ok(Value::from(0.0)));
        assert!(interp.eval("math sqrt -1").is_err());
        assert!(interp.eval("math log 0").is_err());
        assert!(interp.eval("math sin abc").is_err());
    }

    #[test]
    fn test_setmetatable() {
        let mut interp = interp();
        interp.eval("set base.greeting hello").unwrap();
        interp.eval("set base.__index $base").unwrap();
        interp.eval("set obj.own 1").unwrap();
        interp.eval("setmetatable obj base").unwrap();

        assert_eq!(interp.eval("set obj.greeting"), Ok(Value::from("hello")));
        assert_eq!(interp.eval("set obj.own"), Ok(Value::from(1.0)));
        assert!(interp.eval("setmetatable obj 5").is_err());
    }
}
