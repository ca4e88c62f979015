//! Variable Scopes
//!
//! The [`VariableManager`] stores Tclua variables.  Global variables live in a flat map;
//! each active procedure call has a [`Frame`] on the [`CallStack`] holding its local
//! bindings.  Only the innermost frame is visible: a procedure sees its own locals and
//! the globals, never its caller's locals.
//!
//! # Resolution rules
//!
//! * A name the current frame defines as a local always refers to that local.
//! * `a.b` and `a(b)` refer to field `b` of the table held by variable `a`.  Setting
//!   such a field turns `a` into a fresh table first if it isn't one already.  Paths
//!   nest: `a.b.c` is field `c` of the table in field `b` of `a`.
//! * Any other name refers to a global.  When a frame is active, setting a name that is
//!   neither local nor global creates a local in the frame; setting an existing global
//!   updates the global.

use crate::table::TableId;
use crate::table::TableStore;
use crate::types::InterpError;
use crate::types::TcluaResult;
use crate::value::Value;
use fnv::FnvBuildHasher;
use indexmap::IndexMap;

type VarMap = IndexMap<String, Value, FnvBuildHasher>;

/// One call-stack entry: the callee's name, the line of the call site, and the
/// callee's local variables.
#[derive(Debug, Clone)]
pub struct Frame {
    name: String,
    line: usize,
    locals: VarMap,
}

impl Frame {
    /// The name of the procedure (or construct) that pushed the frame.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The line of the call site.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The frame's local variables, in binding order.
    pub fn locals(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.locals.iter()
    }
}

/// The stack of active procedure-call frames.
#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Frame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new, empty frame.
    pub fn push(&mut self, name: &str, line: usize) {
        self.frames.push(Frame {
            name: name.to_string(),
            line,
            locals: VarMap::default(),
        });
    }

    /// Pops the innermost frame.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The innermost frame, if any.
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Binds a local in the innermost frame.  Does nothing if no frame is active.
    pub fn set_local(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.insert(name.to_string(), value);
        }
    }

    /// Retrieves a local from the innermost frame.
    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.frames.last().and_then(|frame| frame.locals.get(name))
    }

    /// Removes a local from the innermost frame, returning its value.
    pub fn remove_local(&mut self, name: &str) -> Option<Value> {
        self.frames
            .last_mut()
            .and_then(|frame| frame.locals.shift_remove(name))
    }

    /// Returns true if the innermost frame defines the name.
    pub fn has_local(&self, name: &str) -> bool {
        self.get_local(name).is_some()
    }

    /// The frames, outermost first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The number of active frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Where a variable binding lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Local,
    Global,
}

/// Scoped storage of named values.
#[derive(Debug, Default)]
pub struct VariableManager {
    globals: VarMap,
    call_stack: CallStack,
}

impl VariableManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The call stack consulted for local bindings.
    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    pub fn call_stack_mut(&mut self) -> &mut CallStack {
        &mut self.call_stack
    }

    /// Sets a variable or table field, following the resolution rules.
    pub fn set(&mut self, tables: &mut TableStore, name: &str, value: Value) -> Result<(), InterpError> {
        if self.call_stack.has_local(name) {
            self.call_stack.set_local(name, value);
            return Ok(());
        }

        let path = split_path(name);

        if path.len() == 1 {
            let name = path[0];
            match self.binding_for(name) {
                Binding::Local => self.call_stack.set_local(name, value),
                Binding::Global => {
                    self.globals.insert(name.to_string(), value);
                }
            }
            return Ok(());
        }

        let base = path[0];
        let mut id = match self.lookup_binding(base).and_then(Value::as_table) {
            Some(id) => id,
            None => {
                let id = tables.create();
                self.bind(base, Value::Table(id));
                id
            }
        };

        let last = path.len() - 1;
        for key in &path[1..last] {
            id = match tables.get(id).raw_get(key).and_then(Value::as_table) {
                Some(child) => child,
                None => {
                    let child = tables.create();
                    tables.set(id, key, Value::Table(child));
                    child
                }
            };
        }

        tables.set(id, path[last], value);
        Ok(())
    }

    /// Retrieves a variable or table field, following the resolution rules.
    pub fn get(&self, tables: &TableStore, name: &str) -> TcluaResult {
        if let Some(value) = self.call_stack.get_local(name) {
            return Ok(value.clone());
        }

        let path = split_path(name);

        if path.len() == 1 {
            return self
                .globals
                .get(path[0])
                .cloned()
                .ok_or_else(|| InterpError::undefined_variable(name));
        }

        let mut id = self
            .lookup_binding(path[0])
            .and_then(Value::as_table)
            .ok_or_else(|| InterpError::undefined_variable(name))?;

        let last = path.len() - 1;
        for (i, key) in path[1..last].iter().enumerate() {
            let value = tables.lookup(id, key)?;
            id = value.as_table().ok_or_else(|| {
                InterpError::type_mismatch(format!(
                    "\"{}\" is not a table",
                    path[..=i + 1].join(".")
                ))
            })?;
        }

        tables.lookup(id, path[last])
    }

    /// Returns true if the name resolves to a value.
    pub fn exists(&self, tables: &TableStore, name: &str) -> bool {
        self.get(tables, name).is_ok()
    }

    /// Binds a name directly in the innermost frame, e.g., a procedure parameter.
    pub fn bind_local(&mut self, name: &str, value: Value) {
        self.call_stack.set_local(name, value);
    }

    /// Binds a plain name in the scope it resolves to, bypassing path parsing.
    pub fn bind(&mut self, name: &str, value: Value) {
        match self.binding_for(name) {
            Binding::Local => self.call_stack.set_local(name, value),
            Binding::Global => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    /// Removes a plain name from the scope it resolves to, returning the old value.
    pub fn unbind(&mut self, name: &str) -> Option<Value> {
        if self.call_stack.has_local(name) {
            self.call_stack.remove_local(name)
        } else if self.call_stack.is_empty() {
            self.globals.shift_remove(name)
        } else {
            None
        }
    }

    /// Retrieves the binding of a plain name without path parsing.
    pub fn lookup_binding(&self, name: &str) -> Option<&Value> {
        self.call_stack
            .get_local(name)
            .or_else(|| self.globals.get(name))
    }

    /// The global variables, in binding order.
    pub fn globals(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.globals.iter()
    }

    /// Every variable visible from the current scope: the innermost frame's locals
    /// first, then the globals they don't shadow.
    pub fn visible(&self) -> Vec<(String, Value)> {
        let mut vars: Vec<(String, Value)> = Vec::new();

        if let Some(frame) = self.call_stack.top() {
            for (name, value) in frame.locals() {
                vars.push((name.clone(), value.clone()));
            }
        }

        for (name, value) in &self.globals {
            if !self.call_stack.has_local(name) {
                vars.push((name.clone(), value.clone()));
            }
        }

        vars
    }

    /// Returns the table held by the named variable, if it holds one.
    pub fn table_of(&self, name: &str) -> Option<TableId> {
        self.lookup_binding(name).and_then(Value::as_table)
    }

    fn binding_for(&self, name: &str) -> Binding {
        if self.call_stack.has_local(name) {
            Binding::Local
        } else if self.call_stack.is_empty() || self.globals.contains_key(name) {
            Binding::Global
        } else {
            Binding::Local
        }
    }
}

/// Splits a variable name into its base name and table-field keys: `a.b`, `a::b` and
/// `a(b)` all yield `["a", "b"]`; `a.b(c.d)` yields `["a", "b", "c.d"]`.  A leading
/// `::` names a global and is dropped.
pub fn split_path(name: &str) -> Vec<&str> {
    let name = name.strip_prefix("::").unwrap_or(name);
    let (head, index) = match name.find('(') {
        Some(open) if open > 0 && name.ends_with(')') => {
            (&name[..open], Some(&name[open + 1..name.len() - 1]))
        }
        _ => (name, None),
    };

    let mut path: Vec<&str> = head
        .split("::")
        .flat_map(|part| part.split('.'))
        .collect();
    if let Some(index) = index {
        path.push(index);
    }
    path
}
