//! Tables and the Table Arena
//!
//! A [`Table`] is an ordered-by-key mapping from string keys to [`Value`]s, plus an
//! optional metatable used for prototype-style fallback lookup.  Tables live in a
//! [`TableStore`] owned by the interpreter; a `Value::Table` holds a [`TableId`] into the
//! store, so any number of variables and fields may alias the same table.
//!
//! # Lookup
//!
//! [`TableStore::lookup`] checks the table's own fields first.  On a miss, if the table
//! has a metatable and the metatable's own `__index` field is itself a table, the lookup
//! continues there.  The walk records every table it visits, so a cyclic metatable chain
//! fails with an error instead of looping forever.
//!
//! Tables are never freed; the store lives as long as its interpreter.

use crate::types::InterpError;
use crate::value::Value;
use fnv::FnvBuildHasher;
use std::collections::BTreeMap;
use std::collections::HashSet;

/// The key a metatable uses to name its fallback table.
pub const INDEX_KEY: &str = "__index";

/// The identity of a table in a [`TableStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(usize);

impl TableId {
    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        TableId(index)
    }

    /// The table's index in its store.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An associative container of values with an optional metatable.
#[derive(Debug, Clone, Default)]
pub struct Table {
    fields: BTreeMap<String, Value>,
    metatable: Option<TableId>,
}

impl Table {
    /// Returns true if the table itself (ignoring its metatable) defines the key.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Retrieves an own field, ignoring the metatable.
    pub fn raw_get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    /// The table's own keys, in key order.
    pub fn keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// The table's own values, in key order.
    pub fn values(&self) -> Vec<Value> {
        self.fields.values().cloned().collect()
    }

    /// The table's own fields, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// The number of own fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the table has no own fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The table's metatable, if any.
    pub fn metatable(&self) -> Option<TableId> {
        self.metatable
    }
}

/// The arena that owns every table created by an interpreter.
#[derive(Debug, Default)]
pub struct TableStore {
    tables: Vec<Table>,
}

impl TableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty table and returns its ID.
    pub fn create(&mut self) -> TableId {
        self.tables.push(Table::default());
        TableId(self.tables.len() - 1)
    }

    /// The number of tables created so far.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no tables have been created.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Borrows a table.
    pub fn get(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    /// Mutably borrows a table.
    pub fn get_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.0]
    }

    /// Sets a field on a table.
    pub fn set(&mut self, id: TableId, key: &str, value: Value) {
        self.get_mut(id).set(key, value);
    }

    /// Sets or clears a table's metatable.
    pub fn set_metatable(&mut self, id: TableId, meta: Option<TableId>) {
        self.get_mut(id).metatable = meta;
    }

    /// Looks up a key in a table, falling back through the metatable chain.
    ///
    /// Returns an undefined-key error if no table in the chain defines the key, and a
    /// runtime error if the chain is circular.
    pub fn lookup(&self, id: TableId, key: &str) -> Result<Value, InterpError> {
        let mut visited: HashSet<TableId, FnvBuildHasher> = HashSet::default();
        let mut current = id;

        loop {
            if !visited.insert(current) {
                return Err(InterpError::runtime(format!(
                    "circular metatable chain while looking up \"{}\"",
                    key
                )));
            }

            let table = self.get(current);

            if let Some(value) = table.raw_get(key) {
                return Ok(value.clone());
            }

            match table
                .metatable
                .and_then(|meta| self.get(meta).raw_get(INDEX_KEY))
                .and_then(Value::as_table)
            {
                Some(next) => current = next,
                None => return Err(InterpError::undefined_key(key)),
            }
        }
    }

    /// Returns true if the key resolves in the table or its metatable chain.
    pub fn has(&self, id: TableId, key: &str) -> bool {
        self.lookup(id, key).is_ok()
    }

    /// Renders a table's own fields as a brace list, `{key value ...}`.
    pub fn render(&self, id: TableId) -> String {
        let items: Vec<String> = self
            .get(id)
            .iter()
            .flat_map(|(k, v)| [list_element(k), list_element(&v.to_string())])
            .collect();
        format!("{{{}}}", items.join(" "))
    }
}

/// Quotes a string as a list element: empty strings and strings containing whitespace
/// are wrapped in braces.
pub fn list_element(s: &str) -> String {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        format!("{{{}}}", s)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_and_inherited_lookup() {
        let mut store = TableStore::new();
        let t = store.create();
        let m = store.create();

        store.set(t, "k1", Value::from("own"));
        store.set(m, "k2", Value::from("inherited"));
        store.set(m, INDEX_KEY, Value::Table(m));
        store.set_metatable(t, Some(m));

        assert_eq!(store.lookup(t, "k1"), Ok(Value::from("own")));
        assert_eq!(store.lookup(t, "k2"), Ok(Value::from("inherited")));
        assert_eq!(
            store.lookup(t, "unknown"),
            Err(InterpError::undefined_key("unknown"))
        );
    }

    #[test]
    fn test_metatable_without_index() {
        let mut store = TableStore::new();
        let t = store.create();
        let m = store.create();
        store.set(m, "k2", Value::from(1.0));
        store.set_metatable(t, Some(m));

        // No __index, so the metatable's fields are not visible.
        assert!(store.lookup(t, "k2").is_err());
    }

    #[test]
    fn test_cyclic_chain_fails() {
        let mut store = TableStore::new();
        let a = store.create();
        let b = store.create();
        store.set(a, INDEX_KEY, Value::Table(b));
        store.set(b, INDEX_KEY, Value::Table(a));
        store.set_metatable(a, Some(b));
        store.set_metatable(b, Some(a));

        let err = store.lookup(a, "missing").unwrap_err();
        assert!(err.to_string().contains("circular metatable chain"));
    }

    #[test]
    fn test_keys_values_ordered() {
        let mut store = TableStore::new();
        let t = store.create();
        store.set(t, "b", Value::from(2.0));
        store.set(t, "a", Value::from(1.0));

        let table = store.get(t);
        assert_eq!(table.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(table.values(), vec![Value::from(1.0), Value::from(2.0)]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_render() {
        let mut store = TableStore::new();
        let t = store.create();
        store.set(t, "name", Value::from("John Smith"));
        store.set(t, "age", Value::from(30.0));
        assert_eq!(store.render(t), "{age 30 name {John Smith}}");
    }
}
