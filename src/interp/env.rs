//! Scoped bindings plus the record types they can refer to

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::record::{CellSnapshot, RecordStore};
use super::value::Value;
use crate::ast::TypeAnn;
use crate::diagnostics::{EvalError, Result};

pub type Scope = IndexMap<String, Binding, FxBuildHasher>;

/// A named value
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    /// `var` rather than `let`
    pub mutable: bool,
    /// Declared type; later assignments must conform to it
    pub ty: Option<TypeAnn>,
}

impl Binding {
    pub fn new(value: Value, mutable: bool, ty: Option<TypeAnn>) -> Self {
        Self { value, mutable, ty }
    }
}

/// Lines written by `print`
#[derive(Debug, Clone, Default)]
pub struct Output {
    lines: Vec<String>,
    /// Also write each line to stdout
    echo: bool,
}

impl Output {
    pub fn emit(&mut self, line: String) {
        if self.echo {
            println!("{}", line);
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }
}

/// Everything needed to put an [`Environment`] back as it was
#[derive(Debug)]
pub struct Snapshot {
    scopes: Vec<Scope>,
    records: RecordStore,
    cells: CellSnapshot,
}

/// Variable environment
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
    pub records: RecordStore,
    pub output: Output,
}

impl Environment {
    /// A global scope and the prelude record types
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
            records: RecordStore::with_prelude(),
            output: Output::default(),
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Remove the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    /// Number of open scopes, the global one included
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind in the innermost scope, shadowing any outer binding
    pub fn define(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        tracing::trace!(%name, mutable = binding.mutable, "define");
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, binding);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    /// Mutable binding alongside the record store, for in-place record updates
    pub fn get_mut_with_records(&mut self, name: &str) -> Option<(&mut Binding, &RecordStore)> {
        let records = &self.records;
        self.scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .map(|binding| (binding, records))
    }

    /// Current value of `name`
    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.get(name)
            .map(|b| b.value.clone())
            .ok_or_else(|| EvalError::unbound(name))
    }

    /// Global bindings in definition order
    pub fn bindings(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.scopes.iter().flat_map(|scope| scope.iter())
    }

    /// Drop every binding, user-defined record type and output line
    pub fn reset(&mut self) {
        self.scopes = vec![Scope::default()];
        self.records = RecordStore::with_prelude();
        self.output.clear();
    }

    /// Save bindings, record types and the contents of every shared instance
    /// they can reach. Output is not part of the snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let values = self
            .bindings()
            .map(|(_, binding)| &binding.value)
            .chain(self.records.default_values());
        Snapshot {
            scopes: self.scopes.clone(),
            records: self.records.clone(),
            cells: CellSnapshot::capture(values),
        }
    }

    /// Return to the state saved by [`Environment::snapshot`]
    pub fn restore(&mut self, snapshot: Snapshot) {
        snapshot.cells.restore();
        self.scopes = snapshot.scopes;
        self.records = snapshot.records;
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
