//! Record types and instances
//!
//! A record type fixes its field set, each field's mutability and the record's
//! [`RecordKind`] when it is defined. Value records (`struct`) are deep-copied
//! whenever the [`Value`] holding them is cloned, so every binding owns an
//! independent instance. Reference records (`class`) share one instance
//! between all bindings, and a mutation through any of them is visible to all.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::value::Value;
use crate::ast::{Expr, ExprKind, Literal, MethodDecl, Stmt, TypeAnn};
use crate::common::Span;
use crate::diagnostics::{EvalError, Result};

/// Confirmation returned by `fortify`
pub const FORTIFY_MESSAGE: &str = "Defenses increased!";

/// Copy-on-bind or shared-reference semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `struct`: binding copies the instance
    Value,
    /// `class`: binding aliases the instance
    Reference,
}

/// Whether an instance may be mutated at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Mutable,
    Immutable,
}

/// Field definition
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub mutable: bool,
    pub ty: Option<TypeAnn>,
    pub default: Option<Value>,
}

/// Record type definition
#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: String,
    pub kind: RecordKind,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<Rc<MethodDecl>>,
}

impl RecordType {
    pub fn new(name: impl Into<String>, kind: RecordKind) -> Self {
        Self {
            name: name.into(),
            kind,
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Builder: add a field
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        mutable: bool,
        ty: Option<TypeAnn>,
        default: Option<Value>,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            mutable,
            ty,
            default,
        });
        self
    }

    /// Builder: add a method
    pub fn with_method(mut self, method: MethodDecl) -> Self {
        self.methods.push(Rc::new(method));
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<Rc<MethodDecl>> {
        self.methods.iter().find(|m| m.name == name).cloned()
    }

    /// `struct Town { let name = "Disneyland"; var citizens = ["Catariana", "Louis"] }`,
    /// or its `class` counterpart
    pub fn town(kind: RecordKind) -> Self {
        RecordType::new("Town", kind)
            .with_field(
                "name",
                false,
                Some(simple_type("String")),
                Some(Value::str("Disneyland")),
            )
            .with_field(
                "citizens",
                true,
                Some(list_type("String")),
                Some(Value::from(vec!["Catariana", "Louis"])),
            )
            .with_method(fortify_method())
    }

    /// `class Enemy { var health = 100; var attackStrength = 10 }`
    pub fn enemy() -> Self {
        RecordType::new("Enemy", RecordKind::Reference)
            .with_field("health", true, Some(simple_type("Int")), Some(Value::Int(100)))
            .with_field(
                "attackStrength",
                true,
                Some(simple_type("Int")),
                Some(Value::Int(10)),
            )
    }
}

/// `func fortify() -> String { "Defenses increased!" }`
fn fortify_method() -> MethodDecl {
    let message = Expr::new(
        ExprKind::Literal(Literal::String(FORTIFY_MESSAGE.to_string())),
        Span::default(),
    );
    MethodDecl {
        name: "fortify".to_string(),
        mutating: false,
        params: Vec::new(),
        ret: Some(simple_type("String")),
        body: vec![Stmt::Expr(message)],
        span: Span::default(),
    }
}

fn simple_type(name: &str) -> TypeAnn {
    TypeAnn::named(name)
}

fn list_type(name: &str) -> TypeAnn {
    TypeAnn {
        name: name.to_string(),
        list: true,
        optional: false,
    }
}

/// Field storage of one instance
#[derive(Debug, Clone)]
pub struct RecordData {
    ty: Rc<RecordType>,
    fields: IndexMap<String, Value>,
    permission: Permission,
}

impl RecordData {
    /// Validate that `field` may be written, returning its definition
    fn writable(&self, field: &str) -> Result<&FieldDef> {
        let def = self.ty.field(field).ok_or_else(|| EvalError::UnknownField {
            record: self.ty.name.clone(),
            field: field.to_string(),
            span: None,
        })?;
        if !def.mutable || self.permission == Permission::Immutable {
            return Err(EvalError::immutable(format!("{}.{}", self.ty.name, field)));
        }
        Ok(def)
    }
}

/// A record instance
#[derive(Debug, Clone)]
pub enum Record {
    Value(Box<RecordData>),
    Reference(Rc<RefCell<RecordData>>),
}

impl Record {
    fn from_data(data: RecordData) -> Self {
        match data.ty.kind {
            RecordKind::Value => Record::Value(Box::new(data)),
            RecordKind::Reference => Record::Reference(Rc::new(RefCell::new(data))),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&RecordData) -> R) -> R {
        match self {
            Record::Value(data) => f(data),
            Record::Reference(cell) => f(&cell.borrow()),
        }
    }

    fn with_mut<R>(&mut self, f: impl FnOnce(&mut RecordData) -> R) -> R {
        match self {
            Record::Value(data) => f(data),
            Record::Reference(cell) => f(&mut cell.borrow_mut()),
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Value(_) => RecordKind::Value,
            Record::Reference(_) => RecordKind::Reference,
        }
    }

    pub fn record_type(&self) -> Rc<RecordType> {
        self.with(|data| data.ty.clone())
    }

    /// A method declared by the instance's type
    pub fn method(&self, name: &str) -> Option<Rc<MethodDecl>> {
        self.with(|data| data.ty.method(name))
    }

    pub fn type_name(&self) -> String {
        self.with(|data| data.ty.name.clone())
    }

    pub fn permission(&self) -> Permission {
        self.with(|data| data.permission)
    }

    /// Re-bind with a new permission. Only value records change: a reference
    /// record's permission belongs to the shared instance, not to the binding.
    pub fn with_permission(self, permission: Permission) -> Record {
        match self {
            Record::Value(mut data) => {
                data.permission = permission;
                Record::Value(data)
            }
            reference => reference,
        }
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.with(|data| data.fields.get(field).cloned())
    }

    /// Snapshot of all fields in declaration order
    pub fn fields(&self) -> Vec<(String, Value)> {
        self.with(|data| {
            data.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    /// Whether both handles refer to the same shared instance
    pub fn ptr_eq(&self, other: &Record) -> bool {
        match (self, other) {
            (Record::Reference(a), Record::Reference(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn check_acyclic(&self, value: &Value) -> Result<()> {
        if let Record::Reference(cell) = self {
            if reaches(value, cell) {
                return Err(EvalError::mismatch(
                    "a value that does not contain the record itself",
                    "a reference cycle",
                ));
            }
        }
        Ok(())
    }

    /// Overwrite a `var` field
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        let def = self.with(|data| data.writable(field).cloned())?;
        let value = match &def.ty {
            Some(ty) => value.conform(ty)?,
            None => value,
        };
        self.check_acyclic(&value)?;

        tracing::debug!(field, "set record field");
        self.with_mut(|data| {
            data.fields.insert(field.to_string(), value);
        });
        Ok(())
    }

    /// Append to the end of a `var` list field
    pub fn append(&mut self, field: &str, value: Value) -> Result<()> {
        let def = self.with(|data| data.writable(field).cloned())?;
        let value = match def.ty.as_ref().filter(|ty| ty.list) {
            Some(ty) => value.conform(&ty.element())?,
            None => value,
        };
        self.check_acyclic(&value)?;

        self.with_mut(|data| match data.fields.get_mut(field) {
            Some(Value::List(items)) => {
                items.push(value);
                Ok(())
            }
            Some(other) => Err(EvalError::mismatch("List", other.type_name())),
            None => Err(EvalError::UnknownField {
                record: data.ty.name.clone(),
                field: field.to_string(),
                span: None,
            }),
        })
    }

    /// Apply `f` to a `var` list field in place
    pub fn update_list(&mut self, field: &str, f: impl FnOnce(&mut Vec<Value>)) -> Result<()> {
        self.with(|data| data.writable(field).map(|_| ()))?;
        self.with_mut(|data| match data.fields.get_mut(field) {
            Some(Value::List(items)) => {
                f(items);
                Ok(())
            }
            Some(other) => Err(EvalError::mismatch("List", other.type_name())),
            None => Ok(()),
        })
    }
}

/// Whether `target` is reachable from `value`
fn reaches(value: &Value, target: &Rc<RefCell<RecordData>>) -> bool {
    match value {
        Value::List(items) => items.iter().any(|v| reaches(v, target)),
        Value::Optional(Some(inner)) => reaches(inner, target),
        Value::Record(Record::Value(data)) => data.fields.values().any(|v| reaches(v, target)),
        Value::Record(Record::Reference(cell)) => {
            Rc::ptr_eq(cell, target) || cell.borrow().fields.values().any(|v| reaches(v, target))
        }
        _ => false,
    }
}

/// Saved contents of shared (`class`) instances, so that writes through any
/// alias can be undone
#[derive(Debug, Default)]
pub struct CellSnapshot {
    cells: Vec<(Rc<RefCell<RecordData>>, RecordData)>,
}

impl CellSnapshot {
    /// Save every shared instance reachable from `values`
    pub fn capture<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut snapshot = Self::default();
        for value in values {
            snapshot.visit(value);
        }
        snapshot
    }

    fn visit(&mut self, value: &Value) {
        match value {
            Value::List(items) => items.iter().for_each(|v| self.visit(v)),
            Value::Optional(Some(inner)) => self.visit(inner),
            Value::Record(Record::Value(data)) => data.fields.values().for_each(|v| self.visit(v)),
            Value::Record(Record::Reference(cell)) => {
                if self.cells.iter().any(|(saved, _)| Rc::ptr_eq(saved, cell)) {
                    return;
                }
                let data = cell.borrow().clone();
                let nested: Vec<Value> = data.fields.values().cloned().collect();
                self.cells.push((cell.clone(), data));
                nested.iter().for_each(|v| self.visit(v));
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Put the saved contents back
    pub fn restore(self) {
        for (cell, data) in self.cells {
            *cell.borrow_mut() = data;
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.type_name() == other.type_name() && self.fields() == other.fields()
    }
}

/// Registry of record types plus the record operations
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    types: IndexMap<String, Rc<RecordType>>,
}

impl RecordStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the built-in `Town` (struct) and `Enemy` (class) types
    pub fn with_prelude() -> Self {
        let mut store = Self::new();
        store.define(RecordType::town(RecordKind::Value));
        store.define(RecordType::enemy());
        store
    }

    /// Register a type, replacing any previous type of the same name
    pub fn define(&mut self, ty: RecordType) -> Rc<RecordType> {
        let ty = Rc::new(ty);
        tracing::debug!(name = %ty.name, kind = ?ty.kind, "define record type");
        self.types.insert(ty.name.clone(), ty.clone());
        ty
    }

    pub fn get(&self, name: &str) -> Option<Rc<RecordType>> {
        self.types.get(name).cloned()
    }

    pub fn types(&self) -> impl Iterator<Item = &Rc<RecordType>> {
        self.types.values()
    }

    /// Field defaults of every registered type
    pub fn default_values(&self) -> impl Iterator<Item = &Value> {
        self.types
            .values()
            .flat_map(|ty| ty.fields.iter().filter_map(|f| f.default.as_ref()))
    }

    /// Build an instance of a registered type. Labelled arguments set the
    /// named field; unlabelled ones fill the remaining fields in order.
    pub fn instantiate(
        &self,
        type_name: &str,
        args: Vec<(Option<String>, Value)>,
        permission: Permission,
    ) -> Result<Record> {
        let ty = self.get(type_name).ok_or_else(|| EvalError::UnknownType {
            name: type_name.to_string(),
            span: None,
        })?;
        build(ty, args, permission)
    }

    /// A `Town`-shaped instance of the requested kind, mutable
    pub fn create(&self, name: &str, citizens: Vec<String>, kind: RecordKind) -> Record {
        town_instance(name, citizens, kind, Permission::Mutable)
    }

    /// A `Town`-shaped instance without mutable permission
    pub fn create_frozen(&self, name: &str, citizens: Vec<String>, kind: RecordKind) -> Record {
        town_instance(name, citizens, kind, Permission::Immutable)
    }

    pub fn get_field(&self, instance: &Record, field: &str) -> Result<Value> {
        instance.get(field).ok_or_else(|| EvalError::UnknownField {
            record: instance.type_name(),
            field: field.to_string(),
            span: None,
        })
    }

    /// Overwrite a `var` field of a mutable instance
    pub fn set_field(&self, instance: &mut Record, field: &str, value: Value) -> Result<()> {
        instance.set(field, value)
    }

    /// Append to any `var` list field of a mutable instance
    pub fn append(&self, instance: &mut Record, field: &str, value: Value) -> Result<()> {
        instance.append(field, value)
    }

    /// Append to `citizens`, preserving prior order
    pub fn append_citizen(&self, instance: &mut Record, citizen: &str) -> Result<()> {
        self.append(instance, "citizens", Value::str(citizen))
    }

    /// The `fortify` method of `Town`; methods need not mutate state
    pub fn fortify(&self, _instance: &Record) -> String {
        FORTIFY_MESSAGE.to_string()
    }
}

fn town_instance(name: &str, citizens: Vec<String>, kind: RecordKind, permission: Permission) -> Record {
    let mut fields = IndexMap::new();
    fields.insert("name".to_string(), Value::str(name));
    fields.insert("citizens".to_string(), Value::from(citizens));
    Record::from_data(RecordData {
        ty: Rc::new(RecordType::town(kind)),
        fields,
        permission,
    })
}

fn build(
    ty: Rc<RecordType>,
    args: Vec<(Option<String>, Value)>,
    permission: Permission,
) -> Result<Record> {
    let mut given: IndexMap<String, Value> = IndexMap::new();
    let mut positional = Vec::new();

    for (label, value) in args {
        match label {
            Some(label) => {
                if ty.field(&label).is_none() {
                    return Err(EvalError::UnknownField {
                        record: ty.name.clone(),
                        field: label,
                        span: None,
                    });
                }
                given.insert(label, value);
            }
            None => positional.push(value),
        }
    }

    let mut open = ty.fields.iter().filter(|f| !given.contains_key(&f.name));
    let mut filled = Vec::new();
    let found = positional.len();
    for value in positional {
        let def = open.next().ok_or_else(|| EvalError::Arity {
            name: ty.name.clone(),
            expected: ty.fields.len(),
            found,
            span: None,
        })?;
        filled.push((def.name.clone(), value));
    }
    given.extend(filled);

    let mut fields = IndexMap::new();
    for def in &ty.fields {
        let value = match given.shift_remove(&def.name).or_else(|| def.default.clone()) {
            Some(value) => value,
            None => {
                return Err(EvalError::MissingField {
                    record: ty.name.clone(),
                    field: def.name.clone(),
                    span: None,
                });
            }
        };
        let value = match &def.ty {
            Some(ann) => value.conform(ann)?,
            None => value,
        };
        fields.insert(def.name.clone(), value);
    }

    Ok(Record::from_data(RecordData {
        ty,
        fields,
        permission,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(record: &Record) -> Vec<String> {
        match record.get("citizens") {
            Some(Value::List(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => panic!("citizens should be a list"),
        }
    }

    #[test]
    fn test_prelude_defaults() {
        let store = RecordStore::with_prelude();
        let town = store
            .instantiate("Town", vec![], Permission::Mutable)
            .unwrap();
        assert_eq!(town.get("name"), Some(Value::str("Disneyland")));
        assert_eq!(names(&town), vec!["Catariana", "Louis"]);
    }

    #[test]
    fn test_positional_and_labelled_args() {
        let store = RecordStore::with_prelude();
        let town = store
            .instantiate(
                "Town",
                vec![
                    (Some("citizens".to_string()), Value::from(vec!["Tom Hanks"])),
                    (None, Value::str("Munich")),
                ],
                Permission::Mutable,
            )
            .unwrap();
        assert_eq!(town.get("name"), Some(Value::str("Munich")));
        assert_eq!(names(&town), vec!["Tom Hanks"]);
    }

    #[test]
    fn test_value_copy_is_independent() {
        let store = RecordStore::new();
        let original = store.create("Munich", vec![], RecordKind::Value);
        let mut copy = original.clone();
        store.append_citizen(&mut copy, "Richard").unwrap();
        assert!(names(&original).is_empty());
        assert_eq!(names(&copy), vec!["Richard"]);
    }

    #[test]
    fn test_reference_cycle_rejected() {
        let ty = RecordType::new("Node", RecordKind::Reference).with_field(
            "next",
            true,
            None,
            Some(Value::nil()),
        );
        let mut store = RecordStore::new();
        store.define(ty);
        let mut node = store
            .instantiate("Node", vec![], Permission::Mutable)
            .unwrap();
        let alias = Value::Record(node.clone());
        assert!(node.set("next", alias).is_err());
        assert_eq!(node.get("next"), Some(Value::nil()));
    }

    #[test]
    fn test_cell_snapshot_restores_shared_instance() {
        let store = RecordStore::new();
        let town = store.create("Munich", vec!["Tom Hanks".to_string()], RecordKind::Reference);
        let held = Value::List(vec![Value::Record(town.clone())]);
        let snapshot = CellSnapshot::capture([&held, &Value::Record(town.clone())]);
        assert_eq!(snapshot.len(), 1);

        let mut alias = town.clone();
        store.append_citizen(&mut alias, "Richard").unwrap();
        assert_eq!(names(&town), vec!["Tom Hanks", "Richard"]);

        snapshot.restore();
        assert_eq!(names(&town), vec!["Tom Hanks"]);
    }

    #[test]
    fn test_declared_method_lookup() {
        let store = RecordStore::with_prelude();
        let town = store
            .instantiate("Town", vec![], Permission::Mutable)
            .unwrap();
        let fortify = town.method("fortify").unwrap();
        assert!(!fortify.mutating);
        assert!(town.method("harvestRice").is_none());
    }

    #[test]
    fn test_missing_field_without_default() {
        let ty = RecordType::new("Pair", RecordKind::Value)
            .with_field("a", false, None, None)
            .with_field("b", false, None, Some(Value::Int(0)));
        let mut store = RecordStore::new();
        store.define(ty);
        let err = store
            .instantiate("Pair", vec![], Permission::Mutable)
            .unwrap_err();
        assert!(matches!(err, EvalError::MissingField { ref field, .. } if field == "a"));
    }
}
