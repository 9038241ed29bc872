//! Runtime values for the interpreter

use std::fmt;

use super::record::Record;
use crate::ast::TypeAnn;
use crate::diagnostics::{EvalError, Result};

/// Runtime value
#[derive(Clone)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// Boolean
    Bool(bool),
    /// String
    Str(String),
    /// Ordered list
    List(Vec<Value>),
    /// Present (`Some`) or absent (`None`) optional
    Optional(Option<Box<Value>>),
    /// Record instance; copied or shared on bind depending on its kind
    Record(Record),
    /// `()`, the result of a method without a return type
    Void,
}

/// The tag of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Str,
    List,
    Optional,
    Record,
    Void,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Int => "Int",
            ValueKind::Float => "Float",
            ValueKind::Bool => "Bool",
            ValueKind::Str => "String",
            ValueKind::List => "List",
            ValueKind::Optional => "Optional",
            ValueKind::Record => "Record",
            ValueKind::Void => "Void",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    /// The absent optional
    pub fn nil() -> Self {
        Value::Optional(None)
    }

    /// A present optional wrapping `value`
    pub fn some(value: Value) -> Self {
        Value::Optional(Some(Box::new(value)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
            Value::Optional(_) => ValueKind::Optional,
            Value::Record(_) => ValueKind::Record,
            Value::Void => ValueKind::Void,
        }
    }

    /// Name used in diagnostics; records report their declared type
    pub fn type_name(&self) -> String {
        match self {
            Value::Record(record) => record.type_name(),
            Value::Optional(Some(inner)) => format!("{}?", inner.type_name()),
            Value::Optional(None) => "nil".to_string(),
            other => other.kind().to_string(),
        }
    }

    /// Wrap a non-optional value once; optionals are returned unchanged
    pub fn into_optional(self) -> Value {
        match self {
            Value::Optional(_) => self,
            other => Value::some(other),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Optional(None))
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Check `self` against a declared type. Optional annotations wrap a
    /// plain value once, and `Int` widens where `Double`/`Float` is declared.
    pub fn conform(self, ty: &TypeAnn) -> Result<Value> {
        if ty.optional {
            let inner = ty.non_optional();
            return match self {
                Value::Optional(None) => Ok(Value::nil()),
                Value::Optional(Some(value)) => Ok(Value::some(value.conform(&inner)?)),
                value => Ok(Value::some(value.conform(&inner)?)),
            };
        }

        if ty.list {
            let element = ty.element();
            return match self {
                Value::List(items) => items
                    .into_iter()
                    .map(|item| item.conform(&element))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List),
                other => Err(EvalError::mismatch(ty.to_string(), other.type_name())),
            };
        }

        match (ty.name.as_str(), self) {
            ("Any", value) => Ok(value),
            ("Int", value @ Value::Int(_)) => Ok(value),
            ("Double" | "Float", Value::Int(n)) => Ok(Value::Float(n as f64)),
            ("Double" | "Float", value @ Value::Float(_)) => Ok(value),
            ("Bool", value @ Value::Bool(_)) => Ok(value),
            ("String", value @ Value::Str(_)) => Ok(value),
            ("Void", Value::Void) => Ok(Value::Void),
            (name, Value::Record(record)) if record.type_name() == name => {
                Ok(Value::Record(record))
            }
            (_, other) => Err(EvalError::mismatch(ty.to_string(), other.type_name())),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    write!(f, "[")?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{:?}", v)?;
    }
    write!(f, "]")
}

/// Quoted form, used for values nested inside lists, optionals and records
impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

/// Textual form shown by the REPL and substituted into templates
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => write_list(f, items),
            Value::Optional(None) => write!(f, "nil"),
            Value::Optional(Some(v)) => write!(f, "Optional({:?})", v),
            Value::Record(record) => {
                write!(f, "{}(", record.type_name())?;
                for (i, (name, v)) in record.fields().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {:?}", name, v)?;
                }
                write!(f, ")")
            }
            Value::Void => write!(f, "()"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Optional(a), Value::Optional(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Void, Value::Void) => true,
            _ => false,
        }
    }
}
