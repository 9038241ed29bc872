//! Abstract Syntax Tree for primer
//!
//! This module defines the AST types produced by the parser. The tree is
//! serializable so `primer parse` can dump it as JSON.

use crate::common::Span;
use serde::{Deserialize, Serialize};

/// A parsed input: one or more statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

// ==================== STATEMENTS ====================

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `let name: T = value` / `var name: T = value`
    Let {
        name: String,
        mutable: bool,
        ty: Option<TypeAnn>,
        value: Expr,
        span: Span,
    },
    /// `target = value`
    Assign {
        target: Place,
        value: Expr,
        span: Span,
    },
    /// `target.append(value)`, `target.shuffle()`
    Mutate {
        target: Place,
        op: MutateOp,
        span: Span,
    },
    /// `print(a, b, ...)`
    Print { args: Vec<Expr>, span: Span },
    /// `struct Name { ... }` / `class Name { ... }`
    Record(RecordDecl),
    /// Bare expression; its value is the statement's result
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Mutate { span, .. }
            | Stmt::Print { span, .. } => *span,
            Stmt::Record(decl) => decl.span,
            Stmt::Expr(expr) => expr.span,
        }
    }
}

/// In-place list mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutateOp {
    Append(Expr),
    Shuffle,
}

/// Assignable location: a binding, or a field of the record held by a binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub base: String,
    pub field: Option<String>,
    pub span: Span,
}

impl std::fmt::Display for Place {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}", self.base, field),
            None => write!(f, "{}", self.base),
        }
    }
}

/// Type annotation: `Int`, `String?`, `[String]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeAnn {
    pub name: String,
    pub list: bool,
    pub optional: bool,
}

impl TypeAnn {
    /// Plain, non-list, non-optional type
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            list: false,
            optional: false,
        }
    }

    /// The same type without the trailing `?`
    pub fn non_optional(&self) -> TypeAnn {
        TypeAnn {
            optional: false,
            ..self.clone()
        }
    }

    /// Element type of a list annotation
    pub fn element(&self) -> TypeAnn {
        TypeAnn::named(self.name.clone())
    }
}

impl std::fmt::Display for TypeAnn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.list {
            write!(f, "[{}]", self.name)?;
        } else {
            write!(f, "{}", self.name)?;
        }
        if self.optional {
            write!(f, "?")?;
        }
        Ok(())
    }
}

// ==================== RECORDS ====================

/// Whether a declared record copies on bind or is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordDeclKind {
    Struct,
    Class,
}

/// Record declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    pub name: String,
    pub kind: RecordDeclKind,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

/// Field declaration: `let name: T = default` / `var name: T = default`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub mutable: bool,
    pub ty: Option<TypeAnn>,
    pub default: Option<Expr>,
    pub span: Span,
}

/// Method declaration: `[mutating] func name(param: T, ...) -> R { body }`
///
/// Inside the body the receiver's fields are plain bindings (`citizens`,
/// or `self.citizens`). A method without a return type evaluates to `()`;
/// otherwise the last statement must be an expression of that type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: String,
    /// Required for a `struct` method to write its fields
    pub mutating: bool,
    pub params: Vec<Param>,
    pub ret: Option<TypeAnn>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeAnn,
    pub span: Span,
}

// ==================== EXPRESSIONS ====================

/// Expression with its source span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Expression kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(Literal),
    /// String literal with `{expr}` segments
    Template(Vec<Segment>),
    Ident(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `value ?? default`
    Coalesce {
        value: Box<Expr>,
        default: Box<Expr>,
    },
    /// `low...high` / `low..<high`; only meaningful as a random bound
    Range {
        low: Box<Expr>,
        high: Box<Expr>,
        inclusive: bool,
    },
    /// Postfix `!`
    ForceUnwrap(Box<Expr>),
    Field {
        base: Box<Expr>,
        field: String,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Arg>,
    },
    /// Call of a builtin function or record constructor
    Call {
        callee: String,
        args: Vec<Arg>,
    },
    /// `base?.a.b?.c()`: every access after the first `?.` belongs to the chain
    OptionalChain {
        base: Box<Expr>,
        accesses: Vec<Access>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    /// `if let name = value { ... } else { ... }`
    IfLet {
        name: String,
        value: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Nil,
}

/// Piece of a string template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    Text(String),
    Expr(Expr),
}

/// Call argument, optionally labelled (`name: value`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arg {
    pub label: Option<String>,
    pub value: Expr,
}

/// One step of an optional chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Access {
    Field {
        name: String,
        span: Span,
    },
    Method {
        name: String,
        args: Vec<Arg>,
        span: Span,
    },
    /// `!` inside a chain
    Unwrap { span: Span },
    /// A further `?.`: short-circuits when the value so far is nil
    Propagate { span: Span },
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}
