//! Diagnostic reporting with source locations
//!
//! Every failure the evaluator can produce is an [`EvalError`]. Errors raised by
//! the library operations carry no location; the interpreter attaches the span
//! of the expression that failed, and the CLI renders it against the source with
//! miette.

use crate::common::Span;
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::sync::Arc;
use thiserror::Error;

/// Source text for error reporting
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: Arc<str>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Arc::from(content.into()),
        }
    }

    pub fn to_named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.name.clone(), self.content.to_string())
    }

    /// Attach this source to an error so its labels render with context
    pub fn report(&self, error: EvalError) -> miette::Report {
        miette::Report::new(error).with_source_code(self.to_named_source())
    }
}

/// Convert our Span to miette's SourceSpan
impl From<Span> for SourceSpan {
    fn from(span: Span) -> Self {
        SourceSpan::new(span.start.into(), span.len())
    }
}

/// Evaluation diagnostic
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EvalError {
    // === Name Errors ===
    #[error("Unbound name `{name}`")]
    #[diagnostic(
        code(primer::UnboundNameError),
        help("bind it first with `let {name} = ...` or `var {name} = ...`")
    )]
    UnboundName {
        name: String,
        #[label("not bound here")]
        span: Option<SourceSpan>,
    },

    // === Random Errors ===
    #[error("Invalid random range `{range}`")]
    #[diagnostic(
        code(primer::RangeError),
        help("the lower bound must not exceed the upper bound")
    )]
    Range {
        range: String,
        #[label("empty range")]
        span: Option<SourceSpan>,
    },

    // === Optional Errors ===
    #[error("Unexpectedly found nil while unwrapping an optional value")]
    #[diagnostic(
        code(primer::NilUnwrapError),
        help("use `if let`, `?.` or `??` to handle the nil case")
    )]
    NilUnwrap {
        #[label("this value is nil")]
        span: Option<SourceSpan>,
    },

    // === Mutation Errors ===
    #[error("Cannot mutate `{field}`: it is immutable")]
    #[diagnostic(
        code(primer::ImmutableFieldError),
        help("only `var` fields of records bound with `var` can be changed")
    )]
    ImmutableField {
        field: String,
        #[label("mutation attempted here")]
        span: Option<SourceSpan>,
    },

    // === Parse Errors ===
    #[error("Unexpected token: expected {expected}, found {found}")]
    #[diagnostic(code(primer::ParseError))]
    UnexpectedToken {
        expected: String,
        found: String,
        #[label("unexpected token here")]
        span: Option<SourceSpan>,
    },

    #[error("Unexpected end of input: expected {expected}")]
    #[diagnostic(code(primer::ParseError))]
    UnexpectedEof {
        expected: String,
        #[label("input ends here")]
        span: Option<SourceSpan>,
    },

    #[error("Invalid token `{text}`")]
    #[diagnostic(code(primer::ParseError))]
    InvalidToken {
        text: String,
        #[label("not recognized")]
        span: Option<SourceSpan>,
    },

    #[error("Unterminated interpolation in string template")]
    #[diagnostic(
        code(primer::ParseError),
        help("close the embedded expression with `}}`, or write `{{{{` for a literal brace")
    )]
    UnterminatedInterpolation {
        #[label("opened here")]
        span: Option<SourceSpan>,
    },

    // === Type Errors ===
    #[error("Type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code(primer::TypeError))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
    },

    #[error("No method `{method}` on {receiver}")]
    #[diagnostic(code(primer::TypeError))]
    UnknownMethod {
        receiver: String,
        method: String,
        #[label("unknown method")]
        span: Option<SourceSpan>,
    },

    #[error("`{name}` takes {expected} argument(s), found {found}")]
    #[diagnostic(code(primer::TypeError))]
    Arity {
        name: String,
        expected: usize,
        found: usize,
        #[label("wrong number of arguments")]
        span: Option<SourceSpan>,
    },

    // === Arithmetic Errors ===
    #[error("Division by zero")]
    #[diagnostic(code(primer::ArithmeticError))]
    DivisionByZero {
        #[label("divisor is zero")]
        span: Option<SourceSpan>,
    },

    #[error("Integer overflow in `{op}`")]
    #[diagnostic(code(primer::ArithmeticError))]
    Overflow {
        op: String,
        #[label("result does not fit in 64 bits")]
        span: Option<SourceSpan>,
    },

    // === Record Errors ===
    #[error("Unknown type `{name}`")]
    #[diagnostic(
        code(primer::RecordError),
        help("declare it with `struct {name} {{ ... }}` or `class {name} {{ ... }}`")
    )]
    UnknownType {
        name: String,
        #[label("type not found")]
        span: Option<SourceSpan>,
    },

    #[error("`{record}` has no field `{field}`")]
    #[diagnostic(code(primer::RecordError))]
    UnknownField {
        record: String,
        field: String,
        #[label("no such field")]
        span: Option<SourceSpan>,
    },

    #[error("Missing value for field `{field}` of `{record}`")]
    #[diagnostic(code(primer::RecordError))]
    MissingField {
        record: String,
        field: String,
        #[label("field has no default")]
        span: Option<SourceSpan>,
    },

    #[error("Calling `{method}` nests deeper than {limit} method calls")]
    #[diagnostic(code(primer::RecordError), help("check for a method that calls itself"))]
    CallDepth {
        method: String,
        limit: usize,
        #[label("call made here")]
        span: Option<SourceSpan>,
    },
}

impl EvalError {
    /// Stable name of the failure kind, as reported by `primer eval`
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::UnboundName { .. } => "UnboundNameError",
            EvalError::Range { .. } => "RangeError",
            EvalError::NilUnwrap { .. } => "NilUnwrapError",
            EvalError::ImmutableField { .. } => "ImmutableFieldError",
            EvalError::UnexpectedToken { .. }
            | EvalError::UnexpectedEof { .. }
            | EvalError::InvalidToken { .. }
            | EvalError::UnterminatedInterpolation { .. } => "ParseError",
            EvalError::TypeMismatch { .. }
            | EvalError::UnknownMethod { .. }
            | EvalError::Arity { .. } => "TypeError",
            EvalError::DivisionByZero { .. } | EvalError::Overflow { .. } => "ArithmeticError",
            EvalError::UnknownType { .. }
            | EvalError::UnknownField { .. }
            | EvalError::MissingField { .. }
            | EvalError::CallDepth { .. } => "RecordError",
        }
    }

    fn span_slot(&mut self) -> &mut Option<SourceSpan> {
        match self {
            EvalError::UnboundName { span, .. }
            | EvalError::Range { span, .. }
            | EvalError::NilUnwrap { span }
            | EvalError::ImmutableField { span, .. }
            | EvalError::UnexpectedToken { span, .. }
            | EvalError::UnexpectedEof { span, .. }
            | EvalError::InvalidToken { span, .. }
            | EvalError::UnterminatedInterpolation { span }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::UnknownMethod { span, .. }
            | EvalError::Arity { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::Overflow { span, .. }
            | EvalError::UnknownType { span, .. }
            | EvalError::UnknownField { span, .. }
            | EvalError::MissingField { span, .. }
            | EvalError::CallDepth { span, .. } => span,
        }
    }

    /// Attach a location unless the error already has a more precise one
    pub fn at(mut self, span: Span) -> Self {
        let slot = self.span_slot();
        if slot.is_none() {
            *slot = Some(span.into());
        }
        self
    }

    pub fn span(&self) -> Option<SourceSpan> {
        *self.clone().span_slot()
    }

    // Constructors for the spanless errors raised by library operations

    pub fn unbound(name: impl Into<String>) -> Self {
        EvalError::UnboundName {
            name: name.into(),
            span: None,
        }
    }

    pub fn nil_unwrap() -> Self {
        EvalError::NilUnwrap { span: None }
    }

    pub fn immutable(field: impl Into<String>) -> Self {
        EvalError::ImmutableField {
            field: field.into(),
            span: None,
        }
    }

    pub fn range(range: impl Into<String>) -> Self {
        EvalError::Range {
            range: range.into(),
            span: None,
        }
    }

    pub fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
            span: None,
        }
    }
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;
