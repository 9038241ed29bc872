//! primer: a teaching REPL for optionals, records and random draws
//!
//! A small Swift-flavoured language whose evaluator covers string
//! interpolation, bounded random numbers, optionals (force unwrap,
//! nil-coalescing, optional chaining, `if let`) and records with value or
//! reference semantics.
//!
//! # Architecture
//!
//! ```text
//! Source → Lexer → Parser → AST → Interpreter (Evaluator + RecordStore)
//! ```
//!
//! # Example
//!
//! ```text
//! struct Town {
//!     let name = "Disneyland"
//!     var citizens = ["Catariana", "Louis"]
//! }
//! var town = Town(name: "Munich", citizens: [])
//! town.citizens.append("Richard")
//! let nickname: String? = nil
//! let greeting = nickname ?? "stranger"
//! print("Hello {greeting}, welcome to {town.name}")
//! ```

pub mod ast;
pub mod common;
pub mod config;
pub mod diagnostics;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod repl;

// Re-export diagnostics for convenience
pub use diagnostics::{EvalError, SourceFile};

// Re-exports for convenience
pub use ast::Program;
pub use interp::{Evaluator, Interpreter, RecordStore, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse source code to AST
pub fn parse(source: &str) -> diagnostics::Result<Program> {
    let tokens = lexer::lex(source)?;
    parser::parse(&tokens, source)
}

/// Evaluate source code in a fresh interpreter, returning the value of the
/// last statement
pub fn eval(source: &str) -> diagnostics::Result<Option<Value>> {
    Interpreter::new().quiet().eval_source(source)
}
