//! Tree-walking interpreter
//!
//! Executes parsed statements directly against an [`Environment`].

pub mod env;
pub mod eval;
pub mod evaluator;
pub mod random;
pub mod record;
pub mod value;

pub use env::{Binding, Environment};
pub use eval::Interpreter;
pub use evaluator::Evaluator;
pub use random::RandomSource;
pub use record::{Permission, Record, RecordKind, RecordStore, RecordType};
pub use value::{Value, ValueKind};
