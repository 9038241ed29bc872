//! Statement execution
//!
//! Every mutating statement evaluates all of its operands before it writes
//! anything. [`Interpreter::eval_source`] goes further: when any statement of
//! the input fails, the statements before it are undone too.

use std::sync::Arc;

use super::env::{Binding, Environment};
use super::evaluator::Evaluator;
use super::random::RandomSource;
use super::record::{Permission, Record, RecordKind, RecordType};
use super::value::Value;
use crate::ast::*;
use crate::diagnostics::{EvalError, Result};

/// Tree-walking interpreter
pub struct Interpreter {
    /// Bindings, record types and captured output
    env: Environment,
    evaluator: Evaluator,
}

impl Interpreter {
    /// Create a new interpreter drawing from the process-wide random source
    pub fn new() -> Self {
        Self::with_random(RandomSource::shared())
    }

    pub fn with_random(rng: Arc<RandomSource>) -> Self {
        let mut env = Environment::new();
        env.output.set_echo(true);
        Interpreter {
            env,
            evaluator: Evaluator::with_random(rng),
        }
    }

    /// Keep `print` output in the buffer only
    pub fn quiet(mut self) -> Self {
        self.env.output.set_echo(false);
        self
    }

    /// Get captured output (for testing)
    pub fn get_output(&self) -> &[String] {
        self.env.output.lines()
    }

    /// Clear output buffer
    pub fn clear_output(&mut self) {
        self.env.output.clear();
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Forget all bindings and user-defined types
    pub fn reset(&mut self) {
        self.env.reset();
    }

    /// Lex, parse and execute `source`, returning the value of the last
    /// statement if it has one. On error, bindings, record types and shared
    /// instances are restored to their state before the call.
    pub fn eval_source(&mut self, source: &str) -> Result<Option<Value>> {
        let tokens = crate::lexer::lex(source)?;
        let program = crate::parser::parse(&tokens, source)?;

        let snapshot = self.env.snapshot();
        match self.run(&program.stmts) {
            Ok(last) => Ok(last),
            Err(e) => {
                tracing::debug!(kind = e.kind(), "rolling back failed input");
                self.env.restore(snapshot);
                Err(e)
            }
        }
    }

    fn run(&mut self, stmts: &[Stmt]) -> Result<Option<Value>> {
        let mut last = None;
        for stmt in stmts {
            last = self.exec(stmt)?;
        }
        Ok(last)
    }

    /// Execute one statement
    pub fn exec(&mut self, stmt: &Stmt) -> Result<Option<Value>> {
        self.evaluator.exec(stmt, &mut self.env)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    /// Execute one statement. Expression statements yield their value, unless
    /// it is `()`.
    pub fn exec(&self, stmt: &Stmt, env: &mut Environment) -> Result<Option<Value>> {
        tracing::debug!(span = ?stmt.span(), "exec");
        self.exec_inner(stmt, env).map_err(|e| e.at(stmt.span()))
    }

    fn exec_inner(&self, stmt: &Stmt, env: &mut Environment) -> Result<Option<Value>> {
        match stmt {
            Stmt::Let {
                name,
                mutable,
                ty,
                value,
                ..
            } => {
                let value = self.eval_expr(value, env)?;
                let value = bind(value, ty.as_ref(), *mutable)?;
                env.define(name.clone(), Binding::new(value, *mutable, ty.clone()));
                Ok(None)
            }

            Stmt::Assign { target, value, .. } => {
                let value = self.eval_expr(value, env)?;
                assign(target, value, env)?;
                Ok(None)
            }

            Stmt::Mutate { target, op, .. } => {
                match op {
                    MutateOp::Append(item) => {
                        let item = self.eval_expr(item, env)?;
                        append(target, item, env)?;
                    }
                    MutateOp::Shuffle => self.shuffle_in_place(target, env)?,
                }
                Ok(None)
            }

            Stmt::Print { args, .. } => {
                let mut parts = Vec::with_capacity(args.len());
                for arg in args {
                    parts.push(self.eval_expr(arg, env)?.to_string());
                }
                env.output.emit(parts.join(" "));
                Ok(None)
            }

            Stmt::Record(decl) => {
                self.declare(decl, env)?;
                Ok(None)
            }

            Stmt::Expr(expr) => match self.eval_expr(expr, env)? {
                Value::Void => Ok(None),
                value => Ok(Some(value)),
            },
        }
    }

    /// `name.shuffle()` or `name.field.shuffle()`
    fn shuffle_in_place(&self, target: &Place, env: &mut Environment) -> Result<()> {
        let rng = self.random_source().clone();
        let binding = binding_mut(target, env)?;

        match &target.field {
            None => {
                if !binding.mutable {
                    return Err(EvalError::immutable(&target.base).at(target.span));
                }
                match &mut binding.value {
                    Value::List(items) => rng.shuffle(items),
                    other => {
                        return Err(EvalError::mismatch("List", other.type_name()).at(target.span));
                    }
                }
            }
            Some(field) => {
                let record = record_mut(&mut binding.value)?;
                record
                    .update_list(field, |items| rng.shuffle(items))
                    .map_err(|e| e.at(target.span))?;
            }
        }
        Ok(())
    }

    /// Register a `struct`/`class` declaration. Defaults are evaluated once,
    /// here.
    fn declare(&self, decl: &RecordDecl, env: &mut Environment) -> Result<()> {
        let kind = match decl.kind {
            RecordDeclKind::Struct => RecordKind::Value,
            RecordDeclKind::Class => RecordKind::Reference,
        };

        let mut ty = RecordType::new(decl.name.clone(), kind);
        for field in &decl.fields {
            let default = match (&field.default, &field.ty) {
                (Some(expr), ann) => {
                    let value = self.eval_expr(expr, env)?;
                    match ann {
                        Some(ann) => Some(value.conform(ann).map_err(|e| e.at(expr.span))?),
                        None => Some(value),
                    }
                }
                // Optional fields start out nil
                (None, Some(ann)) if ann.optional => Some(Value::nil()),
                (None, _) => None,
            };
            ty = ty.with_field(field.name.clone(), field.mutable, field.ty.clone(), default);
        }
        for method in &decl.methods {
            if ty.field(&method.name).is_some() || ty.method(&method.name).is_some() {
                return Err(EvalError::mismatch(
                    format!("a member name not already used by `{}`", decl.name),
                    format!("a second `{}`", method.name),
                )
                .at(method.span));
            }
            ty = ty.with_method(method.clone());
        }

        env.records.define(ty);
        Ok(())
    }
}

/// `name = value` or `name.field = value`
fn assign(target: &Place, value: Value, env: &mut Environment) -> Result<()> {
    let binding = binding_mut(target, env)?;

    match &target.field {
        None => {
            if !binding.mutable {
                return Err(EvalError::immutable(&target.base).at(target.span));
            }
            let value = bind(value, binding.ty.as_ref(), true).map_err(|e| e.at(target.span))?;
            binding.value = value;
        }
        Some(field) => {
            let record = record_mut(&mut binding.value)?;
            record.set(field, value).map_err(|e| e.at(target.span))?;
        }
    }
    tracing::debug!(place = %target, "assigned");
    Ok(())
}

/// `name.append(item)` or `name.field.append(item)`
fn append(target: &Place, item: Value, env: &mut Environment) -> Result<()> {
    let (binding, records) = env
        .get_mut_with_records(&target.base)
        .ok_or_else(|| EvalError::unbound(&target.base).at(target.span))?;

    match &target.field {
        None => {
            if !binding.mutable {
                return Err(EvalError::immutable(&target.base).at(target.span));
            }
            let item = match binding.ty.as_ref().filter(|ty| ty.list) {
                Some(ty) => item.conform(&ty.element()).map_err(|e| e.at(target.span))?,
                None => item,
            };
            match &mut binding.value {
                Value::List(items) => items.push(item),
                other => {
                    return Err(EvalError::mismatch("List", other.type_name()).at(target.span));
                }
            }
        }
        Some(field) => {
            let record = record_mut(&mut binding.value)?;
            records
                .append(record, field, item)
                .map_err(|e| e.at(target.span))?;
        }
    }
    tracing::debug!(place = %target, "appended");
    Ok(())
}

fn binding_mut<'a>(target: &Place, env: &'a mut Environment) -> Result<&'a mut Binding> {
    env.get_mut(&target.base)
        .ok_or_else(|| EvalError::unbound(&target.base).at(target.span))
}

/// Prepare a value for storage in a binding: check the declared type and give
/// value records the binding's permission
fn bind(value: Value, ty: Option<&TypeAnn>, mutable: bool) -> Result<Value> {
    let value = match ty {
        Some(ty) => value.conform(ty)?,
        None => value,
    };
    let permission = if mutable {
        Permission::Mutable
    } else {
        Permission::Immutable
    };
    Ok(match value {
        Value::Record(record) => Value::Record(record.with_permission(permission)),
        Value::Optional(Some(inner)) => match *inner {
            Value::Record(record) => Value::some(Value::Record(record.with_permission(permission))),
            other => Value::some(other),
        },
        other => other,
    })
}

fn record_mut(value: &mut Value) -> Result<&mut Record> {
    match value {
        Value::Record(record) => Ok(record),
        other => Err(EvalError::mismatch("a record", other.type_name())),
    }
}
