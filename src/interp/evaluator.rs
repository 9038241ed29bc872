//! Expression evaluation
//!
//! [`Evaluator`] holds no bindings of its own. Every operation reads names
//! from the [`Environment`] it is given and draws randomness from a shared
//! [`RandomSource`], so several interpreters can run against one seeded
//! sequence.

use std::sync::Arc;

use super::env::{Binding, Environment};
use super::random::RandomSource;
use super::record::{Permission, Record, RecordKind};
use super::value::Value;
use crate::ast::*;
use crate::diagnostics::{EvalError, Result};
use crate::parser::template::parse_template;

/// Method calls may nest at most this deep
pub const MAX_CALL_DEPTH: usize = 64;

/// Optional-aware expression evaluator
#[derive(Debug, Clone)]
pub struct Evaluator {
    rng: Arc<RandomSource>,
}

impl Evaluator {
    /// Evaluator drawing from the process-wide random source
    pub fn new() -> Self {
        Self::with_random(RandomSource::shared())
    }

    pub fn with_random(rng: Arc<RandomSource>) -> Self {
        Self { rng }
    }

    pub fn random_source(&self) -> &Arc<RandomSource> {
        &self.rng
    }

    // ==================== CORE OPERATIONS ====================

    /// Substitute every `{expr}` of `template` with the textual form of its
    /// value
    pub fn interpolate(&self, template: &str, env: &mut Environment) -> Result<String> {
        let segments = parse_template(template, 0)?;
        self.render(&segments, env)
    }

    /// Uniform integer in `low...high_inclusive`
    pub fn random_int(&self, low: i64, high_inclusive: i64) -> Result<i64> {
        let n = self.rng.int_inclusive(low, high_inclusive)?;
        tracing::trace!(low, high_inclusive, n, "random int");
        Ok(n)
    }

    /// Uniform float in `low..<high_exclusive`
    pub fn random_float(&self, low: f64, high_exclusive: f64) -> Result<f64> {
        let x = self.rng.float_half_open(low, high_exclusive)?;
        tracing::trace!(low, high_exclusive, x, "random float");
        Ok(x)
    }

    /// The wrapped value, or `NilUnwrap` when absent
    pub fn force_unwrap(&self, value: Value) -> Result<Value> {
        match value {
            Value::Optional(Some(inner)) => Ok(*inner),
            Value::Optional(None) => Err(EvalError::nil_unwrap()),
            other => Err(EvalError::mismatch("an optional", other.type_name())),
        }
    }

    /// The wrapped value, or `default` when absent
    pub fn coalesce(&self, value: Value, default: Value) -> Value {
        present(value).unwrap_or(default)
    }

    /// Apply `accessor` to the wrapped value. An absent value short-circuits
    /// without calling it; a plain result is wrapped once.
    pub fn optional_chain(
        &self,
        value: Value,
        accessor: impl FnOnce(Value) -> Result<Value>,
    ) -> Result<Value> {
        match value {
            Value::Optional(None) => Ok(Value::nil()),
            Value::Optional(Some(inner)) => Ok(accessor(*inner)?.into_optional()),
            other => Err(EvalError::mismatch("an optional", other.type_name())),
        }
    }

    /// A uniformly chosen element, or nil for an empty list
    pub fn random_element(&self, items: &[Value]) -> Value {
        match self.rng.choose(items) {
            Some(item) => Value::some(item),
            None => Value::nil(),
        }
    }

    /// A random permutation of `items`
    pub fn shuffle(&self, items: &[Value]) -> Vec<Value> {
        let mut items = items.to_vec();
        self.rng.shuffle(&mut items);
        items
    }

    // ==================== EXPRESSIONS ====================

    /// Evaluate an expression. Errors without a location get `expr`'s span.
    pub fn eval_expr(&self, expr: &Expr, env: &mut Environment) -> Result<Value> {
        self.eval_kind(expr, env).map_err(|e| e.at(expr.span))
    }

    fn eval_kind(&self, expr: &Expr, env: &mut Environment) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(eval_literal(lit)),

            ExprKind::Template(segments) => self.render(segments, env).map(Value::Str),

            ExprKind::Ident(name) => env.lookup(name),

            ExprKind::List(elements) => elements
                .iter()
                .map(|e| self.eval_expr(e, env))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),

            ExprKind::Unary { op, expr } => {
                let value = self.eval_expr(expr, env)?;
                eval_unary(*op, value)
            }

            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    let lhs = self.eval_condition(left, env)?;
                    // Short-circuit
                    if lhs == (*op == BinaryOp::Or) {
                        return Ok(Value::Bool(lhs));
                    }
                    Ok(Value::Bool(self.eval_condition(right, env)?))
                }
                _ => {
                    let lhs = self.eval_expr(left, env)?;
                    let rhs = self.eval_expr(right, env)?;
                    eval_binary(*op, lhs, rhs)
                }
            },

            ExprKind::Coalesce { value, default } => {
                let value = self.eval_expr(value, env)?;
                // The default is only evaluated when needed
                if value.is_nil() {
                    self.eval_expr(default, env)
                } else {
                    Ok(self.coalesce(value, Value::nil()))
                }
            }

            ExprKind::Range { .. } => Err(EvalError::mismatch(
                "a value",
                "a range (ranges are only valid as `random(in:)` bounds)",
            )),

            ExprKind::ForceUnwrap(inner) => {
                let value = self.eval_expr(inner, env)?;
                self.force_unwrap(value)
            }

            ExprKind::Field { base, field } => {
                let value = self.eval_expr(base, env)?;
                get_field(&value, field)
            }

            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                if let Some(value) = self.eval_static_call(receiver, method, args, env)? {
                    return Ok(value);
                }
                let value = self.eval_expr(receiver, env)?;
                let place = match &receiver.kind {
                    ExprKind::Ident(name) => Some(name.as_str()),
                    _ => None,
                };
                self.call_method(value, place, method, args, env)
            }

            ExprKind::Call { callee, args } => self.eval_call(callee, args, env),

            ExprKind::OptionalChain { base, accesses } => {
                let value = self.eval_expr(base, env)?;
                self.optional_chain(value, |inner| self.walk_chain(inner, accesses, env))
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition, env)? {
                    self.eval_expr(then_branch, env)
                } else {
                    self.eval_else(else_branch.as_deref(), env)
                }
            }

            ExprKind::IfLet {
                name,
                value,
                then_branch,
                else_branch,
            } => match self.eval_expr(value, env)? {
                Value::Optional(Some(inner)) => {
                    env.push_scope();
                    env.define(name.clone(), Binding::new(*inner, false, None));
                    let result = self.eval_expr(then_branch, env);
                    env.pop_scope();
                    result
                }
                Value::Optional(None) => self.eval_else(else_branch.as_deref(), env),
                other => Err(EvalError::mismatch("an optional", other.type_name())),
            },
        }
    }

    fn eval_else(&self, else_branch: Option<&Expr>, env: &mut Environment) -> Result<Value> {
        match else_branch {
            Some(expr) => self.eval_expr(expr, env),
            None => Ok(Value::nil()),
        }
    }

    fn eval_condition(&self, expr: &Expr, env: &mut Environment) -> Result<bool> {
        let value = self.eval_expr(expr, env)?;
        value
            .as_bool()
            .ok_or_else(|| EvalError::mismatch("Bool", value.type_name()).at(expr.span))
    }

    fn render(&self, segments: &[Segment], env: &mut Environment) -> Result<String> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Expr(expr) => {
                    let value = self.eval_expr(expr, env)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }

    fn eval_args(&self, args: &[Arg], env: &mut Environment) -> Result<Vec<Value>> {
        args.iter().map(|a| self.eval_expr(&a.value, env)).collect()
    }

    // ==================== CALLS ====================

    /// `Int.random(in:)` and `Float.random(in:)`, unless the name is shadowed
    /// by a binding
    fn eval_static_call(
        &self,
        receiver: &Expr,
        method: &str,
        args: &[Arg],
        env: &mut Environment,
    ) -> Result<Option<Value>> {
        let ExprKind::Ident(ty) = &receiver.kind else {
            return Ok(None);
        };
        let is_int = match ty.as_str() {
            "Int" => true,
            "Float" | "Double" => false,
            _ => return Ok(None),
        };
        if env.get(ty).is_some() {
            return Ok(None);
        }
        if method != "random" {
            return Err(EvalError::UnknownMethod {
                receiver: ty.clone(),
                method: method.to_string(),
                span: None,
            });
        }

        let [arg] = args else {
            return Err(EvalError::Arity {
                name: format!("{}.random", ty),
                expected: 1,
                found: args.len(),
                span: None,
            });
        };
        let ExprKind::Range {
            low,
            high,
            inclusive,
        } = &arg.value.kind
        else {
            return Err(EvalError::mismatch("a range like `1...3`", "a value").at(arg.value.span));
        };

        let lo = self.eval_expr(low, env)?;
        let hi = self.eval_expr(high, env)?;
        let span = arg.value.span;

        let value = if is_int {
            let lo = expect_int(&lo).map_err(|e| e.at(low.span))?;
            let hi = expect_int(&hi).map_err(|e| e.at(high.span))?;
            if *inclusive {
                Value::Int(self.random_int(lo, hi).map_err(|e| e.at(span))?)
            } else {
                Value::Int(self.rng.int_half_open(lo, hi).map_err(|e| e.at(span))?)
            }
        } else {
            let lo = expect_float(&lo).map_err(|e| e.at(low.span))?;
            let hi = expect_float(&hi).map_err(|e| e.at(high.span))?;
            if *inclusive {
                Value::Float(self.rng.float_closed(lo, hi).map_err(|e| e.at(span))?)
            } else {
                Value::Float(self.random_float(lo, hi).map_err(|e| e.at(span))?)
            }
        };
        Ok(Some(value))
    }

    /// Builtin functions and record constructors
    fn eval_call(&self, callee: &str, args: &[Arg], env: &mut Environment) -> Result<Value> {
        match callee {
            "some" => {
                let [value] = self.eval_args_n::<1>(callee, args, env)?;
                Ok(Value::some(value))
            }
            "randomInt" => {
                let [lo, hi] = self.eval_args_n::<2>(callee, args, env)?;
                Ok(Value::Int(self.random_int(expect_int(&lo)?, expect_int(&hi)?)?))
            }
            "randomFloat" => {
                let [lo, hi] = self.eval_args_n::<2>(callee, args, env)?;
                Ok(Value::Float(
                    self.random_float(expect_float(&lo)?, expect_float(&hi)?)?,
                ))
            }
            _ => {
                if env.records.get(callee).is_none() {
                    return Err(EvalError::unbound(callee));
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push((arg.label.clone(), self.eval_expr(&arg.value, env)?));
                }
                let record = env
                    .records
                    .instantiate(callee, values, Permission::Mutable)?;
                Ok(Value::Record(record))
            }
        }
    }

    fn eval_args_n<const N: usize>(
        &self,
        name: &str,
        args: &[Arg],
        env: &mut Environment,
    ) -> Result<[Value; N]> {
        let values = self.eval_args(args, env)?;
        let found = values.len();
        values.try_into().map_err(|_| EvalError::Arity {
            name: name.to_string(),
            expected: N,
            found,
            span: None,
        })
    }

    /// Call `method` on `receiver`. `place` names the binding the receiver
    /// was read from, if any; a mutating method on a value record writes the
    /// updated instance back to it.
    fn call_method(
        &self,
        receiver: Value,
        place: Option<&str>,
        method: &str,
        args: &[Arg],
        env: &mut Environment,
    ) -> Result<Value> {
        if let Value::Record(record) = &receiver {
            if let Some(decl) = record.method(method) {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push((arg.label.clone(), self.eval_expr(&arg.value, env)?));
                }
                return self.call_declared(record.clone(), place, &decl, values, env);
            }
        }
        let args = self.eval_args(args, env)?;
        self.call_builtin(receiver, method, args)
    }

    fn call_builtin(&self, receiver: Value, method: &str, args: Vec<Value>) -> Result<Value> {
        if !args.is_empty() && method != "append" {
            return Err(EvalError::Arity {
                name: method.to_string(),
                expected: 0,
                found: args.len(),
                span: None,
            });
        }

        match (&receiver, method) {
            (Value::List(items), "randomElement") => Ok(self.random_element(items)),
            (Value::List(items), "shuffled") => Ok(Value::List(self.shuffle(items))),
            (_, "append" | "shuffle") => Err(EvalError::mismatch(
                format!("`{}` on a binding, as its own statement", method),
                "a call inside an expression",
            )),
            _ => Err(EvalError::UnknownMethod {
                receiver: receiver.type_name(),
                method: method.to_string(),
                span: None,
            }),
        }
    }

    /// A method declared in the record's type. A `mutating` method of a value
    /// record works on a copy that replaces the `var` binding afterwards.
    fn call_declared(
        &self,
        mut record: Record,
        place: Option<&str>,
        method: &MethodDecl,
        args: Vec<(Option<String>, Value)>,
        env: &mut Environment,
    ) -> Result<Value> {
        let copies = record.kind() == RecordKind::Value && method.mutating;
        if copies {
            let name = place.ok_or_else(|| {
                EvalError::mismatch(
                    format!("a `var` receiver for mutating `{}`", method.name),
                    "a temporary value",
                )
            })?;
            let bound_mutable = env.get(name).is_some_and(|b| b.mutable);
            if record.permission() == Permission::Immutable || !bound_mutable {
                return Err(EvalError::immutable(format!(
                    "{}.{}",
                    record.type_name(),
                    method.name
                )));
            }
        }

        let result = self.invoke(&mut record, method, args, env)?;

        if let (true, Some(name)) = (copies, place) {
            if let Some(binding) = env.get_mut(name) {
                binding.value = Value::Record(record);
            }
        }
        Ok(result)
    }

    /// Run a method body with the record's fields bound as names. Fields the
    /// body changed are written back to `record` once it finishes.
    fn invoke(
        &self,
        record: &mut Record,
        method: &MethodDecl,
        args: Vec<(Option<String>, Value)>,
        env: &mut Environment,
    ) -> Result<Value> {
        let ty = record.record_type();
        let name = format!("{}.{}", ty.name, method.name);
        if env.depth() > MAX_CALL_DEPTH * 2 {
            return Err(EvalError::CallDepth {
                method: name,
                limit: MAX_CALL_DEPTH,
                span: None,
            });
        }
        if args.len() != method.params.len() {
            return Err(EvalError::Arity {
                name,
                expected: method.params.len(),
                found: args.len(),
                span: None,
            });
        }

        let mut params = Vec::with_capacity(args.len());
        for (param, (label, value)) in method.params.iter().zip(args) {
            if let Some(label) = label.filter(|l| *l != param.name) {
                return Err(EvalError::mismatch(
                    format!("argument label `{}`", param.name),
                    format!("`{}`", label),
                ));
            }
            params.push((param, value.conform(&param.ty)?));
        }

        let writable = record.permission() == Permission::Mutable
            && (record.kind() == RecordKind::Reference || method.mutating);
        let entry = record.fields();

        tracing::debug!(method = %name, writable, "invoke");
        env.push_scope();
        for (field, value) in &entry {
            let def = ty.field(field);
            let mutable = writable && def.is_some_and(|d| d.mutable);
            let ann = def.and_then(|d| d.ty.clone());
            env.define(field.clone(), Binding::new(value.clone(), mutable, ann));
        }
        env.define("self", Binding::new(Value::Record(record.clone()), false, None));
        env.push_scope();
        for (param, value) in params {
            env.define(param.name.clone(), Binding::new(value, false, Some(param.ty.clone())));
        }

        let mut last = None;
        let mut outcome = Ok(());
        for stmt in &method.body {
            match self.exec(stmt, env) {
                Ok(value) => last = value,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        env.pop_scope();
        let locals = env.pop_scope().unwrap_or_default();
        outcome?;

        for (field, before) in entry {
            match locals.get(&field) {
                Some(binding) if binding.value != before => {
                    record.set(&field, binding.value.clone())?;
                }
                _ => {}
            }
        }

        match &method.ret {
            None => Ok(Value::Void),
            Some(ret) => match last {
                Some(value) => value.conform(ret),
                None => Err(EvalError::mismatch(
                    format!("`{}` to end with a {} expression", name, ret),
                    "no value",
                )),
            },
        }
    }

    /// Apply the accesses that follow the first `?.` of a chain
    fn walk_chain(
        &self,
        mut value: Value,
        accesses: &[Access],
        env: &mut Environment,
    ) -> Result<Value> {
        for (i, access) in accesses.iter().enumerate() {
            value = match access {
                Access::Field { name, span } => get_field(&value, name).map_err(|e| e.at(*span))?,
                Access::Method { name, args, span } => self
                    .call_method(value, None, name, args, env)
                    .map_err(|e| e.at(*span))?,
                Access::Unwrap { span } => self.force_unwrap(value).map_err(|e| e.at(*span))?,
                Access::Propagate { span } => {
                    let rest = &accesses[i + 1..];
                    return self
                        .optional_chain(value, |inner| self.walk_chain(inner, rest, env))
                        .map_err(|e| e.at(*span));
                }
            };
        }
        Ok(value)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// The wrapped value of a present optional, `None` for nil. Non-optional
/// values count as present.
fn present(value: Value) -> Option<Value> {
    match value {
        Value::Optional(inner) => inner.map(|v| *v),
        other => Some(other),
    }
}

fn eval_literal(lit: &Literal) -> Value {
    match lit {
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::String(s) => Value::Str(s.clone()),
        Literal::Nil => Value::nil(),
    }
}

fn expect_int(value: &Value) -> Result<i64> {
    value
        .as_int()
        .ok_or_else(|| EvalError::mismatch("Int", value.type_name()))
}

fn expect_float(value: &Value) -> Result<f64> {
    value
        .as_float()
        .ok_or_else(|| EvalError::mismatch("Float", value.type_name()))
}

/// Read a record field, or one of the `count`/`isEmpty` properties of lists
/// and strings
fn get_field(value: &Value, field: &str) -> Result<Value> {
    match (value, field) {
        (Value::Record(record), _) => record.get(field).ok_or_else(|| EvalError::UnknownField {
            record: record.type_name(),
            field: field.to_string(),
            span: None,
        }),
        (Value::List(items), "count") => Ok(Value::Int(items.len() as i64)),
        (Value::List(items), "isEmpty") => Ok(Value::Bool(items.is_empty())),
        (Value::Str(s), "count") => Ok(Value::Int(s.chars().count() as i64)),
        (Value::Str(s), "isEmpty") => Ok(Value::Bool(s.is_empty())),
        (Value::Optional(_), _) => Err(EvalError::mismatch(
            format!("a non-optional value (use `?.{}` or `!.{}`)", field, field),
            value.type_name(),
        )),
        _ => Err(EvalError::UnknownField {
            record: value.type_name(),
            field: field.to_string(),
            span: None,
        }),
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(EvalError::Overflow {
            op: "-".to_string(),
            span: None,
        }),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, other) => Err(EvalError::mismatch("Int or Float", other.type_name())),
        (UnaryOp::Not, other) => Err(EvalError::mismatch("Bool", other.type_name())),
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use BinaryOp::*;

    match op {
        Eq => return Ok(Value::Bool(loosely_equal(&lhs, &rhs))),
        Ne => return Ok(Value::Bool(!loosely_equal(&lhs, &rhs))),
        _ => {}
    }

    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_op(op, a, b),
        (Value::Str(a), Value::Str(b)) => match op {
            Add => Ok(Value::Str(a + &b)),
            Lt => Ok(Value::Bool(a < b)),
            Le => Ok(Value::Bool(a <= b)),
            Gt => Ok(Value::Bool(a > b)),
            Ge => Ok(Value::Bool(a >= b)),
            _ => Err(operand_mismatch(op, "String", "String")),
        },
        (Value::List(mut a), Value::List(b)) if op == Add => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (lhs @ (Value::Int(_) | Value::Float(_)), rhs @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = match (lhs.as_float(), rhs.as_float()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(operand_mismatch(op, &lhs.type_name(), &rhs.type_name())),
            };
            float_op(op, a, b)
        }
        (lhs, rhs) => Err(operand_mismatch(op, &lhs.type_name(), &rhs.type_name())),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    use BinaryOp::*;

    let overflow = || EvalError::Overflow {
        op: op.as_str().to_string(),
        span: None,
    };
    let result = match op {
        Add => a.checked_add(b).ok_or_else(overflow)?,
        Sub => a.checked_sub(b).ok_or_else(overflow)?,
        Mul => a.checked_mul(b).ok_or_else(overflow)?,
        Div | Rem if b == 0 => return Err(EvalError::DivisionByZero { span: None }),
        Div => a.checked_div(b).ok_or_else(overflow)?,
        Rem => a.checked_rem(b).ok_or_else(overflow)?,
        Lt => return Ok(Value::Bool(a < b)),
        Le => return Ok(Value::Bool(a <= b)),
        Gt => return Ok(Value::Bool(a > b)),
        Ge => return Ok(Value::Bool(a >= b)),
        Eq | Ne | And | Or => return Err(operand_mismatch(op, "Int", "Int")),
    };
    Ok(Value::Int(result))
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> Result<Value> {
    use BinaryOp::*;

    Ok(match op {
        Add => Value::Float(a + b),
        Sub => Value::Float(a - b),
        Mul => Value::Float(a * b),
        Div => Value::Float(a / b),
        Rem => Value::Float(a % b),
        Lt => Value::Bool(a < b),
        Le => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        Ge => Value::Bool(a >= b),
        Eq | Ne | And | Or => return Err(operand_mismatch(op, "Float", "Float")),
    })
}

/// `==` as the language sees it: a present optional equals its wrapped
/// value, and integers compare numerically with floats
fn loosely_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Optional(Some(a)), b) if !matches!(b, Value::Optional(_)) => loosely_equal(a, b),
        (a, Value::Optional(Some(b))) if !matches!(a, Value::Optional(_)) => loosely_equal(a, b),
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        (a, b) => a == b,
    }
}

fn operand_mismatch(op: BinaryOp, lhs: &str, rhs: &str) -> EvalError {
    EvalError::mismatch(
        format!("operands supported by `{}`", op.as_str()),
        format!("{} and {}", lhs, rhs),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> Evaluator {
        Evaluator::with_random(Arc::new(RandomSource::seeded(42)))
    }

    #[test]
    fn test_interpolate() {
        let mut env = Environment::new();
        let out = evaluator()
            .interpolate("Hello {2+3} World", &mut env)
            .unwrap();
        assert_eq!(out, "Hello 5 World");
    }

    #[test]
    fn test_interpolate_unbound() {
        let mut env = Environment::new();
        let err = evaluator().interpolate("{missing}", &mut env).unwrap_err();
        assert_eq!(err.kind(), "UnboundNameError");
    }

    #[test]
    fn test_force_unwrap() {
        let ev = evaluator();
        assert_eq!(ev.force_unwrap(Value::some(Value::Int(1))).unwrap(), Value::Int(1));
        assert_eq!(ev.force_unwrap(Value::nil()).unwrap_err().kind(), "NilUnwrapError");
    }

    #[test]
    fn test_coalesce() {
        let ev = evaluator();
        assert_eq!(ev.coalesce(Value::nil(), Value::Int(7)), Value::Int(7));
        assert_eq!(ev.coalesce(Value::some(Value::Int(1)), Value::Int(7)), Value::Int(1));
    }

    #[test]
    fn test_optional_chain_skips_accessor() {
        let ev = evaluator();
        let result = ev
            .optional_chain(Value::nil(), |_| panic!("accessor must not run"))
            .unwrap();
        assert!(result.is_nil());
    }

    #[test]
    fn test_int_arithmetic_errors() {
        assert!(matches!(
            eval_binary(BinaryOp::Div, Value::Int(1), Value::Int(0)),
            Err(EvalError::DivisionByZero { .. })
        ));
        assert!(matches!(
            eval_binary(BinaryOp::Add, Value::Int(i64::MAX), Value::Int(1)),
            Err(EvalError::Overflow { .. })
        ));
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        assert_eq!(
            eval_binary(BinaryOp::Add, Value::Int(1), Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn test_optional_equals_wrapped() {
        assert!(loosely_equal(&Value::some(Value::Int(3)), &Value::Int(3)));
        assert!(!loosely_equal(&Value::nil(), &Value::Int(3)));
        assert!(loosely_equal(&Value::nil(), &Value::nil()));
    }
}
