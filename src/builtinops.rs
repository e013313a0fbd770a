//! Built-in operations registry.
//!
//! Every primitive the global environment exposes (apart from `print`, which
//! belongs to the output layer) is defined once here, together with its
//! arity, and bound into the environment by [`crate::create_global_env`].
//!
//! ```text
//! (+ 5 6 (+ 1 2))
//! (- 25 10 5)
//! (= [1 2 3] [1 2 3])
//! (reduce + 0 [1 2 3 4])
//! (append 3 [1 2])
//! ```
//!
//! These evaluate to 14 (`+` folds from 0), 10 (`-` folds from its first
//! argument), true (structural equality), 10 and `[1 2 3]`.
//!
//! ## Functions vs Special Forms
//!
//! Everything here receives evaluated arguments. `def`, `fn`, `if` and
//! `macro` control evaluation of their operands and are handled directly by
//! the evaluator; the derived operators (`and`, `or`, `>`, `map`, ...) are
//! written in the language itself, see [`crate::prelude`].
//!
//! ## Error Handling
//!
//! - **Type errors**: arithmetic and `<` reject non-numbers, `append` and
//!   `reduce` reject non-vectors, `reduce` rejects a non-callable reducer.
//! - **Arity errors**: every operation declares its [`Arity`], validated
//!   before the implementation runs.
//! - Numbers follow IEEE semantics, so `(/ 1 0)` is infinity rather than an
//!   error.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (see
//!    [`crate::evaluator::intooperation`]) or, when it needs the call site,
//!    with the raw `fn(Vec<Value>, &CallContext) -> Result<Value, Error>`
//!    signature
//! 2. **Add it to BUILTIN_OPS** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::evaluator::CallContext;
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, Numbers, OperationFn, Values,
};
use crate::value::{NumberType, Value, Vector};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// At least n arguments
    AtLeast(usize),
    /// Between min and max arguments (inclusive)
    Range(usize, usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    pub fn accepts(&self, arg_count: usize) -> bool {
        match *self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
            Arity::Range(min, max) => (min..=max).contains(&arg_count),
            Arity::Any => true,
        }
    }

    /// Check an argument count, naming `callee` in the error
    pub fn validate(&self, callee: &str, arg_count: usize) -> Result<(), Error> {
        if self.accepts(arg_count) {
            Ok(())
        } else {
            Err(Error::arity_error(callee, *self, arg_count))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Range(min, max) => write!(f, "{min} to {max}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Clone)]
pub struct BuiltinOp {
    /// The identifier the operation is bound to in the global environment
    pub id: &'static str,
    /// Expected number of arguments
    pub arity: Arity,
    /// The implementation, already wrapped with arity validation
    pub func: Arc<OperationFn>,
}

impl fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Identifiers are unique within the registry
        self.id == other.id
    }
}

impl BuiltinOp {
    /// The value bound to this operation's identifier
    pub fn to_value(&self) -> Value {
        Value::Builtin {
            id: self.id.into(),
            func: Arc::clone(&self.func),
        }
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(nums: Numbers) -> Result<NumberType, Error> {
    Ok(nums.fold(0.0, |sum, n| sum + n))
}

fn builtin_mul(nums: Numbers) -> Result<NumberType, Error> {
    Ok(nums.fold(1.0, |product, n| product * n))
}

// Left folds seeded with the first argument; a lone argument comes back
// unchanged, so `(- 5)` is 5 rather than a negation.
macro_rules! left_fold {
    ($name:ident, $op:expr) => {
        fn $name(first: NumberType, rest: Numbers) -> Result<NumberType, Error> {
            Ok(rest.fold(first, $op))
        }
    };
}

left_fold!(builtin_sub, |acc, n| acc - n);
left_fold!(builtin_div, |acc, n| acc / n);
left_fold!(builtin_pow, NumberType::powf);

fn builtin_lt(a: NumberType, b: NumberType) -> Result<bool, Error> {
    Ok(a < b)
}

fn builtin_not(value: Value) -> Result<bool, Error> {
    Ok(!value.is_truthy())
}

/// True iff there are at least two arguments and all of them are
/// structurally equal to the first
fn builtin_equal(mut values: Values) -> Result<bool, Error> {
    let Some(first) = values.next() else {
        return Ok(false);
    };
    let mut rest = values.peekable();
    if rest.peek().is_none() {
        return Ok(false);
    }
    Ok(rest.all(|value| value == first))
}

fn builtin_array_of(values: Values) -> Result<Vector, Error> {
    let items: Vector = values.collect();
    Value::check_nesting(&items)?;
    Ok(items)
}

/// Only the new item can deepen the vector; its existing elements were
/// checked when they were built
fn builtin_append(item: Value, vector: Vector) -> Result<Vector, Error> {
    Value::check_nesting([&item])?;
    Ok(Value::append(item, &vector))
}

/// `(reduce f seed vector)`: left fold calling `f` with the caller's
/// environment, as a user-level call would
fn builtin_reduce(args: Vec<Value>, ctx: &CallContext<'_>) -> Result<Value, Error> {
    let [reducer, seed, vector]: [Value; 3] = args
        .try_into()
        .map_err(|args: Vec<Value>| Error::arity_error("reduce", Arity::Exact(3), args.len()))?;

    if !reducer.is_callable() {
        return Err(Error::type_error(format!(
            "reduce expects a function, got {} {reducer}",
            reducer.type_name()
        )));
    }
    let vector = Vector::try_from(vector)?;

    vector
        .into_iter()
        .try_fold(seed, |acc, item| ctx.call(&reducer, vec![acc, item]))
}

/// Global registry of all built-in operations.
///
/// The typed implementations above are adapted to the erased
/// [`OperationFn`] once, at initialization time, and wrapped so that the
/// declared arity is checked before any argument conversion.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn checked(id: &'static str, arity: Arity, inner: Arc<OperationFn>) -> BuiltinOp {
        let func: Arc<OperationFn> = Arc::new(move |args: Vec<Value>, ctx: &CallContext<'_>| {
            arity.validate(id, args.len())?;
            inner(args, ctx)
        });
        BuiltinOp { id, arity, func }
    }

    fn builtin_fixed<Args, F>(id: &'static str, arity: Arity, f: F) -> BuiltinOp
    where
        F: IntoOperation<Args>,
    {
        checked(id, arity, f.into_operation(id))
    }

    fn builtin_variadic<Args, F>(id: &'static str, arity: Arity, f: F) -> BuiltinOp
    where
        F: IntoVariadicOperation<Args>,
    {
        checked(id, arity, f.into_variadic_operation(id))
    }

    fn builtin_raw(
        id: &'static str,
        arity: Arity,
        f: fn(Vec<Value>, &CallContext<'_>) -> Result<Value, Error>,
    ) -> BuiltinOp {
        checked(id, arity, Arc::new(f))
    }

    vec![
        // Arithmetic operations
        builtin_variadic::<(Numbers,), _>("+", Arity::Any, builtin_add),
        builtin_variadic::<(Numbers,), _>("*", Arity::Any, builtin_mul),
        builtin_variadic::<(NumberType, Numbers), _>("-", Arity::AtLeast(1), builtin_sub),
        builtin_variadic::<(NumberType, Numbers), _>("/", Arity::AtLeast(1), builtin_div),
        builtin_variadic::<(NumberType, Numbers), _>("^", Arity::AtLeast(1), builtin_pow),
        // Logic
        builtin_fixed::<(NumberType, NumberType), _>("<", Arity::Exact(2), builtin_lt),
        builtin_fixed::<(Value,), _>("not", Arity::Exact(1), builtin_not),
        builtin_variadic::<(Values,), _>("=", Arity::Any, builtin_equal),
        // Vectors
        builtin_variadic::<(Values,), _>("arrayOf", Arity::Any, builtin_array_of),
        builtin_fixed::<(Value, Vector), _>("append", Arity::Exact(2), builtin_append),
        builtin_raw("reduce", Arity::Exact(3), builtin_reduce),
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.id, op)).collect()
    });

/// All builtin operations, in registration order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
