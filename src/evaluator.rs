//! The interpreter proper.
//!
//! Evaluating an expression produces a value *and* an environment. Most
//! expressions hand back the environment they were given; `def` and
//! `macro` hand back an extended one, and a form threads the environment
//! from each element into the next, so a definition is visible to the
//! elements after it in the same form.
//!
//! Dispatch order for a form whose head is a symbol: `macro`, `def`, a
//! registered macro name, `fn`, `if`. Every other form (including one whose
//! head is itself a form) is evaluated element by element and then applied:
//!
//! - a vector head indexes with the first remaining value (`([1 2 3] 2)` is 3)
//! - a callable head is called with the remaining values
//! - any other head makes the form evaluate to its last value, which is how
//!   `((print a) (print b))` sequences two steps
//!
//! Functions are called in the *caller's* environment, extended with their
//! parameters; nothing is captured at definition time.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::Expr;
use crate::builtinops::{Arity, get_builtin_ops};
use crate::evaluator::intooperation::Values;
use crate::value::{NumberType, Value};
use crate::{DEFAULT_MAX_EVAL_DEPTH, Error};

mod environment;
pub mod intooperation;
mod macros;

pub use environment::Environment;
pub use macros::Macro;

/// Remaining native stack below which evaluation switches to a fresh segment.
/// Leaves a builtin room to display, compare or drop a value nested to
/// [`crate::MAX_VALUE_DEPTH`].
const STACK_RED_ZONE: usize = 512 * 1024;
/// Size of each additional stack segment
const STACK_GROWTH: usize = 4 * 1024 * 1024;

/// Evaluation limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Maximum nesting of evaluated expressions and function bodies
    pub max_depth: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig {
            max_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }
}

impl EvalConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Current evaluation depth, checked against the configured limit
#[derive(Clone, Copy)]
struct Depth<'a> {
    config: &'a EvalConfig,
    level: usize,
}

impl<'a> Depth<'a> {
    fn root(config: &'a EvalConfig) -> Self {
        Depth { config, level: 0 }
    }

    fn descend(self) -> Result<Self, Error> {
        if self.level >= self.config.max_depth {
            return Err(Error::DepthExceeded {
                max: self.config.max_depth,
            });
        }
        Ok(Depth {
            level: self.level + 1,
            ..self
        })
    }
}

/// The call site as seen by a builtin: the caller's environment and the
/// current evaluation depth
pub struct CallContext<'a> {
    env: &'a Environment,
    depth: Depth<'a>,
}

impl<'a> CallContext<'a> {
    #[cfg(test)]
    pub(crate) fn new(env: &'a Environment, config: &'a EvalConfig) -> Self {
        CallContext {
            env,
            depth: Depth::root(config),
        }
    }

    /// The environment of the form that made the call
    pub fn env(&self) -> &Environment {
        self.env
    }

    /// Call a function or builtin from inside a builtin, exactly as a form
    /// at the call site would
    pub fn call(&self, callee: &Value, args: Vec<Value>) -> Result<Value, Error> {
        call(callee, args, self.env, self.depth)
    }
}

/// Evaluate one expression, returning its value and the resulting
/// environment
pub fn eval(expr: &Expr, env: &Environment) -> Result<(Value, Environment), Error> {
    eval_with_config(expr, env, &EvalConfig::default())
}

pub fn eval_with_config(
    expr: &Expr,
    env: &Environment,
    config: &EvalConfig,
) -> Result<(Value, Environment), Error> {
    eval_expr(expr, env, Depth::root(config))
}

/// Evaluate a program: the expressions are treated as the elements of a
/// single form, so each sees the definitions made before it
pub fn evaluate(exprs: &[Expr], env: &Environment) -> Result<(Value, Environment), Error> {
    evaluate_with_config(exprs, env, &EvalConfig::default())
}

pub fn evaluate_with_config(
    exprs: &[Expr],
    env: &Environment,
    config: &EvalConfig,
) -> Result<(Value, Environment), Error> {
    let depth = Depth::root(config).descend()?;
    eval_form(exprs, env, depth)
}

fn eval_expr(
    expr: &Expr,
    env: &Environment,
    depth: Depth<'_>,
) -> Result<(Value, Environment), Error> {
    let depth = depth.descend()?;
    match expr {
        Expr::Number(n) => Ok((Value::Number(*n as NumberType), env.clone())),
        Expr::Bool(b) => Ok((Value::Bool(*b), env.clone())),
        Expr::Symbol(name) => Ok((env.lookup(name), env.clone())),
        Expr::Form(elements) => {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || {
                eval_form(elements, env, depth)
            })
            .map_err(|err| err.in_form(expr))
        }
    }
}

fn eval_form(
    elements: &[Expr],
    env: &Environment,
    depth: Depth<'_>,
) -> Result<(Value, Environment), Error> {
    if let [Expr::Symbol(head), args @ ..] = elements {
        match &**head {
            "macro" => return define_macro(args, env),
            "def" => return eval_def(args, env, depth),
            _ => {}
        }

        if let Some(expander) = env.macro_named(head) {
            let expansion = expander.expand(head, args)?;
            return eval_expr(&expansion, env, depth);
        }

        match &**head {
            "fn" => return eval_fn(args, env),
            "if" => return eval_if(args, env, depth),
            _ => {}
        }
    }

    eval_sequence(elements, env, depth)
}

/// `(macro name (::p ...) body)`
fn define_macro(args: &[Expr], env: &Environment) -> Result<(Value, Environment), Error> {
    let [name, params, body] = args else {
        return Err(Error::arity_error("macro", Arity::Exact(3), args.len()));
    };
    let name = symbol_name(name, "macro name")?;
    let params = param_names(params, "macro")?;

    debug!(name = %name, params = params.len(), "defining macro");
    let expander = Macro::new(params, body.clone());
    Ok((Value::Null, env.bind_macro(Arc::clone(name), expander)))
}

/// `(def name value)`: the value is evaluated in the current environment
fn eval_def(
    args: &[Expr],
    env: &Environment,
    depth: Depth<'_>,
) -> Result<(Value, Environment), Error> {
    let [name, value_expr] = args else {
        return Err(Error::arity_error("def", Arity::Exact(2), args.len()));
    };
    let name = symbol_name(name, "def name")?;
    let (value, _) = eval_expr(value_expr, env, depth)?;

    debug!(name = %name, value = %value, "def");
    Ok((Value::Null, env.bind(Arc::clone(name), value)))
}

/// `(fn (params ...) body)`: no environment is captured
fn eval_fn(args: &[Expr], env: &Environment) -> Result<(Value, Environment), Error> {
    let [params, body] = args else {
        return Err(Error::arity_error("fn", Arity::Exact(2), args.len()));
    };
    let params = param_names(params, "fn")?;
    Ok((
        Value::Function {
            params,
            body: body.clone(),
        },
        env.clone(),
    ))
}

/// `(if test consequent [alternative])`: both legs start from the original
/// environment; a missing alternative yields null
fn eval_if(
    args: &[Expr],
    env: &Environment,
    depth: Depth<'_>,
) -> Result<(Value, Environment), Error> {
    let (test, consequent, alternative) = match args {
        [test, consequent] => (test, consequent, None),
        [test, consequent, alternative] => (test, consequent, Some(alternative)),
        _ => return Err(Error::arity_error("if", Arity::Range(2, 3), args.len())),
    };

    let (condition, _) = eval_expr(test, env, depth)?;
    let branch = if condition.is_truthy() {
        Some(consequent)
    } else {
        alternative
    };

    match branch {
        Some(branch) => eval_expr(branch, env, depth),
        None => Ok((Value::Null, env.clone())),
    }
}

/// Evaluate every element, threading the environment through, then apply
fn eval_sequence(
    elements: &[Expr],
    env: &Environment,
    depth: Depth<'_>,
) -> Result<(Value, Environment), Error> {
    let mut env = env.clone();
    let mut results = Vec::with_capacity(elements.len());
    for element in elements {
        let (value, next) = eval_expr(element, &env, depth)?;
        results.push(value);
        env = next;
    }

    let value = apply(results, &env, depth)?;
    Ok((value, env))
}

/// The three-way apply step: index, call, or take the last value
fn apply(results: Vec<Value>, env: &Environment, depth: Depth<'_>) -> Result<Value, Error> {
    let mut results = results.into_iter();
    match results.next() {
        Some(Value::Vector(items)) => Ok(Value::index(&items, results.next().as_ref())),
        Some(callee) if callee.is_callable() => call(&callee, results.collect(), env, depth),
        Some(first) => Ok(results.last().unwrap_or(first)),
        None => Ok(Value::Null),
    }
}

/// Call a function or builtin with already-evaluated arguments.
///
/// A user function's body runs in `env` (the caller's environment)
/// extended with its parameters; only the value comes back out.
fn call(
    callee: &Value,
    args: Vec<Value>,
    env: &Environment,
    depth: Depth<'_>,
) -> Result<Value, Error> {
    match callee {
        Value::Builtin { id, func } => {
            trace!(builtin = %id, args = args.len(), "call");
            func(args, &CallContext { env, depth })
        }
        Value::Function { params, body } => {
            if params.len() != args.len() {
                return Err(Error::arity_error(
                    callee.to_string(),
                    Arity::Exact(params.len()),
                    args.len(),
                ));
            }
            trace!(function = %callee, args = args.len(), "call");

            let call_env = params
                .iter()
                .zip(args)
                .fold(env.clone(), |scope, (param, arg)| {
                    scope.bind(Arc::clone(param), arg)
                });
            let (value, _) = eval_expr(body, &call_env, depth.descend()?)?;
            Ok(value)
        }
        other => Err(Error::type_error(format!(
            "cannot call {} {other}",
            other.type_name()
        ))),
    }
}

fn symbol_name<'e>(expr: &'e Expr, what: &str) -> Result<&'e Arc<str>, Error> {
    match expr {
        Expr::Symbol(name) => Ok(name),
        other => Err(Error::type_error(format!(
            "{what} must be a symbol, got {other}"
        ))),
    }
}

fn param_names(expr: &Expr, form: &str) -> Result<Arc<[Arc<str>]>, Error> {
    let Expr::Form(elements) = expr else {
        return Err(Error::type_error(format!(
            "{form} parameters must be a list, got {expr}"
        )));
    };
    elements
        .iter()
        .map(|param| symbol_name(param, &format!("{form} parameter")).cloned())
        .collect()
}

/// Create a global environment: `true`, `false`, every registry builtin,
/// and a `print` that writes to stdout
pub fn create_global_env() -> Environment {
    let env = Environment::new()
        .bind("true", Value::Bool(true))
        .bind("false", Value::Bool(false));

    get_builtin_ops()
        .iter()
        .fold(env, |env, op| env.bind(op.id, op.to_value()))
        .with_variadic_builtin_operation::<(Values,), _>(
            "print",
            Arity::Any,
            crate::output::print_to_stdout,
        )
}
