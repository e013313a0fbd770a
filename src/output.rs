//! `print`, the language's only I/O, and the program runners built on it.
//!
//! The global environment's `print` writes to stdout. Hosts and test
//! harnesses that want to observe output instead install an [`OutputLog`],
//! which rebinds `print` to record its arguments:
//!
//! ```
//! use threadlisp::{OutputLog, Value, create_global_env, run_program};
//!
//! let log = OutputLog::new();
//! let env = log.install(&create_global_env());
//! run_program("(print 1 2) (print (+ 1 2))", &env).unwrap();
//! assert_eq!(log.values(), vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::Error;
use crate::ast::Expr;
use crate::builtinops::Arity;
use crate::evaluator::intooperation::Values;
use crate::evaluator::{EvalConfig, Environment, create_global_env, evaluate_with_config};
use crate::parser::{ParseConfig, parse_program_with_config};
use crate::prelude::prelude;
use crate::value::Value;

/// `print` as bound in [`create_global_env`]: writes its arguments to
/// stdout separated by spaces and returns them as a list
pub(crate) fn print_to_stdout(values: Values) -> Result<Value, Error> {
    let values: Vec<Value> = values.collect();
    Value::check_nesting(&values)?;
    let line: Vec<String> = values.iter().map(ToString::to_string).collect();
    println!("{}", line.join(" "));
    Ok(Value::List(values.into()))
}

/// Shared recorder for everything passed to `print`.
///
/// Clones share the same log, so a host can keep one handle while the
/// environment holds another.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    entries: Arc<Mutex<Vec<Value>>>,
}

impl OutputLog {
    pub fn new() -> Self {
        OutputLog::default()
    }

    /// An environment like `env` whose `print` appends to this log
    #[must_use]
    pub fn install(&self, env: &Environment) -> Environment {
        let entries = Arc::clone(&self.entries);
        env.with_variadic_builtin_operation::<(Values,), _>(
            "print",
            Arity::Any,
            move |values: Values| -> Result<Value, Error> {
                let values: Vec<Value> = values.collect();
                Value::check_nesting(&values)?;
                entries.lock().extend(values.iter().cloned());
                Ok(Value::List(values.into()))
            },
        )
    }

    /// Everything printed so far, in order
    pub fn values(&self) -> Vec<Value> {
        self.entries.lock().clone()
    }

    /// Everything printed so far, clearing the log
    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.entries.lock())
    }
}

/// Parse `source`, run it after the prelude in `env`, and return the value
/// of its last expression. The final environment is discarded.
pub fn run_program(source: &str, env: &Environment) -> Result<Value, Error> {
    run_program_with_config(source, env, &ParseConfig::default(), &EvalConfig::default())
}

pub fn run_program_with_config(
    source: &str,
    env: &Environment,
    parse_config: &ParseConfig,
    eval_config: &EvalConfig,
) -> Result<Value, Error> {
    let program = parse_program_with_config(source, parse_config)?;
    debug!(expressions = program.len(), "running program");

    let exprs: Vec<Expr> = prelude().iter().cloned().chain(program).collect();
    let (value, _) = evaluate_with_config(&exprs, env, eval_config)?;
    Ok(value)
}

/// Output and outcome of one program run
#[derive(Debug, Clone, PartialEq)]
pub struct Captured {
    /// Every value passed to `print`, including those printed before a failure
    pub output: Vec<Value>,
    pub result: Result<Value, Error>,
}

/// Run `source` against a fresh global environment, capturing `print`
pub fn run_captured(source: &str) -> Captured {
    let log = OutputLog::new();
    let env = log.install(&create_global_env());
    let result = run_program(source, &env);
    Captured {
        output: log.take(),
        result,
    }
}
