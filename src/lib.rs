//! threadlisp - a small homoiconic expression language
//!
//! Source text is parsed into nested forms whose leaves are integers and
//! symbols, and evaluated against an immutable environment that is threaded
//! from one element of a form to the next.
//!
//! ```text
//! (def a 5)
//! (defn add-1 (x) (+ 1 x))
//! ((print a) (print (add-1 a)))
//! (print ([10 20 30] 1))
//! (macro unless (::c ::x) (if ::c false ::x))
//! ```
//!
//! The first line makes `a` visible to later elements, and `defn` is a
//! prelude macro over `def` and `fn`. The third line sequences two prints
//! (5 then 6), the fourth indexes a vector and prints 20, and the last
//! defines an unhygienic textual macro. The language has no comment syntax.
//!
//! ## Semantics worth knowing up front
//!
//! - **Threaded environments**: `def` returns a new environment; the elements of
//!   a form see the definitions made by the elements before them, and nothing
//!   else does.
//! - **Call-site scoping**: a function does not capture the environment it was
//!   defined in. Calling it extends the *caller's* environment with the
//!   parameters, so free identifiers resolve dynamically.
//! - **One apply step, three meanings**: after the elements of a form are
//!   evaluated, a vector head indexes, a callable head calls, and any other head
//!   makes the form evaluate to its last element.
//! - **Self-quoting symbols**: an unbound symbol evaluates to itself.
//!
//! ## Modules
//!
//! - `parser`: text to expressions (lenient and strict entry points)
//! - `ast`: the expression tree
//! - `value`: runtime values
//! - `evaluator`: environments, macros, special forms and application
//! - `builtinops`: the primitive registry
//! - `prelude`: the standard library written in the language itself
//! - `output`: `print` capture for hosts and test harnesses

use std::fmt;
use std::sync::Once;

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod output;
pub mod parser;
pub mod prelude;
pub mod value;

pub use ast::Expr;
pub use builtinops::Arity;
pub use evaluator::{
    CallContext, EvalConfig, Environment, create_global_env, eval, eval_with_config, evaluate,
    evaluate_with_config,
};
pub use output::{Captured, OutputLog, run_captured, run_program, run_program_with_config};
pub use parser::{ParseConfig, parse, parse_program, parse_program_with_config, parse_with_config};
pub use value::Value;

/// Default nesting limit for bracket groups accepted by the parser
pub const DEFAULT_MAX_PARSE_DEPTH: usize = 256;

/// Default evaluation depth limit.
/// Every evaluated expression and every function body counts one level, so
/// user recursion reaches the limit several times faster than its call depth.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 10_000;

/// Deepest nesting of vectors and lists a program may build. Builtins loop
/// in Rust rather than through evaluation, so this is checked where the
/// values are made instead of by the evaluation depth.
pub const MAX_VALUE_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// A stray or mismatched closing bracket, or text no expression can start with
    InvalidSyntax,
    /// Input ended before a bracket group was closed
    Incomplete,
    /// Bracket nesting exceeded the configured parse depth
    TooDeeplyNested,
    /// An integer literal that does not fit in 64 bits
    ImplementationLimit,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with context extracted from input at a byte offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let found = input[error_offset..].chars().next().map(String::from);

        // Back up a little so the snippet shows what led to the error
        let mut context_start = error_offset.saturating_sub(20);
        while !input.is_char_boundary(context_start) {
            context_start -= 1;
        }

        let context_str: String = input[context_start..].chars().take(MAX_CONTEXT).collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("ParseError: {0}{}", parse_details(.0))]
    Parse(#[from] ParseError),
    #[error("TypeError: {message}{}", context_suffix(.context))]
    Type {
        message: String,
        /// The innermost form being evaluated when the error was raised
        context: Option<String>,
    },
    #[error("ArityError: {callee} expected {expected} arguments, got {got}")]
    Arity {
        callee: String,
        expected: Arity,
        got: usize,
    },
    #[error("EvaluationError: evaluation depth limit exceeded (max: {max})")]
    DepthExceeded { max: usize },
    #[error("EvaluationError: value nesting limit exceeded (max: {max})")]
    NestingTooDeep { max: usize },
}

impl Error {
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type {
            message: message.into(),
            context: None,
        }
    }

    pub fn arity_error(callee: impl Into<String>, expected: Arity, got: usize) -> Self {
        Error::Arity {
            callee: callee.into(),
            expected,
            got,
        }
    }

    /// Attach the form being evaluated, keeping the innermost one if already set
    pub(crate) fn in_form(self, form: &Expr) -> Self {
        match self {
            Error::Type {
                message,
                context: None,
            } => Error::Type {
                message,
                context: Some(form.to_string()),
            },
            other => other,
        }
    }
}

fn context_suffix(context: &Option<String>) -> String {
    match context {
        Some(form) => format!("\n  Context: while evaluating {form}"),
        None => String::new(),
    }
}

fn parse_details(error: &ParseError) -> String {
    let mut details = String::new();
    if let Some(found) = &error.found {
        details.push_str(&format!("\nFound: {found}"));
    }
    if let Some(context) = &error.context {
        details.push_str(&format!("\nContext: {context}"));
    }
    details
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParseErrorKind::InvalidSyntax => "invalid syntax",
            ParseErrorKind::Incomplete => "incomplete input",
            ParseErrorKind::TooDeeplyNested => "too deeply nested",
            ParseErrorKind::ImplementationLimit => "implementation limit",
        };
        f.write_str(name)
    }
}

static TRACING_INIT: Once = Once::new();

/// Initialize a `tracing` subscriber for interpreter diagnostics.
///
/// Only installs a subscriber when `RUST_LOG` is set, e.g.
/// `RUST_LOG=threadlisp=trace` to see every macro expansion and call.
/// Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
