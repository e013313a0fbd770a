//! The standard library, written in the language itself.
//!
//! Only the primitives in [`crate::builtinops`] are implemented in Rust.
//! Everything here is ordinary source text: `defn`, `or` and `and` are
//! macros, the remaining comparisons and `map`/`filter` are functions built
//! from `<`, `=`, `not`, `reduce` and `append`.
//!
//! `or` and `and` are macros so that they short-circuit, e.g.
//! `(or true (print 1))` prints nothing. Note that `or` splices its first
//! argument twice, so a side effect in that position runs twice when it is
//! truthy.

use std::sync::LazyLock;

use crate::Error;
use crate::ast::Expr;
use crate::evaluator::{Environment, evaluate};
use crate::parser::parse_program;

pub const PRELUDE_SOURCE: &str = "
(macro defn (::name ::args ::body) (def ::name (fn ::args ::body)))
(macro or (::x ::y) (if ::x ::x ::y))
(macro and (::x ::y) (not (or (not ::x) (not ::y))))

(defn > (a b) (and (not (= a b)) (not (< a b))))
(defn >= (a b) (not (< a b)))
(defn <= (a b) (not (> a b)))
(defn != (a b) (not (= a b)))

(defn map (f arr) (reduce (fn (acc x) (append (f x) acc)) [] arr))
(defn filter (pred arr) (reduce (fn (acc x) (if (pred x) (append x acc) acc)) [] arr))
";

static PRELUDE: LazyLock<Vec<Expr>> =
    LazyLock::new(|| parse_program(PRELUDE_SOURCE).expect("prelude source must parse"));

/// The parsed prelude, shared by every program run in the process
pub fn prelude() -> &'static [Expr] {
    PRELUDE.as_slice()
}

/// `env` extended with every prelude definition
pub fn with_prelude(env: &Environment) -> Result<Environment, Error> {
    let (_, env) = evaluate(prelude(), env)?;
    Ok(env)
}
