use std::fmt;
use std::sync::Arc;

use crate::Error;
use crate::builtinops::Arity;
use crate::evaluator::CallContext;
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::evaluator::macros::Macro;
use crate::value::Value;

/// Immutable environment of value bindings plus the macro table.
///
/// Both maps are persistent (`im::HashMap`): every extension returns a new
/// environment sharing all unmodified entries with its parent, and a lookup
/// is a single flat map access rather than a walk up a parent chain.
/// Cloning is cheap.
#[derive(Clone, Default)]
pub struct Environment {
    bindings: im::HashMap<Arc<str>, Value>,
    macros: im::HashMap<Arc<str>, Macro>,
}

impl Environment {
    /// An environment with no bindings at all; see
    /// [`crate::create_global_env`] for one with the builtins
    pub fn new() -> Self {
        Environment::default()
    }

    /// Value bound to `name`, or the name itself as a symbol when unbound
    pub fn lookup(&self, name: &Arc<str>) -> Value {
        self.bindings
            .get(&**name)
            .cloned()
            .unwrap_or_else(|| Value::Symbol(Arc::clone(name)))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// A new environment identical to this one except that `name` maps to
    /// `value`
    #[must_use]
    pub fn bind(&self, name: impl Into<Arc<str>>, value: Value) -> Self {
        Environment {
            bindings: self.bindings.update(name.into(), value),
            macros: self.macros.clone(),
        }
    }

    /// A new environment with `expander` registered under `name`
    #[must_use]
    pub fn bind_macro(&self, name: impl Into<Arc<str>>, expander: Macro) -> Self {
        Environment {
            bindings: self.bindings.clone(),
            macros: self.macros.update(name.into(), expander),
        }
    }

    pub fn macro_named(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    /// Bind a builtin that works directly on the evaluated argument slice.
    ///
    /// This is the low-level API. For most new code, prefer the typed
    /// [`Environment::with_builtin_operation`].
    ///
    /// # Example
    /// ```
    /// use threadlisp::{Error, Value, create_global_env, run_program};
    ///
    /// fn count(args: &[Value]) -> Result<Value, Error> {
    ///     Ok(Value::Number(args.len() as f64))
    /// }
    ///
    /// let env = create_global_env().with_builtin_function("count", count);
    /// assert_eq!(run_program("(count 1 2 3)", &env), Ok(Value::Number(3.0)));
    /// ```
    #[must_use]
    pub fn with_builtin_function(
        &self,
        name: &str,
        func: fn(&[Value]) -> Result<Value, Error>,
    ) -> Self {
        let wrapped: Arc<OperationFn> =
            Arc::new(move |args: Vec<Value>, _ctx: &CallContext<'_>| func(&args));
        self.bind_builtin(name, wrapped)
    }

    /// Bind a strongly-typed Rust function as a builtin, with automatic
    /// argument conversion and arity checking.
    ///
    /// Supported parameter types are `f64` (numbers), `im::Vector<Value>`
    /// (vectors) and `Value` (anything). The function returns
    /// `Result<T, Error>` for any `T: Into<Value>`. The argument tuple type
    /// usually has to be spelled out:
    ///
    /// ```
    /// use threadlisp::{Error, Value, create_global_env, run_program};
    ///
    /// fn hypot(a: f64, b: f64) -> Result<f64, Error> {
    ///     Ok((a * a + b * b).sqrt())
    /// }
    ///
    /// let env = create_global_env().with_builtin_operation::<(f64, f64), _>("hypot", hypot);
    /// assert_eq!(run_program("(hypot 3 4)", &env), Ok(Value::Number(5.0)));
    /// ```
    #[must_use]
    pub fn with_builtin_operation<Args, F>(&self, name: &str, func: F) -> Self
    where
        F: IntoOperation<Args>,
    {
        self.bind_builtin(name, func.into_operation(name))
    }

    /// Bind a builtin whose last parameter collects the remaining arguments
    /// (`Values` or `Numbers` from [`crate::evaluator::intooperation`]).
    ///
    /// The argument count cannot be derived from such a signature, so the
    /// [`Arity`] is given explicitly and validated on every call.
    #[must_use]
    pub fn with_variadic_builtin_operation<Args, F>(
        &self,
        name: &str,
        arity: Arity,
        func: F,
    ) -> Self
    where
        F: IntoVariadicOperation<Args>,
    {
        let inner = func.into_variadic_operation(name);
        let callee: Arc<str> = name.into();
        let wrapped: Arc<OperationFn> =
            Arc::new(move |args: Vec<Value>, ctx: &CallContext<'_>| {
                arity.validate(&callee, args.len())?;
                inner(args, ctx)
            });
        self.bind_builtin(name, wrapped)
    }

    fn bind_builtin(&self, name: &str, func: Arc<OperationFn>) -> Self {
        let id: Arc<str> = name.into();
        self.bind(Arc::clone(&id), Value::Builtin { id, func })
    }

    /// All value bindings, sorted by name
    pub fn get_all_bindings(&self) -> Vec<(Arc<str>, Value)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(name, value)| (Arc::clone(name), value.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// All macro names, sorted
    pub fn macro_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<_> = self.macros.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<Arc<str>> = self
            .get_all_bindings()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("macros", &self.macro_names())
            .finish()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{form, sym};
    use crate::value::val;

    #[test]
    fn test_lookup_falls_back_to_symbol() {
        let env = Environment::new().bind("a", val(5));
        assert_eq!(env.lookup(&Arc::from("a")), val(5));
        assert_eq!(env.lookup(&Arc::from("b")), val("b"));
        assert!(env.get("b").is_none());
    }

    #[test]
    fn test_bind_never_mutates_parent() {
        let outer = Environment::new().bind("a", val(5));
        let inner = outer.bind("a", val(6)).bind("b", val(7));

        assert_eq!(outer.get("a"), Some(&val(5)));
        assert!(outer.get("b").is_none());
        assert_eq!(inner.get("a"), Some(&val(6)));
        assert_eq!(inner.get("b"), Some(&val(7)));
    }

    #[test]
    fn test_macro_table_is_separate() {
        let expander = Macro::new(
            Arc::from(vec![Arc::<str>::from("::x")]),
            form([sym("print"), sym("::x")]),
        );
        let env = Environment::new().bind("m", val(1));
        let with_macro = env.bind_macro("m", expander.clone());

        assert!(env.macro_named("m").is_none());
        assert_eq!(with_macro.macro_named("m"), Some(&expander));
        // Value bindings are carried over untouched
        assert_eq!(with_macro.get("m"), Some(&val(1)));
        // and value bindings carry the macro table along
        assert!(with_macro.bind("n", val(2)).macro_named("m").is_some());
        assert_eq!(with_macro.macro_names(), vec![Arc::<str>::from("m")]);
    }

    #[test]
    fn test_builtin_registration() {
        fn first(args: &[Value]) -> Result<Value, Error> {
            Ok(args.first().cloned().unwrap_or(Value::Null))
        }
        fn double(x: f64) -> Result<f64, Error> {
            Ok(x * 2.0)
        }

        let env = Environment::new()
            .with_builtin_function("first", first)
            .with_builtin_operation::<(f64,), _>("double", double);

        let bindings = env.get_all_bindings();
        let names: Vec<&str> = bindings.iter().map(|(name, _)| &**name).collect();
        assert_eq!(names, vec!["double", "first"]);

        let Some(Value::Builtin { id, .. }) = env.get("double") else {
            panic!("double should be a builtin");
        };
        assert_eq!(&**id, "double");
        assert_eq!(env.get("first").unwrap().to_string(), "#<builtin:first>");
    }
}
