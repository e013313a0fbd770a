//! Runtime values produced by evaluation.
//!
//! Values are immutable. Vectors are persistent (`im::Vector`), so `append`
//! shares structure with the vector it extends instead of copying it.
//! Functions carry only their parameter names and body template: the
//! environment they run in is supplied by the caller at each call.

use std::fmt;
use std::sync::Arc;

use crate::ast::Expr;
use crate::{Error, MAX_VALUE_DEPTH};
use crate::evaluator::intooperation::OperationFn;

/// Numeric type of the language: integers on input, but `/` and `^` may
/// produce fractions
pub type NumberType = f64;

/// The language's only collection type
pub type Vector = im::Vector<Value>;

#[derive(Clone)]
pub enum Value {
    /// Absence, e.g. an out-of-range vector index or the result of `def`
    Null,
    Number(NumberType),
    Bool(bool),
    /// An unbound symbol evaluates to its own name
    Symbol(Arc<str>),
    Vector(Vector),
    /// A raw argument list, as returned by `print`. Unlike a vector it is
    /// never indexed or called, so a form headed by one falls through to
    /// implicit sequencing.
    List(Arc<[Value]>),
    /// User-defined function. Carries no environment: the caller supplies one
    /// at each call.
    Function {
        params: Arc<[Arc<str>]>,
        body: Expr,
    },
    /// Built-in function; compared by id
    Builtin {
        id: Arc<str>,
        func: Arc<OperationFn>,
    },
}

impl Value {
    /// Truthiness used by `if` and `not`: null, false, zero and NaN are false
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Bool(false) => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            _ => true,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function { .. } | Value::Builtin { .. })
    }

    /// Short name of the variant, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Symbol(_) => "symbol",
            Value::Vector(_) => "vector",
            Value::List(_) => "list",
            Value::Function { .. } => "function",
            Value::Builtin { .. } => "builtin",
        }
    }

    /// Element at `index` if it is a non-negative integer inside the vector,
    /// otherwise `Null`. Never an error.
    pub fn index(vector: &Vector, index: Option<&Value>) -> Value {
        match index {
            Some(Value::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => vector
                .get(*n as usize)
                .cloned()
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// A new vector with `item` at the end; `vector` is left untouched
    pub fn append(item: Value, vector: &Vector) -> Vector {
        let mut extended = vector.clone();
        extended.push_back(item);
        extended
    }

    /// Levels of vectors and lists in this value: 0 for an atom, 1 for a
    /// vector of atoms
    pub fn nesting_depth(&self) -> usize {
        match self {
            Value::Vector(items) => 1 + items.iter().map(Value::nesting_depth).max().unwrap_or(0),
            Value::List(items) => 1 + items.iter().map(Value::nesting_depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Fails if a vector or list holding `elements` would nest deeper than
    /// [`MAX_VALUE_DEPTH`].
    ///
    /// Display, equality and drop all recurse through nested values, so
    /// every container a program builds goes through here first.
    pub fn check_nesting<'a>(elements: impl IntoIterator<Item = &'a Value>) -> Result<(), Error> {
        let depth = 1 + elements
            .into_iter()
            .map(Value::nesting_depth)
            .max()
            .unwrap_or(0);
        if depth > MAX_VALUE_DEPTH {
            return Err(Error::NestingTooDeep {
                max: MAX_VALUE_DEPTH,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::Vector(items) => {
                write!(f, "Vector(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::List(items) => write!(f, "List({items:?})"),
            Value::Function { params, body } => {
                write!(f, "Function(params={params:?}, body={body})")
            }
            Value::Builtin { id, .. } => write!(f, "Builtin({id})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_seq<'a>(
            f: &mut fmt::Formatter<'_>,
            items: impl Iterator<Item = &'a Value>,
        ) -> fmt::Result {
            for (i, item) in items.enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{item}")?;
            }
            Ok(())
        }

        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::Vector(items) => {
                write!(f, "[")?;
                write_seq(f, items.iter())?;
                write!(f, "]")
            }
            Value::List(items) => {
                write!(f, "(")?;
                write_seq(f, items.iter())?;
                write!(f, ")")
            }
            Value::Function { params, .. } => write!(f, "#<fn ({})>", params.join(" ")),
            Value::Builtin { id, .. } => write!(f, "#<builtin:{id}>"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (
                Value::Function {
                    params: p1,
                    body: b1,
                },
                Value::Function {
                    params: p2,
                    body: b2,
                },
            ) => p1 == p2 && b1 == b2,
            // Compare builtins by id, not function pointer
            (Value::Builtin { id: id1, .. }, Value::Builtin { id: id2, .. }) => id1 == id2,
            _ => false,
        }
    }
}

impl From<NumberType> for Value {
    fn from(n: NumberType) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Symbol(s.into())
    }
}

impl From<Vector> for Value {
    fn from(items: Vector) -> Self {
        Value::Vector(items)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Vector(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::Vector(arr.into_iter().map(Into::into).collect())
    }
}

// Fallible conversions from `Value` back into Rust types, used by the
// typed builtin adapters.

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<NumberType, Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(Error::type_error(format!(
                "expected number, got {} {other}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for Vector {
    type Error = Error;

    fn try_from(value: Value) -> Result<Vector, Error> {
        match value {
            Value::Vector(items) => Ok(items),
            other => Err(Error::type_error(format!(
                "expected vector, got {} {other}",
                other.type_name()
            ))),
        }
    }
}

/// Helper for building values in code and tests
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}
