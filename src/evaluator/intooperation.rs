use crate::Error;
use crate::builtinops::Arity;
use crate::evaluator::CallContext;
use crate::value::{NumberType, Value, Vector};
use std::iter::FusedIterator;
use std::sync::Arc;

// NOTE: This module is the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` stored in `Value::Builtin`.
//
// Hosts normally reach it through the registration methods on
// `Environment`; the traits are public only so that those methods can
// name them in their bounds.

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their evaluated arguments together with
/// the [`CallContext`] of the call site, which carries the caller's
/// environment (needed by higher-order builtins such as `reduce`).
pub type OperationFn = dyn Fn(Vec<Value>, &CallContext<'_>) -> Result<Value, Error> + Send + Sync;

// =====================================================================
// Fixed parameters
// =====================================================================

/// Conversion of a single evaluated argument into a typed parameter.
///
/// Supported parameter types are listed here so they are easy to audit:
/// `Value` (any argument), `NumberType` and `Vector`.
pub trait FromParam: Sized {
    fn from_param(value: Value) -> Result<Self, Error>;
}

impl FromParam for Value {
    fn from_param(value: Value) -> Result<Self, Error> {
        Ok(value)
    }
}

impl FromParam for NumberType {
    fn from_param(value: Value) -> Result<Self, Error> {
        NumberType::try_from(value)
    }
}

impl FromParam for Vector {
    fn from_param(value: Value) -> Result<Self, Error> {
        Vector::try_from(value)
    }
}

// =====================================================================
// Rest parameters
// =====================================================================

/// Conversion of the argument tail into a rest parameter.
pub trait FromRest: Sized {
    fn from_rest(values: Vec<Value>) -> Result<Self, Error>;
}

/// Rest parameter yielding the remaining arguments unchanged
#[derive(Debug)]
pub struct Values(std::vec::IntoIter<Value>);

/// Rest parameter yielding numeric arguments.
///
/// Every element is type-checked when the parameter is built, so a
/// builtin never observes a partially consumed tail before failing.
#[derive(Debug)]
pub struct Numbers(std::vec::IntoIter<NumberType>);

impl FromRest for Values {
    fn from_rest(values: Vec<Value>) -> Result<Self, Error> {
        Ok(Values(values.into_iter()))
    }
}

impl FromRest for Numbers {
    fn from_rest(values: Vec<Value>) -> Result<Self, Error> {
        let numbers = values
            .into_iter()
            .map(NumberType::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Numbers(numbers.into_iter()))
    }
}

macro_rules! impl_rest_iterator {
    ($rest:ident, $item:ty) => {
        impl Iterator for $rest {
            type Item = $item;

            fn next(&mut self) -> Option<Self::Item> {
                self.0.next()
            }

            fn size_hint(&self) -> (usize, Option<usize>) {
                self.0.size_hint()
            }
        }

        impl ExactSizeIterator for $rest {}
        impl FusedIterator for $rest {}
    };
}

impl_rest_iterator!(Values, Value);
impl_rest_iterator!(Numbers, NumberType);

// =====================================================================
// Adapter traits
// =====================================================================

/// Converts a strongly-typed Rust function into the erased
/// [`OperationFn`], parameterized by its argument tuple type.
///
/// The argument count is checked against the function's arity before any
/// conversion happens. `name` is used in error messages only.
pub trait IntoOperation<Args> {
    fn into_operation(self, name: &str) -> Arc<OperationFn>;
}

/// Converts a function whose last parameter is a rest parameter
/// ([`Values`] or [`Numbers`]), optionally after one fixed parameter.
///
/// The total argument count is validated by the registration site, which
/// knows the intended [`Arity`].
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self, name: &str) -> Arc<OperationFn>;
}

macro_rules! impl_into_operation_for_arity {
    ($arity:expr $(, $p:ident : $A:ident )* ) => {
        impl<F, T, $( $A ),*> IntoOperation<( $( $A, )* )> for F
        where
            F: Fn( $( $A ),* ) -> Result<T, Error> + Send + Sync + 'static,
            T: Into<Value>,
            $( $A: FromParam, )*
        {
            fn into_operation(self, name: &str) -> Arc<OperationFn> {
                let name: Arc<str> = name.into();
                Arc::new(move |args: Vec<Value>, _ctx: &CallContext<'_>| {
                    let [ $( $p ),* ]: [Value; $arity] = args.try_into().map_err(
                        |args: Vec<Value>| {
                            Error::arity_error(&*name, Arity::Exact($arity), args.len())
                        },
                    )?;
                    $( let $p = <$A as FromParam>::from_param($p)?; )*
                    (self)( $( $p ),* ).map(Into::into)
                })
            }
        }
    };
}

impl_into_operation_for_arity!(0);
impl_into_operation_for_arity!(1, p0: A1);
impl_into_operation_for_arity!(2, p0: A1, p1: A2);
impl_into_operation_for_arity!(3, p0: A1, p1: A2, p2: A3);
impl_into_operation_for_arity!(4, p0: A1, p1: A2, p2: A3, p3: A4);

impl<F, T, I> IntoVariadicOperation<(I,)> for F
where
    F: Fn(I) -> Result<T, Error> + Send + Sync + 'static,
    T: Into<Value>,
    I: FromRest,
{
    fn into_variadic_operation(self, _name: &str) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>, _ctx: &CallContext<'_>| {
            (self)(I::from_rest(args)?).map(Into::into)
        })
    }
}

impl<F, T, A1, I> IntoVariadicOperation<(A1, I)> for F
where
    F: Fn(A1, I) -> Result<T, Error> + Send + Sync + 'static,
    T: Into<Value>,
    A1: FromParam,
    I: FromRest,
{
    fn into_variadic_operation(self, name: &str) -> Arc<OperationFn> {
        let name: Arc<str> = name.into();
        Arc::new(move |args: Vec<Value>, _ctx: &CallContext<'_>| {
            let mut args = args.into_iter();
            let Some(first) = args.next() else {
                return Err(Error::arity_error(&*name, Arity::AtLeast(1), 0));
            };
            let first = A1::from_param(first)?;
            (self)(first, I::from_rest(args.collect())?).map(Into::into)
        })
    }
}
