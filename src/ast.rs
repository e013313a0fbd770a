//! The expression tree produced by the parser and consumed by the evaluator.
//!
//! Expressions are immutable, cheaply clonable templates: a form shares its
//! elements through an `Arc`, so function bodies and macro templates can be
//! held by many values at once without copying. Helper constructors [`sym`],
//! [`num`] and [`form`] make it easy to build programs directly from Rust,
//! and `Display` renders an expression back into source text that parses to
//! the same tree.

use std::fmt;
use std::sync::Arc;

/// Type alias for integer literals in source text
pub type IntegerType = i64;

/// Synthetic head symbol that `[...]` brackets expand to
pub const VECTOR_LITERAL_HEAD: &str = "arrayOf";

/// A parsed expression: an atom or an ordered form of sub-expressions
#[derive(Clone, PartialEq)]
pub enum Expr {
    /// Unsigned integer literal (the parser never produces negatives)
    Number(IntegerType),
    /// Boolean literal. Source text spells booleans as the symbols `true` and
    /// `false`, which the global environment binds; this variant exists for
    /// hosts that build trees directly.
    Bool(bool),
    /// Any run of non-whitespace, non-bracket characters
    Symbol(Arc<str>),
    /// A parenthesized (or bracketed, after desugaring) sequence
    Form(Arc<[Expr]>),
}

impl Expr {
    /// Symbol name, if this is a symbol
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// Elements, if this is a form
    pub fn as_form(&self) -> Option<&[Expr]> {
        match self {
            Expr::Form(elements) => Some(elements),
            _ => None,
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "Number({n})"),
            Expr::Bool(b) => write!(f, "Bool({b})"),
            Expr::Symbol(s) => write!(f, "Symbol({s})"),
            Expr::Form(elements) => {
                write!(f, "Form(")?;
                for (i, e) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Form(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Symbol(s.into())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Symbol(s.into())
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Expr {
            fn from(n: $int_type) -> Self {
                Expr::Number(IntegerType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntegerType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Expr>> From<Vec<T>> for Expr {
    fn from(v: Vec<T>) -> Self {
        Expr::Form(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Expr>, const N: usize> From<[T; N]> for Expr {
    fn from(arr: [T; N]) -> Self {
        Expr::Form(arr.into_iter().map(Into::into).collect())
    }
}

/// Build a symbol expression
pub fn sym<S: AsRef<str>>(name: S) -> Expr {
    Expr::Symbol(name.as_ref().into())
}

/// Build an integer literal expression
pub fn num(n: IntegerType) -> Expr {
    Expr::Number(n)
}

/// Build a form from anything convertible to expressions
pub fn form<T: Into<Expr>, I: IntoIterator<Item = T>>(elements: I) -> Expr {
    Expr::Form(elements.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helper_constructors() {
        let test_cases = vec![
            (num(42), Expr::Number(42)),
            (Expr::from(7u8), Expr::Number(7)),
            (sym("print"), Expr::Symbol("print".into())),
            (Expr::from("::name"), Expr::Symbol("::name".into())),
            (Expr::from(true), Expr::Bool(true)),
            (form(Vec::<Expr>::new()), Expr::Form(Arc::from(Vec::new()))),
            (
                form([sym("+"), num(1), num(2)]),
                Expr::Form(Arc::from(vec![
                    Expr::Symbol("+".into()),
                    Expr::Number(1),
                    Expr::Number(2),
                ])),
            ),
            (Expr::from([1, 2]), form([num(1), num(2)])),
        ];

        for (i, (actual, expected)) in test_cases.iter().enumerate() {
            assert_eq!(actual, expected, "helper case #{}", i + 1);
        }
    }

    #[test]
    fn test_display_is_source_text() {
        let program = form([
            sym("defn"),
            sym("add"),
            form([sym("a"), sym("b")]),
            form([sym("+"), sym("a"), sym("b")]),
        ]);
        assert_eq!(program.to_string(), "(defn add (a b) (+ a b))");
        assert_eq!(form(Vec::<Expr>::new()).to_string(), "()");
        assert_eq!(
            form([sym(VECTOR_LITERAL_HEAD), num(1), num(2)]).to_string(),
            "(arrayOf 1 2)"
        );
    }

    #[test]
    fn test_accessors() {
        let e = form([sym("a"), num(1)]);
        assert_eq!(e.as_form().map(<[Expr]>::len), Some(2));
        assert_eq!(e.as_symbol(), None);
        assert_eq!(sym("a").as_symbol(), Some("a"));
    }
}
