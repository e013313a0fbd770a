//! Unhygienic textual macros.
//!
//! A macro is a parameter list and a body template. Expansion replaces every
//! occurrence of a parameter symbol in the template (at any depth) with the
//! unevaluated argument expression from the call site. Nothing is renamed,
//! so free identifiers in the template resolve wherever the expansion is
//! evaluated.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::Error;
use crate::ast::Expr;
use crate::builtinops::Arity;

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    params: Arc<[Arc<str>]>,
    body: Expr,
}

impl Macro {
    pub fn new(params: Arc<[Arc<str>]>, body: Expr) -> Self {
        Macro { params, body }
    }

    /// Parameter symbols in declaration order, `::` prefix included
    pub fn params(&self) -> &[Arc<str>] {
        &self.params
    }

    /// The unexpanded template
    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Substitute `args` into the body template. `name` is only used for
    /// error messages and tracing.
    pub fn expand(&self, name: &str, args: &[Expr]) -> Result<Expr, Error> {
        if args.len() != self.params.len() {
            return Err(Error::arity_error(
                format!("macro {name}"),
                Arity::Exact(self.params.len()),
                args.len(),
            ));
        }

        let bindings: HashMap<&str, &Expr> = self
            .params
            .iter()
            .map(|param| &**param)
            .zip(args)
            .collect();
        let expansion = substitute(&self.body, &bindings);
        trace!(name, %expansion, "expanded macro");
        Ok(expansion)
    }
}

fn substitute(template: &Expr, bindings: &HashMap<&str, &Expr>) -> Expr {
    match template {
        Expr::Symbol(name) => bindings
            .get(&**name)
            .map_or_else(|| template.clone(), |arg| (*arg).clone()),
        Expr::Form(elements) => Expr::Form(
            elements
                .iter()
                .map(|element| substitute(element, bindings))
                .collect(),
        ),
        Expr::Number(_) | Expr::Bool(_) => template.clone(),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{form, num, sym};

    fn params(names: &[&str]) -> Arc<[Arc<str>]> {
        names.iter().map(|name| Arc::from(*name)).collect()
    }

    #[test]
    fn test_expand_substitutes_at_any_depth() {
        let defn = Macro::new(
            params(&["::name", "::args", "::body"]),
            form([
                sym("def"),
                sym("::name"),
                form([sym("fn"), sym("::args"), sym("::body")]),
            ]),
        );

        let args = [
            sym("print2"),
            form([sym("a"), sym("b")]),
            form([
                form([sym("print"), sym("a")]),
                form([sym("print"), sym("b")]),
            ]),
        ];

        let expansion = defn.expand("defn", &args).unwrap();
        assert_eq!(
            expansion.to_string(),
            "(def print2 (fn (a b) ((print a) (print b))))"
        );
    }

    #[test]
    fn test_arguments_are_not_evaluated_or_renamed() {
        // (macro or (::x ::y) (if ::x ::x ::y)) duplicates its first argument
        let or = Macro::new(
            params(&["::x", "::y"]),
            form([sym("if"), sym("::x"), sym("::x"), sym("::y")]),
        );
        let side_effect = form([sym("print"), num(1)]);
        let expansion = or.expand("or", &[side_effect.clone(), num(2)]).unwrap();
        assert_eq!(
            expansion,
            form([sym("if"), side_effect.clone(), side_effect, num(2)])
        );

        // A template identifier that happens to match call-site names is left alone
        let swap = Macro::new(params(&["::a"]), form([sym("+"), sym("::a"), sym("x")]));
        let expansion = swap.expand("swap", &[sym("x")]).unwrap();
        assert_eq!(expansion.to_string(), "(+ x x)");
    }

    #[test]
    fn test_argument_count_is_checked() {
        let m = Macro::new(params(&["::x"]), sym("::x"));
        assert_eq!(m.expand("id", &[num(1)]).unwrap(), num(1));
        // Expansion leaves the definition itself untouched
        assert_eq!(m.params(), &[Arc::<str>::from("::x")]);
        assert_eq!(m.body(), &sym("::x"));

        let err = m.expand("id", &[]).unwrap_err();
        assert_eq!(err, Error::arity_error("macro id", Arity::Exact(1), 0));
        assert!(m.expand("id", &[num(1), num(2)]).is_err());
    }
}
