//! Property-based tests for the parser.
//!
//! Any expression tree the parser can produce must display as source text
//! that parses back to the same tree, and the lenient and strict entry
//! points must agree on well-formed input.

use proptest::prelude::*;
use threadlisp::ast::{Expr, form, num, sym};
use threadlisp::{parse, parse_program};

/// Symbols the parser can produce: no whitespace or brackets, and not
/// starting with a digit (that would re-parse as a number)
fn arb_symbol() -> impl Strategy<Value = Expr> {
    prop_oneof![
        "[a-z!<>=+*/^:'-][a-z0-9!<>=+*/^:'-]{0,8}".prop_map(sym),
        Just(sym("arrayOf")),
        Just(sym("::name")),
    ]
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![(0i64..=i64::MAX).prop_map(num), arb_symbol()];
    leaf.prop_recursive(6, 64, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(form)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn display_reparses_to_same_tree(exprs in prop::collection::vec(arb_expr(), 0..4)) {
        let source = exprs.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
        let reparsed = parse_program(&source);
        prop_assert_eq!(reparsed, Ok(exprs));
    }

    #[test]
    fn lenient_parse_agrees_on_well_formed_input(expr in arb_expr()) {
        let source = format!("  {expr}  ");
        let (exprs, rest) = parse(&source);
        prop_assert_eq!(rest, "");
        prop_assert_eq!(exprs, vec![expr]);
    }

    #[test]
    fn truncated_input_never_panics(expr in arb_expr(), cut in 0usize..64) {
        let source = expr.to_string();
        let cut = cut.min(source.len());
        if source.is_char_boundary(cut) {
            let (_, rest) = parse(&source[..cut]);
            prop_assert!(source[..cut].ends_with(rest));
            let _ = parse_program(&source[..cut]);
        }
    }
}
