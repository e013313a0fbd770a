use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1},
    error::ErrorKind,
    multi::many0,
    sequence::preceded,
};
use tracing::debug;

use crate::ast::{Expr, IntegerType, VECTOR_LITERAL_HEAD};
use crate::{DEFAULT_MAX_PARSE_DEPTH, Error, ParseError, ParseErrorKind};

/// Parser limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Maximum expression depth; an atom nested inside `n` groups is at depth `n`
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: DEFAULT_MAX_PARSE_DEPTH,
        }
    }
}

impl ParseConfig {
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn is_bracket(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']')
}

fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !is_bracket(c)
}

fn closing_for(open: char) -> char {
    if open == '[' { ']' } else { ')' }
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

/// Parse an unsigned integer (maximal run of ASCII digits)
fn parse_integer(input: &str) -> IResult<&str, Expr> {
    let (rest, digits) = digit1.parse(input)?;
    match digits.parse::<IntegerType>() {
        Ok(n) => Ok((rest, Expr::Number(n))),
        // Overflow is fatal: the digits must not be re-read as a symbol
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        ))),
    }
}

/// Parse a symbol: any run of characters other than whitespace and brackets
fn parse_symbol(input: &str) -> IResult<&str, Expr> {
    let (rest, name) = take_while1(is_symbol_char).parse(input)?;
    Ok((rest, Expr::Symbol(name.into())))
}

/// Parse a bracket group and return its elements
fn parse_group<'a>(
    input: &'a str,
    open: char,
    config: &ParseConfig,
    depth: usize,
) -> IResult<&'a str, Vec<Expr>> {
    let (input, _) = char(open).parse(input)?;
    let (input, elements) = many0(|input| parse_expr(input, config, depth + 1)).parse(input)?;
    let (input, _) = preceded(whitespace, char(closing_for(open))).parse(input)?;
    Ok((input, elements))
}

/// Parse a single expression, skipping leading whitespace
fn parse_expr<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> IResult<&'a str, Expr> {
    if depth >= config.max_depth {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        whitespace,
        alt((
            |input| {
                parse_group(input, '(', config, depth)
                    .map(|(rest, elements)| (rest, Expr::Form(elements.into())))
            },
            // [a b] is sugar for (arrayOf a b)
            |input| {
                parse_group(input, '[', config, depth).map(|(rest, elements)| {
                    let form = std::iter::once(Expr::Symbol(VECTOR_LITERAL_HEAD.into()))
                        .chain(elements)
                        .collect();
                    (rest, Expr::Form(form))
                })
            },
            parse_integer,
            parse_symbol,
        )),
    )
    .parse(input)
}

/// Parse as many expressions as possible.
///
/// Returns the expressions and the unconsumed remainder (with leading
/// whitespace removed). Parsing stops silently at the first expression that
/// fails, so callers must treat a non-empty remainder as malformed input;
/// [`parse_program`] does exactly that.
pub fn parse(text: &str) -> (Vec<Expr>, &str) {
    parse_with_config(text, &ParseConfig::default())
}

pub fn parse_with_config<'a>(text: &'a str, config: &ParseConfig) -> (Vec<Expr>, &'a str) {
    let mut exprs = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        match parse_expr(rest, config, 0) {
            Ok((next, expr)) => {
                exprs.push(expr);
                rest = next.trim_start();
            }
            Err(_) => break,
        }
    }
    (exprs, rest)
}

/// Parse a whole program, reporting a [`ParseError`] instead of dropping
/// trailing input
pub fn parse_program(text: &str) -> Result<Vec<Expr>, Error> {
    parse_program_with_config(text, &ParseConfig::default())
}

pub fn parse_program_with_config(text: &str, config: &ParseConfig) -> Result<Vec<Expr>, Error> {
    let (exprs, rest) = parse_with_config(text, config);
    if rest.is_empty() {
        debug!(expressions = exprs.len(), "parsed program");
        Ok(exprs)
    } else {
        Err(diagnose(text, text.len() - rest.len(), config).into())
    }
}

/// Work out why the expression starting at `start` failed to parse.
///
/// Scans the tokens of that one expression, tracking open brackets, and
/// reports the first problem in source order.
fn diagnose(input: &str, start: usize, config: &ParseConfig) -> ParseError {
    use ParseErrorKind::*;

    let error = |kind, message: String, offset| {
        ParseError::with_context(kind, message, input, offset)
    };

    let mut open: Vec<(usize, char)> = Vec::new();
    let mut chars = input[start..]
        .char_indices()
        .map(|(i, c)| (start + i, c))
        .peekable();

    while let Some((offset, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        match c {
            ')' | ']' => match open.pop() {
                None => return error(InvalidSyntax, format!("unexpected '{c}'"), offset),
                Some((_, opened)) if closing_for(opened) != c => {
                    return error(
                        InvalidSyntax,
                        format!("mismatched '{c}', expected '{}'", closing_for(opened)),
                        offset,
                    );
                }
                Some(_) => {}
            },
            _ if open.len() >= config.max_depth => {
                return error(
                    TooDeeplyNested,
                    format!(
                        "expression too deeply nested (max depth: {})",
                        config.max_depth
                    ),
                    offset,
                );
            }
            '(' | '[' => open.push((offset, c)),
            _ if c.is_ascii_digit() => {
                let mut end = offset + 1;
                while let Some((i, _)) = chars.next_if(|(_, next)| next.is_ascii_digit()) {
                    end = i + 1;
                }
                let digits = &input[offset..end];
                if digits.parse::<IntegerType>().is_err() {
                    return error(
                        ImplementationLimit,
                        format!("integer literal {digits} does not fit in 64 bits"),
                        offset,
                    );
                }
            }
            _ => while chars.next_if(|(_, next)| is_symbol_char(*next)).is_some() {},
        }

        if open.is_empty() {
            break;
        }
    }

    match open.last() {
        Some(&(offset, opened)) => error(
            Incomplete,
            format!("unterminated '{opened}' (missing '{}')", closing_for(opened)),
            offset,
        ),
        None => error(InvalidSyntax, "invalid syntax".into(), start),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{form, num, sym};

    /// Test result variants for parse testing
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Vec<Expr>),             // Parsing should succeed with these expressions
        SpecificError(ParseErrorKind),  // Parsing should fail with this kind of error
        Error,                          // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    /// Helper for single-expression success cases
    fn success<T: Into<Expr>>(expr: T) -> ParseTestResult {
        Success(vec![expr.into()])
    }

    fn vector<const N: usize>(elements: [Expr; N]) -> Expr {
        form(std::iter::once(sym(VECTOR_LITERAL_HEAD)).chain(elements))
    }

    /// Run parse tests, checking that every successful parse survives a
    /// display / re-parse round trip
    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{}", i + 1);
            let result = parse_program(input);

            match (result, expected) {
                (Ok(actual), Success(expected_exprs)) => {
                    assert_eq!(actual, *expected_exprs, "{test_id}: parsing '{input}'");

                    let displayed = actual
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(" ");
                    let reparsed = parse_program(&displayed).unwrap_or_else(|e| {
                        panic!("{test_id}: round-trip parse failed for '{displayed}': {e}")
                    });
                    assert_eq!(reparsed, actual, "{test_id}: round-trip mismatch for '{input}'");
                }
                (Err(_), Error) => {}
                (Err(crate::Error::Parse(err)), SpecificError(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: wrong error kind for '{input}': {err}");
                }
                (Err(err), SpecificError(kind)) => {
                    panic!("{test_id}: expected parse error {kind:?}, got {err:?}");
                }
                (Ok(actual), Error | SpecificError(_)) => {
                    panic!("{test_id}: expected error for '{input}', got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success for '{input}', got error {err}");
                }
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        use ParseErrorKind::*;

        let test_cases = vec![
            // ===== ATOMS =====
            ("42", success(42)),
            ("0", success(0)),
            ("007", success(7)),
            ("9223372036854775807", success(i64::MAX)),
            ("print", success(sym("print"))),
            ("::name", success(sym("::name"))),
            ("multiples'", success(sym("multiples'"))),
            ("!=", success(sym("!="))),
            // Booleans are ordinary symbols; the environment binds them
            ("true", success(sym("true"))),
            // No negative literals: a leading '-' makes a symbol
            ("-5", success(sym("-5"))),
            // A digit run ends the number; what follows is a new expression
            ("123abc", Success(vec![num(123), sym("abc")])),
            ("a123", success(sym("a123"))),
            // Symbols may contain any non-bracket, non-space character
            ("\"hello\"", success(sym("\"hello\""))),
            ("a;b", success(sym("a;b"))),
            // ===== FORMS =====
            ("()", success(form(Vec::<Expr>::new()))),
            ("(+ 1 2)", success(form([sym("+"), num(1), num(2)]))),
            ("(+ 1(+ 2 3))", success(form([sym("+"), num(1), form([sym("+"), num(2), num(3)])]))),
            (
                "  (def  a\n\t5 )  ",
                success(form([sym("def"), sym("a"), num(5)])),
            ),
            ("((print a) (print b))", success(form([
                form([sym("print"), sym("a")]),
                form([sym("print"), sym("b")]),
            ]))),
            // ===== VECTOR LITERALS =====
            ("[]", success(vector([]))),
            ("[1 2 3]", success(vector([num(1), num(2), num(3)]))),
            ("([1 2 3] 2)", success(form([vector([num(1), num(2), num(3)]), num(2)]))),
            ("[[1] []]", success(vector([vector([num(1)]), vector([])]))),
            // ===== PROGRAMS =====
            ("", Success(vec![])),
            ("   \n ", Success(vec![])),
            (
                "(def a 5)\n(print a)",
                Success(vec![
                    form([sym("def"), sym("a"), num(5)]),
                    form([sym("print"), sym("a")]),
                ]),
            ),
            ("a b", Success(vec![sym("a"), sym("b")])),
            // ===== ERRORS =====
            ("(print 1", SpecificError(Incomplete)),
            ("[1 2", SpecificError(Incomplete)),
            ("(def a (fn (x) x)", SpecificError(Incomplete)),
            (")", SpecificError(InvalidSyntax)),
            ("(print 1))", SpecificError(InvalidSyntax)),
            ("(print 1]", SpecificError(InvalidSyntax)),
            ("[1 2)", SpecificError(InvalidSyntax)),
            ("99999999999999999999", SpecificError(ImplementationLimit)),
            ("(+ 1 99999999999999999999)", SpecificError(ImplementationLimit)),
            ("(print 1) (oops", Error),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_lenient_parse_reports_remainder() {
        let (exprs, rest) = parse("(print 1)   ");
        assert_eq!(exprs, vec![form([sym("print"), num(1)])]);
        assert_eq!(rest, "");

        // An unterminated group truncates the program silently
        let (exprs, rest) = parse("(def a 5) (print a");
        assert_eq!(exprs, vec![form([sym("def"), sym("a"), num(5)])]);
        assert_eq!(rest, "(print a");

        // Anything after the first failure is left alone
        let (exprs, rest) = parse("a ) b");
        assert_eq!(exprs, vec![sym("a")]);
        assert_eq!(rest, ") b");

        let (exprs, rest) = parse("]");
        assert!(exprs.is_empty());
        assert_eq!(rest, "]");
    }

    #[test]
    fn test_error_details() {
        let err = parse_program("(def a 5)\n(print (+ a 1)").unwrap_err();
        let crate::Error::Parse(err) = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert_eq!(err.kind, ParseErrorKind::Incomplete);
        assert_eq!(err.found.as_deref(), Some("("));
        assert!(err.message.contains("unterminated '('"), "{}", err.message);

        let crate::Error::Parse(err) = parse_program("(a ]").unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(err.found.as_deref(), Some("]"));
        assert_eq!(err.message, "mismatched ']', expected ')'");
    }

    #[test]
    fn test_parser_depth_limits() {
        let config = ParseConfig::default().with_max_depth(8);

        let under_limit = format!("{}x{}", "(".repeat(7), ")".repeat(7));
        assert!(parse_program_with_config(&under_limit, &config).is_ok());

        let at_limit = format!("{}x{}", "[".repeat(8), "]".repeat(8));
        let crate::Error::Parse(err) = parse_program_with_config(&at_limit, &config).unwrap_err()
        else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);

        // The lenient entry point truncates at the offending expression
        let program = format!("ok {at_limit}");
        let (exprs, rest) = parse_with_config(&program, &config);
        assert_eq!(exprs, vec![sym("ok")]);
        assert_eq!(rest, at_limit);

        // Default depth accepts ordinary nesting and rejects pathological input
        let deep = "(".repeat(DEFAULT_MAX_PARSE_DEPTH + 10);
        let crate::Error::Parse(err) = parse_program(&deep).unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
    }
}
