//! Macro text parser.
//!
//! Converts macro text into an [`Expression`] tree. Parsing is purely
//! syntactic: call targets are resolved when the nodes are built, but
//! unknown names are not an error here (they may be defined later with
//! `@Defun`).

use std::rc::Rc;

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::ast::Expression;
use crate::diagnostics::ParseError;

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct MacroGrammar;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses one macro.
pub fn parse(text: &str) -> Result<Rc<Expression>, ParseError> {
    let mut pairs =
        MacroGrammar::parse(Rule::macro_text, text).map_err(|e| convert_parse_error(e, text))?;
    let root = pairs
        .next()
        .and_then(|program| program.into_inner().next())
        .ok_or_else(|| ParseError::new("empty macro", text, (0, 0).into()))?;
    build_expression(root, text).map(Rc::new)
}

// ============================================================================
// TREE BUILDERS
// ============================================================================

fn build_expression(pair: Pair<'_, Rule>, source: &str) -> Result<Expression, ParseError> {
    match pair.as_rule() {
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .and_then(|head| head.into_inner().next())
                .ok_or_else(|| make_error("missing function name", source, 0, 0))?
                .as_str()
                .to_string();
            let args = inner
                .map(|arg| build_expression(arg, source).map(Rc::new))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expression::call(name, args))
        }

        Rule::field => Ok(Expression::field(inner_text(pair))),

        Rule::variable => Ok(Expression::variable(inner_text(pair))),

        Rule::string => Ok(Expression::string(unescape_string(&inner_text(pair)))),

        Rule::number => {
            let span = pair.as_span();
            pair.as_str().parse::<u32>().map(Expression::number).map_err(|_| {
                make_error(
                    "number does not fit in 32 bits",
                    source,
                    span.start(),
                    span.end(),
                )
            })
        }

        Rule::regex => {
            let span = pair.as_span();
            let mut inner = pair.into_inner();
            let body = inner.next().map(|p| p.as_str()).unwrap_or_default();
            let flags = inner.next().map(|p| p.as_str()).unwrap_or_default();
            Expression::regex(unescape_regex(body), flags).map_err(|e| {
                make_error(
                    format!("invalid regular expression: {e}"),
                    source,
                    span.start(),
                    span.end(),
                )
            })
        }

        rule => {
            let span = pair.as_span();
            Err(make_error(
                format!("unexpected {rule:?}"),
                source,
                span.start(),
                span.end(),
            ))
        }
    }
}

fn inner_text(pair: Pair<'_, Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|inner| inner.as_str().to_string())
        .unwrap_or_default()
}

// ============================================================================
// ESCAPES
// ============================================================================

/// Resolves string escapes. Unknown escapes are kept verbatim, so
/// `'\d+'` stays a usable regex pattern.
fn unescape_string(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(quoted @ ('\\' | '\'' | '"')) => result.push(quoted),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// `\/` becomes `/`; every other escape belongs to the regex itself.
fn unescape_regex(body: &str) -> String {
    let mut pattern = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            pattern.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => pattern.push('/'),
            Some(other) => {
                pattern.push('\\');
                pattern.push(other);
            }
            None => pattern.push('\\'),
        }
    }
    pattern
}

// ============================================================================
// ERRORS
// ============================================================================

fn make_error(message: impl Into<String>, source: &str, start: usize, end: usize) -> ParseError {
    ParseError::new(message, source, (start, end.saturating_sub(start)).into())
}

fn convert_parse_error(error: Error<Rule>, source: &str) -> ParseError {
    let (start, end) = match error.location {
        pest::error::InputLocation::Pos(pos) => (pos, pos),
        pest::error::InputLocation::Span((start, end)) => (start, end),
    };
    let message = if source.trim().is_empty() {
        "empty macro".to_string()
    } else if has_unterminated_string(source) {
        "unterminated string".to_string()
    } else {
        format!("syntax error: {}", error.variant.message())
    };
    make_error(message, source, start, end)
}

/// Whether a string literal in `source` is still open at the end.
fn has_unterminated_string(source: &str) -> bool {
    let mut open: Option<char> = None;
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        match (open, c) {
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(quote), c) if c == quote => open = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '/') => open = Some(c),
            (None, '#') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
            }
            (None, _) => {}
        }
    }
    matches!(open, Some('\'' | '"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_call() {
        let tree = parse("@Add(1, 2)").unwrap();
        assert_eq!(tree.to_text(), "@Add(1, 2)");
    }

    #[test]
    fn test_whitespace_and_comments() {
        let tree = parse("@If( %Subject ,  # the subject\n 'yes' , \"no\" )").unwrap();
        assert_eq!(tree.to_text(), "@If(%Subject, 'yes', 'no')");
    }

    #[test]
    fn test_string_escapes() {
        let tree = parse(r#"'a\'b\n\d'"#).unwrap();
        assert_eq!(tree.to_text(), r"'a\'b\n\\d'");
    }

    #[test]
    fn test_regex_literal() {
        let tree = parse(r"/a\/b\d+/im").unwrap();
        assert_eq!(tree.to_text(), r"/a\/b\d+/im");
    }

    #[test]
    fn test_number_overflow() {
        let error = parse("4294967296").unwrap_err();
        assert!(error.message.contains("32 bits"));
        assert!(parse("4294967295").is_ok());
    }

    #[test]
    fn test_errors_have_offsets() {
        let error = parse("@Add(1, 2").unwrap_err();
        assert!((8..=9).contains(&error.offset()));
        let error = parse("@Add('x").unwrap_err();
        assert_eq!(error.message, "unterminated string");
        assert!(parse("").is_err());
        assert!(parse("@Add(1) trailing").is_err());
        assert!(parse("/(unclosed/").is_err());
    }
}
