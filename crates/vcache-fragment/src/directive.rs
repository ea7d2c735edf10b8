//! Cache directive argument parsing.
//!
//! A directive is a whitespace-separated argument list such as
//! `'movies-personal-rating' "movies" user.id`. Quoted arguments are literal
//! tokens; anything else is an expression resolved against a
//! [`TokenContext`] when the fragment renders.

use thiserror::Error;

use crate::error::{FragmentError, FragmentResult};
use crate::token::{TokenContext, TokenSet};

/// Errors from parsing a directive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// The directive has no arguments.
    #[error("cache directive requires at least one token")]
    Empty,

    /// A quote was opened but never closed.
    #[error("unterminated quote in argument starting at byte {0}")]
    UnterminatedQuote(usize),
}

/// A parsed cache directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    literals: Vec<String>,
    expressions: Vec<String>,
}

impl Directive {
    /// Parse a directive's argument list.
    pub fn parse(args: &str) -> Result<Self, DirectiveError> {
        let mut literals = Vec::new();
        let mut expressions = Vec::new();

        for bit in split_arguments(args)? {
            match unquote(bit) {
                Some(literal) => literals.push(literal.to_string()),
                None => expressions.push(bit.to_string()),
            }
        }

        if literals.is_empty() && expressions.is_empty() {
            return Err(DirectiveError::Empty);
        }

        Ok(Self {
            literals,
            expressions,
        })
    }

    /// Literal tokens, in directive order.
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    /// Unresolved expressions, in directive order.
    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }

    /// Resolve every expression against `context`.
    pub fn resolve<C>(&self, context: &C) -> FragmentResult<TokenSet>
    where
        C: TokenContext + ?Sized,
    {
        let mut set = TokenSet::new();
        for literal in &self.literals {
            set = set.literal(literal.as_str());
        }
        for expression in &self.expressions {
            let value = context
                .resolve(expression)
                .ok_or_else(|| FragmentError::UnresolvedToken(expression.clone()))?;
            set = set.dynamic(value);
        }
        Ok(set)
    }
}

impl std::str::FromStr for Directive {
    type Err = DirectiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Split on whitespace, keeping quoted runs (which may contain spaces) intact.
fn split_arguments(args: &str) -> Result<Vec<&str>, DirectiveError> {
    let mut bits = Vec::new();
    let mut chars = args.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            end = i + c.len_utf8();

            if c == '\'' || c == '"' {
                let quote = c;
                let mut closed = false;
                for (j, d) in chars.by_ref() {
                    end = j + d.len_utf8();
                    if d == quote {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(DirectiveError::UnterminatedQuote(i));
                }
            }
        }

        bits.push(&args[start..end]);
    }

    Ok(bits)
}

fn unquote(bit: &str) -> Option<&str> {
    let first = bit.chars().next()?;
    if bit.len() >= 2 && (first == '\'' || first == '"') && bit.ends_with(first) {
        Some(&bit[1..bit.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MapContext;

    #[test]
    fn test_parse_literals_and_expressions() {
        let directive = Directive::parse("'movies-personal-rating' \"movies\" user.id").unwrap();
        assert_eq!(directive.literals(), &["movies-personal-rating", "movies"]);
        assert_eq!(directive.expressions(), &["user.id"]);
    }

    #[test]
    fn test_literals_are_grouped_before_expressions() {
        let directive = Directive::parse("user.id 'a' page 'b'").unwrap();
        let ctx = MapContext::new().with("user.id", 5).with("page", 2);

        let set = directive.resolve(&ctx).unwrap();
        assert_eq!(set.key("#"), "a#b#5#2");
    }

    #[test]
    fn test_quoted_token_may_contain_spaces() {
        let directive = Directive::parse("'top rated'   \"new releases\"").unwrap();
        assert_eq!(directive.literals(), &["top rated", "new releases"]);
    }

    #[test]
    fn test_empty_quotes_are_an_empty_literal() {
        let directive = Directive::parse("''").unwrap();
        assert_eq!(directive.literals(), &[""]);
    }

    #[test]
    fn test_quoting_edge_cases() {
        let err = Directive::parse("'mixed\"").unwrap_err();
        assert_eq!(err, DirectiveError::UnterminatedQuote(0));

        let directive = Directive::parse("x'y'").unwrap();
        assert!(directive.literals().is_empty());
        assert_eq!(directive.expressions(), &["x'y'"]);
    }

    #[test]
    fn test_empty_directive() {
        assert_eq!(Directive::parse("").unwrap_err(), DirectiveError::Empty);
        assert_eq!(Directive::parse("   \t ").unwrap_err(), DirectiveError::Empty);
    }

    #[test]
    fn test_unterminated_quote() {
        let err = Directive::parse("'movies ok").unwrap_err();
        assert_eq!(err, DirectiveError::UnterminatedQuote(0));

        let err = Directive::parse("ok \"movies").unwrap_err();
        assert_eq!(err, DirectiveError::UnterminatedQuote(3));
    }

    #[test]
    fn test_unresolved_expression() {
        let directive: Directive = "'movies' user.id".parse().unwrap();
        let err = directive.resolve(&MapContext::new()).unwrap_err();
        assert!(matches!(err, FragmentError::UnresolvedToken(expr) if expr == "user.id"));
    }
}
