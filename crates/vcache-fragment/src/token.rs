//! Dependency tokens and render-time resolution.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Separator between tokens in a fragment cache key.
pub const DEFAULT_SEPARATOR: &str = "#";

/// Escape character for separator characters inside a token.
pub const KEY_ESCAPE: char = '\\';

/// The tokens a fragment depends on.
///
/// Literal tokens always precede dynamic ones, in insertion order within
/// each group. The same tokens in the same order always produce the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSet {
    literals: Vec<String>,
    dynamics: Vec<String>,
}

impl TokenSet {
    /// Create an empty token set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from literal tokens and dynamic values.
    pub fn from_parts<L, D>(literals: &[L], dynamics: &[D]) -> Self
    where
        L: AsRef<str>,
        D: Display,
    {
        Self {
            literals: literals.iter().map(|l| l.as_ref().to_string()).collect(),
            dynamics: dynamics.iter().map(ToString::to_string).collect(),
        }
    }

    /// Add a literal dependency tag.
    pub fn literal(mut self, tag: impl Into<String>) -> Self {
        self.literals.push(tag.into());
        self
    }

    /// Add a dynamic value, stringified with `Display`.
    pub fn dynamic(mut self, value: impl Display) -> Self {
        self.dynamics.push(value.to_string());
        self
    }

    /// Literal tokens.
    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    /// Stringified dynamic tokens.
    pub fn dynamics(&self) -> &[String] {
        &self.dynamics
    }

    /// All tokens, literals first.
    pub fn tokens(&self) -> Vec<String> {
        self.literals
            .iter()
            .chain(self.dynamics.iter())
            .cloned()
            .collect()
    }

    /// The cache key: all tokens joined by `separator`.
    ///
    /// Inside a token, [`KEY_ESCAPE`] and every character of `separator` are
    /// prefixed with [`KEY_ESCAPE`], so `["a#b"]` and `["a", "b"]` get
    /// different keys. Tokens without such characters appear verbatim.
    pub fn key(&self, separator: &str) -> String {
        self.literals
            .iter()
            .chain(self.dynamics.iter())
            .map(|token| escape_token(token, separator))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Whether there are no tokens.
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.dynamics.is_empty()
    }
}

fn escape_token<'a>(token: &'a str, separator: &str) -> Cow<'a, str> {
    let needs_escape = |c: char| c == KEY_ESCAPE || separator.contains(c);
    if !token.contains(needs_escape) {
        return Cow::Borrowed(token);
    }

    let mut escaped = String::with_capacity(token.len() + 2);
    for c in token.chars() {
        if needs_escape(c) {
            escaped.push(KEY_ESCAPE);
        }
        escaped.push(c);
    }
    Cow::Owned(escaped)
}

/// Resolves directive expressions (e.g. `user.id`) to their string form.
pub trait TokenContext {
    /// Resolve an expression, or `None` if the context has no value for it.
    fn resolve(&self, expression: &str) -> Option<String>;
}

impl<F> TokenContext for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, expression: &str) -> Option<String> {
        self(expression)
    }
}

/// A flat map from expression text to value.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    values: HashMap<String, String>,
}

impl MapContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an expression to a value.
    pub fn with(mut self, expression: impl Into<String>, value: impl Display) -> Self {
        self.insert(expression, value);
        self
    }

    /// Bind an expression to a value in place.
    pub fn insert(&mut self, expression: impl Into<String>, value: impl Display) {
        self.values.insert(expression.into(), value.to_string());
    }
}

impl TokenContext for MapContext {
    fn resolve(&self, expression: &str) -> Option<String> {
        self.values.get(expression).cloned()
    }
}
