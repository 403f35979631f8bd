//! Path parsing, resolution and wildcard expansion over [`Facts`] graphs.

mod accessor;
mod error;
mod grammar;
mod pattern;

use std::fmt;
use std::sync::Arc;

use crate::types::{Component, Facts, Path};

pub use accessor::{LevelAccessor, MapAccessor, RecordAccessor, SequenceAccessor};
pub use error::{PathError, SyntaxError};
pub use pattern::PatternMatches;

/// Tokens used to write paths as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSyntax {
    separator: String,
    any_token: String,
    many_token: String,
}

impl Default for PathSyntax {
    fn default() -> Self {
        Self {
            separator: "/".to_owned(),
            any_token: "*".to_owned(),
            many_token: "**".to_owned(),
        }
    }
}

impl PathSyntax {
    /// Create a syntax with the given separator and wildcard tokens.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError`] if the separator or a token is empty, a token
    /// contains the separator, or both tokens are equal.
    pub fn new(
        separator: impl Into<String>,
        any_token: impl Into<String>,
        many_token: impl Into<String>,
    ) -> Result<Self, SyntaxError> {
        let syntax = Self {
            separator: separator.into(),
            any_token: any_token.into(),
            many_token: many_token.into(),
        };
        if syntax.separator.is_empty() {
            return Err(SyntaxError::EmptySeparator);
        }
        for token in [&syntax.any_token, &syntax.many_token] {
            if token.is_empty() {
                return Err(SyntaxError::EmptyToken);
            }
            if token.contains(&syntax.separator) {
                return Err(SyntaxError::TokenContainsSeparator {
                    token: token.clone(),
                    separator: syntax.separator.clone(),
                });
            }
        }
        if syntax.any_token == syntax.many_token {
            return Err(SyntaxError::AmbiguousTokens {
                token: syntax.any_token,
            });
        }
        Ok(syntax)
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    #[must_use]
    pub fn any_token(&self) -> &str {
        &self.any_token
    }

    #[must_use]
    pub fn many_token(&self) -> &str {
        &self.many_token
    }
}

/// Outcome of resolving a concrete path: a present value (possibly
/// [`Facts::Null`]) or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    Found(T),
    NotFound,
}

impl<T> Resolved<T> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Resolved::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Resolved::Found(v) => Some(v),
            Resolved::NotFound => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        match self {
            Resolved::Found(v) => Resolved::Found(f(v)),
            Resolved::NotFound => Resolved::NotFound,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Resolved::Found(v) => v,
            Resolved::NotFound => default,
        }
    }
}

impl<T> From<Option<T>> for Resolved<T> {
    fn from(v: Option<T>) -> Self {
        v.map_or(Resolved::NotFound, Resolved::Found)
    }
}

/// Parses, formats and resolves paths against facts.
///
/// Container access goes through [`LevelAccessor`]s. The default resolver
/// understands lists, maps and records with the `/`, `*`, `**` syntax.
#[derive(Clone)]
pub struct PathResolver {
    syntax: PathSyntax,
    accessors: Vec<Arc<dyn LevelAccessor>>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::new(PathSyntax::default())
    }
}

impl fmt::Debug for PathResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathResolver")
            .field("syntax", &self.syntax)
            .field("accessors", &self.accessors.len())
            .finish()
    }
}

impl PathResolver {
    /// A resolver with the given syntax and the standard accessors.
    #[must_use]
    pub fn new(syntax: PathSyntax) -> Self {
        Self {
            syntax,
            accessors: vec![
                Arc::new(SequenceAccessor),
                Arc::new(MapAccessor),
                Arc::new(RecordAccessor),
            ],
        }
    }

    /// Register an accessor ahead of the existing ones.
    #[must_use]
    pub fn with_accessor(mut self, accessor: impl LevelAccessor + 'static) -> Self {
        self.accessors.insert(0, Arc::new(accessor));
        self
    }

    #[must_use]
    pub fn syntax(&self) -> &PathSyntax {
        &self.syntax
    }

    /// Parse a path string with this resolver's syntax.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if the input cannot be tokenized.
    pub fn parse(&self, input: &str) -> Result<Path, PathError> {
        grammar::parse_path(input, &self.syntax).map_err(PathError::new)
    }

    /// Format a path with this resolver's syntax; the inverse of
    /// [`parse`](Self::parse).
    #[must_use]
    pub fn format(&self, path: &Path) -> String {
        let mut out = String::new();
        for (i, component) in path.components().iter().enumerate() {
            if i > 0 {
                out.push_str(&self.syntax.separator);
            }
            match component {
                Component::Named(name) => out.push_str(name),
                Component::AnyInLevel => out.push_str(&self.syntax.any_token),
                Component::ManyLevels => out.push_str(&self.syntax.many_token),
            }
        }
        out
    }

    /// Resolve a concrete path against `reference`.
    ///
    /// Wildcards, missing keys, out-of-range or malformed indices and steps
    /// through null all yield [`Resolved::NotFound`].
    pub fn resolve(&self, reference: &Facts, path: &Path) -> Resolved<Facts> {
        let mut current = reference.clone();
        for component in path.components() {
            let Component::Named(name) = component else {
                return Resolved::NotFound;
            };
            match self.step(&current, name) {
                Some(next) => current = next,
                None => return Resolved::NotFound,
            }
        }
        Resolved::Found(current)
    }

    /// Lazily expand `pattern` into the concrete paths present in `reference`.
    pub fn resolve_pattern(&self, reference: &Facts, pattern: &Path) -> PatternMatches<'_> {
        PatternMatches::new(self, reference, vec![pattern.clone()])
    }

    /// Lazily expand a group of patterns; the union is yielded without
    /// duplicates, pattern by pattern.
    pub fn resolve_patterns(&self, reference: &Facts, patterns: &[Path]) -> PatternMatches<'_> {
        PatternMatches::new(self, reference, patterns.to_vec())
    }

    pub(crate) fn step(&self, container: &Facts, name: &str) -> Option<Facts> {
        self.accessor_for(container)?.get(container, name)
    }

    pub(crate) fn children(&self, container: &Facts) -> Vec<(String, Facts)> {
        self.accessor_for(container)
            .map(|a| a.children(container))
            .unwrap_or_default()
    }

    fn accessor_for(&self, container: &Facts) -> Option<&Arc<dyn LevelAccessor>> {
        self.accessors.iter().find(|a| a.accepts(container))
    }
}
