use std::fmt;

/// One level of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub enum Component {
    /// A literal key, index or field name. May be empty.
    Named(String),
    /// Matches exactly one level.
    AnyInLevel,
    /// Matches zero or more levels.
    ManyLevels,
}

impl Component {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Component::Named(name.into())
    }

    /// Whether this component addresses a single concrete level.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        matches!(self, Component::Named(_))
    }

    /// The literal name, if this is a [`Component::Named`].
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Component::Named(name) => Some(name),
            _ => None,
        }
    }

    /// The name interpreted as a sequence index. Only plain ASCII digits
    /// qualify; signed or non-numeric names yield `None`.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.name().and_then(parse_index)
    }
}

/// Parses a sequence index from a path name. `usize::from_str` alone would
/// also accept a leading `+`.
pub(crate) fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// An immutable address into a facts graph.
///
/// Paths containing [`Component::AnyInLevel`] or [`Component::ManyLevels`] are
/// patterns; they can be expanded with
/// [`PathResolver::resolve_pattern`](crate::PathResolver::resolve_pattern) but
/// never resolved directly.
///
/// `Display` uses the default syntax (`/`, `*`, `**`). Use
/// [`PathResolver::format`](crate::PathResolver::format) for a configured one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Path {
    components: Vec<Component>,
}

impl Path {
    /// The empty path, addressing the reference itself.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Build a concrete path from literal names.
    #[must_use]
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: names.into_iter().map(|n| Component::Named(n.into())).collect(),
        }
    }

    #[must_use]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True when no component is a wildcard.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.components.iter().all(Component::is_concrete)
    }

    /// A new path with `component` appended.
    #[must_use]
    pub fn child(&self, component: Component) -> Path {
        let mut components = Vec::with_capacity(self.components.len() + 1);
        components.extend_from_slice(&self.components);
        components.push(component);
        Path { components }
    }

    /// A new path with every component of `other` appended.
    #[must_use]
    pub fn join(&self, other: &Path) -> Path {
        let mut components = self.components.clone();
        components.extend_from_slice(&other.components);
        Path { components }
    }

    /// The path without its last component, or `None` for the empty path.
    #[must_use]
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.components.split_last()?;
        Some(Path {
            components: init.to_vec(),
        })
    }

    #[must_use]
    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }
}

impl From<Vec<Component>> for Path {
    fn from(components: Vec<Component>) -> Self {
        Self { components }
    }
}

impl FromIterator<Component> for Path {
    fn from_iter<I: IntoIterator<Item = Component>>(iter: I) -> Self {
        Self {
            components: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Named(name) => write!(f, "{name}"),
            Component::AnyInLevel => write!(f, "*"),
            Component::ManyLevels => write!(f, "**"),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}
