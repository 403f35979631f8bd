use std::collections::HashSet;
use std::sync::Arc;

use crate::types::{Component, Facts, Path};

use super::PathResolver;

struct Frame {
    node: Facts,
    prefix: Path,
    pattern: Arc<Path>,
    position: usize,
}

/// Lazy expansion of one or more path patterns into the concrete paths that
/// exist in a facts graph.
///
/// Created by [`PathResolver::resolve_pattern`] and
/// [`PathResolver::resolve_patterns`]. Matches come out depth first, children
/// in container order, and a `**` tries "zero more levels" before descending.
/// Each concrete path is yielded once even if several patterns (or several
/// `**` expansions) reach it.
pub struct PatternMatches<'r> {
    resolver: &'r PathResolver,
    stack: Vec<Frame>,
    seen: HashSet<Path>,
}

impl<'r> PatternMatches<'r> {
    pub(crate) fn new(resolver: &'r PathResolver, reference: &Facts, patterns: Vec<Path>) -> Self {
        let stack = patterns
            .into_iter()
            .rev()
            .map(|pattern| Frame {
                node: reference.clone(),
                prefix: Path::root(),
                pattern: Arc::new(pattern),
                position: 0,
            })
            .collect();
        Self {
            resolver,
            stack,
            seen: HashSet::new(),
        }
    }

    fn push_children(&mut self, frame: &Frame, position: usize) {
        let children = self.resolver.children(&frame.node);
        for (name, child) in children.into_iter().rev() {
            self.stack.push(Frame {
                node: child,
                prefix: frame.prefix.child(Component::Named(name)),
                pattern: Arc::clone(&frame.pattern),
                position,
            });
        }
    }
}

impl Iterator for PatternMatches<'_> {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        while let Some(frame) = self.stack.pop() {
            let Some(component) = frame.pattern.components().get(frame.position) else {
                if self.seen.insert(frame.prefix.clone()) {
                    return Some(frame.prefix);
                }
                continue;
            };
            match component {
                Component::Named(name) => {
                    if let Some(child) = self.resolver.step(&frame.node, name) {
                        self.stack.push(Frame {
                            node: child,
                            prefix: frame.prefix.child(component.clone()),
                            pattern: Arc::clone(&frame.pattern),
                            position: frame.position + 1,
                        });
                    }
                }
                Component::AnyInLevel => {
                    self.push_children(&frame, frame.position + 1);
                }
                Component::ManyLevels => {
                    // Deeper levels keep the `**`; pushed first so the
                    // zero-level expansion below is tried before them.
                    self.push_children(&frame, frame.position);
                    self.stack.push(Frame {
                        node: frame.node.clone(),
                        prefix: frame.prefix.clone(),
                        pattern: Arc::clone(&frame.pattern),
                        position: frame.position + 1,
                    });
                }
            }
        }
        None
    }
}
