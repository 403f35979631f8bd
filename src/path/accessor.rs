use std::fmt;

use crate::types::{parse_index, Facts};

/// Steps one level into a kind of container.
///
/// A [`PathResolver`](super::PathResolver) asks its accessors in order and
/// uses the first one that accepts the container.
pub trait LevelAccessor: fmt::Debug + Send + Sync {
    fn accepts(&self, container: &Facts) -> bool;

    /// The child stored under `name`, if any.
    fn get(&self, container: &Facts, name: &str) -> Option<Facts>;

    /// Every child with its level name, in a stable order.
    fn children(&self, container: &Facts) -> Vec<(String, Facts)>;
}

/// Indexes into [`Facts::List`] by decimal position.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceAccessor;

impl LevelAccessor for SequenceAccessor {
    fn accepts(&self, container: &Facts) -> bool {
        matches!(container, Facts::List(_))
    }

    fn get(&self, container: &Facts, name: &str) -> Option<Facts> {
        let index = parse_index(name)?;
        container.as_list()?.get(index).cloned()
    }

    fn children(&self, container: &Facts) -> Vec<(String, Facts)> {
        container
            .as_list()
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), item.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Looks up keys in [`Facts::Map`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MapAccessor;

impl LevelAccessor for MapAccessor {
    fn accepts(&self, container: &Facts) -> bool {
        matches!(container, Facts::Map(_))
    }

    fn get(&self, container: &Facts, name: &str) -> Option<Facts> {
        container.as_map()?.get(name).cloned()
    }

    fn children(&self, container: &Facts) -> Vec<(String, Facts)> {
        container
            .as_map()
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Reads fields of host objects wrapped in [`Facts::Record`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordAccessor;

impl LevelAccessor for RecordAccessor {
    fn accepts(&self, container: &Facts) -> bool {
        matches!(container, Facts::Record(_))
    }

    fn get(&self, container: &Facts, name: &str) -> Option<Facts> {
        match container {
            Facts::Record(record) => record.field(name),
            _ => None,
        }
    }

    fn children(&self, container: &Facts) -> Vec<(String, Facts)> {
        match container {
            Facts::Record(record) => record
                .field_names()
                .into_iter()
                .filter_map(|name| record.field(&name).map(|value| (name, value)))
                .collect(),
            _ => Vec::new(),
        }
    }
}
