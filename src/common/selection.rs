use crate::common::expression::Placeholders;

use indexmap::IndexMap;
use std::hash;

/// Map for selecting attributes in projection expressions.
///
/// ```rust
/// use dynamodb_mapper::common::selection;
///
/// let selection = selection::SelectionMap::Leaves(vec![
///     "id".to_string(),
///     "name".to_string(),
/// ]);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SelectionMap {
    /// Leaf selection - a flat list of attribute names to select.
    Leaves(Vec<String>),
    /// Node selection - nested selection for hierarchical attribute paths.
    Node(IndexMap<String, SelectionMap>),
}

impl hash::Hash for SelectionMap {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        match self {
            Self::Leaves(leaves) => leaves.hash(state),
            Self::Node(map) => map.iter().for_each(|(key, value)| {
                key.hash(state);
                value.hash(state);
            }),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionMap {
    fn from_iter<I: IntoIterator<Item = S>>(attributes: I) -> Self {
        Self::Leaves(attributes.into_iter().map(Into::into).collect())
    }
}

impl SelectionMap {
    /// Compile into a projection expression, registering names in `placeholders`.
    pub(crate) fn compile(&self, placeholders: &mut Placeholders) -> String {
        self.compile_recursive(&[], placeholders).join(", ")
    }

    fn compile_recursive(&self, keys: &[String], placeholders: &mut Placeholders) -> Vec<String> {
        match self {
            Self::Leaves(leaves) => leaves
                .iter()
                .map(|leaf| {
                    let mut path = keys.to_vec();
                    path.push(leaf.clone());
                    placeholders.path(&path)
                })
                .collect(),
            Self::Node(map) => map
                .iter()
                .flat_map(|(key, value)| {
                    let mut path = keys.to_vec();
                    path.push(key.clone());
                    value.compile_recursive(&path, placeholders)
                })
                .collect(),
        }
    }
}
