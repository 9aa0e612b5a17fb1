use crate::{
    common,
    error::{Error, Result},
};

use aws_sdk_dynamodb::types;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections;

/// Separator for attribute path components.
pub(crate) const PATH_SEPARATOR: &str = ".";

fn sanitize(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() || character == '_' {
                character
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// Placeholder maps for a single request.
///
/// Every key condition, filter, projection and update fragment of one request
/// draws its placeholders from the same instance, so identifiers never collide
/// and an attribute referenced twice reuses its name placeholder.
///
/// ```rust
/// use dynamodb_mapper::common::expression::Placeholders;
///
/// let mut placeholders = Placeholders::default();
/// assert_eq!(placeholders.name("first-name"), "#first_name");
/// assert_eq!(placeholders.name("first_name"), "#first_name_0");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Placeholders {
    counter: usize,
    names: collections::HashMap<String, String>,
    placeholders: collections::HashMap<String, String>,
    values: collections::HashMap<String, types::AttributeValue>,
}

impl Placeholders {
    /// Placeholder for an attribute name, allocating one on first use.
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.placeholders.get(attribute) {
            return placeholder.clone();
        }
        let base = format!("#{}", sanitize(attribute));
        let mut placeholder = base.clone();
        while self.names.contains_key(&placeholder) {
            placeholder = format!("{base}_{}", self.counter);
            self.counter += 1;
        }
        self.names.insert(placeholder.clone(), attribute.to_string());
        self.placeholders
            .insert(attribute.to_string(), placeholder.clone());
        placeholder
    }

    /// Dotted placeholder path for a nested attribute.
    pub fn path(&mut self, path: &[String]) -> String {
        path.iter()
            .map(|component| self.name(component))
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    /// Allocate a value placeholder tagged with the attribute and operator it serves.
    pub fn value(&mut self, attribute: &str, operator: &str, value: types::AttributeValue) -> String {
        let base = format!(":{}_{operator}", sanitize(attribute));
        let mut placeholder = format!("{base}{}", self.counter);
        self.counter += 1;
        while self.values.contains_key(&placeholder) {
            placeholder = format!("{base}{}", self.counter);
            self.counter += 1;
        }
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// Serialize a value and allocate a placeholder for it.
    pub fn serialize<T: Serialize>(
        &mut self,
        attribute: &str,
        operator: &str,
        value: T,
    ) -> Result<String> {
        let value = to_attribute_value(value)?;
        Ok(self.value(attribute, operator, value))
    }

    /// Register caller-supplied name placeholders verbatim.
    ///
    /// A placeholder already bound to a different attribute is rejected.
    pub fn extend_names(&mut self, names: collections::HashMap<String, String>) -> Result<()> {
        for (placeholder, attribute) in names {
            if let Some(bound) = self.names.get(&placeholder).filter(|bound| **bound != attribute) {
                return Err(Error::validation(format!(
                    "placeholder `{placeholder}` already refers to `{bound}`, not `{attribute}`"
                )));
            }
            self.placeholders
                .entry(attribute.clone())
                .or_insert_with(|| placeholder.clone());
            self.names.insert(placeholder, attribute);
        }
        Ok(())
    }

    /// Register caller-supplied value placeholders verbatim.
    ///
    /// A placeholder already bound to a different value is rejected.
    pub fn extend_values(&mut self, values: common::Attributes) -> Result<()> {
        for (placeholder, value) in values {
            let value = to_attribute_value(value)?;
            if self
                .values
                .get(&placeholder)
                .is_some_and(|bound| *bound != value)
            {
                return Err(Error::validation(format!(
                    "placeholder `{placeholder}` is already bound to another value"
                )));
            }
            self.values.insert(placeholder, value);
        }
        Ok(())
    }

    /// Whether no placeholder was allocated.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// Split into the request's name and value maps, omitting empty ones.
    #[allow(clippy::type_complexity)]
    pub fn into_maps(
        self,
    ) -> (
        Option<collections::HashMap<String, String>>,
        Option<collections::HashMap<String, types::AttributeValue>>,
    ) {
        let names = (!self.names.is_empty()).then_some(self.names);
        let values = (!self.values.is_empty()).then_some(self.values);
        (names, values)
    }
}

/// Join expression fragments with a logical operator, parenthesizing compound parts.
pub(crate) fn join(operator: &str, expressions: Vec<String>) -> Option<String> {
    let expressions: Vec<_> = expressions
        .into_iter()
        .filter(|expression| !expression.is_empty())
        .collect();
    match expressions.len() {
        0 => None,
        1 => expressions.into_iter().next(),
        _ => Some(
            expressions
                .into_iter()
                .map(|expression| {
                    if expression.contains(" AND ") || expression.contains(" OR ") {
                        format!("({expression})")
                    } else {
                        expression
                    }
                })
                .collect::<Vec<_>>()
                .join(operator),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::plain("name", "name")]
    #[case::dash("first-name", "first_name")]
    #[case::dot("a.b", "a_b")]
    #[case::empty("", "_")]
    fn test_sanitize(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(sanitize(name), expected);
    }

    #[test]
    fn test_name_reuse_and_collision() {
        let mut placeholders = Placeholders::default();
        assert_eq!(placeholders.name("a-b"), "#a_b");
        assert_eq!(placeholders.name("a-b"), "#a_b");
        assert_eq!(placeholders.name("a_b"), "#a_b_0");
        assert_eq!(placeholders.name("a.b"), "#a_b_1");
        let (names, values) = placeholders.into_maps();
        assert_eq!(
            names,
            Some(collections::HashMap::from([
                ("#a_b".to_string(), "a-b".to_string()),
                ("#a_b_0".to_string(), "a_b".to_string()),
                ("#a_b_1".to_string(), "a.b".to_string()),
            ]))
        );
        assert_eq!(values, None);
    }

    #[test]
    fn test_values_use_shared_counter() {
        let mut placeholders = Placeholders::default();
        let first = placeholders.value("age", "eq", types::AttributeValue::N("1".to_string()));
        let second = placeholders.value("age", "eq", types::AttributeValue::N("2".to_string()));
        assert_eq!(first, ":age_eq0");
        assert_eq!(second, ":age_eq1");
        let (_, values) = placeholders.into_maps();
        assert_eq!(values.unwrap().len(), 2);
    }

    #[test]
    fn test_path() {
        let mut placeholders = Placeholders::default();
        let path = placeholders.path(&["a".to_string(), "b-c".to_string()]);
        assert_eq!(path, "#a.#b_c");
    }

    #[rstest]
    #[case::same_attribute("#a", "a", true)]
    #[case::unused_placeholder("#raw", "raw", true)]
    #[case::other_attribute("#a", "b", false)]
    fn test_extend_names(#[case] placeholder: &str, #[case] attribute: &str, #[case] accepted: bool) {
        let mut placeholders = Placeholders::default();
        placeholders.name("a");
        let result = placeholders.extend_names(collections::HashMap::from([(
            placeholder.to_string(),
            attribute.to_string(),
        )]));
        assert_eq!(result.is_ok(), accepted);
        assert_eq!(placeholders.names.get("#a").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_extend_values_rejects_rebinding() {
        let mut placeholders = Placeholders::default();
        let placeholder = placeholders.value("age", "eq", types::AttributeValue::N("1".to_string()));
        let same = common::Attributes::from_iter([(placeholder.clone(), serde_json::json!(1))]);
        assert!(placeholders.extend_values(same).is_ok());
        let other = common::Attributes::from_iter([(placeholder, serde_json::json!(2))]);
        assert!(matches!(
            placeholders.extend_values(other),
            Err(Error::Validation(_))
        ));
    }

    #[rstest]
    #[case::empty(vec![], None)]
    #[case::single(vec!["#a = :a0".to_string()], Some("#a = :a0"))]
    #[case::skips_blank(vec!["".to_string(), "#a = :a0".to_string()], Some("#a = :a0"))]
    #[case::wraps_compound(
        vec!["#a = :a0 OR #b = :b1".to_string(), "#c = :c2".to_string()],
        Some("(#a = :a0 OR #b = :b1) AND #c = :c2")
    )]
    fn test_join(#[case] expressions: Vec<String>, #[case] expected: Option<&str>) {
        assert_eq!(join(" AND ", expressions).as_deref(), expected);
    }
}
