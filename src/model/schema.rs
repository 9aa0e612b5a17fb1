use crate::{
    common::{self, AttributeMap},
    error::{Error, Result},
};

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::{collections, fmt};

/// Whether a candidate item must be complete.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValidationMode {
    /// Creating or replacing an item: required attributes and defaults apply.
    Full,
    /// Updating an item: only the supplied attributes are checked, `null` removes.
    Partial,
}

/// Schema validation collaborator.
///
/// Receives the candidate item and returns the normalized item to persist.
pub trait Validator: fmt::Debug + Send + Sync {
    /// Validate and normalize a candidate item.
    fn validate(&self, item: common::Attributes, mode: ValidationMode) -> Result<common::Attributes>;

    /// Adjust the wire representation of an item, e.g. to emit set types.
    fn encode(&self, _item: &mut AttributeMap) {}
}

/// Declared type of an attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeType {
    /// Any JSON value.
    Any,
    /// `true` or `false`.
    Boolean,
    /// RFC 3339 timestamp string.
    Date,
    /// Any JSON array.
    List,
    /// JSON object validated against a nested schema.
    Map(Schema),
    /// JSON number.
    Number,
    /// Non-empty array of unique numbers, stored as a number set.
    NumberSet,
    /// JSON string.
    String,
    /// Non-empty array of unique strings, stored as a string set.
    StringSet,
    /// Hyphenated UUID string.
    Uuid,
}

/// Value used when a full-mode candidate omits an attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum DefaultValue {
    /// Fixed value.
    Value(Value),
    /// Freshly generated v4 UUID.
    Uuid,
    /// Current time as an RFC 3339 string.
    Now,
}

impl DefaultValue {
    fn generate(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            Self::Now => Value::String(now()),
        }
    }
}

pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Declaration of one schema attribute.
///
/// ```rust
/// use dynamodb_mapper::model::schema::Attribute;
///
/// let email = Attribute::string().required();
/// let id = Attribute::uuid().default_uuid();
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    /// Declared type.
    pub kind: AttributeType,
    /// Whether full-mode validation rejects a missing value.
    pub required: bool,
    /// Value generated for a missing attribute in full mode.
    pub default: Option<DefaultValue>,
}

impl Attribute {
    /// Attribute of the given type, optional and without default.
    pub fn new(kind: AttributeType) -> Self {
        Self {
            kind,
            required: false,
            default: None,
        }
    }

    /// Any JSON value.
    pub fn any() -> Self {
        Self::new(AttributeType::Any)
    }

    /// Boolean attribute.
    pub fn boolean() -> Self {
        Self::new(AttributeType::Boolean)
    }

    /// RFC 3339 timestamp attribute.
    pub fn date() -> Self {
        Self::new(AttributeType::Date)
    }

    /// List attribute.
    pub fn list() -> Self {
        Self::new(AttributeType::List)
    }

    /// Nested map attribute.
    pub fn map(schema: Schema) -> Self {
        Self::new(AttributeType::Map(schema))
    }

    /// Number attribute.
    pub fn number() -> Self {
        Self::new(AttributeType::Number)
    }

    /// Number set attribute.
    pub fn number_set() -> Self {
        Self::new(AttributeType::NumberSet)
    }

    /// String attribute.
    pub fn string() -> Self {
        Self::new(AttributeType::String)
    }

    /// String set attribute.
    pub fn string_set() -> Self {
        Self::new(AttributeType::StringSet)
    }

    /// UUID attribute.
    pub fn uuid() -> Self {
        Self::new(AttributeType::Uuid)
    }

    /// Mark the attribute as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Use a fixed default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Generate a v4 UUID when missing.
    pub fn default_uuid(mut self) -> Self {
        self.default = Some(DefaultValue::Uuid);
        self
    }

    /// Use the current time when missing.
    pub fn default_now(mut self) -> Self {
        self.default = Some(DefaultValue::Now);
        self
    }

    fn check(&self, path: &str, value: Value, mode: ValidationMode) -> Result<Value> {
        let mismatch = |expected: &str| {
            Error::validation(format!("`{path}` must be {expected}"))
        };
        let value = match (&self.kind, value) {
            (AttributeType::Any, value) => value,
            (AttributeType::Boolean, value @ Value::Bool(_)) => value,
            (AttributeType::Boolean, _) => return Err(mismatch("a boolean")),
            (AttributeType::Date, Value::String(date)) => {
                DateTime::parse_from_rfc3339(&date)
                    .map_err(|_| mismatch("an RFC 3339 timestamp"))?;
                Value::String(date)
            }
            (AttributeType::Date, _) => return Err(mismatch("an RFC 3339 timestamp")),
            (AttributeType::List, value @ Value::Array(_)) => value,
            (AttributeType::List, _) => return Err(mismatch("a list")),
            (AttributeType::Map(schema), Value::Object(object)) => {
                Value::Object(schema.validate_at(path, object, mode)?)
            }
            (AttributeType::Map(_), _) => return Err(mismatch("a map")),
            (AttributeType::Number, value @ Value::Number(_)) => value,
            (AttributeType::Number, _) => return Err(mismatch("a number")),
            (AttributeType::NumberSet, Value::Array(values)) => {
                if !values.iter().all(Value::is_number) {
                    return Err(mismatch("a set of numbers"));
                }
                Value::Array(unique(path, values)?)
            }
            (AttributeType::NumberSet, _) => return Err(mismatch("a set of numbers")),
            (AttributeType::String, value @ Value::String(_)) => value,
            (AttributeType::String, _) => return Err(mismatch("a string")),
            (AttributeType::StringSet, Value::Array(values)) => {
                if !values.iter().all(Value::is_string) {
                    return Err(mismatch("a set of strings"));
                }
                Value::Array(unique(path, values)?)
            }
            (AttributeType::StringSet, _) => return Err(mismatch("a set of strings")),
            (AttributeType::Uuid, Value::String(id)) => {
                uuid::Uuid::parse_str(&id).map_err(|_| mismatch("a UUID"))?;
                Value::String(id)
            }
            (AttributeType::Uuid, _) => return Err(mismatch("a UUID")),
        };
        Ok(value)
    }
}

fn unique(path: &str, values: Vec<Value>) -> Result<Vec<Value>> {
    if values.is_empty() {
        return Err(Error::validation(format!("`{path}` must not be an empty set")));
    }
    let mut seen = collections::HashSet::with_capacity(values.len());
    Ok(values
        .into_iter()
        .filter(|value| seen.insert(value.to_string()))
        .collect())
}

/// Declared attributes of a model.
///
/// An empty schema accepts any item.
///
/// ```rust
/// use dynamodb_mapper::model::schema::{Attribute, Schema};
///
/// let schema = Schema::default()
///     .attribute("email", Attribute::string().required())
///     .attribute("name", Attribute::string())
///     .attribute("roles", Attribute::string_set().default_value(vec!["user"]));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    /// Declared attributes, in declaration order.
    pub attributes: IndexMap<String, Attribute>,
    /// Whether attributes outside the declaration are accepted.
    pub allow_unknown: bool,
}

impl Schema {
    /// Declare an attribute.
    pub fn attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Accept attributes outside the declaration.
    pub fn allow_unknown(mut self, allow_unknown: bool) -> Self {
        self.allow_unknown = allow_unknown;
        self
    }

    /// Whether the declared type of a top-level attribute is a set.
    pub fn is_set(&self, name: &str) -> bool {
        matches!(
            self.attributes.get(name).map(|attribute| &attribute.kind),
            Some(AttributeType::StringSet | AttributeType::NumberSet)
        )
    }

    fn validate_at(
        &self,
        prefix: &str,
        mut item: common::Attributes,
        mode: ValidationMode,
    ) -> Result<common::Attributes> {
        if self.attributes.is_empty() {
            return Ok(item);
        }
        let path_of = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };
        if !self.allow_unknown {
            if let Some(unknown) = item.keys().find(|name| !self.attributes.contains_key(*name)) {
                return Err(Error::validation(format!(
                    "`{}` is not allowed",
                    path_of(unknown)
                )));
            }
        }
        let mut normalized = common::Attributes::new();
        for (name, attribute) in &self.attributes {
            let path = path_of(name);
            match (item.remove(name), mode) {
                (Some(Value::Null), ValidationMode::Partial) if !attribute.required => {
                    normalized.insert(name.clone(), Value::Null);
                }
                (Some(Value::Null), _) | (None, ValidationMode::Full) => {
                    if let Some(default) = &attribute.default {
                        normalized.insert(name.clone(), default.generate());
                    } else if attribute.required {
                        return Err(Error::validation(format!("`{path}` is required")));
                    }
                }
                (None, ValidationMode::Partial) => {}
                (Some(value), _) if is_update_operation(&value) && mode == ValidationMode::Partial => {
                    normalized.insert(name.clone(), value);
                }
                (Some(value), _) => {
                    normalized.insert(name.clone(), attribute.check(&path, value, mode)?);
                }
            }
        }
        normalized.extend(item);
        Ok(normalized)
    }
}

/// `{"$add": ..}` and `{"$del": ..}` objects carry update operations, not values.
pub(crate) fn is_update_operation(value: &Value) -> bool {
    match value {
        Value::Object(object) if object.len() == 1 => {
            object.contains_key("$add") || object.contains_key("$del")
        }
        _ => false,
    }
}

impl Validator for Schema {
    fn validate(&self, item: common::Attributes, mode: ValidationMode) -> Result<common::Attributes> {
        self.validate_at("", item, mode)
    }

    fn encode(&self, item: &mut AttributeMap) {
        for (name, value) in item.iter_mut() {
            if self.is_set(name) {
                *value = common::list_to_set(value.clone());
            }
        }
    }
}
