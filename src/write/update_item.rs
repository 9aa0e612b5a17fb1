use crate::{
    common::{self, expression::Placeholders, selection::SelectionMap},
    error::{Error, Result},
    model::{Item, Model, hooks::Action, schema},
    write::common::WriteArgs,
};

use aws_sdk_dynamodb::{operation::update_item::UpdateItemInput, types};
use indexmap::IndexMap;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use serde_json::Value;
use std::sync::Arc;

/// Rewrites a top-level attribute value before it is placed in a SET clause.
type Encode<'a> = &'a dyn Fn(&str, types::AttributeValue) -> types::AttributeValue;

/// Update clauses collected before rendering; each keyword appears at most once.
#[derive(Debug, Default)]
struct Clauses {
    add: Vec<String>,
    delete: Vec<String>,
    remove: Vec<String>,
    set: Vec<String>,
}

impl Clauses {
    fn render(self) -> Option<String> {
        let clauses: Vec<_> = [
            ("SET", self.set),
            ("REMOVE", self.remove),
            ("ADD", self.add),
            ("DELETE", self.delete),
        ]
        .into_iter()
        .filter(|(_, parts)| !parts.is_empty())
        .map(|(keyword, parts)| format!("{keyword} {}", parts.join(", ")))
        .collect();
        (!clauses.is_empty()).then(|| clauses.join(" "))
    }
}

/// Map for ADD and DELETE operations.
///
/// Values are stored as sets when they are lists of strings or numbers.
#[derive(Clone, Debug, PartialEq)]
pub enum AddOrDeleteInputsMap<T> {
    /// Leaf operations - flat list of (attribute_name, value) pairs.
    Leaves(Vec<(String, T)>),
    /// Node operations - nested operations for hierarchical attribute paths.
    Node(IndexMap<String, AddOrDeleteInputsMap<T>>),
}

impl<T: Serialize> AddOrDeleteInputsMap<T> {
    fn compile_recursive(
        self,
        keys: &[String],
        operator: &str,
        placeholders: &mut Placeholders,
    ) -> Result<Vec<String>> {
        let mut expressions = Vec::new();
        match self {
            Self::Leaves(leaves) => {
                for (key, value) in leaves {
                    let mut path = keys.to_vec();
                    path.push(key.clone());
                    let path = placeholders.path(&path);
                    let value = common::list_to_set(to_attribute_value(value)?);
                    let value_placeholder = placeholders.value(&key, operator, value);
                    expressions.push(format!("{path} {value_placeholder}"));
                }
            }
            Self::Node(map) => {
                for (key, value) in map {
                    let mut path = keys.to_vec();
                    path.push(key);
                    expressions.extend(value.compile_recursive(&path, operator, placeholders)?);
                }
            }
        }
        Ok(expressions)
    }
}

/// SET operation for updating attributes.
///
/// ```rust
/// use dynamodb_mapper::write::update_item;
///
/// let assign = update_item::SetInput::Assign("value".to_string());
/// let increment = update_item::SetInput::Increment(10);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum SetInput<T> {
    /// Assign a new value to the attribute (replaces existing value).
    Assign(T),
    /// Increment a numeric attribute by the specified value.
    Increment(T),
    /// Decrement a numeric attribute by the specified value.
    Decrement(T),
    /// Append values to the end of a list attribute.
    ListAppend(T),
    /// Prepend values to the beginning of a list attribute.
    ListPrepend(T),
    /// Assign a value only if the attribute doesn't exist.
    IfNotExists(T),
}

impl<T: Serialize> SetInput<T> {
    fn compile(
        self,
        name: &str,
        path: &str,
        placeholders: &mut Placeholders,
        encode: Option<Encode<'_>>,
    ) -> Result<String> {
        let mut value_placeholder = |value: T| -> Result<String> {
            let mut value = to_attribute_value(value)?;
            if let Some(encode) = encode {
                value = encode(name, value);
            }
            Ok(placeholders.value(name, "set", value))
        };
        let expression = match self {
            Self::Assign(value) => format!("{path} = {}", value_placeholder(value)?),
            Self::Increment(value) => format!("{path} = {path} + {}", value_placeholder(value)?),
            Self::Decrement(value) => format!("{path} = {path} - {}", value_placeholder(value)?),
            Self::ListAppend(value) => {
                format!("{path} = list_append({path}, {})", value_placeholder(value)?)
            }
            Self::ListPrepend(value) => {
                format!("{path} = list_append({}, {path})", value_placeholder(value)?)
            }
            Self::IfNotExists(value) => {
                format!("{path} = if_not_exists({path}, {})", value_placeholder(value)?)
            }
        };
        Ok(expression)
    }
}

/// Map for SET operations.
#[derive(Clone, Debug, PartialEq)]
pub enum SetInputsMap<T> {
    /// Leaf operations - flat list of (attribute_name, set_operation) pairs.
    Leaves(Vec<(String, SetInput<T>)>),
    /// Node operations - nested operations for hierarchical attribute paths.
    Node(IndexMap<String, SetInputsMap<T>>),
}

impl<T: Serialize> SetInputsMap<T> {
    fn compile_recursive(
        self,
        keys: &[String],
        placeholders: &mut Placeholders,
        encode: Encode<'_>,
    ) -> Result<Vec<String>> {
        let mut expressions = Vec::new();
        match self {
            Self::Leaves(leaves) => {
                for (key, set_input) in leaves {
                    let mut path = keys.to_vec();
                    path.push(key.clone());
                    let path = placeholders.path(&path);
                    let top_level = keys.is_empty().then_some(encode);
                    expressions.push(set_input.compile(&key, &path, placeholders, top_level)?);
                }
            }
            Self::Node(map) => {
                for (key, value) in map {
                    let mut path = keys.to_vec();
                    path.push(key);
                    expressions.extend(value.compile_recursive(&path, placeholders, encode)?);
                }
            }
        }
        Ok(expressions)
    }
}

/// Update expression map.
///
/// ```rust
/// use dynamodb_mapper::write::update_item;
///
/// let expr = update_item::UpdateExpressionMap::Set(
///     update_item::SetInputsMap::Leaves(vec![
///         ("name".to_string(), update_item::SetInput::Assign("New".to_string())),
///     ]),
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateExpressionMap<T> {
    /// ADD operations - add values to numbers or sets.
    Add(AddOrDeleteInputsMap<T>),
    /// DELETE operations - delete values from sets.
    Delete(AddOrDeleteInputsMap<T>),
    /// REMOVE operations - remove attributes from items.
    Remove(SelectionMap),
    /// SET operations - set or modify attribute values.
    Set(SetInputsMap<T>),
    /// Combined operations - multiple operation types in a single update expression.
    Combined(Vec<UpdateExpressionMap<T>>),
}

impl<T: Serialize> UpdateExpressionMap<T> {
    fn collect(
        self,
        placeholders: &mut Placeholders,
        encode: Encode<'_>,
        clauses: &mut Clauses,
    ) -> Result<()> {
        match self {
            Self::Add(add_inputs) => {
                clauses
                    .add
                    .extend(add_inputs.compile_recursive(&[], "add", placeholders)?);
            }
            Self::Delete(delete_inputs) => {
                clauses
                    .delete
                    .extend(delete_inputs.compile_recursive(&[], "delete", placeholders)?);
            }
            Self::Remove(selection) => {
                let expression = selection.compile(placeholders);
                if !expression.is_empty() {
                    clauses.remove.push(expression);
                }
            }
            Self::Set(set_inputs) => {
                clauses
                    .set
                    .extend(set_inputs.compile_recursive(&[], placeholders, encode)?);
            }
            Self::Combined(update_expressions) => {
                for update_expression in update_expressions {
                    update_expression.collect(placeholders, encode, clauses)?;
                }
            }
        }
        Ok(())
    }

    /// Compile into an update expression; `None` when there is nothing to update.
    pub(crate) fn compile(
        self,
        placeholders: &mut Placeholders,
        encode: Encode<'_>,
    ) -> Result<Option<String>> {
        let mut clauses = Clauses::default();
        self.collect(placeholders, encode, &mut clauses)?;
        Ok(clauses.render())
    }
}

/// Partial update attributes: `null` removes, `{"$add": v}` adds and
/// `{"$del": v}` deletes, anything else is assigned.
impl From<common::Attributes> for UpdateExpressionMap<Value> {
    fn from(attributes: common::Attributes) -> Self {
        let mut add = Vec::new();
        let mut delete = Vec::new();
        let mut remove = Vec::new();
        let mut set = Vec::new();
        for (name, value) in attributes {
            match value {
                Value::Null => remove.push(name),
                value if schema::is_update_operation(&value) => {
                    let Value::Object(mut operation) = value else {
                        continue;
                    };
                    if let Some(value) = operation.remove("$add") {
                        add.push((name, value));
                    } else if let Some(value) = operation.remove("$del") {
                        delete.push((name, value));
                    }
                }
                value => set.push((name, SetInput::Assign(value))),
            }
        }
        let mut update_expressions = Vec::with_capacity(4);
        if !set.is_empty() {
            update_expressions.push(Self::Set(SetInputsMap::Leaves(set)));
        }
        if !remove.is_empty() {
            update_expressions.push(Self::Remove(SelectionMap::Leaves(remove)));
        }
        if !add.is_empty() {
            update_expressions.push(Self::Add(AddOrDeleteInputsMap::Leaves(add)));
        }
        if !delete.is_empty() {
            update_expressions.push(Self::Delete(AddOrDeleteInputsMap::Leaves(delete)));
        }
        Self::Combined(update_expressions)
    }
}

/// Options of [`Model::update`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateOptions {
    /// Extra operations merged into the expression built from the attributes.
    pub update_expression: Option<UpdateExpressionMap<Value>>,
    /// Additional write operation arguments; `return_values` defaults to all new.
    pub write_args: WriteArgs,
}

impl Model {
    fn update_item_input(
        &self,
        key: &common::Attributes,
        attributes: common::Attributes,
        options: UpdateOptions,
    ) -> Result<UpdateItemInput> {
        let mut update_expression = UpdateExpressionMap::from(attributes);
        if let Some(extra) = options.update_expression {
            update_expression = UpdateExpressionMap::Combined(vec![update_expression, extra]);
        }
        let mut placeholders = Placeholders::default();
        let encode = |name: &str, value: types::AttributeValue| self.encode_value(name, value);
        let update_expression = update_expression.compile(&mut placeholders, &encode)?;
        let mut write_args = options.write_args;
        write_args
            .return_values
            .get_or_insert(types::ReturnValue::AllNew);
        let write_operation = write_args.compile(self.table_name(), placeholders, Vec::new())?;
        let builder = UpdateItemInput::builder()
            .set_key(Some(common::to_attribute_map(key)?))
            .set_update_expression(update_expression);
        let input = crate::apply_write_operation!(builder, write_operation).build()?;
        Ok(input)
    }

    /// Apply a partial update to the item identified by the key attributes
    /// contained in `attributes`.
    ///
    /// ```rust,no_run
    /// use serde_json::json;
    ///
    /// # async fn example(accounts: std::sync::Arc<dynamodb_mapper::model::Model>) -> dynamodb_mapper::error::Result<()> {
    /// let attributes = json!({
    ///     "email": "foo@example.com",
    ///     "nickname": null,
    ///     "age": {"$add": 1},
    ///     "roles": {"$del": ["guest"]},
    /// });
    /// accounts
    ///     .update(attributes.as_object().cloned().unwrap_or_default(), Default::default())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.update", skip_all, fields(model = self.name()), err)
    )]
    pub async fn update(
        self: &Arc<Self>,
        attributes: common::Attributes,
        options: UpdateOptions,
    ) -> Result<Item> {
        let mut attributes = self.hooks().run_before(Action::Update, attributes)?;
        let key = self.key_of(attributes.clone())?;
        attributes.retain(|name, _| !key.contains_key(name));
        if attributes.is_empty() && options.update_expression.is_none() {
            return Err(Error::validation(format!(
                "update of `{}` has nothing to change",
                self.name()
            )));
        }
        let mut attributes = self.validate_partial(attributes)?;
        self.stamp_updated(&mut attributes);
        let input = self.update_item_input(&key, attributes, options)?;
        let output = self.store().update_item(input).await?;
        let mut item = key;
        if let Some(returned) = output.attributes {
            item.extend(common::from_attribute_map(returned)?);
        }
        let item = self.bind(item);
        self.hooks().run_after(Action::Update, &item);
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ModelConfig,
        schema::{Attribute, Schema},
        tests::{model, tweets},
    };

    use rstest::rstest;
    use serde_json::json;

    fn attributes(value: Value) -> common::Attributes {
        match value {
            Value::Object(attributes) => attributes,
            _ => unreachable!(),
        }
    }

    fn no_encoding(_: &str, value: types::AttributeValue) -> types::AttributeValue {
        value
    }

    #[rstest]
    #[case::set_assign(
        UpdateExpressionMap::Set(
            SetInputsMap::Leaves(
                vec![
                    (
                        "attr".to_string(),
                        SetInput::Assign(
                            Value::String(
                                "val".to_string()
                            )
                        )
                    ),
                ]
            )
        ),
        "SET #attr = :attr_set0"
    )]
    #[case::set_increment(
        UpdateExpressionMap::Set(
            SetInputsMap::Leaves(
                vec![
                    (
                        "count".to_string(),
                        SetInput::Increment(
                            Value::Number(
                                5.into()
                            )
                        )
                    ),
                ]
            )
        ),
        "SET #count = #count + :count_set0"
    )]
    #[case::set_decrement(
        UpdateExpressionMap::Set(
            SetInputsMap::Leaves(
                vec![
                    (
                        "count".to_string(),
                        SetInput::Decrement(
                            Value::Number(
                                1.into()
                            )
                        )
                    ),
                ]
            )
        ),
        "SET #count = #count - :count_set0"
    )]
    #[case::set_list_append(
        UpdateExpressionMap::Set(
            SetInputsMap::Leaves(
                vec![
                    (
                        "items".to_string(),
                        SetInput::ListAppend(
                            json!(["a"])
                        )
                    ),
                ]
            )
        ),
        "SET #items = list_append(#items, :items_set0)"
    )]
    #[case::set_list_prepend(
        UpdateExpressionMap::Set(
            SetInputsMap::Leaves(
                vec![
                    (
                        "items".to_string(),
                        SetInput::ListPrepend(
                            json!(["a"])
                        )
                    ),
                ]
            )
        ),
        "SET #items = list_append(:items_set0, #items)"
    )]
    #[case::set_if_not_exists(
        UpdateExpressionMap::Set(
            SetInputsMap::Leaves(
                vec![
                    (
                        "views".to_string(),
                        SetInput::IfNotExists(
                            Value::Number(
                                0.into()
                            )
                        )
                    ),
                ]
            )
        ),
        "SET #views = if_not_exists(#views, :views_set0)"
    )]
    #[case::remove_multiple(
        UpdateExpressionMap::Remove(
            SelectionMap::Leaves(
                vec![
                    "a".to_string(),
                    "b".to_string(),
                ]
            )
        ),
        "REMOVE #a, #b"
    )]
    #[case::add_and_delete(
        UpdateExpressionMap::Combined(
            vec![
                UpdateExpressionMap::Add(
                    AddOrDeleteInputsMap::Leaves(
                        vec![
                            ("count".to_string(), json!(1)),
                            ("tags".to_string(), json!(["x"])),
                        ]
                    )
                ),
                UpdateExpressionMap::Delete(
                    AddOrDeleteInputsMap::Leaves(
                        vec![
                            ("tags".to_string(), json!(["y"])),
                        ]
                    )
                ),
            ]
        ),
        "ADD #count :count_add0, #tags :tags_add1 DELETE #tags :tags_delete2"
    )]
    #[case::nested_path_set(
        UpdateExpressionMap::Set(
            SetInputsMap::Node(
                IndexMap::from(
                    [(
                        "meta".to_string(),
                        SetInputsMap::Leaves(
                            vec![
                                (
                                    "views".to_string(),
                                    SetInput::Increment(json!(1))
                                ),
                            ]
                        )
                    )]
                )
            )
        ),
        "SET #meta.#views = #meta.#views + :views_set0"
    )]
    #[case::combined_groups_keywords(
        UpdateExpressionMap::Combined(
            vec![
                UpdateExpressionMap::Set(
                    SetInputsMap::Leaves(
                        vec![
                            ("a".to_string(), SetInput::Assign(json!(1))),
                        ]
                    )
                ),
                UpdateExpressionMap::Remove(
                    SelectionMap::Leaves(
                        vec![
                            "b".to_string(),
                        ]
                    )
                ),
                UpdateExpressionMap::Set(
                    SetInputsMap::Leaves(
                        vec![
                            ("c".to_string(), SetInput::Assign(json!(2))),
                        ]
                    )
                ),
            ]
        ),
        "SET #a = :a_set0, #c = :c_set1 REMOVE #b"
    )]
    fn test_update_expression_compile(
        #[case] update_expression: UpdateExpressionMap<Value>,
        #[case] expected: &str,
    ) {
        let mut placeholders = Placeholders::default();
        let actual = update_expression
            .compile(&mut placeholders, &no_encoding)
            .unwrap();
        assert_eq!(actual.as_deref(), Some(expected));
    }

    #[test]
    fn test_add_and_delete_values_become_sets() {
        let mut placeholders = Placeholders::default();
        UpdateExpressionMap::Add(AddOrDeleteInputsMap::Leaves(vec![(
            "tags".to_string(),
            json!(["x", "y"]),
        )]))
        .compile(&mut placeholders, &no_encoding)
        .unwrap();
        let (_, values) = placeholders.into_maps();
        assert_eq!(
            values.unwrap()[":tags_add0"],
            types::AttributeValue::Ss(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn test_empty_update_expression() {
        let mut placeholders = Placeholders::default();
        let actual = UpdateExpressionMap::<Value>::Combined(vec![])
            .compile(&mut placeholders, &no_encoding)
            .unwrap();
        assert_eq!(actual, None);
    }

    #[test]
    fn test_from_attributes() {
        let update_expression = UpdateExpressionMap::from(attributes(json!({
            "name": "n",
            "nickname": null,
            "age": {"$add": 1},
            "roles": {"$del": ["guest"]},
            "settings": {"theme": "dark"},
        })));
        assert_eq!(
            update_expression,
            UpdateExpressionMap::Combined(vec![
                UpdateExpressionMap::Set(SetInputsMap::Leaves(vec![
                    ("name".to_string(), SetInput::Assign(json!("n"))),
                    ("settings".to_string(), SetInput::Assign(json!({"theme": "dark"}))),
                ])),
                UpdateExpressionMap::Remove(SelectionMap::Leaves(vec!["nickname".to_string()])),
                UpdateExpressionMap::Add(AddOrDeleteInputsMap::Leaves(vec![(
                    "age".to_string(),
                    json!(1)
                )])),
                UpdateExpressionMap::Delete(AddOrDeleteInputsMap::Leaves(vec![(
                    "roles".to_string(),
                    json!(["guest"])
                )])),
            ])
        );
    }

    #[test]
    fn test_update_item_input() {
        let key = attributes(json!({"user_id": "u", "tweet_id": "t"}));
        let input = tweets()
            .update_item_input(
                &key,
                attributes(json!({"content": "hi", "draft": null})),
                UpdateOptions::default(),
            )
            .unwrap();
        assert_eq!(
            input.update_expression.as_deref(),
            Some("SET #content = :content_set0 REMOVE #draft")
        );
        assert_eq!(input.return_values, Some(types::ReturnValue::AllNew));
        assert_eq!(input.table_name.as_deref(), Some("tweets"));
        assert_eq!(input.key, Some(common::to_attribute_map(&key).unwrap()));
    }

    #[test]
    fn test_update_item_input_encodes_declared_sets() {
        let model = model(ModelConfig {
            hash_key: "id".to_string(),
            schema: Schema::default()
                .attribute("id", Attribute::string())
                .attribute("tags", Attribute::string_set())
                .attribute("history", Attribute::list()),
            ..Default::default()
        });
        let input = model
            .update_item_input(
                &attributes(json!({"id": "a"})),
                attributes(json!({"tags": ["x"], "history": ["x"]})),
                UpdateOptions {
                    write_args: WriteArgs {
                        return_values: Some(types::ReturnValue::None),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .unwrap();
        let values = input.expression_attribute_values.unwrap();
        assert_eq!(
            values[":tags_set0"],
            types::AttributeValue::Ss(vec!["x".to_string()])
        );
        assert_eq!(
            values[":history_set1"],
            types::AttributeValue::L(vec![types::AttributeValue::S("x".to_string())])
        );
        assert_eq!(input.return_values, Some(types::ReturnValue::None));
    }
}
