use crate::{
    common::{
        self,
        condition::{Condition, KeyCondition},
        expression::Placeholders,
    },
    error::Result,
    model::{Item, Model, hooks::Action},
    write::common::WriteArgs,
};

use aws_sdk_dynamodb::operation::put_item::PutItemInput;
use std::sync::Arc;

/// Options of [`Model::create`].
///
/// ```rust
/// use dynamodb_mapper::write::put_item::CreateOptions;
///
/// let options = CreateOptions {
///     overwrite: false,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CreateOptions {
    /// Replace an existing item with the same key; defaults to `true`.
    ///
    /// When `false` the write fails with a conditional check error if the
    /// key already exists.
    pub overwrite: bool,
    /// Additional write operation arguments (conditions, return values, etc.).
    pub write_args: WriteArgs,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            overwrite: true,
            write_args: WriteArgs::default(),
        }
    }
}

impl Model {
    /// Build the put request for validated attributes.
    fn put_item_input(
        &self,
        attributes: &common::Attributes,
        options: CreateOptions,
    ) -> Result<PutItemInput> {
        self.key_of(attributes.clone())?;
        let item = self.encode(attributes)?;
        let guards = if options.overwrite {
            Vec::new()
        } else {
            self.key_names()
                .into_iter()
                .map(|name| KeyCondition {
                    condition: Condition::Null,
                    name: name.to_string(),
                })
                .collect()
        };
        let write_operation =
            options
                .write_args
                .compile(self.table_name(), Placeholders::default(), guards)?;
        let builder = PutItemInput::builder().set_item(Some(item));
        let input = crate::apply_write_operation!(builder, write_operation).build()?;
        Ok(input)
    }

    /// Validate, stamp and persist a new item.
    ///
    /// Before-create hooks run first and may rewrite or reject the
    /// attributes; nothing is sent if any of them fails.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.create", skip_all, fields(model = self.name()), err)
    )]
    pub async fn create(
        self: &Arc<Self>,
        attributes: common::Attributes,
        options: CreateOptions,
    ) -> Result<Item> {
        let attributes = self.hooks().run_before(Action::Create, attributes)?;
        let mut attributes = self.validate(attributes)?;
        self.stamp_created(&mut attributes);
        let input = self.put_item_input(&attributes, options)?;
        self.store().put_item(input).await?;
        let item = self.bind(attributes);
        self.hooks().run_after(Action::Create, &item);
        Ok(item)
    }
}
