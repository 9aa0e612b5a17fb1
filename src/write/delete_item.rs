use crate::{
    common::{self, expression::Placeholders, key::ItemKey},
    error::Result,
    model::{Item, Model, hooks::Action},
    write::common::WriteArgs,
};

use aws_sdk_dynamodb::{operation::delete_item::DeleteItemInput, types};
use std::sync::Arc;

/// Options of [`Model::destroy`].
///
/// ```rust
/// use dynamodb_mapper::{common::condition::Expected, write::{common::WriteArgs, delete_item::DestroyOptions}};
/// use indexmap::IndexMap;
/// use serde_json::json;
///
/// let options = DestroyOptions {
///     write_args: WriteArgs {
///         expected: IndexMap::from([("status".to_string(), Expected::Equals(json!("archived")))]),
///         ..Default::default()
///     },
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DestroyOptions {
    /// Additional write operation arguments; `return_values` defaults to all old.
    pub write_args: WriteArgs,
}

impl Model {
    fn delete_item_input(
        &self,
        key: &common::Attributes,
        options: DestroyOptions,
    ) -> Result<DeleteItemInput> {
        let mut write_args = options.write_args;
        write_args
            .return_values
            .get_or_insert(types::ReturnValue::AllOld);
        let write_operation =
            write_args.compile(self.table_name(), Placeholders::default(), Vec::new())?;
        let builder = DeleteItemInput::builder().set_key(Some(common::to_attribute_map(key)?));
        let input = crate::apply_write_operation!(builder, write_operation).build()?;
        Ok(input)
    }

    /// Delete one item and return its previous attributes, if it existed.
    ///
    /// Before-destroy hooks receive the key attribute map; after-destroy hooks
    /// receive the removed item, or the key alone when nothing was returned.
    ///
    /// ```rust,no_run
    /// # async fn example(tweets: std::sync::Arc<dynamodb_mapper::model::Model>) -> dynamodb_mapper::error::Result<()> {
    /// let old = tweets
    ///     .destroy(("user-1", "tweet-1"), Default::default())
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.destroy", skip_all, fields(model = self.name()), err)
    )]
    pub async fn destroy(
        self: &Arc<Self>,
        key: impl Into<ItemKey>,
        options: DestroyOptions,
    ) -> Result<Option<Item>> {
        let key = self.key_of(key)?;
        let key = self.hooks().run_before(Action::Destroy, key)?;
        let key = self.key_of(key)?;
        let input = self.delete_item_input(&key, options)?;
        let output = self.store().delete_item(input).await?;
        let old = output
            .attributes
            .filter(|attributes| !attributes.is_empty())
            .map(|attributes| self.decode(attributes))
            .transpose()?;
        let removed = old.clone().unwrap_or_else(|| self.bind(key));
        self.hooks().run_after(Action::Destroy, &removed);
        Ok(old)
    }
}
