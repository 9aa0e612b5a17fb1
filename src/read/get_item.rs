use crate::{
    common::{self, key::ItemKey},
    error::Result,
    model::{Item, Model},
    read::common::GetOptions,
};

use aws_sdk_dynamodb::operation::get_item::GetItemInput;
use std::sync::Arc;

impl Model {
    fn get_item_input(&self, key: ItemKey, options: GetOptions) -> Result<GetItemInput> {
        let key = common::to_attribute_map(&self.key_of(key)?)?;
        let single_read_operation = options.compile(self.table_name());
        let builder = GetItemInput::builder().set_key(Some(key));
        let input = crate::apply_single_read_operation!(builder, single_read_operation).build()?;
        Ok(input)
    }

    /// Fetch one item by key; `None` when it does not exist.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get", skip_all, fields(model = self.name()), err)
    )]
    pub async fn get(
        self: &Arc<Self>,
        key: impl Into<ItemKey>,
        options: GetOptions,
    ) -> Result<Option<Item>> {
        let input = self.get_item_input(key.into(), options)?;
        let output = self.store().get_item(input).await?;
        output.item.map(|item| self.decode(item)).transpose()
    }
}
