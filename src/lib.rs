#![warn(missing_docs)]

//! # DynamoDB Mapper
//!
//! A schema-validated data mapper for Amazon DynamoDB.
//!
//! ## Overview
//!
//! Models bind a table, its key layout and secondary indexes to a schema and
//! lifecycle hooks. On top of them the crate offers:
//! - single-item create, get, update and destroy with condition support
//! - chainable query and scan builders compiled into expression strings with
//!   collision-free placeholders
//! - paginated result streams, load-all aggregation and parallel scans
//! - batch get and batch write split into chunks, issued concurrently and
//!   retried with bounded exponential backoff
//!
//! ## Quick Example
//!
//! ```no_run
//! use dynamodb_mapper::{
//!     model::{self, ModelConfig, schema::{Attribute, Schema}},
//!     read::common::GetOptions,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(client: aws_sdk_dynamodb::Client) -> dynamodb_mapper::error::Result<()> {
//! let tweets = model::registry::define(
//!     "Tweet",
//!     ModelConfig {
//!         hash_key: "user_id".to_string(),
//!         range_key: Some("tweet_id".to_string()),
//!         schema: Schema::default()
//!             .attribute("user_id", Attribute::string().required())
//!             .attribute("tweet_id", Attribute::uuid().default_uuid())
//!             .attribute("content", Attribute::string())
//!             .attribute("tags", Attribute::string_set()),
//!         ..Default::default()
//!     },
//!     Arc::new(client),
//! )?;
//!
//! let tweet = json!({"user_id": "u-1", "content": "hello", "tags": ["greeting"]});
//! let tweet = tweets
//!     .create(tweet.as_object().cloned().unwrap_or_default(), Default::default())
//!     .await?;
//!
//! // Builds "#user_id = :user_id_eq0" and "begins_with(#content, :content_begins_with1)"
//! let response = tweets
//!     .query("u-1")
//!     .filter("content")
//!     .begins_with("hel")
//!     .limit(10)
//!     .exec_all()
//!     .await?;
//! assert!(response.count <= 10);
//!
//! let found = tweets
//!     .get(tweet.attributes().clone(), GetOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@model`] - Model definitions, schema validation, hooks and the registry
//! - [`mod@common`] - Shared utilities for keys, conditions, placeholders, batching and retries
//! - [`mod@read`] - Read operations (get, query, scan, batch get) and result streams
//! - [`mod@write`] - Write operations (create, update, destroy, batch write)
//! - [`mod@store`] - The request surface over the DynamoDB client

/// Common utilities for keys, conditions, and attribute selection.
pub mod common;

/// Error taxonomy shared by every operation.
pub mod error;

pub mod model;

/// Read operations for retrieving data from DynamoDB tables.
///
/// This module provides operations for:
/// - Getting individual items by key
/// - Querying items with key conditions
/// - Scanning entire tables, optionally in parallel segments
/// - Batch retrieving multiple items
pub mod read;

pub mod store;

/// Write operations for modifying data in DynamoDB tables.
///
/// This module provides operations for:
/// - Creating new items or replacing existing ones
/// - Updating items with various operations (set, add, remove, delete)
/// - Destroying items by key
/// - Batch writing multiple items
pub mod write;

pub use error::{Error, Result};
pub use model::{Item, Model, ModelConfig};
pub use store::Store;
