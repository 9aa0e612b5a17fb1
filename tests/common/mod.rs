//! In-memory `Store` double shared by the integration tests.
//!
//! It understands just enough of the expression language for the requests the
//! mapper builds: equality key conditions, `attribute_not_exists` guards and
//! `SET`/`REMOVE` update clauses. Filters are ignored.

#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    operation::{
        batch_get_item::{BatchGetItemInput, BatchGetItemOutput},
        batch_write_item::{BatchWriteItemInput, BatchWriteItemOutput},
        delete_item::{DeleteItemInput, DeleteItemOutput},
        get_item::{GetItemInput, GetItemOutput},
        put_item::{PutItemInput, PutItemOutput},
        query::{QueryInput, QueryOutput},
        scan::{ScanInput, ScanOutput},
        update_item::{UpdateItemInput, UpdateItemOutput},
    },
    types,
};
use dynamodb_mapper::{
    Store,
    common::AttributeMap,
    error::{Error, Result},
};
use parking_lot::Mutex;
use std::{
    cmp::Ordering,
    collections,
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};

#[derive(Debug)]
struct Table {
    hash_key: String,
    range_key: Option<String>,
    items: Vec<AttributeMap>,
}

impl Table {
    fn key_names(&self) -> Vec<&str> {
        let mut names = vec![self.hash_key.as_str()];
        names.extend(self.range_key.as_deref());
        names
    }

    fn key_of(&self, item: &AttributeMap) -> AttributeMap {
        self.key_names()
            .into_iter()
            .filter_map(|name| item.get(name).map(|value| (name.to_string(), value.clone())))
            .collect()
    }

    fn position(&self, key: &AttributeMap) -> Option<usize> {
        self.items
            .iter()
            .position(|item| self.key_of(item) == self.key_of(key))
    }
}

/// Failure injected into a request.
#[derive(Clone, Copy, Debug)]
pub enum Fault {
    /// Throttling, retried by the mapper.
    Transient,
    /// Any other store failure.
    Store,
}

impl Fault {
    fn error(self, operation: &str) -> Error {
        match self {
            Self::Transient => Error::Transient(format!("{operation} throttled").into()),
            Self::Store => Error::Store(format!("{operation} failed").into()),
        }
    }
}

/// Table-per-name store holding items in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<collections::HashMap<String, Table>>,
    page_size: Option<usize>,
    batch_leftover: AtomicUsize,
    faults: Mutex<Vec<(&'static str, usize, Fault)>>,
    requests: Mutex<Vec<(&'static str, usize)>>,
}

impl MemoryStore {
    /// Register a table and its key layout.
    pub fn table(self, name: &str, hash_key: &str, range_key: Option<&str>) -> Self {
        self.tables.lock().insert(
            name.to_string(),
            Table {
                hash_key: hash_key.to_string(),
                range_key: range_key.map(str::to_string),
                items: Vec::new(),
            },
        );
        self
    }

    /// Cap the items of every query or scan page.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// The next `calls` batch requests each leave their last entry unprocessed.
    pub fn batch_leftover(self, calls: usize) -> Self {
        self.batch_leftover.store(calls, AtomicOrdering::SeqCst);
        self
    }

    /// Fail the `call`-th request (1-based) of an operation.
    pub fn fail(self, operation: &'static str, call: usize, fault: Fault) -> Self {
        self.faults.lock().push((operation, call, fault));
        self
    }

    /// Number of requests issued for an operation, failed ones included.
    pub fn requests(&self, operation: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|(name, _)| *name == operation)
            .count()
    }

    /// Items or keys carried by each request of an operation.
    pub fn request_sizes(&self, operation: &str) -> Vec<usize> {
        self.requests
            .lock()
            .iter()
            .filter(|(name, _)| *name == operation)
            .map(|(_, size)| *size)
            .collect()
    }

    /// Every item currently in a table.
    pub fn items(&self, table_name: &str) -> Vec<AttributeMap> {
        self.tables
            .lock()
            .get(table_name)
            .map(|table| table.items.clone())
            .unwrap_or_default()
    }

    fn record(&self, operation: &'static str, size: usize) -> Result<()> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push((operation, size));
            requests.iter().filter(|(name, _)| *name == operation).count()
        };
        let fault = self
            .faults
            .lock()
            .iter()
            .find(|(name, at, _)| *name == operation && *at == call)
            .map(|(_, _, fault)| *fault);
        fault.map_or(Ok(()), |fault| Err(fault.error(operation)))
    }

    fn leftover(&self) -> usize {
        let leave = self
            .batch_leftover
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |calls| {
                calls.checked_sub(1)
            })
            .is_ok();
        usize::from(leave)
    }

    fn with_table<T>(
        &self,
        table_name: Option<&str>,
        f: impl FnOnce(&mut Table) -> Result<T>,
    ) -> Result<T> {
        let mut tables = self.tables.lock();
        let table_name = table_name.unwrap_or_default();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| Error::Store(format!("table `{table_name}` does not exist").into()))?;
        f(table)
    }

    fn page(
        &self,
        table: &Table,
        mut items: Vec<AttributeMap>,
        exclusive_start_key: Option<&AttributeMap>,
        limit: Option<i32>,
    ) -> (Vec<AttributeMap>, Option<AttributeMap>) {
        if let Some(start_key) = exclusive_start_key {
            let start_key = table.key_of(start_key);
            if let Some(position) = items.iter().position(|item| table.key_of(item) == start_key) {
                items.drain(..=position);
            }
        }
        let limit = limit.map(|limit| limit.max(0) as usize);
        let page_size = match (limit, self.page_size) {
            (Some(limit), Some(page_size)) => Some(limit.min(page_size)),
            (limit, page_size) => limit.or(page_size),
        };
        match page_size {
            Some(page_size) if items.len() > page_size => {
                items.truncate(page_size);
                let last_evaluated_key = items.last().map(|item| table.key_of(item));
                (items, last_evaluated_key)
            }
            _ => (items, None),
        }
    }
}

fn resolve_name(names: Option<&collections::HashMap<String, String>>, placeholder: &str) -> String {
    names
        .and_then(|names| names.get(placeholder))
        .cloned()
        .unwrap_or_else(|| placeholder.to_string())
}

fn compare(left: Option<&types::AttributeValue>, right: Option<&types::AttributeValue>) -> Ordering {
    match (left, right) {
        (Some(types::AttributeValue::N(left)), Some(types::AttributeValue::N(right))) => left
            .parse::<f64>()
            .unwrap_or_default()
            .total_cmp(&right.parse::<f64>().unwrap_or_default()),
        (Some(types::AttributeValue::S(left)), Some(types::AttributeValue::S(right))) => {
            left.cmp(right)
        }
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput> {
        self.record("get_item", 1)?;
        let key = input.key.unwrap_or_default();
        self.with_table(input.table_name.as_deref(), |table| {
            let item = table.position(&key).map(|position| table.items[position].clone());
            Ok(GetItemOutput::builder().set_item(item).build())
        })
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput> {
        self.record("put_item", 1)?;
        let item = input.item.unwrap_or_default();
        let guarded = input
            .condition_expression
            .is_some_and(|condition| condition.contains("attribute_not_exists"));
        self.with_table(input.table_name.as_deref(), |table| {
            match table.position(&item) {
                Some(_) if guarded => {
                    return Err(Error::ConditionalCheckFailed("item already exists".to_string()));
                }
                Some(position) => table.items[position] = item,
                None => table.items.push(item),
            }
            Ok(PutItemOutput::builder().build())
        })
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput> {
        self.record("update_item", 1)?;
        let key = input.key.unwrap_or_default();
        let names = input.expression_attribute_names.unwrap_or_default();
        let values = input.expression_attribute_values.unwrap_or_default();
        let expression = input.update_expression.unwrap_or_default();
        self.with_table(input.table_name.as_deref(), |table| {
            let position = match table.position(&key) {
                Some(position) => position,
                None => {
                    table.items.push(key.clone());
                    table.items.len() - 1
                }
            };
            let item = &mut table.items[position];
            let remove_at = expression.find("REMOVE ");
            let set_clause = expression
                .strip_prefix("SET ")
                .map(|rest| match rest.find(" REMOVE ") {
                    Some(end) => &rest[..end],
                    None => rest,
                })
                .unwrap_or_default();
            for assignment in set_clause.split(", ").filter(|part| !part.is_empty()) {
                if let Some((name, value)) = assignment.split_once(" = ") {
                    if let Some(value) = values.get(value) {
                        item.insert(resolve_name(Some(&names), name), value.clone());
                    }
                }
            }
            if let Some(remove_at) = remove_at {
                let remove_clause = &expression[remove_at + "REMOVE ".len()..];
                for name in remove_clause.split(", ") {
                    item.remove(&resolve_name(Some(&names), name.trim()));
                }
            }
            let attributes = match input.return_values {
                Some(types::ReturnValue::AllNew) => Some(item.clone()),
                _ => None,
            };
            Ok(UpdateItemOutput::builder().set_attributes(attributes).build())
        })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput> {
        self.record("delete_item", 1)?;
        let key = input.key.unwrap_or_default();
        self.with_table(input.table_name.as_deref(), |table| {
            let old = table
                .position(&key)
                .map(|position| table.items.remove(position));
            let attributes = match input.return_values {
                Some(types::ReturnValue::AllOld) => old,
                _ => None,
            };
            Ok(DeleteItemOutput::builder().set_attributes(attributes).build())
        })
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput> {
        self.record("query", 1)?;
        let names = input.expression_attribute_names.as_ref();
        let values = input.expression_attribute_values.unwrap_or_default();
        let key_condition = input.key_condition_expression.unwrap_or_default();
        let hash_condition = key_condition
            .split(" AND ")
            .next()
            .unwrap_or_default()
            .trim_matches(['(', ')']);
        let (hash_name, hash_value) = hash_condition
            .split_once(" = ")
            .ok_or_else(|| Error::Store(format!("unsupported key condition `{key_condition}`").into()))?;
        let hash_name = resolve_name(names, hash_name);
        let hash_value = values.get(hash_value).cloned();
        self.with_table(input.table_name.as_deref(), |table| {
            let mut items: Vec<_> = table
                .items
                .iter()
                .filter(|item| item.get(&hash_name) == hash_value.as_ref())
                .cloned()
                .collect();
            if let Some(range_key) = &table.range_key {
                items.sort_by(|left, right| compare(left.get(range_key), right.get(range_key)));
            }
            if input.scan_index_forward == Some(false) {
                items.reverse();
            }
            let (items, last_evaluated_key) =
                self.page(table, items, input.exclusive_start_key.as_ref(), input.limit);
            let count = items.len() as i32;
            Ok(QueryOutput::builder()
                .set_items(Some(items))
                .count(count)
                .scanned_count(count)
                .set_last_evaluated_key(last_evaluated_key)
                .build())
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput> {
        self.record("scan", 1)?;
        self.with_table(input.table_name.as_deref(), |table| {
            let items: Vec<_> = match (input.segment, input.total_segments) {
                (Some(segment), Some(total_segments)) => table
                    .items
                    .iter()
                    .enumerate()
                    .filter(|(index, _)| *index as i32 % total_segments == segment)
                    .map(|(_, item)| item.clone())
                    .collect(),
                _ => table.items.clone(),
            };
            let (items, last_evaluated_key) =
                self.page(table, items, input.exclusive_start_key.as_ref(), input.limit);
            let count = items.len() as i32;
            Ok(ScanOutput::builder()
                .set_items(Some(items))
                .count(count)
                .scanned_count(count)
                .set_last_evaluated_key(last_evaluated_key)
                .build())
        })
    }

    async fn batch_get_item(&self, input: BatchGetItemInput) -> Result<BatchGetItemOutput> {
        let mut responses = collections::HashMap::new();
        let mut unprocessed_keys = collections::HashMap::new();
        for (table_name, keys_and_attributes) in input.request_items.unwrap_or_default() {
            let mut keys = keys_and_attributes.keys;
            self.record("batch_get_item", keys.len())?;
            let leftover = keys.split_off(keys.len().saturating_sub(self.leftover()));
            let found = self.with_table(Some(table_name.as_str()), |table| {
                Ok(keys
                    .iter()
                    .filter_map(|key| table.position(key).map(|position| table.items[position].clone()))
                    .collect::<Vec<_>>())
            })?;
            responses.insert(table_name.clone(), found);
            if !leftover.is_empty() {
                let keys_and_attributes = types::KeysAndAttributes::builder()
                    .set_keys(Some(leftover))
                    .build()
                    .map_err(|error| Error::Store(error.into()))?;
                unprocessed_keys.insert(table_name, keys_and_attributes);
            }
        }
        Ok(BatchGetItemOutput::builder()
            .set_responses(Some(responses))
            .set_unprocessed_keys(Some(unprocessed_keys))
            .build())
    }

    async fn batch_write_item(&self, input: BatchWriteItemInput) -> Result<BatchWriteItemOutput> {
        let mut unprocessed_items = collections::HashMap::new();
        for (table_name, mut write_requests) in input.request_items.unwrap_or_default() {
            self.record("batch_write_item", write_requests.len())?;
            let leftover =
                write_requests.split_off(write_requests.len().saturating_sub(self.leftover()));
            self.with_table(Some(table_name.as_str()), |table| {
                for write_request in write_requests {
                    if let Some(put_request) = write_request.put_request {
                        match table.position(&put_request.item) {
                            Some(position) => table.items[position] = put_request.item,
                            None => table.items.push(put_request.item),
                        }
                    } else if let Some(delete_request) = write_request.delete_request {
                        if let Some(position) = table.position(&delete_request.key) {
                            table.items.remove(position);
                        }
                    }
                }
                Ok(())
            })?;
            if !leftover.is_empty() {
                unprocessed_items.insert(table_name, leftover);
            }
        }
        Ok(BatchWriteItemOutput::builder()
            .set_unprocessed_items(Some(unprocessed_items))
            .build())
    }
}
