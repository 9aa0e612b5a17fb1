//! Lazily paginated results of queries and scans.

use crate::{
    common::{self, AttributeMap},
    error::{Error, Result},
    model::{Item, Model},
    read,
    store::Store,
};

use aws_sdk_dynamodb::{
    operation::{query::QueryInput, scan::ScanInput},
    types,
};
use futures::{
    Stream, StreamExt, TryStreamExt,
    stream::{self, BoxStream},
};
use std::{
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

/// One page of decoded items.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// Items of the page, after filtering.
    pub items: Vec<Item>,
    /// Number of items after filtering.
    pub count: i32,
    /// Number of items read before filtering.
    pub scanned_count: i32,
    /// Where to resume; `None` once the result set is exhausted.
    pub last_evaluated_key: Option<common::Attributes>,
    /// Capacity consumed by the page request, when requested.
    pub consumed_capacity: Option<types::ConsumedCapacity>,
}

/// Every page of a stream merged into one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Response {
    /// Items of every page, in stream order.
    pub items: Vec<Item>,
    /// Sum of the page counts.
    pub count: i32,
    /// Sum of the page scanned counts.
    pub scanned_count: i32,
    /// Continuation key of the last page.
    pub last_evaluated_key: Option<common::Attributes>,
    /// Capacity consumed by every page request.
    pub consumed_capacity: Option<types::ConsumedCapacity>,
    /// Number of pages collected.
    pub pages: usize,
}

#[derive(Clone, Debug)]
pub(crate) enum PageRequest {
    Query(QueryInput),
    Scan(ScanInput),
}

struct RawPage {
    consumed_capacity: Option<types::ConsumedCapacity>,
    count: i32,
    items: Vec<AttributeMap>,
    last_evaluated_key: Option<AttributeMap>,
    scanned_count: i32,
}

impl PageRequest {
    fn set_exclusive_start_key(&mut self, key: Option<AttributeMap>) {
        match self {
            Self::Query(input) => input.exclusive_start_key = key,
            Self::Scan(input) => input.exclusive_start_key = key,
        }
    }

    fn set_limit(&mut self, limit: Option<i32>) {
        match self {
            Self::Query(input) => input.limit = limit,
            Self::Scan(input) => input.limit = limit,
        }
    }

    fn limit(&self) -> Option<i32> {
        match self {
            Self::Query(input) => input.limit,
            Self::Scan(input) => input.limit,
        }
    }

    async fn send(&self, store: &dyn Store) -> Result<RawPage> {
        let page = match self {
            Self::Query(input) => {
                let output = store.query(input.clone()).await?;
                RawPage {
                    consumed_capacity: output.consumed_capacity,
                    count: output.count,
                    items: output.items.unwrap_or_default(),
                    last_evaluated_key: output.last_evaluated_key,
                    scanned_count: output.scanned_count,
                }
            }
            Self::Scan(input) => {
                let output = store.scan(input.clone()).await?;
                RawPage {
                    consumed_capacity: output.consumed_capacity,
                    count: output.count,
                    items: output.items.unwrap_or_default(),
                    last_evaluated_key: output.last_evaluated_key,
                    scanned_count: output.scanned_count,
                }
            }
        };
        Ok(page)
    }
}

struct Cursor {
    load_all: bool,
    model: Arc<Model>,
    remaining: Option<i32>,
    request: PageRequest,
}

impl Cursor {
    async fn next_page(mut self) -> Option<(Result<Page>, Option<Self>)> {
        if let Some(remaining) = self.remaining {
            self.request.set_limit(Some(remaining));
        }
        let raw = {
            let request = &self.request;
            let store = self.model.store();
            self.model
                .retry()
                .retry_transient(move || request.send(store))
                .await
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(error) => return Some((Err(error), None)),
        };
        let last_evaluated_key = raw.last_evaluated_key.clone();
        let page = match self.decode(raw) {
            Ok(page) => page,
            Err(error) => return Some((Err(error), None)),
        };
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= page.count;
        }
        let next = match last_evaluated_key {
            Some(key) if self.load_all && self.remaining.is_none_or(|remaining| remaining > 0) => {
                self.request.set_exclusive_start_key(Some(key));
                Some(self)
            }
            _ => None,
        };
        Some((Ok(page), next))
    }

    fn decode(&self, raw: RawPage) -> Result<Page> {
        let items = raw
            .items
            .into_iter()
            .map(|item| self.model.decode(item))
            .collect::<Result<_>>()?;
        let last_evaluated_key = raw
            .last_evaluated_key
            .map(common::from_attribute_map)
            .transpose()?;
        Ok(Page {
            items,
            count: raw.count,
            scanned_count: raw.scanned_count,
            last_evaluated_key,
            consumed_capacity: raw.consumed_capacity,
        })
    }
}

/// Single-pass stream of result pages.
///
/// Pages are requested on demand: polling drives the next request, dropping
/// the stream stops issuing further requests. A failed page request ends
/// the stream after yielding its error.
#[must_use = "streams do nothing unless polled"]
pub struct ResultStream {
    inner: BoxStream<'static, Result<Page>>,
}

impl fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultStream").finish_non_exhaustive()
    }
}

impl Stream for ResultStream {
    type Item = Result<Page>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl ResultStream {
    /// Paginate `request`, following continuation keys when `load_all` is set.
    pub(crate) fn paginate(model: Arc<Model>, request: PageRequest, load_all: bool) -> Self {
        let cursor = Cursor {
            load_all,
            remaining: request.limit(),
            model,
            request,
        };
        let inner = stream::unfold(Some(cursor), |cursor| async move {
            cursor?.next_page().await
        })
        .boxed();
        Self { inner }
    }

    /// Interleave several streams, ending once all of them ended.
    pub(crate) fn merge(streams: Vec<Self>) -> Self {
        let inner = stream::select_all(streams.into_iter().map(|stream| stream.inner)).boxed();
        Self { inner }
    }

    /// Flatten pages into items.
    pub fn into_items(self) -> BoxStream<'static, Result<Item>> {
        self.inner
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok::<_, Error>)))
            .try_flatten()
            .boxed()
    }

    /// Drain the stream into a single response.
    pub async fn collect_response(self) -> Result<Response> {
        let (mut response, capacities) = self
            .inner
            .try_fold(
                (Response::default(), Vec::new()),
                |(mut response, mut capacities), page| async move {
                    response.items.extend(page.items);
                    response.count += page.count;
                    response.scanned_count += page.scanned_count;
                    response.last_evaluated_key = page.last_evaluated_key;
                    response.pages += 1;
                    capacities.extend(page.consumed_capacity);
                    Ok((response, capacities))
                },
            )
            .await?;
        response.consumed_capacity = read::common::aggregate_capacity(capacities);
        Ok(response)
    }
}
