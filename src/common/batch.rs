use crate::{
    common::{retry::RetryPolicy, selection::SelectionMap},
    error::{Error, Result},
};

use aws_sdk_dynamodb::types;
use futures::{StreamExt, TryStreamExt, stream};

/// Chunks issued concurrently when [`BatchOptions::concurrency`] is unset.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options of batch gets and batch writes.
///
/// ```rust
/// use dynamodb_mapper::common::{batch::BatchOptions, retry::RetryPolicy};
///
/// let options = BatchOptions {
///     concurrency: Some(2),
///     retry: Some(RetryPolicy::immediate(3)),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchOptions {
    /// Attributes to return from a batch get; key attributes are always added.
    pub attributes: Option<SelectionMap>,
    /// Items per request, lowered from the per-request cap.
    pub chunk_size: Option<usize>,
    /// Chunks in flight at once; defaults to [`DEFAULT_CONCURRENCY`].
    pub concurrency: Option<usize>,
    /// Strongly consistent batch get.
    pub consistent_read: Option<bool>,
    /// Overrides the model's retry policy for this call.
    pub retry: Option<RetryPolicy>,
    /// Whether to report consumed capacity.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

impl BatchOptions {
    pub(crate) fn chunk_size(&self, limit: usize) -> usize {
        self.chunk_size.unwrap_or(limit).clamp(1, limit)
    }

    pub(crate) fn concurrency(&self) -> usize {
        self.concurrency.unwrap_or(DEFAULT_CONCURRENCY).max(1)
    }
}

enum ChunkOutcome<T, R> {
    Done(Vec<R>),
    Exhausted { attempts: u32, unprocessed: Vec<T> },
}

/// What a batch achieved across all its chunks.
pub(crate) struct BatchOutcome<T, R> {
    pub(crate) attempts: u32,
    pub(crate) results: Vec<R>,
    pub(crate) unprocessed: Vec<T>,
}

/// Send one chunk, resending whatever the store left unprocessed.
///
/// `send` returns the results of one request and the work it did not process.
/// Transient failures of the whole request count as an attempt.
async fn drain<T, R, F, Fut>(policy: &RetryPolicy, chunk: Vec<T>, send: F) -> Result<ChunkOutcome<T, R>>
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(Vec<R>, Vec<T>)>>,
{
    let mut attempts = 0;
    let mut pending = chunk;
    let mut results = Vec::new();
    loop {
        attempts += 1;
        match send(pending.clone()).await {
            Ok((found, unprocessed)) => {
                results.extend(found);
                if unprocessed.is_empty() {
                    return Ok(ChunkOutcome::Done(results));
                }
                pending = unprocessed;
            }
            Err(Error::Transient(error)) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempts, %error, "batch request throttled");
                #[cfg(not(feature = "tracing"))]
                let _ = error;
            }
            Err(error) => return Err(error),
        }
        if !policy.allows(attempts) {
            return Ok(ChunkOutcome::Exhausted {
                attempts,
                unprocessed: pending,
            });
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(attempts, pending = pending.len(), "retrying unprocessed batch work");
        policy.backoff(attempts - 1).await;
    }
}

/// Issue `chunks` with bounded concurrency, each retried independently.
pub(crate) async fn run<T, R, F, Fut>(
    policy: &RetryPolicy,
    chunks: Vec<Vec<T>>,
    concurrency: usize,
    send: F,
) -> Result<BatchOutcome<T, R>>
where
    T: Clone,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(Vec<R>, Vec<T>)>>,
{
    let batch = BatchOutcome {
        attempts: 0,
        results: Vec::new(),
        unprocessed: Vec::new(),
    };
    // The first fatal error drops every chunk still in flight.
    stream::iter(chunks)
        .map(|chunk| drain(policy, chunk, &send))
        .buffer_unordered(concurrency)
        .try_fold(batch, |mut batch, outcome| async move {
            match outcome {
                ChunkOutcome::Done(results) => batch.results.extend(results),
                ChunkOutcome::Exhausted {
                    attempts,
                    unprocessed,
                } => {
                    batch.attempts = batch.attempts.max(attempts);
                    batch.unprocessed.extend(unprocessed);
                }
            }
            Ok(batch)
        })
        .await
}
