use crate::{
    common::condition::{FilterConditionChain, FilterConditionTarget, KeyCondition},
    error::{Error, Result},
    model::{IndexKind, Model},
    read::{
        common::{MultipleReadArgs, MultipleReadInput, multiple_read_methods},
        stream::{PageRequest, ResultStream},
    },
};

use aws_sdk_dynamodb::operation::scan::ScanInput;
use serde_json::Value;
use std::sync::Arc;

/// Full-table read, optionally split into segments.
///
/// ```rust,no_run
/// # async fn example(accounts: std::sync::Arc<dynamodb_mapper::model::Model>) -> dynamodb_mapper::error::Result<()> {
/// let response = accounts
///     .parallel_scan(4)
///     .where_("age")
///     .gte(18)
///     .load_all()
///     .exec_all()
///     .await?;
/// println!("{} adults", response.count);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use = "a scan does nothing until executed"]
pub struct Scan {
    args: MultipleReadArgs,
    model: Arc<Model>,
    parallel: Option<u32>,
    segments: Option<(i32, i32)>,
}

impl FilterConditionTarget for Scan {
    fn push_filter_condition(mut self, condition: KeyCondition<Value>) -> Self {
        self.args.filter_conditions.push(condition);
        self
    }
}

impl Model {
    /// Start a scan of the whole table.
    pub fn scan(self: &Arc<Self>) -> Scan {
        Scan {
            args: MultipleReadArgs::default(),
            model: Arc::clone(self),
            parallel: None,
            segments: None,
        }
    }

    /// Start a scan split into `total_segments` concurrent segment scans.
    pub fn parallel_scan(self: &Arc<Self>, total_segments: u32) -> Scan {
        Scan {
            parallel: Some(total_segments),
            ..self.scan()
        }
    }
}

impl Scan {
    /// Filter on any attribute; same as [`Self::filter`].
    pub fn where_(self, attribute: impl Into<String>) -> FilterConditionChain<Self> {
        FilterConditionChain::new(self, attribute)
    }

    /// Scan a declared secondary index instead of the table.
    pub fn using_index(mut self, name: impl Into<String>) -> Self {
        self.args.index_name = Some(name.into());
        self
    }

    /// Scan only `segment` out of `total_segments`.
    pub fn segments(mut self, segment: i32, total_segments: i32) -> Self {
        self.segments = Some((segment, total_segments));
        self
    }

    multiple_read_methods!();

    /// Compile and start streaming pages.
    ///
    /// A parallel scan merges its segment streams; every item is yielded once
    /// and the stream ends after the last segment ends.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_mapper.scan",
            skip(self),
            fields(model = self.model.name(), parallel = self.parallel),
            err
        )
    )]
    pub fn exec(self) -> Result<ResultStream> {
        let model = Arc::clone(&self.model);
        let load_all = self.args.load_all;
        let inputs = self.compile()?;
        let mut streams: Vec<_> = inputs
            .into_iter()
            .map(|input| ResultStream::paginate(Arc::clone(&model), PageRequest::Scan(input), load_all))
            .collect();
        match streams.len() {
            1 => Ok(streams.remove(0)),
            _ => Ok(ResultStream::merge(streams)),
        }
    }

    /// One input per issued segment stream.
    fn compile(self) -> Result<Vec<ScanInput>> {
        if let Some(index_name) = self.args.index_name.as_deref() {
            let index = self.model.index(index_name).ok_or_else(|| {
                Error::validation(format!(
                    "model `{}` has no index `{index_name}`",
                    self.model.name()
                ))
            })?;
            if index.kind == IndexKind::Global && self.args.consistent_read == Some(true) {
                return Err(Error::validation(format!(
                    "global index `{index_name}` does not support consistent reads"
                )));
            }
        }
        let segments: Vec<(Option<i32>, Option<i32>)> = match (self.segments, self.parallel) {
            (Some(_), Some(_)) => {
                return Err(Error::validation(
                    "`segments` and `parallel_scan` are mutually exclusive",
                ));
            }
            (Some((segment, total)), None) => {
                if total <= 0 || segment < 0 || segment >= total {
                    return Err(Error::validation(format!(
                        "segment {segment} is out of range for {total} total segments"
                    )));
                }
                vec![(Some(segment), Some(total))]
            }
            (None, Some(0)) => {
                return Err(Error::validation(
                    "a parallel scan needs at least one segment",
                ));
            }
            (None, Some(total)) => {
                let total = i32::try_from(total).map_err(|_| {
                    Error::validation(format!("{total} segments is too many"))
                })?;
                (0..total).map(|segment| (Some(segment), Some(total))).collect()
            }
            (None, None) => vec![(None, None)],
        };
        let input: MultipleReadInput = self
            .args
            .compile(self.model.table_name(), Default::default())?;
        let mut inputs = Vec::with_capacity(segments.len());
        for (segment, total_segments) in segments {
            let builder = ScanInput::builder()
                .set_segment(segment)
                .set_total_segments(total_segments);
            let input = crate::apply_multiple_read_operation!(builder, input.clone()).build()?;
            inputs.push(input);
        }
        Ok(inputs)
    }
}
