//! Batch conversion: many documents through one pool.
//!
//! ## Why stream?
//!
//! Rendering a long report takes seconds. [`convert_batch`] yields each
//! document's outcome as soon as it finishes, so callers can write files
//! and update progress bars incrementally instead of waiting for the
//! slowest document.
//!
//! At most `pool.capacity()` documents are in flight; the rest wait in the
//! stream, not in the pool's acquire queue. Outcomes arrive in completion
//! order; sort by [`BatchOutcome::index`] if order matters.

use crate::context::Context;
use crate::convert::Converter;
use crate::error::{BatchError, ConvertError};
use crate::input::{ConversionInput, ConversionResult};
use crate::pool::Pool;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// One document in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Label used in progress events and logs (typically the file name).
    pub name: String,
    pub input: ConversionInput,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, input: ConversionInput) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

/// Result for one [`BatchItem`].
#[derive(Debug)]
pub struct BatchOutcome {
    /// Position of the item in the input `Vec`.
    pub index: usize,
    pub name: String,
    pub result: Result<ConversionResult, BatchError>,
}

/// A boxed stream of per-document outcomes.
pub type BatchStream = Pin<Box<dyn Stream<Item = BatchOutcome> + Send>>;

/// Convert `items` concurrently over `pool`, streaming outcomes as they
/// complete.
///
/// A failed document never stops the batch. Cancelling `ctx` fails every
/// document that has not finished with a cancellation error.
pub fn convert_batch(
    pool: &Pool<Converter>,
    ctx: &Context,
    items: Vec<BatchItem>,
    progress: Option<ProgressCallback>,
) -> BatchStream {
    let total = items.len();
    let concurrency = pool.capacity();
    let progress = progress.unwrap_or_else(|| Arc::new(NoopProgressCallback));
    let successes = Arc::new(AtomicUsize::new(0));

    info!(total, concurrency, "Starting batch conversion");
    progress.on_batch_start(total);

    let outcomes = {
        let pool = pool.clone();
        let ctx = ctx.clone();
        let progress = Arc::clone(&progress);
        let successes = Arc::clone(&successes);

        stream::iter(items.into_iter().enumerate())
            .map(move |(index, item)| {
                let pool = pool.clone();
                let ctx = ctx.clone();
                let progress = Arc::clone(&progress);
                let successes = Arc::clone(&successes);
                async move {
                    let result = convert_one(&pool, &ctx, index, total, &item, &progress).await;
                    match &result {
                        Ok(out) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                            progress.on_document_complete(index, total, &item.name, out.pdf.len());
                        }
                        Err(e) => {
                            warn!(document = %item.name, error = %e, "Document failed");
                            progress.on_document_error(index, total, &item.name, &e.to_string());
                        }
                    }
                    BatchOutcome {
                        index,
                        name: item.name,
                        result,
                    }
                }
            })
            .buffer_unordered(concurrency)
    };

    // Fires once the last outcome has been yielded; produces no item.
    let finished = stream::once(async move {
        let ok = successes.load(Ordering::SeqCst);
        info!(total, succeeded = ok, "Batch conversion complete");
        progress.on_batch_complete(total, ok);
    })
    .filter_map(|()| futures::future::ready(None::<BatchOutcome>));

    Box::pin(outcomes.chain(finished))
}

async fn convert_one(
    pool: &Pool<Converter>,
    ctx: &Context,
    index: usize,
    total: usize,
    item: &BatchItem,
    progress: &ProgressCallback,
) -> Result<ConversionResult, BatchError> {
    ctx.check().map_err(ConvertError::from)?;
    let lease = tokio::select! {
        lease = pool.acquire() => lease?,
        err = ctx.done() => return Err(ConvertError::Cancelled(err).into()),
    };
    progress.on_document_start(index, total, &item.name);

    let result = lease.convert(ctx, &item.input).await;
    lease.release();
    Ok(result?)
}

/// Drive [`convert_batch`] to completion and return outcomes in input order.
pub async fn collect_batch(
    pool: &Pool<Converter>,
    ctx: &Context,
    items: Vec<BatchItem>,
    progress: Option<ProgressCallback>,
) -> Vec<BatchOutcome> {
    let mut outcomes: Vec<BatchOutcome> = convert_batch(pool, ctx, items, progress)
        .collect()
        .await;
    outcomes.sort_by_key(|o| o.index);
    outcomes
}
