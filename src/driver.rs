//! Fail-fast drivers that pump a lazy sequence into a task group.
//!
//! Both drivers share one engine: [`for_each`] iterates bare elements and
//! [`for_each_kv`] feeds it `(key, value)` pairs with an adapted worker
//! signature, so the admission and cancellation logic exists exactly once.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::group::Group;
use crate::Error;

/// Runs `worker` over every element of `seq` with at most `limit` concurrent
/// executions, returning the first error or `Ok(())` once all succeeded.
///
/// Elements are pulled lazily, one at a time; submission blocks while all
/// execution slots are busy. The first worker failure cancels the shared
/// token, which stops further submission and short-circuits admitted tasks
/// that have not started yet. The unvisited tail of the sequence is abandoned
/// without being drained, so infinite sequences are fine.
///
/// A `limit` of 0 or 1 guarantees strictly sequential execution: each worker
/// finishes before the next one starts. This function returns only after
/// every admitted task has completed, so once it returns no further worker
/// invocation can occur.
///
/// Cancelling `ctx` aborts the batch and surfaces [`Error::Cancelled`].
///
/// # Examples
///
/// ```rust
/// use pariter::{for_each, CancellationToken};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), pariter::Error<std::convert::Infallible>> {
/// let ctx = CancellationToken::new();
/// let sum = Arc::new(AtomicU32::new(0));
///
/// let total = Arc::clone(&sum);
/// for_each(&ctx, 1..=100u32, 8, move |_ctx, n| {
///     let total = Arc::clone(&total);
///     async move {
///         total.fetch_add(n, Ordering::Relaxed);
///         Ok(())
///     }
/// })
/// .await?;
///
/// assert_eq!(sum.load(Ordering::Relaxed), 5050);
/// # Ok(())
/// # }
/// ```
#[instrument(skip(ctx, seq, worker))]
pub async fn for_each<S, I, F, Fut, E>(
    ctx: &CancellationToken,
    seq: S,
    limit: usize,
    worker: F,
) -> Result<(), Error<E>>
where
    S: IntoIterator<Item = I>,
    I: Send + 'static,
    F: Fn(CancellationToken, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    let mut group = Group::new(ctx, limit);
    let worker = Arc::new(worker);
    let mut submitted = 0usize;

    for item in seq {
        // stop pulling the sequence once a sibling failed or the caller bailed
        if group.is_cancelled() {
            debug!(submitted, "group cancelled, abandoning sequence");
            break;
        }

        let Some(permit) = group.admit().await else {
            debug!(submitted, "group cancelled while waiting for a slot");
            break;
        };

        let worker = Arc::clone(&worker);
        group.spawn(permit, move |token| async move {
            worker(token, item).await.map_err(Error::Worker)
        });
        submitted += 1;
    }

    group.wait().await
}

/// [`for_each`] over a sequence of `(key, value)` pairs.
///
/// Identical contract and algorithm; the worker just receives the pair as two
/// arguments. Natural pairings (index plus element, map key plus value) are
/// common enough that callers should not have to zip them by hand.
pub async fn for_each_kv<S, K, V, F, Fut, E>(
    ctx: &CancellationToken,
    pairs: S,
    limit: usize,
    worker: F,
) -> Result<(), Error<E>>
where
    S: IntoIterator<Item = (K, V)>,
    K: Send + 'static,
    V: Send + 'static,
    F: Fn(CancellationToken, K, V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Send + 'static,
{
    for_each(ctx, pairs, limit, move |token, (key, value)| {
        worker(token, key, value)
    })
    .await
}
