//! Result-aggregating wrappers over the drivers.
//!
//! Each wrapper is [`for_each`]/[`for_each_kv`] plus a shared container
//! behind a single mutex; they add no cancellation logic of their own. When
//! the batch fails, results merged by siblings that finished before the
//! cancellation are dropped: the caller sees either the full container or
//! the first error, never both.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::driver::{for_each, for_each_kv};
use crate::Error;

/// Maps every element of `seq` through `worker` and collects the outputs
/// into a `Vec`, at most `limit` workers at a time.
///
/// Exactly one output per input. Output order matches input order only when
/// `limit` is 0 or 1; under real concurrency the order follows completion.
///
/// # Examples
///
/// ```rust
/// use pariter::{map, CancellationToken};
///
/// # async fn example() -> Result<(), pariter::Error<std::convert::Infallible>> {
/// let ctx = CancellationToken::new();
///
/// let mut doubled = map(&ctx, vec![1, 2, 3], 2, |_ctx, n| async move {
///     Ok(n * 2)
/// })
/// .await?;
///
/// doubled.sort_unstable();
/// assert_eq!(doubled, vec![2, 4, 6]);
/// # Ok(())
/// # }
/// ```
pub async fn map<S, I, F, Fut, E, O>(
    ctx: &CancellationToken,
    seq: S,
    limit: usize,
    worker: F,
) -> Result<Vec<O>, Error<E>>
where
    S: IntoIterator<Item = I>,
    I: Send + 'static,
    F: Fn(CancellationToken, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    E: Send + 'static,
    O: Send + 'static,
{
    flat_map(ctx, seq, limit, move |token, item| {
        let fut = worker(token, item);
        async move { fut.await.map(|out| vec![out]) }
    })
    .await
}

/// Maps every element of `seq` through `worker` and flattens the produced
/// chunks into one `Vec`, at most `limit` workers at a time.
///
/// Each successful chunk is appended to the shared output under a lock; a
/// failing element contributes nothing and aborts the batch with its error.
pub async fn flat_map<S, I, F, Fut, E, O>(
    ctx: &CancellationToken,
    seq: S,
    limit: usize,
    worker: F,
) -> Result<Vec<O>, Error<E>>
where
    S: IntoIterator<Item = I>,
    I: Send + 'static,
    F: Fn(CancellationToken, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<O>, E>> + Send + 'static,
    E: Send + 'static,
    O: Send + 'static,
{
    let results = Arc::new(Mutex::new(Vec::new()));
    let merged = Arc::clone(&results);

    for_each(ctx, seq, limit, move |token, item| {
        let merged = Arc::clone(&merged);
        let fut = worker(token, item);
        async move {
            let chunk = fut.await?;
            merged.lock().extend(chunk);
            Ok(())
        }
    })
    .await?;

    Ok(into_container(results))
}

/// Runs `worker` over a sequence of `(key, value)` pairs and collects the
/// produced `(key, value)` outputs into a `HashMap`.
///
/// If two workers produce the same output key, whichever merge happens last
/// wins. Under concurrency there is no way of determining which that is, so
/// callers wanting a deterministic mapping must supply an injective key
/// function or run with `limit` 0 or 1.
pub async fn map_kv<S, K, V, F, Fut, E, K2, V2>(
    ctx: &CancellationToken,
    pairs: S,
    limit: usize,
    worker: F,
) -> Result<HashMap<K2, V2>, Error<E>>
where
    S: IntoIterator<Item = (K, V)>,
    K: Send + 'static,
    V: Send + 'static,
    F: Fn(CancellationToken, K, V) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(K2, V2), E>> + Send + 'static,
    E: Send + 'static,
    K2: Eq + Hash + Send + 'static,
    V2: Send + 'static,
{
    let results = Arc::new(Mutex::new(HashMap::new()));
    let merged = Arc::clone(&results);

    for_each_kv(ctx, pairs, limit, move |token, key, value| {
        let merged = Arc::clone(&merged);
        let fut = worker(token, key, value);
        async move {
            let (out_key, out_value) = fut.await?;
            merged.lock().insert(out_key, out_value);
            Ok(())
        }
    })
    .await?;

    Ok(into_container(results))
}

/// Recovers the container from its shared handle.
///
/// Every task has joined by the time the driver returns, so the `Arc` is
/// unique; the take-under-lock arm only exists to keep this infallible.
fn into_container<T: Default>(shared: Arc<Mutex<T>>) -> T {
    match Arc::try_unwrap(shared) {
        Ok(container) => container.into_inner(),
        Err(shared) => std::mem::take(&mut *shared.lock()),
    }
}
