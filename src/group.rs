//! Task admission and fail-fast coordination for a single batch.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Error;

/// Coordinates the worker tasks of one batch.
///
/// A `Group` bounds how many tasks run at once, records the first failure,
/// and shares a single cancellation token between the driver, every spawned
/// task, and the caller-supplied workers. It holds no reference to worker
/// results; aggregation lives entirely in the wrappers built on top.
pub(crate) struct Group<E> {
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    first_error: Arc<Mutex<Option<Error<E>>>>,
    tasks: JoinSet<()>,
}

impl<E: Send + 'static> Group<E> {
    /// Creates a group running at most `limit` tasks concurrently.
    ///
    /// Limits of 0 and 1 both mean strictly sequential execution: no two
    /// worker bodies ever overlap in time. The token shared with workers is
    /// a child of `parent`, so an internal fail-fast cancellation never
    /// touches the caller's own token.
    pub(crate) fn new(parent: &CancellationToken, limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.clamp(1, Semaphore::MAX_PERMITS))),
            cancel: parent.child_token(),
            first_error: Arc::new(Mutex::new(None)),
            tasks: JoinSet::new(),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Waits until an execution slot is free, or the batch is cancelled.
    ///
    /// Returns `None` on cancellation. The select is biased so that a slot
    /// freed by a failing task is never handed out once the cancellation
    /// signal is already observable.
    pub(crate) async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => {
                // the semaphore is never closed
                permit.ok()
            }
        }
    }

    /// Spawns one worker task that holds `permit` for its whole run.
    ///
    /// The task re-checks cancellation before building the worker future: it
    /// may have been admitted in the window between a sibling's failure and
    /// the driver observing it, and skipping the worker avoids wasted work.
    pub(crate) fn spawn<F, Fut>(&mut self, permit: OwnedSemaphorePermit, work: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error<E>>> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let first_error = Arc::clone(&self.first_error);

        self.tasks.spawn(async move {
            let _permit = permit;

            if cancel.is_cancelled() {
                debug!("task admitted after cancellation, skipping worker");
                record_failure(&first_error, &cancel, Error::Cancelled);
                return;
            }

            if let Err(err) = work(cancel.clone()).await {
                record_failure(&first_error, &cancel, err);
            }
        });
    }

    /// Waits for every admitted task to finish, then yields the batch result.
    ///
    /// Only the first recorded error is surfaced; later errors from tasks
    /// that were already in flight are discarded. A caller-initiated
    /// cancellation with no worker failure surfaces as [`Error::Cancelled`].
    pub(crate) async fn wait(mut self) -> Result<(), Error<E>> {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(err) = joined {
                if err.is_panic() {
                    std::panic::resume_unwind(err.into_panic());
                }
            }
        }

        let first = self.first_error.lock().take();
        match first {
            Some(err) => Err(err),
            None if self.cancel.is_cancelled() => Err(Error::Cancelled),
            None => Ok(()),
        }
    }
}

/// Stores the first failure of the batch and fires the shared cancellation.
///
/// Setting the slot and cancelling happen under the same lock, so the token
/// is cancelled exactly once per batch and always by the recorded error.
fn record_failure<E>(
    slot: &Mutex<Option<Error<E>>>,
    cancel: &CancellationToken,
    err: Error<E>,
) {
    let mut first = slot.lock();
    if first.is_none() {
        debug!("recording first batch error, cancelling remaining work");
        *first = Some(err);
        cancel.cancel();
    }
}
