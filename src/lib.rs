//! # pariter
//!
//! Bounded-concurrency, fail-fast iteration primitives for Tokio.
//!
//! ## Overview
//!
//! Given a lazy sequence of elements (or key/value pairs) and a per-element
//! async worker, `pariter` runs the worker over every element with at most
//! `limit` concurrent executions, collects the results, and aborts the whole
//! batch as soon as any worker fails or the caller cancels. A batch either
//! produces all of its results or the first error, never a partial
//! container.
//!
//! ## Quick Start
//!
//! ```rust
//! use pariter::{flat_map, CancellationToken};
//!
//! # async fn example() -> Result<(), pariter::Error<std::convert::Infallible>> {
//! let ctx = CancellationToken::new();
//!
//! // Keep the odd numbers, four workers at a time.
//! let odds = flat_map(&ctx, 1..=10u32, 4, |_ctx, n| async move {
//!     Ok(if n % 2 == 1 { vec![n] } else { Vec::new() })
//! })
//! .await?;
//!
//! assert_eq!(odds.len(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Guarantees
//!
//! - **Bounded concurrency**: at most `limit` workers run at any instant; a
//!   limit of 0 or 1 means strictly sequential execution, in sequence order.
//! - **Fail-fast**: the first worker failure cancels the shared token, stops
//!   further submission, and is the only error surfaced to the caller.
//! - **Cooperative cancellation**: cancelling the caller's token stops the
//!   batch at the next admission point; in-flight workers observe the same
//!   token and may bail out early.
//! - **Lazy sequences**: elements are pulled one at a time, so infinite
//!   sequences work; the unvisited tail is abandoned, never drained.
//!
//! ## Operations
//!
//! - [`for_each`] / [`for_each_kv`]: run a side-effecting worker over every
//!   element or pair.
//! - [`map`] / [`flat_map`]: collect one output (or a chunk of outputs) per
//!   element into a `Vec`.
//! - [`map_kv`]: collect `(key, value)` outputs into a `HashMap`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

use thiserror::Error as ThisError;

mod collect;
mod driver;
mod group;

pub use collect::{flat_map, map, map_kv};
pub use driver::{for_each, for_each_kv};

/// Cancellation token handed to every worker, re-exported for convenience.
pub use tokio_util::sync::CancellationToken;

/// Error returned by a batch.
///
/// Exactly one error is surfaced per invocation: the first one recorded, by
/// sequence order under sequential execution and by completion order under
/// concurrent execution.
#[derive(Debug, ThisError)]
pub enum Error<E> {
    /// The first worker failure observed, surfaced verbatim.
    #[error(transparent)]
    Worker(E),

    /// The batch was cancelled before this work ran, either by a sibling
    /// failure or by the caller's own token.
    #[error("batch cancelled before the worker ran")]
    Cancelled,
}

impl<E> Error<E> {
    /// Whether the batch was aborted by cancellation rather than by a worker.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Extracts the worker error, if one aborted the batch.
    pub fn into_worker(self) -> Option<E> {
        match self {
            Self::Worker(err) => Some(err),
            Self::Cancelled => None,
        }
    }
}
