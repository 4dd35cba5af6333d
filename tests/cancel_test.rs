use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use pariter::{flat_map, for_each, CancellationToken};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("worker failed on {0}")]
struct WorkerFailed(i64);

#[tokio::test]
async fn pre_cancelled_token_runs_no_worker() {
    let ctx = CancellationToken::new();
    ctx.cancel();

    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let err = for_each(&ctx, 0..10i64, 4, move |_ctx, _n| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, WorkerFailed>(())
        }
    })
    .await
    .expect_err("batch must be cancelled");

    assert!(err.is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn caller_cancellation_stops_an_infinite_batch() {
    let ctx = CancellationToken::new();

    let timer = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        timer.cancel();
    });

    let err = for_each(&ctx, 0i64.., 2, |_ctx, _n| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, WorkerFailed>(())
    })
    .await
    .expect_err("batch must be cancelled");

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn internal_cancellation_does_not_touch_the_caller_token() {
    let ctx = CancellationToken::new();

    let err = for_each(&ctx, 0..10i64, 2, |_ctx, n| async move {
        if n == 0 {
            return Err(WorkerFailed(n));
        }
        Ok(())
    })
    .await
    .expect_err("worker fails on 0");

    assert_eq!(err.into_worker(), Some(WorkerFailed(0)));
    // fail-fast cancels a child token, never the one the caller handed in
    assert!(!ctx.is_cancelled());
}

#[tokio::test]
async fn workers_can_observe_a_sibling_failure() {
    let ctx = CancellationToken::new();
    let started = Instant::now();

    let err = flat_map(&ctx, vec![1i64, 2], 2, |token, n| async move {
        if n == 2 {
            return Err(WorkerFailed(n));
        }
        // bail out as soon as the sibling fails instead of sleeping out
        tokio::select! {
            () = token.cancelled() => Ok(Vec::new()),
            () = tokio::time::sleep(Duration::from_secs(30)) => Ok(vec![n]),
        }
    })
    .await
    .expect_err("worker fails on 2");

    assert_eq!(err.into_worker(), Some(WorkerFailed(2)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancelled_batch_reports_no_worker_error() {
    let ctx = CancellationToken::new();
    ctx.cancel();

    let err = flat_map(&ctx, 0..10i64, 4, |_ctx, n| async move {
        Ok::<_, WorkerFailed>(vec![n])
    })
    .await
    .expect_err("batch must be cancelled");

    assert!(err.is_cancelled());
    assert_eq!(err.into_worker(), None);
}
