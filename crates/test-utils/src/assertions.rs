//! Polling helpers for state that settles asynchronously.
//!
//! Both helpers check once more after the deadline, so a condition that turns
//! true just as time runs out still counts.

use std::{future::Future, time::Duration};

use tokio::time::{sleep, Instant};

const POLL_EVERY: Duration = Duration::from_millis(10);

/// Returns `true` once `condition` holds, or `false` if it still does not
/// after `timeout`.
///
/// ```no_run
/// use std::{
///     sync::atomic::{AtomicUsize, Ordering},
///     time::Duration,
/// };
///
/// use fingerprint_portal_test_utils::assert_eventually;
///
/// # async fn demo(enrollments: &AtomicUsize) {
/// let enrolled =
///     assert_eventually(Duration::from_secs(1), || enrollments.load(Ordering::SeqCst) == 1).await;
/// assert!(enrolled);
/// # }
/// ```
pub async fn assert_eventually<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    assert_eventually_async(timeout, || std::future::ready(condition())).await
}

/// Like [`assert_eventually`] for a condition that has to await, such as a
/// request to the backend. Time spent inside the condition counts against
/// `timeout`.
pub async fn assert_eventually_async<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return condition().await;
        }
        sleep(POLL_EVERY).await;
    }
}
