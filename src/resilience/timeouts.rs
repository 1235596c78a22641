//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap index calls with the local dispatch deadline
//! - Cancel the underlying call when the deadline fires
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped on
//!   expiry, so an HTTP call in flight is abandoned rather than leaked
//! - A timed-out call never produces a late result, so nothing late is cached
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use crate::index::types::{IndexError, IndexResult};

/// Run `fut` with a deadline, mapping expiry to `TransportTimeout`.
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> IndexResult<T>
where
    F: Future<Output = IndexResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(IndexError::TransportTimeout(deadline.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_passes_through_result() {
        let result = with_deadline(Duration::from_secs(1), async { Ok::<_, IndexError>(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_inner_future() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let result: IndexResult<()> = with_deadline(Duration::from_secs(25), async move {
            let _flag = flag;
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(IndexError::TransportTimeout(25_000)));
        assert!(dropped.load(Ordering::SeqCst), "inner call must be dropped");
    }
}
