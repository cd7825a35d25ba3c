//! Global HTTP concurrency limiter.
//!
//! A semaphore-based limiter that constrains the total number of concurrent
//! tile and metadata requests across the whole batch run, not just within
//! one panorama. A large panorama needs hundreds of tile downloads; with a
//! full batch in flight the system could otherwise attempt tens of
//! thousands of concurrent connections.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Limits the total number of concurrent HTTP requests.
///
/// The limiter is the only shared mutable resource in the pipeline; every
/// download task acquires a permit before issuing its request and releases
/// it on drop.
#[derive(Debug)]
pub struct HttpConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_permits: usize,
}

impl HttpConcurrencyLimiter {
    /// Creates a new limiter with the specified maximum concurrent requests.
    ///
    /// # Panics
    ///
    /// Panics if `max_concurrent` is 0.
    pub fn new(max_concurrent: usize) -> Self {
        assert!(max_concurrent > 0, "max_concurrent must be > 0");

        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_permits: max_concurrent,
        }
    }

    /// Acquires a permit, waiting if the concurrency ceiling is reached.
    ///
    /// The permit is released when dropped.
    pub async fn acquire(&self) -> HttpPermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed unexpectedly");

        HttpPermit { _permit: permit }
    }

    /// Returns the maximum number of concurrent requests allowed.
    pub fn max_concurrent(&self) -> usize {
        self.max_permits
    }

    /// Returns the number of available permits.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// A permit for making an HTTP request.
///
/// While held, it counts against the global concurrency limit.
pub struct HttpPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_limiter() {
        let limiter = HttpConcurrencyLimiter::new(100);
        assert_eq!(limiter.max_concurrent(), 100);
        assert_eq!(limiter.available_permits(), 100);
    }

    #[test]
    #[should_panic(expected = "max_concurrent must be > 0")]
    fn test_zero_concurrency_panics() {
        HttpConcurrencyLimiter::new(0);
    }

    #[tokio::test]
    async fn test_acquire_releases_on_drop() {
        let limiter = HttpConcurrencyLimiter::new(2);

        {
            let _permit1 = limiter.acquire().await;
            assert_eq!(limiter.available_permits(), 1);

            {
                let _permit2 = limiter.acquire().await;
                assert_eq!(limiter.available_permits(), 0);
            }

            assert_eq!(limiter.available_permits(), 1);
        }

        assert_eq!(limiter.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_never_exceeds_limit() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let limiter = Arc::new(HttpConcurrencyLimiter::new(5));
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..20 {
            let limiter = Arc::clone(&limiter);
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire().await;
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 5);
        assert_eq!(limiter.available_permits(), 5);
    }
}
