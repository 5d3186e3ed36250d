//! Shutdown coordination for in-flight `ListBlog` streams.
//!
//! Unary calls finish on their own once the transport stops accepting
//! connections. Streams are different: a slow client can keep a feeder task
//! and its store cursor alive indefinitely. [`StreamTracker`] counts live
//! streams, refuses new requests once shutdown begins, and cancels whatever is
//! still running after the drain timeout.

use blog_tonic_core::Error;
use core::time::Duration;
use portable_atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::server::telemetry::{decrement_streams_inflight, increment_streams_inflight};

#[derive(Debug, Default)]
pub struct StreamTracker {
    closing: AtomicBool,
    inflight: AtomicUsize,
    shutdown_token: CancellationToken,
}

/// Marks one stream as in flight until dropped.
#[derive(Debug)]
pub struct StreamGuard {
    tracker: Arc<StreamTracker>,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.tracker.inflight.fetch_sub(1, Ordering::AcqRel);
        decrement_streams_inflight();
    }
}

impl StreamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`Error::ServiceShutdown`] once shutdown has begun.
    pub fn ensure_open(&self) -> Result<(), Error> {
        if self.closing.load(Ordering::Acquire) {
            return Err(Error::ServiceShutdown);
        }
        Ok(())
    }

    /// Registers a new stream. The stream counts as in flight until the guard
    /// is dropped.
    pub fn enter(self: &Arc<Self>) -> Result<StreamGuard, Error> {
        self.ensure_open()?;
        self.inflight.fetch_add(1, Ordering::AcqRel);
        increment_streams_inflight();
        Ok(StreamGuard {
            tracker: Arc::clone(self),
        })
    }

    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Token cancelled once the drain timeout expires.
    pub fn token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// Stops accepting requests, waits up to `drain_timeout` for live streams
    /// to finish, then cancels the rest.
    pub async fn shutdown(&self, drain_timeout: Duration) {
        // === Phase 0: Stop accepting new requests ===
        tracing::info!("Refusing new requests");
        self.closing.store(true, Ordering::Release);

        // === Phase 1: Wait for in-flight streams to drain ===
        tracing::info!("Draining in-flight streams ({} active)", self.inflight());
        let drain_result = timeout(drain_timeout, async {
            while self.inflight() > 0 {
                sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        match drain_result {
            Ok(()) => tracing::debug!("All in-flight streams drained successfully"),
            Err(_) => tracing::warn!(
                "Graceful drain timed out ({} streams still active)",
                self.inflight()
            ),
        }

        // === Phase 2: Cancel any remaining streams ===
        tracing::debug!("Cancelling remaining streams via shutdown token");
        self.shutdown_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tracks_inflight_streams() {
        let tracker = Arc::new(StreamTracker::new());
        let first = tracker.enter().unwrap();
        let second = tracker.enter().unwrap();
        assert_eq!(tracker.inflight(), 2);
        drop(first);
        assert_eq!(tracker.inflight(), 1);
        drop(second);
        assert_eq!(tracker.inflight(), 0);
    }

    #[tokio::test]
    async fn shutdown_refuses_new_streams_and_cancels() {
        let tracker = Arc::new(StreamTracker::new());
        tracker.shutdown(Duration::from_millis(10)).await;
        assert_eq!(tracker.enter().unwrap_err(), Error::ServiceShutdown);
        assert_eq!(tracker.ensure_open().unwrap_err(), Error::ServiceShutdown);
        assert!(tracker.token().is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_times_out_on_stuck_stream() {
        let tracker = Arc::new(StreamTracker::new());
        let _stuck = tracker.enter().unwrap();
        tracker.shutdown(Duration::from_millis(150)).await;
        assert_eq!(tracker.inflight(), 1);
        assert!(tracker.token().is_cancelled());
    }
}
