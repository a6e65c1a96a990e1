//! Progress-callback trait for batch conversion events.
//!
//! Pass an [`Arc<dyn BatchProgressCallback>`] to
//! [`crate::batch::convert_batch`] to receive events as documents move
//! through the pool.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a terminal progress bar, a log, or their
//! own channel without the library knowing how the host application
//! communicates. The trait is `Send + Sync` because documents convert
//! concurrently.
//!
//! # Example
//!
//! ```rust
//! use mdpress::BatchProgressCallback;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, name: &str, pdf_len: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total} {name} ({pdf_len} bytes, item {index})");
//!     }
//! }
//!
//! let cb: Arc<dyn BatchProgressCallback> = Arc::new(CountingCallback {
//!     completed: AtomicUsize::new(0),
//! });
//! cb.on_batch_start(1);
//! ```

use std::sync::Arc;

/// Called by [`crate::batch::convert_batch`] as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_document_start`, `on_document_complete` and `on_document_error` may
/// be called concurrently for different documents. Protect shared mutable
/// state with `Mutex` or atomics.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is converted.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called once a pool instance has been acquired for a document.
    ///
    /// # Arguments
    /// * `index` — 0-indexed position in the batch
    /// * `name`  — caller-supplied document name
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document converted successfully.
    ///
    /// `pdf_len` is zero for `html_only` requests.
    fn on_document_complete(&self, index: usize, total: usize, name: &str, pdf_len: usize) {
        let _ = (index, total, name, pdf_len);
    }

    /// Called when a document failed.
    fn on_document_error(&self, index: usize, total: usize, name: &str, error: &str) {
        let _ = (index, total, name, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Shared handle type accepted by the batch API.
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: Mutex<Vec<String>>,
        successes: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _total: usize, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _index: usize, _total: usize, _name: &str, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _index: usize, _total: usize, name: &str, error: &str) {
            self.errors.lock().unwrap().push(format!("{name}: {error}"));
        }

        fn on_batch_complete(&self, _total: usize, success_count: usize) {
            self.successes.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(0, 2, "a.md");
        cb.on_document_complete(0, 2, "a.md", 42);
        cb.on_document_error(1, 2, "b.md", "boom");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start(0, 2, "a.md");
        tracker.on_document_complete(0, 2, "a.md", 100);
        tracker.on_document_start(1, 2, "b.md");
        tracker.on_document_error(1, 2, "b.md", "invalid input");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(
            tracker.errors.lock().unwrap().as_slice(),
            ["b.md: invalid input"]
        );
        assert_eq!(tracker.successes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_document_start(0, 10, "x");
    }
}
