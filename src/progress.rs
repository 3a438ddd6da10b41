//! Progress-callback trait for per-file batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ServiceConfigBuilder::progress_callback`] to receive
//! events as a batch conversion works through the inbox.
//!
//! # Example
//!
//! ```rust
//! use heic2raster::{BatchProgressCallback, ServiceConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, source: &str, output: &str, bytes: u64) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{done}: {source} → {output} ({bytes} bytes)");
//!     }
//! }
//!
//! let config = ServiceConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each inbox entry.
///
/// Files are converted concurrently, so `on_file_*` may be called from
/// different tasks at once. Implementations must protect shared mutable
/// state (e.g. `Mutex`, `AtomicUsize`). All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after the inbox snapshot is taken.
    fn on_batch_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before the adapter is invoked for `source`.
    fn on_file_start(&self, source: &str) {
        let _ = source;
    }

    /// Called when `source` was converted and stored as `output`.
    fn on_file_complete(&self, source: &str, output: &str, bytes: u64) {
        let _ = (source, output, bytes);
    }

    /// Called when `source` failed; `error` is the human-readable reason.
    fn on_file_error(&self, source: &str, error: &str) {
        let _ = (source, error);
    }

    /// Called once after every entry has been attempted.
    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let _ = (total_files, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ServiceConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
