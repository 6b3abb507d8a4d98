//! Progress-callback trait for per-file scan events.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::TrackerConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each uploaded statement.
//!
//! # Example
//!
//! ```rust
//! use subtrack::{ScanProgressCallback, TrackerConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     found: Arc<AtomicUsize>,
//! }
//!
//! impl ScanProgressCallback for CountingCallback {
//!     fn on_file_complete(&self, _index: usize, _total: usize, filename: &str, records: usize) {
//!         self.found.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("{filename}: {records} subscriptions");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     found: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = TrackerConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScanProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the scan pipeline as it processes each file.
///
/// All methods have default no-op implementations. With `concurrency > 1`
/// the per-file methods may be called from different tasks at once.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once before the first file is read.
    fn on_scan_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a file's text is extracted.
    ///
    /// `index` is 1-based.
    fn on_file_start(&self, index: usize, total_files: usize, filename: &str) {
        let _ = (index, total_files, filename);
    }

    /// Called when a file produced a usable answer (possibly zero records).
    fn on_file_complete(&self, index: usize, total_files: usize, filename: &str, records: usize) {
        let _ = (index, total_files, filename, records);
    }

    /// Called when a file's completion failed or came back malformed.
    fn on_file_error(&self, index: usize, total_files: usize, filename: &str, error: &str) {
        let _ = (index, total_files, filename, error);
    }

    /// Called once after every file has been attempted.
    fn on_scan_complete(&self, total_files: usize, total_records: usize) {
        let _ = (total_files, total_records);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TrackerConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;
