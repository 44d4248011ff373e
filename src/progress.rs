//! Progress-callback trait for per-preset conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe
//! the orchestrator walking its decoder presets.
//!
//! # Example
//!
//! ```rust
//! use dng2png::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failures: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_preset_failed(&self, index: usize, name: &str, reason: &str) {
//!         self.failures.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("preset #{index} ({name}) failed: {reason}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { failures: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it tries each decoder preset.
///
/// Presets run on a blocking worker thread, so implementations must be
/// `Send + Sync`. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called before the decoder is invoked with preset `index` (0-based).
    fn on_preset_start(&self, index: usize, name: &str) {
        let _ = (index, name);
    }

    /// Called when preset `index` produced no usable output.
    fn on_preset_failed(&self, index: usize, name: &str, reason: &str) {
        let _ = (index, name, reason);
    }

    /// Called once every preset has failed and the container fallback starts.
    fn on_fallback_start(&self) {}

    /// Called after the PNG has been written.
    fn on_conversion_complete(&self, output_bytes: u64) {
        let _ = output_bytes;
    }
}

/// Shared handle stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// A callback that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}
