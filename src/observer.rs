//! Callback trait for per-request and per-attempt conversion events.
//!
//! Attach an [`Arc<dyn ConversionObserver>`] with
//! [`crate::Converter::with_observer`] to receive events as the pipeline
//! driver works through a strategy chain. The CLI uses this to drive its
//! spinner; tests use it to count attempts.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docconv::{ConversionAttempt, ConversionObserver};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingObserver {
//!     attempts: AtomicUsize,
//! }
//!
//! impl ConversionObserver for CountingObserver {
//!     fn on_attempt_complete(&self, attempt: &ConversionAttempt) {
//!         self.attempts.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} via {}: {:?}", attempt.strategy, attempt.engine, attempt.outcome);
//!     }
//! }
//! ```

use crate::format::Format;
use crate::pipeline::ConversionAttempt;
use std::sync::Arc;

/// Called by the pipeline driver as a request progresses.
///
/// Implementations must be `Send + Sync`: one observer is shared by every
/// concurrent request a [`crate::Converter`] handles. All methods have
/// default no-op implementations.
pub trait ConversionObserver: Send + Sync {
    /// Called once the request is validated and its workspace exists.
    fn on_conversion_start(&self, correlation_id: &str, source: Format, target: Format) {
        let _ = (correlation_id, source, target);
    }

    /// Called just before a strategy is invoked.
    ///
    /// # Arguments
    /// * `index`    — 0-based position in the chain
    /// * `strategy` — strategy name, e.g. `libreoffice`
    fn on_attempt_start(&self, index: usize, strategy: &str) {
        let _ = (index, strategy);
    }

    /// Called after each attempt with its outcome.
    fn on_attempt_complete(&self, attempt: &ConversionAttempt) {
        let _ = attempt;
    }

    /// Called once when the chain ends, whatever the outcome.
    ///
    /// # Arguments
    /// * `success`  — an artifact was produced
    /// * `attempts` — number of strategies that were invoked
    fn on_conversion_complete(&self, success: bool, attempts: usize) {
        let _ = (success, attempts);
    }
}

/// Observer that ignores every event. Used when none is attached.
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Shared observer handle as stored on [`crate::Converter`].
pub type Observer = Arc<dyn ConversionObserver>;
