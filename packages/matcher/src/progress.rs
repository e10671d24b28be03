//! Batch progress hooks.
//!
//! The matcher only reports counts; rendering is left to the caller (the
//! CLI draws `indicatif` bars).

use std::sync::Arc;

/// Counts reported by a running batch.
///
/// `advance` is called from blocking worker tasks as chunks complete.
pub trait BatchProgress: Send + Sync {
    /// Number of items the batch will process.
    fn start(&self, total: u64);

    /// `count` more items are done.
    fn advance(&self, count: u64);

    /// The batch is over.
    fn finish(&self, summary: &str);
}

/// Discards all progress.
pub struct Quiet;

impl BatchProgress for Quiet {
    fn start(&self, _total: u64) {}
    fn advance(&self, _count: u64) {}
    fn finish(&self, _summary: &str) {}
}

#[must_use]
pub fn quiet() -> Arc<dyn BatchProgress> {
    Arc::new(Quiet)
}
