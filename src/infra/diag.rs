//! Run-wide diagnostic side channel.
//!
//! Every skipped input is explained on stderr exactly once per run, no matter
//! how many contexts reference it. Backed by `tracing`, so the primary
//! output stream stays machine-clean.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use crate::error::FoldError;

/// De-duplicating warning sink shared by the whole run.
#[derive(Debug, Default)]
pub struct Diagnostics
{
    /// Keys already reported
    seen: Mutex<HashSet<String>>,

    /// Number of distinct warnings emitted
    warnings: AtomicUsize,
}

impl Diagnostics
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Emit `message` unless a warning with the same `key` was already
    /// emitted. Returns true when the warning was emitted.
    pub fn warn_once(
        &self,
        key: impl Into<String>,
        message: impl Display,
    ) -> bool
    {
        let key = key.into();

        // A poisoned lock only means another thread panicked mid-insert
        let fresh = match self
            .seen
            .lock()
        {
            Ok(mut seen) => seen.insert(key),
            Err(poisoned) => poisoned
                .into_inner()
                .insert(key),
        };

        if fresh
        {
            self.warnings
                .fetch_add(1, Ordering::Relaxed);
            warn!("{message}");
        }
        fresh
    }

    /// Report a recoverable domain error, keyed by its rendering.
    pub fn report(
        &self,
        err: &FoldError,
    ) -> bool
    {
        let text = err.to_string();
        self.warn_once(text.clone(), text)
    }

    /// Distinct warnings emitted so far
    pub fn count(&self) -> usize
    {
        self.warnings
            .load(Ordering::Relaxed)
    }
}
