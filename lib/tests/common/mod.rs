//! Shared test filters used across the integration suite: a pass-through
//! filter for fixed-point/structural-preservation properties, and a
//! counting filter for the memoization guarantee.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;

use filtertree_lib::Engine;
use filtertree_lib::Entry;
use filtertree_lib::EngineResult;
use filtertree_lib::Filter;
use filtertree_lib::Oid;
use filtertree_lib::RewriteOutcome;

/// Never changes anything. Used to assert the fixed-point and
/// structural-preservation properties of §8.
pub struct NoopFilter;

#[async_trait]
impl Filter for NoopFilter {
    type Key = Oid;

    fn name(&self) -> &str {
        "noop"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        entry.oid.clone()
    }

    async fn rewrite_file(&self, _ctx: &Engine<Self>, _entry: &Entry) -> EngineResult<RewriteOutcome> {
        Ok(RewriteOutcome::Keep)
    }
}

/// Counts how many times each fingerprint was actually rewritten, so tests
/// can assert "at most once per key" under concurrent discovery from
/// distinct roots.
pub struct CountingFilter {
    counts: Mutex<HashMap<Oid, usize>>,
    pub invocations: AtomicUsize,
}

impl CountingFilter {
    pub fn new() -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn max_invocations_for_any_key(&self) -> usize {
        self.counts.lock().unwrap().values().copied().max().unwrap_or(0)
    }
}

#[async_trait]
impl Filter for CountingFilter {
    type Key = Oid;

    fn name(&self) -> &str {
        "counting"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        entry.oid.clone()
    }

    async fn rewrite_file(&self, _ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        *self.counts.lock().unwrap().entry(entry.oid.clone()).or_insert(0) += 1;
        Ok(RewriteOutcome::Keep)
    }
}

/// Deletes any blob whose name ends in `.skip`, keeps everything else
/// unchanged. Used to check that surviving entries keep their relative
/// source order after deletion.
pub struct DropSuffixFilter {
    pub suffix: &'static str,
}

#[async_trait]
impl Filter for DropSuffixFilter {
    type Key = Oid;

    fn name(&self) -> &str {
        "drop-suffix"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        entry.oid.clone()
    }

    async fn rewrite_file(&self, _ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        if entry.name.ends_with(self.suffix) {
            Ok(RewriteOutcome::Delete)
        } else {
            Ok(RewriteOutcome::Keep)
        }
    }
}
