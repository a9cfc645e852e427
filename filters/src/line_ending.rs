// Copyright 2021 The Jujutsu Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Line-ending normalization (§4.6), grounded in
//! `git_filter_tree/dos2unix.py::Dos2Unix`: blobs with a matching extension
//! are rewritten to strip trailing whitespace per line and collapse to a
//! single trailing newline. Already-normalized blobs are a fixed point —
//! the filter returns the original OID rather than re-writing identical
//! content.

use async_trait::async_trait;

use filtertree_lib::Engine;
use filtertree_lib::Entry;
use filtertree_lib::EngineResult;
use filtertree_lib::Filter;
use filtertree_lib::Mode;
use filtertree_lib::Oid;
use filtertree_lib::RewriteOutcome;

/// Normalizes line endings for blobs whose name ends with `ext`.
pub struct LineEndingFilter {
    ext: String,
}

impl LineEndingFilter {
    pub fn new(ext: impl Into<String>) -> Self {
        Self { ext: ext.into() }
    }
}

#[async_trait]
impl Filter for LineEndingFilter {
    type Key = (Oid, String, Mode);

    fn name(&self) -> &str {
        "dos2unix"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        (entry.oid.clone(), entry.name.clone(), entry.mode)
    }

    async fn rewrite_file(&self, ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        if !entry.name.ends_with(&self.ext) {
            return Ok(RewriteOutcome::Keep);
        }
        let text = ctx.read_blob(&entry.oid).await?;
        match normalize(&text) {
            None => Ok(RewriteOutcome::Keep),
            Some(normalized) => {
                let new_oid = ctx.write_blob(&normalized).await?;
                Ok(RewriteOutcome::Replace(entry.with_oid(new_oid)))
            }
        }
    }
}

/// Returns `None` if `text` already satisfies the invariant (ends with
/// exactly one trailing newline, no line has trailing whitespace before its
/// newline) — the fast path that makes normalization idempotent.
fn normalize(text: &[u8]) -> Option<Vec<u8>> {
    if text.is_empty() {
        return None;
    }
    if is_already_normalized(text) {
        return None;
    }
    let mut lines: Vec<&[u8]> = text.split(|&b| b == b'\n').collect();
    // `split` on a trailing '\n' yields one empty trailing element; drop it
    // along with any further trailing blank lines.
    while matches!(lines.last(), Some(line) if line.is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return Some(Vec::new());
    }
    let mut out = Vec::with_capacity(text.len());
    for line in lines {
        out.extend_from_slice(rstrip(line));
        out.push(b'\n');
    }
    Some(out)
}

fn is_already_normalized(text: &[u8]) -> bool {
    if !text.ends_with(b"\n") || text.ends_with(b"\n\n") {
        return false;
    }
    text.split(|&b| b == b'\n').all(|line| line == rstrip(line))
}

fn rstrip(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !b.is_ascii_whitespace())
        .map(|pos| pos + 1)
        .unwrap_or(0);
    &line[..end]
}

#[cfg(test)]
mod tests {
    use filtertree_lib::backend::memory::MemoryStore;
    use filtertree_lib::EntryPath;
    use filtertree_lib::Kind;
    use filtertree_lib::ObjectStore;
    use filtertree_lib::Scheduler;
    use std::sync::Arc;
    use test_case::test_case;

    use super::*;

    #[test_case(b"a\r\nb\r\n", Some(&b"a\nb\n"[..]); "crlf is normalized")]
    #[test_case(b"a   \nb\n", Some(&b"a\nb\n"[..]); "trailing spaces are stripped")]
    #[test_case(b"a\nb", Some(&b"a\nb\n"[..]); "missing trailing newline is added")]
    #[test_case(b"a\nb\n\n\n", Some(&b"a\nb\n"[..]); "extra trailing blank lines collapse")]
    #[test_case(b"a\nb\n", None; "already normalized is a fixed point")]
    #[test_case(b"", None; "empty blob is a fixed point")]
    #[test_case(b"a\xc2\xa0\nb\n", None; "trailing non-ascii whitespace is left intact")]
    fn normalize_cases(input: &[u8], expected: Option<&[u8]>) {
        assert_eq!(normalize(input).as_deref(), expected);
    }

    #[test]
    fn fixed_point_reuses_the_original_oid() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let filter = Arc::new(LineEndingFilter::new(".txt"));
        let engine = Engine::new(store.clone(), scheduler.clone(), filter);

        scheduler.block_on(async {
            let blob_oid = store.write_blob(b"already\nclean\n").await.unwrap();
            let entry = Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: blob_oid.clone(),
                name: "a.txt".to_string(),
                path: EntryPath::root().join("a.txt"),
            };
            let rewritten = engine.rewrite_object(entry).await.unwrap();
            assert_eq!(rewritten[0].oid, blob_oid);
        });
    }

    #[test]
    fn crlf_blob_is_rewritten() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let filter = Arc::new(LineEndingFilter::new(".txt"));
        let engine = Engine::new(store.clone(), scheduler.clone(), filter);

        scheduler.block_on(async {
            let blob_oid = store.write_blob(b"a\r\nb  \r\n").await.unwrap();
            let entry = Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: blob_oid.clone(),
                name: "a.txt".to_string(),
                path: EntryPath::root().join("a.txt"),
            };
            let rewritten = engine.rewrite_object(entry).await.unwrap();
            assert_ne!(rewritten[0].oid, blob_oid);
            let content = store.read_blob(&rewritten[0].oid).await.unwrap();
            assert_eq!(content, b"a\nb\n");
        });
    }
}
