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

//! Decompress-by-extension (§4.6), grounded in
//! `git_filter_tree/unpack.py::Unpack` and `madx_fatcutter.py`'s inline
//! `.gz` extraction: every blob whose name ends with a configured
//! extension is gunzipped and re-stored with the extension stripped;
//! `.gitattributes` patterns naming such a file are rewritten to match.

use std::io::Read;

use async_trait::async_trait;
use flate2::read::GzDecoder;

use filtertree_lib::Engine;
use filtertree_lib::Entry;
use filtertree_lib::EngineError;
use filtertree_lib::EngineResult;
use filtertree_lib::Filter;
use filtertree_lib::FilterError;
use filtertree_lib::Mode;
use filtertree_lib::Oid;
use filtertree_lib::RewriteOutcome;

use crate::gitattributes;

/// Gunzips every blob named `*<ext>` (default `.gz`) and drops the
/// extension from its name.
pub struct DecompressFilter {
    ext: String,
}

impl DecompressFilter {
    pub fn new(ext: impl Into<String>) -> Self {
        Self { ext: ext.into() }
    }
}

impl Default for DecompressFilter {
    fn default() -> Self {
        Self::new(".gz")
    }
}

#[async_trait]
impl Filter for DecompressFilter {
    type Key = (Oid, String, Mode);

    fn name(&self) -> &str {
        "decompress"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        (entry.oid.clone(), entry.name.clone(), entry.mode)
    }

    async fn rewrite_file(&self, ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        if entry.name == ".gitattributes" {
            return self.rewrite_gitattributes(ctx, entry).await;
        }
        let Some(stripped) = entry.name.strip_suffix(&self.ext) else {
            return Ok(RewriteOutcome::Keep);
        };
        let compressed = ctx.read_blob(&entry.oid).await?;
        let decompressed = gunzip(&entry.name, compressed)?;
        let new_oid = ctx.write_blob(&decompressed).await?;
        Ok(RewriteOutcome::Replace(Entry {
            name: stripped.to_string(),
            oid: new_oid,
            ..entry.clone()
        }))
    }
}

impl DecompressFilter {
    async fn rewrite_gitattributes(
        &self,
        ctx: &Engine<Self>,
        entry: &Entry,
    ) -> EngineResult<RewriteOutcome> {
        let bytes = ctx.read_blob(&entry.oid).await?;
        let text = String::from_utf8_lossy(&bytes);
        let ext = self.ext.clone();
        let rewritten = gitattributes::rewrite_lines(&text, |pattern| {
            Some(pattern.strip_suffix(ext.as_str()).unwrap_or(pattern).to_string())
        });
        if rewritten == text {
            return Ok(RewriteOutcome::Keep);
        }
        let new_oid = ctx.write_blob(rewritten.as_bytes()).await?;
        Ok(RewriteOutcome::Replace(entry.with_oid(new_oid)))
    }
}

fn gunzip(name: &str, compressed: Vec<u8>) -> EngineResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|err| {
        EngineError::Filter(FilterError {
            filter: "decompress".to_string(),
            path: name.to_string(),
            message: err.to_string(),
        })
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use filtertree_lib::backend::memory::MemoryStore;
    use filtertree_lib::Kind;
    use filtertree_lib::ObjectStore;
    use filtertree_lib::Scheduler;
    use std::io::Write;
    use std::sync::Arc;

    use super::*;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn strips_extension_and_decompresses_content() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let filter = Arc::new(DecompressFilter::default());
        let engine = Engine::new(store.clone(), scheduler.clone(), filter);

        scheduler.block_on(async {
            let compressed = gzip(b"hello world");
            let blob_oid = store.write_blob(&compressed).await.unwrap();
            let entry = Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: blob_oid,
                name: "data.gz".to_string(),
                path: filtertree_lib::EntryPath::root(),
            };
            let rewritten = engine.rewrite_object(entry).await.unwrap();
            assert_eq!(rewritten.len(), 1);
            assert_eq!(rewritten[0].name, "data");
            let content = store.read_blob(&rewritten[0].oid).await.unwrap();
            assert_eq!(content, b"hello world");
        });
    }

    #[test]
    fn non_matching_extension_is_a_fixed_point() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let filter = Arc::new(DecompressFilter::default());
        let engine = Engine::new(store.clone(), scheduler.clone(), filter);

        scheduler.block_on(async {
            let blob_oid = store.write_blob(b"plain").await.unwrap();
            let entry = Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: blob_oid.clone(),
                name: "data.txt".to_string(),
                path: filtertree_lib::EntryPath::root(),
            };
            let rewritten = engine.rewrite_object(entry).await.unwrap();
            assert_eq!(rewritten.len(), 1);
            assert_eq!(rewritten[0].oid, blob_oid);
            assert_eq!(rewritten[0].name, "data.txt");
        });
    }
}
