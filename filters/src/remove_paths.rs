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

//! Remove-paths (§4.6), grounded in `git_filter_tree/rm.py::Rm`: deletes
//! any entry whose path is in a configured set, fixing up `.gitattributes`
//! patterns that named a removed path.

use std::collections::HashSet;

use async_trait::async_trait;

use filtertree_lib::Engine;
use filtertree_lib::Entry;
use filtertree_lib::EngineResult;
use filtertree_lib::Filter;
use filtertree_lib::Mode;
use filtertree_lib::Oid;
use filtertree_lib::RewriteOutcome;

use crate::gitattributes;

/// Deletes every entry whose `/`-joined contextual path is in `paths`.
pub struct RemovePathsFilter {
    paths: HashSet<String>,
}

impl RemovePathsFilter {
    pub fn new(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Filter for RemovePathsFilter {
    type Key = (Oid, String, Mode);

    fn name(&self) -> &str {
        "rm"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        (entry.oid.clone(), entry.name.clone(), entry.mode)
    }

    async fn rewrite_file(&self, ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        if self.paths.contains(&entry.path.to_string()) {
            return Ok(RewriteOutcome::Delete);
        }
        if entry.name == ".gitattributes" {
            return self.rewrite_gitattributes(ctx, entry).await;
        }
        Ok(RewriteOutcome::Keep)
    }
}

impl RemovePathsFilter {
    async fn rewrite_gitattributes(
        &self,
        ctx: &Engine<Self>,
        entry: &Entry,
    ) -> EngineResult<RewriteOutcome> {
        let bytes = ctx.read_blob(&entry.oid).await?;
        let text = String::from_utf8_lossy(&bytes);
        let rewritten = gitattributes::rewrite_lines(&text, |pattern| {
            if self.paths.contains(pattern) {
                None
            } else {
                Some(pattern.to_string())
            }
        });
        if rewritten == text {
            return Ok(RewriteOutcome::Keep);
        }
        let new_oid = ctx.write_blob(rewritten.as_bytes()).await?;
        Ok(RewriteOutcome::Replace(entry.with_oid(new_oid)))
    }
}

#[cfg(test)]
mod tests {
    use filtertree_lib::backend::memory::MemoryStore;
    use filtertree_lib::EntryPath;
    use filtertree_lib::Kind;
    use filtertree_lib::ObjectStore;
    use filtertree_lib::Scheduler;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn removes_a_configured_path() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let filter = Arc::new(RemovePathsFilter::new(["secrets.txt"]));
        let engine = Engine::new(store.clone(), scheduler.clone(), filter);

        scheduler.block_on(async {
            let blob_oid = store.write_blob(b"top secret").await.unwrap();
            let entry = Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: blob_oid,
                name: "secrets.txt".to_string(),
                path: EntryPath::root().join("secrets.txt"),
            };
            let rewritten = engine.rewrite_object(entry).await.unwrap();
            assert!(rewritten.is_empty());
        });
    }

    #[test]
    fn unrelated_path_is_kept() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let filter = Arc::new(RemovePathsFilter::new(["secrets.txt"]));
        let engine = Engine::new(store.clone(), scheduler.clone(), filter);

        scheduler.block_on(async {
            let blob_oid = store.write_blob(b"hello").await.unwrap();
            let entry = Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid: blob_oid.clone(),
                name: "readme.txt".to_string(),
                path: EntryPath::root().join("readme.txt"),
            };
            let rewritten = engine.rewrite_object(entry).await.unwrap();
            assert_eq!(rewritten.len(), 1);
            assert_eq!(rewritten[0].oid, blob_oid);
        });
    }
}
