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

//! Subdirectory-to-submodule (§4.6), grounded in
//! `git_filter_tree/dir2mod.py::Dir2Mod`: replaces one configured subtree
//! with a submodule link entry pointing at a commit looked up from a
//! treemap directory, and maintains a top-level `.gitmodules` stanza.
//!
//! Unlike the Python original's `multiprocessing.Manager().dict()` side
//! channel for tracking which trees contain the target folder, this
//! implementation re-walks the already-rewritten root tree along the
//! configured folder path to decide whether to inject `.gitmodules` —
//! simpler, and free of the shared mutable state the original needed only
//! because of its process-pool executor (see DESIGN.md).

use std::path::PathBuf;

use async_trait::async_trait;

use filtertree_lib::Engine;
use filtertree_lib::Entry;
use filtertree_lib::EngineError;
use filtertree_lib::EngineResult;
use filtertree_lib::EntryPath;
use filtertree_lib::Filter;
use filtertree_lib::FilterError;
use filtertree_lib::Kind;
use filtertree_lib::Mode;
use filtertree_lib::Oid;
use filtertree_lib::RewriteOutcome;

pub struct SubmoduleFilter {
    treemap_dir: PathBuf,
    folder: Vec<String>,
    url: String,
    submodule_name: String,
}

impl SubmoduleFilter {
    pub fn new(
        treemap_dir: impl Into<PathBuf>,
        folder: &str,
        url: impl Into<String>,
        submodule_name: Option<String>,
    ) -> Self {
        let folder_components: Vec<String> = folder.split('/').map(str::to_string).collect();
        let submodule_name = submodule_name.unwrap_or_else(|| folder.to_string());
        Self {
            treemap_dir: treemap_dir.into(),
            folder: folder_components,
            url: url.into(),
            submodule_name,
        }
    }

    /// True for the root (`[]`) and for every tree on the path down to
    /// `self.folder`, exclusive of the folder itself — the only trees the
    /// filter needs to recurse into.
    fn on_path_to_folder(&self, path: &EntryPath) -> bool {
        let components = path.components();
        components.len() < self.folder.len() && self.folder[..components.len()] == *components
    }

    fn is_folder(&self, path: &EntryPath) -> bool {
        path.components() == self.folder.as_slice()
    }

    async fn lookup_target(&self, ctx: &Engine<Self>, tree_oid: Oid) -> EngineResult<Oid> {
        let path = self.treemap_dir.join(tree_oid.hex());
        ctx.scheduler()
            .spawn_blocking(move || -> EngineResult<Oid> {
                let contents = std::fs::read_to_string(&path)?;
                Oid::from_hex(contents.trim()).map_err(|err| {
                    EngineError::Filter(FilterError {
                        filter: "submodule".to_string(),
                        path: path.display().to_string(),
                        message: err.to_string(),
                    })
                })
            })
            .await
    }

    /// Walks down from `root_oid` along `self.folder`'s path components and
    /// reports whether the entry at the end of that path is the submodule
    /// link `rewrite_tree` creates. `.gitmodules` only needs injecting at
    /// the root, but the folder itself can be nested arbitrarily deep
    /// (`vendor/thing`), so checking the root tree's immediate entries isn't
    /// enough — the link lives inside the `vendor` subtree, not at the root.
    async fn submodule_present_at_folder(&self, ctx: &Engine<Self>, root_oid: &Oid) -> EngineResult<bool> {
        let mut current_oid = root_oid.clone();
        for (i, component) in self.folder.iter().enumerate() {
            let entries = ctx.read_tree(&current_oid).await?;
            let Some(found) = entries.iter().find(|e| &e.name == component) else {
                return Ok(false);
            };
            if i + 1 == self.folder.len() {
                return Ok(found.mode == Mode::SUBMODULE && found.kind == Kind::Commit);
            }
            if found.kind != Kind::Tree {
                return Ok(false);
            }
            current_oid = found.oid.clone();
        }
        Ok(false)
    }

    async fn ensure_gitmodules(
        &self,
        ctx: &Engine<Self>,
        root_entry: &Entry,
        outcome: RewriteOutcome,
    ) -> EngineResult<RewriteOutcome> {
        let new_oid = match &outcome {
            RewriteOutcome::Keep => root_entry.oid.clone(),
            RewriteOutcome::Replace(new_entry) => new_entry.oid.clone(),
            RewriteOutcome::Delete | RewriteOutcome::Expand(_) => {
                unreachable!("a root tree rewrite always yields Keep or Replace")
            }
        };
        let mut entries = ctx.read_tree(&new_oid).await?;
        if !self.submodule_present_at_folder(ctx, &new_oid).await? {
            return Ok(outcome);
        }

        let stanza = format!(
            "[submodule \"{}\"]\n\tpath = {}\n\turl = {}\n",
            self.submodule_name,
            self.folder.join("/"),
            self.url,
        );
        if let Some(existing) = entries.iter_mut().find(|e| e.name == ".gitmodules") {
            let mut text = ctx.read_blob(&existing.oid).await?;
            if !text.ends_with(b"\n") {
                text.push(b'\n');
            }
            text.extend_from_slice(stanza.as_bytes());
            existing.oid = ctx.write_blob(&text).await?;
        } else {
            let oid = ctx.write_blob(stanza.as_bytes()).await?;
            entries.push(Entry {
                mode: Mode::REGULAR,
                kind: Kind::Blob,
                oid,
                name: ".gitmodules".to_string(),
                path: root_entry.path.join(".gitmodules"),
            });
        }
        let new_tree_oid = ctx.write_tree(&entries).await?;
        Ok(RewriteOutcome::Replace(root_entry.with_oid(new_tree_oid)))
    }
}

#[async_trait]
impl Filter for SubmoduleFilter {
    type Key = (Oid, EntryPath);

    fn name(&self) -> &str {
        "dir2mod"
    }

    fn depends(&self, entry: &Entry) -> Self::Key {
        (entry.oid.clone(), entry.path.clone())
    }

    async fn rewrite_file(&self, _ctx: &Engine<Self>, _entry: &Entry) -> EngineResult<RewriteOutcome> {
        Ok(RewriteOutcome::Keep)
    }

    async fn rewrite_tree(&self, ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        if self.is_folder(&entry.path) {
            let target = self.lookup_target(ctx, entry.oid.clone()).await?;
            return Ok(RewriteOutcome::Replace(Entry {
                mode: Mode::SUBMODULE,
                kind: Kind::Commit,
                oid: target,
                name: entry.name.clone(),
                path: entry.path.clone(),
            }));
        }
        if !self.on_path_to_folder(&entry.path) {
            return Ok(RewriteOutcome::Keep);
        }
        let outcome = ctx.rewrite_tree_generic(entry).await?;
        if entry.path.is_root() {
            return self.ensure_gitmodules(ctx, entry, outcome).await;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use filtertree_lib::backend::memory::MemoryStore;
    use filtertree_lib::ObjectStore;
    use filtertree_lib::Scheduler;
    use std::sync::Arc;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn replaces_the_configured_folder_and_adds_gitmodules() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

        let treemap_dir = tempdir().unwrap();
        let target_commit = Oid::from_bytes(vec![0xaa, 0xbb]);

        scheduler.block_on(async {
            let file_oid = store.write_blob(b"vendored code").await.unwrap();
            let vendor_tree_oid = store
                .write_tree(&[Entry {
                    mode: Mode::REGULAR,
                    kind: Kind::Blob,
                    oid: file_oid,
                    name: "lib.rs".to_string(),
                    path: EntryPath::root(),
                }])
                .await
                .unwrap();

            std::fs::write(treemap_dir.path().join(vendor_tree_oid.hex()), target_commit.hex())
                .unwrap();

            let other_file = store.write_blob(b"app code").await.unwrap();
            let root_tree_oid = store
                .write_tree(&[
                    Entry {
                        mode: Mode::TREE,
                        kind: Kind::Tree,
                        oid: vendor_tree_oid,
                        name: "vendor".to_string(),
                        path: EntryPath::root(),
                    },
                    Entry {
                        mode: Mode::REGULAR,
                        kind: Kind::Blob,
                        oid: other_file,
                        name: "main.rs".to_string(),
                        path: EntryPath::root(),
                    },
                ])
                .await
                .unwrap();

            let filter = Arc::new(SubmoduleFilter::new(
                treemap_dir.path(),
                "vendor",
                "https://example.com/vendor.git",
                None,
            ));
            let engine = Engine::new(store.clone(), scheduler.clone(), filter);

            let new_root = engine.rewrite_root(root_tree_oid.clone()).await.unwrap();
            assert_ne!(new_root, root_tree_oid);

            let new_entries = store.read_tree(&new_root).await.unwrap();
            let vendor_entry = new_entries.iter().find(|e| e.name == "vendor").unwrap();
            assert_eq!(vendor_entry.mode, Mode::SUBMODULE);
            assert_eq!(vendor_entry.oid, target_commit);

            let gitmodules = new_entries.iter().find(|e| e.name == ".gitmodules").unwrap();
            let text = String::from_utf8(store.read_blob(&gitmodules.oid).await.unwrap()).unwrap();
            assert!(text.contains("[submodule \"vendor\"]"));
            assert!(text.contains("url = https://example.com/vendor.git"));
        });
    }

    #[test]
    fn nested_folder_still_gets_a_root_gitmodules_stanza() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());

        let treemap_dir = tempdir().unwrap();
        let target_commit = Oid::from_bytes(vec![0xcc, 0xdd]);

        scheduler.block_on(async {
            let file_oid = store.write_blob(b"vendored code").await.unwrap();
            let thing_tree_oid = store
                .write_tree(&[Entry {
                    mode: Mode::REGULAR,
                    kind: Kind::Blob,
                    oid: file_oid,
                    name: "lib.rs".to_string(),
                    path: EntryPath::root(),
                }])
                .await
                .unwrap();

            std::fs::write(treemap_dir.path().join(thing_tree_oid.hex()), target_commit.hex())
                .unwrap();

            let vendor_tree_oid = store
                .write_tree(&[Entry {
                    mode: Mode::TREE,
                    kind: Kind::Tree,
                    oid: thing_tree_oid,
                    name: "thing".to_string(),
                    path: EntryPath::root(),
                }])
                .await
                .unwrap();

            let root_tree_oid = store
                .write_tree(&[Entry {
                    mode: Mode::TREE,
                    kind: Kind::Tree,
                    oid: vendor_tree_oid,
                    name: "vendor".to_string(),
                    path: EntryPath::root(),
                }])
                .await
                .unwrap();

            let filter = Arc::new(SubmoduleFilter::new(
                treemap_dir.path(),
                "vendor/thing",
                "https://example.com/thing.git",
                None,
            ));
            let engine = Engine::new(store.clone(), scheduler.clone(), filter);

            let new_root = engine.rewrite_root(root_tree_oid.clone()).await.unwrap();
            assert_ne!(new_root, root_tree_oid);

            let new_entries = store.read_tree(&new_root).await.unwrap();
            let gitmodules = new_entries
                .iter()
                .find(|e| e.name == ".gitmodules")
                .expect("root must carry a .gitmodules stanza for a nested submodule path");
            let text = String::from_utf8(store.read_blob(&gitmodules.oid).await.unwrap()).unwrap();
            assert!(text.contains("path = vendor/thing"));
            assert!(text.contains("url = https://example.com/thing.git"));

            let vendor_entries = store
                .read_tree(&new_entries.iter().find(|e| e.name == "vendor").unwrap().oid)
                .await
                .unwrap();
            let thing_entry = vendor_entries.iter().find(|e| e.name == "thing").unwrap();
            assert_eq!(thing_entry.mode, Mode::SUBMODULE);
            assert_eq!(thing_entry.oid, target_commit);
        });
    }

    #[test]
    fn tree_without_the_folder_is_a_fixed_point() {
        let scheduler = Arc::new(Scheduler::new(Some(1)).unwrap());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let treemap_dir = tempdir().unwrap();

        scheduler.block_on(async {
            let other_file = store.write_blob(b"app code").await.unwrap();
            let root_tree_oid = store
                .write_tree(&[Entry {
                    mode: Mode::REGULAR,
                    kind: Kind::Blob,
                    oid: other_file,
                    name: "main.rs".to_string(),
                    path: EntryPath::root(),
                }])
                .await
                .unwrap();

            let filter = Arc::new(SubmoduleFilter::new(
                treemap_dir.path(),
                "vendor",
                "https://example.com/vendor.git",
                None,
            ));
            let engine = Engine::new(store.clone(), scheduler.clone(), filter);

            let new_root = engine.rewrite_root(root_tree_oid.clone()).await.unwrap();
            assert_eq!(new_root, root_tree_oid);
        });
    }
}
