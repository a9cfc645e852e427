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

//! The recursive rewrite engine: root dispatch, tree rewrite, and commit
//! rewrite (§4.5), wired up to the memoization layer (§4.3) and the
//! scheduler (§4.4).

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Weak;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::instrument;
use tracing::trace;

use crate::entry::Entry;
use crate::entry::RewriteOutcome;
use crate::error::EngineError;
use crate::error::EngineResult;
use crate::filter::Filter;
use crate::memo::MemoCache;
use crate::oid::Kind;
use crate::oid::Oid;
use crate::scheduler::Scheduler;
use crate::store::ObjectStore;

/// Ties a store, a scheduler, and a filter together and holds the three
/// memoization caches named in §4.3: one per entry (`rewrite_object`), one
/// per tree (the filter's `rewrite_tree` hook), and one per root
/// (`rewrite_root`).
///
/// Always constructed behind an `Arc` ([`Engine::new`] returns one): every
/// recursive descent into a tree spawns a scheduler task per child entry, and
/// those tasks need a `'static` handle back to the engine. Rather than thread
/// an explicit `Arc<Engine<F>>` through every method signature (which would
/// leak into the [`Filter`] trait's API), the engine keeps a [`Weak`] to
/// itself and upgrades it whenever it needs to spawn.
pub struct Engine<F: Filter> {
    store: Arc<dyn ObjectStore>,
    scheduler: Arc<Scheduler>,
    filter: Arc<F>,
    self_ref: Weak<Engine<F>>,
    object_cache: MemoCache<F::Key, EngineResult<Vec<Entry>>>,
    tree_cache: MemoCache<F::Key, EngineResult<Oid>>,
    root_cache: MemoCache<Oid, EngineResult<Oid>>,
}

impl<F: Filter> Engine<F> {
    pub fn new(store: Arc<dyn ObjectStore>, scheduler: Arc<Scheduler>, filter: Arc<F>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Engine {
            store,
            scheduler,
            filter,
            self_ref: self_ref.clone(),
            object_cache: MemoCache::new(),
            tree_cache: MemoCache::new(),
            root_cache: MemoCache::new(),
        })
    }

    fn arc(&self) -> Arc<Self> {
        self.self_ref
            .upgrade()
            .expect("engine used after its owning Arc was dropped")
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    pub async fn read_blob(&self, oid: &Oid) -> EngineResult<Vec<u8>> {
        Ok(self.store.read_blob(oid).await?)
    }

    pub async fn write_blob(&self, bytes: &[u8]) -> EngineResult<Oid> {
        Ok(self.store.write_blob(bytes).await?)
    }

    pub async fn read_tree(&self, oid: &Oid) -> EngineResult<Vec<Entry>> {
        Ok(self.store.read_tree(oid).await?)
    }

    pub async fn write_tree(&self, entries: &[Entry]) -> EngineResult<Oid> {
        Ok(self.store.write_tree(entries).await?)
    }

    /// Rewrites one directory entry, dispatching by kind to the filter's
    /// `rewrite_file`/`rewrite_tree`/`rewrite_commit` hook. Memoized by
    /// `filter.depends(entry)`: concurrent callers racing in on the same key
    /// share one computation (§4.3).
    #[instrument(level = "trace", skip(self), fields(path = %entry.path, kind = %entry.kind))]
    pub async fn rewrite_object(&self, entry: Entry) -> EngineResult<Vec<Entry>> {
        let key = self.filter.depends(&entry);
        // The cached computation may itself recurse and need a worker slot
        // (e.g. a tree entry spawning its children), so awaiting it is a
        // suspension point just like awaiting a scheduler task handle.
        let cached = self
            .scheduler
            .suspend(self.object_cache.get_or_compute(key, {
                let engine = self.arc();
                move || async move { engine.dispatch_object(entry).await }
            }))
            .await;
        (*cached).clone()
    }

    async fn dispatch_object(&self, entry: Entry) -> EngineResult<Vec<Entry>> {
        let outcome = match entry.kind {
            Kind::Blob => self.filter.rewrite_file(self, &entry).await?,
            Kind::Tree => self.filter.rewrite_tree(self, &entry).await?,
            Kind::Commit => self.filter.rewrite_commit(self, &entry).await?,
            Kind::Tag => {
                return Err(EngineError::Unsupported {
                    oid: entry.oid.clone(),
                    kind: Kind::Tag,
                })
            }
        };
        Ok(outcome.into_entries(&entry))
    }

    /// The engine's default tree-rewrite algorithm (§4.5): read the tree,
    /// rewrite every entry (each as its own scheduler task, so siblings
    /// overlap), detect name collisions, and reuse the original OID at a
    /// fixed point instead of writing an identical tree back out.
    ///
    /// This is what [`Filter::rewrite_tree`]'s default implementation calls;
    /// a filter overriding that hook (e.g. subdir-to-submodule) can still
    /// call it explicitly to recurse into subtrees it isn't special-casing.
    pub async fn rewrite_tree_generic(&self, entry: &Entry) -> EngineResult<RewriteOutcome> {
        let key = self.filter.depends(entry);
        let cached = self
            .scheduler
            .suspend(self.tree_cache.get_or_compute(key, {
                let engine = self.arc();
                let entry = entry.clone();
                move || async move { engine.rewrite_tree_uncached(&entry).await }
            }))
            .await;
        let new_oid = (*cached).clone()?;
        if new_oid == entry.oid {
            Ok(RewriteOutcome::Keep)
        } else {
            Ok(RewriteOutcome::Replace(entry.with_oid(new_oid)))
        }
    }

    async fn rewrite_tree_uncached(&self, entry: &Entry) -> EngineResult<Oid> {
        let old_entries = self.store.read_tree(&entry.oid).await?;

        let mut handles = Vec::with_capacity(old_entries.len());
        for child in &old_entries {
            let child_entry = entry.child(child.mode, child.kind, child.oid.clone(), child.name.clone());
            let engine = self.arc();
            handles.push(self.scheduler.spawn(async move { engine.rewrite_object(child_entry).await }));
        }

        let mut new_entries = Vec::with_capacity(old_entries.len());
        let mut seen_names = HashSet::with_capacity(old_entries.len());
        for handle in handles {
            // Awaiting a child rewrite is a suspension point (§5): release
            // this task's worker slot for the duration, or a tree with more
            // entries than available slots deadlocks them against each
            // other.
            let produced = self
                .scheduler
                .suspend(handle)
                .await
                .expect("rewrite task panicked")?;
            for produced_entry in produced {
                if !seen_names.insert(produced_entry.name.clone()) {
                    return Err(EngineError::NameCollision {
                        parent: entry.oid.clone(),
                        name: produced_entry.name,
                    });
                }
                new_entries.push(produced_entry);
            }
        }

        if new_entries == old_entries {
            trace!(oid = %entry.oid, "tree rewrite is a fixed point");
            Ok(entry.oid.clone())
        } else {
            self.store.write_tree(&new_entries).await.map_err(Into::into)
        }
    }

    /// Rewrites a root object (§4.5 "Root dispatch"): a tree root recurses
    /// through [`Engine::rewrite_tree_generic`]; a commit root also rewrites
    /// every parent, concurrently, before creating a replacement commit.
    /// Memoized by the raw OID, independent of the filter's fingerprint —
    /// roots are looked up directly by the hash the caller supplied.
    ///
    /// Returns a boxed future rather than being declared `async fn`: this
    /// function recurses into itself (through `rewrite_root_commit`, which
    /// spawns tasks that call back into `rewrite_root` for the tree and each
    /// parent), and an `async fn` cycle like that produces an infinitely
    /// sized anonymous future type. Boxing this one edge of the cycle gives
    /// the recursion a concrete, finite type.
    #[instrument(level = "debug", skip(self), fields(oid = %oid))]
    pub fn rewrite_root(&self, oid: Oid) -> BoxFuture<'_, EngineResult<Oid>> {
        async move {
            let cached = self
                .scheduler
                .suspend(self.root_cache.get_or_compute(oid.clone(), {
                    let engine = self.arc();
                    move || async move { engine.rewrite_root_uncached(oid).await }
                }))
                .await;
            (*cached).clone()
        }
        .boxed()
    }

    async fn rewrite_root_uncached(&self, oid: Oid) -> EngineResult<Oid> {
        let kind = self.store.lookup_kind(&oid).await?;
        match kind {
            Kind::Tree => {
                let entry = Entry::root(oid);
                // Dispatches through the filter's `rewrite_tree` hook, not
                // `rewrite_tree_generic` directly, so a filter overriding
                // that hook (e.g. subdir-to-submodule, which needs to know
                // it's looking at a root to inject `.gitmodules`) sees root
                // trees the same way it sees every other tree entry.
                match self.filter.rewrite_tree(self, &entry).await? {
                    RewriteOutcome::Keep => Ok(entry.oid),
                    RewriteOutcome::Replace(new_entry) => Ok(new_entry.oid),
                    RewriteOutcome::Delete | RewriteOutcome::Expand(_) => {
                        unreachable!("a root tree rewrite always yields Keep or Replace")
                    }
                }
            }
            Kind::Commit => self.rewrite_root_commit(oid).await,
            Kind::Blob | Kind::Tag => Err(EngineError::Unsupported { oid, kind }),
        }
    }

    async fn rewrite_root_commit(&self, oid: Oid) -> EngineResult<Oid> {
        let commit = self.store.read_commit(&oid).await?;

        let tree_handle = {
            let engine = self.arc();
            let tree = commit.tree.clone();
            self.scheduler.spawn(async move { engine.rewrite_root(tree).await })
        };
        let parent_handles: Vec<_> = commit
            .parents
            .iter()
            .map(|parent| {
                let engine = self.arc();
                let parent = parent.clone();
                self.scheduler.spawn(async move { engine.rewrite_root(parent).await })
            })
            .collect();

        // Awaiting the tree and each parent's rewrite is a suspension point
        // (§5): release this task's worker slot for the duration, same as
        // the tree-entry recursion in `rewrite_tree_uncached`.
        let new_tree = self
            .scheduler
            .suspend(tree_handle)
            .await
            .expect("rewrite task panicked")?;
        let mut new_parents = Vec::with_capacity(parent_handles.len());
        for handle in parent_handles {
            new_parents.push(
                self.scheduler
                    .suspend(handle)
                    .await
                    .expect("rewrite task panicked")?,
            );
        }

        if new_tree == commit.tree && new_parents == commit.parents {
            trace!(oid = %oid, "commit rewrite is a fixed point");
            return Ok(oid);
        }

        self.store
            .create_commit(
                &commit.author,
                &commit.committer,
                &commit.message,
                &new_tree,
                &new_parents,
            )
            .await
            .map_err(Into::into)
    }
}
