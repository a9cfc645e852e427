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

//! The contract user code implements to rewrite blobs and trees (§4.6).

use std::hash::Hash;

use async_trait::async_trait;

use crate::engine::Engine;
use crate::entry::Entry;
use crate::entry::RewriteOutcome;
use crate::error::EngineResult;

/// A tree-rewrite filter.
///
/// `Key` is the filter's dependency fingerprint type (§4.3): the engine
/// memoizes a rewrite by `depends(entry)`, not by the entry itself, so two
/// entries a filter considers equivalent collapse to one invocation even if
/// they live at different paths or carry different OIDs.
#[async_trait]
pub trait Filter: Send + Sync + Sized + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;

    /// Used only in error messages and progress/log output.
    fn name(&self) -> &str;

    /// The default fingerprint is `(oid, path, mode)` — the most
    /// conservative choice, since it only collapses rewrites of an entry
    /// that is byte-identical, same mode, and reached via the same path.
    /// Filters that don't care about location or mode should narrow this.
    fn depends(&self, entry: &Entry) -> Self::Key;

    /// Rewrites a blob entry. Required: this is the one hook every filter
    /// must implement, since a filter that never touches file content has
    /// no reason to exist.
    async fn rewrite_file(&self, ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome>;

    /// Rewrites a tree entry. The default recurses into the engine's
    /// generic tree algorithm (read entries, rewrite each child, rebuild or
    /// reuse the tree OID at a fixed point) — almost every filter wants
    /// this; the hook exists for filters like subdir-to-submodule that need
    /// to intercept a specific subtree before recursing into it.
    async fn rewrite_tree(&self, ctx: &Engine<Self>, entry: &Entry) -> EngineResult<RewriteOutcome> {
        ctx.rewrite_tree_generic(entry).await
    }

    /// Rewrites a commit *referenced from within a tree* (a submodule
    /// gitlink entry, not a root commit — those go through
    /// [`Engine::rewrite_root`]). Defaults to pass-through, since most
    /// filters have no opinion about the commit a submodule link points at.
    async fn rewrite_commit(
        &self,
        _ctx: &Engine<Self>,
        _entry: &Entry,
    ) -> EngineResult<RewriteOutcome> {
        Ok(RewriteOutcome::Keep)
    }
}
