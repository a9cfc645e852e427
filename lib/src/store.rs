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

//! The object store adapter trait. The engine is generic over this and
//! never downcasts to a concrete backend.

use async_trait::async_trait;

use crate::entry::Entry;
use crate::error::StoreError;
use crate::oid::Kind;
use crate::oid::Oid;

/// A commit's author/committer identity and timestamp.
///
/// Modeled as a structured record (name, email, timestamp) rather than an
/// opaque string so a git2-backed store can round-trip it faithfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Timezone offset in minutes, matching jj-lib's `Timestamp` model.
    pub tz_offset_minutes: i32,
}

/// Read/write access to blobs, trees, and commits addressed by content hash.
///
/// Every method is pure with respect to the store's content-addressed
/// semantics: writing identical content twice yields the same [`Oid`]
/// (`write_*` is idempotent). Implementations may block on disk or network
/// I/O; callers are expected to invoke these through the scheduler's
/// blocking-I/O executor (see [`crate::scheduler::Scheduler`]), not directly
/// from the cooperative orchestration task.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists a tree's entries in their on-disk order. The returned entries'
    /// `path` is always root-relative (empty); callers rebase it onto the
    /// contextual path of the tree being read.
    async fn read_tree(&self, oid: &Oid) -> Result<Vec<Entry>, StoreError>;

    /// Creates a tree from `entries` (in the given order) and returns its
    /// OID. Writing the same multiset of entries twice returns the same
    /// OID.
    async fn write_tree(&self, entries: &[Entry]) -> Result<Oid, StoreError>;

    async fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError>;

    /// Writes `bytes` as a blob and returns its OID.
    async fn write_blob(&self, bytes: &[u8]) -> Result<Oid, StoreError>;

    /// Creates a commit object and returns its OID.
    async fn create_commit(
        &self,
        author: &Signature,
        committer: &Signature,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, StoreError>;

    /// Looks up the metadata of an already-created commit, needed by
    /// `rewrite_root_commit` to read tree/parents/author without the
    /// caller having to carry it separately.
    async fn read_commit(&self, oid: &Oid) -> Result<CommitData, StoreError>;

    /// Reports whether `oid` names a blob, tree, commit, or tag.
    async fn lookup_kind(&self, oid: &Oid) -> Result<Kind, StoreError>;
}

/// The fields of a commit object, as read back from the store.
#[derive(Debug, Clone)]
pub struct CommitData {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}
