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

//! A deterministic, in-process content-addressed store. Used by this
//! crate's own test suite (§8) and by anyone unit-testing a [`crate::filter::Filter`]
//! without a real `.git` directory.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use blake2::Blake2s256;
use blake2::Digest;

use crate::entry::Entry;
use crate::entry::EntryPath;
use crate::error::StoreError;
use crate::oid::Kind;
use crate::oid::Mode;
use crate::oid::Oid;
use crate::store::CommitData;
use crate::store::ObjectStore;
use crate::store::Signature;

#[derive(Default)]
struct Inner {
    blobs: HashMap<Oid, Vec<u8>>,
    trees: HashMap<Oid, Vec<Entry>>,
    commits: HashMap<Oid, CommitData>,
}

/// An in-memory [`ObjectStore`]. Hashing uses `blake2` (the same hash family
/// jj-lib depends on for its content-addressing) over a tag-prefixed,
/// length-delimited encoding — deliberately not git's own object format,
/// since this store exists for deterministic testing, not interop.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn hash_tagged(tag: &str, payload: &[u8]) -> Oid {
    let mut hasher = Blake2s256::new();
    hasher.update(tag.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload);
    Oid::from_bytes(hasher.finalize().to_vec())
}

fn kind_tag(kind: Kind) -> u8 {
    match kind {
        Kind::Blob => 0,
        Kind::Tree => 1,
        Kind::Commit => 2,
        Kind::Tag => 3,
    }
}

fn serialize_tree(entries: &[Entry]) -> Vec<u8> {
    let mut buf = Vec::new();
    for entry in entries {
        buf.extend_from_slice(&entry.mode.0.to_le_bytes());
        buf.push(kind_tag(entry.kind));
        let oid_bytes = entry.oid.as_bytes();
        buf.extend_from_slice(&(oid_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(oid_bytes);
        let name_bytes = entry.name.as_bytes();
        buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(name_bytes);
    }
    buf
}

fn serialize_signature(buf: &mut Vec<u8>, sig: &Signature) {
    for field in [sig.name.as_bytes(), sig.email.as_bytes()] {
        buf.extend_from_slice(&(field.len() as u32).to_le_bytes());
        buf.extend_from_slice(field);
    }
    buf.extend_from_slice(&sig.timestamp.to_le_bytes());
    buf.extend_from_slice(&sig.tz_offset_minutes.to_le_bytes());
}

fn serialize_commit(
    author: &Signature,
    committer: &Signature,
    message: &str,
    tree: &Oid,
    parents: &[Oid],
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(tree.as_bytes().len() as u32).to_le_bytes());
    buf.extend_from_slice(tree.as_bytes());
    buf.extend_from_slice(&(parents.len() as u32).to_le_bytes());
    for parent in parents {
        buf.extend_from_slice(&(parent.as_bytes().len() as u32).to_le_bytes());
        buf.extend_from_slice(parent.as_bytes());
    }
    serialize_signature(&mut buf, author);
    serialize_signature(&mut buf, committer);
    let message_bytes = message.as_bytes();
    buf.extend_from_slice(&(message_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(message_bytes);
    buf
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn read_tree(&self, oid: &Oid) -> Result<Vec<Entry>, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .trees
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(oid.clone()))
    }

    async fn write_tree(&self, entries: &[Entry]) -> Result<Oid, StoreError> {
        let oid = hash_tagged("tree", &serialize_tree(entries));
        // Store entries with a root-relative path; the engine rebases the
        // contextual path when it reads them back as children.
        let normalized: Vec<Entry> = entries
            .iter()
            .map(|e| Entry {
                mode: e.mode,
                kind: e.kind,
                oid: e.oid.clone(),
                name: e.name.clone(),
                path: EntryPath::root(),
            })
            .collect();
        self.inner.lock().unwrap().trees.entry(oid.clone()).or_insert(normalized);
        Ok(oid)
    }

    async fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .blobs
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(oid.clone()))
    }

    async fn write_blob(&self, bytes: &[u8]) -> Result<Oid, StoreError> {
        let oid = hash_tagged("blob", bytes);
        self.inner.lock().unwrap().blobs.entry(oid.clone()).or_insert_with(|| bytes.to_vec());
        Ok(oid)
    }

    async fn create_commit(
        &self,
        author: &Signature,
        committer: &Signature,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, StoreError> {
        let payload = serialize_commit(author, committer, message, tree, parents);
        let oid = hash_tagged("commit", &payload);
        let data = CommitData {
            tree: tree.clone(),
            parents: parents.to_vec(),
            author: author.clone(),
            committer: committer.clone(),
            message: message.to_string(),
        };
        self.inner.lock().unwrap().commits.entry(oid.clone()).or_insert(data);
        Ok(oid)
    }

    async fn read_commit(&self, oid: &Oid) -> Result<CommitData, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .commits
            .get(oid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(oid.clone()))
    }

    async fn lookup_kind(&self, oid: &Oid) -> Result<Kind, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.blobs.contains_key(oid) {
            Ok(Kind::Blob)
        } else if inner.trees.contains_key(oid) {
            Ok(Kind::Tree)
        } else if inner.commits.contains_key(oid) {
            Ok(Kind::Commit)
        } else {
            Err(StoreError::NotFound(oid.clone()))
        }
    }
}

/// Convenience used by tests to build a tree entry without going through
/// the engine.
pub fn leaf(mode: Mode, kind: Kind, oid: Oid, name: &str) -> Entry {
    Entry {
        mode,
        kind,
        oid,
        name: name.to_string(),
        path: EntryPath::root(),
    }
}
