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

//! The real backend: reads and writes git blob/tree/commit objects in a
//! `.git` directory through `git2` (the same crate jj-lib vendors for its
//! own git backend).
//!
//! `git2::Repository` is neither `Send` nor `Sync`, so every call goes
//! through `tokio::task::spawn_blocking` with the repository behind a
//! `Mutex` — this is also where the "store methods may block, dispatch via
//! the blocking executor" contract from [`crate::store::ObjectStore`] is
//! actually honored, since the engine itself calls store methods directly
//! from cooperative tasks.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::entry::Entry;
use crate::entry::EntryPath;
use crate::error::StoreError;
use crate::oid::Kind;
use crate::oid::Mode;
use crate::oid::Oid;
use crate::store::CommitData;
use crate::store::ObjectStore;
use crate::store::Signature;

/// A git object database adapter backed by a real `.git` directory.
pub struct GitStore {
    repo: Arc<Mutex<git2::Repository>>,
}

impl GitStore {
    pub fn open(git_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let repo = git2::Repository::open(git_dir).map_err(git_err)?;
        Ok(Self {
            repo: Arc::new(Mutex::new(repo)),
        })
    }

    pub fn discover(start_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let repo = git2::Repository::discover(start_path).map_err(git_err)?;
        Ok(Self {
            repo: Arc::new(Mutex::new(repo)),
        })
    }

    /// Resolves `refname` (a full ref path like `refs/heads/main`, or a
    /// shorthand like `main`) to the OID it currently points at. Used by
    /// the CLI's `RefUpdater` implementation.
    pub async fn resolve_ref(&self, refname: &str) -> Result<Oid, StoreError> {
        let repo = self.repo.clone();
        let refname = refname.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let reference = repo
                .find_reference(&refname)
                .or_else(|_| repo.resolve_reference_from_short_name(&refname))
                .map_err(git_err)?;
            let oid = reference.peel_to_commit().map_err(git_err)?.id();
            Ok(from_git2_oid(oid))
        })
        .await
        .expect("blocking task panicked")
    }

    /// The repository's `.git` directory, e.g. for locating a well-known
    /// metadata path like the root-map file.
    pub async fn git_dir(&self) -> std::path::PathBuf {
        let repo = self.repo.clone();
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            repo.path().to_path_buf()
        })
        .await
        .expect("blocking task panicked")
    }

    /// True if `name` resolves to an existing reference (full path or
    /// shorthand). Used by the CLI to tell a ref-spec from a bare commit
    /// OID or revision range before attempting to retarget it.
    pub async fn is_ref(&self, name: &str) -> bool {
        let repo = self.repo.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let found = repo
                .find_reference(&name)
                .or_else(|_| repo.resolve_reference_from_short_name(&name));
            found.is_ok()
        })
        .await
        .expect("blocking task panicked")
    }

    /// Sets `refname` (full path or shorthand, resolved the same way as
    /// [`GitStore::resolve_ref`]) to point directly at `target`, creating it
    /// if absent.
    pub async fn set_ref_target(&self, refname: &str, target: &Oid) -> Result<(), StoreError> {
        let repo = self.repo.clone();
        let refname = refname.to_string();
        let target = to_git2_oid(target)?;
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let full_name = repo
                .find_reference(&refname)
                .or_else(|_| repo.resolve_reference_from_short_name(&refname))
                .map(|reference| reference.name().unwrap_or(&refname).to_string())
                .unwrap_or(refname);
            repo.reference(&full_name, target, true, "filtertree: retarget after rewrite")
                .map_err(git_err)?;
            Ok(())
        })
        .await
        .expect("blocking task panicked")
    }
}

fn git_err(err: git2::Error) -> StoreError {
    StoreError::Io(Arc::new(std::io::Error::other(err.to_string())))
}

fn to_git2_oid(oid: &Oid) -> Result<git2::Oid, StoreError> {
    git2::Oid::from_bytes(oid.as_bytes()).map_err(|err| StoreError::Corrupt(oid.clone(), err.to_string()))
}

fn from_git2_oid(oid: git2::Oid) -> Oid {
    Oid::from_bytes(oid.as_bytes().to_vec())
}

fn mode_to_filemode(mode: Mode, kind: Kind) -> git2::FileMode {
    match (mode, kind) {
        (Mode::EXECUTABLE, _) => git2::FileMode::BlobExecutable,
        (Mode::SYMLINK, _) => git2::FileMode::Link,
        (Mode::SUBMODULE, _) | (_, Kind::Commit) => git2::FileMode::Commit,
        (Mode::TREE, _) | (_, Kind::Tree) => git2::FileMode::Tree,
        _ => git2::FileMode::Blob,
    }
}

fn filemode_to_mode(filemode: i32) -> Mode {
    match filemode {
        m if m == i32::from(git2::FileMode::BlobExecutable) => Mode::EXECUTABLE,
        m if m == i32::from(git2::FileMode::Link) => Mode::SYMLINK,
        m if m == i32::from(git2::FileMode::Commit) => Mode::SUBMODULE,
        m if m == i32::from(git2::FileMode::Tree) => Mode::TREE,
        _ => Mode::REGULAR,
    }
}

fn object_kind_to_kind(kind: git2::ObjectType) -> Result<Kind, StoreError> {
    match kind {
        git2::ObjectType::Blob => Ok(Kind::Blob),
        git2::ObjectType::Tree => Ok(Kind::Tree),
        git2::ObjectType::Commit => Ok(Kind::Commit),
        git2::ObjectType::Tag => Ok(Kind::Tag),
        _ => Err(StoreError::Corrupt(Oid::from_bytes(Vec::new()), "unrecognized git object type".to_string())),
    }
}

fn to_git2_signature(sig: &Signature) -> Result<git2::Signature<'static>, StoreError> {
    let time = git2::Time::new(sig.timestamp, sig.tz_offset_minutes);
    git2::Signature::new(&sig.name, &sig.email, &time).map_err(git_err)
}

fn from_git2_signature(sig: &git2::Signature) -> Signature {
    let when = sig.when();
    Signature {
        name: sig.name().unwrap_or_default().to_string(),
        email: sig.email().unwrap_or_default().to_string(),
        timestamp: when.seconds(),
        tz_offset_minutes: when.offset_minutes(),
    }
}

#[async_trait]
impl ObjectStore for GitStore {
    async fn read_tree(&self, oid: &Oid) -> Result<Vec<Entry>, StoreError> {
        let repo = self.repo.clone();
        let git_oid = to_git2_oid(oid)?;
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let tree = repo.find_tree(git_oid).map_err(git_err)?;
            tree.iter()
                .map(|entry| {
                    let kind = object_kind_to_kind(entry.kind().unwrap_or(git2::ObjectType::Blob))?;
                    Ok(Entry {
                        mode: filemode_to_mode(entry.filemode()),
                        kind,
                        oid: from_git2_oid(entry.id()),
                        name: entry.name().unwrap_or_default().to_string(),
                        path: EntryPath::root(),
                    })
                })
                .collect()
        })
        .await
        .expect("blocking task panicked")
    }

    async fn write_tree(&self, entries: &[Entry]) -> Result<Oid, StoreError> {
        let repo = self.repo.clone();
        let entries = entries.to_vec();
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let mut builder = repo.treebuilder(None).map_err(git_err)?;
            for entry in &entries {
                let git_oid = to_git2_oid(&entry.oid)?;
                builder
                    .insert(&entry.name, git_oid, i32::from(mode_to_filemode(entry.mode, entry.kind)))
                    .map_err(git_err)?;
            }
            Ok(from_git2_oid(builder.write().map_err(git_err)?))
        })
        .await
        .expect("blocking task panicked")
    }

    async fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, StoreError> {
        let repo = self.repo.clone();
        let git_oid = to_git2_oid(oid)?;
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let blob = repo.find_blob(git_oid).map_err(git_err)?;
            Ok(blob.content().to_vec())
        })
        .await
        .expect("blocking task panicked")
    }

    async fn write_blob(&self, bytes: &[u8]) -> Result<Oid, StoreError> {
        let repo = self.repo.clone();
        let bytes = bytes.to_vec();
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            Ok(from_git2_oid(repo.blob(&bytes).map_err(git_err)?))
        })
        .await
        .expect("blocking task panicked")
    }

    async fn create_commit(
        &self,
        author: &Signature,
        committer: &Signature,
        message: &str,
        tree: &Oid,
        parents: &[Oid],
    ) -> Result<Oid, StoreError> {
        let repo = self.repo.clone();
        let author = author.clone();
        let committer = committer.clone();
        let message = message.to_string();
        let tree = tree.clone();
        let parents = parents.to_vec();
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let git_tree = repo.find_tree(to_git2_oid(&tree)?).map_err(git_err)?;
            let parent_commits = parents
                .iter()
                .map(|oid| repo.find_commit(to_git2_oid(oid)?).map_err(git_err))
                .collect::<Result<Vec<_>, _>>()?;
            let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();
            let author_sig = to_git2_signature(&author)?;
            let committer_sig = to_git2_signature(&committer)?;
            let oid = repo
                .commit(None, &author_sig, &committer_sig, &message, &git_tree, &parent_refs)
                .map_err(git_err)?;
            Ok(from_git2_oid(oid))
        })
        .await
        .expect("blocking task panicked")
    }

    async fn read_commit(&self, oid: &Oid) -> Result<CommitData, StoreError> {
        let repo = self.repo.clone();
        let git_oid = to_git2_oid(oid)?;
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let commit = repo.find_commit(git_oid).map_err(git_err)?;
            let data = CommitData {
                tree: from_git2_oid(commit.tree_id()),
                parents: commit.parent_ids().map(from_git2_oid).collect(),
                author: from_git2_signature(&commit.author()),
                committer: from_git2_signature(&commit.committer()),
                message: commit.message().unwrap_or_default().to_string(),
            };
            Ok(data)
        })
        .await
        .expect("blocking task panicked")
    }

    async fn lookup_kind(&self, oid: &Oid) -> Result<Kind, StoreError> {
        let repo = self.repo.clone();
        let git_oid = to_git2_oid(oid)?;
        tokio::task::spawn_blocking(move || {
            let repo = repo.lock().expect("git repository mutex poisoned");
            let object = repo.find_object(git_oid, None).map_err(git_err)?;
            object_kind_to_kind(object.kind().ok_or_else(|| {
                StoreError::Corrupt(from_git2_oid(git_oid), "object has no recognizable type".to_string())
            })?)
        })
        .await
        .expect("blocking task panicked")
    }
}
