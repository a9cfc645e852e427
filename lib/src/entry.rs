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

//! The directory-entry value type that flows through the rewrite engine.

use std::fmt;

use crate::oid::Kind;
use crate::oid::Mode;
use crate::oid::Oid;

/// A path made of path components, not a raw string, so filters can match on
/// the location of an entry without worrying about separator quoting.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryPath(Vec<String>);

impl EntryPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, name: &str) -> Self {
        let mut components = self.0.clone();
        components.push(name.to_string());
        Self(components)
    }

    /// True if `self` is `prefix` or a descendant of `prefix`.
    pub fn starts_with(&self, prefix: &EntryPath) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl fmt::Display for EntryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// An immutable directory entry: `(mode, kind, oid, name)` plus the
/// contextual `path` leading to it from the root. The path is not part of
/// the entry's identity in the store — two structurally identical entries
/// under different parents compare equal on everything except `path`.
#[derive(Debug, Clone)]
pub struct Entry {
    pub mode: Mode,
    pub kind: Kind,
    pub oid: Oid,
    pub name: String,
    pub path: EntryPath,
}

impl PartialEq for Entry {
    /// Store identity: two entries are equal if they'd serialize to the same
    /// tree-line, regardless of where they live. This is what tree-rewrite's
    /// fixed-point check (`new_entries == old_entries`) relies on.
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode
            && self.kind == other.kind
            && self.oid == other.oid
            && self.name == other.name
    }
}

impl Eq for Entry {}

impl Entry {
    /// Synthesizes the pseudo-entry used to start recursion at a root tree.
    pub fn root(oid: Oid) -> Self {
        Entry {
            mode: Mode::TREE,
            kind: Kind::Tree,
            oid,
            name: String::new(),
            path: EntryPath::root(),
        }
    }

    /// Produces a child entry whose `path` extends `self`'s.
    pub fn child(&self, mode: Mode, kind: Kind, oid: Oid, name: impl Into<String>) -> Self {
        let name = name.into();
        let path = self.path.join(&name);
        Entry {
            mode,
            kind,
            oid,
            name,
            path,
        }
    }

    pub fn with_oid(&self, oid: Oid) -> Self {
        Entry {
            mode: self.mode,
            kind: self.kind,
            oid,
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

/// The four shapes a filter's rewrite of one entry can take (§9 design note:
/// "implementations in statically typed languages may prefer a sum type").
#[derive(Debug, Clone)]
pub enum RewriteOutcome {
    /// The entry is unchanged; its OID is reused verbatim.
    Keep,
    /// The entry is dropped from its parent tree entirely.
    Delete,
    /// The entry is replaced by exactly one other entry.
    Replace(Entry),
    /// The entry expands into zero or more entries.
    Expand(Vec<Entry>),
}

impl RewriteOutcome {
    pub fn into_entries(self, original: &Entry) -> Vec<Entry> {
        match self {
            RewriteOutcome::Keep => vec![original.clone()],
            RewriteOutcome::Delete => vec![],
            RewriteOutcome::Replace(entry) => vec![entry],
            RewriteOutcome::Expand(entries) => entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_path_extends_parent() {
        let root = Entry::root(Oid::from_bytes(vec![1]));
        let a = root.child(Mode::TREE, Kind::Tree, Oid::from_bytes(vec![2]), "a");
        let b = a.child(Mode::REGULAR, Kind::Blob, Oid::from_bytes(vec![3]), "b.txt");
        assert_eq!(b.path.to_string(), "a/b.txt");
    }

    #[test]
    fn entry_equality_ignores_path() {
        let root1 = Entry::root(Oid::from_bytes(vec![1]));
        let root2 = Entry {
            path: EntryPath::root().join("elsewhere"),
            ..root1.clone()
        };
        assert_eq!(root1, root2);
    }

    #[test]
    fn starts_with_prefix() {
        let base = EntryPath::root().join("examples").join("nested");
        let prefix = EntryPath::root().join("examples");
        assert!(base.starts_with(&prefix));
        assert!(!prefix.starts_with(&base));
    }
}
