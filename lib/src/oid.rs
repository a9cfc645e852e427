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

//! Content-addressed object identifiers.

use std::fmt;

/// An opaque content hash naming a blob, tree, or commit.
///
/// Two `Oid`s are equal iff the objects they name have byte-identical
/// canonical serializations. `Oid` never carries a kind: the same hash
/// value is used to address a blob, a tree, or a commit, and the store is
/// what's asked to resolve which kind it is (see [`crate::store::ObjectStore::lookup_kind`]).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u8>);

impl Oid {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn from_hex(hex: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(hex.trim())?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Oid").field(&self.hex()).finish()
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// The kind of object an [`Oid`] names, as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Blob => "blob",
            Kind::Tree => "tree",
            Kind::Commit => "commit",
            Kind::Tag => "tag",
        };
        f.write_str(s)
    }
}

/// POSIX-like file mode, including the non-POSIX submodule sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mode(pub u32);

impl Mode {
    pub const TREE: Mode = Mode(0o040000);
    pub const REGULAR: Mode = Mode(0o100644);
    pub const EXECUTABLE: Mode = Mode(0o100755);
    pub const SYMLINK: Mode = Mode(0o120000);
    /// Git's special mode for a submodule (gitlink) entry.
    pub const SUBMODULE: Mode = Mode(0o160000);

    pub fn is_submodule(self) -> bool {
        self == Mode::SUBMODULE
    }
}
