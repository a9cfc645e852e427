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

//! `filtertree-lib`: a generic engine for rewriting content-addressed
//! commit/tree DAGs, the way `git filter-repo`/`git-filter-tree` rewrite a
//! git history — except the object model, the filter contract, and the
//! concurrency runtime are all library-level abstractions, not tied to git.
//!
//! The crate is organized top-down, following the dependency order a reader
//! descending through it would hit:
//!
//! - [`oid`] / [`entry`] — the content-addressed value types.
//! - [`store`] — the [`store::ObjectStore`] trait the engine is generic over,
//!   plus [`backend`]'s concrete adapters.
//! - [`filter`] — the [`filter::Filter`] trait user code implements.
//! - [`memo`] / [`scheduler`] — the memoization and concurrency layer.
//! - [`engine`] — ties the above together into the recursive rewrite.
//! - [`driver`] / [`rootmap`] / [`progress`] — the end-to-end run: root
//!   enumeration, reference updates, and on-disk bookkeeping.

pub mod backend;
pub mod driver;
pub mod engine;
pub mod entry;
pub mod error;
pub mod filter;
pub mod memo;
pub mod oid;
pub mod progress;
pub mod rootmap;
pub mod scheduler;
pub mod store;

pub use driver::Driver;
pub use driver::RefUpdateOutcome;
pub use driver::RefUpdater;
pub use engine::Engine;
pub use entry::Entry;
pub use entry::EntryPath;
pub use entry::RewriteOutcome;
pub use error::EngineError;
pub use error::EngineResult;
pub use error::ExternalCommandError;
pub use error::FilterError;
pub use error::StoreError;
pub use filter::Filter;
pub use oid::Kind;
pub use oid::Mode;
pub use oid::Oid;
pub use scheduler::Progress;
pub use scheduler::ProgressHook;
pub use scheduler::Scheduler;
pub use store::CommitData;
pub use store::ObjectStore;
pub use store::Signature;
