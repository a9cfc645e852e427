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

//! The fatal error taxonomy shared by the store, engine, and driver.
//!
//! Every error here is `Clone`: rewrite results, errors included, are cached
//! behind `Arc` inside [`crate::memo::MemoCache`] so that every awaiter of a
//! given memoization key observes the same outcome. `io::Error` isn't
//! `Clone`, so it's wrapped in `Arc` rather than stored bare, same trick
//! `Arc<T>` always provides regardless of whether `T` itself is `Clone`.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::oid::Kind;
use crate::oid::Oid;

/// Failure reading or writing an object through an [`crate::store::ObjectStore`].
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(Oid),
    #[error("object {0} is corrupt: {1}")]
    Corrupt(Oid, String),
    #[error("I/O error accessing the object store")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(Arc::new(err))
    }
}

/// A filter raised an error while rewriting a specific entry.
#[derive(Debug, Error, Clone)]
#[error("filter `{filter}` failed on `{path}`: {message}")]
pub struct FilterError {
    pub filter: String,
    pub path: String,
    pub message: String,
}

/// An external command invoked by a filter exited non-zero.
#[derive(Debug, Error, Clone)]
#[error("command `{command}` failed on `{path}` with status {status}")]
pub struct ExternalCommandError {
    pub command: String,
    pub path: String,
    pub status: i32,
}

/// The top-level error type produced by the engine and the driver.
///
/// Every variant is fatal: the engine aborts the run, the driver returns a
/// non-zero exit code, and reference retargeting is skipped (§7 of the
/// specification this crate implements).
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    ExternalCommand(#[from] ExternalCommandError),

    #[error(
        "two rewritten entries collide on the name `{name}` within tree derived from `{parent}`"
    )]
    NameCollision { parent: Oid, name: String },

    #[error("root-map `{0}` already exists and is non-empty")]
    StaleState(PathBuf),

    #[error("object {oid} has unsupported kind {kind}")]
    Unsupported { oid: Oid, kind: Kind },

    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(Arc::new(err))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
