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

//! Wraps [`filtertree_lib::EngineError`] and this crate's own I/O/argument
//! errors in one type so exit-code mapping and message formatting live in
//! one place, the way jj-cli's `command_error.rs` wraps `CommandError`
//! around `jj_lib` errors.

use filtertree_lib::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("`git rev-list` failed: {0}")]
    RevList(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid object id `{0}`")]
    BadOid(String, #[source] hex::FromHexError),
}

impl CommandError {
    /// Exit code per §7/§6: 1 for a pre-existing root-map, 2 for every
    /// other fatal condition, 0 never reaches here (that path returns `Ok`).
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandError::Engine(EngineError::StaleState(_)) => 1,
            _ => 2,
        }
    }
}
