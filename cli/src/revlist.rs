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

//! The rev-list collaborator (§4.7 expansion): expands ref-specs into
//! commit OIDs the same way the original Python prototype's
//! `tree_filter.py::TreeFilter.main` did, by shelling out to `git rev-list`
//! (`subprocess.Popen` there, `std::process::Command` here) rather than
//! reimplementing commit graph traversal.

use std::path::Path;
use std::process::Command;

use filtertree_lib::Oid;
use tracing::debug;

use crate::command_error::CommandError;

/// Invokes `git rev-list` against the repository at `git_dir` to expand
/// `refspecs` into every commit OID reachable from them.
pub struct RevList<'a> {
    git_dir: &'a Path,
}

impl<'a> RevList<'a> {
    pub fn new(git_dir: &'a Path) -> Self {
        Self { git_dir }
    }

    pub fn expand(&self, refspecs: &[String]) -> Result<Vec<Oid>, CommandError> {
        debug!(git_dir = %self.git_dir.display(), ?refspecs, "running git rev-list");
        let output = Command::new("git")
            .arg("-C")
            .arg(self.git_dir)
            .arg("rev-list")
            .args(refspecs)
            .output()?;
        if !output.status.success() {
            return Err(CommandError::RevList(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| Oid::from_hex(line).map_err(|err| CommandError::BadOid(line.to_string(), err)))
            .collect()
    }
}
