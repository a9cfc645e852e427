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

//! Resolves the handful of knobs the CLI needs from flags with env var
//! fallbacks. No on-disk config file: the tool is invoked per-run, matching
//! the original Python prototype's flag-only surface.

use std::path::Path;
use std::path::PathBuf;

use crate::GlobalArgs;

/// `jobs`/`git_dir`, resolved from CLI flags first, then `FILTERTREE_JOBS`/
/// `FILTERTREE_GIT_DIR`, then the `2 × cpu_count`/cwd-discovery defaults the
/// core crate already applies.
pub struct FilterTreeConfig {
    pub jobs: Option<usize>,
    pub git_dir: Option<PathBuf>,
    pub progress: bool,
}

impl FilterTreeConfig {
    pub fn resolve(args: &GlobalArgs) -> Self {
        let jobs = args.jobs.or_else(|| {
            std::env::var("FILTERTREE_JOBS")
                .ok()
                .and_then(|v| v.parse().ok())
        });
        let git_dir = args
            .git_dir
            .clone()
            .or_else(|| std::env::var_os("FILTERTREE_GIT_DIR").map(PathBuf::from));
        Self {
            jobs,
            git_dir,
            progress: args.progress(),
        }
    }

    /// The directory to discover a repository from: the configured
    /// `git_dir`, or the current directory so `git2::Repository::discover`
    /// walks upward looking for `.git`.
    pub fn discovery_root(&self) -> &Path {
        self.git_dir.as_deref().unwrap_or_else(|| Path::new("."))
    }
}
