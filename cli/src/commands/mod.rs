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

//! One subcommand per reference filter (§4.6/§6), sharing the root
//! selection flags.

use std::path::PathBuf;

use clap::Args;
use clap::Subcommand;
use filtertree_filters::DecompressFilter;
use filtertree_filters::LineEndingFilter;
use filtertree_filters::RemovePathsFilter;
use filtertree_filters::SubmoduleFilter;

use crate::command_error::CommandError;
use crate::config::FilterTreeConfig;
use crate::runner;

/// Root selection shared by every filter subcommand: ref-specs after `--`
/// are expanded via `git rev-list` and retargeted after rewriting; with no
/// `--`, root OIDs are read from standard input and no refs are touched
/// (§6).
#[derive(Args, Clone, Debug, Default)]
pub struct RootSelection {
    #[arg(last = true, value_name = "REFSPEC")]
    pub refs: Vec<String>,
}

#[derive(Subcommand)]
pub enum FilterCommand {
    /// Gunzip every blob named `*<ext>`, stripping the extension.
    Decompress {
        #[arg(long, default_value = ".gz")]
        ext: String,
        #[command(flatten)]
        roots: RootSelection,
    },
    /// Delete the given paths from every tree, fixing up `.gitattributes`.
    Rm {
        /// A path to remove; may be given more than once.
        #[arg(long = "path", required = true)]
        paths: Vec<String>,
        #[command(flatten)]
        roots: RootSelection,
    },
    /// Normalize line endings for blobs with the given extension.
    Dos2unix {
        #[arg(long, default_value = ".txt")]
        ext: String,
        #[command(flatten)]
        roots: RootSelection,
    },
    /// Replace a subdirectory with a submodule link.
    Dir2mod {
        /// Directory of files named by original tree OID, containing the
        /// target commit OID.
        #[arg(long)]
        treemap: PathBuf,
        /// The subdirectory to replace, e.g. `vendor/thing`.
        folder: String,
        /// The submodule's URL.
        url: String,
        /// Overrides the submodule name recorded in `.gitmodules` (default:
        /// the folder's last component).
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        roots: RootSelection,
    },
}

impl FilterCommand {
    pub fn run(self, config: &FilterTreeConfig) -> Result<(), CommandError> {
        match self {
            FilterCommand::Decompress { ext, roots } => {
                runner::run(config, &roots, DecompressFilter::new(ext))
            }
            FilterCommand::Rm { paths, roots } => {
                runner::run(config, &roots, RemovePathsFilter::new(paths))
            }
            FilterCommand::Dos2unix { ext, roots } => {
                runner::run(config, &roots, LineEndingFilter::new(ext))
            }
            FilterCommand::Dir2mod {
                treemap,
                folder,
                url,
                name,
                roots,
            } => runner::run(
                config,
                &roots,
                SubmoduleFilter::new(treemap, &folder, url, name),
            ),
        }
    }
}
