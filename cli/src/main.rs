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

//! `filtertree`: rewrites a git repository's tree/commit DAG through a
//! named filter (§6). One subcommand per filter, sharing a small set of
//! global flags resolved into a [`config::FilterTreeConfig`].

mod command_error;
mod commands;
mod config;
mod ref_updater;
mod revlist;
mod runner;

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use commands::FilterCommand;
use config::FilterTreeConfig;
use tracing_subscriber::EnvFilter;

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Number of concurrent worker slots. Defaults to `FILTERTREE_JOBS`, then
    /// twice the CPU count.
    #[arg(long, global = true)]
    jobs: Option<usize>,

    /// Path to the repository (or a directory under it). Defaults to
    /// `FILTERTREE_GIT_DIR`, then the current directory.
    #[arg(long, global = true)]
    git_dir: Option<PathBuf>,

    /// Suppress the live progress line on stderr.
    #[arg(long, global = true)]
    no_progress: bool,
}

impl GlobalArgs {
    pub fn progress(&self) -> bool {
        !self.no_progress
    }
}

#[derive(Parser)]
#[command(name = "filtertree", version, about = "Rewrite a git tree/commit DAG through a filter")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: FilterCommand,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = FilterTreeConfig::resolve(&cli.global);

    if let Err(err) = cli.command.run(&config) {
        eprintln!("error: {err}");
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(err.exit_code());
    }
}
