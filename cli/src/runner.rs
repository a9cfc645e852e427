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

//! Wires a concrete [`Filter`] up to the store, scheduler, engine, and
//! driver and runs the phases described in §4.7, generic over which
//! subcommand dispatched it.
//!
//! Everything below runs on the one [`Scheduler`]-owned runtime: the
//! scheduler is the only thing in this crate allowed to call
//! `Runtime::block_on`, so opening the store and resolving roots happens
//! inside the same `block_on` as the rewrite itself rather than on a
//! separate ad hoc runtime.

use std::io::BufRead;
use std::io::Write;
use std::sync::Arc;

use filtertree_lib::backend::git2_backend::GitStore;
use filtertree_lib::progress::format_progress_line;
use filtertree_lib::Driver;
use filtertree_lib::Engine;
use filtertree_lib::EngineError;
use filtertree_lib::Filter;
use filtertree_lib::ObjectStore;
use filtertree_lib::Oid;
use filtertree_lib::Scheduler;
use tracing::info;
use tracing::warn;

use crate::command_error::CommandError;
use crate::commands::RootSelection;
use crate::config::FilterTreeConfig;
use crate::ref_updater::Git2RefUpdater;
use crate::revlist::RevList;

pub fn run<F: Filter>(
    config: &FilterTreeConfig,
    roots_arg: &RootSelection,
    filter: F,
) -> Result<(), CommandError> {
    let mut scheduler = Scheduler::new(config.jobs).map_err(EngineError::from)?;
    if config.progress {
        scheduler = scheduler.with_progress_hook(Arc::new(|progress| {
            eprint!("\r{}", format_progress_line(progress));
            let _ = std::io::stderr().flush();
        }));
    }
    let scheduler = Arc::new(scheduler);

    let result = scheduler.block_on(run_async(config, roots_arg, filter, scheduler.clone()));
    if config.progress {
        eprintln!();
    }
    result
}

async fn run_async<F: Filter>(
    config: &FilterTreeConfig,
    roots_arg: &RootSelection,
    filter: F,
    scheduler: Arc<Scheduler>,
) -> Result<(), CommandError> {
    let store = Arc::new(GitStore::discover(config.discovery_root()).map_err(EngineError::from)?);
    let git_dir = store.git_dir().await;

    let (roots, refs_to_update) = if roots_arg.refs.is_empty() {
        (read_roots_from_stdin()?, Vec::new())
    } else {
        let commits = RevList::new(&git_dir).expand(&roots_arg.refs)?;
        let mut updatable = Vec::new();
        for refspec in &roots_arg.refs {
            if store.is_ref(refspec).await {
                updatable.push(refspec.clone());
            }
        }
        (commits, updatable)
    };

    let object_store: Arc<dyn ObjectStore> = store.clone();
    let engine = Engine::new(object_store, scheduler, Arc::new(filter));
    let driver = Driver::new(engine);

    let root_map_dir = git_dir.join("filtertree");
    std::fs::create_dir_all(&root_map_dir)?;
    let root_map_path = root_map_dir.join("root-map");

    info!(roots = roots.len(), "starting rewrite");
    let root_map = driver.rewrite_phase(roots, root_map_path).await?;
    if !refs_to_update.is_empty() {
        let ref_updater = Git2RefUpdater::new(store);
        let outcomes = driver
            .reference_update_phase(&root_map, &refs_to_update, &ref_updater)
            .await?;
        for outcome in outcomes {
            if outcome.changed {
                println!("{}: {} -> {}", outcome.refname, outcome.old, outcome.new);
            } else {
                warn!(refname = %outcome.refname, "rewrite left this ref unchanged");
            }
        }
    }
    Ok(())
}

fn read_roots_from_stdin() -> Result<Vec<Oid>, CommandError> {
    let stdin = std::io::stdin();
    let mut roots = Vec::new();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        roots.push(Oid::from_hex(line).map_err(|err| CommandError::BadOid(line.to_string(), err))?);
    }
    Ok(roots)
}
