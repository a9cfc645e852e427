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

//! The driver (§4.7): enumerates roots, runs the rewrite phase, runs the
//! reference-update phase, and persists the root-map.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::filter::Filter;
use crate::oid::Oid;
use crate::rootmap::RootMapWriter;

/// The external collaborator that resolves a ref to its current commit and
/// retargets it to a rewritten one. Implemented by the CLI crate on top of
/// `git2`; the core engine only depends on this trait.
#[async_trait]
pub trait RefUpdater: Send + Sync {
    async fn resolve(&self, refname: &str) -> EngineResult<Oid>;
    async fn set_target(&self, refname: &str, new_target: &Oid) -> EngineResult<()>;
}

/// Outcome of retargeting a single reference.
#[derive(Debug, Clone)]
pub struct RefUpdateOutcome {
    pub refname: String,
    pub old: Oid,
    pub new: Oid,
    pub changed: bool,
}

/// Orchestrates the two phases described in §4.7 on top of an already
/// constructed [`Engine`].
pub struct Driver<F: Filter> {
    engine: Arc<Engine<F>>,
}

impl<F: Filter> Driver<F> {
    pub fn new(engine: Arc<Engine<F>>) -> Self {
        Self { engine }
    }

    /// Phase 1 + 2: opens the root-map (refusing a stale one), enqueues one
    /// task per root, and drains the scheduler. The root-map is written by a
    /// single dedicated thread reading completed `(old, new)` pairs off a
    /// channel, so appends stay serialized regardless of how many root
    /// tasks finish concurrently (§5 "one writer").
    #[instrument(skip(self, roots, root_map_path))]
    pub async fn rewrite_phase(
        &self,
        roots: Vec<Oid>,
        root_map_path: impl Into<PathBuf>,
    ) -> EngineResult<HashMap<Oid, Oid>> {
        let root_map_path = root_map_path.into();
        info!(count = roots.len(), path = %root_map_path.display(), "starting rewrite phase");

        let (tx, rx) = mpsc::channel::<(Oid, Oid)>();
        let writer_thread = tokio::task::spawn_blocking(move || -> EngineResult<HashMap<Oid, Oid>> {
            let mut writer = RootMapWriter::create(root_map_path)?;
            let mut map = HashMap::new();
            while let Ok((old, new)) = rx.recv() {
                writer.append(&old, &new)?;
                map.insert(old, new);
            }
            Ok(map)
        });

        let handles: Vec<_> = roots
            .into_iter()
            .map(|root| {
                let engine = self.engine.clone();
                self.engine.scheduler().spawn(async move {
                    let result = engine.rewrite_root(root.clone()).await;
                    (root, result)
                })
            })
            .collect();

        let mut first_error = None;
        for handle in handles {
            let (old, result) = handle.await.expect("root rewrite task panicked");
            match result {
                Ok(new) => {
                    // The writer thread only exits once every sender is
                    // dropped, so a send failure here would mean it already
                    // exited abnormally; surface that through the join below.
                    let _ = tx.send((old, new));
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        drop(tx);

        let root_map = writer_thread.await.expect("root-map writer thread panicked")?;
        if let Some(err) = first_error {
            return Err(err);
        }
        info!(rewritten = root_map.len(), "rewrite phase complete");
        Ok(root_map)
    }

    /// Phase 3: retargets every requested ref, skipping (with a warning,
    /// not an error) any ref the rewrite left unchanged.
    #[instrument(skip(self, root_map, refs, ref_updater))]
    pub async fn reference_update_phase(
        &self,
        root_map: &HashMap<Oid, Oid>,
        refs: &[String],
        ref_updater: &dyn RefUpdater,
    ) -> EngineResult<Vec<RefUpdateOutcome>> {
        let mut outcomes = Vec::with_capacity(refs.len());
        for refname in refs {
            let old = ref_updater.resolve(refname).await?;
            let new = root_map.get(&old).cloned().unwrap_or_else(|| old.clone());
            if new == old {
                warn!(refname = %refname, oid = %old, "rewrite left this ref unchanged, skipping");
                outcomes.push(RefUpdateOutcome {
                    refname: refname.clone(),
                    old,
                    new,
                    changed: false,
                });
                continue;
            }
            ref_updater.set_target(refname, &new).await?;
            info!(refname = %refname, old = %old, new = %new, "retargeted ref");
            outcomes.push(RefUpdateOutcome {
                refname: refname.clone(),
                old,
                new,
                changed: true,
            });
        }
        Ok(outcomes)
    }
}
