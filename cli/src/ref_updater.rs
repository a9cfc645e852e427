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

//! The git2-backed [`filtertree_lib::RefUpdater`] (§4.7 expansion): a
//! direct, idiomatic replacement for shelling out to `git update-ref` the
//! way the original prototype's `filter_branch` helper did.

use std::sync::Arc;

use async_trait::async_trait;
use filtertree_lib::backend::git2_backend::GitStore;
use filtertree_lib::EngineResult;
use filtertree_lib::Oid;
use filtertree_lib::RefUpdater;

pub struct Git2RefUpdater {
    store: Arc<GitStore>,
}

impl Git2RefUpdater {
    pub fn new(store: Arc<GitStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RefUpdater for Git2RefUpdater {
    async fn resolve(&self, refname: &str) -> EngineResult<Oid> {
        Ok(self.store.resolve_ref(refname).await?)
    }

    async fn set_target(&self, refname: &str, new_target: &Oid) -> EngineResult<()> {
        Ok(self.store.set_ref_target(refname, new_target).await?)
    }
}
