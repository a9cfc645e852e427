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

//! The at-most-one-concurrent-rewrite-per-key memoization cache (§4.3).
//!
//! Three instances of [`MemoCache`] exist per engine run, one per
//! granularity: per-entry (`rewrite_object`), per-tree (`rewrite_tree`), and
//! per-root (`rewrite_root`). Results live for the process lifetime of the
//! run and are never persisted.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::future::FutureExt;
use futures::future::Shared;

type SharedResult<V> = Shared<BoxFuture<'static, Arc<V>>>;

/// A cache keyed by a filter-defined dependency fingerprint. Cheap to clone
/// (an `Arc` around the map), so it can be shared across every spawned
/// rewrite task without the caller threading a reference through.
pub struct MemoCache<K, V> {
    inner: Mutex<HashMap<K, SharedResult<V>>>,
}

impl<K, V> Default for MemoCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached or in-flight result for `key`. If this is the
    /// first call for `key`, `make` is spawned as a `tokio` task
    /// immediately — *before* this function awaits anything — so a second
    /// caller racing in from a sibling task sees the pending entry already
    /// registered and awaits the same computation instead of starting a
    /// duplicate one (the "at-most-one concurrent rewrite per key"
    /// guarantee of §4.3).
    pub async fn get_or_compute<F, Fut>(&self, key: K, make: F) -> Arc<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let shared = {
            let mut map = self.inner.lock().expect("memo cache poisoned");
            if let Some(shared) = map.get(&key) {
                shared.clone()
            } else {
                let task = tokio::spawn(make());
                let shared: SharedResult<V> = async move {
                    Arc::new(task.await.expect("rewrite task panicked"))
                }
                .boxed()
                .shared();
                map.insert(key, shared.clone());
                shared
            }
        };
        shared.await
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("memo cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    #[tokio::test]
    async fn duplicate_keys_invoke_the_computation_once() {
        let cache: Arc<MemoCache<&'static str, u32>> = Arc::new(MemoCache::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let invocations = invocations.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("shared-key", || {
                        let invocations = invocations.clone();
                        async move {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                            42
                        }
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(*handle.await.unwrap(), 42);
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_get_distinct_results() {
        let cache: MemoCache<u32, u32> = MemoCache::new();
        let a = cache.get_or_compute(1, || async { 10 }).await;
        let b = cache.get_or_compute(2, || async { 20 }).await;
        assert_eq!(*a, 10);
        assert_eq!(*b, 20);
        assert_eq!(cache.len(), 2);
    }
}
