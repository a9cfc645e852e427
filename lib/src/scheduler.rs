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

//! The cooperative scheduler: a bounded pool of worker slots for rewrite
//! tasks, backed by tokio's blocking-thread pool for object-store I/O.

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::runtime::Builder;
use tokio::runtime::Runtime;
use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

tokio::task_local! {
    /// The worker slot a `Scheduler::spawn`-ed task currently holds, if any.
    /// [`Scheduler::suspend`] takes it out for the duration of an inner
    /// await so a task blocked on its own children doesn't starve them of
    /// the slot they need to run (§5: "spawning a child rewrite and
    /// awaiting its result" is a suspension point, and a suspended task
    /// holds no slot).
    static CURRENT_PERMIT: RefCell<Option<OwnedSemaphorePermit>>;
}

/// A `(done, total, elapsed)` snapshot, reported after every completed task.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
    pub elapsed: Duration,
}

pub type ProgressHook = Arc<dyn Fn(Progress) + Send + Sync>;

/// Bounds concurrency across the whole rewrite DAG, not just the root
/// commits/trees the driver enqueues: every entry rewrite spawned via
/// [`Scheduler::spawn`] competes for the same `jobs` worker slots, and the
/// total work count grows as parent rewrites discover and spawn children
/// (§4.4's "tasks enqueue further tasks" edge case).
pub struct Scheduler {
    runtime: Runtime,
    permits: Arc<Semaphore>,
    done: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    start: Instant,
    progress: Option<ProgressHook>,
}

impl Scheduler {
    /// `jobs` bounds both the number of concurrently in-flight rewrite tasks
    /// and the size of the blocking-I/O thread pool backing them, matching
    /// the `2 × cpu_count` default from §4.4/§5. Pass `None` to use that
    /// default.
    pub fn new(jobs: Option<usize>) -> std::io::Result<Self> {
        let jobs = jobs.unwrap_or_else(|| 2 * num_cpus());
        let runtime = Builder::new_current_thread()
            .enable_time()
            .max_blocking_threads(jobs)
            .build()?;
        Ok(Self {
            runtime,
            permits: Arc::new(Semaphore::new(jobs)),
            done: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(0)),
            start: Instant::now(),
            progress: None,
        })
    }

    pub fn with_progress_hook(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    /// Runs `fut` to completion on the single-threaded orchestration runtime.
    /// This is the one blocking call in the whole crate: everything inside
    /// `fut` is cooperative `async` code, or delegates blocking work via
    /// [`Scheduler::spawn_blocking`].
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Admits one more task into the bounded pool. The task count (and thus
    /// the progress line's `TOTAL`) is incremented immediately, before the
    /// task acquires a worker slot or does any I/O — so concurrent callers
    /// enqueueing more work for the same run always see a consistent total.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.total.fetch_add(1, Ordering::SeqCst);
        let permits = self.permits.clone();
        let done = self.done.clone();
        let total = self.total.clone();
        let start = self.start;
        let progress = self.progress.clone();
        self.runtime.spawn(CURRENT_PERMIT.scope(RefCell::new(None), async move {
            let permit = permits
                .acquire_owned()
                .await
                .expect("scheduler semaphore never closes");
            CURRENT_PERMIT.with(|cell| *cell.borrow_mut() = Some(permit));
            let result = fut.await;
            CURRENT_PERMIT.with(|cell| cell.borrow_mut().take());
            let done_so_far = done.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(hook) = &progress {
                hook(Progress {
                    done: done_so_far,
                    total: total.load(Ordering::SeqCst),
                    elapsed: start.elapsed(),
                });
            }
            result
        }))
    }

    /// Runs `fut`, releasing this task's worker slot (if it holds one, i.e.
    /// if the calling task was itself started via [`Scheduler::spawn`]) for
    /// the duration, and reacquiring a slot afterward before returning.
    ///
    /// Every rewrite that recurses — a tree awaiting its children's rewrite
    /// tasks, a commit awaiting its tree and parents — must wrap that await
    /// in `suspend`. Otherwise a task holding the pool's last slot while
    /// blocked on children that need a slot of their own deadlocks outright,
    /// which would make `jobs = 1` (the serialized run in the cross-run
    /// determinism property, §8) hang forever instead of just running
    /// sequentially.
    pub async fn suspend<F: Future>(&self, fut: F) -> F::Output {
        let held = CURRENT_PERMIT
            .try_with(|cell| cell.borrow_mut().take())
            .unwrap_or(None);
        let holding = held.is_some();
        // Actually release the slot for the duration of `fut`, not just
        // detach it from the task-local: dropping it here is what lets a
        // child spawned by `fut` acquire it.
        drop(held);
        let result = fut.await;
        if holding {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .expect("scheduler semaphore never closes");
            let _ = CURRENT_PERMIT.try_with(|cell| *cell.borrow_mut() = Some(permit));
        }
        result
    }

    /// Dispatches blocking work (object-store I/O, external commands) onto
    /// tokio's blocking-thread pool, sized by `jobs` at construction. Does
    /// not count against the worker-slot semaphore: a task awaiting a
    /// blocking call has already suspended, freeing its slot for other
    /// orchestration work per §5's suspension-point rules.
    pub async fn spawn_blocking<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .expect("blocking task panicked")
    }

    pub fn done_count(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

fn num_cpus() -> usize {
    num_cpus::get()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn spawned_tasks_all_complete_and_progress_reports_final_total() {
        let scheduler = Scheduler::new(Some(4)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_hook = seen.clone();
        let scheduler =
            scheduler.with_progress_hook(Arc::new(move |p: Progress| {
                seen_for_hook.lock().unwrap().push((p.done, p.total));
            }));

        scheduler.block_on(async {
            let handles: Vec<_> = (0..8)
                .map(|i| scheduler.spawn(async move { i * 2 }))
                .collect();
            let mut results = Vec::new();
            for h in handles {
                results.push(h.await.unwrap());
            }
            assert_eq!(results, (0..8).map(|i| i * 2).collect::<Vec<_>>());
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 8);
        assert!(seen.iter().all(|&(_, total)| total == 8));
        assert_eq!(seen.last().unwrap().0, 8);
    }
}
