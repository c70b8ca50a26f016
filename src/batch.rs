//! Batch partitioning and the two parallel execution strategies.
//!
//! A stage's work list is split into contiguous batches no larger than the
//! worker limit, then every batch is driven through a [`WorkUnit`] by a
//! [`ParallelStrategy`]. The scheduler only depends on the capability, not
//! on which concrete strategy a stage picked, so stages can swap strategies
//! and tests can run everything on a small worker count.
//!
//! ## Why two strategies?
//!
//! The pixel transform is CPU-bound: its batches go through
//! [`ComputeBoundStrategy`], which spawns one runtime task per batch so
//! batches land on distinct worker threads and the heavy section (inside
//! `spawn_blocking` in the unit) keeps every core busy. Reassembly is
//! I/O-bound — store fetch/put dominates — so [`IoBoundStrategy`] runs
//! batches as cooperatively scheduled futures under `buffer_unordered`,
//! which overlaps the network waits without burning threads.
//!
//! Both strategies give the same guarantees: every item is attempted
//! exactly once, batches are independent, and `execute` resolves only when
//! all batches have finished — a full barrier between pipeline stages.
//! A single item's failure is contained to that item: it lands in the
//! report's `failed` list and its siblings keep going.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::error::PageError;
use crate::keys::PageKey;

/// Split an ordered work list into contiguous batches of at most `limit`
/// items. Produces `ceil(len / limit)` batches; concatenating them yields
/// the input unchanged.
pub fn make_batches<T>(items: Vec<T>, limit: usize) -> Vec<Vec<T>> {
    assert!(limit > 0, "batch limit must be ≥ 1");
    if items.is_empty() {
        return Vec::new();
    }
    let mut batches = Vec::with_capacity(items.len().div_ceil(limit));
    let mut current = Vec::with_capacity(limit);
    for item in items {
        current.push(item);
        if current.len() == limit {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(limit)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// One unit of per-page work — downloading, converting, re-uploading one
/// page in whatever way the owning stage defines.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    async fn run(&self, page: &PageKey) -> Result<(), PageError>;
}

/// Outcome of one stage: which items made it, which did not and why.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items whose unit returned `Ok`, in completion order.
    pub succeeded: Vec<PageKey>,
    /// Items whose unit returned `Err`, with the reason.
    pub failed: Vec<(PageKey, PageError)>,
}

impl BatchReport {
    /// Total items attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn merge(&mut self, other: BatchReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
    }
}

/// Drives every batch of a stage to completion.
#[async_trait]
pub trait ParallelStrategy: Send + Sync {
    async fn execute(&self, batches: Vec<Vec<PageKey>>, unit: Arc<dyn WorkUnit>) -> BatchReport;
}

/// Run one batch's items sequentially, collecting per-item outcomes.
///
/// Items inside a batch are deliberately serial — parallelism comes from
/// running batches against each other, matching the worker model where one
/// worker owns one batch.
async fn process_batch(batch: Vec<PageKey>, unit: Arc<dyn WorkUnit>) -> BatchReport {
    let mut report = BatchReport::default();
    for page in batch {
        match unit.run(&page).await {
            Ok(()) => report.succeeded.push(page),
            Err(e) => {
                warn!("{e}");
                report.failed.push((page, e));
            }
        }
    }
    report
}

/// One spawned task per batch: batches run on distinct runtime worker
/// threads, suited to units that burn CPU (their heavy section runs on the
/// blocking pool).
#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeBoundStrategy;

#[async_trait]
impl ParallelStrategy for ComputeBoundStrategy {
    async fn execute(&self, batches: Vec<Vec<PageKey>>, unit: Arc<dyn WorkUnit>) -> BatchReport {
        debug!("compute-bound stage: {} batches", batches.len());
        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            let unit = Arc::clone(&unit);
            let keys = batch.clone();
            let handle = tokio::spawn(process_batch(batch, unit));
            handles.push((keys, handle));
        }

        let mut report = BatchReport::default();
        for (keys, handle) in handles {
            match handle.await {
                Ok(partial) => report.merge(partial),
                // A panicked batch task loses its whole batch; record
                // every item so the report still accounts for all input.
                Err(e) => {
                    warn!("batch worker lost: {e}");
                    for key in keys {
                        let image_key = key.image_key();
                        report.failed.push((
                            key,
                            PageError::WorkerLost {
                                key: image_key,
                                detail: e.to_string(),
                            },
                        ));
                    }
                }
            }
        }
        report
    }
}

/// Batches as cooperatively scheduled futures with bounded fan-out, suited
/// to units dominated by store I/O.
#[derive(Debug, Clone, Copy)]
pub struct IoBoundStrategy {
    /// How many batches may be in flight at once.
    pub concurrency: usize,
}

impl IoBoundStrategy {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl ParallelStrategy for IoBoundStrategy {
    async fn execute(&self, batches: Vec<Vec<PageKey>>, unit: Arc<dyn WorkUnit>) -> BatchReport {
        debug!(
            "io-bound stage: {} batches, {} in flight",
            batches.len(),
            self.concurrency
        );
        let partials: Vec<BatchReport> = stream::iter(batches.into_iter().map(|batch| {
            let unit = Arc::clone(&unit);
            process_batch(batch, unit)
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        let mut report = BatchReport::default();
        for partial in partials {
            report.merge(partial);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn pages(n: usize) -> Vec<PageKey> {
        (0..n).map(|i| PageKey::new("doc", i)).collect()
    }

    #[test]
    fn batches_partition_without_loss() {
        // Deterministic spread of list lengths and worker limits, in place
        // of a property-testing dependency the project does not carry.
        for len in [0usize, 1, 2, 3, 15, 16, 17, 31, 32, 33, 100, 257] {
            for limit in [1usize, 2, 3, 7, 16, 64] {
                let input: Vec<usize> = (0..len).collect();
                let batches = make_batches(input.clone(), limit);

                let expected = len.div_ceil(limit);
                assert_eq!(batches.len(), expected, "len={len} limit={limit}");
                assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= limit));

                let flattened: Vec<usize> = batches.into_iter().flatten().collect();
                assert_eq!(flattened, input, "len={len} limit={limit}");
            }
        }
    }

    #[test]
    fn seventeen_items_on_sixteen_workers_is_two_batches() {
        let batches = make_batches(pages(17), 16);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 16);
        assert_eq!(batches[1].len(), 1);
    }

    /// Counts invocations per key; fails on requested indices.
    struct CountingUnit {
        counts: Mutex<HashMap<usize, usize>>,
        fail_on: Vec<usize>,
    }

    impl CountingUnit {
        fn new(fail_on: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                counts: Mutex::new(HashMap::new()),
                fail_on,
            })
        }
    }

    #[async_trait]
    impl WorkUnit for CountingUnit {
        async fn run(&self, page: &PageKey) -> Result<(), PageError> {
            *self.counts.lock().unwrap().entry(page.index).or_insert(0) += 1;
            if self.fail_on.contains(&page.index) {
                Err(PageError::TransformFailed {
                    key: page.image_key(),
                    detail: "induced".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    async fn assert_exactly_once(strategy: &dyn ParallelStrategy) {
        let unit = CountingUnit::new(vec![]);
        let report = strategy
            .execute(make_batches(pages(17), 4), Arc::clone(&unit) as Arc<dyn WorkUnit>)
            .await;
        assert_eq!(report.succeeded.len(), 17);
        assert!(report.failed.is_empty());
        let counts = unit.counts.lock().unwrap();
        assert_eq!(counts.len(), 17);
        assert!(counts.values().all(|&c| c == 1), "some item ran twice");
    }

    #[tokio::test]
    async fn compute_bound_attempts_each_item_once() {
        assert_exactly_once(&ComputeBoundStrategy).await;
    }

    #[tokio::test]
    async fn io_bound_attempts_each_item_once() {
        assert_exactly_once(&IoBoundStrategy::new(4)).await;
    }

    #[tokio::test]
    async fn item_failure_does_not_cancel_siblings() {
        let unit = CountingUnit::new(vec![0, 5]);
        let report = IoBoundStrategy::new(2)
            .execute(make_batches(pages(8), 3), unit as Arc<dyn WorkUnit>)
            .await;
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.succeeded.len(), 6);
        assert_eq!(report.attempted(), 8);
    }
}
