// ============================================================
// Layer 4: Batch Provider
// ============================================================
// Feeds batches to the fit loop, one epoch at a time, from any
// Burn Dataset through any Burn Batcher.
//
// Ordering:
//   - without shuffle, batches follow the dataset order exactly
//   - with shuffle(seed), a StdRng owned by the provider permutes
//     the dataset at the start of every epoch; two providers built
//     with the same seed replay the same sequence of epochs
//
// Workers:
//   - num_workers == 0 collates on the caller's thread
//   - num_workers  > 0 spawns that many threads once; they live
//     until the provider is dropped and serve every epoch
//
//   For an epoch of K batches, batch k goes to worker k % W. Each
//   worker answers through its own bounded channel (depth 2), and
//   the epoch iterator reads channel k % W for batch k. Workers
//   finish their batches in order, so delivery order is the same
//   as the single-threaded order whatever W is. `next()` blocks
//   while the owning worker is still collating.
//
//   Dropping an epoch iterator early closes its channels; workers
//   notice on their next send and go back to waiting for work.
//
//   A panic inside the batcher is caught on the worker, shipped
//   through the channel in place of the batch, and resumed on the
//   consumer thread when that batch is requested. The worker exits
//   afterwards, so a later epoch on the same provider panics too.

use anyhow::{ensure, Context, Result};
use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        mpsc::{self, Receiver, Sender, SyncSender},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
};

const PREFETCH_PER_WORKER: usize = 2;

type SharedDataset<I> = Arc<dyn Dataset<I>>;
type SharedBatcher<I, O> = Arc<dyn Batcher<I, O> + Send + Sync>;

pub struct BatchProviderBuilder<I, O> {
    batcher:     SharedBatcher<I, O>,
    batch_size:  usize,
    seed:        Option<u64>,
    num_workers: usize,
}

impl<I, O> BatchProviderBuilder<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn new(batcher: impl Batcher<I, O> + Send + Sync + 'static) -> Self {
        Self {
            batcher:     Arc::new(batcher),
            batch_size:  1,
            seed:        None,
            num_workers: 0,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Reshuffle every epoch from an RNG seeded with `seed`.
    pub fn shuffle(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    pub fn build(self, dataset: impl Dataset<I> + 'static) -> Result<BatchProvider<I, O>> {
        ensure!(self.batch_size > 0, "batch_size must be greater than 0");

        let dataset: SharedDataset<I> = Arc::new(dataset);
        let workers = (0..self.num_workers)
            .map(|id| Worker::spawn(id, dataset.clone(), self.batcher.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(BatchProvider {
            dataset,
            batcher: self.batcher,
            batch_size: self.batch_size,
            rng: self.seed.map(|seed| Mutex::new(StdRng::seed_from_u64(seed))),
            workers,
        })
    }
}

pub struct BatchProvider<I, O> {
    dataset:    SharedDataset<I>,
    batcher:    SharedBatcher<I, O>,
    batch_size: usize,
    rng:        Option<Mutex<StdRng>>,
    workers:    Vec<Worker<O>>,
}

impl<I, O> BatchProvider<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub fn num_items(&self) -> usize {
        self.dataset.len()
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Start a new epoch. With shuffling enabled this advances the RNG.
    pub fn iter(&self) -> EpochIter<'_, I, O> {
        let batches = self.epoch_batches();
        let total   = batches.len();

        if self.workers.is_empty() {
            return EpochIter {
                inner: EpochSource::Inline { provider: self, batches: batches.into_iter() },
                next:  0,
                total,
            };
        }

        let worker_count = self.workers.len();
        let mut per_worker: Vec<Vec<Vec<usize>>> = vec![Vec::new(); worker_count];
        for (k, batch) in batches.into_iter().enumerate() {
            per_worker[k % worker_count].push(batch);
        }

        let receivers = self
            .workers
            .iter()
            .zip(per_worker)
            .map(|(worker, batches)| {
                let (results, receiver) = mpsc::sync_channel(PREFETCH_PER_WORKER);
                if worker.jobs.send(EpochJob { batches, results }).is_err() {
                    panic!("batch worker {} is gone and cannot serve this epoch", worker.id);
                }
                receiver
            })
            .collect();

        EpochIter {
            inner: EpochSource::Workers { receivers },
            next:  0,
            total,
        }
    }

    fn epoch_batches(&self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if let Some(rng) = &self.rng {
            let mut rng = rng.lock().unwrap_or_else(PoisonError::into_inner);
            order.shuffle(&mut *rng);
        }
        order.chunks(self.batch_size).map(<[usize]>::to_vec).collect()
    }

    fn collate(&self, indices: &[usize]) -> O {
        self.batcher.batch(gather(self.dataset.as_ref(), indices))
    }
}

impl<I, O> Drop for BatchProvider<I, O> {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            worker.shutdown();
        }
    }
}

/// One pass over the provider's dataset.
pub struct EpochIter<'a, I, O> {
    inner: EpochSource<'a, I, O>,
    next:  usize,
    total: usize,
}

enum EpochSource<'a, I, O> {
    Inline {
        provider: &'a BatchProvider<I, O>,
        batches:  std::vec::IntoIter<Vec<usize>>,
    },
    Workers {
        receivers: Vec<Receiver<thread::Result<O>>>,
    },
}

impl<I, O> Iterator for EpochIter<'_, I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Item = O;

    fn next(&mut self) -> Option<O> {
        if self.next >= self.total {
            return None;
        }
        let k = self.next;
        self.next += 1;

        match &mut self.inner {
            EpochSource::Inline { provider, batches } => {
                batches.next().map(|indices| provider.collate(&indices))
            }
            EpochSource::Workers { receivers } => {
                let owner = k % receivers.len();
                match receivers[owner].recv() {
                    Ok(Ok(batch)) => Some(batch),
                    Ok(Err(payload)) => {
                        self.next = self.total;
                        panic::resume_unwind(payload)
                    }
                    Err(_) => {
                        self.next = self.total;
                        panic!("batch worker {owner} stopped before delivering batch {k}")
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (0, Some(remaining))
    }
}

struct EpochJob<O> {
    batches: Vec<Vec<usize>>,
    results: SyncSender<thread::Result<O>>,
}

struct Worker<O> {
    id:     usize,
    jobs:   Sender<EpochJob<O>>,
    handle: JoinHandle<()>,
}

impl<O: Send + 'static> Worker<O> {
    fn spawn<I: Send + 'static>(
        id: usize,
        dataset: SharedDataset<I>,
        batcher: SharedBatcher<I, O>,
    ) -> Result<Self> {
        let (jobs, inbox) = mpsc::channel::<EpochJob<O>>();
        let handle = thread::Builder::new()
            .name(format!("batch-worker-{id}"))
            .spawn(move || {
                while let Ok(job) = inbox.recv() {
                    for indices in job.batches {
                        let batch = panic::catch_unwind(AssertUnwindSafe(|| {
                            batcher.batch(gather(dataset.as_ref(), &indices))
                        }));
                        let failed = batch.is_err();
                        if job.results.send(batch).is_err() {
                            // epoch abandoned by the consumer
                            break;
                        }
                        if failed {
                            tracing::error!("batch worker {id} panicked while collating; exiting");
                            return;
                        }
                    }
                }
            })
            .with_context(|| format!("Cannot spawn batch worker {id}"))?;

        Ok(Self { id, jobs, handle })
    }
}

impl<O> Worker<O> {
    fn shutdown(self) {
        drop(self.jobs);
        if self.handle.join().is_err() {
            tracing::error!("batch worker {} panicked", self.id);
        }
    }
}

fn gather<I>(dataset: &dyn Dataset<I>, indices: &[usize]) -> Vec<I> {
    indices.iter().filter_map(|&i| dataset.get(i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::InMemDataset;

    /// Passes sample values through so batch contents are easy to check.
    #[derive(Clone)]
    struct IdentityBatcher;

    impl Batcher<usize, Vec<usize>> for IdentityBatcher {
        fn batch(&self, items: Vec<usize>) -> Vec<usize> {
            items
        }
    }

    fn provider(len: usize, batch_size: usize, workers: usize, seed: Option<u64>) -> BatchProvider<usize, Vec<usize>> {
        let mut builder = BatchProviderBuilder::new(IdentityBatcher)
            .batch_size(batch_size)
            .num_workers(workers);
        if let Some(seed) = seed {
            builder = builder.shuffle(seed);
        }
        builder.build(InMemDataset::new((0..len).collect())).unwrap()
    }

    #[test]
    fn test_unshuffled_follows_dataset_order() {
        let p = provider(10, 3, 0, None);
        let batches: Vec<_> = p.iter().collect();
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8], vec![9]]);
        assert_eq!(p.num_batches(), 4);
    }

    #[test]
    fn test_workers_preserve_order_across_epochs() {
        let p = provider(23, 2, 3, None);
        let expected: Vec<Vec<usize>> = (0..23usize).collect::<Vec<_>>().chunks(2).map(|c| c.to_vec()).collect();
        for _ in 0..3 {
            let batches: Vec<_> = p.iter().collect();
            assert_eq!(batches, expected);
        }
    }

    #[test]
    fn test_same_seed_same_batch_order() {
        let a = provider(40, 4, 0, Some(11));
        let b = provider(40, 4, 2, Some(11));
        for _ in 0..3 {
            let from_a: Vec<_> = a.iter().collect();
            let from_b: Vec<_> = b.iter().collect();
            assert_eq!(from_a, from_b);
        }
    }

    #[test]
    fn test_shuffle_changes_between_epochs_and_keeps_all_items() {
        let p = provider(40, 5, 0, Some(5));
        let first: Vec<usize> = p.iter().flatten().collect();
        let second: Vec<usize> = p.iter().flatten().collect();
        assert_ne!(first, second);

        let mut sorted = second.clone();
        sorted.sort();
        assert_eq!(sorted, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_abandoned_epoch_does_not_block_next() {
        let p = provider(30, 2, 2, None);
        let mut epoch = p.iter();
        assert_eq!(epoch.next(), Some(vec![0, 1]));
        drop(epoch);

        let full: Vec<_> = p.iter().collect();
        assert_eq!(full.len(), 15);
        assert_eq!(full[0], vec![0, 1]);
        assert_eq!(full[14], vec![28, 29]);
    }

    /// Panics when it meets item 5.
    #[derive(Clone)]
    struct FailingBatcher;

    impl Batcher<usize, Vec<usize>> for FailingBatcher {
        fn batch(&self, items: Vec<usize>) -> Vec<usize> {
            if items.contains(&5) {
                panic!("bad item 5");
            }
            items
        }
    }

    #[test]
    fn test_batcher_panic_reaches_consumer() {
        for workers in [0, 2] {
            let p = BatchProviderBuilder::new(FailingBatcher)
                .batch_size(2)
                .num_workers(workers)
                .build(InMemDataset::new((0..10usize).collect()))
                .unwrap();

            let result = panic::catch_unwind(AssertUnwindSafe(|| p.iter().collect::<Vec<_>>()));
            let payload = result.expect_err("epoch should not complete");
            assert_eq!(payload.downcast_ref::<&str>(), Some(&"bad item 5"), "workers = {workers}");
        }
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let p = provider(0, 4, 2, Some(1));
        assert_eq!(p.iter().count(), 0);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = BatchProviderBuilder::new(IdentityBatcher)
            .batch_size(0)
            .build(InMemDataset::new(vec![1usize]));
        assert!(result.is_err());
    }
}
