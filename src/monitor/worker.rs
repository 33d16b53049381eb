//! A fixed-size pool of workers draining a bounded job queue.
//!
//! The intake and result channels are both bounded to twice the pool size, so a
//! producer that outruns the workers blocks instead of queueing unbounded
//! catch-up work in memory.

use crate::database::models::{AttestationDuty, AttestationReward, ValidatorSnapshot};
use crate::monitor::Error;
use crate::types::{Epoch, Slot};
use async_trait::async_trait;
use slog::{debug, info, Logger};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    /// Fetch one validator's status and balance.
    Status,
    /// Fetch attestation duties for the whole validator set.
    Duties,
    /// Fetch attestation rewards for the whole validator set.
    Rewards,
}

/// A unit of work for one worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub job_type: JobType,
    /// Only meaningful for `Status` jobs; duties and rewards cover the whole set.
    pub validator_index: u64,
    pub slot: Slot,
    pub epoch: Epoch,
}

/// The payload a successfully processed job produces.
#[derive(Debug, Clone)]
pub enum JobData {
    Snapshot(ValidatorSnapshot),
    Duties(Vec<AttestationDuty>),
    Rewards(Vec<AttestationReward>),
}

#[derive(Debug)]
pub struct JobResult {
    pub job: Job,
    pub data: Result<JobData, Error>,
}

/// The capability a worker invokes for each job.
///
/// The monitor implements this; the pool only ever sees the trait object, which
/// keeps the ownership between the two one-directional.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: Job) -> Result<JobData, Error>;
}

pub struct WorkerPool {
    job_tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    log: Logger,
}

impl WorkerPool {
    /// Spawns `size` workers sharing the given processor and returns the pool
    /// together with the result stream.
    pub fn spawn(
        size: usize,
        processor: Arc<dyn JobProcessor>,
        shutdown: CancellationToken,
        log: Logger,
    ) -> (Self, mpsc::Receiver<JobResult>) {
        let (job_tx, job_rx) = mpsc::channel(size * 2);
        let (result_tx, result_rx) = mpsc::channel(size * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    job_rx.clone(),
                    result_tx.clone(),
                    processor.clone(),
                    shutdown.clone(),
                    log.clone(),
                ))
            })
            .collect();

        info!(log, "Worker pool started"; "workers" => size);

        (
            Self {
                job_tx,
                workers,
                log,
            },
            result_rx,
        )
    }

    /// A handle for submitting jobs. Submission blocks when the intake is full.
    pub fn sender(&self) -> mpsc::Sender<Job> {
        self.job_tx.clone()
    }

    /// Closes the intake and waits for every worker to finish its in-flight job.
    ///
    /// The result channel closes once the last worker exits, which lets the
    /// consumer drain whatever is still buffered.
    pub async fn stop(self) {
        drop(self.job_tx);
        for worker in self.workers {
            let _ = worker.await;
        }
        info!(self.log, "Worker pool stopped");
    }
}

async fn worker_loop(
    id: usize,
    job_rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    result_tx: mpsc::Sender<JobResult>,
    processor: Arc<dyn JobProcessor>,
    shutdown: CancellationToken,
    log: Logger,
) {
    debug!(log, "Worker started"; "worker_id" => id);

    loop {
        let job = {
            let mut rx = job_rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            }
        };

        let data = processor.process(job.clone()).await;
        let result = JobResult { job, data };

        // Results that cannot be delivered after cancellation are dropped.
        tokio::select! {
            _ = shutdown.cancelled() => break,
            sent = result_tx.send(result) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    debug!(log, "Worker shutting down"; "worker_id" => id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::null_logger;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StubProcessor {
        processed: AtomicUsize,
        delay: Duration,
    }

    impl StubProcessor {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                processed: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl JobProcessor for StubProcessor {
        async fn process(&self, job: Job) -> Result<JobData, Error> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(JobData::Snapshot(ValidatorSnapshot {
                validator_index: job.validator_index,
                slot: job.slot,
                status: "active_ongoing".to_string(),
                balance: 0,
                effective_balance: 0,
                timestamp: Some(Utc::now()),
            }))
        }
    }

    fn status_job(validator_index: u64) -> Job {
        Job {
            job_type: JobType::Status,
            validator_index,
            slot: Slot::new(1),
            epoch: Epoch::new(0),
        }
    }

    #[tokio::test]
    async fn all_jobs_produce_results() {
        let processor = StubProcessor::new(Duration::ZERO);
        let shutdown = CancellationToken::new();
        let (pool, mut results) =
            WorkerPool::spawn(4, processor.clone(), shutdown, null_logger());

        // Submit from a separate task: with 20 jobs against bounded channels the
        // producer is expected to hit back-pressure.
        let sender = pool.sender();
        let validators: Vec<u64> = (0..20).collect();
        let to_submit = validators.clone();
        let submitter = tokio::spawn(async move {
            for index in to_submit {
                sender.send(status_job(index)).await.unwrap();
            }
        });

        let mut seen = Vec::new();
        for _ in 0..validators.len() {
            let result = results.recv().await.unwrap();
            assert!(result.data.is_ok());
            seen.push(result.job.validator_index);
        }

        // One result per submitted job, across all workers.
        seen.sort_unstable();
        assert_eq!(seen, validators);
        assert_eq!(processor.processed.load(Ordering::SeqCst), 20);

        submitter.await.unwrap();
        pool.stop().await;
    }

    #[tokio::test]
    async fn stop_joins_workers_after_draining() {
        let processor = StubProcessor::new(Duration::from_millis(5));
        let shutdown = CancellationToken::new();
        let (pool, mut results) =
            WorkerPool::spawn(2, processor.clone(), shutdown, null_logger());

        let sender = pool.sender();
        for index in 0..4 {
            sender.send(status_job(index)).await.unwrap();
        }
        drop(sender);

        let consumer = tokio::spawn(async move {
            let mut count = 0;
            while results.recv().await.is_some() {
                count += 1;
            }
            count
        });

        pool.stop().await;
        assert_eq!(consumer.await.unwrap(), 4);
        assert_eq!(processor.processed.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancellation_stops_workers_promptly() {
        let processor = StubProcessor::new(Duration::from_millis(10));
        let shutdown = CancellationToken::new();
        let (pool, results) =
            WorkerPool::spawn(2, processor, shutdown.clone(), null_logger());

        let sender = pool.sender();
        for index in 0..8 {
            sender.send(status_job(index)).await.unwrap();
        }

        shutdown.cancel();
        drop(sender);
        drop(results);

        tokio::time::timeout(Duration::from_secs(5), pool.stop())
            .await
            .expect("workers must exit promptly after cancellation");
    }
}
