//! The top-level orchestrator: drives the scheduler, fans events out into jobs,
//! processes jobs against the beacon node and the store, and emits one
//! structured log line per observation.

pub mod scheduler;
pub mod worker;

pub use scheduler::{EventKind, ScheduleEvent, Scheduler};
pub use worker::{Job, JobData, JobProcessor, JobResult, JobType, WorkerPool};

use crate::beacon::{self, BeaconNodeHttpClient, StateId};
use crate::config::Config;
use crate::database::models::{AttestationDuty, AttestationReward, ValidatorPenalty, ValidatorSnapshot};
use crate::database::{ScyllaStore, Store};
use async_trait::async_trait;
use chrono::Utc;
use slog::{error, info, warn, Logger};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bound on how long graceful shutdown may take before the process forces exit.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum Error {
    Beacon(beacon::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<beacon::Error> for Error {
    fn from(e: beacon::Error) -> Self {
        Error::Beacon(e)
    }
}

/// Executes jobs against the beacon node and persists what they observe.
///
/// Write failures are logged and do not fail the job: the constructed rows are
/// still returned so the result consumer can emit them to the log stream.
pub struct Processor {
    beacon: Arc<BeaconNodeHttpClient>,
    store: Arc<dyn Store>,
    validators: Arc<Vec<u64>>,
    log: Logger,
}

impl Processor {
    pub fn new(
        beacon: Arc<BeaconNodeHttpClient>,
        store: Arc<dyn Store>,
        validators: Arc<Vec<u64>>,
        log: Logger,
    ) -> Self {
        Self {
            beacon,
            store,
            validators,
            log,
        }
    }

    async fn process_status_job(&self, job: &Job) -> Result<JobData, Error> {
        let validator = self
            .beacon
            .get_beacon_states_validator_id(StateId::Head, job.validator_index)
            .await?;

        let snapshot = ValidatorSnapshot {
            validator_index: job.validator_index,
            slot: job.slot,
            status: validator.status,
            balance: validator.balance,
            effective_balance: validator.validator.effective_balance,
            timestamp: Some(Utc::now()),
        };

        if let Err(e) = self.store.save_validator_snapshot(&snapshot).await {
            error!(
                self.log,
                "Failed to save validator snapshot";
                "validator_index" => job.validator_index,
                "error" => ?e,
            );
        }

        Ok(JobData::Snapshot(snapshot))
    }

    async fn process_duties_job(&self, job: &Job) -> Result<JobData, Error> {
        let response = self
            .beacon
            .post_validator_duties_attester(job.epoch, &self.validators)
            .await?;

        let now = Utc::now();
        let duties: Vec<AttestationDuty> = response
            .data
            .iter()
            .map(|duty| AttestationDuty {
                validator_index: duty.validator_index,
                epoch: job.epoch,
                slot: duty.slot,
                committee_index: duty.committee_index as i32,
                committee_position: duty.validator_committee_index as i32,
                timestamp: Some(now),
            })
            .collect();

        if let Err(e) = self.store.save_attestation_duties(&duties).await {
            error!(
                self.log,
                "Failed to save attestation duties";
                "epoch" => job.epoch.as_u64(),
                "error" => ?e,
            );
        }

        Ok(JobData::Duties(duties))
    }

    async fn process_rewards_job(&self, job: &Job) -> Result<JobData, Error> {
        let response = self
            .beacon
            .post_beacon_rewards_attestations(job.epoch, &self.validators)
            .await?;

        let now = Utc::now();
        let mut rewards = Vec::with_capacity(response.total_rewards.len());
        let mut penalties = Vec::new();

        for entry in &response.total_rewards {
            let reward = AttestationReward::new(
                entry.validator_index,
                job.epoch,
                entry.head,
                entry.source,
                entry.target,
                now,
            );
            if reward.is_penalty() {
                penalties.push(ValidatorPenalty::attestation_miss(&reward, job.slot));
            }
            rewards.push(reward);
        }

        if let Err(e) = self.store.save_attestation_rewards(&rewards).await {
            error!(
                self.log,
                "Failed to save attestation rewards";
                "epoch" => job.epoch.as_u64(),
                "error" => ?e,
            );
        }

        for penalty in &penalties {
            if let Err(e) = self.store.save_validator_penalty(penalty).await {
                error!(
                    self.log,
                    "Failed to save validator penalty";
                    "validator_index" => penalty.validator_index,
                    "epoch" => penalty.epoch.as_u64(),
                    "error" => ?e,
                );
            }
        }

        Ok(JobData::Rewards(rewards))
    }
}

#[async_trait]
impl JobProcessor for Processor {
    async fn process(&self, job: Job) -> Result<JobData, Error> {
        match job.job_type {
            JobType::Status => self.process_status_job(&job).await,
            JobType::Duties => self.process_duties_job(&job).await,
            JobType::Rewards => self.process_rewards_job(&job).await,
        }
    }
}

pub struct Monitor {
    pool: WorkerPool,
    tick_handle: JoinHandle<()>,
    consumer_handle: JoinHandle<()>,
    log: Logger,
}

impl Monitor {
    /// Initializes the scheduler (fetching genesis), checks node sync, and
    /// launches the worker pool, the result consumer and the tick loop.
    pub async fn start(
        config: &Config,
        beacon: Arc<BeaconNodeHttpClient>,
        store: Arc<dyn Store>,
        shutdown: CancellationToken,
        log: Logger,
    ) -> Result<Self, Error> {
        let validators = Arc::new(config.validators.clone());

        let scheduler = Scheduler::initialize(
            beacon.clone(),
            validators.clone(),
            config.polling_interval_slots,
            log.clone(),
        )
        .await?;

        match beacon.is_node_synced().await {
            Ok(true) => info!(log, "Beacon node is fully synced"),
            Ok(false) => {
                warn!(log, "Beacon node is still syncing, results may be incomplete")
            }
            Err(e) => {
                warn!(log, "Failed to check beacon node sync status"; "error" => ?e)
            }
        }

        let processor = Arc::new(Processor::new(
            beacon,
            store,
            validators.clone(),
            log.clone(),
        ));
        let (pool, result_rx) = WorkerPool::spawn(
            config.worker_pool_size,
            processor,
            shutdown.clone(),
            log.clone(),
        );

        let consumer_handle = tokio::spawn(process_results(result_rx, log.clone()));
        let tick_handle = tokio::spawn(tick_loop(scheduler, pool.sender(), shutdown, log.clone()));

        info!(
            log,
            "Monitor started";
            "validators" => validators.len(),
            "workers" => config.worker_pool_size,
        );

        Ok(Self {
            pool,
            tick_handle,
            consumer_handle,
            log,
        })
    }

    /// Waits for the tick loop to observe cancellation, closes the job intake,
    /// joins the workers and drains the result consumer.
    pub async fn stop(self) {
        info!(self.log, "Stopping monitor");
        let _ = self.tick_handle.await;
        self.pool.stop().await;
        let _ = self.consumer_handle.await;
        info!(self.log, "Monitor stopped");
    }
}

/// Connects the store and the beacon node, runs the monitor until SIGINT or
/// SIGTERM, then shuts down within [`SHUTDOWN_TIMEOUT`].
pub async fn run_monitor(config: Config, log: Logger) -> Result<(), String> {
    info!(
        log,
        "Connecting to store";
        "hosts" => format!("{:?}", config.store.hosts),
        "keyspace" => &config.store.keyspace,
    );
    let store = ScyllaStore::connect(&config.store, log.clone())
        .await
        .map_err(|e| format!("Failed to connect to store: {}", e))?;

    let shutdown = CancellationToken::new();
    let beacon = Arc::new(
        BeaconNodeHttpClient::new(&config, shutdown.clone(), log.clone())
            .map_err(|e| format!("Failed to build beacon client: {}", e))?,
    );

    let monitor = Monitor::start(&config, beacon, Arc::new(store), shutdown.clone(), log.clone())
        .await
        .map_err(|e| format!("Failed to start monitor: {}", e))?;

    wait_for_shutdown_signal(&log).await;
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, monitor.stop()).await {
        Ok(()) => info!(log, "Graceful shutdown completed"),
        Err(_) => warn!(log, "Shutdown timed out, forcing exit"),
    }

    Ok(())
}

async fn wait_for_shutdown_signal(log: &Logger) {
    use tokio::signal::unix::{signal, SignalKind};

    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(log, "Failed to install SIGTERM handler"; "error" => ?e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!(log, "Received shutdown signal"; "signal" => "SIGINT")
        }
        _ = sigterm => {
            info!(log, "Received shutdown signal"; "signal" => "SIGTERM")
        }
    }
}

async fn tick_loop(
    mut scheduler: Scheduler,
    job_tx: mpsc::Sender<Job>,
    shutdown: CancellationToken,
    log: Logger,
) {
    loop {
        let slot = tokio::select! {
            _ = shutdown.cancelled() => return,
            slot = scheduler.wait_for_interval() => slot,
        };

        let events = scheduler.next_events(slot).await;
        for event in events {
            if submit_event(&event, &job_tx, &shutdown).await.is_err() {
                return;
            }
        }

        slog::debug!(log, "Tick processed"; "slot" => slot.as_u64());
    }
}

/// Expands one schedule event into jobs and submits them, blocking on
/// back-pressure. Fails only when the pool is gone or shutdown began.
async fn submit_event(
    event: &ScheduleEvent,
    job_tx: &mpsc::Sender<Job>,
    shutdown: &CancellationToken,
) -> Result<(), ()> {
    match event.kind {
        EventKind::SlotPoll => {
            for &validator_index in event.validators.iter() {
                let job = Job {
                    job_type: JobType::Status,
                    validator_index,
                    slot: event.slot,
                    epoch: event.epoch,
                };
                submit_job(job_tx, shutdown, job).await?;
            }
        }
        EventKind::EpochBoundary => {
            let job = Job {
                job_type: JobType::Duties,
                validator_index: 0,
                slot: event.slot,
                epoch: event.epoch,
            };
            submit_job(job_tx, shutdown, job).await?;
        }
        EventKind::EpochFinalized => {
            let job = Job {
                job_type: JobType::Rewards,
                validator_index: 0,
                slot: event.slot,
                epoch: event.epoch,
            };
            submit_job(job_tx, shutdown, job).await?;
        }
    }
    Ok(())
}

async fn submit_job(
    job_tx: &mpsc::Sender<Job>,
    shutdown: &CancellationToken,
    job: Job,
) -> Result<(), ()> {
    tokio::select! {
        _ = shutdown.cancelled() => Err(()),
        sent = job_tx.send(job) => sent.map_err(|_| ()),
    }
}

/// Emits one structured log line per logical observation.
async fn process_results(mut results: mpsc::Receiver<JobResult>, log: Logger) {
    while let Some(result) = results.recv().await {
        match result.data {
            Err(e) => {
                error!(
                    log,
                    "Job failed";
                    "job_type" => ?result.job.job_type,
                    "slot" => result.job.slot.as_u64(),
                    "epoch" => result.job.epoch.as_u64(),
                    "validator_index" => result.job.validator_index,
                    "error" => ?e,
                );
            }
            Ok(JobData::Snapshot(snapshot)) => {
                info!(
                    log,
                    "validator_status";
                    "slot" => snapshot.slot.as_u64(),
                    "validator_index" => snapshot.validator_index,
                    "status" => &snapshot.status,
                    "effective_balance_gwei" => snapshot.effective_balance,
                    "balance_gwei" => snapshot.balance,
                );
            }
            Ok(JobData::Duties(duties)) => {
                for duty in &duties {
                    info!(
                        log,
                        "attestation_duty";
                        "slot" => duty.slot.as_u64(),
                        "epoch" => duty.epoch.as_u64(),
                        "validator_index" => duty.validator_index,
                        "committee_index" => duty.committee_index,
                        "committee_position" => duty.committee_position,
                    );
                }
            }
            Ok(JobData::Rewards(rewards)) => {
                for reward in &rewards {
                    info!(
                        log,
                        "attestation_reward";
                        "epoch" => reward.epoch.as_u64(),
                        "validator_index" => reward.validator_index,
                        "head_reward" => reward.head_reward,
                        "source_reward" => reward.source_reward,
                        "target_reward" => reward.target_reward,
                        "total_reward_gwei" => reward.total_reward,
                        "duty_success" => reward.total_reward >= 0,
                    );
                }
            }
        }
    }
}
