pub mod error;
pub mod memory;
pub mod models;
pub mod schema;

pub use error::Error;
pub use memory::MemoryStore;
pub use models::{
    AttestationDuty, AttestationReward, ValidatorPenalty, ValidatorSnapshot,
    PENALTY_ATTESTATION_MISS,
};

use crate::config::StoreConfig;
use crate::types::{Epoch, Slot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::batch::{Batch, BatchType};
use scylla::prepared_statement::PreparedStatement;
use scylla::statement::Consistency;
use scylla::transport::ExecutionProfile;
use scylla::{Session, SessionBuilder};
use slog::{debug, info, Logger};
use std::collections::BTreeMap;

const INSERT_SNAPSHOT: &str = "INSERT INTO validator_snapshots \
     (validator_index, slot, status, balance, effective_balance, timestamp) \
     VALUES (?, ?, ?, ?, ?, ?)";

const INSERT_DUTY: &str = "INSERT INTO attestation_duties \
     (validator_index, epoch, slot, committee_index, committee_position, timestamp) \
     VALUES (?, ?, ?, ?, ?, ?)";

const INSERT_REWARD: &str = "INSERT INTO attestation_rewards \
     (validator_index, epoch, head_reward, source_reward, target_reward, total_reward, timestamp) \
     VALUES (?, ?, ?, ?, ?, ?, ?)";

const INSERT_PENALTY: &str = "INSERT INTO validator_penalties \
     (validator_index, epoch, slot, penalty_type, penalty_gwei, timestamp) \
     VALUES (?, ?, ?, ?, ?, ?)";

const SELECT_SNAPSHOTS: &str = "SELECT validator_index, slot, status, balance, \
     effective_balance, timestamp FROM validator_snapshots \
     WHERE validator_index = ? AND slot >= ? AND slot <= ? ORDER BY slot DESC";

const SELECT_LATEST_SNAPSHOT: &str = "SELECT validator_index, slot, status, balance, \
     effective_balance, timestamp FROM validator_snapshots \
     WHERE validator_index = ? ORDER BY slot DESC LIMIT 1";

const SELECT_REWARDS: &str = "SELECT validator_index, epoch, head_reward, source_reward, \
     target_reward, total_reward, timestamp FROM attestation_rewards \
     WHERE validator_index = ? AND epoch >= ? AND epoch <= ? ORDER BY epoch DESC";

/// The persistence capability the monitor depends on.
///
/// Every write is an upsert over the row's primary key: re-issuing the same
/// write with the same payload has no observable effect, so rows are safe to
/// replay after partial failures.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_validator_snapshot(&self, snapshot: &ValidatorSnapshot) -> Result<(), Error>;

    async fn save_attestation_duties(&self, duties: &[AttestationDuty]) -> Result<(), Error>;

    async fn save_attestation_rewards(&self, rewards: &[AttestationReward]) -> Result<(), Error>;

    async fn save_validator_penalty(&self, penalty: &ValidatorPenalty) -> Result<(), Error>;
}

/// A `Store` backed by a ScyllaDB (or Cassandra) cluster.
pub struct ScyllaStore {
    session: Session,
    insert_snapshot: PreparedStatement,
    insert_duty: PreparedStatement,
    insert_reward: PreparedStatement,
    insert_penalty: PreparedStatement,
    log: Logger,
}

impl ScyllaStore {
    /// Connects to the cluster and bootstraps the schema: keyspace, tables and
    /// the per-table retention TTL.
    pub async fn connect(config: &StoreConfig, log: Logger) -> Result<Self, Error> {
        let consistency = parse_consistency(&config.consistency)?;

        let profile = ExecutionProfile::builder()
            .consistency(consistency)
            .request_timeout(Some(config.timeout()))
            .build();

        let session = SessionBuilder::new()
            .known_nodes(&config.hosts)
            .connection_timeout(config.timeout())
            .default_execution_profile_handle(profile.into_handle())
            .build()
            .await?;

        session
            .query(
                schema::create_keyspace_cql(&config.keyspace, config.replication_factor),
                (),
            )
            .await?;
        session.use_keyspace(&config.keyspace, false).await?;

        info!(log, "Running store migrations"; "keyspace" => &config.keyspace);
        for migration in schema::MIGRATIONS {
            session.query(*migration, ()).await?;
        }

        for table in schema::TABLES {
            session
                .query(schema::set_ttl_cql(table, config.ttl_seconds()), ())
                .await?;
            debug!(log, "Set table TTL"; "table" => table, "ttl_seconds" => config.ttl_seconds());
        }

        let insert_snapshot = session.prepare(INSERT_SNAPSHOT).await?;
        let insert_duty = session.prepare(INSERT_DUTY).await?;
        let insert_reward = session.prepare(INSERT_REWARD).await?;
        let insert_penalty = session.prepare(INSERT_PENALTY).await?;

        info!(log, "Store migrations completed");

        Ok(Self {
            session,
            insert_snapshot,
            insert_duty,
            insert_reward,
            insert_penalty,
            log,
        })
    }

    /// Snapshots for a validator within a slot range, newest first.
    pub async fn validator_snapshots(
        &self,
        validator_index: u64,
        from_slot: Slot,
        to_slot: Slot,
    ) -> Result<Vec<ValidatorSnapshot>, Error> {
        let result = self
            .session
            .query(
                SELECT_SNAPSHOTS,
                (validator_index as i64, from_slot.as_i64(), to_slot.as_i64()),
            )
            .await?;

        let mut snapshots = Vec::new();
        for row in typed_rows::<SnapshotRow>(result)? {
            snapshots.push(snapshot_from_row(row));
        }
        Ok(snapshots)
    }

    /// The most recent snapshot for a validator, if any.
    pub async fn latest_snapshot(
        &self,
        validator_index: u64,
    ) -> Result<Option<ValidatorSnapshot>, Error> {
        let result = self
            .session
            .query(SELECT_LATEST_SNAPSHOT, (validator_index as i64,))
            .await?;

        Ok(typed_rows::<SnapshotRow>(result)?
            .into_iter()
            .next()
            .map(snapshot_from_row))
    }

    /// Reward rows for a validator within an epoch range, newest first.
    pub async fn attestation_rewards(
        &self,
        validator_index: u64,
        from_epoch: Epoch,
        to_epoch: Epoch,
    ) -> Result<Vec<AttestationReward>, Error> {
        let result = self
            .session
            .query(
                SELECT_REWARDS,
                (
                    validator_index as i64,
                    from_epoch.as_i64(),
                    to_epoch.as_i64(),
                ),
            )
            .await?;

        let mut rewards = Vec::new();
        for (index, epoch, head, source, target, total, timestamp) in
            typed_rows::<RewardRow>(result)?
        {
            rewards.push(AttestationReward {
                validator_index: index as u64,
                epoch: Epoch::new(epoch as u64),
                head_reward: head,
                source_reward: source,
                target_reward: target,
                total_reward: total,
                timestamp: Some(timestamp),
            });
        }
        Ok(rewards)
    }
}

type SnapshotRow = (i64, i64, String, i64, i64, DateTime<Utc>);
type RewardRow = (i64, i64, i64, i64, i64, i64, DateTime<Utc>);

fn typed_rows<R: scylla::cql_to_rust::FromRow>(result: scylla::QueryResult) -> Result<Vec<R>, Error> {
    result
        .rows_typed::<R>()
        .map_err(|e| Error::Other(format!("unexpected result shape: {:?}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Other(format!("unable to decode row: {:?}", e)))
}

fn snapshot_from_row(row: SnapshotRow) -> ValidatorSnapshot {
    let (index, slot, status, balance, effective_balance, timestamp) = row;
    ValidatorSnapshot {
        validator_index: index as u64,
        slot: Slot::new(slot as u64),
        status,
        balance: balance as u64,
        effective_balance: effective_balance as u64,
        timestamp: Some(timestamp),
    }
}

fn parse_consistency(level: &str) -> Result<Consistency, Error> {
    match level.to_lowercase().as_str() {
        "any" => Ok(Consistency::Any),
        "one" => Ok(Consistency::One),
        "two" => Ok(Consistency::Two),
        "three" => Ok(Consistency::Three),
        "quorum" => Ok(Consistency::Quorum),
        "all" => Ok(Consistency::All),
        "local_quorum" => Ok(Consistency::LocalQuorum),
        "each_quorum" => Ok(Consistency::EachQuorum),
        "local_one" => Ok(Consistency::LocalOne),
        other => Err(Error::UnknownConsistency(other.to_string())),
    }
}

/// Groups rows by partition key so batches never span partitions.
fn group_by_partition<T>(rows: &[T], key: impl Fn(&T) -> u64) -> Vec<Vec<&T>> {
    let mut groups: BTreeMap<u64, Vec<&T>> = BTreeMap::new();
    for row in rows {
        groups.entry(key(row)).or_default().push(row);
    }
    groups.into_values().collect()
}

#[async_trait]
impl Store for ScyllaStore {
    async fn save_validator_snapshot(&self, snapshot: &ValidatorSnapshot) -> Result<(), Error> {
        self.session
            .execute(
                &self.insert_snapshot,
                (
                    snapshot.validator_index as i64,
                    snapshot.slot.as_i64(),
                    snapshot.status.as_str(),
                    snapshot.balance as i64,
                    snapshot.effective_balance as i64,
                    snapshot.timestamp.unwrap_or_else(Utc::now),
                ),
            )
            .await?;
        Ok(())
    }

    async fn save_attestation_duties(&self, duties: &[AttestationDuty]) -> Result<(), Error> {
        for group in group_by_partition(duties, |d| d.validator_index) {
            if let [duty] = group.as_slice() {
                self.session
                    .execute(
                        &self.insert_duty,
                        (
                            duty.validator_index as i64,
                            duty.epoch.as_i64(),
                            duty.slot.as_i64(),
                            duty.committee_index,
                            duty.committee_position,
                            duty.timestamp.unwrap_or_else(Utc::now),
                        ),
                    )
                    .await?;
                continue;
            }

            let mut batch = Batch::new(BatchType::Unlogged);
            let mut values = Vec::with_capacity(group.len());
            for duty in group {
                batch.append_statement(self.insert_duty.clone());
                values.push((
                    duty.validator_index as i64,
                    duty.epoch.as_i64(),
                    duty.slot.as_i64(),
                    duty.committee_index,
                    duty.committee_position,
                    duty.timestamp.unwrap_or_else(Utc::now),
                ));
            }
            self.session.batch(&batch, values).await?;
        }

        debug!(self.log, "Saved attestation duties"; "count" => duties.len());
        Ok(())
    }

    async fn save_attestation_rewards(&self, rewards: &[AttestationReward]) -> Result<(), Error> {
        for group in group_by_partition(rewards, |r| r.validator_index) {
            if let [reward] = group.as_slice() {
                self.session
                    .execute(
                        &self.insert_reward,
                        (
                            reward.validator_index as i64,
                            reward.epoch.as_i64(),
                            reward.head_reward,
                            reward.source_reward,
                            reward.target_reward,
                            reward.total_reward,
                            reward.timestamp.unwrap_or_else(Utc::now),
                        ),
                    )
                    .await?;
                continue;
            }

            let mut batch = Batch::new(BatchType::Unlogged);
            let mut values = Vec::with_capacity(group.len());
            for reward in group {
                batch.append_statement(self.insert_reward.clone());
                values.push((
                    reward.validator_index as i64,
                    reward.epoch.as_i64(),
                    reward.head_reward,
                    reward.source_reward,
                    reward.target_reward,
                    reward.total_reward,
                    reward.timestamp.unwrap_or_else(Utc::now),
                ));
            }
            self.session.batch(&batch, values).await?;
        }

        debug!(self.log, "Saved attestation rewards"; "count" => rewards.len());
        Ok(())
    }

    async fn save_validator_penalty(&self, penalty: &ValidatorPenalty) -> Result<(), Error> {
        self.session
            .execute(
                &self.insert_penalty,
                (
                    penalty.validator_index as i64,
                    penalty.epoch.as_i64(),
                    penalty.slot.as_i64(),
                    penalty.penalty_type.as_str(),
                    penalty.penalty_gwei,
                    penalty.timestamp.unwrap_or_else(Utc::now),
                ),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistency_levels_parse() {
        assert_eq!(
            parse_consistency("local_quorum").unwrap(),
            Consistency::LocalQuorum
        );
        assert_eq!(parse_consistency("QUORUM").unwrap(), Consistency::Quorum);
        assert_eq!(parse_consistency("any").unwrap(), Consistency::Any);
        assert_eq!(parse_consistency("local_one").unwrap(), Consistency::LocalOne);
        assert!(matches!(
            parse_consistency("strong"),
            Err(Error::UnknownConsistency(_))
        ));
    }

    #[test]
    fn grouping_never_mixes_partitions() {
        let duties: Vec<AttestationDuty> = [100u64, 200, 100, 300, 200]
            .iter()
            .enumerate()
            .map(|(i, &index)| AttestationDuty {
                validator_index: index,
                epoch: Epoch::new(1),
                slot: Slot::new(32 + i as u64),
                committee_index: 0,
                committee_position: 0,
                timestamp: None,
            })
            .collect();

        let groups = group_by_partition(&duties, |d| d.validator_index);
        assert_eq!(groups.len(), 3);
        for group in &groups {
            let index = group[0].validator_index;
            assert!(group.iter().all(|d| d.validator_index == index));
        }
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), duties.len());
    }
}
