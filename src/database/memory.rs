//! An in-memory `Store` with the same upsert semantics as the real tables,
//! intended for tests.

use crate::database::models::{
    AttestationDuty, AttestationReward, ValidatorPenalty, ValidatorSnapshot,
};
use crate::database::{Error, Store};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<Vec<ValidatorSnapshot>>,
    duties: Mutex<Vec<AttestationDuty>>,
    rewards: Mutex<Vec<AttestationReward>>,
    penalties: Mutex<Vec<ValidatorPenalty>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<ValidatorSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn duties(&self) -> Vec<AttestationDuty> {
        self.duties.lock().clone()
    }

    pub fn rewards(&self) -> Vec<AttestationReward> {
        self.rewards.lock().clone()
    }

    pub fn penalties(&self) -> Vec<ValidatorPenalty> {
        self.penalties.lock().clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_validator_snapshot(&self, snapshot: &ValidatorSnapshot) -> Result<(), Error> {
        let mut snapshot = snapshot.clone();
        snapshot.timestamp = Some(snapshot.timestamp.unwrap_or_else(Utc::now));

        let mut rows = self.snapshots.lock();
        rows.retain(|row| {
            (row.validator_index, row.slot) != (snapshot.validator_index, snapshot.slot)
        });
        rows.push(snapshot);
        Ok(())
    }

    async fn save_attestation_duties(&self, duties: &[AttestationDuty]) -> Result<(), Error> {
        let mut rows = self.duties.lock();
        for duty in duties {
            let mut duty = duty.clone();
            duty.timestamp = Some(duty.timestamp.unwrap_or_else(Utc::now));
            rows.retain(|row| {
                (row.validator_index, row.epoch, row.slot)
                    != (duty.validator_index, duty.epoch, duty.slot)
            });
            rows.push(duty);
        }
        Ok(())
    }

    async fn save_attestation_rewards(&self, rewards: &[AttestationReward]) -> Result<(), Error> {
        let mut rows = self.rewards.lock();
        for reward in rewards {
            let mut reward = reward.clone();
            reward.timestamp = Some(reward.timestamp.unwrap_or_else(Utc::now));
            rows.retain(|row| {
                (row.validator_index, row.epoch) != (reward.validator_index, reward.epoch)
            });
            rows.push(reward);
        }
        Ok(())
    }

    async fn save_validator_penalty(&self, penalty: &ValidatorPenalty) -> Result<(), Error> {
        let mut penalty = penalty.clone();
        penalty.timestamp = Some(penalty.timestamp.unwrap_or_else(Utc::now));

        let mut rows = self.penalties.lock();
        rows.retain(|row| {
            (row.validator_index, row.epoch, row.slot)
                != (penalty.validator_index, penalty.epoch, penalty.slot)
        });
        rows.push(penalty);
        Ok(())
    }
}
