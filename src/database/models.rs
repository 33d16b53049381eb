use crate::types::{Epoch, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only penalty kind this monitor derives: an attestation whose reward
/// components sum to a negative total.
pub const PENALTY_ATTESTATION_MISS: &str = "attestation_miss";

/// A point-in-time sample of a validator's status and balances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSnapshot {
    pub validator_index: u64,
    pub slot: Slot,
    pub status: String,
    /// Actual balance in gwei.
    pub balance: u64,
    /// Effective balance in gwei, up to 2048 ETH under MaxEB.
    pub effective_balance: u64,
    /// Filled with the insert-time wall clock when `None`.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A validator's attestation duty assignment for an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationDuty {
    pub validator_index: u64,
    pub epoch: Epoch,
    /// The slot at which the validator must attest.
    pub slot: Slot,
    pub committee_index: i32,
    pub committee_position: i32,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A validator's attestation reward breakdown for a finalized epoch.
///
/// Any component may be negative. `total` is always the sum of the three
/// components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationReward {
    pub validator_index: u64,
    pub epoch: Epoch,
    pub head_reward: i64,
    pub source_reward: i64,
    pub target_reward: i64,
    pub total_reward: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A penalty applied to a validator, recorded whenever a reward total is negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorPenalty {
    pub validator_index: u64,
    pub epoch: Epoch,
    pub slot: Slot,
    pub penalty_type: String,
    /// Penalty amount as a positive gwei value.
    pub penalty_gwei: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl AttestationReward {
    pub fn new(
        validator_index: u64,
        epoch: Epoch,
        head: i64,
        source: i64,
        target: i64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            validator_index,
            epoch,
            head_reward: head,
            source_reward: source,
            target_reward: target,
            total_reward: head + source + target,
            timestamp: Some(timestamp),
        }
    }

    pub fn is_penalty(&self) -> bool {
        self.total_reward < 0
    }
}

impl ValidatorPenalty {
    /// Derives the `attestation_miss` penalty row from a negative reward total.
    pub fn attestation_miss(reward: &AttestationReward, slot: Slot) -> Self {
        Self {
            validator_index: reward.validator_index,
            epoch: reward.epoch,
            slot,
            penalty_type: PENALTY_ATTESTATION_MISS.to_string(),
            penalty_gwei: -reward.total_reward,
            timestamp: reward.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_total_is_sum_of_components() {
        let reward = AttestationReward::new(100, Epoch::new(50), -1000, -500, 200, Utc::now());
        assert_eq!(reward.total_reward, -1300);
        assert_eq!(
            reward.total_reward,
            reward.head_reward + reward.source_reward + reward.target_reward
        );
        assert!(reward.is_penalty());
    }

    #[test]
    fn penalty_derivation_negates_total() {
        let reward = AttestationReward::new(100, Epoch::new(50), -1000, -500, 200, Utc::now());
        let penalty = ValidatorPenalty::attestation_miss(&reward, Slot::new(1632));

        assert_eq!(penalty.validator_index, 100);
        assert_eq!(penalty.epoch, Epoch::new(50));
        assert_eq!(penalty.slot, Slot::new(1632));
        assert_eq!(penalty.penalty_type, PENALTY_ATTESTATION_MISS);
        assert_eq!(penalty.penalty_gwei, 1300);
    }

    #[test]
    fn positive_total_is_not_a_penalty() {
        let reward = AttestationReward::new(100, Epoch::new(50), 1000, 500, 200, Utc::now());
        assert_eq!(reward.total_reward, 1700);
        assert!(!reward.is_penalty());
    }
}
