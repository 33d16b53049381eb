//! Typed views of the subset of the Beacon Node REST API the monitor consumes.
//!
//! All 64-bit integer fields accept both quoted and unquoted JSON numbers, since
//! beacon node implementations differ on which encoding they emit.

use crate::serde_utils::{quoted_i64, quoted_u64};
use crate::types::{Epoch, Slot};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The standard `{"data": ...}` response envelope.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct GenericResponse<T: Serialize + serde::de::DeserializeOwned> {
    pub data: T,
}

/// The response envelope carrying `execution_optimistic` / `finalized` markers.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct ExecutionOptimisticFinalizedResponse<T: Serialize + serde::de::DeserializeOwned> {
    #[serde(default)]
    pub execution_optimistic: bool,
    #[serde(default)]
    pub finalized: bool,
    pub data: T,
}

/// The `/eth/v1/validator/duties/*` envelope.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + serde::de::DeserializeOwned")]
pub struct DutiesResponse<T: Serialize + serde::de::DeserializeOwned> {
    pub dependent_root: String,
    #[serde(default)]
    pub execution_optimistic: bool,
    pub data: T,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StateId {
    Head,
    Genesis,
    Finalized,
    Justified,
    Slot(Slot),
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateId::Head => write!(f, "head"),
            StateId::Genesis => write!(f, "genesis"),
            StateId::Finalized => write!(f, "finalized"),
            StateId::Justified => write!(f, "justified"),
            StateId::Slot(slot) => write!(f, "{}", slot),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisData {
    /// Genesis time as unix seconds.
    #[serde(with = "quoted_u64")]
    pub genesis_time: u64,
    pub genesis_validators_root: String,
    pub genesis_fork_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncingData {
    pub head_slot: Slot,
    #[serde(with = "quoted_u64")]
    pub sync_distance: u64,
    pub is_syncing: bool,
    #[serde(default)]
    pub is_optimistic: bool,
    #[serde(default)]
    pub el_offline: bool,
}

/// A validator's state from `/eth/v1/beacon/states/{state_id}/validators/{validator_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorData {
    #[serde(with = "quoted_u64")]
    pub index: u64,
    /// Actual balance in gwei.
    #[serde(with = "quoted_u64")]
    pub balance: u64,
    pub status: String,
    pub validator: ValidatorInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub pubkey: String,
    /// Effective balance in gwei; may reach 2048 ETH under MaxEB.
    #[serde(with = "quoted_u64")]
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalityCheckpointsData {
    pub previous_justified: Checkpoint,
    pub current_justified: Checkpoint,
    pub finalized: Checkpoint,
}

/// An attestation duty assignment from `/eth/v1/validator/duties/attester/{epoch}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttesterData {
    pub pubkey: String,
    #[serde(with = "quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "quoted_u64")]
    pub committee_index: u64,
    #[serde(with = "quoted_u64")]
    pub committee_length: u64,
    #[serde(with = "quoted_u64")]
    pub committees_at_slot: u64,
    /// The validator's position within its committee.
    #[serde(with = "quoted_u64")]
    pub validator_committee_index: u64,
    pub slot: Slot,
}

/// Per-validator reward components from `/eth/v1/beacon/rewards/attestations/{epoch}`.
///
/// Each component is individually signed; a negative value is a penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalAttestationRewards {
    #[serde(with = "quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "quoted_i64")]
    pub head: i64,
    #[serde(with = "quoted_i64")]
    pub target: i64,
    #[serde(with = "quoted_i64")]
    pub source: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardAttestationRewards {
    pub total_rewards: Vec<TotalAttestationRewards>,
}
