//! Translates wall-clock time into slots and epochs and decides what work each
//! tick requires.
//!
//! The scheduler is anchored to the genesis time fetched once at startup; it
//! never trusts the beacon node's reported head slot to advance its own clock.

use crate::beacon::{BeaconNodeHttpClient, Error as BeaconError, StateId};
use crate::slot_clock::{SlotClock, SystemTimeSlotClock};
use crate::types::{Epoch, Slot, SLOT_DURATION};
use slog::{info, warn, Logger};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Poll every validator's status and balance at this slot.
    SlotPoll,
    /// Fetch attestation duties for the upcoming epoch.
    EpochBoundary,
    /// Fetch the reward breakdown for a newly finalized epoch.
    EpochFinalized,
}

/// A unit of scheduled work for one tick.
#[derive(Debug, Clone)]
pub struct ScheduleEvent {
    pub kind: EventKind,
    pub slot: Slot,
    pub epoch: Epoch,
    pub validators: Arc<Vec<u64>>,
}

pub struct Scheduler<C: SlotClock = SystemTimeSlotClock> {
    client: Arc<BeaconNodeHttpClient>,
    clock: C,
    validators: Arc<Vec<u64>>,
    interval_slots: u64,
    last_epoch_boundary: Epoch,
    last_finalized_epoch: Epoch,
    log: Logger,
}

impl Scheduler<SystemTimeSlotClock> {
    /// Fetches the genesis time and builds a wall-clock scheduler from it.
    pub async fn initialize(
        client: Arc<BeaconNodeHttpClient>,
        validators: Arc<Vec<u64>>,
        interval_slots: u64,
        log: Logger,
    ) -> Result<Self, BeaconError> {
        let genesis = client.get_beacon_genesis().await?;
        info!(
            log,
            "Scheduler initialized";
            "genesis_time" => genesis.genesis_time,
        );
        Ok(Self::with_genesis(
            client,
            genesis.genesis_time,
            validators,
            interval_slots,
            log,
        ))
    }
}

impl<C: SlotClock> Scheduler<C> {
    pub fn with_genesis(
        client: Arc<BeaconNodeHttpClient>,
        genesis_time: u64,
        validators: Arc<Vec<u64>>,
        interval_slots: u64,
        log: Logger,
    ) -> Self {
        Self {
            client,
            clock: C::new(Duration::from_secs(genesis_time), SLOT_DURATION),
            validators,
            interval_slots,
            last_epoch_boundary: Epoch::new(0),
            last_finalized_epoch: Epoch::new(0),
            log,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The slot at the present wall-clock time, clamped to 0 before genesis.
    pub fn current_slot(&self) -> Slot {
        self.clock.now().unwrap_or_else(|| Slot::new(0))
    }

    pub fn current_epoch(&self) -> Epoch {
        self.current_slot().epoch()
    }

    /// The highest epoch for which finalization events have been emitted.
    pub fn last_finalized_epoch(&self) -> Epoch {
        self.last_finalized_epoch
    }

    /// Sleeps until the start of `current_slot + interval_slots` and returns that slot.
    pub async fn wait_for_interval(&self) -> Slot {
        let target = self.current_slot() + self.interval_slots;
        if let Some(wait) = self.clock.duration_to_slot(target) {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
        target
    }

    /// Returns the events to process for the given slot, in the order they must
    /// be handled: the slot poll, then the epoch boundary, then finalization
    /// events for skipped epochs in ascending order.
    pub async fn next_events(&mut self, slot: Slot) -> Vec<ScheduleEvent> {
        let epoch = slot.epoch();
        let mut events = vec![ScheduleEvent {
            kind: EventKind::SlotPoll,
            slot,
            epoch,
            validators: self.validators.clone(),
        }];

        // Duties are fetched for the upcoming epoch, once per boundary slot.
        if slot.is_epoch_boundary() && epoch != self.last_epoch_boundary {
            self.last_epoch_boundary = epoch;
            events.push(ScheduleEvent {
                kind: EventKind::EpochBoundary,
                slot,
                epoch: epoch + 1,
                validators: self.validators.clone(),
            });
        }

        match self
            .client
            .get_beacon_states_finality_checkpoints(StateId::Head)
            .await
        {
            Err(e) => {
                warn!(self.log, "Failed to get finality checkpoints"; "error" => ?e);
            }
            Ok(checkpoints) => {
                let finalized = checkpoints.finalized.epoch;
                if finalized > self.last_finalized_epoch {
                    for e in (self.last_finalized_epoch.as_u64() + 1)..=finalized.as_u64() {
                        events.push(ScheduleEvent {
                            kind: EventKind::EpochFinalized,
                            slot,
                            epoch: Epoch::new(e),
                            validators: self.validators.clone(),
                        });
                    }
                    self.last_finalized_epoch = finalized;
                }
            }
        }

        events
    }
}
