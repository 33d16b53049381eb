//! A clock that reports the current slot relative to a genesis instant.
//!
//! The clock is not required to be monotonically increasing and may go backwards.

use crate::types::Slot;
use parking_lot::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait SlotClock: Send + Sync + Sized {
    /// Creates a new slot clock where genesis occurred `genesis_duration` after the
    /// `UNIX_EPOCH` and each slot is `slot_duration` apart.
    fn new(genesis_duration: Duration, slot_duration: Duration) -> Self;

    /// Returns the slot at this present time, or `None` before genesis.
    fn now(&self) -> Option<Slot>;

    /// Returns the present time as a duration since the UNIX epoch.
    fn now_duration(&self) -> Option<Duration>;

    /// Returns the slot of the given duration since the UNIX epoch.
    fn slot_of(&self, now: Duration) -> Option<Slot> {
        let genesis = self.genesis_duration();

        if now >= genesis {
            let since_genesis = now
                .checked_sub(genesis)
                .expect("now is not less than genesis");
            Some(Slot::new(
                (since_genesis.as_millis() / self.slot_duration().as_millis()) as u64,
            ))
        } else {
            None
        }
    }

    /// Returns the duration between UNIX epoch and the start of the given slot.
    fn start_of(&self, slot: Slot) -> Duration {
        self.genesis_duration() + self.slot_duration() * slot.as_u64() as u32
    }

    /// Returns the duration from the present time until the start of the given slot,
    /// or `None` if the slot has already started.
    fn duration_to_slot(&self, slot: Slot) -> Option<Duration> {
        self.start_of(slot).checked_sub(self.now_duration()?)
    }

    /// Returns the duration between UNIX epoch and the start of slot 0.
    fn genesis_duration(&self) -> Duration;

    /// Returns the duration between slots.
    fn slot_duration(&self) -> Duration;
}

/// Determines the present slot based upon the present system time.
#[derive(Clone)]
pub struct SystemTimeSlotClock {
    genesis_duration: Duration,
    slot_duration: Duration,
}

impl SlotClock for SystemTimeSlotClock {
    fn new(genesis_duration: Duration, slot_duration: Duration) -> Self {
        assert!(
            slot_duration.as_millis() > 0,
            "SystemTimeSlotClock cannot have a < 1ms slot duration"
        );

        Self {
            genesis_duration,
            slot_duration,
        }
    }

    fn now(&self) -> Option<Slot> {
        self.slot_of(self.now_duration()?)
    }

    fn now_duration(&self) -> Option<Duration> {
        SystemTime::now().duration_since(UNIX_EPOCH).ok()
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis_duration
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }
}

/// Determines the present slot based upon a manually-set UNIX timestamp.
///
/// Only intended for use in tests.
pub struct ManualSlotClock {
    genesis_duration: Duration,
    /// Duration from UNIX epoch to right now.
    current_time: RwLock<Duration>,
    slot_duration: Duration,
}

impl ManualSlotClock {
    pub fn set_slot(&self, slot: u64) {
        *self.current_time.write() =
            self.genesis_duration + self.slot_duration * slot as u32;
    }

    pub fn advance_slot(&self) {
        self.set_slot(self.now().map(|slot| slot.as_u64()).unwrap_or(0) + 1)
    }
}

impl SlotClock for ManualSlotClock {
    fn new(genesis_duration: Duration, slot_duration: Duration) -> Self {
        assert!(
            slot_duration.as_millis() > 0,
            "ManualSlotClock cannot have a < 1ms slot duration"
        );

        Self {
            genesis_duration,
            current_time: RwLock::new(genesis_duration),
            slot_duration,
        }
    }

    fn now(&self) -> Option<Slot> {
        self.slot_of(*self.current_time.read())
    }

    fn now_duration(&self) -> Option<Duration> {
        Some(*self.current_time.read())
    }

    fn genesis_duration(&self) -> Duration {
        self.genesis_duration
    }

    fn slot_duration(&self) -> Duration {
        self.slot_duration
    }
}
