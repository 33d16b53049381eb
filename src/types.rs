//! The `Slot` and `Epoch` types are defined as new types over u64 to enforce type-safety between
//! the two, along with the mainnet timing constants the monitor is anchored to.
//!
//! Math operations on `Slot` and `Epoch` are saturating, they never wrap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// The fixed duration of a single slot.
pub const SLOT_DURATION: Duration = Duration::from_secs(12);

/// The number of slots in an epoch.
pub const SLOTS_PER_EPOCH: u64 = 32;

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(#[serde(with = "crate::serde_utils::quoted_u64")] u64);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(#[serde(with = "crate::serde_utils::quoted_u64")] u64);

impl Slot {
    pub const fn new(slot: u64) -> Slot {
        Slot(slot)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// The epoch this slot belongs to.
    pub const fn epoch(self) -> Epoch {
        Epoch(self.0 / SLOTS_PER_EPOCH)
    }

    /// Whether this slot is the first slot of its epoch.
    pub const fn is_epoch_boundary(self) -> bool {
        self.0 % SLOTS_PER_EPOCH == 0
    }
}

impl Epoch {
    pub const fn new(epoch: u64) -> Epoch {
        Epoch(epoch)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// The first slot in the epoch.
    pub const fn start_slot(self) -> Slot {
        Slot(self.0.saturating_mul(SLOTS_PER_EPOCH))
    }

    /// The last slot in the epoch.
    pub const fn end_slot(self) -> Slot {
        Slot(self.0.saturating_mul(SLOTS_PER_EPOCH) + (SLOTS_PER_EPOCH - 1))
    }
}

macro_rules! impl_common {
    ($type: ident) => {
        impl From<u64> for $type {
            fn from(value: u64) -> $type {
                $type(value)
            }
        }

        impl From<$type> for u64 {
            fn from(value: $type) -> u64 {
                value.0
            }
        }

        impl Add<u64> for $type {
            type Output = $type;

            fn add(self, rhs: u64) -> $type {
                $type(self.0.saturating_add(rhs))
            }
        }

        impl AddAssign<u64> for $type {
            fn add_assign(&mut self, rhs: u64) {
                *self = *self + rhs;
            }
        }

        impl Sub<u64> for $type {
            type Output = $type;

            fn sub(self, rhs: u64) -> $type {
                $type(self.0.saturating_sub(rhs))
            }
        }

        impl PartialEq<u64> for $type {
            fn eq(&self, other: &u64) -> bool {
                self.0 == *other
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_common!(Slot);
impl_common!(Epoch);
