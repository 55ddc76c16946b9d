//! Lock-free demand accounting.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use super::protocol::UNBOUNDED;

/// An atomic, never-negative demand counter.
///
/// Every update is a single atomic read-modify-write, so concurrent
/// `add` (from the request path) and `take_one` (from the item path) never
/// lose updates. [`UNBOUNDED`] is sticky: adding to it or taking from it
/// leaves it unchanged.
#[derive(Debug, Default)]
pub struct DemandCounter {
    value: AtomicU64,
}

impl DemandCounter {
    /// Creates a counter at zero.
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Returns true if the counter has saturated.
    pub fn is_unbounded(&self) -> bool {
        self.get() == UNBOUNDED
    }

    /// Adds `n`, saturating at [`UNBOUNDED`]. Returns the value before the
    /// addition.
    pub fn add(&self, n: u64) -> u64 {
        match self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Sets the counter back to zero.
    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }

    /// Takes one unit. Returns the value after the decrement, or `None` if
    /// the counter was already zero.
    pub fn take_one(&self) -> Option<u64> {
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                0 => None,
                UNBOUNDED => Some(UNBOUNDED),
                n => Some(n - 1),
            })
            .ok()
            .map(|previous| {
                if previous == UNBOUNDED {
                    UNBOUNDED
                } else {
                    previous - 1
                }
            })
    }
}

/// Requested minus received, allowed to go below zero.
///
/// A stage that draws items on its own account (beyond what was asked of
/// it) drives the balance negative; later requests pay that surplus back
/// before showing up as pending. `i64::MAX` stands for [`UNBOUNDED`] and is
/// sticky.
#[derive(Debug, Default)]
pub(crate) struct DemandBalance {
    value: AtomicI64,
}

impl DemandBalance {
    /// Outstanding demand, zero while in surplus.
    pub(crate) fn pending(&self) -> u64 {
        match self.value.load(Ordering::Acquire) {
            i64::MAX => UNBOUNDED,
            n => n.max(0).unsigned_abs(),
        }
    }

    /// Adds `n`. Returns the balance before the addition.
    pub(crate) fn add(&self, n: u64) -> i64 {
        let n = i64::try_from(n).unwrap_or(i64::MAX);
        match self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == i64::MAX || n == i64::MAX {
                    Some(i64::MAX)
                } else {
                    Some(current.saturating_add(n).min(i64::MAX - 1))
                }
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Records one received item. Returns the balance before it.
    pub(crate) fn take_one(&self) -> i64 {
        match self
            .value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| match current {
                i64::MAX => Some(i64::MAX),
                n => Some(n.saturating_sub(1)),
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }
}
