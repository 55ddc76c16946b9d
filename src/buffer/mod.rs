//! Buffer management for unit aggregation.
//!
//! [`GrowableBuffer`] is the only memory primitive in the crate. Each
//! aggregator owns exactly one and reuses it from unit to unit.

mod growable;

pub use growable::GrowableBuffer;
