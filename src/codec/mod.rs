//! Framing of unit codecs over byte streams.
//!
//! - [`UnitCodec`] - Converts one whole unit to a value and back
//! - [`FramingCodec`] - Public entry point: `decode` and `encode`
//! - [`DecodeAggregator`], [`EncodeAggregator`] - Aggregating stages
//! - [`DecodePassThrough`], [`EncodePassThrough`] - One chunk per value

mod decode;
mod encode;
mod framing;
mod passthrough;
mod unit;

pub use decode::{DecodeAggregator, DecodeDemand};
pub use encode::{EncodeAggregator, EncodeDemand};
pub use framing::{DecodeStage, EncodeStage, FramingCodec};
pub use passthrough::{DecodePassThrough, EncodePassThrough};
pub use unit::{RawCodec, UnitCodec, Utf8Codec};
