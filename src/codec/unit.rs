//! Per-unit value codecs.

use bytes::Bytes;

use crate::error::FrameError;

/// Converts one complete unit to a value and back.
///
/// A unit codec never sees delimiters or partial input: framing is done
/// by [`FramingCodec`](crate::FramingCodec) before `decode_unit` and after
/// `encode_unit`.
pub trait UnitCodec: Send + Sync + 'static {
    /// Value produced by decoding.
    type Incoming: Send + 'static;
    /// Value consumed by encoding.
    type Outgoing: Send + 'static;

    /// Decodes one unit, delimiter excluded.
    fn decode_unit(&self, unit: Bytes) -> Result<Self::Incoming, FrameError>;

    /// Encodes one value, without any delimiter.
    fn encode_unit(&self, value: Self::Outgoing) -> Result<Bytes, FrameError>;
}

/// Hands units through as bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl UnitCodec for RawCodec {
    type Incoming = Bytes;
    type Outgoing = Bytes;

    fn decode_unit(&self, unit: Bytes) -> Result<Bytes, FrameError> {
        Ok(unit)
    }

    fn encode_unit(&self, value: Bytes) -> Result<Bytes, FrameError> {
        Ok(value)
    }
}

/// UTF-8 text units.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Codec;

impl UnitCodec for Utf8Codec {
    type Incoming = String;
    type Outgoing = String;

    fn decode_unit(&self, unit: Bytes) -> Result<String, FrameError> {
        String::from_utf8(unit.to_vec()).map_err(FrameError::codec)
    }

    fn encode_unit(&self, value: String) -> Result<Bytes, FrameError> {
        Ok(Bytes::from(value))
    }
}
