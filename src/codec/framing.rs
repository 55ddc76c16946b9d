//! The public framing codec.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::decode::DecodeAggregator;
use super::encode::EncodeAggregator;
use super::passthrough::{DecodePassThrough, EncodePassThrough};
use super::unit::UnitCodec;
use crate::config::CodecConfig;
use crate::error::FrameError;
use crate::flow::{Context, DemandHook, Interceptor, Publisher, intercept};

/// Frames a [`UnitCodec`] over byte streams.
///
/// `decode` turns a stream of raw chunks into a stream of values and
/// `encode` does the reverse. Each direction is a pass-through (one chunk
/// per value) unless its aggregation switch is set in [`CodecConfig`], in
/// which case chunks are accumulated into delimited units.
///
/// # Example
///
/// ```
/// use flowframe::{CodecConfig, FramingCodec, Utf8Codec};
///
/// let codec = FramingCodec::new(
///     Utf8Codec,
///     CodecConfig::default()
///         .with_delimiter(b'\n')
///         .with_aggregate_on_decode(true),
/// )?;
/// assert_eq!(codec.config().delimiter(), Some(b'\n'));
/// # Ok::<(), flowframe::FrameError>(())
/// ```
pub struct FramingCodec<C> {
    codec: Arc<C>,
    config: CodecConfig,
}

impl<C: UnitCodec> FramingCodec<C> {
    /// Creates a framing codec.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidConfig`] if `config` does not validate.
    pub fn new(codec: C, config: CodecConfig) -> Result<Self, FrameError> {
        config.validate()?;
        Ok(Self {
            codec: Arc::new(codec),
            config,
        })
    }

    /// Returns the unit codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Builds a fresh decode stage for one stream.
    pub fn decoder(&self) -> DecodeStage<C> {
        let codec = Arc::clone(&self.codec);
        if self.config.aggregate_on_decode() {
            DecodeStage::Aggregate(DecodeAggregator::new(codec, &self.config))
        } else {
            DecodeStage::PassThrough(DecodePassThrough::new(codec))
        }
    }

    /// Builds a fresh encode stage for one stream.
    pub fn encoder(&self) -> EncodeStage<C> {
        let codec = Arc::clone(&self.codec);
        if self.config.aggregate_on_encode() {
            EncodeStage::Aggregate(EncodeAggregator::new(codec, &self.config))
        } else {
            EncodeStage::PassThrough(EncodePassThrough::new(codec, self.config.delimiter()))
        }
    }

    /// Decodes a stream of raw chunks into values.
    pub fn decode<P>(&self, raw: P) -> impl Publisher<C::Incoming> + use<P, C>
    where
        P: Publisher<Bytes>,
    {
        let stage = self.decoder();
        intercept(raw, move || stage)
    }

    /// Encodes a stream of values into raw chunks.
    pub fn encode<P>(&self, values: P) -> impl Publisher<Bytes> + use<P, C>
    where
        P: Publisher<C::Outgoing>,
    {
        let stage = self.encoder();
        intercept(values, move || stage)
    }
}

impl<C> Clone for FramingCodec<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            config: self.config,
        }
    }
}

impl<C> fmt::Debug for FramingCodec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramingCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The decode stage selected by [`FramingCodec::decoder`].
pub enum DecodeStage<C: UnitCodec> {
    /// Each chunk is one unit.
    PassThrough(DecodePassThrough<C>),
    /// Chunks are accumulated into delimited units.
    Aggregate(DecodeAggregator<C>),
}

/// The encode stage selected by [`FramingCodec::encoder`].
pub enum EncodeStage<C: UnitCodec> {
    /// Each value is one chunk.
    PassThrough(EncodePassThrough<C>),
    /// Values are framed through the aggregate buffer.
    Aggregate(EncodeAggregator<C>),
}

macro_rules! dispatch {
    ($self:ident, $stage:ident => $body:expr) => {
        match $self {
            Self::PassThrough($stage) => $body,
            Self::Aggregate($stage) => $body,
        }
    };
}

impl<C: UnitCodec> Interceptor for DecodeStage<C> {
    type In = Bytes;
    type Out = C::Incoming;

    fn demand_hook(&self) -> Arc<dyn DemandHook> {
        dispatch!(self, stage => stage.demand_hook())
    }

    fn on_item(&mut self, chunk: Bytes, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        dispatch!(self, stage => stage.on_item(chunk, cx))
    }

    fn on_demand(&mut self, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        dispatch!(self, stage => stage.on_demand(cx))
    }

    fn on_complete(&mut self, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        dispatch!(self, stage => stage.on_complete(cx))
    }

    fn finish(&mut self) -> Option<Result<(), FrameError>> {
        dispatch!(self, stage => stage.finish())
    }

    fn release(&mut self) {
        dispatch!(self, stage => stage.release())
    }
}

impl<C: UnitCodec> Interceptor for EncodeStage<C> {
    type In = C::Outgoing;
    type Out = Bytes;

    fn demand_hook(&self) -> Arc<dyn DemandHook> {
        dispatch!(self, stage => stage.demand_hook())
    }

    fn on_item(&mut self, value: C::Outgoing, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        dispatch!(self, stage => stage.on_item(value, cx))
    }

    fn on_demand(&mut self, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        dispatch!(self, stage => stage.on_demand(cx))
    }

    fn on_complete(&mut self, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        dispatch!(self, stage => stage.on_complete(cx))
    }

    fn finish(&mut self) -> Option<Result<(), FrameError>> {
        dispatch!(self, stage => stage.finish())
    }

    fn release(&mut self) {
        dispatch!(self, stage => stage.release())
    }
}
