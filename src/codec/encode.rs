//! The aggregating encode stage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;

use super::unit::UnitCodec;
use crate::buffer::GrowableBuffer;
use crate::config::CodecConfig;
use crate::error::{FrameError, FramingError};
use crate::flow::{Context, DemandCounter, DemandHook, Interceptor, Subscription, UNBOUNDED};
use crate::util::contains_byte;

/// Request path of an [`EncodeAggregator`].
///
/// With a delimiter every value becomes one chunk, so demand is forwarded
/// as is. Without one the whole stream is a single unit: the first request
/// asks upstream for everything and the unit is released at completion.
#[derive(Debug)]
pub struct EncodeDemand {
    delimited: bool,
    started: AtomicBool,
    wanted: DemandCounter,
}

impl DemandHook for EncodeDemand {
    fn on_request(&self, n: u64, upstream: &dyn Subscription) {
        if self.delimited {
            upstream.request(n);
            return;
        }

        self.wanted.add(n);
        if !self.started.swap(true, Ordering::AcqRel) {
            tracing::trace!("requesting every value for a single unit");
            upstream.request(UNBOUNDED);
        }
    }
}

/// Encodes values into a [`GrowableBuffer`] and hands framed chunks
/// downstream.
pub struct EncodeAggregator<C: UnitCodec> {
    codec: Arc<C>,
    buffer: GrowableBuffer,
    delimiter: Option<u8>,
    encoded: usize,
    // The closed unit of a delimiter-less stream, waiting for demand.
    tail: Option<Bytes>,
    demand: Arc<EncodeDemand>,
}

impl<C: UnitCodec> EncodeAggregator<C> {
    /// Creates a stage encoding with `codec` under `config`.
    pub fn new(codec: Arc<C>, config: &CodecConfig) -> Self {
        let delimiter = config.delimiter();
        Self {
            codec,
            buffer: GrowableBuffer::with_config(*config.buffer()),
            delimiter,
            encoded: 0,
            tail: None,
            demand: Arc::new(EncodeDemand {
                delimited: delimiter.is_some(),
                started: AtomicBool::new(false),
                wanted: DemandCounter::new(),
            }),
        }
    }

    fn flush_tail(&mut self, cx: &mut Context<'_, Bytes>) {
        if self.tail.is_some() && self.demand.wanted.take_one().is_some() {
            if let Some(unit) = self.tail.take() {
                tracing::trace!(len = unit.len(), values = self.encoded, "unit encoded");
                cx.emit(unit);
            }
        }
    }
}

impl<C: UnitCodec> Interceptor for EncodeAggregator<C> {
    type In = C::Outgoing;
    type Out = Bytes;

    fn demand_hook(&self) -> Arc<dyn DemandHook> {
        self.demand.clone()
    }

    fn on_item(&mut self, value: C::Outgoing, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        let payload = self.codec.encode_unit(value)?;
        self.encoded += 1;

        let Some(delimiter) = self.delimiter else {
            return self.buffer.append(&payload);
        };

        if contains_byte(&payload, delimiter) {
            return Err(FramingError::DelimiterInPayload { delimiter }.into());
        }
        self.buffer.append(&payload)?;
        self.buffer.push(delimiter)?;

        let unit = self.buffer.take();
        tracing::trace!(len = unit.len(), "unit encoded");
        cx.emit(unit);
        Ok(())
    }

    fn on_demand(&mut self, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        self.flush_tail(cx);
        Ok(())
    }

    fn on_complete(&mut self, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        if self.delimiter.is_none() && self.encoded > 0 {
            tracing::debug!(len = self.buffer.len(), "closing unit at completion");
            self.tail = Some(self.buffer.take());
            self.flush_tail(cx);
        }
        Ok(())
    }

    fn finish(&mut self) -> Option<Result<(), FrameError>> {
        self.tail.is_none().then_some(Ok(()))
    }

    fn release(&mut self) {
        self.buffer.reset();
        self.tail = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RawCodec, Utf8Codec};
    use crate::flow::testing::{Recorder, RecordingSubscription};
    use crate::flow::{Intercepted, Subscriber};

    fn frames(items: Vec<Bytes>) -> Vec<Vec<u8>> {
        items.iter().map(|frame| frame.to_vec()).collect()
    }

    #[test]
    fn test_each_value_becomes_a_unit() {
        let aggregator = EncodeAggregator::new(Arc::new(Utf8Codec), &CodecConfig::default());
        let (recorder, log) = Recorder::new(5);
        let upstream = RecordingSubscription::new();
        let mut stage = Intercepted::new(aggregator, recorder);

        stage.on_subscribe(upstream.clone());
        assert_eq!(upstream.requests(), vec![5]);

        stage.on_next("ping".to_string());
        stage.on_next(String::new());
        stage.on_complete();

        assert_eq!(frames(log.items()), vec![b"ping\0".to_vec(), b"\0".to_vec()]);
        assert!(log.completed());
    }

    #[test]
    fn test_delimiter_in_payload() {
        let config = CodecConfig::default().with_delimiter(b'\n');
        let aggregator = EncodeAggregator::new(Arc::new(Utf8Codec), &config);
        let (recorder, log) = Recorder::new(5);
        let upstream = RecordingSubscription::new();
        let mut stage = Intercepted::new(aggregator, recorder);

        stage.on_subscribe(upstream.clone());
        stage.on_next("two\nlines".to_string());
        stage.on_next("after".to_string());

        assert!(log.items().is_empty());
        assert!(upstream.cancelled());
        let errors = log.take_errors();
        assert_eq!(
            errors[0].as_framing(),
            Some(&FramingError::DelimiterInPayload { delimiter: b'\n' })
        );
    }

    #[test]
    fn test_without_delimiter_single_unit() {
        let config = CodecConfig::default().without_delimiter();
        let aggregator = EncodeAggregator::new(Arc::new(RawCodec), &config);
        let (recorder, log) = Recorder::new(0);
        let upstream = RecordingSubscription::new();
        let mut stage = Intercepted::new(aggregator, recorder);

        stage.on_subscribe(upstream.clone());
        log.subscription().request(1);
        log.subscription().request(1);
        assert_eq!(upstream.requests(), vec![UNBOUNDED]);

        stage.on_next(Bytes::from_static(b"ab"));
        stage.on_next(Bytes::from_static(b"\0c"));
        assert!(log.items().is_empty());

        stage.on_complete();
        assert_eq!(frames(log.items()), vec![b"ab\0c".to_vec()]);
        assert!(log.completed());
    }

    #[test]
    fn test_without_delimiter_waits_for_demand() {
        let config = CodecConfig::default().without_delimiter();
        let aggregator = EncodeAggregator::new(Arc::new(RawCodec), &config);
        let (recorder, log) = Recorder::new(0);
        let upstream = RecordingSubscription::new();
        let mut stage = Intercepted::new(aggregator, recorder);

        stage.on_subscribe(upstream.clone());
        stage.on_next(Bytes::from_static(b"x"));
        stage.on_complete();
        assert!(log.items().is_empty());
        assert!(!log.completed());

        log.subscription().request(1);
        assert_eq!(frames(log.items()), vec![b"x".to_vec()]);
        assert!(log.completed());
    }

    #[test]
    fn test_without_delimiter_empty_stream() {
        let config = CodecConfig::default().without_delimiter();
        let aggregator = EncodeAggregator::new(Arc::new(RawCodec), &config);
        let (recorder, log) = Recorder::new(1);
        let mut stage = Intercepted::new(aggregator, recorder);

        stage.on_subscribe(RecordingSubscription::new());
        stage.on_complete();
        assert!(log.items().is_empty());
        assert!(log.completed());
    }
}
