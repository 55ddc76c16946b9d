//! Non-aggregating stages: one chunk in, one value out, and back.

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};

use super::unit::UnitCodec;
use crate::error::{FrameError, FramingError};
use crate::flow::{Context, DemandHook, Forward, Interceptor};
use crate::util::contains_byte;

/// Decodes every raw chunk as one whole unit.
pub struct DecodePassThrough<C> {
    codec: Arc<C>,
}

impl<C> DecodePassThrough<C> {
    /// Creates the stage.
    pub fn new(codec: Arc<C>) -> Self {
        Self { codec }
    }
}

impl<C: UnitCodec> Interceptor for DecodePassThrough<C> {
    type In = Bytes;
    type Out = C::Incoming;

    fn demand_hook(&self) -> Arc<dyn DemandHook> {
        Arc::new(Forward)
    }

    fn on_item(&mut self, chunk: Bytes, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        let value = self.codec.decode_unit(chunk)?;
        cx.emit(value);
        Ok(())
    }
}

/// Encodes every value to its own chunk, followed by the delimiter if one
/// is set.
pub struct EncodePassThrough<C> {
    codec: Arc<C>,
    delimiter: Option<u8>,
}

impl<C> EncodePassThrough<C> {
    /// Creates the stage.
    pub fn new(codec: Arc<C>, delimiter: Option<u8>) -> Self {
        Self { codec, delimiter }
    }
}

impl<C: UnitCodec> Interceptor for EncodePassThrough<C> {
    type In = C::Outgoing;
    type Out = Bytes;

    fn demand_hook(&self) -> Arc<dyn DemandHook> {
        Arc::new(Forward)
    }

    fn on_item(&mut self, value: C::Outgoing, cx: &mut Context<'_, Bytes>) -> Result<(), FrameError> {
        let payload = self.codec.encode_unit(value)?;
        let Some(delimiter) = self.delimiter else {
            cx.emit(payload);
            return Ok(());
        };

        if contains_byte(&payload, delimiter) {
            return Err(FramingError::DelimiterInPayload { delimiter }.into());
        }
        let mut frame = BytesMut::with_capacity(payload.len() + 1);
        frame.put_slice(&payload);
        frame.put_u8(delimiter);
        cx.emit(frame.freeze());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{RawCodec, Utf8Codec};
    use crate::flow::testing::{Recorder, RecordingSubscription};
    use crate::flow::{Intercepted, Subscriber};

    #[test]
    fn test_decode_chunk_is_one_unit() {
        let (recorder, log) = Recorder::new(2);
        let mut stage = Intercepted::new(DecodePassThrough::new(Arc::new(Utf8Codec)), recorder);

        stage.on_subscribe(RecordingSubscription::new());
        // No scanning: the delimiter stays inside the value.
        stage.on_next(Bytes::from_static(b"a\0b"));
        stage.on_complete();

        assert_eq!(log.items(), vec!["a\0b".to_string()]);
        assert!(log.completed());
    }

    #[test]
    fn test_encode_appends_delimiter() {
        let (recorder, log) = Recorder::new(2);
        let upstream = RecordingSubscription::new();
        let mut stage = Intercepted::new(
            EncodePassThrough::new(Arc::new(RawCodec), Some(b';')),
            recorder,
        );

        stage.on_subscribe(upstream.clone());
        assert_eq!(upstream.requests(), vec![2]);
        stage.on_next(Bytes::from_static(b"x"));

        assert_eq!(log.items(), vec![Bytes::from_static(b"x;")]);
    }

    #[test]
    fn test_encode_without_delimiter() {
        let (recorder, log) = Recorder::new(1);
        let mut stage = Intercepted::new(EncodePassThrough::new(Arc::new(RawCodec), None), recorder);

        stage.on_subscribe(RecordingSubscription::new());
        stage.on_next(Bytes::from_static(b"x;"));

        assert_eq!(log.items(), vec![Bytes::from_static(b"x;")]);
    }

    #[test]
    fn test_encode_rejects_delimiter_in_payload() {
        let (recorder, log) = Recorder::new(1);
        let mut stage = Intercepted::new(
            EncodePassThrough::new(Arc::new(RawCodec), Some(0)),
            recorder,
        );

        stage.on_subscribe(RecordingSubscription::new());
        stage.on_next(Bytes::from_static(b"a\0"));

        assert!(log.items().is_empty());
        assert_eq!(log.errors(), 1);
    }
}
