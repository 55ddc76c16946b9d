#![no_main]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use flowframe::{
    BufferConfig, CodecConfig, FrameError, FramingCodec, IterPublisher, PartialUnitPolicy,
    Publisher, RawCodec, Subscriber, Subscription, UNBOUNDED,
};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Outcome {
    units: Vec<Bytes>,
    errors: usize,
    completions: usize,
}

/// Requests `initial` up front, then one more per unit.
struct Collect {
    initial: u64,
    refill: bool,
    subscription: Option<Arc<dyn Subscription>>,
    outcome: Arc<Mutex<Outcome>>,
}

impl Subscriber<Bytes> for Collect {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.subscription = Some(Arc::clone(&subscription));
        subscription.request(self.initial);
    }

    fn on_next(&mut self, unit: Bytes) {
        self.outcome.lock().unwrap().units.push(unit);
        if let (true, Some(subscription)) = (self.refill, &self.subscription) {
            subscription.request(1);
        }
    }

    fn on_error(&mut self, _error: FrameError) {
        self.outcome.lock().unwrap().errors += 1;
    }

    fn on_complete(&mut self) {
        self.outcome.lock().unwrap().completions += 1;
    }
}

fuzz_target!(|data: Vec<u8>| {
    let Some((&split, payload)) = data.split_first() else {
        return;
    };
    let chunk_len = usize::from(split % 16) + 1;
    let payload = Bytes::copy_from_slice(payload);
    let chunks: Vec<Bytes> = (0..payload.len())
        .step_by(chunk_len)
        .map(|start| payload.slice(start..(start + chunk_len).min(payload.len())))
        .collect();

    // Units are the pieces between delimiters; a trailing empty piece is not a unit.
    let mut expected: Vec<&[u8]> = payload.split(|b| *b == b'\n').collect();
    if expected.last().is_some_and(|last| last.is_empty()) {
        expected.pop();
    }

    let codec = FramingCodec::new(
        RawCodec,
        CodecConfig::default()
            .with_delimiter(b'\n')
            .with_aggregate_on_decode(true)
            .with_partial_unit_policy(PartialUnitPolicy::Emit)
            .with_buffer(BufferConfig::new(4, 64).unwrap()),
    )
    .unwrap();

    for (initial, refill) in [(UNBOUNDED, false), (1, true)] {
        let outcome = Arc::new(Mutex::new(Outcome::default()));
        codec.decode(IterPublisher::new(chunks.clone())).subscribe(Collect {
            initial,
            refill,
            subscription: None,
            outcome: Arc::clone(&outcome),
        });

        let outcome = outcome.lock().unwrap();
        assert_eq!(outcome.errors, 0);
        assert_eq!(outcome.completions, 1);
        assert_eq!(outcome.units.len(), expected.len());
        for (unit, want) in outcome.units.iter().zip(&expected) {
            assert_eq!(&unit[..], *want);
        }
    }
});
