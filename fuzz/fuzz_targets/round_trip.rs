#![no_main]

use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use flowframe::{
    CodecConfig, FrameError, FramingCodec, IterPublisher, Publisher, RawCodec, Subscriber,
    Subscription, UNBOUNDED,
};
use libfuzzer_sys::fuzz_target;

struct Collect(Arc<Mutex<Vec<Bytes>>>);

impl Subscriber<Bytes> for Collect {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        subscription.request(UNBOUNDED);
    }

    fn on_next(&mut self, item: Bytes) {
        self.0.lock().unwrap().push(item);
    }

    fn on_error(&mut self, error: FrameError) {
        panic!("unexpected error: {error}");
    }

    fn on_complete(&mut self) {}
}

fn collect<P: Publisher<Bytes>>(publisher: P) -> Vec<Bytes> {
    let items = Arc::new(Mutex::new(Vec::new()));
    publisher.subscribe(Collect(Arc::clone(&items)));
    let items = items.lock().unwrap();
    items.clone()
}

fuzz_target!(|data: Vec<u8>| {
    let units: Vec<Bytes> = data
        .split(|b| *b == 0)
        .map(Bytes::copy_from_slice)
        .collect();

    let codec = FramingCodec::new(
        RawCodec,
        CodecConfig::default()
            .with_aggregate_on_decode(true)
            .with_aggregate_on_encode(true),
    )
    .unwrap();

    let chunks = collect(codec.encode(IterPublisher::new(units.clone())));
    assert_eq!(chunks.len(), units.len());

    // Re-split the wire bytes into 7-byte reads
    let mut wire = BytesMut::new();
    for chunk in &chunks {
        wire.extend_from_slice(chunk);
    }
    let wire = wire.freeze();
    let reads: Vec<Bytes> = (0..wire.len())
        .step_by(7)
        .map(|start| wire.slice(start..(start + 7).min(wire.len())))
        .collect();

    let decoded = collect(codec.decode(IterPublisher::new(reads)));
    assert_eq!(decoded, units);
});
