//! A tiny newline-delimited command protocol.
//!
//! A writer task encodes commands onto one end of an in-memory pipe in
//! small, awkward writes; the reader decodes whole lines back out of the
//! other end, one line per poll.
//!
//! Run with:
//!     cargo run --example line_protocol

use std::sync::Arc;

use bytes::Bytes;
use flowframe::{
    CodecConfig, FrameError, FramingCodec, IterPublisher, Publisher, Subscriber, Subscription,
    UNBOUNDED, Utf8Codec, decode_async,
};
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio_util::compat::TokioAsyncReadCompatExt;

struct Collect(Arc<Mutex<Vec<Bytes>>>);

impl Subscriber<Bytes> for Collect {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        subscription.request(UNBOUNDED);
    }

    fn on_next(&mut self, chunk: Bytes) {
        self.0.lock().push(chunk);
    }

    fn on_error(&mut self, error: FrameError) {
        eprintln!("encode failed: {error}");
    }

    fn on_complete(&mut self) {}
}

#[tokio::main]
async fn main() -> Result<(), FrameError> {
    let codec = FramingCodec::new(
        Utf8Codec,
        CodecConfig::default()
            .with_delimiter(b'\n')
            .with_aggregate_on_decode(true)
            .with_aggregate_on_encode(true),
    )?;

    let commands = ["HELLO demo", "SET color blue", "GET color", "QUIT"].map(String::from);
    let wire = Arc::new(Mutex::new(Vec::new()));
    codec
        .encode(IterPublisher::new(commands))
        .subscribe(Collect(Arc::clone(&wire)));
    let wire: Vec<u8> = wire.lock().iter().flat_map(|chunk| chunk.to_vec()).collect();

    let (mut writer, reader) = tokio::io::duplex(16);
    let producer = tokio::spawn(async move {
        for piece in wire.chunks(5) {
            writer.write_all(piece).await?;
        }
        writer.shutdown().await
    });

    let mut lines = decode_async(reader.compat(), &codec);
    while let Some(line) = lines.next().await {
        let line = line?;
        let (verb, args) = line.split_once(' ').unwrap_or((line.as_str(), ""));
        println!("{verb:<6} {args}");
    }

    match producer.await {
        Ok(result) => result?,
        Err(join) => eprintln!("writer task failed: {join}"),
    }
    Ok(())
}
