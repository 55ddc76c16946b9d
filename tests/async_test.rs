// Integration tests for the async reader adapter
// Tests cover: decoding from a live tokio pipe, errors surfacing through the stream

#![cfg(feature = "async-io")]

use flowframe::{BufferConfig, CodecConfig, FrameError, FramingCodec, Utf8Codec, decode_async};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::compat::TokioAsyncReadCompatExt;

fn line_codec() -> FramingCodec<Utf8Codec> {
    FramingCodec::new(
        Utf8Codec,
        CodecConfig::default()
            .with_delimiter(b'\n')
            .with_aggregate_on_decode(true)
            .with_buffer(BufferConfig::new(16, 256).unwrap()),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lines_from_pipe() {
    let (mut writer, reader) = tokio::io::duplex(8);

    let producer = tokio::spawn(async move {
        for i in 0..100 {
            writer
                .write_all(format!("line {i}\n").as_bytes())
                .await
                .unwrap();
        }
        writer.shutdown().await.unwrap();
    });

    let lines: Vec<String> = decode_async(reader.compat(), &line_codec())
        .map(|line| line.unwrap())
        .collect()
        .await;
    producer.await.unwrap();

    assert_eq!(lines.len(), 100);
    assert_eq!(lines[0], "line 0");
    assert_eq!(lines[99], "line 99");
}

#[tokio::test]
async fn test_consumer_stops_early() {
    let reader: &[u8] = b"one\ntwo\nthree\n";
    let mut stream = decode_async(reader, &line_codec());

    assert_eq!(stream.next().await.unwrap().unwrap(), "one");
    drop(stream);
}

#[tokio::test]
async fn test_invalid_unit_ends_stream() {
    let reader = tokio_test::io::Builder::new()
        .read(b"ok\n")
        .read(b"\xff\nnever\n")
        .build();
    let results: Vec<_> = decode_async(reader.compat(), &line_codec())
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), "ok");
    assert!(matches!(results[1], Err(FrameError::Codec(_))));
}
