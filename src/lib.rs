//! flowframe
//!
//! Backpressure-aware delimiter framing for pull-based byte streams.
//!
//! A transport hands over raw chunks of any size; a consumer wants whole
//! decoded values and never more of them than it asked for. `flowframe`
//! sits between the two:
//!
//! - accumulates chunks into delimited units in an auto-expanding buffer
//! - decodes each unit with a pluggable [`UnitCodec`]
//! - relays downstream demand upstream with a lock-free counter
//! - frames encoded values back into chunks
//!
//! The crate intentionally:
//! - does NOT own a transport or a protocol stack
//! - does NOT schedule work on threads
//! - does NOT time anything out
//!
//! # Sync
//!
//! ```
//! use bytes::Bytes;
//! use flowframe::{CodecConfig, FramingCodec, IterPublisher, Publisher, Subscriber, Subscription, Utf8Codec};
//! use flowframe::FrameError;
//! use std::sync::Arc;
//!
//! struct Print;
//!
//! impl Subscriber<String> for Print {
//!     fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
//!         subscription.request(flowframe::UNBOUNDED);
//!     }
//!     fn on_next(&mut self, line: String) {
//!         println!("line: {line}");
//!     }
//!     fn on_error(&mut self, error: FrameError) {
//!         eprintln!("error: {error}");
//!     }
//!     fn on_complete(&mut self) {}
//! }
//!
//! let codec = FramingCodec::new(
//!     Utf8Codec,
//!     CodecConfig::default().with_delimiter(b'\n').with_aggregate_on_decode(true),
//! )?;
//! let raw = IterPublisher::new(vec![Bytes::from_static(b"hel"), Bytes::from_static(b"lo\n")]);
//! codec.decode(raw).subscribe(Print);
//! # Ok::<(), FrameError>(())
//! ```
//!
//! # Async (feature = "async-io")
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use flowframe::{decode_async, CodecConfig, FramingCodec, RawCodec};
//! use futures_io::AsyncRead;
//!
//! async fn demo<R: AsyncRead + Unpin>(reader: R) -> Result<(), flowframe::FrameError> {
//!     let codec = FramingCodec::new(RawCodec, CodecConfig::default().with_aggregate_on_decode(true))?;
//!     let mut units = decode_async(reader, &codec);
//!
//!     while let Some(unit) = units.next().await {
//!         println!("unit {} bytes", unit?.len());
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod codec;
mod config;
mod error;
mod flow;

mod util; // internal delimiter scanning

#[cfg(feature = "async-io")]
mod async_stream;

//
// Public surface
//

pub use buffer::GrowableBuffer;
pub use codec::{
    DecodeAggregator, DecodeDemand, DecodePassThrough, DecodeStage, EncodeAggregator,
    EncodeDemand, EncodePassThrough, EncodeStage, FramingCodec, RawCodec, UnitCodec, Utf8Codec,
};
pub use config::{
    BufferConfig, CodecConfig, DEFAULT_DELIMITER, DEFAULT_MAX_BUFFER_SIZE,
    DEFAULT_SMALL_BUFFER_SIZE, MAX_BUFFER_SIZE_ENV, PartialUnitPolicy, SMALL_BUFFER_SIZE_ENV,
};
pub use error::{BoxError, FrameError, FramingError};
pub use flow::{
    Context, DemandCounter, DemandHook, Forward, Intercept, Intercepted, Interceptor, IterPublisher,
    Items, Publisher, Subscriber, Subscription, UNBOUNDED, intercept,
};

#[cfg(feature = "async-io")]
pub use async_stream::{FramedRead, decode_async};
