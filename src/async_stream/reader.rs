//! Async reader adapter for framed decoding.
//!
//! The reader plays the upstream publisher of a decode stage: it is read
//! only while the stage holds unfulfilled chunk demand, and the stage is
//! asked for one unit per `poll_next`.
//!
//! # Example
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use flowframe::{decode_async, CodecConfig, FramingCodec, Utf8Codec};
//! use futures_io::AsyncRead;
//!
//! async fn demo<R: AsyncRead + Unpin>(reader: R) -> Result<(), flowframe::FrameError> {
//!     let codec = FramingCodec::new(
//!         Utf8Codec,
//!         CodecConfig::default().with_delimiter(b'\n').with_aggregate_on_decode(true),
//!     )?;
//!     let mut lines = decode_async(reader, &codec);
//!
//!     while let Some(line) = lines.next().await {
//!         println!("line: {}", line?);
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_io::AsyncRead;
use parking_lot::Mutex;
use pin_project_lite::pin_project;

use crate::codec::{DecodeStage, FramingCodec, UnitCodec};
use crate::error::FrameError;
use crate::flow::{DemandCounter, Intercepted, Subscriber, Subscription};

/// Chunk demand the decode stage has placed on the reader.
#[derive(Debug, Default)]
struct ReadCredit {
    requested: DemandCounter,
    cancelled: AtomicBool,
}

impl Subscription for ReadCredit {
    fn request(&self, n: u64) {
        self.requested.add(n);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

struct InboxState<T> {
    units: VecDeque<T>,
    outstanding: u64,
    subscription: Option<Arc<dyn Subscription>>,
    terminal: Option<Result<(), FrameError>>,
}

/// Collects what the decode stage emits until `poll_next` picks it up.
struct Inbox<T> {
    state: Arc<Mutex<InboxState<T>>>,
}

impl<T: Send> Subscriber<T> for Inbox<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.state.lock().subscription = Some(subscription);
    }

    fn on_next(&mut self, unit: T) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        state.units.push_back(unit);
    }

    fn on_error(&mut self, error: FrameError) {
        self.state.lock().terminal = Some(Err(error));
    }

    fn on_complete(&mut self) {
        self.state.lock().terminal = Some(Ok(()));
    }
}

pin_project! {
    /// A stream of decoded units read from an async reader.
    ///
    /// This uses `futures_io::AsyncRead` which is runtime-agnostic.
    /// Works with tokio (through `tokio_util::compat`), async-std, smol, or
    /// any futures-compatible runtime.
    pub struct FramedRead<R, C>
    where
        C: UnitCodec,
    {
        #[pin]
        reader: R,
        stage: Intercepted<DecodeStage<C>, Inbox<C::Incoming>>,
        credit: Arc<ReadCredit>,
        inbox: Arc<Mutex<InboxState<C::Incoming>>>,
        link: Option<Arc<dyn Subscription>>,
        read_buf: Vec<u8>,
        eof: bool,
        finished: bool,
    }
}

impl<R, C: UnitCodec> FramedRead<R, C> {
    /// Creates a stream decoding `reader` with a fresh stage of `codec`.
    pub fn new(reader: R, codec: &FramingCodec<C>) -> Self {
        let credit = Arc::new(ReadCredit::default());
        let inbox = Arc::new(Mutex::new(InboxState {
            units: VecDeque::new(),
            outstanding: 0,
            subscription: None,
            terminal: None,
        }));

        let mut stage = Intercepted::new(
            codec.decoder(),
            Inbox {
                state: Arc::clone(&inbox),
            },
        );
        stage.on_subscribe(credit.clone());
        // Held here rather than in the inbox so the stage does not own its
        // own subscription.
        let link = inbox.lock().subscription.take();

        Self {
            reader,
            stage,
            credit,
            inbox,
            link,
            read_buf: vec![0u8; codec.config().buffer().small_size()],
            eof: false,
            finished: false,
        }
    }
}

impl<R, C> Stream for FramedRead<R, C>
where
    R: AsyncRead,
    C: UnitCodec,
{
    type Item = Result<C::Incoming, FrameError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.finished {
                return Poll::Ready(None);
            }

            let wants_unit = {
                let mut inbox = this.inbox.lock();
                if let Some(unit) = inbox.units.pop_front() {
                    return Poll::Ready(Some(Ok(unit)));
                }
                match inbox.terminal.take() {
                    Some(Ok(())) => {
                        *this.finished = true;
                        return Poll::Ready(None);
                    }
                    Some(Err(error)) => {
                        *this.finished = true;
                        return Poll::Ready(Some(Err(error)));
                    }
                    None => {}
                }
                if inbox.outstanding == 0 {
                    inbox.outstanding = 1;
                    true
                } else {
                    false
                }
            };

            // The stage may emit synchronously, so the inbox lock is released.
            if wants_unit {
                if let Some(link) = this.link.as_ref() {
                    link.request(1);
                }
                continue;
            }

            if *this.eof
                || this.credit.cancelled.load(Ordering::Acquire)
                || this.credit.requested.get() == 0
            {
                *this.finished = true;
                return Poll::Ready(Some(Err(FrameError::upstream(
                    "decode stage stopped pulling before it terminated",
                ))));
            }

            match this.reader.as_mut().poll_read(cx, &mut this.read_buf[..]) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(0)) => {
                    tracing::debug!("reader reached end of stream");
                    *this.eof = true;
                    this.stage.on_complete();
                }
                Poll::Ready(Ok(n)) => {
                    this.credit.requested.take_one();
                    let chunk = Bytes::copy_from_slice(&this.read_buf[..n]);
                    this.stage.on_next(chunk);
                }
                Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Poll::Ready(Err(e)) => {
                    *this.eof = true;
                    this.stage.on_error(FrameError::Io(e));
                }
            }
        }
    }
}

/// Creates a stream of decoded units from an async reader.
///
/// Uses `futures_io::AsyncRead` for runtime-agnostic async I/O.
///
/// # Runtime Compatibility
///
/// For tokio users, you can use `tokio_util::compat` to convert
/// `tokio::io::AsyncRead` to `futures_io::AsyncRead`:
///
/// ```ignore
/// use tokio_util::compat::TokioAsyncReadCompatExt;
/// use flowframe::{decode_async, CodecConfig, FramingCodec, RawCodec};
///
/// let codec = FramingCodec::new(RawCodec, CodecConfig::default().with_aggregate_on_decode(true))?;
/// let socket = tokio::net::TcpStream::connect("127.0.0.1:7000").await?;
/// let units = decode_async(socket.compat(), &codec);
/// ```
///
/// # Arguments
///
/// * `reader` - An async reader implementing `AsyncRead`
/// * `codec` - The framing codec; a fresh decode stage is built from it
///
/// # Returns
///
/// A `FramedRead` that implements `Stream<Item = Result<C::Incoming, FrameError>>`
pub fn decode_async<R, C>(reader: R, codec: &FramingCodec<C>) -> FramedRead<R, C>
where
    R: AsyncRead,
    C: UnitCodec,
{
    FramedRead::new(reader, codec)
}
