//! A demand-honoring publisher over an iterator.

use std::iter::{Map, Peekable};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::demand::DemandCounter;
use super::protocol::{Publisher, Subscriber, Subscription};
use crate::error::FrameError;

/// Iterator adapter used by [`IterPublisher::new`].
pub type Items<I, T> = Map<I, fn(T) -> Result<T, FrameError>>;

/// Publishes the items of an iterator, one per unit of demand.
///
/// Delivery runs on whichever thread calls `request`. Requests made from
/// inside `on_next` are queued and served by the loop already running, so
/// a subscriber that requests one item per item never recurses.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use flowframe::IterPublisher;
///
/// let source = IterPublisher::new(vec![Bytes::from_static(b"ping\0")]);
/// # let _ = source;
/// ```
pub struct IterPublisher<I> {
    items: I,
}

impl<I: Iterator> IterPublisher<Items<I, I::Item>> {
    /// Publishes every item, then completes.
    pub fn new<C>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        let wrap: fn(I::Item) -> Result<I::Item, FrameError> = Ok;
        Self {
            items: items.into_iter().map(wrap),
        }
    }
}

impl<I> IterPublisher<I> {
    /// Publishes `Ok` items; the first `Err` terminates the stream with
    /// that error.
    pub fn from_results<C>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<T, I> Publisher<T> for IterPublisher<I>
where
    T: Send + 'static,
    I: Iterator<Item = Result<T, FrameError>> + Send + 'static,
{
    fn subscribe<S>(self, subscriber: S)
    where
        S: Subscriber<T> + 'static,
    {
        let subscription = Arc::new(IterSubscription {
            requested: DemandCounter::new(),
            // Held while on_subscribe runs so early requests only queue.
            wip: AtomicUsize::new(1),
            cancelled: AtomicBool::new(false),
            state: Mutex::new(IterState {
                items: self.items.peekable(),
                subscriber: None,
            }),
        });

        {
            let mut state = subscription.state.lock();
            let mut subscriber: Box<dyn Subscriber<T>> = Box::new(subscriber);
            let handle: Arc<dyn Subscription> = subscription.clone();
            subscriber.on_subscribe(handle);
            state.subscriber = Some(subscriber);
        }

        subscription.run();
    }
}

struct IterState<T, I: Iterator> {
    items: Peekable<I>,
    subscriber: Option<Box<dyn Subscriber<T>>>,
}

struct IterSubscription<T, I: Iterator> {
    requested: DemandCounter,
    wip: AtomicUsize,
    cancelled: AtomicBool,
    state: Mutex<IterState<T, I>>,
}

impl<T, I> IterSubscription<T, I>
where
    I: Iterator<Item = Result<T, FrameError>>,
{
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.run();
        }
    }

    /// Emits until no request arrived during the previous pass.
    fn run(&self) {
        let mut missed = 1;
        loop {
            self.emit();
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn emit(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        loop {
            let Some(subscriber) = state.subscriber.as_mut() else {
                return;
            };
            if self.cancelled.load(Ordering::Acquire) {
                state.subscriber = None;
                return;
            }

            match state.items.peek() {
                None => {
                    subscriber.on_complete();
                    state.subscriber = None;
                }
                Some(Err(_)) => {
                    if let Some(Err(error)) = state.items.next() {
                        subscriber.on_error(error);
                    }
                    state.subscriber = None;
                }
                Some(Ok(_)) => {
                    if self.requested.take_one().is_none() {
                        return;
                    }
                    if let Some(Ok(item)) = state.items.next() {
                        subscriber.on_next(item);
                    }
                }
            }
        }
    }
}

impl<T, I> Subscription for IterSubscription<T, I>
where
    T: Send,
    I: Iterator<Item = Result<T, FrameError>> + Send,
{
    fn request(&self, n: u64) {
        if n == 0 {
            tracing::warn!("ignoring request for zero items");
            return;
        }
        self.requested.add(n);
        self.drain();
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.drain();
        }
    }
}
