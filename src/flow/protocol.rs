//! The pull-based streaming contract.
//!
//! A [`Publisher`] hands a [`Subscription`] to its [`Subscriber`] through
//! `on_subscribe`. Nothing flows until the subscriber calls
//! [`Subscription::request`]; afterwards the publisher delivers at most the
//! requested number of items through `on_next`, then ends with exactly one
//! of `on_error` or `on_complete`.
//!
//! Signals to one subscriber are serial, which is why its methods take
//! `&mut self`. `request` and `cancel` take `&self` because they may be
//! called from any thread, including from inside `on_next`.

use std::sync::Arc;

use crate::error::FrameError;

/// Demand meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// The consumer's handle on a publisher.
pub trait Subscription: Send + Sync {
    /// Authorizes `n` more items. Demand accumulates and saturates at
    /// [`UNBOUNDED`].
    fn request(&self, n: u64);

    /// Stops delivery. Items already in flight may still arrive.
    fn cancel(&self);
}

/// Receives the four lifecycle signals of a stream.
pub trait Subscriber<T>: Send {
    /// Called once, before any other signal.
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

    /// Called for each item, never more often than requested.
    fn on_next(&mut self, item: T);

    /// Terminal failure.
    fn on_error(&mut self, error: FrameError);

    /// Terminal success.
    fn on_complete(&mut self);
}

/// A cold source of items for a single subscriber.
pub trait Publisher<T> {
    /// Starts the stream, delivering signals to `subscriber`.
    fn subscribe<S>(self, subscriber: S)
    where
        S: Subscriber<T> + 'static;
}

impl<T, S> Subscriber<T> for Box<S>
where
    S: Subscriber<T> + ?Sized,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        (**self).on_subscribe(subscription)
    }

    fn on_next(&mut self, item: T) {
        (**self).on_next(item)
    }

    fn on_error(&mut self, error: FrameError) {
        (**self).on_error(error)
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }
}
