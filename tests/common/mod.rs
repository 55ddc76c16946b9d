// Shared probes for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flowframe::{FrameError, Subscriber, Subscription};
use parking_lot::Mutex;

/// What a [`Probe`] observed.
pub struct Seen<T> {
    pub items: Vec<T>,
    pub errors: Vec<FrameError>,
    pub completions: usize,
    pub subscription: Option<Arc<dyn Subscription>>,
}

/// Downstream probe: requests `initial` on subscribe and `refill` after
/// every item.
pub struct Probe<T> {
    initial: u64,
    refill: u64,
    seen: Arc<Mutex<Seen<T>>>,
}

pub type Handle<T> = Arc<Mutex<Seen<T>>>;

impl<T> Probe<T> {
    pub fn new(initial: u64) -> (Self, Handle<T>) {
        Self::with_refill(initial, 0)
    }

    pub fn with_refill(initial: u64, refill: u64) -> (Self, Handle<T>) {
        let seen = Arc::new(Mutex::new(Seen {
            items: Vec::new(),
            errors: Vec::new(),
            completions: 0,
            subscription: None,
        }));
        let probe = Self {
            initial,
            refill,
            seen: Arc::clone(&seen),
        };
        (probe, seen)
    }
}

impl<T: Send> Subscriber<T> for Probe<T> {
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        self.seen.lock().subscription = Some(Arc::clone(&subscription));
        if self.initial > 0 {
            subscription.request(self.initial);
        }
    }

    fn on_next(&mut self, item: T) {
        let subscription = {
            let mut seen = self.seen.lock();
            seen.items.push(item);
            seen.subscription.clone()
        };
        if let (true, Some(subscription)) = (self.refill > 0, subscription) {
            subscription.request(self.refill);
        }
    }

    fn on_error(&mut self, error: FrameError) {
        self.seen.lock().errors.push(error);
    }

    fn on_complete(&mut self) {
        self.seen.lock().completions += 1;
    }
}

/// Requests `n` through the probe's subscription.
pub fn request<T>(handle: &Handle<T>, n: u64) {
    let subscription = handle.lock().subscription.clone();
    if let Some(subscription) = subscription {
        subscription.request(n);
    }
}

/// Cancels through the probe's subscription.
pub fn cancel<T>(handle: &Handle<T>) {
    let subscription = handle.lock().subscription.clone();
    if let Some(subscription) = subscription {
        subscription.cancel();
    }
}

/// Upstream stand-in that only records demand.
#[derive(Default)]
pub struct Upstream {
    pub requests: Mutex<Vec<u64>>,
    pub cancels: AtomicUsize,
}

impl Upstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requested(&self) -> Vec<u64> {
        self.requests.lock().clone()
    }

    pub fn cancelled(&self) -> bool {
        self.cancels.load(Ordering::Acquire) > 0
    }
}

impl Subscription for Upstream {
    fn request(&self, n: u64) {
        self.requests.lock().push(n);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::AcqRel);
    }
}
