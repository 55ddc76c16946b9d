//! Decorating a stream between an upstream publisher and a downstream
//! subscriber.
//!
//! [`Intercepted`] sits in the middle of a stream. By default it forwards
//! every signal verbatim; an [`Interceptor`] overrides the item path and a
//! [`DemandHook`] overrides the request path. The two halves are separate
//! because the item path is serial (`&mut self`) while `request` and
//! `cancel` arrive concurrently (`&self`).
//!
//! Upstream signals and demand changes are queued and drained by whichever
//! thread gets there first. Only the draining thread touches the
//! interceptor and the downstream, so a `request` issued from inside
//! `on_next` queues instead of recursing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::protocol::{Publisher, Subscriber, Subscription};
use crate::error::FrameError;

/// Request-path hooks, shared between the downstream and the item path.
pub trait DemandHook: Send + Sync {
    /// Downstream asked for `n` more items.
    fn on_request(&self, n: u64, upstream: &dyn Subscription) {
        upstream.request(n);
    }

    /// Downstream cancelled.
    fn on_cancel(&self, upstream: &dyn Subscription) {
        upstream.cancel();
    }
}

/// A [`DemandHook`] that forwards everything unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Forward;

impl DemandHook for Forward {}

/// What an [`Interceptor`] can reach while handling a signal.
pub struct Context<'a, T> {
    upstream: &'a dyn Subscription,
    downstream: &'a mut dyn Subscriber<T>,
    cancelled: &'a AtomicBool,
}

impl<'a, T> Context<'a, T> {
    /// Delivers an item downstream.
    pub fn emit(&mut self, item: T) {
        self.downstream.on_next(item);
    }

    /// Returns the upstream subscription.
    pub fn upstream(&self) -> &dyn Subscription {
        self.upstream
    }

    /// Returns true once downstream has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Item-path behavior of an intercepting stage.
pub trait Interceptor: Send {
    /// Item type received from upstream.
    type In: Send;
    /// Item type delivered downstream.
    type Out;

    /// Returns the request-path hooks.
    fn demand_hook(&self) -> Arc<dyn DemandHook>;

    /// Handles one upstream item. An error cancels upstream and terminates
    /// downstream with that error.
    fn on_item(&mut self, item: Self::In, cx: &mut Context<'_, Self::Out>)
    -> Result<(), FrameError>;

    /// Runs after downstream demand grew, once the hook has seen it.
    fn on_demand(&mut self, _cx: &mut Context<'_, Self::Out>) -> Result<(), FrameError> {
        Ok(())
    }

    /// Runs when upstream completes. An error replaces the completion
    /// signal.
    fn on_complete(&mut self, _cx: &mut Context<'_, Self::Out>) -> Result<(), FrameError> {
        Ok(())
    }

    /// Settles the stream after `on_complete` and after every later demand
    /// change. Returns `None` while items are still held back for lack of
    /// demand; the returned result then replaces the completion signal.
    fn finish(&mut self) -> Option<Result<(), FrameError>> {
        Some(Ok(()))
    }

    /// Drops any buffered state. Called on every terminal path and on
    /// cancellation.
    fn release(&mut self) {}
}

enum Signal<T> {
    Next(T),
    Error(FrameError),
    Complete,
}

enum Step {
    Continue,
    /// Stage failure: upstream is still live and must be cancelled.
    Abort(FrameError),
    Finish(Result<(), FrameError>),
}

struct Core<I, S> {
    interceptor: I,
    downstream: Option<S>,
    completing: bool,
}

/// State shared by the upstream-facing subscriber and the subscription
/// handed downstream.
struct Shared<I: Interceptor, S> {
    hook: Arc<dyn DemandHook>,
    upstream: OnceLock<Arc<dyn Subscription>>,
    cancelled: AtomicBool,
    demanded: AtomicBool,
    wip: AtomicUsize,
    signals: Mutex<VecDeque<Signal<I::In>>>,
    core: Mutex<Core<I, S>>,
}

impl<I, S> Shared<I, S>
where
    I: Interceptor,
    S: Subscriber<I::Out>,
{
    fn drain(&self) {
        if self.wip.fetch_add(1, Ordering::AcqRel) == 0 {
            self.run();
        }
    }

    fn run(&self) {
        let mut missed = 1;
        loop {
            {
                let mut core = self.core.lock();
                self.drain_core(&mut core);
            }
            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }

    fn drain_core(&self, core: &mut Core<I, S>) {
        let Some(upstream) = self.upstream.get() else {
            return;
        };

        loop {
            let Some(downstream) = core.downstream.as_mut() else {
                self.signals.lock().clear();
                return;
            };
            if self.cancelled.load(Ordering::Acquire) {
                core.interceptor.release();
                core.downstream = None;
                continue;
            }

            let signal = self.signals.lock().pop_front();
            let mut cx = Context {
                upstream: upstream.as_ref(),
                downstream,
                cancelled: &self.cancelled,
            };
            let step = match signal {
                Some(Signal::Next(item)) => match core.interceptor.on_item(item, &mut cx) {
                    Ok(()) => Step::Continue,
                    Err(error) => Step::Abort(error),
                },
                Some(Signal::Error(error)) => Step::Finish(Err(error)),
                Some(Signal::Complete) => match core.interceptor.on_complete(&mut cx) {
                    Ok(()) => {
                        core.completing = true;
                        Step::Continue
                    }
                    Err(error) => Step::Finish(Err(error)),
                },
                None if self.demanded.swap(false, Ordering::AcqRel) => {
                    match core.interceptor.on_demand(&mut cx) {
                        Ok(()) => Step::Continue,
                        Err(error) => Step::Abort(error),
                    }
                }
                None => return,
            };

            let result = match step {
                Step::Continue if core.completing => match core.interceptor.finish() {
                    Some(result) => result,
                    None => continue,
                },
                Step::Continue => continue,
                Step::Abort(error) => {
                    tracing::debug!(%error, "stage failed, cancelling upstream");
                    upstream.cancel();
                    Err(error)
                }
                Step::Finish(result) => result,
            };

            core.interceptor.release();
            if let Some(mut downstream) = core.downstream.take() {
                match result {
                    Ok(()) => downstream.on_complete(),
                    Err(error) => downstream.on_error(error),
                }
            }
        }
    }
}

impl<I, S> Subscription for Shared<I, S>
where
    I: Interceptor,
    S: Subscriber<I::Out>,
{
    fn request(&self, n: u64) {
        if n == 0 {
            tracing::warn!("ignoring request for zero items");
            return;
        }
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        let Some(upstream) = self.upstream.get() else {
            tracing::warn!(n, "request before subscription");
            return;
        };
        self.hook.on_request(n, upstream.as_ref());
        self.demanded.store(true, Ordering::Release);
        self.drain();
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::debug!("downstream cancelled");
        if let Some(upstream) = self.upstream.get() {
            self.hook.on_cancel(upstream.as_ref());
        }
        self.drain();
    }
}

/// A subscriber that runs an [`Interceptor`] in front of `downstream`.
pub struct Intercepted<I: Interceptor, S> {
    shared: Arc<Shared<I, S>>,
    done: bool,
}

impl<I, S> Intercepted<I, S>
where
    I: Interceptor,
    S: Subscriber<I::Out>,
{
    /// Wraps `downstream` with `interceptor`.
    pub fn new(interceptor: I, downstream: S) -> Self {
        let shared = Arc::new(Shared {
            hook: interceptor.demand_hook(),
            upstream: OnceLock::new(),
            cancelled: AtomicBool::new(false),
            demanded: AtomicBool::new(false),
            wip: AtomicUsize::new(0),
            signals: Mutex::new(VecDeque::new()),
            core: Mutex::new(Core {
                interceptor,
                downstream: Some(downstream),
                completing: false,
            }),
        });
        Self {
            shared,
            done: false,
        }
    }

    fn push(&mut self, signal: Signal<I::In>) {
        self.shared.signals.lock().push_back(signal);
        self.shared.drain();
    }
}

impl<I, S> Subscriber<I::In> for Intercepted<I, S>
where
    I: Interceptor + 'static,
    S: Subscriber<I::Out> + 'static,
{
    fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
        if self.shared.upstream.set(Arc::clone(&subscription)).is_err() {
            tracing::warn!("duplicate on_subscribe, cancelling the new subscription");
            subscription.cancel();
            return;
        }

        // Held while downstream subscribes so early requests only queue.
        let owner = self.shared.wip.fetch_add(1, Ordering::AcqRel) == 0;
        {
            let mut core = self.shared.core.lock();
            if let Some(downstream) = core.downstream.as_mut() {
                let link: Arc<dyn Subscription> = self.shared.clone();
                downstream.on_subscribe(link);
            }
        }
        if owner {
            self.shared.run();
        }
    }

    fn on_next(&mut self, item: I::In) {
        if self.done {
            tracing::warn!("item after terminal signal");
            return;
        }
        self.push(Signal::Next(item));
    }

    fn on_error(&mut self, error: FrameError) {
        if self.done {
            return;
        }
        self.done = true;
        self.push(Signal::Error(error));
    }

    fn on_complete(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        self.push(Signal::Complete);
    }
}

/// A publisher that wraps each subscriber with a fresh interceptor.
pub struct Intercept<P, F> {
    upstream: P,
    factory: F,
}

/// Routes `upstream` through the interceptor built by `factory`.
pub fn intercept<P, F, I>(upstream: P, factory: F) -> Intercept<P, F>
where
    P: Publisher<I::In>,
    F: FnOnce() -> I,
    I: Interceptor + 'static,
{
    Intercept { upstream, factory }
}

impl<P, F, I> Publisher<I::Out> for Intercept<P, F>
where
    P: Publisher<I::In>,
    F: FnOnce() -> I,
    I: Interceptor + 'static,
{
    fn subscribe<S>(self, subscriber: S)
    where
        S: Subscriber<I::Out> + 'static,
    {
        let interceptor = (self.factory)();
        self.upstream
            .subscribe(Intercepted::new(interceptor, subscriber));
    }
}
