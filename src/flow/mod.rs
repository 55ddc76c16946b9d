//! Pull-based stream plumbing.
//!
//! - [`Publisher`], [`Subscriber`], [`Subscription`] - The streaming contract
//! - [`DemandCounter`] - Atomic demand bookkeeping
//! - [`Interceptor`], [`DemandHook`], [`Intercepted`] - Stages between two ends
//! - [`IterPublisher`] - A demand-honoring source over an iterator

mod demand;
mod interceptor;
mod protocol;
mod source;

pub use demand::DemandCounter;
pub(crate) use demand::DemandBalance;
pub use interceptor::{Context, DemandHook, Forward, Intercept, Intercepted, Interceptor, intercept};
pub use protocol::{Publisher, Subscriber, Subscription, UNBOUNDED};
pub use source::{IterPublisher, Items};
