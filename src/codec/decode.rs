//! The aggregating decode stage.
//!
//! Raw chunks are appended to one [`GrowableBuffer`]; every delimiter
//! found closes a unit, which is decoded and queued. Queued units are
//! delivered only against downstream demand.
//!
//! # Demand relay
//!
//! [`DecodeDemand`] keeps four counters:
//!
//! - `pending`: chunks requested by downstream minus chunks received
//! - `credit`: chunks the stage requested on its own and has not received
//! - `in_flight`: the part of `pending + credit` already forwarded upstream
//! - `wanted`: units downstream may still receive
//!
//! A downstream `request(n)` adds `n` to `pending` and is forwarded only
//! when nothing is in flight, so a request arriving while an earlier one is
//! unsatisfied forwards nothing. Once the in-flight chunks have all arrived,
//! whatever is still outstanding goes upstream in one request.
//!
//! Chunks and units are not one to one. When downstream still wants units
//! but every requested chunk has arrived without closing one, the stage
//! credits itself one more chunk so accumulation never stalls. Credited
//! chunks are counted apart: `pending` stays equal to requested minus
//! received for as long as downstream has asked for at least as many as
//! arrived, and surplus chunks are paid back out of the next request.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use super::unit::UnitCodec;
use crate::buffer::GrowableBuffer;
use crate::config::{CodecConfig, PartialUnitPolicy};
use crate::error::{FrameError, FramingError};
use crate::flow::{Context, DemandBalance, DemandCounter, DemandHook, Interceptor, Subscription};

/// Demand shared between the request path and the item path of a
/// [`DecodeAggregator`].
#[derive(Debug, Default)]
pub struct DecodeDemand {
    pending: DemandBalance,
    credit: DemandCounter,
    in_flight: DemandCounter,
    wanted: DemandCounter,
    wip: AtomicUsize,
}

impl DecodeDemand {
    /// Chunks requested by downstream minus chunks received; zero once
    /// more have arrived than were requested.
    pub fn pending(&self) -> u64 {
        self.pending.pending()
    }

    /// Chunks the stage requested on its own and has not yet received.
    pub fn credit(&self) -> u64 {
        self.credit.get()
    }

    /// Chunks requested from upstream and not yet received.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.get()
    }

    /// Units downstream may still receive.
    pub fn wanted(&self) -> u64 {
        self.wanted.get()
    }

    fn received(&self) {
        if self.pending.take_one() <= 0 && self.credit.take_one().is_none() {
            tracing::warn!("upstream delivered more chunks than requested");
        }
        // Every forwarded request is satisfied, credited ones included.
        if self.in_flight.take_one() == Some(0) {
            self.credit.reset();
        }
    }

    fn outstanding(&self) -> u64 {
        self.pending().saturating_add(self.credit())
    }

    /// Forwards pending demand once nothing is in flight.
    fn settle(&self, upstream: &dyn Subscription) {
        if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
            return;
        }

        let mut missed = 1;
        loop {
            if self.in_flight.get() == 0 {
                let n = self.outstanding();
                if n > 0 {
                    self.in_flight.add(n);
                    tracing::trace!(n, "forwarding demand upstream");
                    upstream.request(n);
                }
            }

            missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
            if missed == 0 {
                break;
            }
        }
    }
}

impl DemandHook for DecodeDemand {
    fn on_request(&self, n: u64, upstream: &dyn Subscription) {
        self.wanted.add(n);
        let previous = self.pending.add(n);
        tracing::trace!(n, previous, "downstream request");
        self.settle(upstream);
    }
}

/// Accumulates raw chunks into delimited units and decodes them.
pub struct DecodeAggregator<C: UnitCodec> {
    codec: Arc<C>,
    buffer: GrowableBuffer,
    delimiter: Option<u8>,
    policy: PartialUnitPolicy,
    max_unit_size: Option<usize>,
    // Bytes at the front of `buffer` already known to hold no delimiter.
    scanned: usize,
    ready: VecDeque<C::Incoming>,
    // Unit dropped at completion under `PartialUnitPolicy::Discard`.
    discarded: Option<usize>,
    upstream_done: bool,
    demand: Arc<DecodeDemand>,
}

impl<C: UnitCodec> DecodeAggregator<C> {
    /// Creates a stage decoding with `codec` under `config`.
    pub fn new(codec: Arc<C>, config: &CodecConfig) -> Self {
        Self {
            codec,
            buffer: GrowableBuffer::with_config(*config.buffer()),
            delimiter: config.delimiter(),
            policy: config.partial_unit_policy(),
            max_unit_size: config.max_unit_size(),
            scanned: 0,
            ready: VecDeque::new(),
            discarded: None,
            upstream_done: false,
            demand: Arc::new(DecodeDemand::default()),
        }
    }

    /// Returns the shared demand state.
    pub fn demand(&self) -> Arc<DecodeDemand> {
        Arc::clone(&self.demand)
    }

    /// Bytes of the unit currently accumulating.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decoded units waiting for demand.
    pub fn ready(&self) -> usize {
        self.ready.len()
    }

    fn split_units(&mut self) -> Result<(), FrameError> {
        if let Some(delimiter) = self.delimiter {
            let mut start = 0;
            let mut from = self.scanned;
            while let Some(end) = self.buffer.find(delimiter, from) {
                self.check_size(end - start)?;
                let unit = Bytes::copy_from_slice(&self.buffer.as_slice()[start..end]);
                tracing::trace!(len = unit.len(), "unit complete");
                self.ready.push_back(self.codec.decode_unit(unit)?);
                start = end + 1;
                from = start;
            }

            if start > 0 {
                self.buffer.advance(start);
                if self.buffer.is_empty() {
                    self.buffer.reset();
                }
            }
            self.scanned = self.buffer.len();
        }

        self.check_size(self.buffer.len())
    }

    fn check_size(&self, actual: usize) -> Result<(), FrameError> {
        match self.max_unit_size {
            Some(max) if actual > max => Err(FramingError::UnitTooLarge { actual, max }.into()),
            _ => Ok(()),
        }
    }

    fn flush(&mut self, cx: &mut Context<'_, C::Incoming>) {
        while !self.ready.is_empty() && !cx.is_cancelled() {
            if self.demand.wanted.take_one().is_none() {
                break;
            }
            if let Some(unit) = self.ready.pop_front() {
                cx.emit(unit);
            }
        }
    }

    fn refill(&self, upstream: &dyn Subscription) {
        if self.ready.is_empty() && self.demand.wanted() > 0 && self.demand.outstanding() == 0 {
            tracing::trace!(buffered = self.buffer.len(), "unit incomplete, crediting one chunk");
            self.demand.credit.add(1);
        }
        self.demand.settle(upstream);
    }

    fn close_trailing(&mut self) -> Result<(), FrameError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        match (self.delimiter, self.policy) {
            (Some(_), PartialUnitPolicy::Discard) => {
                let buffered = self.buffer.len();
                tracing::debug!(buffered, "discarding incomplete unit");
                self.buffer.reset();
                self.discarded = Some(buffered);
            }
            _ => {
                let unit = self.buffer.take();
                tracing::debug!(len = unit.len(), "flushing final unit");
                self.ready.push_back(self.codec.decode_unit(unit)?);
            }
        }
        Ok(())
    }
}

impl<C: UnitCodec> Interceptor for DecodeAggregator<C> {
    type In = Bytes;
    type Out = C::Incoming;

    fn demand_hook(&self) -> Arc<dyn DemandHook> {
        self.demand.clone()
    }

    fn on_item(&mut self, chunk: Bytes, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        self.demand.received();
        if !chunk.is_empty() {
            self.buffer.append(&chunk)?;
            if let Err(error) = self.split_units() {
                // Units completed ahead of the failure are still owed.
                self.flush(cx);
                return Err(error);
            }
        }
        self.flush(cx);
        if !cx.is_cancelled() {
            self.refill(cx.upstream());
        }
        Ok(())
    }

    fn on_demand(&mut self, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        self.flush(cx);
        if !self.upstream_done && !cx.is_cancelled() {
            self.refill(cx.upstream());
        }
        Ok(())
    }

    fn on_complete(&mut self, cx: &mut Context<'_, C::Incoming>) -> Result<(), FrameError> {
        self.upstream_done = true;
        self.close_trailing()?;
        self.flush(cx);
        Ok(())
    }

    fn finish(&mut self) -> Option<Result<(), FrameError>> {
        if !self.ready.is_empty() {
            return None;
        }
        Some(match self.discarded.take() {
            Some(buffered) => Err(FramingError::IncompleteUnit { buffered }.into()),
            None => Ok(()),
        })
    }

    fn release(&mut self) {
        if !self.buffer.is_empty() || !self.ready.is_empty() {
            tracing::debug!(
                buffered = self.buffer.len(),
                ready = self.ready.len(),
                "releasing decode state"
            );
        }
        self.buffer.reset();
        self.scanned = 0;
        self.ready.clear();
    }
}
