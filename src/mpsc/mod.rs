//! Unbounded multi-producer/single-consumer queues.
//!
//! Two flavors, both grounded on `frenzy::MpscUnboundedQueue` /
//! `frenzy::MpscUnboundedNonIntrusiveQueue`
//! (`examples/original_source/src/lockfree/MpscUnboundedQueue.h` and
//! `MpscUnboundedNonIntrusiveQueue.h`): producers link in a new node by atomically
//! exchanging the tail pointer, then linking the previous tail's `next`; the single
//! consumer walks from `head`, re-inserting a dedicated stub node at the tail to keep
//! draining across the momentary gap between a producer's exchange and its link step.

mod intrusive;
mod non_intrusive;

pub use intrusive::{IntrusiveMpscQueue, Link};
pub use non_intrusive::NonIntrusiveMpscQueue;
