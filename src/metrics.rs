//! Metric helpers for `wireframe_reassembly`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking ingested fragments by outcome.
pub const FRAGMENTS_TOTAL: &str = "wireframe_reassembly_fragments_total";
/// Name of the counter tracking reassembled messages.
pub const MESSAGES_COMPLETED: &str = "wireframe_reassembly_messages_completed_total";
/// Name of the counter tracking incomplete messages evicted on timeout.
pub const MESSAGES_EVICTED: &str = "wireframe_reassembly_messages_evicted_total";
/// Name of the counter tracking rejected fragments.
pub const ERRORS_TOTAL: &str = "wireframe_reassembly_errors_total";
/// Name of the gauge tracking buffers awaiting more fragments.
pub const IN_FLIGHT: &str = "wireframe_reassembly_in_flight";

/// What happened to an ingested fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The fragment filled a new slot.
    Accepted,
    /// The fragment repeated a slot or arrived after completion.
    Duplicate,
    /// The fragment was rejected as malformed.
    Rejected,
}

impl Outcome {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Duplicate => "duplicate",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Record an ingested fragment.
pub fn inc_fragments(outcome: Outcome) {
    #[cfg(feature = "metrics")]
    counter!(FRAGMENTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a completed message.
pub fn inc_completed() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_COMPLETED).increment(1);
}

/// Record `count` evicted messages.
pub fn inc_evicted(count: usize) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_EVICTED).increment(count as u64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a rejected fragment.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}

/// Publish the number of buffers awaiting more fragments.
#[cfg_attr(
    feature = "metrics",
    expect(
        clippy::cast_precision_loss,
        reason = "buffer counts stay far below 2^52"
    )
)]
pub fn set_in_flight(count: usize) {
    #[cfg(feature = "metrics")]
    gauge!(IN_FLIGHT).set(count as f64);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}
