//! Limits applied by the reassembly registry.

use std::{
    num::{NonZeroU32, NonZeroUsize},
    time::Duration,
};

use super::fragment_overhead;

/// Largest UDP payload carried by an IPv4 datagram.
const MAX_UDP_PAYLOAD: usize = 65_507;

/// Settings that bound reassembly resource usage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReassemblyConfig {
    /// Hard cap on the declared length of a reassembled message. Checked
    /// before the destination buffer is allocated.
    pub max_message_size: NonZeroUsize,
    /// Hard cap on the declared fragment count of a message.
    pub max_fragment_count: NonZeroU32,
    /// Duration after which incomplete buffers are evicted.
    pub reassembly_timeout: Duration,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_message_size: NonZeroUsize::new(16 * 1024 * 1024).unwrap_or(NonZeroUsize::MIN),
            max_fragment_count: NonZeroU32::new(u32::from(u16::MAX)).unwrap_or(NonZeroU32::MIN),
            reassembly_timeout: Duration::from_secs(5),
        }
    }
}

impl ReassemblyConfig {
    /// Override the message size cap.
    #[must_use]
    pub const fn with_max_message_size(mut self, max_message_size: NonZeroUsize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Override the fragment count cap.
    #[must_use]
    pub const fn with_max_fragment_count(mut self, max_fragment_count: NonZeroU32) -> Self {
        self.max_fragment_count = max_fragment_count;
        self
    }

    /// Override the eviction timeout.
    #[must_use]
    pub const fn with_reassembly_timeout(mut self, reassembly_timeout: Duration) -> Self {
        self.reassembly_timeout = reassembly_timeout;
        self
    }

    /// Largest fragment body that fits in a datagram of `datagram_budget`
    /// bytes once the fragment header is added.
    ///
    /// Returns `None` when the budget cannot hold the header plus one byte.
    /// Budgets above the UDP payload limit are clamped to it.
    #[must_use]
    pub fn fragment_payload_cap(datagram_budget: usize) -> Option<NonZeroU32> {
        let available = datagram_budget
            .min(MAX_UDP_PAYLOAD)
            .checked_sub(fragment_overhead().get())?;
        NonZeroU32::new(u32::try_from(available).ok()?)
    }
}
