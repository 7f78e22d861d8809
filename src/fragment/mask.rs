//! Per-index completion tracking for one message.
//!
//! [`ReceivedMask`] holds exactly one slot per fragment. A slot is claimed
//! before its bytes are copied and marked received afterwards, so a
//! duplicate that races the original copy sees the claim and backs off
//! instead of writing the same range twice.

use super::FragmentIndex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Missing,
    Writing,
    Received,
}

/// Outcome of [`ReceivedMask::claim`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Claim {
    /// The caller owns the slot and must copy its bytes, then call
    /// [`ReceivedMask::mark_received`].
    Granted,
    /// Another caller already claimed or filled the slot.
    Taken,
}

/// Tracks which of a message's fragment indices have arrived.
///
/// The mask is sized to exactly the declared fragment count and completion
/// compares the received tally against that count, never against any
/// storage granularity.
#[derive(Clone, Debug)]
pub struct ReceivedMask {
    slots: Box<[Slot]>,
    fragment_count: u32,
    received: u32,
}

impl ReceivedMask {
    /// Create an empty mask for `fragment_count` indices.
    #[must_use]
    pub fn new(fragment_count: u32) -> Self {
        Self {
            slots: vec![Slot::Missing; fragment_count as usize].into_boxed_slice(),
            fragment_count,
            received: 0,
        }
    }

    /// Number of indices the mask tracks.
    #[must_use]
    pub const fn fragment_count(&self) -> u32 { self.fragment_count }

    /// Number of indices marked received.
    #[must_use]
    pub const fn received(&self) -> u32 { self.received }

    /// Whether every index has been marked received.
    #[must_use]
    pub const fn is_full(&self) -> bool { self.received == self.fragment_count }

    /// Whether `index` has been marked received.
    #[cfg(test)]
    #[must_use]
    pub fn contains(&self, index: FragmentIndex) -> bool {
        self.slots.get(index.as_usize()) == Some(&Slot::Received)
    }

    /// Try to take ownership of the slot at `index`.
    ///
    /// Indices outside the mask are reported as [`Claim::Taken`]; callers
    /// range-check against the message shape first.
    pub fn claim(&mut self, index: FragmentIndex) -> Claim {
        match self.slots.get_mut(index.as_usize()) {
            Some(slot @ Slot::Missing) => {
                *slot = Slot::Writing;
                Claim::Granted
            }
            _ => Claim::Taken,
        }
    }

    /// Mark a previously claimed slot as received.
    ///
    /// Returns `true` when this call filled the last missing slot. Marking a
    /// slot that was never claimed, or one already received, changes nothing
    /// and returns `false`.
    pub fn mark_received(&mut self, index: FragmentIndex) -> bool {
        let Some(slot) = self.slots.get_mut(index.as_usize()) else {
            return false;
        };
        if *slot != Slot::Writing {
            return false;
        }
        *slot = Slot::Received;
        self.received += 1;
        self.is_full()
    }
}
