//! Outbound helper that splits payloads into [`Fragment`] descriptors.
//!
//! [`Fragmenter`] is the sending-side mirror of the reassembly buffer: it
//! chunks a payload at a fixed stride and tags each chunk with its index and
//! the message shape. Chunks are zero-copy slices of the input [`Bytes`].

use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;

use super::{Fragment, FragmentHeader, FragmentIndex, FragmentationError, MessageId};

/// Splits payloads into fragment-sized descriptors.
#[derive(Debug)]
pub struct Fragmenter {
    max_fragment_size: NonZeroU32,
    next_message_id: AtomicU64,
}

impl Fragmenter {
    /// Create a fragmenter that caps fragment payloads at `max_fragment_size` bytes.
    #[must_use]
    pub const fn new(max_fragment_size: NonZeroU32) -> Self {
        Self::with_starting_id(max_fragment_size, MessageId::new(0))
    }

    /// Create a fragmenter that allocates ids starting at `start_at`.
    #[must_use]
    pub const fn with_starting_id(max_fragment_size: NonZeroU32, start_at: MessageId) -> Self {
        Self {
            max_fragment_size,
            next_message_id: AtomicU64::new(start_at.get()),
        }
    }

    /// Return the maximum fragment payload size in bytes.
    #[must_use]
    pub const fn max_fragment_size(&self) -> NonZeroU32 { self.max_fragment_size }

    /// Allocate the next [`MessageId`], wrapping at `u64::MAX`.
    pub fn next_message_id(&self) -> MessageId {
        MessageId::new(self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Split `payload` under a freshly allocated [`MessageId`].
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::PayloadTooLarge`] when the payload
    /// length does not fit a `u32`.
    pub fn fragment_bytes(
        &self,
        payload: impl Into<Bytes>,
    ) -> Result<FragmentBatch, FragmentationError> {
        let message_id = self.next_message_id();
        self.fragment_with_id(message_id, payload)
    }

    /// Split `payload`, tagging the batch with `message_id`.
    ///
    /// Payloads no larger than one fragment produce a single alone fragment.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::PayloadTooLarge`] when the payload
    /// length does not fit a `u32`.
    pub fn fragment_with_id(
        &self,
        message_id: MessageId,
        payload: impl Into<Bytes>,
    ) -> Result<FragmentBatch, FragmentationError> {
        let payload = payload.into();
        let total = u32::try_from(payload.len())
            .map_err(|_| FragmentationError::PayloadTooLarge { len: payload.len() })?;
        let stride = self.max_fragment_size.get();
        if total <= stride {
            return Ok(FragmentBatch::new(message_id, vec![Fragment::alone(payload)]));
        }

        let count = total.div_ceil(stride);
        let fragments = (0..count)
            .map(|index| {
                let start = index as usize * stride as usize;
                let end = (start + stride as usize).min(payload.len());
                Fragment::part(
                    total,
                    count,
                    FragmentIndex::new(index),
                    stride,
                    payload.slice(start..end),
                )
            })
            .collect();
        Ok(FragmentBatch::new(message_id, fragments))
    }
}

/// Fragments produced for a single logical message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    message_id: MessageId,
    fragments: Vec<Fragment>,
}

impl FragmentBatch {
    fn new(message_id: MessageId, fragments: Vec<Fragment>) -> Self {
        debug_assert!(!fragments.is_empty(), "fragment batches must not be empty");
        Self {
            message_id,
            fragments,
        }
    }

    /// Return the [`MessageId`] shared by all fragments.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Return the fragments as a slice.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] { self.fragments.as_slice() }

    /// Number of fragments in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches are guaranteed non-empty"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.fragments.len() }

    /// Whether the message needed more than one fragment.
    #[must_use]
    pub fn is_fragmented(&self) -> bool { self.len() > 1 }

    /// Wire headers for every fragment, in index order.
    pub fn headers(&self) -> impl Iterator<Item = FragmentHeader> + '_ {
        self.fragments
            .iter()
            .map(|fragment| FragmentHeader::for_fragment(self.message_id, fragment))
    }

    /// Consume the batch, returning all fragments.
    #[must_use]
    pub fn into_fragments(self) -> Vec<Fragment> { self.fragments }
}

impl IntoIterator for FragmentBatch {
    type Item = Fragment;
    type IntoIter = std::vec::IntoIter<Fragment>;

    fn into_iter(self) -> Self::IntoIter { self.fragments.into_iter() }
}
