//! Decoded description of one received fragment.
//!
//! A [`Fragment`] is what the wire decoder hands to the reassembly layer: the
//! fragment's position, the declared shape of the whole message, and the
//! fragment bytes themselves. The descriptor performs no validation; the
//! [`ReassemblyBuffer`](super::ReassemblyBuffer) checks every fragment
//! against the shape it was created with.

use bytes::Bytes;

use super::FragmentIndex;

/// Immutable descriptor of a single received fragment.
///
/// `fragment_size` is the declared stride between fragment offsets. Every
/// fragment carries exactly that many bytes except the last, which carries
/// whatever remains of `total_length`.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use wireframe_reassembly::fragment::{Fragment, FragmentIndex};
///
/// let tail = Fragment::part(10, 3, FragmentIndex::new(2), 4, Bytes::from_static(b"IJ"));
/// assert_eq!(tail.offset(), 8);
/// assert!(!tail.is_alone());
///
/// let single = Fragment::alone(Bytes::from_static(b"HELLO"));
/// assert!(single.is_alone());
/// assert_eq!(single.payload().as_ref(), b"HELLO");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    total_length: u32,
    fragment_count: u32,
    fragment_index: FragmentIndex,
    fragment_size: u32,
    payload: Bytes,
    alone: bool,
}

impl Fragment {
    /// Describe one fragment of a message split into `fragment_count` parts.
    ///
    /// `fragment_size` must be the nominal stride on every fragment,
    /// including the shorter tail. A decoder that passes the tail's own
    /// length instead declares a different message shape, and the buffer
    /// rejects it with [`ReassemblyError::ShapeMismatch`].
    ///
    /// [`ReassemblyError::ShapeMismatch`]: super::ReassemblyError::ShapeMismatch
    #[must_use]
    pub fn part(
        total_length: u32,
        fragment_count: u32,
        fragment_index: FragmentIndex,
        fragment_size: u32,
        payload: Bytes,
    ) -> Self {
        Self {
            total_length,
            fragment_count,
            fragment_index,
            fragment_size,
            payload,
            alone: false,
        }
    }

    /// Describe a message that was sent as a single, unfragmented unit.
    ///
    /// The shape fields are filled in for diagnostics only; reassembly never
    /// consults them for an alone fragment.
    #[must_use]
    pub fn alone(payload: Bytes) -> Self {
        let len = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        Self {
            total_length: len,
            fragment_count: 1,
            fragment_index: FragmentIndex::zero(),
            fragment_size: len,
            payload,
            alone: true,
        }
    }

    /// Byte length of the fully reassembled message.
    #[must_use]
    pub const fn total_length(&self) -> u32 { self.total_length }

    /// Number of fragments composing the message.
    #[must_use]
    pub const fn fragment_count(&self) -> u32 { self.fragment_count }

    /// This fragment's position within the message.
    #[must_use]
    pub const fn fragment_index(&self) -> FragmentIndex { self.fragment_index }

    /// Declared stride between fragment offsets.
    #[must_use]
    pub const fn fragment_size(&self) -> u32 { self.fragment_size }

    /// Borrow the fragment bytes.
    #[must_use]
    pub const fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the descriptor, returning the fragment bytes.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }

    /// Whether the message was never fragmented.
    #[must_use]
    pub const fn is_alone(&self) -> bool { self.alone }

    /// Destination offset of this fragment's first byte.
    ///
    /// Derived from the index and declared stride only.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.fragment_index
            .as_usize()
            .saturating_mul(self.fragment_size as usize)
    }
}
