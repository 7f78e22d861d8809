use bincode::{Decode, Encode};

use super::{Fragment, FragmentIndex, MessageId};

/// Wire header preceding every fragment in a datagram.
///
/// The header carries the message key plus the shape fields a
/// [`Fragment`] needs; a `fragment_count` of one marks an unfragmented
/// message.
///
/// # Examples
///
/// ```
/// use wireframe_reassembly::fragment::{FragmentHeader, FragmentIndex, MessageId};
/// let header = FragmentHeader::new(MessageId::new(7), 10, 3, FragmentIndex::new(2), 4);
/// assert_eq!(header.message_id().get(), 7);
/// assert!(!header.is_alone());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode)]
pub struct FragmentHeader {
    message_id: MessageId,
    total_length: u32,
    fragment_count: u32,
    fragment_index: FragmentIndex,
    fragment_size: u32,
}

impl FragmentHeader {
    /// Create a new fragment header.
    #[must_use]
    pub const fn new(
        message_id: MessageId,
        total_length: u32,
        fragment_count: u32,
        fragment_index: FragmentIndex,
        fragment_size: u32,
    ) -> Self {
        Self {
            message_id,
            total_length,
            fragment_count,
            fragment_index,
            fragment_size,
        }
    }

    /// Header for a message carried whole in one datagram.
    #[must_use]
    pub const fn alone(message_id: MessageId, total_length: u32) -> Self {
        Self::new(message_id, total_length, 1, FragmentIndex::zero(), total_length)
    }

    /// Derive the header that describes `fragment` on the wire.
    #[must_use]
    pub fn for_fragment(message_id: MessageId, fragment: &Fragment) -> Self {
        Self::new(
            message_id,
            fragment.total_length(),
            fragment.fragment_count(),
            fragment.fragment_index(),
            fragment.fragment_size(),
        )
    }

    /// Return the logical message identifier.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Declared byte length of the reassembled message.
    #[must_use]
    pub const fn total_length(&self) -> u32 { self.total_length }

    /// Declared number of fragments.
    #[must_use]
    pub const fn fragment_count(&self) -> u32 { self.fragment_count }

    /// Return the fragment position relative to the message.
    #[must_use]
    pub const fn fragment_index(&self) -> FragmentIndex { self.fragment_index }

    /// Declared stride between fragment offsets.
    #[must_use]
    pub const fn fragment_size(&self) -> u32 { self.fragment_size }

    /// Whether the message travels unfragmented.
    #[must_use]
    pub const fn is_alone(&self) -> bool { self.fragment_count == 1 }
}
