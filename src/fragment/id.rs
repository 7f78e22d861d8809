//! Identifiers shared by every fragment of one logical message.
//!
//! [`MessageId`] keys a reassembly in the registry; [`FragmentIndex`] places
//! a fragment within its message. Both are thin `Copy` newtypes so they can
//! travel inside [`FragmentHeader`](super::FragmentHeader) and error values
//! without allocation.

use std::num::TryFromIntError;

use bincode::{Decode, Encode};
use derive_more::{Display, From, Into};

/// Identifier of a logical message whose fragments are being reassembled.
///
/// # Examples
///
/// ```
/// use wireframe_reassembly::fragment::MessageId;
/// let id = MessageId::new(0xfeed);
/// assert_eq!(id.get(), 0xfeed);
/// assert_eq!(id.to_string(), "65261");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Encode, Decode, Display, From, Into)]
#[display("{_0}")]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Return the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

/// Zero-based position of a fragment within its message.
///
/// The index alone determines where a fragment's bytes land in the
/// destination buffer; arrival order never does.
///
/// # Examples
///
/// ```
/// use wireframe_reassembly::fragment::FragmentIndex;
/// let index = FragmentIndex::new(2);
/// assert_eq!(index.as_usize(), 2);
/// assert!(index < FragmentIndex::new(3));
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Encode, Decode, Display, From, Into,
)]
#[display("{_0}")]
pub struct FragmentIndex(u32);

impl FragmentIndex {
    /// Construct an index from a `u32` value.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value) }

    /// The first fragment of every message.
    #[must_use]
    pub const fn zero() -> Self { Self(0) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// Return the index widened for slice addressing.
    #[must_use]
    pub const fn as_usize(self) -> usize { self.0 as usize }
}

impl TryFrom<usize> for FragmentIndex {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> { u32::try_from(value).map(Self) }
}
