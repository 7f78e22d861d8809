//! Geometry of a fragmented message.
//!
//! A [`MessageShape`] is fixed by the first fragment of a message and every
//! later fragment must declare the same one. The shape alone decides which
//! destination bytes each index owns, so concurrent writers never need to
//! agree on a shared cursor.

use std::ops::Range;

use derive_more::Display;

use super::{Fragment, FragmentIndex, ReassemblyError};

/// Declared total length, fragment count, and stride of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[display("{total_length} bytes in {fragment_count} x {fragment_size}")]
pub struct MessageShape {
    /// Byte length of the reassembled message.
    pub total_length: u32,
    /// Number of fragments.
    pub fragment_count: u32,
    /// Stride between fragment offsets.
    pub fragment_size: u32,
}

impl MessageShape {
    /// Read the shape declared by `fragment`.
    #[must_use]
    pub fn of(fragment: &Fragment) -> Self {
        Self {
            total_length: fragment.total_length(),
            fragment_count: fragment.fragment_count(),
            fragment_size: fragment.fragment_size(),
        }
    }

    /// Check that the shape can describe a real message.
    ///
    /// A valid shape has at least one fragment, a non-zero stride, and a
    /// total length that leaves the final fragment between one byte and a
    /// full stride long.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::InvalidShape`] otherwise.
    pub fn validate(self) -> Result<Self, ReassemblyError> {
        let count = u64::from(self.fragment_count);
        let size = u64::from(self.fragment_size);
        let total = u64::from(self.total_length);
        let valid = count > 0 && size > 0 && (count - 1) * size < total && total <= count * size;
        if valid {
            Ok(self)
        } else {
            Err(ReassemblyError::InvalidShape { shape: self })
        }
    }

    /// Destination capacity in bytes.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.total_length as usize }

    /// Destination byte range owned by `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::IndexOutOfRange`] when `index` is not below
    /// the fragment count.
    pub fn span(&self, index: FragmentIndex) -> Result<Range<usize>, ReassemblyError> {
        if index.get() >= self.fragment_count {
            return Err(ReassemblyError::IndexOutOfRange {
                index,
                count: self.fragment_count,
            });
        }
        let start = index.as_usize() * self.fragment_size as usize;
        let end = (start + self.fragment_size as usize).min(self.capacity());
        Ok(start..end)
    }
}
