//! Error and status types emitted by the reassembly layer.
//!
//! Every error here is a local contract violation reported synchronously to
//! the caller. Duplicate and late fragments are not errors; they surface as
//! [`FragmentStatus::Duplicate`].

use std::num::{NonZeroU32, NonZeroUsize};

use thiserror::Error;

use super::{FragmentIndex, MessageId, MessageShape};

/// Result of feeding a fragment into a [`ReassemblyBuffer`](super::ReassemblyBuffer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentStatus {
    /// The message still expects more fragments.
    Incomplete,
    /// This fragment completed the message.
    ///
    /// Exactly one `ingest` call per buffer observes this status.
    Complete,
    /// The index was already claimed, or the message was already complete.
    /// The buffer is unchanged.
    Duplicate,
}

/// Errors produced by a [`ReassemblyBuffer`](super::ReassemblyBuffer).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The payload was requested before every fragment arrived.
    #[error("message not ready: {received} of {expected} fragments received")]
    NotReady {
        /// Fragments ingested so far.
        received: u32,
        /// Fragments required for completion.
        expected: u32,
    },
    /// The fragment index lies outside `[0, count)`.
    #[error("fragment index {index} out of range for {count} fragments")]
    IndexOutOfRange {
        /// Index carried by the fragment.
        index: FragmentIndex,
        /// Fragment count the buffer was sized for.
        count: u32,
    },
    /// The fragment carries a byte count that does not fit its slot.
    #[error("fragment {index} carries {found} bytes, expected {expected}")]
    SizeMismatch {
        /// Index carried by the fragment.
        index: FragmentIndex,
        /// Bytes the slot at `index` must receive.
        expected: usize,
        /// Bytes the fragment actually carried.
        found: usize,
    },
    /// The fragment declares a different message shape than the buffer.
    #[error("fragment shape {found} does not match message shape {expected}")]
    ShapeMismatch {
        /// Shape the buffer was created with.
        expected: MessageShape,
        /// Shape declared by the offending fragment.
        found: MessageShape,
    },
    /// The first fragment declares a shape no message can have.
    #[error("invalid message shape {shape}")]
    InvalidShape {
        /// Shape declared by the first fragment.
        shape: MessageShape,
    },
    /// An unfragmented message was routed to a multi-fragment buffer.
    #[error("alone fragment routed to a multi-fragment message")]
    UnexpectedAlone,
}

/// Errors produced while splitting outbound payloads into fragments.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The payload length does not fit the `u32` length field.
    #[error("payload of {len} bytes exceeds the u32 length field")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        len: usize,
    },
}

/// Errors produced by the [`ReassemblyRegistry`](super::ReassemblyRegistry).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The buffer rejected the fragment; the message was discarded.
    #[error("message {message_id}: {source}")]
    Reassembly {
        /// Message whose buffer was discarded.
        message_id: MessageId,
        /// Underlying buffer error.
        source: ReassemblyError,
    },
    /// The declared message length exceeds the configured cap.
    #[error("message {message_id} declares {declared} bytes > {limit} bytes")]
    MessageTooLarge {
        /// Offending message.
        message_id: MessageId,
        /// Length declared by the fragment.
        declared: usize,
        /// Configured cap.
        limit: NonZeroUsize,
    },
    /// The declared fragment count exceeds the configured cap.
    #[error("message {message_id} declares {declared} fragments > {limit}")]
    TooManyFragments {
        /// Offending message.
        message_id: MessageId,
        /// Count declared by the fragment.
        declared: u32,
        /// Configured cap.
        limit: NonZeroU32,
    },
}
