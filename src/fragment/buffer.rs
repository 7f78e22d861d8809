//! Fixed-capacity destination that stitches one message back together.
//!
//! A [`ReassemblyBuffer`] is created from the first fragment of a message and
//! fed the rest through [`ReassemblyBuffer::ingest`], which takes `&self` so
//! several I/O workers can deliver fragments of the same message at once.
//!
//! Each fragment's bytes land at `index * fragment_size` in a destination
//! allocated once at creation. Copies for distinct indices touch disjoint
//! ranges and run without a lock; only the claim and the mark-received
//! steps go through the tracker mutex. The thread that marks the final
//! index snapshots the destination into an immutable [`Bytes`] and then
//! publishes the completion flag, so a reader that observes the flag also
//! observes every byte.

#[cfg(not(loom))]
use std::sync::{
    Mutex,
    MutexGuard,
    atomic::{AtomicBool, AtomicU8, Ordering},
};
use std::{fmt, sync::PoisonError};

use bytes::Bytes;
#[cfg(loom)]
use loom::sync::{
    Mutex,
    MutexGuard,
    atomic::{AtomicBool, AtomicU8, Ordering},
};
use tracing::{debug, trace};

use super::{
    Fragment,
    FragmentStatus,
    MessageShape,
    ReassemblyError,
    mask::{Claim, ReceivedMask},
};

/// Reassembly state for one logical message.
///
/// # Memory
///
/// A fragmented message holds one byte cell per byte of `total_length` from
/// creation. Completion copies those cells into a separate [`Bytes`], so a
/// message peaks at roughly twice its declared length until the buffer is
/// dropped. With the registry's default 16 MiB message cap that is about
/// 32 MiB per message. The payload handle owns its storage and outlives
/// the buffer.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use wireframe_reassembly::fragment::{
///     Fragment,
///     FragmentIndex,
///     FragmentStatus,
///     ReassemblyBuffer,
/// };
///
/// let part = |index, bytes: &'static [u8]| {
///     Fragment::part(10, 3, FragmentIndex::new(index), 4, Bytes::from_static(bytes))
/// };
///
/// let buffer = ReassemblyBuffer::from_fragment(&part(2, b"IJ")).expect("valid first fragment");
/// assert_eq!(buffer.length(), 10);
/// assert!(buffer.payload().is_err());
///
/// assert_eq!(buffer.ingest(&part(0, b"ABCD")), Ok(FragmentStatus::Incomplete));
/// assert_eq!(buffer.ingest(&part(1, b"EFGH")), Ok(FragmentStatus::Complete));
/// assert_eq!(buffer.payload().expect("complete").as_ref(), b"ABCDEFGHIJ");
/// ```
pub struct ReassemblyBuffer {
    state: State,
}

enum State {
    /// Unfragmented message; aliases the fragment's own bytes.
    Alone(Bytes),
    Assembling(Assembly),
}

struct Assembly {
    shape: MessageShape,
    destination: Box<[AtomicU8]>,
    tracker: Mutex<Tracker>,
    complete: AtomicBool,
}

struct Tracker {
    mask: ReceivedMask,
    assembled: Option<Bytes>,
}

impl ReassemblyBuffer {
    /// Start reassembling the message `fragment` belongs to.
    ///
    /// An alone fragment yields a buffer that is already complete and whose
    /// payload shares the fragment's storage without copying. `Bytes`
    /// reference counting keeps that storage alive for as long as the
    /// buffer or any payload handle exists. Any other fragment fixes the
    /// message shape, sizes the destination and mask, and is ingested
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::InvalidShape`] when the declared shape
    /// cannot describe a message, or any error [`ingest`](Self::ingest)
    /// reports for the first fragment.
    pub fn from_fragment(fragment: &Fragment) -> Result<Self, ReassemblyError> {
        if fragment.is_alone() {
            return Ok(Self {
                state: State::Alone(fragment.payload().clone()),
            });
        }

        let shape = MessageShape::of(fragment).validate()?;
        let assembly = Assembly::new(shape);
        assembly.ingest(fragment)?;
        Ok(Self {
            state: State::Assembling(assembly),
        })
    }

    /// Copy `fragment` into place and record its index.
    ///
    /// Returns [`FragmentStatus::Complete`] to exactly one caller: the one
    /// whose fragment filled the last missing index. Repeated indices and
    /// fragments arriving after completion return
    /// [`FragmentStatus::Duplicate`] without touching the destination.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::UnexpectedAlone`] for an alone fragment,
    /// [`ReassemblyError::ShapeMismatch`] when the fragment declares another
    /// shape, [`ReassemblyError::IndexOutOfRange`] for an index past the
    /// fragment count, and [`ReassemblyError::SizeMismatch`] when the
    /// fragment's length does not fill its slot exactly.
    pub fn ingest(&self, fragment: &Fragment) -> Result<FragmentStatus, ReassemblyError> {
        match &self.state {
            State::Alone(_) => Ok(FragmentStatus::Duplicate),
            State::Assembling(assembly) => assembly.ingest(fragment),
        }
    }

    /// Whether every fragment has been ingested.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match &self.state {
            State::Alone(_) => true,
            State::Assembling(assembly) => assembly.complete.load(Ordering::Acquire),
        }
    }

    /// Return the reassembled payload.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::NotReady`] until the message is complete.
    pub fn payload(&self) -> Result<Bytes, ReassemblyError> {
        match &self.state {
            State::Alone(bytes) => Ok(bytes.clone()),
            State::Assembling(assembly) => {
                let tracker = assembly.lock();
                tracker
                    .assembled
                    .clone()
                    .ok_or(ReassemblyError::NotReady {
                        received: tracker.mask.received(),
                        expected: tracker.mask.fragment_count(),
                    })
            }
        }
    }

    /// Fixed destination capacity in bytes, available at any time.
    #[must_use]
    pub fn length(&self) -> usize {
        match &self.state {
            State::Alone(bytes) => bytes.len(),
            State::Assembling(assembly) => assembly.destination.len(),
        }
    }

    /// Number of fragments the message is made of.
    #[must_use]
    pub fn fragment_count(&self) -> u32 {
        match &self.state {
            State::Alone(_) => 1,
            State::Assembling(assembly) => assembly.shape.fragment_count,
        }
    }

    /// Number of distinct fragments ingested so far.
    #[must_use]
    pub fn received_count(&self) -> u32 {
        match &self.state {
            State::Alone(_) => 1,
            State::Assembling(assembly) => assembly.lock().mask.received(),
        }
    }
}

impl fmt::Debug for ReassemblyBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReassemblyBuffer")
            .field("length", &self.length())
            .field("fragment_count", &self.fragment_count())
            .field("received", &self.received_count())
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl Assembly {
    fn new(shape: MessageShape) -> Self {
        let destination = (0..shape.capacity()).map(|_| AtomicU8::new(0)).collect();
        Self {
            shape,
            destination,
            tracker: Mutex::new(Tracker {
                mask: ReceivedMask::new(shape.fragment_count),
                assembled: None,
            }),
            complete: AtomicBool::new(false),
        }
    }

    // The mask is consistent at every unlock, so a panic elsewhere while the
    // lock was held leaves nothing to repair.
    fn lock(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ingest(&self, fragment: &Fragment) -> Result<FragmentStatus, ReassemblyError> {
        if fragment.is_alone() {
            return Err(ReassemblyError::UnexpectedAlone);
        }
        let found = MessageShape::of(fragment);
        if found != self.shape {
            return Err(ReassemblyError::ShapeMismatch {
                expected: self.shape,
                found,
            });
        }

        let index = fragment.fragment_index();
        let span = self.shape.span(index)?;
        let bytes = fragment.payload();
        let size_mismatch = ReassemblyError::SizeMismatch {
            index,
            expected: span.len(),
            found: bytes.len(),
        };
        if bytes.len() != span.len() {
            return Err(size_mismatch);
        }
        let cells = self.destination.get(span).ok_or(size_mismatch)?;

        if self.complete.load(Ordering::Acquire) {
            trace!(index = index.get(), "fragment after completion ignored");
            return Ok(FragmentStatus::Duplicate);
        }
        if self.lock().mask.claim(index) == Claim::Taken {
            trace!(index = index.get(), "duplicate fragment ignored");
            return Ok(FragmentStatus::Duplicate);
        }

        // The claim makes this caller the only writer of `cells`.
        for (cell, byte) in cells.iter().zip(bytes.iter()) {
            cell.store(*byte, Ordering::Relaxed);
        }

        let mut tracker = self.lock();
        if !tracker.mask.mark_received(index) {
            trace!(
                index = index.get(),
                received = tracker.mask.received(),
                count = self.shape.fragment_count,
                "fragment ingested"
            );
            return Ok(FragmentStatus::Incomplete);
        }

        // Every writer marked its slot under this lock after its stores, so
        // all of them are visible here.
        let assembled: Vec<u8> = self
            .destination
            .iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect();
        tracker.assembled = Some(Bytes::from(assembled));
        self.complete.store(true, Ordering::Release);
        debug!(
            length = self.destination.len(),
            fragments = self.shape.fragment_count,
            "message reassembled"
        );
        Ok(FragmentStatus::Complete)
    }
}
