//! Concurrent map from message id to in-flight [`ReassemblyBuffer`].
//!
//! [`ReassemblyRegistry`] is the owner side of the reassembly contract: it
//! creates a buffer on the first fragment of a message, routes later
//! fragments to the same buffer, hands the payload out exactly once on
//! completion, and evicts buffers that never complete. Several I/O workers
//! may call [`ReassemblyRegistry::accept`] at once; the map lock is held
//! only for lookup and insertion, never while fragment bytes are copied.
//!
//! Completed ids are remembered for one reassembly timeout so that late
//! duplicates cannot start, and complete, a second reassembly of the same
//! message. Alone messages keep no state and are delivered on every arrival.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use dashmap::{DashMap, mapref::entry::Entry};
use log::{debug, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{
    Fragment,
    FragmentStatus,
    MessageId,
    ReassemblyBuffer,
    ReassemblyConfig,
    RegistryError,
};
use crate::metrics::{self, Outcome};

#[derive(Debug)]
struct InFlight {
    buffer: Arc<ReassemblyBuffer>,
    started_at: Instant,
}

/// A fully reassembled message handed out by the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedMessage {
    message_id: MessageId,
    payload: Bytes,
}

impl CompletedMessage {
    /// Construct a new [`CompletedMessage`].
    #[must_use]
    pub fn new(message_id: MessageId, payload: Bytes) -> Self {
        Self {
            message_id,
            payload,
        }
    }

    /// Identifier shared by the fragments that formed this message.
    #[must_use]
    pub const fn message_id(&self) -> MessageId { self.message_id }

    /// Borrow the reassembled payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Consume the message, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes { self.payload }
}

enum Lookup {
    Existing(Arc<ReassemblyBuffer>),
    Started(Option<Bytes>),
    AlreadyCompleted,
}

/// Registry of in-progress reassemblies keyed by [`MessageId`].
#[derive(Debug)]
pub struct ReassemblyRegistry {
    config: ReassemblyConfig,
    buffers: DashMap<MessageId, InFlight>,
    completed: DashMap<MessageId, Instant>,
}

impl Default for ReassemblyRegistry {
    fn default() -> Self { Self::new(ReassemblyConfig::default()) }
}

impl ReassemblyRegistry {
    /// Create an empty registry enforcing `config`.
    #[must_use]
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            config,
            buffers: DashMap::new(),
            completed: DashMap::new(),
        }
    }

    /// Limits this registry enforces.
    #[must_use]
    pub const fn config(&self) -> &ReassemblyConfig { &self.config }

    /// Route `fragment` to the buffer for `message_id` using the current time.
    ///
    /// Returns `Ok(Some(_))` to the single call that completes the message,
    /// `Ok(None)` while fragments are missing or when the fragment was a
    /// duplicate, including duplicates of a message completed within the
    /// last reassembly timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the declared message exceeds the
    /// configured limits or the buffer rejects the fragment. A rejected
    /// fragment discards that message's buffer; other messages are
    /// unaffected.
    pub fn accept(
        &self,
        message_id: MessageId,
        fragment: &Fragment,
    ) -> Result<Option<CompletedMessage>, RegistryError> {
        self.accept_at(message_id, fragment, Instant::now())
    }

    /// Route `fragment` using an explicit clock reading for new buffers.
    ///
    /// # Errors
    ///
    /// See [`accept`](Self::accept).
    pub fn accept_at(
        &self,
        message_id: MessageId,
        fragment: &Fragment,
        now: Instant,
    ) -> Result<Option<CompletedMessage>, RegistryError> {
        if fragment.is_alone() {
            metrics::inc_fragments(Outcome::Accepted);
            metrics::inc_completed();
            return Ok(Some(CompletedMessage::new(
                message_id,
                fragment.payload().clone(),
            )));
        }

        let buffer = match self.lookup_or_start(message_id, fragment, now) {
            Ok(Lookup::Existing(buffer)) => buffer,
            Ok(Lookup::AlreadyCompleted) => {
                metrics::inc_fragments(Outcome::Duplicate);
                return Ok(None);
            }
            Ok(Lookup::Started(completed)) => {
                metrics::inc_fragments(Outcome::Accepted);
                metrics::set_in_flight(self.buffers.len());
                return Ok(completed.map(|payload| {
                    metrics::inc_completed();
                    CompletedMessage::new(message_id, payload)
                }));
            }
            Err(err) => {
                warn!("rejected first fragment of message {message_id}: {err}");
                metrics::inc_fragments(Outcome::Rejected);
                metrics::inc_errors();
                return Err(err);
            }
        };

        match buffer.ingest(fragment) {
            Ok(FragmentStatus::Incomplete) => {
                metrics::inc_fragments(Outcome::Accepted);
                Ok(None)
            }
            Ok(FragmentStatus::Duplicate) => {
                metrics::inc_fragments(Outcome::Duplicate);
                Ok(None)
            }
            Ok(FragmentStatus::Complete) => {
                self.completed.insert(message_id, now);
                self.release(message_id, &buffer);
                metrics::inc_fragments(Outcome::Accepted);
                let payload = buffer
                    .payload()
                    .map_err(|source| RegistryError::Reassembly { message_id, source })?;
                metrics::inc_completed();
                debug!("message {message_id} complete ({} bytes)", payload.len());
                Ok(Some(CompletedMessage::new(message_id, payload)))
            }
            Err(source) => {
                self.release(message_id, &buffer);
                warn!("discarding message {message_id}: {source}");
                metrics::inc_fragments(Outcome::Rejected);
                metrics::inc_errors();
                Err(RegistryError::Reassembly { message_id, source })
            }
        }
    }

    /// Drop the buffer for `message_id`, returning whether one existed.
    pub fn discard(&self, message_id: MessageId) -> bool {
        let removed = self.buffers.remove(&message_id).is_some();
        metrics::set_in_flight(self.buffers.len());
        removed
    }

    /// Remove incomplete buffers older than the configured timeout, and
    /// forget completed ids recorded longer ago than the timeout.
    ///
    /// Returns the identifiers of messages that were evicted.
    pub fn purge_expired(&self) -> Vec<MessageId> { self.purge_expired_at(Instant::now()) }

    /// Remove incomplete buffers older than the configured timeout using an
    /// explicit clock reading.
    ///
    /// Returns the identifiers of messages that were evicted.
    pub fn purge_expired_at(&self, now: Instant) -> Vec<MessageId> {
        let mut evicted = Vec::new();
        let timeout = self.config.reassembly_timeout;

        self.buffers.retain(|message_id, in_flight| {
            let expired = now.saturating_duration_since(in_flight.started_at) >= timeout;
            if expired {
                debug!(
                    "evicting message {message_id}: {} of {} fragments after {timeout:?}",
                    in_flight.buffer.received_count(),
                    in_flight.buffer.fragment_count(),
                );
                evicted.push(*message_id);
            }
            !expired
        });

        self.completed
            .retain(|_, completed_at| now.saturating_duration_since(*completed_at) < timeout);

        if !evicted.is_empty() {
            metrics::inc_evicted(evicted.len());
            metrics::set_in_flight(self.buffers.len());
        }
        evicted
    }

    /// Sweep expired buffers every `period` until `shutdown` is cancelled.
    pub async fn run_eviction(self: Arc<Self>, period: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.purge_expired_at(tokio::time::Instant::now().into_std());
                }
            }
        }
        debug!("eviction sweep stopped");
    }

    /// Number of buffers awaiting more fragments.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.buffers.len() }

    // The buffer for a new message is built before the map entry is taken,
    // so allocating the destination and copying the first fragment never
    // holds a shard lock.
    fn lookup_or_start(
        &self,
        message_id: MessageId,
        fragment: &Fragment,
        now: Instant,
    ) -> Result<Lookup, RegistryError> {
        if let Some(in_flight) = self.buffers.get(&message_id) {
            return Ok(Lookup::Existing(Arc::clone(&in_flight.buffer)));
        }
        if self.completed.contains_key(&message_id) {
            return Ok(Lookup::AlreadyCompleted);
        }

        self.check_limits(message_id, fragment)?;
        let buffer = ReassemblyBuffer::from_fragment(fragment)
            .map_err(|source| RegistryError::Reassembly { message_id, source })?;

        match self.buffers.entry(message_id) {
            // Another worker started the message first; the fragment is
            // ingested into its buffer instead.
            Entry::Occupied(occupied) => Ok(Lookup::Existing(Arc::clone(&occupied.get().buffer))),
            // Completion records the id before releasing the buffer, so a
            // vacant slot for a completed message always finds the record.
            Entry::Vacant(_) if self.completed.contains_key(&message_id) => {
                Ok(Lookup::AlreadyCompleted)
            }
            Entry::Vacant(_) if buffer.is_complete() => {
                let payload = buffer
                    .payload()
                    .map_err(|source| RegistryError::Reassembly { message_id, source })?;
                self.completed.insert(message_id, now);
                Ok(Lookup::Started(Some(payload)))
            }
            Entry::Vacant(vacant) => {
                debug!(
                    "started message {message_id}: {} bytes in {} fragments",
                    buffer.length(),
                    buffer.fragment_count(),
                );
                vacant.insert(InFlight {
                    buffer: Arc::new(buffer),
                    started_at: now,
                });
                Ok(Lookup::Started(None))
            }
        }
    }

    fn check_limits(
        &self,
        message_id: MessageId,
        fragment: &Fragment,
    ) -> Result<(), RegistryError> {
        let declared = fragment.total_length() as usize;
        let limit = self.config.max_message_size;
        if declared > limit.get() {
            return Err(RegistryError::MessageTooLarge {
                message_id,
                declared,
                limit,
            });
        }
        let declared = fragment.fragment_count();
        let limit = self.config.max_fragment_count;
        if declared > limit.get() {
            return Err(RegistryError::TooManyFragments {
                message_id,
                declared,
                limit,
            });
        }
        Ok(())
    }

    // Only remove the entry if it still holds `buffer`; a late fragment may
    // already have started a fresh reassembly under the same id.
    fn release(&self, message_id: MessageId, buffer: &Arc<ReassemblyBuffer>) {
        self.buffers
            .remove_if(&message_id, |_, in_flight| Arc::ptr_eq(&in_flight.buffer, buffer));
        metrics::set_in_flight(self.buffers.len());
    }
}
