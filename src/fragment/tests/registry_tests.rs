//! Tests for message routing, limits, and eviction in the registry.

use std::{
    num::{NonZeroU32, NonZeroUsize},
    sync::{
        Arc,
        Barrier,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use bytes::Bytes;
use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

use crate::fragment::{
    Fragment,
    FragmentIndex,
    Fragmenter,
    MessageId,
    ReassemblyConfig,
    ReassemblyError,
    ReassemblyRegistry,
    RegistryError,
};

fn part(index: u32, bytes: &'static [u8]) -> Fragment {
    Fragment::part(10, 3, FragmentIndex::new(index), 4, Bytes::from_static(bytes))
}

#[fixture]
fn registry() -> ReassemblyRegistry {
    ReassemblyRegistry::new(
        ReassemblyConfig::default()
            .with_max_message_size(NonZeroUsize::new(64).expect("non-zero"))
            .with_max_fragment_count(NonZeroU32::new(8).expect("non-zero"))
            .with_reassembly_timeout(Duration::from_secs(2)),
    )
}

#[rstest]
fn completes_message_exactly_once(registry: ReassemblyRegistry) {
    let id = MessageId::new(1);
    assert!(registry.accept(id, &part(2, b"IJ")).expect("accepted").is_none());
    assert_eq!(registry.in_flight(), 1);
    assert!(registry.accept(id, &part(0, b"ABCD")).expect("accepted").is_none());
    assert!(registry.accept(id, &part(0, b"ABCD")).expect("duplicate").is_none());

    let done = registry
        .accept(id, &part(1, b"EFGH"))
        .expect("accepted")
        .expect("message complete");
    assert_eq!(done.message_id(), id);
    assert_eq!(done.payload().as_ref(), b"ABCDEFGHIJ");
    assert_eq!(registry.in_flight(), 0);
}

#[rstest]
fn late_duplicates_do_not_restart_completed_message(registry: ReassemblyRegistry) {
    let id = MessageId::new(11);
    let now = Instant::now();
    let fragments = [part(0, b"ABCD"), part(1, b"EFGH"), part(2, b"IJ")];
    let mut completions = 0;
    for fragment in fragments.iter().chain(fragments.iter()) {
        let done = registry.accept_at(id, fragment, now).expect("accepted");
        completions += usize::from(done.is_some());
    }
    assert_eq!(completions, 1);
    assert_eq!(registry.in_flight(), 0);

    registry.purge_expired_at(now + Duration::from_secs(3));
    let restarted = registry
        .accept_at(id, &fragments[0], now + Duration::from_secs(3))
        .expect("accepted");
    assert!(restarted.is_none());
    assert_eq!(registry.in_flight(), 1, "id is reusable once the record expires");
}

#[test]
fn racing_first_fragments_share_one_buffer() {
    let registry = ReassemblyRegistry::default();
    let id = MessageId::new(12);
    let parts: [&'static [u8]; 4] = [b"AB", b"CD", b"EF", b"G"];
    let start = Barrier::new(parts.len());

    let completed: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = parts
            .into_iter()
            .zip(0u32..)
            .map(|(bytes, index)| {
                let (registry, start) = (&registry, &start);
                scope.spawn(move || {
                    let bytes = Bytes::from_static(bytes);
                    let fragment = Fragment::part(7, 4, FragmentIndex::new(index), 2, bytes);
                    start.wait();
                    registry.accept(id, &fragment).expect("accepted")
                })
            })
            .collect();
        workers
            .into_iter()
            .filter_map(|worker| worker.join().expect("worker thread panicked"))
            .collect()
    });

    assert_eq!(completed.len(), 1, "exactly one worker sees completion");
    assert_eq!(completed[0].payload().as_ref(), b"ABCDEFG");
    assert_eq!(registry.in_flight(), 0);
}

#[test]
fn large_first_fragment_does_not_block_other_messages() {
    const TOTAL: u32 = 128 * 1024 * 1024;
    let registry = ReassemblyRegistry::new(
        ReassemblyConfig::default()
            .with_max_message_size(NonZeroUsize::new(TOTAL as usize).expect("non-zero")),
    );
    let large = Fragment::part(
        TOTAL,
        2,
        FragmentIndex::zero(),
        TOTAL / 2,
        Bytes::from(vec![0; (TOTAL / 2) as usize]),
    );
    let large_done = AtomicBool::new(false);

    thread::scope(|scope| {
        let builder = scope.spawn(|| {
            registry.accept(MessageId::new(13), &large).expect("accepted");
            large_done.store(true, Ordering::Release);
        });

        thread::sleep(Duration::from_millis(2));
        registry.accept(MessageId::new(14), &part(0, b"ABCD")).expect("accepted");
        assert!(registry.in_flight() >= 1);
        assert!(
            !large_done.load(Ordering::Acquire),
            "map access waited for the large buffer to be built"
        );

        builder.join().expect("builder thread panicked");
    });
    assert_eq!(registry.in_flight(), 2);
}

#[rstest]
fn alone_fragment_bypasses_buffering(registry: ReassemblyRegistry) {
    let done = registry
        .accept(MessageId::new(2), &Fragment::alone(Bytes::from_static(b"HELLO")))
        .expect("accepted")
        .expect("alone message completes immediately");
    assert_eq!(done.into_payload().as_ref(), b"HELLO");
    assert_eq!(registry.in_flight(), 0);
}

#[rstest]
fn keeps_messages_separate(registry: ReassemblyRegistry) {
    let fragmenter = Fragmenter::new(NonZeroU32::new(3).expect("non-zero"));
    let left = fragmenter.fragment_bytes(b"left-hand".to_vec()).expect("fragment");
    let right = fragmenter.fragment_bytes(b"right-hand".to_vec()).expect("fragment");

    let mut completed = Vec::new();
    for (l, r) in left.fragments().iter().zip(right.fragments()) {
        completed.extend(registry.accept(left.message_id(), l).expect("left accepted"));
        completed.extend(registry.accept(right.message_id(), r).expect("right accepted"));
    }
    for r in right.fragments().iter().skip(left.len()) {
        completed.extend(registry.accept(right.message_id(), r).expect("right accepted"));
    }

    let payloads: Vec<&[u8]> = completed.iter().map(|m| m.payload().as_ref()).collect();
    assert_eq!(payloads, vec![b"left-hand".as_slice(), b"right-hand".as_slice()]);
    assert_eq!(registry.in_flight(), 0);
}

#[rstest]
fn malformed_fragment_discards_only_its_message(registry: ReassemblyRegistry) {
    let bad = MessageId::new(3);
    let good = MessageId::new(4);
    registry.accept(bad, &part(0, b"ABCD")).expect("accepted");
    registry.accept(good, &part(0, b"ABCD")).expect("accepted");

    let err = registry
        .accept(bad, &part(7, b"??"))
        .expect_err("index out of range");
    assert_eq!(
        err,
        RegistryError::Reassembly {
            message_id: bad,
            source: ReassemblyError::IndexOutOfRange {
                index: FragmentIndex::new(7),
                count: 3,
            },
        }
    );
    assert_eq!(registry.in_flight(), 1);

    registry.accept(good, &part(1, b"EFGH")).expect("accepted");
    let done = registry
        .accept(good, &part(2, b"IJ"))
        .expect("accepted")
        .expect("good message completes");
    assert_eq!(done.payload().as_ref(), b"ABCDEFGHIJ");
}

#[rstest]
fn rejects_oversized_message_before_allocating(registry: ReassemblyRegistry) {
    let huge = Fragment::part(1 << 20, 2, FragmentIndex::zero(), 1 << 19, Bytes::new());
    let err = registry
        .accept(MessageId::new(5), &huge)
        .expect_err("message too large");
    assert!(matches!(err, RegistryError::MessageTooLarge { declared, .. } if declared == 1 << 20));
    assert_eq!(registry.in_flight(), 0);
}

#[rstest]
fn rejects_excessive_fragment_count(registry: ReassemblyRegistry) {
    let many = Fragment::part(16, 16, FragmentIndex::zero(), 1, Bytes::from_static(b"A"));
    let err = registry
        .accept(MessageId::new(6), &many)
        .expect_err("too many fragments");
    assert!(matches!(err, RegistryError::TooManyFragments { declared: 16, .. }));
}

#[rstest]
fn purges_expired_messages(registry: ReassemblyRegistry) {
    let now = Instant::now();
    registry
        .accept_at(MessageId::new(7), &part(0, b"ABCD"), now)
        .expect("accepted");
    registry
        .accept_at(MessageId::new(8), &part(0, b"ABCD"), now + Duration::from_secs(2))
        .expect("accepted");

    assert!(registry.purge_expired_at(now + Duration::from_secs(1)).is_empty());
    let evicted = registry.purge_expired_at(now + Duration::from_secs(3));
    assert_eq!(evicted, vec![MessageId::new(7)]);
    assert_eq!(registry.in_flight(), 1);
}

#[rstest]
fn discard_drops_in_flight_buffer(registry: ReassemblyRegistry) {
    registry.accept(MessageId::new(9), &part(0, b"ABCD")).expect("accepted");
    assert!(registry.discard(MessageId::new(9)));
    assert!(!registry.discard(MessageId::new(9)));
    assert_eq!(registry.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn eviction_task_sweeps_until_cancelled() {
    let registry = Arc::new(ReassemblyRegistry::new(
        ReassemblyConfig::default().with_reassembly_timeout(Duration::from_millis(100)),
    ));
    registry
        .accept_at(
            MessageId::new(10),
            &part(0, b"ABCD"),
            tokio::time::Instant::now().into_std(),
        )
        .expect("accepted");

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(
        Arc::clone(&registry).run_eviction(Duration::from_millis(50), shutdown.clone()),
    );

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(registry.in_flight(), 0);

    shutdown.cancel();
    sweeper.await.expect("sweeper task panicked");
}
