#![cfg(all(feature = "advanced-tests", loom))]
//! Concurrency tests for `ReassemblyBuffer` using loom.
//!
//! Fragments are small enough that loom can explore every interleaving of
//! the claim, copy, and mark-received steps. The tests check that exactly
//! one ingest reports completion and that a reader observing completion
//! always sees the full payload.

use bytes::Bytes;
use loom::{model, sync::Arc, thread};
use wireframe_reassembly::fragment::{
    Fragment,
    FragmentIndex,
    FragmentStatus,
    ReassemblyBuffer,
};

fn part(index: u32, bytes: &'static [u8]) -> Fragment {
    Fragment::part(4, 2, FragmentIndex::new(index), 2, Bytes::from_static(bytes))
}

#[test]
fn racing_duplicates_complete_exactly_once() {
    model(|| {
        let buffer = Arc::new(
            ReassemblyBuffer::from_fragment(&part(0, b"AB")).expect("valid first fragment"),
        );

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || buffer.ingest(&part(1, b"CD")).expect("valid fragment"))
            })
            .collect();

        let statuses: Vec<FragmentStatus> = workers
            .into_iter()
            .map(|worker| worker.join().expect("worker thread panicked"))
            .collect();

        let completions = statuses
            .iter()
            .filter(|status| **status == FragmentStatus::Complete)
            .count();
        assert_eq!(completions, 1, "statuses: {statuses:?}");
        assert!(statuses.contains(&FragmentStatus::Duplicate));
        assert_eq!(buffer.payload().expect("complete").as_ref(), b"ABCD");
    });
}

#[test]
fn distinct_fragments_race_to_completion() {
    model(|| {
        let first = Fragment::part(3, 3, FragmentIndex::new(2), 1, Bytes::from_static(b"C"));
        let buffer =
            Arc::new(ReassemblyBuffer::from_fragment(&first).expect("valid first fragment"));

        let workers: Vec<_> = [(0, b"A"), (1, b"B")]
            .into_iter()
            .map(|(index, byte)| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    let byte = Bytes::from_static(byte);
                    let fragment = Fragment::part(3, 3, FragmentIndex::new(index), 1, byte);
                    buffer.ingest(&fragment).expect("valid fragment")
                })
            })
            .collect();

        let completions = workers
            .into_iter()
            .map(|worker| worker.join().expect("worker thread panicked"))
            .filter(|status| *status == FragmentStatus::Complete)
            .count();
        assert_eq!(completions, 1);
        assert_eq!(buffer.payload().expect("complete").as_ref(), b"ABC");
    });
}

#[test]
fn observed_completion_implies_full_payload() {
    model(|| {
        let buffer = Arc::new(
            ReassemblyBuffer::from_fragment(&part(0, b"AB")).expect("valid first fragment"),
        );

        let writer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.ingest(&part(1, b"CD")).expect("valid fragment"))
        };

        if buffer.is_complete() {
            assert_eq!(buffer.payload().expect("flag implies payload").as_ref(), b"ABCD");
        }

        assert_eq!(writer.join().expect("writer thread panicked"), FragmentStatus::Complete);
        assert!(buffer.is_complete());
    });
}
