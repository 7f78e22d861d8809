#![doc(html_root_url = "https://docs.rs/wireframe_reassembly/latest")]
//! Public API for the `wireframe_reassembly` library.
//!
//! This crate reassembles logical messages that were split across several
//! datagrams. Fragments may arrive out of order, more than once, or from
//! several I/O workers at the same time; a [`ReassemblyBuffer`] accepts them
//! all and reports completion exactly once.

pub mod fragment;
pub mod metrics;

pub use fragment::{
    CompletedMessage,
    FRAGMENT_MAGIC,
    Fragment,
    FragmentBatch,
    FragmentHeader,
    FragmentIndex,
    FragmentStatus,
    FragmentationError,
    Fragmenter,
    MessageId,
    MessageShape,
    ReassemblyBuffer,
    ReassemblyConfig,
    ReassemblyError,
    ReassemblyRegistry,
    RegistryError,
    decode_fragment,
    encode_fragment,
    fragment_overhead,
};
