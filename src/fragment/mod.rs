//! Fragment reassembly for messages split across datagrams.
//!
//! This module collects the domain types used by the reassembly layer. The
//! core is [`ReassemblyBuffer`], which stitches the fragments of one message
//! back together under concurrent delivery. Around it sit the [`Fragment`]
//! descriptor, the datagram codec that produces descriptors, the
//! [`Fragmenter`] that splits outbound payloads, and the
//! [`ReassemblyRegistry`] that owns buffers per [`MessageId`].
//!
//! Slot bookkeeping inside a buffer is not part of the public API:
//!
//! ```compile_fail
//! use wireframe_reassembly::fragment::mask::ReceivedMask;
//! ```

pub mod buffer;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod fragmenter;
pub mod header;
pub mod id;
pub(crate) mod mask;
pub mod payload;
pub mod registry;
pub mod shape;

pub use buffer::ReassemblyBuffer;
pub use config::ReassemblyConfig;
pub use descriptor::Fragment;
pub use error::{FragmentStatus, FragmentationError, ReassemblyError, RegistryError};
pub use fragmenter::{FragmentBatch, Fragmenter};
pub use header::FragmentHeader;
pub use id::{FragmentIndex, MessageId};
pub use payload::{FRAGMENT_MAGIC, decode_fragment, encode_fragment, fragment_overhead};
pub use registry::{CompletedMessage, ReassemblyRegistry};
pub use shape::MessageShape;
