//! Shared helpers for integration tests.

use std::num::NonZeroU32;

use bytes::Bytes;
use wireframe_reassembly::{FragmentHeader, Fragmenter, MessageId, encode_fragment};

/// Result type used by fallible integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Split `payload` at `stride` and encode every fragment as a datagram.
pub fn datagrams(message_id: MessageId, payload: &[u8], stride: u32) -> TestResult<Vec<Bytes>> {
    let stride = NonZeroU32::new(stride).ok_or("stride must be non-zero")?;
    let batch = Fragmenter::new(stride).fragment_with_id(message_id, payload.to_vec())?;
    batch
        .fragments()
        .iter()
        .map(|fragment| {
            let header = FragmentHeader::for_fragment(message_id, fragment);
            Ok(Bytes::from(encode_fragment(header, fragment.payload())?))
        })
        .collect()
}
