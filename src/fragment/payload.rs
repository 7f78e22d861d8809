//! Datagram encoding for fragments.
//!
//! A fragment datagram is a short magic marker, a length-prefixed bincode
//! [`FragmentHeader`], and the raw fragment bytes. Decoding slices the
//! fragment bytes out of the datagram without copying, so the resulting
//! [`Fragment`] shares the receive buffer's storage.

use std::num::NonZeroUsize;

use bincode::{
    config,
    decode_from_slice,
    encode_to_vec,
    error::{DecodeError, EncodeError},
};
use bytes::Bytes;

use super::{Fragment, FragmentHeader, FragmentIndex, MessageId};

/// Magic prefix that marks a fragment datagram.
pub const FRAGMENT_MAGIC: &[u8; 4] = b"FRAG";

const LEN_PREFIX: usize = std::mem::size_of::<u16>();

/// Upper bound on the bytes wrapped around a fragment body.
///
/// bincode's standard configuration uses variable-length integers, so this
/// is measured with every header field at its maximum.
///
/// # Panics
///
/// Panics if encoding a constant header fails, which would indicate a
/// programmer error in the header definition.
#[must_use]
pub fn fragment_overhead() -> NonZeroUsize {
    let header = FragmentHeader::new(
        MessageId::new(u64::MAX),
        u32::MAX,
        u32::MAX,
        FragmentIndex::new(u32::MAX),
        u32::MAX,
    );
    let header_bytes = encode_to_vec(header, config::standard()).unwrap_or_else(|err| {
        panic!("fragment header encoding must be infallible for constants: {err}")
    });
    let overhead = FRAGMENT_MAGIC.len() + LEN_PREFIX + header_bytes.len();
    NonZeroUsize::new(overhead).unwrap_or_else(|| {
        panic!("fragment overhead must be non-zero (computed {overhead})");
    })
}

/// Encode a fragment datagram.
///
/// The returned buffer layout is:
/// `[FRAGMENT_MAGIC][u16 header_len][header bytes][fragment payload]`.
///
/// # Errors
///
/// Returns an [`EncodeError`] if the header cannot be encoded.
pub fn encode_fragment(header: FragmentHeader, payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let header_bytes = encode_to_vec(header, config::standard())?;
    let header_len = u16::try_from(header_bytes.len())
        .map_err(|_| EncodeError::Other("fragment header length must fit within u16::MAX"))?;

    let mut buf = Vec::with_capacity(
        FRAGMENT_MAGIC.len() + LEN_PREFIX + header_bytes.len() + payload.len(),
    );
    buf.extend_from_slice(FRAGMENT_MAGIC);
    buf.extend_from_slice(&header_len.to_be_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decode a fragment datagram.
///
/// Returns `Ok(None)` when the datagram does not start with
/// [`FRAGMENT_MAGIC`], or the message id and a [`Fragment`] whose payload is
/// a zero-copy slice of `datagram`. A header declaring a single fragment
/// yields an alone fragment.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the marker is present but the header is
/// truncated or malformed.
pub fn decode_fragment(datagram: &Bytes) -> Result<Option<(MessageId, Fragment)>, DecodeError> {
    if datagram.get(..FRAGMENT_MAGIC.len()) != Some(FRAGMENT_MAGIC.as_slice()) {
        return Ok(None);
    }

    let header_start = FRAGMENT_MAGIC.len() + LEN_PREFIX;
    let Some(&[hi, lo]) = datagram.get(FRAGMENT_MAGIC.len()..header_start) else {
        return Err(DecodeError::UnexpectedEnd {
            additional: header_start - datagram.len(),
        });
    };
    let header_end = header_start + usize::from(u16::from_be_bytes([hi, lo]));
    let Some(header_bytes) = datagram.get(header_start..header_end) else {
        return Err(DecodeError::UnexpectedEnd {
            additional: header_end - datagram.len(),
        });
    };

    let (header, consumed) =
        decode_from_slice::<FragmentHeader, _>(header_bytes, config::standard())?;
    if consumed != header_bytes.len() {
        return Err(DecodeError::OtherString(
            "fragment header length mismatch".to_string(),
        ));
    }

    let payload = datagram.slice(header_end..);
    let fragment = if header.is_alone() {
        Fragment::alone(payload)
    } else {
        Fragment::part(
            header.total_length(),
            header.fragment_count(),
            header.fragment_index(),
            header.fragment_size(),
            payload,
        )
    };
    Ok(Some((header.message_id(), fragment)))
}
