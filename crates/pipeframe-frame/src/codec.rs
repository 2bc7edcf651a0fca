use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::{FrameError, Result};

/// Length prefix: twelve zero-padded ASCII decimal digits.
pub const PREFIX_LEN: usize = 12;

/// Largest payload a twelve-digit prefix can announce.
pub const MAX_FRAMED_PAYLOAD: u64 = 999_999_999_999;

/// What to do when a prefix is not twelve ASCII digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefixPolicy {
    /// Discard the twelve bytes and read a fresh prefix.
    #[default]
    Resync,
    /// Fail with [`FrameError::MalformedPrefix`].
    Reject,
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes, on send and on receive.
    /// Default: [`MAX_FRAMED_PAYLOAD`].
    pub max_payload_size: u64,
    /// Handling of malformed prefixes. Default: [`PrefixPolicy::Resync`].
    pub prefix_policy: PrefixPolicy,
    /// Upper bound on consecutive resyncs within one receive. Default: unbounded.
    pub max_resync_attempts: Option<usize>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_FRAMED_PAYLOAD,
            prefix_policy: PrefixPolicy::default(),
            max_resync_attempts: None,
        }
    }
}

/// Render a payload length as the wire prefix.
pub fn encode_prefix(len: u64) -> Result<[u8; PREFIX_LEN]> {
    if len > MAX_FRAMED_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: MAX_FRAMED_PAYLOAD,
        });
    }

    let mut prefix = [b'0'; PREFIX_LEN];
    let mut rest = len;
    for digit in prefix.iter_mut().rev() {
        *digit = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    Ok(prefix)
}

/// Parse a wire prefix. `None` unless it is exactly twelve ASCII digits.
pub fn parse_prefix(prefix: &[u8]) -> Option<u64> {
    if prefix.len() != PREFIX_LEN || !prefix.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        prefix
            .iter()
            .fold(0u64, |acc, digit| acc * 10 + u64::from(digit - b'0')),
    )
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────────────────────┬──────────────────┐
/// │ Length (12B ASCII decimal)  │ Payload          │
/// │ "000000001000"              │ (Length bytes)   │
/// └─────────────────────────────┴──────────────────┘
/// ```
///
/// Nothing is appended to `dst` on failure.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.is_empty() {
        return Err(FrameError::InvalidLength);
    }
    let prefix = encode_prefix(payload.len() as u64)?;
    dst.reserve(PREFIX_LEN + payload.len());
    dst.put_slice(&prefix);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one payload from a buffer, applying the same prefix rules as a
/// framed channel's `receive`.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. A malformed prefix
/// is consumed even when it is reported as an error.
pub fn decode_frame(src: &mut BytesMut, config: &FrameConfig) -> Result<Option<Bytes>> {
    let mut resyncs = 0usize;
    loop {
        if src.len() < PREFIX_LEN {
            return Ok(None); // Need more data
        }

        let Some(len) = parse_prefix(&src[..PREFIX_LEN]) else {
            let mut prefix = [0u8; PREFIX_LEN];
            prefix.copy_from_slice(&src[..PREFIX_LEN]);
            src.advance(PREFIX_LEN);
            resync_or_reject(config, prefix, &mut resyncs)?;
            continue;
        };

        if len == 0 {
            src.advance(PREFIX_LEN);
            return Err(FrameError::InvalidLength);
        }
        check_declared_len(len, config)?;

        let total = PREFIX_LEN as u64 + len;
        if (src.len() as u64) < total {
            return Ok(None); // Need more data
        }

        src.advance(PREFIX_LEN);
        return Ok(Some(src.split_to(len as usize).freeze()));
    }
}

pub(crate) fn check_declared_len(len: u64, config: &FrameConfig) -> Result<()> {
    if len > config.max_payload_size {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: config.max_payload_size,
        });
    }
    Ok(())
}

/// Decide whether a malformed prefix is skipped or reported.
pub(crate) fn resync_or_reject(
    config: &FrameConfig,
    prefix: [u8; PREFIX_LEN],
    attempts: &mut usize,
) -> Result<()> {
    if config.prefix_policy == PrefixPolicy::Reject {
        return Err(FrameError::MalformedPrefix { prefix });
    }
    *attempts += 1;
    if let Some(max) = config.max_resync_attempts {
        if *attempts > max {
            return Err(FrameError::MalformedPrefix { prefix });
        }
    }
    warn!(
        prefix = %String::from_utf8_lossy(&prefix),
        attempt = *attempts,
        "malformed length prefix; reading a fresh one"
    );
    Ok(())
}
