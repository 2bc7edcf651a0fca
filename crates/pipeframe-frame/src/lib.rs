//! Length-prefixed message framing over pipe byte streams.
//!
//! This is the core value-add layer of pipeframe. Every payload is framed as:
//! - A 12-byte zero-padded ASCII decimal payload length
//! - Exactly that many raw payload bytes
//!
//! No delimiters, no partial reads, no buffer management in user code.

pub mod channel;
pub mod codec;
pub mod error;

pub use channel::FramedChannel;
pub use codec::{
    decode_frame, encode_frame, encode_prefix, parse_prefix, FrameConfig, PrefixPolicy,
    MAX_FRAMED_PAYLOAD, PREFIX_LEN,
};
pub use error::{FrameError, Result};
