/// Errors that can occur while framing payloads onto a pipe.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload cannot be announced by the prefix or exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    /// The frame declares (or the caller supplied) a zero-length payload.
    #[error("invalid frame length: zero-length payloads are not allowed")]
    InvalidLength,

    /// The prefix is not twelve ASCII digits and the prefix policy rejects it.
    #[error("malformed length prefix {prefix:?}")]
    MalformedPrefix { prefix: [u8; crate::codec::PREFIX_LEN] },

    /// Fewer bytes than required arrived before EOF or an error.
    #[error("transport read failed after {received} of {expected} bytes: {source}")]
    TransportRead {
        expected: usize,
        received: usize,
        source: std::io::Error,
    },

    /// The frame could not be handed to the transport completely.
    #[error("transport write failed after {written} of {expected} bytes: {source}")]
    TransportWrite {
        expected: usize,
        written: usize,
        source: std::io::Error,
    },

    /// The receive buffer for a declared payload could not be allocated.
    #[error("cannot allocate {size} bytes for payload")]
    Allocation { size: u64 },

    /// The channel was closed.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
