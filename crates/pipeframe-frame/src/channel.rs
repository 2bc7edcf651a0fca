use std::io::{self, ErrorKind, Read, Write};

use bytes::{Bytes, BytesMut};
use pipeframe_transport::PipeHandle;
use tracing::debug;

use crate::codec::{
    check_declared_len, encode_frame, parse_prefix, resync_or_reject, FrameConfig, PREFIX_LEN,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Sends and receives length-prefixed payloads over any byte stream.
///
/// `send` needs `T: Write`, `receive` needs `T: Read`, so one-way handles
/// work for the side they support. Partial reads and writes are handled
/// internally; callers always deal in whole payloads.
///
/// There is no internal locking. Concurrent use of one channel must be
/// serialized by the caller.
pub struct FramedChannel<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    frames_sent: u64,
    frames_received: u64,
    resyncs: u64,
    closed: bool,
}

impl<T> FramedChannel<T> {
    /// Create a framed channel with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a framed channel with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            frames_sent: 0,
            frames_received: 0,
            resyncs: 0,
            closed: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the channel and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update maximum payload size for subsequent sends and receives.
    pub fn set_max_payload_size(&mut self, max_payload_size: u64) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Frames written successfully.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Frames read successfully.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Malformed prefixes skipped so far.
    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }
}

impl<T> std::fmt::Debug for FramedChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedChannel")
            .field("config", &self.config)
            .field("frames_sent", &self.frames_sent)
            .field("frames_received", &self.frames_received)
            .field("resyncs", &self.resyncs)
            .field("closed", &self.closed)
            .finish()
    }
}

impl<T: Write> FramedChannel<T> {
    /// Frame and send one payload (blocking).
    ///
    /// The prefix and payload go out as one contiguous buffer. Nothing is
    /// written if the payload is empty or too large.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(FrameError::Closed);
        }
        check_declared_len(payload.len() as u64, &self.config)?;

        self.buf.clear();
        encode_frame(payload, &mut self.buf)?;

        let expected = self.buf.len();
        let mut written = 0usize;
        while written < expected {
            match self.inner.write(&self.buf[written..]) {
                Ok(0) => {
                    return Err(FrameError::TransportWrite {
                        expected,
                        written,
                        source: io::Error::from(ErrorKind::WriteZero),
                    })
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(FrameError::TransportWrite {
                        expected,
                        written,
                        source,
                    })
                }
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(FrameError::TransportWrite {
                        expected,
                        written,
                        source,
                    })
                }
            }
        }

        self.frames_sent += 1;
        debug!(size = payload.len(), "sent frame");
        Ok(())
    }
}

impl<T: Read> FramedChannel<T> {
    /// Receive the next payload (blocking).
    ///
    /// Malformed prefixes are handled per [`FrameConfig::prefix_policy`]:
    /// by default the twelve bytes are dropped and a fresh prefix is read.
    pub fn receive(&mut self) -> Result<Bytes> {
        if self.closed {
            return Err(FrameError::Closed);
        }

        let mut attempts = 0usize;
        loop {
            let mut prefix = [0u8; PREFIX_LEN];
            read_full(&mut self.inner, &mut prefix)?;

            let Some(len) = parse_prefix(&prefix) else {
                resync_or_reject(&self.config, prefix, &mut attempts)?;
                self.resyncs += 1;
                continue;
            };

            if len == 0 {
                return Err(FrameError::InvalidLength);
            }
            check_declared_len(len, &self.config)?;

            let size = usize::try_from(len).map_err(|_| FrameError::Allocation { size: len })?;
            let mut payload = Vec::new();
            payload
                .try_reserve_exact(size)
                .map_err(|_| FrameError::Allocation { size: len })?;
            payload.resize(size, 0);
            read_full(&mut self.inner, &mut payload)?;

            self.frames_received += 1;
            debug!(size, "received frame");
            return Ok(Bytes::from(payload));
        }
    }
}

impl FramedChannel<PipeHandle> {
    /// Release the pipe. Calling this more than once is harmless.
    ///
    /// Every later `send` or `receive` fails with [`FrameError::Closed`].
    pub fn close(&mut self) {
        self.closed = true;
        self.inner.close();
    }

    /// True once [`FramedChannel::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Fill `buf` completely or report how far the read got.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let expected = buf.len();
    let mut received = 0usize;
    while received < expected {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(FrameError::TransportRead {
                    expected,
                    received,
                    source: io::Error::new(ErrorKind::UnexpectedEof, "peer closed the channel"),
                })
            }
            Ok(n) => received += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FrameError::TransportRead {
                    expected,
                    received,
                    source,
                })
            }
        }
    }
    Ok(())
}
