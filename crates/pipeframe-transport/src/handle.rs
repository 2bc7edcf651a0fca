use std::io::{self, Read, Write};

use tracing::debug;

use crate::error::Result;
use crate::options::Access;

/// An owned, connected pipe endpoint. Implements `Read + Write`.
///
/// This is the fundamental I/O type returned by transport operations.
/// On Unix it wraps a FIFO file or a Unix domain socket stream.
/// On Windows it wraps a named pipe handle.
///
/// The OS endpoint is released by [`PipeHandle::close`] or on drop,
/// whichever comes first.
pub struct PipeHandle {
    inner: Option<HandleInner>,
    access: Access,
}

enum HandleInner {
    /// A FIFO on Unix, a named pipe instance on Windows.
    File(std::fs::File),
    #[cfg(unix)]
    Socket(std::os::unix::net::UnixStream),
}

impl PipeHandle {
    pub(crate) fn from_file(file: std::fs::File, access: Access) -> Self {
        Self {
            inner: Some(HandleInner::File(file)),
            access,
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_socket(stream: std::os::unix::net::UnixStream, access: Access) -> Self {
        Self {
            inner: Some(HandleInner::Socket(stream)),
            access,
        }
    }

    /// Access this handle was created or opened with.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Release the OS endpoint. Calling this more than once is harmless.
    pub fn close(&mut self) {
        if let Some(inner) = self.inner.take() {
            debug!(kind = inner.kind(), "closing pipe handle");
            #[cfg(unix)]
            if let HandleInner::Socket(stream) = &inner {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
            drop(inner);
        }
    }

    /// True once [`PipeHandle::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Transport kind for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            Some(inner) => inner.kind(),
            None => "closed",
        }
    }

    /// Set read timeout on socket-backed handles. File-backed handles
    /// always block, so this is a no-op for them.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            Some(HandleInner::Socket(stream)) => {
                stream.set_read_timeout(timeout).map_err(Into::into)
            }
            Some(HandleInner::File(_)) => {
                let _ = timeout;
                Ok(())
            }
            None => Err(closed().into()),
        }
    }

    /// Set write timeout on socket-backed handles. No-op for file-backed ones.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            Some(HandleInner::Socket(stream)) => {
                stream.set_write_timeout(timeout).map_err(Into::into)
            }
            Some(HandleInner::File(_)) => {
                let _ = timeout;
                Ok(())
            }
            None => Err(closed().into()),
        }
    }
}

impl HandleInner {
    fn kind(&self) -> &'static str {
        match self {
            #[cfg(unix)]
            HandleInner::File(_) => "fifo",
            #[cfg(windows)]
            HandleInner::File(_) => "named-pipe",
            #[cfg(unix)]
            HandleInner::Socket(_) => "unix-socket",
        }
    }
}

impl Read for PipeHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.access.can_read() {
            return Err(denied("pipe handle not opened for reading"));
        }
        match self.inner.as_mut() {
            Some(HandleInner::File(file)) => file.read(buf),
            #[cfg(unix)]
            Some(HandleInner::Socket(stream)) => stream.read(buf),
            None => Err(closed()),
        }
    }
}

impl Write for PipeHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.access.can_write() {
            return Err(denied("pipe handle not opened for writing"));
        }
        match self.inner.as_mut() {
            Some(HandleInner::File(file)) => file.write(buf),
            #[cfg(unix)]
            Some(HandleInner::Socket(stream)) => stream.write(buf),
            None => Err(closed()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(HandleInner::File(file)) => file.flush(),
            #[cfg(unix)]
            Some(HandleInner::Socket(stream)) => stream.flush(),
            None => Err(closed()),
        }
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PipeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeHandle")
            .field("type", &self.transport_name())
            .field("access", &self.access)
            .finish()
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "pipe handle is closed")
}

fn denied(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, message)
}
