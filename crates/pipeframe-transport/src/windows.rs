use std::fs::File;
use std::io::{self, ErrorKind};
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use windows_sys::Win32::Foundation::{
    ERROR_PIPE_CONNECTED, ERROR_PIPE_LISTENING, GENERIC_READ, GENERIC_WRITE, HANDLE,
    INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAG_FIRST_PIPE_INSTANCE, OPEN_EXISTING, PIPE_ACCESS_DUPLEX,
    PIPE_ACCESS_INBOUND, PIPE_ACCESS_OUTBOUND,
};
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, SetNamedPipeHandleState, PIPE_NOWAIT, PIPE_READMODE_BYTE,
    PIPE_TYPE_BYTE, PIPE_WAIT,
};

use crate::error::{Result, TransportError};
use crate::handle::PipeHandle;
use crate::name::PipeName;
use crate::options::{AcceptMode, Access, Direction, ListenerOptions};

/// OS buffer size requested for each direction of the pipe.
const PIPE_BUFFER_SIZE: u32 = 512;

/// Owner side of a Windows named pipe with a single instance.
pub struct PipeListener {
    pipe: Option<File>,
    path: PathBuf,
    options: ListenerOptions,
    connected: bool,
}

impl PipeListener {
    /// Create the single pipe instance with the given options.
    pub fn create(name: &PipeName, options: ListenerOptions) -> Result<Self> {
        let path = name.path().to_path_buf();
        let wide = to_wide(&path);

        let open_mode = match options.direction {
            Direction::Outbound => PIPE_ACCESS_OUTBOUND,
            Direction::Inbound => PIPE_ACCESS_INBOUND,
            Direction::Duplex => PIPE_ACCESS_DUPLEX,
        } | FILE_FLAG_FIRST_PIPE_INSTANCE;
        let wait_mode = match options.accept_mode {
            AcceptMode::Blocking => PIPE_WAIT,
            AcceptMode::NonBlocking => PIPE_NOWAIT,
        };

        // SAFETY: `wide` is a NUL-terminated UTF-16 string alive for the call and
        // the security attributes pointer may be null.
        let handle = unsafe {
            CreateNamedPipeW(
                wide.as_ptr(),
                open_mode,
                PIPE_TYPE_BYTE | PIPE_READMODE_BYTE | wait_mode,
                1,
                PIPE_BUFFER_SIZE,
                PIPE_BUFFER_SIZE,
                0,
                std::ptr::null(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(TransportError::ChannelCreate {
                path,
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: `handle` is a freshly created pipe handle owned by nobody else.
        let pipe = unsafe { File::from_raw_handle(handle as _) };
        info!(?path, direction = ?options.direction, "created channel");

        Ok(Self {
            pipe: Some(pipe),
            path,
            options,
            connected: false,
        })
    }

    /// Wait for the single peer.
    ///
    /// Returns `Ok(None)` only in non-blocking mode when no peer is pending.
    pub fn accept(&mut self) -> Result<Option<PipeHandle>> {
        let Some(pipe) = self.pipe.as_ref() else {
            return Err(TransportError::AlreadyConnected(self.path.clone()));
        };
        let raw = pipe.as_raw_handle() as HANDLE;

        // SAFETY: `raw` is a valid pipe handle; no overlapped structure is used.
        let ok = unsafe { ConnectNamedPipe(raw, std::ptr::null_mut()) };
        if ok == 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(code) if code == ERROR_PIPE_CONNECTED as i32 => {}
                Some(code) if code == ERROR_PIPE_LISTENING as i32 => return Ok(None),
                _ => {
                    return Err(TransportError::Accept {
                        path: self.path.clone(),
                        source: err,
                    })
                }
            }
        }

        if self.options.accept_mode == AcceptMode::NonBlocking {
            let mode = PIPE_READMODE_BYTE | PIPE_WAIT;
            // SAFETY: `raw` is valid and `mode` outlives the call; optional fields are null.
            let ok = unsafe {
                SetNamedPipeHandleState(raw, &mode, std::ptr::null(), std::ptr::null())
            };
            if ok == 0 {
                return Err(TransportError::Accept {
                    path: self.path.clone(),
                    source: io::Error::last_os_error(),
                });
            }
        }

        let Some(pipe) = self.pipe.take() else {
            return Err(TransportError::AlreadyConnected(self.path.clone()));
        };
        self.connected = true;
        info!(path = ?self.path, "peer connected");
        Ok(Some(PipeHandle::from_file(
            pipe,
            self.options.direction.owner_access(),
        )))
    }

    /// The pipe path this channel was created at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Direction fixed at creation.
    pub fn direction(&self) -> Direction {
        self.options.direction
    }

    /// Accept mode fixed at creation.
    pub fn accept_mode(&self) -> AcceptMode {
        self.options.accept_mode
    }

    /// True once the single peer has attached.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "named-pipe"
    }
}

impl std::fmt::Debug for PipeListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeListener")
            .field("path", &self.path)
            .field("direction", &self.options.direction)
            .field("transport", &self.transport_name())
            .field("connected", &self.connected)
            .finish()
    }
}

/// Open an existing named pipe as its peer.
pub fn open(name: &PipeName, access: Access) -> Result<PipeHandle> {
    let path = name.path();
    let wide = to_wide(path);

    let mut desired = 0u32;
    if access.can_read() {
        desired |= GENERIC_READ;
    }
    if access.can_write() {
        desired |= GENERIC_WRITE;
    }

    // SAFETY: `wide` is NUL-terminated and alive for the call; pointers may be null.
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            desired,
            0,
            std::ptr::null(),
            OPEN_EXISTING,
            0,
            std::ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        let source = io::Error::last_os_error();
        let source = if source.kind() == ErrorKind::NotFound {
            io::Error::new(ErrorKind::NotFound, "named pipe does not exist")
        } else {
            source
        };
        return Err(TransportError::ChannelOpen {
            path: path.to_path_buf(),
            source,
        });
    }

    debug!(?path, ?access, "opened named pipe");
    // SAFETY: `handle` is a freshly opened pipe handle owned by nobody else.
    let file = unsafe { File::from_raw_handle(handle as _) };
    Ok(PipeHandle::from_file(file, access))
}

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}
