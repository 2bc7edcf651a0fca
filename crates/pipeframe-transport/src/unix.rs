use std::ffi::CString;
use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::handle::PipeHandle;
use crate::name::PipeName;
use crate::options::{AcceptMode, Access, Direction, ListenerOptions};

/// Owner side of a Unix channel.
///
/// Outbound and inbound channels are FIFOs created with `mkfifo`; duplex
/// channels are Unix domain sockets. Either way exactly one peer is accepted,
/// after which the path is unlinked so nobody else can attach. FIFO peers
/// also hold an exclusive lock, which settles peers that opened together.
pub struct PipeListener {
    kind: ListenerKind,
    path: PathBuf,
    options: ListenerOptions,
    created_inode: Option<(u64, u64)>,
    connected: bool,
}

enum ListenerKind {
    Fifo,
    Socket(Option<UnixListener>),
}

impl PipeListener {
    /// Create the channel with the given options.
    pub fn create(name: &PipeName, options: ListenerOptions) -> Result<Self> {
        let path = name.path().to_path_buf();

        if options.direction == Direction::Inbound
            && options.accept_mode == AcceptMode::NonBlocking
        {
            // A non-blocking read open on a FIFO succeeds with no writer present,
            // so it cannot tell whether a peer attached.
            return Err(create_error(
                &path,
                io::Error::new(
                    ErrorKind::Unsupported,
                    "non-blocking accept is not available for inbound fifo channels",
                ),
            ));
        }

        if path.symlink_metadata().is_ok() {
            remove_stale(&path, options.replace_stale)?;
        }

        let kind = match options.direction {
            Direction::Outbound | Direction::Inbound => {
                mkfifo(&path, options.mode).map_err(|e| create_error(&path, e))?;
                ListenerKind::Fifo
            }
            Direction::Duplex => {
                let listener = UnixListener::bind(&path).map_err(|e| create_error(&path, e))?;
                ListenerKind::Socket(Some(listener))
            }
        };

        let created_inode = Some(finish_or_remove(&path, || {
            if let ListenerKind::Socket(Some(listener)) = &kind {
                if options.accept_mode == AcceptMode::NonBlocking {
                    listener.set_nonblocking(true)?;
                }
            }
            // mkfifo and bind apply the umask; set the requested bits explicitly.
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(options.mode))?;
            let metadata = std::fs::symlink_metadata(&path)?;
            Ok((metadata.dev(), metadata.ino()))
        })?);

        info!(?path, direction = ?options.direction, "created channel");

        Ok(Self {
            kind,
            path,
            options,
            created_inode,
            connected: false,
        })
    }

    /// Wait for the single peer.
    ///
    /// Returns `Ok(None)` only in non-blocking mode when no peer is pending.
    pub fn accept(&mut self) -> Result<Option<PipeHandle>> {
        if self.connected {
            return Err(TransportError::AlreadyConnected(self.path.clone()));
        }

        let access = self.options.direction.owner_access();
        let nonblocking = self.options.accept_mode == AcceptMode::NonBlocking;

        let handle = match &mut self.kind {
            ListenerKind::Fifo => match open_fifo(&self.path, access, nonblocking) {
                Ok(file) => PipeHandle::from_file(file, access),
                Err(err) if nonblocking && is_no_peer_yet(&err) => return Ok(None),
                Err(err) => return Err(accept_error(&self.path, err)),
            },
            ListenerKind::Socket(listener) => {
                let Some(active) = listener.as_ref() else {
                    return Err(TransportError::AlreadyConnected(self.path.clone()));
                };
                let stream = match active.accept() {
                    Ok((stream, _addr)) => stream,
                    Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
                    Err(err) => return Err(accept_error(&self.path, err)),
                };
                stream
                    .set_nonblocking(false)
                    .map_err(|e| accept_error(&self.path, e))?;
                // Drop the listener so later connects are refused.
                *listener = None;
                PipeHandle::from_socket(stream, access)
            }
        };

        self.connected = true;
        self.unlink();
        info!(path = ?self.path, "peer connected");
        Ok(Some(handle))
    }

    /// The path this channel was created at.
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
        match self.kind {
            ListenerKind::Fifo => "fifo",
            ListenerKind::Socket(_) => "unix-socket",
        }
    }

    fn unlink(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode.take() else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            let file_type = metadata.file_type();
            if (file_type.is_fifo() || file_type.is_socket())
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "removing channel path");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "channel path identity changed; skipping cleanup"
                );
            }
        }
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

impl Drop for PipeListener {
    fn drop(&mut self) {
        self.unlink();
    }
}

/// Open an existing channel as its peer.
pub fn open(name: &PipeName, access: Access) -> Result<PipeHandle> {
    let path = name.path();
    let metadata = std::fs::metadata(path).map_err(|e| open_error(path, e))?;
    let file_type = metadata.file_type();

    if file_type.is_socket() {
        let stream = UnixStream::connect(path).map_err(|e| open_error(path, e))?;
        let half = match access {
            Access::Read => Some(std::net::Shutdown::Write),
            Access::Write => Some(std::net::Shutdown::Read),
            Access::ReadWrite => None,
        };
        if let Some(half) = half {
            stream.shutdown(half).map_err(|e| open_error(path, e))?;
        }
        debug!(?path, ?access, "connected to channel socket");
        return Ok(PipeHandle::from_socket(stream, access));
    }

    if file_type.is_fifo() {
        if access == Access::ReadWrite {
            return Err(open_error(
                path,
                io::Error::new(
                    ErrorKind::PermissionDenied,
                    "one-way channel cannot be opened for read-write",
                ),
            ));
        }
        let file = open_fifo(path, access, false).map_err(|e| open_error(path, e))?;
        // Every peer blocked in open() is released together when the owner
        // attaches; only the lock holder keeps the channel.
        claim_fifo(&file).map_err(|e| open_error(path, e))?;
        debug!(?path, ?access, "opened channel fifo");
        return Ok(PipeHandle::from_file(file, access));
    }

    Err(open_error(
        path,
        io::Error::new(ErrorKind::InvalidInput, "path is not a pipe channel"),
    ))
}

fn open_fifo(path: &Path, access: Access, nonblocking: bool) -> io::Result<std::fs::File> {
    let mut options = OpenOptions::new();
    options.read(access.can_read()).write(access.can_write());
    if nonblocking {
        options.custom_flags(libc::O_NONBLOCK);
    }
    let file = options.open(path)?;
    if nonblocking {
        clear_nonblocking(&file)?;
    }
    Ok(file)
}

/// Take the peer slot of a FIFO channel with a non-blocking exclusive `flock`.
fn claim_fifo(file: &std::fs::File) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the descriptor is owned by `file` for the duration of the call.
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::EWOULDBLOCK => Err(io::Error::new(
            ErrorKind::ResourceBusy,
            "channel already has a connected peer",
        )),
        // Some kernels refuse locks on FIFOs; fall back to path unlinking alone.
        Some(code) if code == libc::EOPNOTSUPP || code == libc::EINVAL => {
            debug!("fifo locking unsupported: {err}");
            Ok(())
        }
        _ => Err(err),
    }
}

/// A non-blocking write open on a FIFO reports a missing reader as ENXIO.
fn is_no_peer_yet(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENXIO) || err.kind() == ErrorKind::WouldBlock
}

fn clear_nonblocking(file: &std::fs::File) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = file.as_raw_fd();
    // SAFETY: `fd` is an open descriptor owned by `file` for the duration of both calls.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above; only the O_NONBLOCK status flag is changed.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn mkfifo(path: &Path, mode: u32) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "path contains a NUL byte"))?;
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Run the steps that follow creating a channel node, removing the node if
/// any of them fails.
fn finish_or_remove<T>(path: &Path, steps: impl FnOnce() -> io::Result<T>) -> Result<T> {
    steps().map_err(|err| {
        debug!(?path, "removing partially created channel");
        let _ = std::fs::remove_file(path);
        create_error(path, err)
    })
}

fn remove_stale(path: &Path, replace_stale: bool) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| create_error(path, e))?;
    let file_type = metadata.file_type();
    let is_pipe = file_type.is_fifo() || file_type.is_socket();

    if replace_stale && is_pipe {
        debug!(?path, "removing stale channel");
        return std::fs::remove_file(path).map_err(|e| create_error(path, e));
    }

    let message = if is_pipe {
        "a channel with this name already exists"
    } else {
        "existing path is not a pipe channel"
    };
    Err(create_error(
        path,
        io::Error::new(ErrorKind::AlreadyExists, message),
    ))
}

fn create_error(path: &Path, source: io::Error) -> TransportError {
    TransportError::ChannelCreate {
        path: path.to_path_buf(),
        source,
    }
}

fn open_error(path: &Path, source: io::Error) -> TransportError {
    TransportError::ChannelOpen {
        path: path.to_path_buf(),
        source,
    }
}

fn accept_error(path: &Path, source: io::Error) -> TransportError {
    TransportError::Accept {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    fn unique_name(tag: &str) -> (PathBuf, PipeName) {
        let dir = std::env::temp_dir().join(format!(
            "pf-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let name = PipeName::new(dir.join("chan").to_string_lossy().into_owned())
            .expect("name should be valid");
        (dir, name)
    }

    #[test]
    fn outbound_fifo_roundtrip() {
        let (dir, name) = unique_name("fifo");
        let mut listener = PipeListener::create(&name, ListenerOptions::default()).unwrap();
        assert!(name.path().exists());
        assert_eq!(listener.transport_name(), "fifo");

        let peer_name = name.clone();
        let reader = std::thread::spawn(move || {
            let mut handle = open(&peer_name, Access::Read).unwrap();
            let mut buf = [0u8; 5];
            handle.read_exact(&mut buf).unwrap();
            buf
        });

        let mut handle = listener.accept().unwrap().expect("blocking accept yields a peer");
        handle.write_all(b"hello").unwrap();

        assert_eq!(&reader.join().unwrap(), b"hello");
        assert!(!name.path().exists(), "path is unlinked once the peer attaches");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn inbound_fifo_roundtrip() {
        let (dir, name) = unique_name("inbound");
        let options = ListenerOptions {
            direction: Direction::Inbound,
            ..ListenerOptions::default()
        };
        let mut listener = PipeListener::create(&name, options).unwrap();

        let peer_name = name.clone();
        let writer = std::thread::spawn(move || {
            let mut handle = open(&peer_name, Access::Write).unwrap();
            handle.write_all(b"up").unwrap();
        });

        let mut handle = listener.accept().unwrap().unwrap();
        let mut buf = [0u8; 2];
        handle.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"up");

        writer.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn duplex_socket_roundtrip() {
        let (dir, name) = unique_name("duplex");
        let options = ListenerOptions {
            direction: Direction::Duplex,
            ..ListenerOptions::default()
        };
        let mut listener = PipeListener::create(&name, options).unwrap();
        assert_eq!(listener.transport_name(), "unix-socket");

        let peer_name = name.clone();
        let client = std::thread::spawn(move || {
            let mut handle = open(&peer_name, Access::ReadWrite).unwrap();
            handle.write_all(b"ping").unwrap();
            let mut buf = [0u8; 4];
            handle.read_exact(&mut buf).unwrap();
            buf
        });

        let mut handle = listener.accept().unwrap().unwrap();
        let mut buf = [0u8; 4];
        handle.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");
        handle.write_all(b"pong").unwrap();

        assert_eq!(&client.join().unwrap(), b"pong");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn second_accept_is_rejected() {
        let (dir, name) = unique_name("single");
        let options = ListenerOptions {
            direction: Direction::Duplex,
            ..ListenerOptions::default()
        };
        let mut listener = PipeListener::create(&name, options).unwrap();

        let peer_name = name.clone();
        let client = std::thread::spawn(move || open(&peer_name, Access::ReadWrite).unwrap());
        let _handle = listener.accept().unwrap().unwrap();
        let _client = client.join().unwrap();

        assert!(listener.is_connected());
        assert!(format!("{listener:?}").contains("connected: true"));
        let err = listener.accept().unwrap_err();
        assert!(matches!(err, TransportError::AlreadyConnected(_)));

        let err = open(&name, Access::ReadWrite).unwrap_err();
        assert!(matches!(err, TransportError::ChannelOpen { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_fifo_readers_get_one_slot() {
        let (dir, name) = unique_name("two-readers");
        let mut listener = PipeListener::create(&name, ListenerOptions::default()).unwrap();

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let peer_name = name.clone();
                std::thread::spawn(move || open(&peer_name, Access::Read))
            })
            .collect();
        // Let both readers block in open() before the owner attaches.
        std::thread::sleep(std::time::Duration::from_millis(150));

        let mut owner = listener.accept().unwrap().expect("blocking accept yields a peer");
        let results: Vec<_> = readers.into_iter().map(|r| r.join().unwrap()).collect();

        let mut winners = Vec::new();
        for result in results {
            match result {
                Ok(handle) => winners.push(handle),
                Err(err) => assert!(
                    matches!(err, TransportError::ChannelOpen { .. }),
                    "unexpected error: {err}"
                ),
            }
        }
        assert_eq!(winners.len(), 1, "exactly one reader keeps the channel");

        owner.write_all(b"solo").unwrap();
        let mut buf = [0u8; 4];
        winners[0].read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"solo");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn nonblocking_accept_without_peer_returns_none() {
        let (dir, name) = unique_name("nowait");
        for direction in [Direction::Outbound, Direction::Duplex] {
            let options = ListenerOptions {
                direction,
                accept_mode: AcceptMode::NonBlocking,
                ..ListenerOptions::default()
            };
            let mut listener = PipeListener::create(&name, options).unwrap();
            assert!(listener.accept().unwrap().is_none());
            assert!(!listener.is_connected());
            drop(listener);
            assert!(!name.path().exists());
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn nonblocking_inbound_fifo_is_unsupported() {
        let (dir, name) = unique_name("nowait-inbound");
        let options = ListenerOptions {
            direction: Direction::Inbound,
            accept_mode: AcceptMode::NonBlocking,
            ..ListenerOptions::default()
        };
        let err = PipeListener::create(&name, options).unwrap_err();
        match err {
            TransportError::ChannelCreate { source, .. } => {
                assert_eq!(source.kind(), ErrorKind::Unsupported)
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!name.path().exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_rejects_name_collision() {
        let (dir, name) = unique_name("collide");
        let _first = PipeListener::create(&name, ListenerOptions::default()).unwrap();
        let err = PipeListener::create(&name, ListenerOptions::default()).unwrap_err();
        assert!(matches!(err, TransportError::ChannelCreate { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replace_stale_never_removes_regular_files() {
        let (dir, name) = unique_name("stale");
        std::fs::write(name.path(), b"regular-file").unwrap();

        let options = ListenerOptions {
            replace_stale: true,
            ..ListenerOptions::default()
        };
        let err = PipeListener::create(&name, options).unwrap_err();
        assert!(matches!(err, TransportError::ChannelCreate { .. }));
        assert!(name.path().exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn replace_stale_removes_leftover_fifo() {
        let (dir, name) = unique_name("leftover");
        mkfifo(name.path(), 0o600).unwrap();

        let options = ListenerOptions {
            replace_stale: true,
            ..ListenerOptions::default()
        };
        let listener = PipeListener::create(&name, options);
        assert!(listener.is_ok());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn created_path_has_hardened_permissions() {
        let (dir, name) = unique_name("perms");
        let _listener = PipeListener::create(&name, ListenerOptions::default()).unwrap();
        let mode = std::fs::metadata(name.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_setup_removes_created_node() {
        let (dir, name) = unique_name("partial");
        mkfifo(name.path(), 0o600).unwrap();

        let err = finish_or_remove(name.path(), || -> io::Result<()> {
            Err(io::Error::from(ErrorKind::PermissionDenied))
        })
        .unwrap_err();

        assert!(matches!(err, TransportError::ChannelCreate { .. }));
        assert!(!name.path().exists(), "partially created fifo is removed");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_missing_channel_fails() {
        let (dir, name) = unique_name("missing");
        let err = open(&name, Access::Read).unwrap_err();
        match err {
            TransportError::ChannelOpen { source, .. } => {
                assert_eq!(source.kind(), ErrorKind::NotFound)
            }
            other => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_fifo_read_write_is_refused() {
        let (dir, name) = unique_name("rw-fifo");
        let _listener = PipeListener::create(&name, ListenerOptions::default()).unwrap();
        let err = open(&name, Access::ReadWrite).unwrap_err();
        match err {
            TransportError::ChannelOpen { source, .. } => {
                assert_eq!(source.kind(), ErrorKind::PermissionDenied)
            }
            other => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_regular_file_is_refused() {
        let (dir, name) = unique_name("not-pipe");
        std::fs::write(name.path(), b"data").unwrap();
        let err = open(&name, Access::Read).unwrap_err();
        assert!(matches!(err, TransportError::ChannelOpen { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn drop_does_not_remove_replaced_path() {
        let (dir, name) = unique_name("drop-race");
        let listener = PipeListener::create(&name, ListenerOptions::default()).unwrap();

        std::fs::remove_file(name.path()).unwrap();
        std::fs::write(name.path(), b"replacement-file").unwrap();

        drop(listener);
        assert!(
            name.path().exists(),
            "drop must not remove path if inode identity changed"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
