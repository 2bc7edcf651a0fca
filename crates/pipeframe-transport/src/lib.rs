//! Named pipe transport for pipeframe.
//!
//! Owns the OS side of a single-peer channel:
//! - FIFOs and Unix domain sockets (Linux/macOS)
//! - Named pipes (Windows)
//!
//! This is the lowest layer of pipeframe. Everything else builds on top of
//! the [`PipeHandle`] type provided here.

pub mod error;
pub mod handle;
pub mod name;
pub mod options;

#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

pub use error::{Result, TransportError};
pub use handle::PipeHandle;
pub use name::PipeName;
pub use options::{AcceptMode, Access, Direction, ListenerOptions};

#[cfg(unix)]
pub use unix::PipeListener;
#[cfg(windows)]
pub use windows::PipeListener;

/// Open an existing channel created by an owner.
///
/// The open is the connection: there is no separate wait step on the peer side.
pub fn open(name: &PipeName, access: Access) -> Result<PipeHandle> {
    #[cfg(unix)]
    {
        unix::open(name, access)
    }
    #[cfg(windows)]
    {
        windows::open(name, access)
    }
}
