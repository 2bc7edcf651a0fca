//! Framed single-peer IPC over OS named pipes.
//!
//! pipeframe carries discrete byte payloads over a named pipe whose native
//! form is an unstructured byte stream. Each payload is preceded by a
//! twelve-digit ASCII length so the receiver can recover message boundaries.
//!
//! # Crate Structure
//!
//! - [`transport`] — Pipe handles, channel names, OS create/open/accept
//! - [`frame`] — Twelve-digit length-prefix framing and the framed channel
//! - [`endpoint`] — Owner and peer roles (behind `endpoint` feature)

/// Re-export transport types.
pub mod transport {
    pub use pipeframe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pipeframe_frame::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use pipeframe_endpoint::*;
}
