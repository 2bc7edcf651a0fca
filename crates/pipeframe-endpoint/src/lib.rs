//! Owner and peer roles for single-peer framed pipe channels.
//!
//! Both roles end up with the same [`Channel`] type: the owner after its
//! single peer attaches, the peer as soon as the open succeeds.

pub mod error;
pub mod owner;
pub mod peer;

pub use error::{EndpointError, Result};
pub use owner::{Owner, OwnerConfig};
pub use peer::{open, open_with_config};

pub use pipeframe_frame::{FrameConfig, FramedChannel};
pub use pipeframe_transport::{AcceptMode, Access, Direction, PipeHandle, PipeName};

/// A connected, framed channel. Identical for owner and peer.
pub type Channel = FramedChannel<PipeHandle>;
