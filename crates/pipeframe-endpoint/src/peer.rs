use pipeframe_frame::{FrameConfig, FramedChannel};
use pipeframe_transport::{Access, PipeName, TransportError};
use tracing::info;

use crate::error::Result;
use crate::Channel;

/// Open an existing channel as its peer.
///
/// Opening is the connection: there is no separate wait step. Fails with
/// `TransportError::ChannelOpen` if the name is unusable, the channel does
/// not exist, or it refuses the requested access.
pub fn open(name: &str, access: Access) -> Result<Channel> {
    open_with_config(name, access, FrameConfig::default())
}

/// Open with explicit frame configuration.
pub fn open_with_config(name: &str, access: Access, frame_config: FrameConfig) -> Result<Channel> {
    let name = PipeName::new(name).map_err(TransportError::into_open_error)?;
    let handle = pipeframe_transport::open(&name, access)?;
    info!(channel = %name, ?access, transport = handle.transport_name(), "opened channel");
    Ok(FramedChannel::with_config(handle, frame_config))
}
