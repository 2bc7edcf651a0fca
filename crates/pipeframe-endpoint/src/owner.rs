use std::time::Duration;

use pipeframe_frame::{FrameConfig, FramedChannel};
use pipeframe_transport::{
    AcceptMode, Direction, ListenerOptions, PipeHandle, PipeListener, PipeName, TransportError,
};
use tracing::info;

use crate::error::Result;
use crate::Channel;

/// Sleep between polls when `wait` runs on a non-blocking channel.
const NONBLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for the owner side of a channel.
#[derive(Debug, Clone)]
pub struct OwnerConfig {
    pub direction: Direction,
    pub accept_mode: AcceptMode,
    /// Permission bits for the channel path (Unix only).
    pub mode: u32,
    /// Replace a leftover FIFO or socket with the same name.
    pub replace_stale: bool,
    /// Framing applied to the channel handed out by `wait`.
    pub frame: FrameConfig,
}

impl Default for OwnerConfig {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            accept_mode: AcceptMode::default(),
            mode: ListenerOptions::DEFAULT_MODE,
            replace_stale: false,
            frame: FrameConfig::default(),
        }
    }
}

/// Creates a named channel and hands out a framed channel once its single
/// peer attaches.
pub struct Owner {
    listener: PipeListener,
    name: PipeName,
    frame_config: FrameConfig,
}

impl Owner {
    /// Create a channel with blocking accept and default framing.
    pub fn create(name: &str, direction: Direction) -> Result<Self> {
        Self::create_with_config(
            name,
            OwnerConfig {
                direction,
                ..OwnerConfig::default()
            },
        )
    }

    /// Create a channel with explicit configuration.
    ///
    /// Fails with `TransportError::ChannelCreate` if the name is unusable or
    /// the OS refuses.
    pub fn create_with_config(name: &str, config: OwnerConfig) -> Result<Self> {
        let name = PipeName::new(name).map_err(TransportError::into_create_error)?;
        let listener = PipeListener::create(
            &name,
            ListenerOptions {
                direction: config.direction,
                accept_mode: config.accept_mode,
                mode: config.mode,
                replace_stale: config.replace_stale,
            },
        )?;
        Ok(Self {
            listener,
            name,
            frame_config: config.frame,
        })
    }

    /// Block until the peer attaches.
    ///
    /// On a non-blocking channel this polls until a peer shows up. Only one
    /// peer is ever accepted; later calls fail with
    /// `TransportError::AlreadyConnected`.
    pub fn wait(&mut self) -> Result<Channel> {
        loop {
            if let Some(channel) = self.try_wait()? {
                return Ok(channel);
            }
            std::thread::sleep(NONBLOCKING_POLL_INTERVAL);
        }
    }

    /// Check for the peer without blocking (non-blocking channels).
    ///
    /// On a blocking channel this behaves like [`Owner::wait`].
    pub fn try_wait(&mut self) -> Result<Option<Channel>> {
        let Some(handle) = self.listener.accept()? else {
            return Ok(None);
        };
        Ok(Some(self.framed(handle)))
    }

    /// The channel name as given at creation.
    pub fn name(&self) -> &PipeName {
        &self.name
    }

    /// Direction fixed at creation.
    pub fn direction(&self) -> Direction {
        self.listener.direction()
    }

    /// True once the peer has attached.
    pub fn is_connected(&self) -> bool {
        self.listener.is_connected()
    }

    fn framed(&self, handle: PipeHandle) -> Channel {
        info!(
            channel = %self.name,
            transport = handle.transport_name(),
            "channel connected"
        );
        FramedChannel::with_config(handle, self.frame_config.clone())
    }
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Owner")
            .field("name", &self.name.as_str())
            .field("transport", &self.listener.transport_name())
            .field("connected", &self.listener.is_connected())
            .finish()
    }
}
