//! Capability flags fixed at creation or open time.

/// Data flow of a channel, seen from the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Owner writes, peer reads.
    #[default]
    Outbound,
    /// Peer writes, owner reads.
    Inbound,
    /// Both sides read and write.
    Duplex,
}

impl Direction {
    /// Access the owner holds on its side of the channel.
    pub fn owner_access(self) -> Access {
        match self {
            Direction::Outbound => Access::Write,
            Direction::Inbound => Access::Read,
            Direction::Duplex => Access::ReadWrite,
        }
    }

    /// Access a peer needs to be the complementary side.
    pub fn peer_access(self) -> Access {
        match self {
            Direction::Outbound => Access::Read,
            Direction::Inbound => Access::Write,
            Direction::Duplex => Access::ReadWrite,
        }
    }
}

/// Whether waiting for the peer blocks the calling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceptMode {
    #[default]
    Blocking,
    NonBlocking,
}

/// Access requested by a peer when opening a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn can_read(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// Options for creating the owner side of a channel.
#[derive(Debug, Clone)]
pub struct ListenerOptions {
    pub direction: Direction,
    pub accept_mode: AcceptMode,
    /// Permission bits for the created FIFO or socket path (Unix only).
    pub mode: u32,
    /// Remove a leftover FIFO or socket at the path before creating.
    /// Regular files are never removed.
    pub replace_stale: bool,
}

impl ListenerOptions {
    /// Default permission mode for created channel paths.
    pub const DEFAULT_MODE: u32 = 0o600;
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            accept_mode: AcceptMode::default(),
            mode: Self::DEFAULT_MODE,
            replace_stale: false,
        }
    }
}
