use std::path::PathBuf;

/// Errors that can occur in pipe transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The OS refused to create the named channel (collision, bad name, exhaustion).
    #[error("failed to create channel {path}: {source}")]
    ChannelCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The named channel does not exist or refused the requested access.
    #[error("failed to open channel {path}: {source}")]
    ChannelOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Waiting for the peer to attach failed.
    #[error("failed to accept peer on {path}: {source}")]
    Accept {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The channel already has its single peer.
    #[error("channel {0} already has a connected peer")]
    AlreadyConnected(PathBuf),

    /// An I/O error occurred on the pipe handle.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The channel name cannot be used on this platform.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The resolved channel path is too long for the platform.
    #[error("channel path too long ({len} bytes, max {max}): {path}")]
    NameTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// Report a name rejected before reaching the OS as an owner-side
    /// create failure. Other variants pass through unchanged.
    pub fn into_create_error(self) -> Self {
        match self.name_failure() {
            Ok((path, source)) => Self::ChannelCreate { path, source },
            Err(other) => other,
        }
    }

    /// Report a name rejected before reaching the OS as a peer-side open
    /// failure. Other variants pass through unchanged.
    pub fn into_open_error(self) -> Self {
        match self.name_failure() {
            Ok((path, source)) => Self::ChannelOpen { path, source },
            Err(other) => other,
        }
    }

    fn name_failure(self) -> std::result::Result<(PathBuf, std::io::Error), Self> {
        let message = self.to_string();
        match self {
            Self::InvalidName { name, .. } => Ok((
                PathBuf::from(name),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, message),
            )),
            Self::NameTooLong { path, .. } => Ok((
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, message),
            )),
            other => Err(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_errors_become_create_and_open_failures() {
        let err = TransportError::InvalidName {
            name: String::new(),
            reason: "name is empty",
        }
        .into_create_error();
        match err {
            TransportError::ChannelCreate { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput);
                assert!(source.to_string().contains("name is empty"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = TransportError::NameTooLong {
            path: PathBuf::from("/tmp/long"),
            len: 300,
            max: 108,
        }
        .into_open_error();
        match err {
            TransportError::ChannelOpen { path, source } => {
                assert_eq!(path, PathBuf::from("/tmp/long"));
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn other_errors_pass_through() {
        let err = TransportError::AlreadyConnected(PathBuf::from("/tmp/chan")).into_open_error();
        assert!(matches!(err, TransportError::AlreadyConnected(_)));
    }
}
