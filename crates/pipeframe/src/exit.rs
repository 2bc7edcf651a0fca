use std::fmt;
use std::io;

use pipeframe_endpoint::EndpointError;
use pipeframe_frame::FrameError;
use pipeframe_transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::AlreadyExists | io::ErrorKind::ResourceBusy => {
            TRANSPORT_ERROR
        }
        io::ErrorKind::InvalidInput => USAGE,
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(&err), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::ChannelCreate { source, .. }
        | TransportError::ChannelOpen { source, .. }
        | TransportError::Accept { source, .. }
        | TransportError::Io(source) => io_code(source),
        TransportError::InvalidName { .. } | TransportError::NameTooLong { .. } => USAGE,
        TransportError::AlreadyConnected(_) => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match &err {
        FrameError::TransportRead { source, .. } | FrameError::TransportWrite { source, .. } => {
            io_code(source)
        }
        FrameError::PayloadTooLarge { .. }
        | FrameError::InvalidLength
        | FrameError::MalformedPrefix { .. } => DATA_INVALID,
        FrameError::Closed => FAILURE,
        FrameError::Allocation { .. } => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn endpoint_error(context: &str, err: EndpointError) -> CliError {
    match err {
        EndpointError::Transport(err) => transport_error(context, err),
        EndpointError::Frame(err) => frame_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_channel_maps_to_transport_error() {
        let err = transport_error(
            "open failed",
            TransportError::ChannelOpen {
                path: PathBuf::from("/tmp/absent"),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("open failed: "));
    }

    #[test]
    fn framing_violations_map_to_data_invalid() {
        assert_eq!(
            frame_error("receive failed", FrameError::InvalidLength).code,
            DATA_INVALID
        );
        assert_eq!(
            frame_error(
                "send failed",
                FrameError::PayloadTooLarge { size: 10, max: 1 }
            )
            .code,
            DATA_INVALID
        );
    }

    #[test]
    fn peer_hangup_maps_to_failure() {
        let err = frame_error(
            "receive failed",
            FrameError::TransportRead {
                expected: 12,
                received: 0,
                source: io::Error::from(io::ErrorKind::UnexpectedEof),
            },
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn bad_name_is_usage_error() {
        let err = endpoint_error(
            "create failed",
            EndpointError::Transport(TransportError::InvalidName {
                name: String::new(),
                reason: "name is empty",
            }),
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn bad_name_through_endpoint_is_usage_error() {
        let err = endpoint_error(
            "create failed",
            EndpointError::Transport(
                TransportError::InvalidName {
                    name: String::new(),
                    reason: "name is empty",
                }
                .into_create_error(),
            ),
        );
        assert_eq!(err.code, USAGE);
    }
}
