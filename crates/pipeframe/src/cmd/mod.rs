use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use pipeframe_frame::FrameError;
use pipeframe_transport::Direction;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a channel, wait for the peer, and send payloads.
    Serve(ServeArgs),
    /// Open a channel for reading and print received payloads.
    Listen(ListenArgs),
    /// Open a channel and send a single payload.
    Send(SendArgs),
    /// Create a duplex channel and echo payloads back to the peer.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Echo(args) => echo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Directions a sending owner can use.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ServeDirection {
    Outbound,
    Duplex,
}

impl From<ServeDirection> for Direction {
    fn from(direction: ServeDirection) -> Self {
        match direction {
            ServeDirection::Outbound => Direction::Outbound,
            ServeDirection::Duplex => Direction::Duplex,
        }
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["file", "pattern"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "pattern"])]
    pub file: Option<PathBuf>,
    /// Send N bytes counting up from zero (wrapping at 256).
    #[arg(long, value_name = "N", conflicts_with_all = ["data", "file"])]
    pub pattern: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Channel name (bare name or path).
    pub name: String,
    /// Channel direction.
    #[arg(long, value_enum, default_value = "outbound")]
    pub direction: ServeDirection,
    /// Poll for the peer instead of blocking in the OS.
    #[arg(long)]
    pub nowait: bool,
    /// Replace a leftover channel with the same name.
    #[arg(long)]
    pub replace: bool,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Number of sends; 0 repeats until interrupted.
    #[arg(long, default_value = "0")]
    pub repeat: u64,
    /// Delay between sends (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Channel name (bare name or path).
    pub name: String,
    /// Exit after receiving N payloads.
    #[arg(long)]
    pub count: Option<usize>,
    /// Fail on malformed length prefixes instead of skipping them.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel name (bare name or path).
    pub name: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Wait for one reply payload and print it (duplex channels).
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Channel name (bare name or path).
    pub name: String,
    /// Replace a leftover channel with the same name.
    #[arg(long)]
    pub replace: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Build the payload from CLI arguments, falling back to a pattern of
/// `default_pattern` bytes when given.
pub fn resolve_payload(args: &PayloadArgs, default_pattern: Option<usize>) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    match args.pattern.or(default_pattern) {
        Some(len) => Ok(counting_pattern(len)),
        None => Err(CliError::new(
            USAGE,
            "no payload given (use --data, --file or --pattern)",
        )),
    }
}

/// Bytes `0, 1, 2, ...` truncated to `u8`.
pub fn counting_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| i as u8).collect()
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

/// True when the error means the peer went away rather than a protocol fault.
pub fn is_disconnect(err: &FrameError) -> bool {
    match err {
        FrameError::TransportRead { source, .. } | FrameError::TransportWrite { source, .. } => {
            matches!(
                source.kind(),
                ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
            )
        }
        _ => false,
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn counting_pattern_wraps_at_256() {
        let pattern = counting_pattern(1000);
        assert_eq!(pattern.len(), 1000);
        assert_eq!(pattern[0], 0);
        assert_eq!(pattern[255], 255);
        assert_eq!(pattern[256], 0);
        assert_eq!(pattern[999], (999 % 256) as u8);
    }

    #[test]
    fn resolve_payload_prefers_explicit_data() {
        let args = PayloadArgs {
            data: Some("hello".to_string()),
            file: None,
            pattern: None,
        };
        assert_eq!(resolve_payload(&args, Some(1000)).unwrap(), b"hello");
    }

    #[test]
    fn resolve_payload_without_source_is_usage_error() {
        let args = PayloadArgs {
            data: None,
            file: None,
            pattern: None,
        };
        let err = resolve_payload(&args, None).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert_eq!(resolve_payload(&args, Some(4)).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn disconnect_classification() {
        let eof = FrameError::TransportRead {
            expected: 12,
            received: 0,
            source: io::Error::from(ErrorKind::UnexpectedEof),
        };
        assert!(is_disconnect(&eof));
        assert!(!is_disconnect(&FrameError::InvalidLength));
    }
}
