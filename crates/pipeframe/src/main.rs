mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "pipeframe", version, about = "Framed named pipe CLI")]
struct Cli {
    /// Output format for received payloads.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "text",
        env = "PIPEFRAME_LOG_FORMAT",
        global = true
    )]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "PIPEFRAME_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "pipeframe",
            "serve",
            "interface_pipe",
            "--pattern",
            "1000",
            "--interval",
            "1s",
        ])
        .expect("serve args should parse");

        assert!(matches!(cli.command, Command::Serve(_)));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "pipeframe",
            "send",
            "interface_pipe",
            "--data",
            "hello",
            "--pattern",
            "10",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from(["pipeframe", "listen", "interface_pipe", "--count", "3"])
            .expect("listen args should parse");
        match cli.command {
            Command::Listen(args) => assert_eq!(args.count, Some(3)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_inbound_serve_direction() {
        let err = Cli::try_parse_from([
            "pipeframe",
            "serve",
            "interface_pipe",
            "--direction",
            "inbound",
        ])
        .expect_err("serve only writes");

        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
