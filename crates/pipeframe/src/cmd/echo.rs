use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pipeframe_endpoint::{Direction, Owner, OwnerConfig};

use crate::cmd::{install_ctrlc_handler, is_disconnect, EchoArgs};
use crate::exit::{endpoint_error, frame_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut owner = Owner::create_with_config(
        &args.name,
        OwnerConfig {
            direction: Direction::Duplex,
            replace_stale: args.replace,
            ..OwnerConfig::default()
        },
    )
    .map_err(|err| endpoint_error("create failed", err))?;

    let mut channel = owner
        .wait()
        .map_err(|err| endpoint_error("wait failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        let payload = match channel.receive() {
            Ok(payload) => payload,
            Err(err) if is_disconnect(&err) => break,
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        tracing::info!(size = payload.len(), "echoing payload");

        match channel.send(payload.as_ref()) {
            Ok(()) => {}
            Err(err) if is_disconnect(&err) => break,
            Err(err) => return Err(frame_error("echo send failed", err)),
        }
    }

    channel.close();
    Ok(SUCCESS)
}
