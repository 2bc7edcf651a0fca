use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pipeframe_endpoint::{AcceptMode, Channel, Owner, OwnerConfig};

use crate::cmd::{
    install_ctrlc_handler, is_disconnect, parse_duration, resolve_payload, ServeArgs,
};
use crate::exit::{endpoint_error, frame_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

/// Payload size sent when no payload flag is given.
const DEFAULT_PATTERN_LEN: usize = 1000;

pub fn run(args: ServeArgs, _format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let payload = resolve_payload(&args.payload, Some(DEFAULT_PATTERN_LEN))?;

    let accept_mode = if args.nowait {
        AcceptMode::NonBlocking
    } else {
        AcceptMode::Blocking
    };
    let mut owner = Owner::create_with_config(
        &args.name,
        OwnerConfig {
            direction: args.direction.into(),
            accept_mode,
            replace_stale: args.replace,
            ..OwnerConfig::default()
        },
    )
    .map_err(|err| endpoint_error("create failed", err))?;

    tracing::info!(channel = %owner.name(), "waiting for peer");
    let mut channel = owner
        .wait()
        .map_err(|err| endpoint_error("wait failed", err))?;

    // Installed after the wait so Ctrl-C still interrupts a blocked open.
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let sent = send_loop(&mut channel, &payload, args.repeat, interval, &running)?;
    tracing::info!(sent, "serve finished");
    channel.close();

    Ok(SUCCESS)
}

fn send_loop(
    channel: &mut Channel,
    payload: &[u8],
    repeat: u64,
    interval: std::time::Duration,
    running: &AtomicBool,
) -> CliResult<u64> {
    let mut sent = 0u64;
    while running.load(Ordering::SeqCst) {
        match channel.send(payload) {
            Ok(()) => {}
            Err(err) if is_disconnect(&err) => {
                tracing::info!(sent, "peer closed the channel");
                break;
            }
            Err(err) => return Err(frame_error("send failed", err)),
        }
        sent += 1;
        tracing::debug!(sent, size = payload.len(), "sent payload");

        if repeat != 0 && sent >= repeat {
            break;
        }
        std::thread::sleep(interval);
    }
    Ok(sent)
}
