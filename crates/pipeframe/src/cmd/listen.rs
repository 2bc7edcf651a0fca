use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pipeframe_endpoint::{open_with_config, Access, FrameConfig};
use pipeframe_frame::PrefixPolicy;

use crate::cmd::{install_ctrlc_handler, is_disconnect, ListenArgs};
use crate::exit::{endpoint_error, frame_error, CliResult, SUCCESS};
use crate::output::{print_payload, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = FrameConfig {
        prefix_policy: if args.strict {
            PrefixPolicy::Reject
        } else {
            PrefixPolicy::Resync
        },
        ..FrameConfig::default()
    };
    let mut channel = open_with_config(&args.name, Access::Read, config)
        .map_err(|err| endpoint_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let payload = match channel.receive() {
            Ok(payload) => payload,
            Err(err) if is_disconnect(&err) => {
                tracing::info!(received = printed, "owner closed the channel");
                break;
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        printed = printed.saturating_add(1);
        print_payload(payload.as_ref(), &args.name, printed as u64, format);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    channel.close();
    Ok(SUCCESS)
}
