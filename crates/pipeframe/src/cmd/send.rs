use pipeframe_endpoint::{open, Access};

use crate::cmd::{resolve_payload, SendArgs};
use crate::exit::{endpoint_error, frame_error, CliResult, SUCCESS};
use crate::output::{print_payload, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args.payload, None)?;

    let access = if args.wait {
        Access::ReadWrite
    } else {
        Access::Write
    };
    let mut channel =
        open(&args.name, access).map_err(|err| endpoint_error("open failed", err))?;

    channel
        .send(&payload)
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        let reply = channel
            .receive()
            .map_err(|err| frame_error("receive failed", err))?;
        print_payload(reply.as_ref(), &args.name, 1, format);
    }

    channel.close();
    Ok(SUCCESS)
}
