use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pipeframe {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pipeframe");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("PIPEFRAME_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "transport: {}",
        if cfg!(windows) {
            "named-pipe"
        } else {
            "fifo+unix-socket"
        }
    );
    println!(
        "prefix: {} ASCII digits (max payload {} bytes)",
        pipeframe_frame::PREFIX_LEN,
        pipeframe_frame::MAX_FRAMED_PAYLOAD
    );

    Ok(SUCCESS)
}
