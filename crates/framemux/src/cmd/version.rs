use framemux_frame::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_FRAME_SIZE};
use framemux_mux::{MAX_FPS, MAX_INPUTS};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("framemux {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: framemux");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FRAMEMUX_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("FRAMEMUX_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("limits: inputs<={MAX_INPUTS}, fps<={MAX_FPS}");
    println!(
        "defaults: max_frame={DEFAULT_MAX_FRAME_SIZE}B, buffer={DEFAULT_BUFFER_CAPACITY}B"
    );

    Ok(SUCCESS)
}
