use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("oriwork {}", env!("CARGO_PKG_VERSION"));
    if !args.extended {
        return Ok(SUCCESS);
    }

    println!("target: {}", option_env!("ORIWORK_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("frame_overhead: {}", oriwork_frame::FRAME_OVERHEAD);
    println!("max_payload: {}", oriwork_frame::DEFAULT_MAX_PAYLOAD);
    println!("default_workers: {}", oriwork_pool::default_size());
    println!("worker_label: {}", oriwork_pool::PROCESS_LABEL);
    Ok(SUCCESS)
}
