use oriwork_frame::FrameConfig;
use oriwork_jobs::Dispatcher;
use oriwork_pool::run_stdio;

use crate::exit::{frame_error, CliResult, SUCCESS};

/// Serve frames on stdin/stdout until the parent closes stdin.
pub fn run() -> CliResult<i32> {
    run_stdio(&Dispatcher::default(), FrameConfig::default())
        .map_err(|err| frame_error("worker stopped", err))?;
    Ok(SUCCESS)
}
