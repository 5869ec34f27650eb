use serde::Serialize;

use crate::cmd::{Context, EcverifyArgs};
use crate::exit::{pool_error, CliResult, FAILURE, SUCCESS};
use crate::output::print_record;

#[derive(Serialize)]
struct EcverifyOutput {
    valid: bool,
}

/// Exits 0 for a valid signature and 1 otherwise.
pub fn run(args: EcverifyArgs, ctx: &Context) -> CliResult<i32> {
    let runtime = ctx.runtime()?;
    let verified = runtime.block_on(async {
        let pool = ctx.start_pool()?;
        let verified = pool.ec_verify(args.msg.0, args.sig.0, args.key.0).await;
        pool.shutdown().await;
        verified.map_err(|err| pool_error("ecverify failed", err))
    })?;

    print_record(
        &EcverifyOutput {
            valid: verified.valid,
        },
        ctx.format,
    );
    Ok(if verified.valid { SUCCESS } else { FAILURE })
}
