use oriwork_jobs::Secp256k1Backend;
use serde::Serialize;

use crate::cmd::{Context, EcsignArgs, HexBytes};
use crate::exit::{pool_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::print_record;

#[derive(Serialize)]
struct EcsignOutput {
    msg: String,
    public_key: String,
    signature: String,
}

pub fn run(args: EcsignArgs, ctx: &Context) -> CliResult<i32> {
    let HexBytes(key) = args.key;
    let HexBytes(msg) = args.msg;
    let public_key = Secp256k1Backend::new()
        .public_key(&key)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid --key: {err}")))?;

    let runtime = ctx.runtime()?;
    let signed = runtime.block_on(async {
        let pool = ctx.start_pool()?;
        let signed = pool.ec_sign(msg.clone(), key).await;
        pool.shutdown().await;
        signed.map_err(|err| pool_error("ecsign failed", err))
    })?;

    let out = EcsignOutput {
        msg: hex::encode(&msg),
        public_key: hex::encode(&public_key),
        signature: hex::encode(&signed.signature),
    };
    print_record(&out, ctx.format);
    Ok(SUCCESS)
}
