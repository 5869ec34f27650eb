mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, Context, PoolArgs};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "oriwork", version, about = "Framed worker pool for transaction jobs")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    pool: PoolArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        pool: cli.pool,
        log_format: cli.log_format,
        log_level: cli.log_level,
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cmd::{HexBytes, WorkerMode};

    #[test]
    fn parses_ecsign_with_pool_flags() {
        let cli = Cli::try_parse_from([
            "oriwork",
            "ecsign",
            "--key",
            "0x0101",
            "--msg",
            "0202",
            "--workers",
            "3",
            "--mode",
            "process",
            "--timeout",
            "250ms",
        ])
        .expect("ecsign args should parse");

        assert_eq!(cli.pool.workers, Some(3));
        assert!(matches!(cli.pool.mode, WorkerMode::Process));
        assert_eq!(cli.pool.timeout, Some(Duration::from_millis(250)));
        match cli.command {
            Command::Ecsign(args) => {
                assert_eq!(args.key, HexBytes(vec![0x01, 0x01]));
                assert_eq!(args.msg, HexBytes(vec![0x02, 0x02]));
            }
            other => panic!("expected ecsign, got {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_hex() {
        let err = Cli::try_parse_from(["oriwork", "ecsign", "--key", "zz", "--msg", "00"])
            .expect_err("bad hex should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn ecverify_requires_signature() {
        let err = Cli::try_parse_from(["oriwork", "ecverify", "--key", "00", "--msg", "00"])
            .expect_err("missing --sig should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_worker_subcommand() {
        let cli = Cli::try_parse_from(["oriwork", "--log-level", "error", "worker"])
            .expect("worker args should parse");
        assert!(matches!(cli.command, Command::Worker));
        assert!(matches!(cli.pool.mode, WorkerMode::Thread));
    }
}
