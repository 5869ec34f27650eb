use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use oriwork_pool::{PoolConfig, ProcessSpawner, ThreadSpawner, WorkerPool};
use tokio::runtime::Runtime;

use crate::exit::{io_error, pool_error, CliResult};
use crate::logging::{LogFormat, LogLevel};
use crate::output::OutputFormat;

pub mod bench;
pub mod ecsign;
pub mod ecverify;
pub mod version;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve jobs over stdin/stdout (spawned by a process-mode pool).
    Worker,
    /// Sign a 32-byte digest through the pool.
    Ecsign(EcsignArgs),
    /// Verify a DER signature through the pool.
    Ecverify(EcverifyArgs),
    /// Submit sign/verify pairs and report throughput.
    Bench(BenchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Worker => worker::run(),
        Command::Ecsign(args) => ecsign::run(args, ctx),
        Command::Ecverify(args) => ecverify::run(args, ctx),
        Command::Bench(args) => bench::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

/// Global options every pool-backed command shares.
#[derive(Debug)]
pub struct Context {
    pub format: OutputFormat,
    pub pool: PoolArgs,
    pub log_format: LogFormat,
    pub log_level: LogLevel,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum WorkerMode {
    /// Worker threads in this process.
    #[default]
    Thread,
    /// `oriwork worker` child processes.
    Process,
}

#[derive(Args, Debug, Clone)]
pub struct PoolArgs {
    /// Number of workers. Default: available parallelism.
    #[arg(long, env = "ORIWORK_WORKERS", global = true)]
    pub workers: Option<usize>,

    /// Where workers run.
    #[arg(long, value_enum, default_value_t = WorkerMode::Thread, global = true)]
    pub mode: WorkerMode,

    /// Per-job timeout (e.g. 5s, 500ms).
    #[arg(long, value_parser = parse_duration, global = true)]
    pub timeout: Option<Duration>,
}

impl Context {
    pub fn runtime(&self) -> CliResult<Runtime> {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|err| io_error("failed to start runtime", err))
    }

    /// Start a pool as configured. Call from inside the runtime.
    pub fn start_pool(&self) -> CliResult<WorkerPool> {
        let mut config = PoolConfig::default();
        if let Some(workers) = self.pool.workers {
            config = config.with_size(workers);
        }
        if let Some(timeout) = self.pool.timeout {
            config = config.with_job_timeout(timeout);
        }

        let started = match self.pool.mode {
            WorkerMode::Thread => WorkerPool::start(config, ThreadSpawner::default()),
            WorkerMode::Process => {
                let spawner = ProcessSpawner::current_exe()
                    .map_err(|err| io_error("cannot locate worker executable", err))?
                    .with_args([
                        "--log-format",
                        self.log_format.as_str(),
                        "--log-level",
                        self.log_level.as_str(),
                        "worker",
                    ]);
                WorkerPool::start(config, spawner)
            }
        };
        started.map_err(|err| pool_error("failed to start worker pool", err))
    }
}

#[derive(Args, Debug)]
pub struct EcsignArgs {
    /// 32-byte private key (hex).
    #[arg(long, value_parser = parse_hex)]
    pub key: HexBytes,
    /// 32-byte message digest (hex).
    #[arg(long, value_parser = parse_hex)]
    pub msg: HexBytes,
}

#[derive(Args, Debug)]
pub struct EcverifyArgs {
    /// Compressed or uncompressed SEC1 public key (hex).
    #[arg(long, value_parser = parse_hex)]
    pub key: HexBytes,
    /// 32-byte message digest (hex).
    #[arg(long, value_parser = parse_hex)]
    pub msg: HexBytes,
    /// DER signature (hex).
    #[arg(long, value_parser = parse_hex)]
    pub sig: HexBytes,
}

#[derive(Args, Debug)]
pub struct BenchArgs {
    /// Number of sign/verify pairs.
    #[arg(long, default_value_t = 1000)]
    pub jobs: u32,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Bytes given on the command line as hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

/// Hex bytes, with or without a `0x` prefix.
pub fn parse_hex(input: &str) -> Result<HexBytes, String> {
    let digits = input.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    hex::decode(digits)
        .map(HexBytes)
        .map_err(|err| format!("invalid hex: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("2"), Ok(Duration::from_secs(2)));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms"), Ok(Duration::from_millis(150)));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn parse_hex_accepts_prefix() {
        assert_eq!(parse_hex("0x0aff"), Ok(HexBytes(vec![0x0a, 0xff])));
        assert_eq!(parse_hex("0AFF"), Ok(HexBytes(vec![0x0a, 0xff])));
        assert!(parse_hex("abc").is_err());
    }
}
