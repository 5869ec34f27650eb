use std::time::{Duration, Instant};

use oriwork_jobs::Secp256k1Backend;
use oriwork_packet::{EcSignPacket, EcVerifyPacket, ResultPacket};
use oriwork_pool::{JobHandle, WorkerPool};
use serde::Serialize;

use crate::cmd::{BenchArgs, Context};
use crate::exit::{CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_record, print_workers};

/// Distinct private keys cycled through by the benchmark.
const KEY_COUNT: u8 = 16;

#[derive(Serialize)]
struct BenchOutput {
    mode: &'static str,
    workers: usize,
    jobs: u32,
    signed: u32,
    verified: u32,
    failed: u32,
    sign_ms: f64,
    verify_ms: f64,
    jobs_per_sec: f64,
}

struct Phase {
    ok: u32,
    failed: u32,
    elapsed: Duration,
}

pub fn run(args: BenchArgs, ctx: &Context) -> CliResult<i32> {
    if args.jobs == 0 {
        return Err(CliError::usage("--jobs must be greater than zero"));
    }

    let backend = Secp256k1Backend::new();
    let keys: Vec<([u8; 32], Vec<u8>)> = (1..=KEY_COUNT)
        .map(|seed| {
            let secret = [seed; 32];
            backend
                .public_key(&secret)
                .map(|public| (secret, public.to_vec()))
        })
        .collect::<Result<_, _>>()
        .map_err(|err| CliError::new(INTERNAL, format!("bench key setup failed: {err}")))?;

    let runtime = ctx.runtime()?;
    let (out, stats) = runtime.block_on(async {
        let pool = ctx.start_pool()?;
        let (sign, signatures) = sign_phase(&pool, &keys, args.jobs).await;
        let verify = verify_phase(&pool, &keys, signatures).await;
        let stats = pool.stats();
        pool.shutdown().await;

        let total = sign.elapsed + verify.elapsed;
        let completed = sign.ok + verify.ok;
        let out = BenchOutput {
            mode: stats.mode,
            workers: stats.workers.len(),
            jobs: args.jobs,
            signed: sign.ok,
            verified: verify.ok,
            failed: sign.failed + verify.failed,
            sign_ms: millis(sign.elapsed),
            verify_ms: millis(verify.elapsed),
            jobs_per_sec: if total.is_zero() {
                0.0
            } else {
                (f64::from(completed) / total.as_secs_f64()).round()
            },
        };
        Ok::<_, CliError>((out, stats))
    })?;

    print_record(&out, ctx.format);
    print_workers(&stats, ctx.format);
    Ok(if out.failed == 0 { SUCCESS } else { FAILURE })
}

fn message(job: u32) -> Vec<u8> {
    let mut msg = vec![0u8; 32];
    msg[..4].copy_from_slice(&job.to_le_bytes());
    msg
}

fn key_for(job: u32) -> usize {
    job as usize % usize::from(KEY_COUNT)
}

async fn sign_phase(
    pool: &WorkerPool,
    keys: &[([u8; 32], Vec<u8>)],
    jobs: u32,
) -> (Phase, Vec<Option<Vec<u8>>>) {
    let started = Instant::now();
    let handles: Vec<JobHandle> = (0..jobs)
        .map(|job| {
            let (secret, _) = &keys[key_for(job)];
            pool.submit(
                EcSignPacket {
                    msg: message(job).into(),
                    key: secret.to_vec().into(),
                }
                .into(),
            )
        })
        .collect();

    let mut phase = Phase {
        ok: 0,
        failed: 0,
        elapsed: Duration::ZERO,
    };
    let mut signatures = Vec::with_capacity(handles.len());
    for (job, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(ResultPacket::EcSign(result)) => {
                phase.ok += 1;
                signatures.push(Some(result.signature.to_vec()));
            }
            other => {
                tracing::warn!(job, outcome = ?other, "sign job failed");
                phase.failed += 1;
                signatures.push(None);
            }
        }
    }
    phase.elapsed = started.elapsed();
    (phase, signatures)
}

async fn verify_phase(
    pool: &WorkerPool,
    keys: &[([u8; 32], Vec<u8>)],
    signatures: Vec<Option<Vec<u8>>>,
) -> Phase {
    let started = Instant::now();
    let handles: Vec<(u32, JobHandle)> = signatures
        .into_iter()
        .zip(0u32..)
        .filter_map(|(sig, job)| sig.map(|sig| (job, sig)))
        .map(|(job, sig)| {
            let (_, public) = &keys[key_for(job)];
            let handle = pool.submit(
                EcVerifyPacket {
                    msg: message(job).into(),
                    sig: sig.into(),
                    key: public.clone().into(),
                }
                .into(),
            );
            (job, handle)
        })
        .collect();

    let mut phase = Phase {
        ok: 0,
        failed: 0,
        elapsed: Duration::ZERO,
    };
    for (job, handle) in handles {
        match handle.await {
            Ok(ResultPacket::EcVerify(result)) if result.valid => phase.ok += 1,
            other => {
                tracing::warn!(job, outcome = ?other, "verify job failed");
                phase.failed += 1;
            }
        }
    }
    phase.elapsed = started.elapsed();
    phase
}

fn millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_distinct_digests() {
        assert_eq!(message(1).len(), 32);
        assert_ne!(message(1), message(2));
    }

    #[test]
    fn keys_cycle() {
        assert_eq!(key_for(0), key_for(u32::from(KEY_COUNT)));
        assert_ne!(key_for(0), key_for(1));
    }
}
