//! The worker side of a pool channel: read a job, execute it, write its result.

use std::io::{Read, Write};

use oriwork_frame::command::ERRORRESULT;
use oriwork_frame::{command_name, FrameConfig, FrameError, FrameReader, FrameWriter};
use oriwork_jobs::Dispatcher;
use oriwork_packet::{ErrorResultPacket, FaultCode, ResultPacket};
use serde::Serialize;

/// Process label set by [`run_stdio`].
pub const PROCESS_LABEL: &str = "ori-worker";

/// Lifecycle of one pool worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Channel not yet established.
    Spawning,
    Idle,
    /// Running exactly one job.
    Busy,
    /// Finishing its current job before exiting.
    Draining,
    Dead,
}

impl WorkerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawning => "spawning",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Draining => "draining",
            Self::Dead => "dead",
        }
    }

    pub fn is_live(self) -> bool {
        !matches!(self, Self::Dead)
    }
}

/// Serve jobs until the peer closes the channel.
///
/// Strict alternation: one request frame in, one result frame out with the
/// same job id. Returns `Ok(())` on a clean close. A frame that cannot be
/// decoded at the frame layer is answered with an `ErrorResult` (when its job
/// id is known) and ends the loop with that error, since the stream can no
/// longer be trusted.
pub fn serve<R: Read, W: Write>(
    mut reader: FrameReader<R>,
    mut writer: FrameWriter<W>,
    dispatcher: &Dispatcher,
) -> oriwork_frame::Result<()> {
    let mut served = 0u64;
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => {
                tracing::debug!(served, "worker channel closed");
                return Ok(());
            }
            Err(err) => {
                reject_stream(&reader, &mut writer, &err);
                return Err(err);
            }
        };

        let result = dispatcher.execute_frame(&frame);
        tracing::trace!(
            job_id = frame.job_id,
            command = command_name(frame.command),
            result = result.kind(),
            "job executed"
        );
        write_result(&mut writer, frame.job_id, frame.command, &result)?;
        served += 1;
    }
}

fn write_result<W: Write>(
    writer: &mut FrameWriter<W>,
    job_id: u32,
    command: u8,
    result: &ResultPacket,
) -> oriwork_frame::Result<()> {
    match writer.send_with(job_id, result.command_code(), result.encoded_size(), |buf| {
        result.write(buf)
    }) {
        Err(FrameError::PayloadTooLarge { size, max }) => {
            tracing::warn!(job_id, size, max, "result exceeds frame limit");
            let fallback: ResultPacket = ErrorResultPacket::new(
                command,
                FaultCode::Internal,
                format!("result of {size} bytes exceeds the {max} byte frame limit"),
            )
            .into();
            writer.send_with(job_id, ERRORRESULT, fallback.encoded_size(), |buf| {
                fallback.write(buf)
            })
        }
        other => other,
    }
}

fn reject_stream<R: Read, W: Write>(
    reader: &FrameReader<R>,
    writer: &mut FrameWriter<W>,
    err: &FrameError,
) {
    let (job_id, command) = match err {
        FrameError::BadTerminator {
            job_id, command, ..
        } => (Some(*job_id), *command),
        FrameError::PayloadTooLarge { .. } => (
            reader.pending_job_id(),
            reader.pending_command().unwrap_or(ERRORRESULT),
        ),
        _ => (None, ERRORRESULT),
    };

    tracing::warn!(?job_id, error = %err, "undecodable frame, closing channel");
    let Some(job_id) = job_id else {
        return;
    };

    let result: ResultPacket =
        ErrorResultPacket::new(command, FaultCode::MalformedPayload, err.to_string()).into();
    if let Err(write_err) = write_result(writer, job_id, command, &result) {
        tracing::debug!(job_id, error = %write_err, "could not report frame error");
    }
}

/// Worker process entry point: serve over stdin/stdout until the parent
/// disconnects.
///
/// Stdout carries only frames; log to stderr.
pub fn run_stdio(dispatcher: &Dispatcher, config: FrameConfig) -> oriwork_frame::Result<()> {
    set_process_label(PROCESS_LABEL);
    tracing::debug!(pid = std::process::id(), "worker started");

    let reader = FrameReader::with_config(std::io::stdin().lock(), config.clone());
    let writer = FrameWriter::with_config(std::io::stdout().lock(), config);
    serve(reader, writer, dispatcher)
}

/// Set the kernel-visible process name (Linux only).
#[cfg(target_os = "linux")]
pub fn set_process_label(label: &str) {
    let Ok(name) = std::ffi::CString::new(label) else {
        return;
    };

    // SAFETY: `name` is a valid NUL-terminated string that outlives the call;
    // PR_SET_NAME copies at most 16 bytes from it.
    let rc = unsafe {
        libc::prctl(
            libc::PR_SET_NAME,
            name.as_ptr() as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
            0 as libc::c_ulong,
        )
    };
    if rc != 0 {
        tracing::debug!(label, "could not set process label");
    }
}

/// Set the kernel-visible process name (Linux only).
#[cfg(not(target_os = "linux"))]
pub fn set_process_label(_label: &str) {}
