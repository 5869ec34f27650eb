#![cfg(all(unix, feature = "cli"))]

use std::io::{Read, Write};
use std::process::{Command, Output, Stdio};

use oriwork_frame::FrameBuffer;
use oriwork_packet::{encode_request, EcSignPacket, RequestPacket, ResultPacket};

const KEY_A: &str = "4242424242424242424242424242424242424242424242424242424242424242";
const KEY_B: &str = "0707070707070707070707070707070707070707070707070707070707070707";
const DIGEST: &str = "a1a2a3a4a5a6a7a8a9aaabacadaeafb0b1b2b3b4b5b6b7b8b9babbbcbdbebfc0";

fn oriwork(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_oriwork"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("oriwork should run")
}

fn json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("stdout should have a line");
    serde_json::from_str(line).expect("stdout should be JSON")
}

fn sign(key: &str, extra: &[&str]) -> serde_json::Value {
    let mut args = vec!["ecsign", "--key", key, "--msg", DIGEST];
    args.extend_from_slice(extra);
    let output = oriwork(&args);
    assert!(
        output.status.success(),
        "ecsign failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    json(&output)
}

fn field<'a>(value: &'a serde_json::Value, name: &str) -> &'a str {
    value[name].as_str().expect("field should be a string")
}

#[test]
fn ecsign_then_ecverify_with_right_and_wrong_key() {
    let signed = sign(KEY_A, &["--workers", "2"]);
    let other = sign(KEY_B, &["--workers", "1"]);
    assert_eq!(field(&signed, "msg"), DIGEST);

    let good = oriwork(&[
        "ecverify",
        "--key",
        field(&signed, "public_key"),
        "--msg",
        DIGEST,
        "--sig",
        field(&signed, "signature"),
    ]);
    assert_eq!(good.status.code(), Some(0));
    assert_eq!(json(&good)["valid"], true);

    let wrong = oriwork(&[
        "ecverify",
        "--key",
        field(&other, "public_key"),
        "--msg",
        DIGEST,
        "--sig",
        field(&signed, "signature"),
    ]);
    assert_eq!(wrong.status.code(), Some(1));
    assert_eq!(json(&wrong)["valid"], false);
}

#[test]
fn process_mode_matches_thread_mode() {
    // Signatures are deterministic, so both modes must agree.
    let threaded = sign(KEY_A, &["--workers", "1"]);
    let processes = sign(KEY_A, &["--workers", "2", "--mode", "process"]);
    assert_eq!(field(&threaded, "signature"), field(&processes, "signature"));
}

#[test]
fn ecsign_with_short_key_is_data_invalid() {
    let output = oriwork(&["ecsign", "--key", "0101", "--msg", DIGEST]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid --key"));
}

#[test]
fn bench_reports_no_failures() {
    let output = oriwork(&["--workers", "2", "bench", "--jobs", "24"]);
    assert!(
        output.status.success(),
        "bench failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report = json(&output);
    assert_eq!(report["jobs"], 24);
    assert_eq!(report["signed"], 24);
    assert_eq!(report["verified"], 24);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["workers"], 2);
    assert_eq!(report["mode"], "thread");
}

#[test]
fn worker_serves_frames_on_stdio_and_exits_on_eof() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_oriwork"))
        .args(["--log-level", "error", "worker"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("worker should start");

    let request: RequestPacket = EcSignPacket {
        msg: vec![0x11; 32].into(),
        key: vec![0x42; 32].into(),
    }
    .into();
    let frame = encode_request(77, &request).expect("request should encode");
    {
        let mut stdin = child.stdin.take().expect("stdin should be piped");
        stdin.write_all(&frame).expect("frame should write");
        // Dropping stdin closes the channel.
    }

    let mut raw = Vec::new();
    child
        .stdout
        .take()
        .expect("stdout should be piped")
        .read_to_end(&mut raw)
        .expect("stdout should read");
    let status = child.wait().expect("worker should exit");
    assert!(status.success());

    let mut buffer = FrameBuffer::new();
    buffer.extend(&raw);
    let frame = buffer
        .next_frame()
        .expect("output should frame")
        .expect("one result frame");
    assert_eq!(frame.job_id, 77);
    assert!(matches!(
        ResultPacket::from_frame(&frame).expect("result should decode"),
        ResultPacket::EcSign(_)
    ));
    assert!(buffer.is_empty());
}

#[test]
fn version_prints_package_version() {
    let output = oriwork(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(&format!("oriwork {}", env!("CARGO_PKG_VERSION"))));
}
