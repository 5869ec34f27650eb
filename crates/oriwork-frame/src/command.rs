//! Job command codes.
//!
//! Request codes are odd, their results are the following even code.
//! `ERRORRESULT` answers any request whose execution faulted.

/// Generic faulted outcome for any request.
pub const ERRORRESULT: u8 = 0x04;

/// Full transaction verification.
pub const CHECK: u8 = 0x05;
pub const CHECKRESULT: u8 = 0x06;

/// Sign every signable input of a transaction.
pub const SIGN: u8 = 0x07;
pub const SIGNRESULT: u8 = 0x08;

/// Verify a single input.
pub const CHECKINPUT: u8 = 0x09;
pub const CHECKINPUTRESULT: u8 = 0x0a;

/// Sign a single input.
pub const SIGNINPUT: u8 = 0x0b;
pub const SIGNINPUTRESULT: u8 = 0x0c;

/// Raw ECDSA verification over a message digest.
pub const ECVERIFY: u8 = 0x0d;
pub const ECVERIFYRESULT: u8 = 0x0e;

/// Raw ECDSA signing of a message digest.
pub const ECSIGN: u8 = 0x0f;
pub const ECSIGNRESULT: u8 = 0x10;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u8) -> &'static str {
    match code {
        ERRORRESULT => "ERRORRESULT",
        CHECK => "CHECK",
        CHECKRESULT => "CHECKRESULT",
        SIGN => "SIGN",
        SIGNRESULT => "SIGNRESULT",
        CHECKINPUT => "CHECKINPUT",
        CHECKINPUTRESULT => "CHECKINPUTRESULT",
        SIGNINPUT => "SIGNINPUT",
        SIGNINPUTRESULT => "SIGNINPUTRESULT",
        ECVERIFY => "ECVERIFY",
        ECVERIFYRESULT => "ECVERIFYRESULT",
        ECSIGN => "ECSIGN",
        ECSIGNRESULT => "ECSIGNRESULT",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code names a request a worker can execute.
pub fn is_request(code: u8) -> bool {
    matches!(
        code,
        CHECK | SIGN | CHECKINPUT | SIGNINPUT | ECVERIFY | ECSIGN
    )
}

/// Returns true if the code names a result a worker can send back.
pub fn is_result(code: u8) -> bool {
    matches!(
        code,
        ERRORRESULT
            | CHECKRESULT
            | SIGNRESULT
            | CHECKINPUTRESULT
            | SIGNINPUTRESULT
            | ECVERIFYRESULT
            | ECSIGNRESULT
    )
}

/// The result code that answers a request code, if it is one.
pub fn result_for(request: u8) -> Option<u8> {
    if is_request(request) {
        Some(request + 1)
    } else {
        None
    }
}
