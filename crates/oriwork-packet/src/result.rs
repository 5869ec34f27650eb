//! Result packets: what a worker sends back for each request.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use oriwork_frame::command::{
    CHECKINPUTRESULT, CHECKRESULT, ECSIGNRESULT, ECVERIFYRESULT, ERRORRESULT, SIGNINPUTRESULT,
    SIGNRESULT,
};
use oriwork_frame::{encode_with, JobFrame};

use crate::encoding::{
    decode_exact, read_bool, read_u32, read_u8, read_var_bytes, read_var_string,
    var_bytes_size, var_string_size, write_bool, write_var_bytes, write_var_string, Encode,
};
use crate::error::{PacketError, Result};
use crate::packet::Packet;
use crate::script::ScriptFault;
use crate::tx::Transaction;

fn fault_size(fault: &Option<ScriptFault>) -> usize {
    1 + fault.as_ref().map_or(0, Encode::encoded_size)
}

fn write_fault(dst: &mut BytesMut, fault: &Option<ScriptFault>) {
    write_bool(dst, fault.is_some());
    if let Some(fault) = fault {
        fault.write(dst);
    }
}

fn read_fault(src: &mut Bytes) -> Result<Option<ScriptFault>> {
    if read_bool(src)? {
        ScriptFault::read(src).map(Some)
    } else {
        Ok(None)
    }
}

/// Outcome of a full transaction check. `fault` is `None` when every input verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResultPacket {
    pub fault: Option<ScriptFault>,
}

impl CheckResultPacket {
    pub fn ok() -> Self {
        Self { fault: None }
    }

    pub fn is_valid(&self) -> bool {
        self.fault.is_none()
    }
}

impl Encode for CheckResultPacket {
    fn encoded_size(&self) -> usize {
        fault_size(&self.fault)
    }

    fn write(&self, dst: &mut BytesMut) {
        write_fault(dst, &self.fault);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            fault: read_fault(src)?,
        })
    }
}

impl Packet for CheckResultPacket {
    const COMMAND: u8 = CHECKRESULT;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInputResultPacket {
    pub index: u32,
    pub fault: Option<ScriptFault>,
}

impl CheckInputResultPacket {
    pub fn is_valid(&self) -> bool {
        self.fault.is_none()
    }
}

impl Encode for CheckInputResultPacket {
    fn encoded_size(&self) -> usize {
        4 + fault_size(&self.fault)
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.index);
        write_fault(dst, &self.fault);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            index: read_u32(src)?,
            fault: read_fault(src)?,
        })
    }
}

impl Packet for CheckInputResultPacket {
    const COMMAND: u8 = CHECKINPUTRESULT;
}

/// The transaction after signing, and how many inputs were signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignResultPacket {
    pub signed: u32,
    pub tx: Transaction,
}

impl Encode for SignResultPacket {
    fn encoded_size(&self) -> usize {
        4 + self.tx.encoded_size()
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.signed);
        self.tx.write(dst);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            signed: read_u32(src)?,
            tx: Transaction::read(src)?,
        })
    }
}

impl Packet for SignResultPacket {
    const COMMAND: u8 = SIGNRESULT;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInputResultPacket {
    pub index: u32,
    pub succeeded: bool,
    pub tx: Transaction,
}

impl Encode for SignInputResultPacket {
    fn encoded_size(&self) -> usize {
        4 + 1 + self.tx.encoded_size()
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.index);
        write_bool(dst, self.succeeded);
        self.tx.write(dst);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            index: read_u32(src)?,
            succeeded: read_bool(src)?,
            tx: Transaction::read(src)?,
        })
    }
}

impl Packet for SignInputResultPacket {
    const COMMAND: u8 = SIGNINPUTRESULT;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcVerifyResultPacket {
    pub valid: bool,
}

impl Encode for EcVerifyResultPacket {
    fn encoded_size(&self) -> usize {
        1
    }

    fn write(&self, dst: &mut BytesMut) {
        write_bool(dst, self.valid);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            valid: read_bool(src)?,
        })
    }
}

impl Packet for EcVerifyResultPacket {
    const COMMAND: u8 = ECVERIFYRESULT;
}

/// A DER-encoded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcSignResultPacket {
    pub signature: Bytes,
}

impl Encode for EcSignResultPacket {
    fn encoded_size(&self) -> usize {
        var_bytes_size(&self.signature)
    }

    fn write(&self, dst: &mut BytesMut) {
        write_var_bytes(dst, &self.signature);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            signature: read_var_bytes(src)?,
        })
    }
}

impl Packet for EcSignResultPacket {
    const COMMAND: u8 = ECSIGNRESULT;
}

/// Why a job produced an `ErrorResult` instead of its normal result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FaultCode {
    /// The command byte is not a request.
    UnknownCommand = 1,
    /// The payload did not decode as the command's packet.
    MalformedPayload = 2,
    IndexOutOfRange = 3,
    InvalidPrivateKey = 4,
    /// Request data the handler cannot work with.
    InvalidInput = 5,
    Internal = 6,
}

impl FaultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownCommand => "UNKNOWN_COMMAND",
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::IndexOutOfRange => "INDEX_OUT_OF_RANGE",
            Self::InvalidPrivateKey => "INVALID_PRIVATE_KEY",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Internal => "INTERNAL",
        }
    }
}

impl TryFrom<u8> for FaultCode {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            1 => Self::UnknownCommand,
            2 => Self::MalformedPayload,
            3 => Self::IndexOutOfRange,
            4 => Self::InvalidPrivateKey,
            5 => Self::InvalidInput,
            6 => Self::Internal,
            other => {
                return Err(PacketError::InvalidEnum {
                    field: "fault code",
                    value: u32::from(other),
                })
            }
        })
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unexpected outcome for any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResultPacket {
    /// The command byte of the request that faulted.
    pub command: u8,
    pub code: Option<FaultCode>,
    pub message: String,
}

impl ErrorResultPacket {
    pub fn new(command: u8, code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            command,
            code: Some(code),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorResultPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = oriwork_frame::command_name(self.command);
        match self.code {
            Some(code) => write!(f, "{command} failed ({code}): {}", self.message),
            None => write!(f, "{command} failed: {}", self.message),
        }
    }
}

impl Encode for ErrorResultPacket {
    fn encoded_size(&self) -> usize {
        1 + 1 + var_string_size(&self.message)
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u8(self.command);
        // Zero means no structured code.
        dst.put_u8(self.code.map_or(0, |code| code as u8));
        write_var_string(dst, &self.message);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        let command = read_u8(src)?;
        let code = match read_u8(src)? {
            0 => None,
            raw => Some(FaultCode::try_from(raw)?),
        };
        Ok(Self {
            command,
            code,
            message: read_var_string(src)?,
        })
    }
}

impl Packet for ErrorResultPacket {
    const COMMAND: u8 = ERRORRESULT;
}

/// Any job result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPacket {
    Check(CheckResultPacket),
    CheckInput(CheckInputResultPacket),
    Sign(SignResultPacket),
    SignInput(SignInputResultPacket),
    EcVerify(EcVerifyResultPacket),
    EcSign(EcSignResultPacket),
    Error(ErrorResultPacket),
}

impl ResultPacket {
    pub fn command_code(&self) -> u8 {
        match self {
            Self::Check(p) => p.command_code(),
            Self::CheckInput(p) => p.command_code(),
            Self::Sign(p) => p.command_code(),
            Self::SignInput(p) => p.command_code(),
            Self::EcVerify(p) => p.command_code(),
            Self::EcSign(p) => p.command_code(),
            Self::Error(p) => p.command_code(),
        }
    }

    pub fn encoded_size(&self) -> usize {
        match self {
            Self::Check(p) => p.encoded_size(),
            Self::CheckInput(p) => p.encoded_size(),
            Self::Sign(p) => p.encoded_size(),
            Self::SignInput(p) => p.encoded_size(),
            Self::EcVerify(p) => p.encoded_size(),
            Self::EcSign(p) => p.encoded_size(),
            Self::Error(p) => p.encoded_size(),
        }
    }

    pub fn write(&self, dst: &mut BytesMut) {
        match self {
            Self::Check(p) => p.write(dst),
            Self::CheckInput(p) => p.write(dst),
            Self::Sign(p) => p.write(dst),
            Self::SignInput(p) => p.write(dst),
            Self::EcVerify(p) => p.write(dst),
            Self::EcSign(p) => p.write(dst),
            Self::Error(p) => p.write(dst),
        }
    }

    /// Decode a result payload for `command`.
    pub fn decode(command: u8, payload: Bytes) -> Result<Self> {
        Ok(match command {
            CHECKRESULT => Self::Check(decode_exact(payload)?),
            CHECKINPUTRESULT => Self::CheckInput(decode_exact(payload)?),
            SIGNRESULT => Self::Sign(decode_exact(payload)?),
            SIGNINPUTRESULT => Self::SignInput(decode_exact(payload)?),
            ECVERIFYRESULT => Self::EcVerify(decode_exact(payload)?),
            ECSIGNRESULT => Self::EcSign(decode_exact(payload)?),
            ERRORRESULT => Self::Error(decode_exact(payload)?),
            other => return Err(PacketError::UnknownCommand(other)),
        })
    }

    pub fn from_frame(frame: &JobFrame) -> Result<Self> {
        Self::decode(frame.command, frame.payload.clone())
    }

    /// Append a complete frame carrying this result to `dst`.
    pub fn encode_frame(&self, job_id: u32, dst: &mut BytesMut) -> Result<()> {
        encode_with(job_id, self.command_code(), self.encoded_size(), dst, |buf| {
            self.write(buf)
        })?;
        Ok(())
    }

    pub fn to_frame(&self, job_id: u32) -> JobFrame {
        let mut payload = BytesMut::with_capacity(self.encoded_size());
        self.write(&mut payload);
        JobFrame::new(job_id, self.command_code(), payload.freeze())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Short name of the variant, for logs and mismatch errors.
    pub fn kind(&self) -> &'static str {
        oriwork_frame::command_name(self.command_code())
    }
}

impl From<CheckResultPacket> for ResultPacket {
    fn from(p: CheckResultPacket) -> Self {
        Self::Check(p)
    }
}

impl From<CheckInputResultPacket> for ResultPacket {
    fn from(p: CheckInputResultPacket) -> Self {
        Self::CheckInput(p)
    }
}

impl From<SignResultPacket> for ResultPacket {
    fn from(p: SignResultPacket) -> Self {
        Self::Sign(p)
    }
}

impl From<SignInputResultPacket> for ResultPacket {
    fn from(p: SignInputResultPacket) -> Self {
        Self::SignInput(p)
    }
}

impl From<EcVerifyResultPacket> for ResultPacket {
    fn from(p: EcVerifyResultPacket) -> Self {
        Self::EcVerify(p)
    }
}

impl From<EcSignResultPacket> for ResultPacket {
    fn from(p: EcSignResultPacket) -> Self {
        Self::EcSign(p)
    }
}

impl From<ErrorResultPacket> for ResultPacket {
    fn from(p: ErrorResultPacket) -> Self {
        Self::Error(p)
    }
}
