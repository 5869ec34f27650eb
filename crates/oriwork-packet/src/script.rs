use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::encoding::{
    read_u32, read_u8, read_var_string, var_string_size, write_var_string, Encode,
};
use crate::error::{PacketError, Result};

const NO_INDEX: u32 = u32::MAX;

/// Category of a script validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScriptFaultCode {
    UnknownError = 0,
    /// Signature missing or does not verify.
    EvalFalse = 1,
    /// Signature is not strict DER.
    SigDer = 2,
    /// Unknown sighash type under `STRICTENC`.
    SigHashType = 3,
    /// High-S signature under `LOW_S`.
    SigHighS = 4,
    /// Coin public key is not a valid SEC1 encoding.
    PubkeyType = 5,
}

impl ScriptFaultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::EvalFalse => "EVAL_FALSE",
            Self::SigDer => "SIG_DER",
            Self::SigHashType => "SIG_HASHTYPE",
            Self::SigHighS => "SIG_HIGH_S",
            Self::PubkeyType => "PUBKEYTYPE",
        }
    }
}

impl TryFrom<u8> for ScriptFaultCode {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Self::UnknownError,
            1 => Self::EvalFalse,
            2 => Self::SigDer,
            3 => Self::SigHashType,
            4 => Self::SigHighS,
            5 => Self::PubkeyType,
            other => {
                return Err(PacketError::InvalidEnum {
                    field: "script fault code",
                    value: u32::from(other),
                })
            }
        })
    }
}

impl fmt::Display for ScriptFaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured reason a transaction or input failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFault {
    pub code: ScriptFaultCode,
    pub message: String,
    /// Index of the failing input, when known.
    pub index: Option<u32>,
}

impl ScriptFault {
    pub fn new(code: ScriptFaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            index: None,
        }
    }

    pub fn at_input(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{} (input {}): {}", self.code, index, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ScriptFault {}

impl Encode for ScriptFault {
    fn encoded_size(&self) -> usize {
        1 + 4 + var_string_size(&self.message)
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u8(self.code as u8);
        dst.put_u32_le(self.index.unwrap_or(NO_INDEX));
        write_var_string(dst, &self.message);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        let code = ScriptFaultCode::try_from(read_u8(src)?)?;
        let index = read_u32(src)?;
        let message = read_var_string(src)?;
        Ok(Self {
            code,
            message,
            index: (index != NO_INDEX).then_some(index),
        })
    }
}
