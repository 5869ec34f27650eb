use oriwork_packet::{FaultCode, PacketError, ScriptFault};

/// Errors raised while executing a job.
///
/// `Script` is a validation outcome, reported inside check results. Every
/// other variant is a fault and becomes an `ErrorResult`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Script or signature validation failed.
    #[error("script validation failed: {0}")]
    Script(ScriptFault),

    /// Input or output index past the end of the transaction.
    #[error("index {index} out of range ({len} available)")]
    IndexOutOfRange { index: u32, len: usize },

    /// Private key bytes are not a valid secp256k1 scalar.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Request data the handler cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payload decoding failed.
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// The fault code reported when this error escapes a handler.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            Self::Script(_) | Self::InvalidInput(_) => FaultCode::InvalidInput,
            Self::IndexOutOfRange { .. } => FaultCode::IndexOutOfRange,
            Self::InvalidPrivateKey(_) => FaultCode::InvalidPrivateKey,
            Self::Packet(PacketError::UnknownCommand(_)) => FaultCode::UnknownCommand,
            Self::Packet(_) => FaultCode::MalformedPayload,
            Self::Internal(_) => FaultCode::Internal,
        }
    }
}

impl From<ScriptFault> for JobError {
    fn from(fault: ScriptFault) -> Self {
        Self::Script(fault)
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
