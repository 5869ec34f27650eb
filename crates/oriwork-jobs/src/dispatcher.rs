use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use bytes::Bytes;
use oriwork_frame::{command_name, JobFrame};
use oriwork_packet::{
    CheckInputResultPacket, CheckResultPacket, Coin, CoinView, EcSignResultPacket,
    EcVerifyResultPacket, ErrorResultPacket, FaultCode, KeyRing, PacketError, RequestPacket,
    ResultPacket, SighashType, SignInputResultPacket, SignResultPacket, Transaction, VerifyFlags,
};

use crate::backend::Collaborators;
use crate::error::{JobError, Result};

/// Routes decoded requests to their handlers.
///
/// Dispatch keeps no state between calls; one instance serves a worker for
/// its whole life.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    collaborators: Collaborators,
}

impl Dispatcher {
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Execute a request. Faults become an `ErrorResult`; this never fails.
    ///
    /// A panicking collaborator is caught here and reported as an `Internal`
    /// fault, so the worker keeps serving.
    pub fn execute(&self, request: RequestPacket) -> ResultPacket {
        let command = request.command_code();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handle(request)))
            .unwrap_or_else(|payload| Err(JobError::Internal(panic_message(payload.as_ref()))));
        match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::debug!(
                    command = command_name(command),
                    code = %err.fault_code(),
                    error = %err,
                    "job faulted"
                );
                ErrorResultPacket::new(command, err.fault_code(), err.to_string()).into()
            }
        }
    }

    /// Decode and execute one request frame.
    pub fn execute_frame(&self, frame: &JobFrame) -> ResultPacket {
        match RequestPacket::from_frame(frame) {
            Ok(request) => self.execute(request),
            Err(PacketError::UnknownCommand(code)) => {
                tracing::warn!(job_id = frame.job_id, command = code, "unknown command");
                ErrorResultPacket::new(
                    code,
                    FaultCode::UnknownCommand,
                    format!("unknown command {code:#04x}"),
                )
                .into()
            }
            Err(err) => {
                tracing::warn!(
                    job_id = frame.job_id,
                    command = command_name(frame.command),
                    error = %err,
                    "malformed request payload"
                );
                ErrorResultPacket::new(frame.command, FaultCode::MalformedPayload, err.to_string())
                    .into()
            }
        }
    }

    /// Run the handler for `request`.
    pub fn handle(&self, request: RequestPacket) -> Result<ResultPacket> {
        match request {
            RequestPacket::Check(p) => self.check(&p.tx, &p.view, p.flags).map(Into::into),
            RequestPacket::CheckInput(p) => self
                .check_input(&p.tx, p.index, &p.coin, p.flags)
                .map(Into::into),
            RequestPacket::Sign(p) => self.sign(p.tx, &p.view, &p.rings, p.sighash).map(Into::into),
            RequestPacket::SignInput(p) => self
                .sign_input(p.tx, p.index, &p.coin, &p.ring, p.sighash)
                .map(Into::into),
            RequestPacket::EcVerify(p) => Ok(self.ec_verify(&p.msg, &p.sig, &p.key).into()),
            RequestPacket::EcSign(p) => self.ec_sign(&p.msg, &p.key).map(Into::into),
        }
    }

    pub fn check(
        &self,
        tx: &Transaction,
        view: &CoinView,
        flags: VerifyFlags,
    ) -> Result<CheckResultPacket> {
        match self.collaborators.verifier.validate(tx, view, flags) {
            Ok(()) => Ok(CheckResultPacket::ok()),
            Err(JobError::Script(fault)) => Ok(CheckResultPacket { fault: Some(fault) }),
            Err(err) => Err(err),
        }
    }

    pub fn check_input(
        &self,
        tx: &Transaction,
        index: u32,
        coin: &Coin,
        flags: VerifyFlags,
    ) -> Result<CheckInputResultPacket> {
        let fault = match self
            .collaborators
            .verifier
            .validate_input(tx, index, coin, flags)
        {
            Ok(()) => None,
            Err(JobError::Script(fault)) => Some(fault),
            Err(err) => return Err(err),
        };
        Ok(CheckInputResultPacket { index, fault })
    }

    pub fn sign(
        &self,
        mut tx: Transaction,
        view: &CoinView,
        rings: &[KeyRing],
        sighash: SighashType,
    ) -> Result<SignResultPacket> {
        let signed = self
            .collaborators
            .signer
            .sign(&mut tx, view, rings, sighash)?;
        Ok(SignResultPacket { signed, tx })
    }

    pub fn sign_input(
        &self,
        mut tx: Transaction,
        index: u32,
        coin: &Coin,
        ring: &KeyRing,
        sighash: SighashType,
    ) -> Result<SignInputResultPacket> {
        let succeeded = self
            .collaborators
            .signer
            .sign_input(&mut tx, index, coin, ring, sighash)?;
        Ok(SignInputResultPacket {
            index,
            succeeded,
            tx,
        })
    }

    pub fn ec_verify(&self, msg: &[u8], sig: &[u8], key: &[u8]) -> EcVerifyResultPacket {
        EcVerifyResultPacket {
            valid: self.collaborators.ecdsa.verify(msg, sig, key),
        }
    }

    pub fn ec_sign(&self, msg: &[u8], key: &[u8]) -> Result<EcSignResultPacket> {
        let signature: Bytes = self.collaborators.ecdsa.sign(msg, key)?;
        Ok(EcSignResultPacket { signature })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    format!("handler panicked: {detail}")
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Collaborators::default())
    }
}
