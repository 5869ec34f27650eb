//! Request packets: what a caller asks a worker to do.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use oriwork_frame::command::{CHECK, CHECKINPUT, ECSIGN, ECVERIFY, SIGN, SIGNINPUT};
use oriwork_frame::{encode_with, JobFrame};

use crate::encoding::{
    decode_exact, list_size, read_list, read_u32, read_var_bytes, var_bytes_size, write_list,
    write_var_bytes, Encode,
};
use crate::error::{PacketError, Result};
use crate::packet::Packet;
use crate::tx::{Coin, CoinView, KeyRing, SighashType, Transaction, VerifyFlags};

/// Verify every input of `tx` against the coins in `view`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPacket {
    pub tx: Transaction,
    pub view: CoinView,
    pub flags: VerifyFlags,
}

impl Encode for CheckPacket {
    fn encoded_size(&self) -> usize {
        self.tx.encoded_size() + self.view.encoded_size() + 4
    }

    fn write(&self, dst: &mut BytesMut) {
        self.tx.write(dst);
        self.view.write(dst);
        dst.put_u32_le(self.flags.bits());
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tx: Transaction::read(src)?,
            view: CoinView::read(src)?,
            flags: VerifyFlags(read_u32(src)?),
        })
    }
}

impl Packet for CheckPacket {
    const COMMAND: u8 = CHECK;
}

/// Verify one input of `tx` spending `coin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInputPacket {
    pub tx: Transaction,
    pub index: u32,
    pub coin: Coin,
    pub flags: VerifyFlags,
}

impl Encode for CheckInputPacket {
    fn encoded_size(&self) -> usize {
        self.tx.encoded_size() + 4 + self.coin.encoded_size() + 4
    }

    fn write(&self, dst: &mut BytesMut) {
        self.tx.write(dst);
        dst.put_u32_le(self.index);
        self.coin.write(dst);
        dst.put_u32_le(self.flags.bits());
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tx: Transaction::read(src)?,
            index: read_u32(src)?,
            coin: Coin::read(src)?,
            flags: VerifyFlags(read_u32(src)?),
        })
    }
}

impl Packet for CheckInputPacket {
    const COMMAND: u8 = CHECKINPUT;
}

/// Sign every input of `tx` that one of `rings` can sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignPacket {
    pub tx: Transaction,
    /// Coins for the inputs being signed.
    pub view: CoinView,
    pub rings: Vec<KeyRing>,
    pub sighash: SighashType,
}

impl Encode for SignPacket {
    fn encoded_size(&self) -> usize {
        self.tx.encoded_size() + self.view.encoded_size() + list_size(&self.rings) + 4
    }

    fn write(&self, dst: &mut BytesMut) {
        self.tx.write(dst);
        self.view.write(dst);
        write_list(dst, &self.rings);
        dst.put_u32_le(self.sighash.0);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tx: Transaction::read(src)?,
            view: CoinView::read(src)?,
            rings: read_list(src)?,
            sighash: SighashType(read_u32(src)?),
        })
    }
}

impl Packet for SignPacket {
    const COMMAND: u8 = SIGN;
}

/// Sign input `index` of `tx` with `ring`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInputPacket {
    pub tx: Transaction,
    pub index: u32,
    pub coin: Coin,
    pub ring: KeyRing,
    pub sighash: SighashType,
}

impl Encode for SignInputPacket {
    fn encoded_size(&self) -> usize {
        self.tx.encoded_size() + 4 + self.coin.encoded_size() + self.ring.encoded_size() + 4
    }

    fn write(&self, dst: &mut BytesMut) {
        self.tx.write(dst);
        dst.put_u32_le(self.index);
        self.coin.write(dst);
        self.ring.write(dst);
        dst.put_u32_le(self.sighash.0);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            tx: Transaction::read(src)?,
            index: read_u32(src)?,
            coin: Coin::read(src)?,
            ring: KeyRing::read(src)?,
            sighash: SighashType(read_u32(src)?),
        })
    }
}

impl Packet for SignInputPacket {
    const COMMAND: u8 = SIGNINPUT;
}

/// Verify a DER signature over a message digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcVerifyPacket {
    pub msg: Bytes,
    pub sig: Bytes,
    pub key: Bytes,
}

impl Encode for EcVerifyPacket {
    fn encoded_size(&self) -> usize {
        var_bytes_size(&self.msg) + var_bytes_size(&self.sig) + var_bytes_size(&self.key)
    }

    fn write(&self, dst: &mut BytesMut) {
        write_var_bytes(dst, &self.msg);
        write_var_bytes(dst, &self.sig);
        write_var_bytes(dst, &self.key);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            msg: read_var_bytes(src)?,
            sig: read_var_bytes(src)?,
            key: read_var_bytes(src)?,
        })
    }
}

impl Packet for EcVerifyPacket {
    const COMMAND: u8 = ECVERIFY;
}

/// Sign a message digest with a raw private key.
#[derive(Clone, PartialEq, Eq)]
pub struct EcSignPacket {
    pub msg: Bytes,
    pub key: Bytes,
}

impl fmt::Debug for EcSignPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcSignPacket")
            .field("msg", &self.msg)
            .field("key", &format_args!("<redacted:{} bytes>", self.key.len()))
            .finish()
    }
}

impl Encode for EcSignPacket {
    fn encoded_size(&self) -> usize {
        var_bytes_size(&self.msg) + var_bytes_size(&self.key)
    }

    fn write(&self, dst: &mut BytesMut) {
        write_var_bytes(dst, &self.msg);
        write_var_bytes(dst, &self.key);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            msg: read_var_bytes(src)?,
            key: read_var_bytes(src)?,
        })
    }
}

impl Packet for EcSignPacket {
    const COMMAND: u8 = ECSIGN;
}

/// Any job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPacket {
    Check(CheckPacket),
    CheckInput(CheckInputPacket),
    Sign(SignPacket),
    SignInput(SignInputPacket),
    EcVerify(EcVerifyPacket),
    EcSign(EcSignPacket),
}

impl RequestPacket {
    pub fn command_code(&self) -> u8 {
        match self {
            Self::Check(p) => p.command_code(),
            Self::CheckInput(p) => p.command_code(),
            Self::Sign(p) => p.command_code(),
            Self::SignInput(p) => p.command_code(),
            Self::EcVerify(p) => p.command_code(),
            Self::EcSign(p) => p.command_code(),
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
        }
    }

    /// Decode a request payload for `command`.
    pub fn decode(command: u8, payload: Bytes) -> Result<Self> {
        Ok(match command {
            CHECK => Self::Check(decode_exact(payload)?),
            CHECKINPUT => Self::CheckInput(decode_exact(payload)?),
            SIGN => Self::Sign(decode_exact(payload)?),
            SIGNINPUT => Self::SignInput(decode_exact(payload)?),
            ECVERIFY => Self::EcVerify(decode_exact(payload)?),
            ECSIGN => Self::EcSign(decode_exact(payload)?),
            other => return Err(PacketError::UnknownCommand(other)),
        })
    }

    pub fn from_frame(frame: &JobFrame) -> Result<Self> {
        Self::decode(frame.command, frame.payload.clone())
    }

    /// Append a complete frame carrying this request to `dst`.
    pub fn encode_frame(&self, job_id: u32, dst: &mut BytesMut) -> Result<()> {
        encode_with(job_id, self.command_code(), self.encoded_size(), dst, |buf| {
            self.write(buf)
        })?;
        Ok(())
    }

    /// Build a frame carrying this request.
    pub fn to_frame(&self, job_id: u32) -> JobFrame {
        let mut payload = BytesMut::with_capacity(self.encoded_size());
        self.write(&mut payload);
        JobFrame::new(job_id, self.command_code(), payload.freeze())
    }
}

impl From<CheckPacket> for RequestPacket {
    fn from(p: CheckPacket) -> Self {
        Self::Check(p)
    }
}

impl From<CheckInputPacket> for RequestPacket {
    fn from(p: CheckInputPacket) -> Self {
        Self::CheckInput(p)
    }
}

impl From<SignPacket> for RequestPacket {
    fn from(p: SignPacket) -> Self {
        Self::Sign(p)
    }
}

impl From<SignInputPacket> for RequestPacket {
    fn from(p: SignInputPacket) -> Self {
        Self::SignInput(p)
    }
}

impl From<EcVerifyPacket> for RequestPacket {
    fn from(p: EcVerifyPacket) -> Self {
        Self::EcVerify(p)
    }
}

impl From<EcSignPacket> for RequestPacket {
    fn from(p: EcSignPacket) -> Self {
        Self::EcSign(p)
    }
}
