//! Transaction data carried inside job packets.
//!
//! The model is pay-to-public-key: every output locks value to a compressed
//! SEC1 public key, and every input script is either empty (unsigned) or a
//! DER signature followed by one sighash-type byte.

use std::collections::BTreeMap;
use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};

use crate::encoding::{
    list_size, read_array, read_list, read_u32, read_u64, read_var_bytes, read_varint,
    var_bytes_size, varint_size, write_list, write_var_bytes, write_varint, Encode,
};
use crate::error::{PacketError, Result};

/// Reference to an output of a previous transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Outpoint {
    pub hash: [u8; 32],
    pub index: u32,
}

impl Outpoint {
    pub fn new(hash: [u8; 32], index: u32) -> Self {
        Self { hash, index }
    }
}

impl Encode for Outpoint {
    fn encoded_size(&self) -> usize {
        36
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.hash);
        dst.put_u32_le(self.index);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            hash: read_array(src)?,
            index: read_u32(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub prevout: Outpoint,
    /// Empty, or DER signature followed by the sighash-type byte.
    pub script: Bytes,
    pub sequence: u32,
}

impl Input {
    /// An unsigned input spending `prevout`.
    pub fn new(prevout: Outpoint) -> Self {
        Self {
            prevout,
            script: Bytes::new(),
            sequence: u32::MAX,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.script.is_empty()
    }
}

impl Encode for Input {
    fn encoded_size(&self) -> usize {
        self.prevout.encoded_size() + var_bytes_size(&self.script) + 4
    }

    fn write(&self, dst: &mut BytesMut) {
        self.prevout.write(dst);
        write_var_bytes(dst, &self.script);
        dst.put_u32_le(self.sequence);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            prevout: Outpoint::read(src)?,
            script: read_var_bytes(src)?,
            sequence: read_u32(src)?,
        })
    }
}

/// Value locked to a public key. The output being spent by an input is its coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub value: u64,
    /// Compressed SEC1 public key (33 bytes) when well-formed.
    pub public_key: Bytes,
}

/// The previous output an input spends.
pub type Coin = Output;

impl Output {
    pub fn new(value: u64, public_key: impl Into<Bytes>) -> Self {
        Self {
            value,
            public_key: public_key.into(),
        }
    }
}

impl Encode for Output {
    fn encoded_size(&self) -> usize {
        8 + var_bytes_size(&self.public_key)
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u64_le(self.value);
        write_var_bytes(dst, &self.public_key);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            value: read_u64(src)?,
            public_key: read_var_bytes(src)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub locktime: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Self {
        Self {
            version: 1,
            inputs,
            outputs,
            locktime: 0,
        }
    }

    /// Double SHA-256 of the full serialization, scripts included.
    pub fn hash(&self) -> [u8; 32] {
        let mut raw = BytesMut::with_capacity(self.encoded_size());
        self.write(&mut raw);
        Sha256::digest(Sha256::digest(&raw)).into()
    }

    /// Number of inputs carrying a script.
    pub fn signed_inputs(&self) -> usize {
        self.inputs.iter().filter(|input| input.is_signed()).count()
    }
}

impl Encode for Transaction {
    fn encoded_size(&self) -> usize {
        4 + list_size(&self.inputs) + list_size(&self.outputs) + 4
    }

    fn write(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.version);
        write_list(dst, &self.inputs);
        write_list(dst, &self.outputs);
        dst.put_u32_le(self.locktime);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            version: read_u32(src)?,
            inputs: read_list(src)?,
            outputs: read_list(src)?,
            locktime: read_u32(src)?,
        })
    }
}

/// The coins a transaction spends, keyed by outpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinView {
    coins: BTreeMap<Outpoint, Coin>,
}

impl CoinView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, prevout: Outpoint, coin: Coin) {
        self.coins.insert(prevout, coin);
    }

    pub fn get(&self, prevout: &Outpoint) -> Option<&Coin> {
        self.coins.get(prevout)
    }

    /// The coin spent by `input`, if the view has it.
    pub fn coin_for(&self, input: &Input) -> Option<&Coin> {
        self.get(&input.prevout)
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Outpoint, &Coin)> {
        self.coins.iter()
    }
}

impl FromIterator<(Outpoint, Coin)> for CoinView {
    fn from_iter<I: IntoIterator<Item = (Outpoint, Coin)>>(iter: I) -> Self {
        Self {
            coins: iter.into_iter().collect(),
        }
    }
}

impl Encode for CoinView {
    fn encoded_size(&self) -> usize {
        varint_size(self.coins.len() as u64)
            + self
                .coins
                .iter()
                .map(|(prevout, coin)| prevout.encoded_size() + coin.encoded_size())
                .sum::<usize>()
    }

    fn write(&self, dst: &mut BytesMut) {
        write_varint(dst, self.coins.len() as u64);
        for (prevout, coin) in &self.coins {
            prevout.write(dst);
            coin.write(dst);
        }
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        let count = read_varint(src)?;
        let mut coins = BTreeMap::new();
        for _ in 0..count {
            let prevout = Outpoint::read(src)?;
            let coin = Coin::read(src)?;
            coins.insert(prevout, coin);
        }
        Ok(Self { coins })
    }
}

/// Signing key material for one public key.
///
/// The secret is parsed only when used, so malformed bytes surface as a
/// signing fault rather than a decode error.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRing {
    pub private_key: Bytes,
}

impl KeyRing {
    pub fn new(private_key: impl Into<Bytes>) -> Self {
        Self {
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field(
                "private_key",
                &format_args!("<redacted:{} bytes>", self.private_key.len()),
            )
            .finish()
    }
}

impl Encode for KeyRing {
    fn encoded_size(&self) -> usize {
        var_bytes_size(&self.private_key)
    }

    fn write(&self, dst: &mut BytesMut) {
        write_var_bytes(dst, &self.private_key);
    }

    fn read(src: &mut Bytes) -> Result<Self> {
        Ok(Self {
            private_key: read_var_bytes(src)?,
        })
    }
}

/// Script verification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VerifyFlags(pub u32);

impl VerifyFlags {
    pub const NONE: Self = Self(0);
    /// The sighash byte must name a known type.
    pub const STRICTENC: Self = Self(1 << 1);
    /// High-S signatures fail instead of being normalized.
    pub const LOW_S: Self = Self(1 << 3);
    pub const STANDARD: Self = Self(Self::STRICTENC.0 | Self::LOW_S.0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for VerifyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Which parts of a transaction a signature commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SighashType(pub u32);

impl SighashType {
    pub const ALL: Self = Self(1);
    pub const NONE: Self = Self(2);
    pub const SINGLE: Self = Self(3);
    pub const ANYONECANPAY: u32 = 0x80;

    /// The type without the `ANYONECANPAY` modifier.
    pub fn base(self) -> Self {
        Self(self.0 & 0x1f)
    }

    pub fn anyone_can_pay(self) -> bool {
        self.0 & Self::ANYONECANPAY != 0
    }

    pub fn with_anyone_can_pay(self) -> Self {
        Self(self.0 | Self::ANYONECANPAY)
    }

    /// True for ALL, NONE and SINGLE, with or without `ANYONECANPAY`.
    pub fn is_known(self) -> bool {
        let masked = self.0 & !Self::ANYONECANPAY;
        (Self::ALL.0..=Self::SINGLE.0).contains(&masked)
    }

    /// The byte appended to signatures.
    pub fn to_byte(self) -> u8 {
        self.0 as u8
    }
}

impl Default for SighashType {
    fn default() -> Self {
        Self::ALL
    }
}

impl TryFrom<u32> for SighashType {
    type Error = PacketError;

    fn try_from(value: u32) -> Result<Self> {
        let sighash = Self(value);
        if !sighash.is_known() {
            return Err(PacketError::InvalidEnum {
                field: "sighash type",
                value,
            });
        }
        Ok(sighash)
    }
}
