//! Typed payloads for oriwork job frames.
//!
//! Requests and results are closed enums ([`RequestPacket`], [`ResultPacket`]);
//! unknown command codes only exist at the byte boundary, where
//! [`RequestPacket::decode`] and [`ResultPacket::decode`] reject them with
//! [`PacketError::UnknownCommand`].

pub mod encoding;
pub mod error;
pub mod packet;
pub mod request;
pub mod result;
pub mod script;
pub mod tx;

pub use encoding::{decode_exact, encode_to_bytes, Encode};
pub use error::{PacketError, Result};
pub use packet::{encode_request, encode_result, Packet};
pub use request::{
    CheckInputPacket, CheckPacket, EcSignPacket, EcVerifyPacket, RequestPacket, SignInputPacket,
    SignPacket,
};
pub use result::{
    CheckInputResultPacket, CheckResultPacket, EcSignResultPacket, EcVerifyResultPacket,
    ErrorResultPacket, FaultCode, ResultPacket, SignInputResultPacket, SignResultPacket,
};
pub use script::{ScriptFault, ScriptFaultCode};
pub use tx::{
    Coin, CoinView, Input, KeyRing, Outpoint, Output, SighashType, Transaction, VerifyFlags,
};
