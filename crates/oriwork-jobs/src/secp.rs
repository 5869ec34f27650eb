//! secp256k1 collaborators for the pay-to-public-key transaction model.
//!
//! Every output locks value to a compressed SEC1 public key. An input script is
//! a DER signature followed by one sighash-type byte, over the digest produced
//! by [`signature_hash`].

use bytes::{BufMut, Bytes, BytesMut};
use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use oriwork_packet::encoding::{write_list, write_var_bytes, write_varint};
use oriwork_packet::{
    Coin, CoinView, Encode, Input, KeyRing, ScriptFault, ScriptFaultCode, SighashType,
    Transaction, VerifyFlags,
};
use sha2::{Digest, Sha256};

use crate::backend::{EcdsaProvider, TxSigner, TxVerifier};
use crate::error::{JobError, Result};

/// Length of a message digest and of a raw private key.
pub const DIGEST_SIZE: usize = 32;

/// ECDSA signing and P2PK script validation with k256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Backend;

impl Secp256k1Backend {
    pub fn new() -> Self {
        Self
    }

    /// Compressed public key for a raw private key.
    pub fn public_key(&self, private_key: &[u8]) -> Result<Bytes> {
        Ok(public_key_bytes(&signing_key(private_key)?))
    }
}

impl TxVerifier for Secp256k1Backend {
    fn validate(&self, tx: &Transaction, view: &CoinView, flags: VerifyFlags) -> Result<()> {
        for (index, input) in tx.inputs.iter().enumerate() {
            let index = index as u32;
            let coin = view.coin_for(input).ok_or_else(|| {
                ScriptFault::new(ScriptFaultCode::UnknownError, "No coin available.")
                    .at_input(index)
            })?;
            self.validate_input(tx, index, coin, flags)?;
        }
        Ok(())
    }

    fn validate_input(
        &self,
        tx: &Transaction,
        index: u32,
        coin: &Coin,
        flags: VerifyFlags,
    ) -> Result<()> {
        let input = input_at(tx, index)?;
        let fault = |code: ScriptFaultCode, message: &str| {
            JobError::from(ScriptFault::new(code, message).at_input(index))
        };

        let Some((&hash_byte, der)) = input.script.split_last() else {
            return Err(fault(ScriptFaultCode::EvalFalse, "input is not signed"));
        };

        let key = VerifyingKey::from_sec1_bytes(&coin.public_key).map_err(|_| {
            fault(
                ScriptFaultCode::PubkeyType,
                "coin public key is not a valid secp256k1 key",
            )
        })?;

        let signature = Signature::from_der(der).map_err(|_| {
            fault(ScriptFaultCode::SigDer, "signature is not strict DER")
        })?;

        let sighash = SighashType(u32::from(hash_byte));
        if flags.contains(VerifyFlags::STRICTENC) && !sighash.is_known() {
            return Err(fault(
                ScriptFaultCode::SigHashType,
                "unknown signature hash type",
            ));
        }

        let signature = match signature.normalize_s() {
            Some(_) if flags.contains(VerifyFlags::LOW_S) => {
                return Err(fault(ScriptFaultCode::SigHighS, "signature S value is high"));
            }
            Some(normalized) => normalized,
            None => signature,
        };

        let digest = signature_hash(tx, index, coin, sighash)?;
        key.verify_prehash(&digest, &signature)
            .map_err(|_| fault(ScriptFaultCode::EvalFalse, "signature verification failed"))
    }
}

impl TxSigner for Secp256k1Backend {
    fn sign(
        &self,
        tx: &mut Transaction,
        view: &CoinView,
        rings: &[KeyRing],
        sighash: SighashType,
    ) -> Result<u32> {
        ensure_known(sighash)?;
        let keys = rings
            .iter()
            .map(|ring| {
                let key = signing_key(&ring.private_key)?;
                let public = public_key_bytes(&key);
                Ok((key, public))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut signed = 0;
        for index in 0..tx.inputs.len() {
            let Some(coin) = view.coin_for(&tx.inputs[index]) else {
                continue;
            };
            let Some((key, _)) = keys.iter().find(|(_, public)| *public == coin.public_key) else {
                continue;
            };
            // SINGLE with no output at this index: leave the input unsigned.
            let digest = match signature_hash(tx, index as u32, coin, sighash) {
                Ok(digest) => digest,
                Err(JobError::IndexOutOfRange { .. }) => continue,
                Err(err) => return Err(err),
            };
            tx.inputs[index].script = signature_script(key, &digest, sighash)?;
            signed += 1;
        }

        tracing::trace!(signed, inputs = tx.inputs.len(), "signed transaction");
        Ok(signed)
    }

    fn sign_input(
        &self,
        tx: &mut Transaction,
        index: u32,
        coin: &Coin,
        ring: &KeyRing,
        sighash: SighashType,
    ) -> Result<bool> {
        ensure_known(sighash)?;
        input_at(tx, index)?;

        let key = signing_key(&ring.private_key)?;
        if public_key_bytes(&key) != coin.public_key {
            return Ok(false);
        }

        let digest = signature_hash(tx, index, coin, sighash)?;
        tx.inputs[index as usize].script = signature_script(&key, &digest, sighash)?;
        Ok(true)
    }
}

impl EcdsaProvider for Secp256k1Backend {
    fn verify(&self, msg: &[u8], sig: &[u8], key: &[u8]) -> bool {
        let Ok(key) = VerifyingKey::from_sec1_bytes(key) else {
            return false;
        };
        let Ok(signature) = Signature::from_der(sig) else {
            return false;
        };
        let signature = signature.normalize_s().unwrap_or(signature);
        key.verify_prehash(msg, &signature).is_ok()
    }

    fn sign(&self, msg: &[u8], key: &[u8]) -> Result<Bytes> {
        let key = signing_key(key)?;
        let signature = sign_digest(&key, msg)?;
        Ok(Bytes::copy_from_slice(signature.to_der().as_bytes()))
    }
}

/// Digest an input signature commits to.
///
/// Double SHA-256 over the version, the inputs (only the signed one under
/// `ANYONECANPAY`) with empty scripts except the signed input which carries
/// the coin's public key, the outputs selected by the base type, the
/// locktime, the coin value and the full sighash type.
pub fn signature_hash(
    tx: &Transaction,
    index: u32,
    coin: &Coin,
    sighash: SighashType,
) -> Result<[u8; 32]> {
    let signed = input_at(tx, index)?;
    let mut buf = BytesMut::with_capacity(tx.encoded_size() + coin.encoded_size() + 16);

    buf.put_u32_le(tx.version);
    if sighash.anyone_can_pay() {
        write_varint(&mut buf, 1);
        write_sighash_input(&mut buf, signed, &coin.public_key);
    } else {
        write_varint(&mut buf, tx.inputs.len() as u64);
        for (i, input) in tx.inputs.iter().enumerate() {
            let script: &[u8] = if i == index as usize {
                &coin.public_key
            } else {
                &[]
            };
            write_sighash_input(&mut buf, input, script);
        }
    }

    match sighash.base() {
        SighashType::NONE => write_varint(&mut buf, 0),
        SighashType::SINGLE => {
            let output = tx
                .outputs
                .get(index as usize)
                .ok_or(JobError::IndexOutOfRange {
                    index,
                    len: tx.outputs.len(),
                })?;
            write_varint(&mut buf, 1);
            output.write(&mut buf);
        }
        _ => write_list(&mut buf, &tx.outputs),
    }

    buf.put_u32_le(tx.locktime);
    buf.put_u64_le(coin.value);
    buf.put_u32_le(sighash.0);

    Ok(Sha256::digest(Sha256::digest(&buf)).into())
}

fn write_sighash_input(dst: &mut BytesMut, input: &Input, script: &[u8]) {
    input.prevout.write(dst);
    write_var_bytes(dst, script);
    dst.put_u32_le(input.sequence);
}

fn input_at(tx: &Transaction, index: u32) -> Result<&Input> {
    tx.inputs
        .get(index as usize)
        .ok_or(JobError::IndexOutOfRange {
            index,
            len: tx.inputs.len(),
        })
}

fn ensure_known(sighash: SighashType) -> Result<()> {
    if !sighash.is_known() {
        return Err(JobError::InvalidInput(format!(
            "cannot sign with sighash type {:#x}",
            sighash.0
        )));
    }
    Ok(())
}

fn signing_key(raw: &[u8]) -> Result<SigningKey> {
    if raw.len() != DIGEST_SIZE {
        return Err(JobError::InvalidPrivateKey(format!(
            "expected {DIGEST_SIZE} bytes, got {}",
            raw.len()
        )));
    }
    SigningKey::from_slice(raw).map_err(|_| {
        JobError::InvalidPrivateKey("scalar is zero or not below the curve order".into())
    })
}

fn public_key_bytes(key: &SigningKey) -> Bytes {
    Bytes::copy_from_slice(key.verifying_key().to_encoded_point(true).as_bytes())
}

/// Deterministic (RFC 6979) low-S signature over a digest.
fn sign_digest(key: &SigningKey, digest: &[u8]) -> Result<Signature> {
    if digest.len() != DIGEST_SIZE {
        return Err(JobError::InvalidInput(format!(
            "message must be a {DIGEST_SIZE}-byte digest, got {} bytes",
            digest.len()
        )));
    }
    let signature: Signature = key
        .sign_prehash(digest)
        .map_err(|e| JobError::Internal(format!("signing failed: {e}")))?;
    Ok(signature.normalize_s().unwrap_or(signature))
}

fn signature_script(key: &SigningKey, digest: &[u8], sighash: SighashType) -> Result<Bytes> {
    let der = sign_digest(key, digest)?.to_der();
    let mut script = BytesMut::with_capacity(der.as_bytes().len() + 1);
    script.put_slice(der.as_bytes());
    script.put_u8(sighash.to_byte());
    Ok(script.freeze())
}
