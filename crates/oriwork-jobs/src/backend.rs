//! Collaborator traits the dispatcher executes jobs through.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use oriwork_packet::{Coin, CoinView, KeyRing, SighashType, Transaction, VerifyFlags};

use crate::error::Result;
use crate::secp::Secp256k1Backend;

/// Transaction script validation.
///
/// A failed validation is `Err(JobError::Script(fault))`; any other error is
/// a fault in the request itself.
pub trait TxVerifier: Send + Sync {
    /// Validate every input of `tx` against its coin in `view`.
    fn validate(&self, tx: &Transaction, view: &CoinView, flags: VerifyFlags) -> Result<()>;

    /// Validate input `index` of `tx` spending `coin`.
    fn validate_input(
        &self,
        tx: &Transaction,
        index: u32,
        coin: &Coin,
        flags: VerifyFlags,
    ) -> Result<()>;
}

/// Transaction signing.
pub trait TxSigner: Send + Sync {
    /// Sign every input of `tx` that one of `rings` can sign. Returns the
    /// number of inputs signed.
    fn sign(
        &self,
        tx: &mut Transaction,
        view: &CoinView,
        rings: &[KeyRing],
        sighash: SighashType,
    ) -> Result<u32>;

    /// Sign input `index` of `tx`. Returns false when `ring` does not own `coin`.
    fn sign_input(
        &self,
        tx: &mut Transaction,
        index: u32,
        coin: &Coin,
        ring: &KeyRing,
        sighash: SighashType,
    ) -> Result<bool>;
}

/// Raw ECDSA over 32-byte message digests.
pub trait EcdsaProvider: Send + Sync {
    /// Malformed signature or key bytes verify as false.
    fn verify(&self, msg: &[u8], sig: &[u8], key: &[u8]) -> bool;

    /// Sign `msg` with the raw private key `key`, returning a DER signature.
    fn sign(&self, msg: &[u8], key: &[u8]) -> Result<Bytes>;
}

/// The collaborators a [`crate::Dispatcher`] is built from.
///
/// Constructed once by the caller and shared by every worker; there is no
/// global registry.
#[derive(Clone)]
pub struct Collaborators {
    pub verifier: Arc<dyn TxVerifier>,
    pub signer: Arc<dyn TxSigner>,
    pub ecdsa: Arc<dyn EcdsaProvider>,
}

impl Collaborators {
    pub fn new(
        verifier: Arc<dyn TxVerifier>,
        signer: Arc<dyn TxSigner>,
        ecdsa: Arc<dyn EcdsaProvider>,
    ) -> Self {
        Self {
            verifier,
            signer,
            ecdsa,
        }
    }

    /// All three roles served by one [`Secp256k1Backend`].
    pub fn secp256k1() -> Self {
        let backend = Arc::new(Secp256k1Backend::new());
        Self {
            verifier: backend.clone(),
            signer: backend.clone(),
            ecdsa: backend,
        }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::secp256k1()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
