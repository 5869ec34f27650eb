//! Job execution for oriwork workers.
//!
//! A [`Dispatcher`] turns each decoded request into exactly one result
//! packet. Script validation failures are results (`CheckResult` with a
//! fault); every other failure becomes an `ErrorResult`.

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod secp;

pub use backend::{Collaborators, EcdsaProvider, TxSigner, TxVerifier};
pub use dispatcher::Dispatcher;
pub use error::{JobError, Result};
pub use secp::{signature_hash, Secp256k1Backend};
