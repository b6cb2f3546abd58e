//! Proof verification.
//!
//! A [`Verifier`] answers one question for a set of [`VerifierCallArgs`]: does the proof
//! verify? `Ok(false)` means the proof was cryptographically rejected. Errors mean the
//! question could not be answered (verifier unreachable, call reverted), and must never be
//! collapsed into `false`.

pub mod evm;
pub mod local;

use async_trait::async_trait;

use crate::{calldata::VerifierCallArgs, error::Result};

pub use evm::EvmVerifier;
pub use local::{LocalVerifier, VerificationKey};

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, args: &VerifierCallArgs) -> Result<bool>;
}

#[async_trait]
impl<V: Verifier + ?Sized> Verifier for Box<V> {
    async fn verify(&self, args: &VerifierCallArgs) -> Result<bool> {
        (**self).verify(args).await
    }
}

#[async_trait]
impl<V: Verifier + ?Sized> Verifier for std::sync::Arc<V> {
    async fn verify(&self, args: &VerifierCallArgs) -> Result<bool> {
        (**self).verify(args).await
    }
}
