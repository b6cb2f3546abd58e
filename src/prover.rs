//! Proof generation.
//!
//! The proving system is an external collaborator behind [`ProvingBackend`]. The
//! [`ProofRequestor`] turns a quantized embedding into a witness, runs the backend on a
//! blocking worker thread and checks the result against the circuit's declared public
//! output count.

pub mod native;
pub mod snarkjs;

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::{
    error::{PipelineError, Result},
    proof::{Proof, PublicSignals},
    quantize::QuantizedEmbedding,
    witness::{Witness, WitnessLayout},
};

pub use native::{ClassifierCircuit, NativeProver};
pub use snarkjs::SnarkjsProver;

/// A proving system for one fixed circuit artifact.
///
/// Implementations are allowed to be CPU-heavy and blocking. They are not required to be
/// reentrant: callers must not run two proofs against the same backend concurrently.
pub trait ProvingBackend: Send + Sync + 'static {
    /// Number of public signals the circuit declares.
    fn num_public(&self) -> usize;

    /// Generates a proof for `witness`. Any failure is fatal for this witness.
    fn prove(&self, witness: Witness) -> Result<(Proof, PublicSignals)>;
}

/// Packages quantized embeddings as witnesses and requests proofs for them.
pub struct ProofRequestor<B> {
    backend: Arc<B>,
    layout: WitnessLayout,
    /// Held by the worker for the duration of a proof. A cancelled request keeps running
    /// to completion, so the next one waits for it instead of sharing the backend.
    in_use: Arc<Mutex<()>>,
}

impl<B: ProvingBackend> ProofRequestor<B> {
    pub fn new(backend: B, layout: WitnessLayout) -> Self {
        Self {
            backend: Arc::new(backend),
            layout,
            in_use: Arc::new(Mutex::new(())),
        }
    }

    /// Proves the classification relation for `quantized`.
    ///
    /// No retries: a witness that failed once fails the same way again.
    pub async fn request_proof(
        &self,
        quantized: &QuantizedEmbedding,
    ) -> Result<(Proof, PublicSignals)> {
        let witness = Witness::new(&self.layout, quantized)?;
        let backend = Arc::clone(&self.backend);
        let in_use = Arc::clone(&self.in_use);

        info!("Generating proof...");
        let (proof, public_signals) = tokio::task::spawn_blocking(move || {
            let _guard = in_use.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            backend.prove(witness)
        })
        .await
        .map_err(|e| PipelineError::Proving(format!("prover task failed: {e}")))?
        .map_err(|e| {
            warn!("Proof generation failed: {e}");
            e
        })?;

        let expected = self.backend.num_public();
        if public_signals.len() != expected {
            return Err(PipelineError::Proving(format!(
                "prover returned {} public signals, circuit declares {expected}",
                public_signals.len()
            )));
        }
        debug!("Public signals: {public_signals}");

        Ok((proof, public_signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        proof::{G1Point, G2Point},
        quantize::{quantize, EMBEDDING_DIM},
    };
    use num_bigint::BigUint;

    struct FixedBackend {
        signals: Vec<u64>,
        num_public: usize,
    }

    fn dummy_proof() -> Proof {
        let one = || BigUint::from(1u8);
        Proof {
            a: G1Point { x: one(), y: one() },
            b: G2Point {
                x: [one(), one()],
                y: [one(), one()],
            },
            c: G1Point { x: one(), y: one() },
        }
    }

    impl ProvingBackend for FixedBackend {
        fn num_public(&self) -> usize {
            self.num_public
        }

        fn prove(&self, witness: Witness) -> Result<(Proof, PublicSignals)> {
            assert_eq!(witness.rows()[0].len(), EMBEDDING_DIM);
            Ok((dummy_proof(), PublicSignals::from(self.signals.clone())))
        }
    }

    #[tokio::test]
    async fn test_request_proof() {
        let requestor = ProofRequestor::new(
            FixedBackend {
                signals: vec![1, 2, 3],
                num_public: 3,
            },
            WitnessLayout::default(),
        );
        let quantized = quantize(&vec![0.5f32; EMBEDDING_DIM], 1).unwrap();
        let (proof, signals) = requestor.request_proof(&quantized).await.unwrap();
        assert_eq!(proof, dummy_proof());
        assert_eq!(signals, PublicSignals::from(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_public_signal_count_mismatch_is_a_proving_error() {
        let requestor = ProofRequestor::new(
            FixedBackend {
                signals: vec![1, 2],
                num_public: 3,
            },
            WitnessLayout::default(),
        );
        let quantized = quantize(&vec![0.0f32; EMBEDDING_DIM], 1).unwrap();
        assert!(matches!(
            requestor.request_proof(&quantized).await,
            Err(PipelineError::Proving(_))
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_witness_never_reaches_backend() {
        struct PanickingBackend;
        impl ProvingBackend for PanickingBackend {
            fn num_public(&self) -> usize {
                0
            }
            fn prove(&self, _: Witness) -> Result<(Proof, PublicSignals)> {
                panic!("backend must not be called");
            }
        }

        let requestor = ProofRequestor::new(PanickingBackend, WitnessLayout::default());
        let mut embedding = vec![0.0f32; EMBEDDING_DIM];
        embedding[0] = 1.0e12;
        let quantized = quantize(&embedding, 1).unwrap();
        assert!(matches!(
            requestor.request_proof(&quantized).await,
            Err(PipelineError::Proving(_))
        ));
    }
}
