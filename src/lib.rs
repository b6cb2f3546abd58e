//! Zero-knowledge proofs of face classification.
//!
//! **Disclaimer**: This code has not been audited and is not intended for production use.
//!
//! A face embedding (the output of an external embedding model) is quantized to integers,
//! proven with a Groth16 circuit whose public outputs are the per-class scores, and checked
//! by a Groth16 verifier, either the Solidity contract exported by snarkjs or an in-process
//! pairing check. The [`Pipeline`] sequences the stages and keeps at most one attempt in
//! flight.
//!
//! # Example: Proving and verifying a classification in process
//! ```
//! use std::path::Path;
//! use rand::{rngs::StdRng, SeedableRng};
//! use zk_face::{
//!     checked_in_test_data::*, load_classifier, load_embedding, LocalVerifier, NativeProver,
//!     Pipeline, PipelineState, WitnessLayout,
//! };
//!
//! # tokio_test_runtime(async {
//! let embedding = load_embedding(Path::new(EMBEDDING_PATH)).unwrap();
//! let classifier = load_classifier(Path::new(CLASSIFIER_PATH)).unwrap();
//!
//! // Circuit-specific setup
//! let (prover, vk) = NativeProver::setup(classifier, &mut StdRng::seed_from_u64(0)).unwrap();
//! let verifier = LocalVerifier::from_verifying_key(&vk);
//!
//! let pipeline = Pipeline::new(prover, WitnessLayout::default(), verifier);
//! let classification = pipeline.classify_and_prove(&embedding).await.unwrap();
//! println!("Prediction: {}", classification.prediction);
//!
//! assert!(pipeline.verify().await.unwrap());
//! assert_eq!(pipeline.state(), PipelineState::Verified);
//! # });
//! # fn tokio_test_runtime(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod calldata;
pub mod config;
pub mod error;
pub mod eth;
pub mod io;
pub mod pipeline;
pub mod proof;
pub mod prover;
pub mod quantize;
pub mod utils;
pub mod verifier;
pub mod witness;

pub use calldata::{ArgumentBuilder, VerifierCallArgs};
pub use config::Config;
pub use error::{ErrorKind, PipelineError, Result};
pub use io::{load_classifier, load_embedding};
pub use pipeline::{Classification, Pipeline, PipelineState};
pub use proof::{Proof, PublicSignals};
pub use prover::{ClassifierCircuit, NativeProver, ProofRequestor, ProvingBackend, SnarkjsProver};
pub use quantize::{quantize, QuantizedEmbedding};
pub use verifier::{EvmVerifier, LocalVerifier, VerificationKey, Verifier};
pub use witness::{Witness, WitnessLayout};

pub mod checked_in_test_data {
    /// A face embedding (84 values) as returned by the embedding service.
    pub const EMBEDDING_PATH: &str = "tests/data/embedding.json";
    /// The expected quantization of [`EMBEDDING_PATH`].
    pub const QUANTIZED_PATH: &str = "tests/data/quantized.json";
    /// A three-class linear classifier head over the 84-dimensional embedding.
    pub const CLASSIFIER_PATH: &str = "tests/data/classifier.json";
    /// A snarkjs Groth16 proof, and its public signals.
    pub const PROOF_PATH: &str = "tests/data/proof.json";
    pub const PUBLIC_PATH: &str = "tests/data/public.json";
    /// Artifact of a stand-in verifier contract that accepts every call.
    pub const VERIFIER_ARTIFACT_PATH: &str = "tests/data/accept_all_verifier.json";
}
