//! In-process Groth16 prover over BN254 for a linear face classifier.
//!
//! The relation proven is `score[c] = sum_j W[c][j] * x[j] + bias[c]` where `x` is the
//! first row of the quantized embedding (private) and the scores are the public signals.
//! Scores are field elements: a negative score wraps to `r - |score|`.

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, ProvingKey, VerifyingKey};
use ark_relations::{
    lc,
    r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable},
};
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::{CryptoRng, RngCore};
use ndarray::Array2;
use rand_core::OsRng;
use tracing::debug;

use super::ProvingBackend;
use crate::{
    error::{PipelineError, Result},
    proof::{Proof, PublicSignals},
    quantize::EMBEDDING_DIM,
    utils::{scalar_to_biguint, signed_to_scalar},
    witness::Witness,
};

/// The classifier relation, optionally carrying an input assignment.
#[derive(Debug, Clone)]
pub struct ClassifierCircuit {
    weights: Array2<i64>,
    bias: Vec<i64>,
    input: Option<Vec<i64>>,
}

impl ClassifierCircuit {
    /// `weights` has one row per class and `EMBEDDING_DIM` columns.
    pub fn new(weights: Array2<i64>, bias: Vec<i64>) -> Result<Self> {
        let (num_classes, dim) = weights.dim();
        if dim != EMBEDDING_DIM || bias.len() != num_classes || num_classes == 0 {
            return Err(PipelineError::Proving(format!(
                "classifier expects {EMBEDDING_DIM} columns and one bias per class, got a \
                 {num_classes}x{dim} weight matrix and {} biases",
                bias.len()
            )));
        }
        Ok(Self {
            weights,
            bias,
            input: None,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn with_input(&self, input: Vec<i64>) -> Self {
        Self {
            input: Some(input),
            ..self.clone()
        }
    }

    /// The class scores for `input` as field elements.
    pub fn scores(&self, input: &[i64]) -> Vec<Fr> {
        self.weights
            .outer_iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                row.iter()
                    .zip(input)
                    .fold(signed_to_scalar(*b), |acc, (w, x)| {
                        acc + signed_to_scalar(*w) * signed_to_scalar(*x)
                    })
            })
            .collect()
    }
}

impl ConstraintSynthesizer<Fr> for ClassifierCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let scores = self.input.as_ref().map(|input| self.scores(input));

        let score_vars = (0..self.num_classes())
            .map(|c| {
                cs.new_input_variable(|| {
                    scores
                        .as_ref()
                        .map(|s| s[c])
                        .ok_or(SynthesisError::AssignmentMissing)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let input_vars = (0..EMBEDDING_DIM)
            .map(|j| {
                cs.new_witness_variable(|| {
                    self.input
                        .as_ref()
                        .map(|x| signed_to_scalar(x[j]))
                        .ok_or(SynthesisError::AssignmentMissing)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (c, score) in score_vars.iter().enumerate() {
            let mut sum = lc!() + (signed_to_scalar(self.bias[c]), Variable::One);
            for (j, x) in input_vars.iter().enumerate() {
                sum = sum + (signed_to_scalar(self.weights[(c, j)]), *x);
            }
            cs.enforce_constraint(sum, lc!() + Variable::One, lc!() + *score)?;
        }

        Ok(())
    }
}

/// Groth16 prover for a [`ClassifierCircuit`] with a circuit-specific proving key.
pub struct NativeProver {
    circuit: ClassifierCircuit,
    proving_key: ProvingKey<Bn254>,
}

impl NativeProver {
    /// Runs the circuit-specific trusted setup and returns the prover together with the
    /// matching verifying key.
    pub fn setup<R: RngCore + CryptoRng>(
        circuit: ClassifierCircuit,
        rng: &mut R,
    ) -> Result<(Self, VerifyingKey<Bn254>)> {
        let (proving_key, verifying_key) =
            Groth16::<Bn254>::circuit_specific_setup(circuit.clone(), rng)
                .map_err(|e| PipelineError::Proving(format!("setup failed: {e}")))?;
        debug!(
            "Setup done: {} public inputs",
            verifying_key.gamma_abc_g1.len() - 1
        );

        Ok((
            Self {
                circuit,
                proving_key,
            },
            verifying_key,
        ))
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Bn254> {
        &self.proving_key.vk
    }

    pub fn circuit(&self) -> &ClassifierCircuit {
        &self.circuit
    }
}

impl ProvingBackend for NativeProver {
    fn num_public(&self) -> usize {
        self.circuit.num_classes()
    }

    fn prove(&self, witness: Witness) -> Result<(Proof, PublicSignals)> {
        let input = match witness.rows().first() {
            Some(row) if row.len() == EMBEDDING_DIM => row.clone(),
            _ => {
                return Err(PipelineError::Proving(format!(
                    "witness must contain a row of {EMBEDDING_DIM} values"
                )))
            }
        };

        let public_signals = PublicSignals::new(
            self.circuit
                .scores(&input)
                .into_iter()
                .map(scalar_to_biguint)
                .collect(),
        );
        let proof = Groth16::<Bn254>::prove(
            &self.proving_key,
            self.circuit.with_input(input),
            &mut OsRng,
        )
        .map_err(|e| PipelineError::Proving(e.to_string()))?;

        Ok((Proof::from(&proof), public_signals))
    }
}

#[cfg(test)]
mod tests {
    use ark_relations::r1cs::ConstraintSystem;
    use num_bigint::BigUint;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{
        quantize::{quantize, QuantizedEmbedding},
        witness::WitnessLayout,
    };

    fn circuit() -> ClassifierCircuit {
        let mut weights = Array2::<i64>::zeros((3, EMBEDDING_DIM));
        weights[(0, 0)] = 1;
        weights[(1, 1)] = 2;
        weights[(2, 2)] = 3;
        ClassifierCircuit::new(weights, vec![0, 1, 2]).unwrap()
    }

    #[test]
    fn test_constraints_satisfied() {
        let cs = ConstraintSystem::<Fr>::new_ref();
        let mut input = vec![0; EMBEDDING_DIM];
        input[0] = 3;
        input[1] = -4;
        circuit()
            .with_input(input)
            .generate_constraints(cs.clone())
            .unwrap();
        assert!(cs.is_satisfied().unwrap());
        assert_eq!(cs.num_constraints(), 3);
        // The constant one plus three scores.
        assert_eq!(cs.num_instance_variables(), 4);
    }

    #[test]
    fn test_scores() {
        let mut input = vec![0; EMBEDDING_DIM];
        input[0] = 3;
        input[1] = 5;
        input[2] = -1;
        let scores: Vec<BigUint> = circuit()
            .scores(&input)
            .into_iter()
            .map(scalar_to_biguint)
            .collect();
        assert_eq!(scores[0], BigUint::from(3u8));
        assert_eq!(scores[1], BigUint::from(11u8));
        assert_eq!(scores[2], crate::utils::scalar_modulus() - 1u8);
    }

    #[test]
    fn test_rejects_malformed_weights() {
        assert!(ClassifierCircuit::new(Array2::zeros((2, EMBEDDING_DIM - 1)), vec![0, 0]).is_err());
        assert!(ClassifierCircuit::new(Array2::zeros((2, EMBEDDING_DIM)), vec![0]).is_err());
    }

    #[test]
    fn test_prove() {
        let mut rng = StdRng::seed_from_u64(7);
        let (prover, vk) = NativeProver::setup(circuit(), &mut rng).unwrap();
        assert_eq!(vk.gamma_abc_g1.len(), 4);

        let mut embedding = vec![0.0f32; EMBEDDING_DIM];
        embedding[1] = 2.5;
        let quantized: QuantizedEmbedding = quantize(&embedding, 1).unwrap();
        let witness = Witness::new(&WitnessLayout::default(), &quantized).unwrap();
        let (_, signals) = prover.prove(witness).unwrap();
        assert_eq!(signals, PublicSignals::from(vec![0, 7, 2]));
        assert_eq!(signals.prediction(), 1);
    }
}
