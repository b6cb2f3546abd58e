//! Verifier call arguments.
//!
//! The Solidity Groth16 verifier exported by snarkjs takes
//! `verifyProof(uint256[2] a, uint256[2][2] b, uint256[2] c, uint256[N] input)`.
//! The encoding below matches `snarkjs zkey export soliditycalldata` exactly:
//!
//! - `a = [A.x, A.y]` and `c = [C.x, C.y]`;
//! - `b = [[B.x.c1, B.x.c0], [B.y.c1, B.y.c0]]`: the `Fq2` halves are swapped, because the
//!   pairing precompile (EIP-197) expects the imaginary part first;
//! - every coordinate is a canonical base field element and every input a canonical scalar
//!   field element, written as a `uint256`.
//!
//! A generic ABI encoder accepts any `uint256`, so a mistake here only surfaces as a failed
//! verification. Shape mismatches are therefore rejected instead of coerced.

use ethers::{
    abi::{self, Function, Token},
    types::{Bytes, U256},
};
use itertools::Itertools;

use crate::{
    error::{PipelineError, Result},
    proof::{G1Point, G2Point, Proof, PublicSignals},
    utils::{base_modulus, scalar_modulus, to_hex_word, to_u256},
};

/// The ordered arguments of one `verifyProof` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierCallArgs {
    pub a: [U256; 2],
    pub b: [[U256; 2]; 2],
    pub c: [U256; 2],
    pub input: Vec<U256>,
}

/// Canonical signature of the verifier's check function for `num_public` inputs.
pub fn verify_proof_signature(num_public: usize) -> String {
    format!(
        "function verifyProof(uint256[2],uint256[2][2],uint256[2],uint256[{num_public}]) external view returns (bool)"
    )
}

/// The ABI description of the verifier's check function for `num_public` inputs.
pub fn verify_proof_function(num_public: usize) -> Result<Function> {
    let abi = abi::parse_abi(&[verify_proof_signature(num_public).as_str()])
        .map_err(|e| PipelineError::Encoding(e.to_string()))?;
    abi.function("verifyProof")
        .cloned()
        .map_err(|e| PipelineError::Encoding(e.to_string()))
}

/// Builds [`VerifierCallArgs`] for a verifier compiled for a fixed number of public inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentBuilder {
    num_public: usize,
}

impl ArgumentBuilder {
    pub fn new(num_public: usize) -> Self {
        Self { num_public }
    }

    pub fn num_public(&self) -> usize {
        self.num_public
    }

    /// Regroups `proof` and `public_signals` into the verifier's argument order.
    pub fn build(&self, proof: &Proof, public_signals: &PublicSignals) -> Result<VerifierCallArgs> {
        if public_signals.len() != self.num_public {
            return Err(PipelineError::Encoding(format!(
                "verifier expects {} public inputs, got {}",
                self.num_public,
                public_signals.len()
            )));
        }

        let r = scalar_modulus();
        let input = public_signals
            .values()
            .iter()
            .map(|v| to_u256(v, &r))
            .collect::<Result<Vec<_>>>()?;

        Ok(VerifierCallArgs {
            a: encode_g1(&proof.a)?,
            b: encode_g2(&proof.b)?,
            c: encode_g1(&proof.c)?,
            input,
        })
    }
}

fn encode_g1(p: &G1Point) -> Result<[U256; 2]> {
    let q = base_modulus();
    Ok([to_u256(&p.x, &q)?, to_u256(&p.y, &q)?])
}

fn encode_g2(p: &G2Point) -> Result<[[U256; 2]; 2]> {
    let q = base_modulus();
    Ok([
        [to_u256(&p.x[1], &q)?, to_u256(&p.x[0], &q)?],
        [to_u256(&p.y[1], &q)?, to_u256(&p.y[0], &q)?],
    ])
}

fn uint_pair(words: &[U256; 2]) -> Token {
    Token::FixedArray(words.iter().copied().map(Token::Uint).collect())
}

impl VerifierCallArgs {
    /// The four ABI parameters `(a, b, c, input)`.
    pub fn to_tokens(&self) -> Vec<Token> {
        vec![
            uint_pair(&self.a),
            Token::FixedArray(self.b.iter().map(uint_pair).collect()),
            uint_pair(&self.c),
            Token::FixedArray(self.input.iter().copied().map(Token::Uint).collect()),
        ]
    }

    /// Selector plus ABI-encoded arguments of the `verifyProof` call.
    pub fn encode_calldata(&self) -> Result<Bytes> {
        let function = verify_proof_function(self.input.len())?;
        function
            .encode_input(&self.to_tokens())
            .map(Bytes::from)
            .map_err(|e| PipelineError::Encoding(e.to_string()))
    }

    /// The same rendering as `snarkjs zkey export soliditycalldata`.
    pub fn to_solidity_calldata(&self) -> String {
        let word = |w: U256| format!("\"{}\"", to_hex_word(w));
        let pair = |words: &[U256; 2]| format!("[{}]", words.iter().copied().map(word).join(","));
        format!(
            "{},[{}],{},[{}]",
            pair(&self.a),
            self.b.iter().map(pair).join(","),
            pair(&self.c),
            self.input.iter().copied().map(word).join(",")
        )
    }
}
