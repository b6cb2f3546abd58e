//! Utilities for loading embeddings, classifier models and proof artifacts from disk.

use std::{fs, path::Path};

use ndarray::Array2;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{PipelineError, Result},
    proof::{Proof, PublicSignals},
    prover::ClassifierCircuit,
    verifier::VerificationKey,
};

/// Loads a face embedding as produced by the embedding service.
///
/// Accepts either a bare JSON array of numbers, or the service's response object
/// `{"embeddings": [...]}`. A batch of one (`[[...]]`) is flattened.
pub fn load_embedding(path: &Path) -> Result<Vec<f32>> {
    let raw = fs::read_to_string(path).map_err(|e| {
        PipelineError::Inference(format!("cannot read embedding {}: {e}", path.display()))
    })?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| {
        PipelineError::Inference(format!("malformed embedding {}: {e}", path.display()))
    })?;
    parse_embedding(&value)
}

pub fn parse_embedding(value: &Value) -> Result<Vec<f32>> {
    let values = match value {
        Value::Object(map) => map.get("embeddings").ok_or_else(|| {
            PipelineError::Inference("response has no \"embeddings\" field".to_string())
        })?,
        other => other,
    };

    let mut embedding = Vec::new();
    flatten_numbers(values, &mut embedding)?;
    if embedding.is_empty() {
        return Err(PipelineError::Inference("embedding is empty".to_string()));
    }
    Ok(embedding)
}

fn flatten_numbers(value: &Value, out: &mut Vec<f32>) -> Result<()> {
    match value {
        Value::Number(n) => {
            let x = n
                .as_f64()
                .ok_or_else(|| PipelineError::Inference(format!("{n} is not a number")))?;
            out.push(x as f32);
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(|item| flatten_numbers(item, out)),
        other => Err(PipelineError::Inference(format!(
            "unexpected {other} in embedding"
        ))),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|e| {
        PipelineError::Encoding(format!("cannot read {what} {}: {e}", path.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        PipelineError::Encoding(format!("malformed {what} {}: {e}", path.display()))
    })
}

/// Loads a `proof.json` written by snarkjs.
pub fn load_proof(path: &Path) -> Result<Proof> {
    read_json(path, "proof")
}

/// Loads a `public.json` written by snarkjs.
pub fn load_public_signals(path: &Path) -> Result<PublicSignals> {
    read_json(path, "public signals")
}

/// Loads a `verification_key.json` exported by snarkjs.
pub fn load_verification_key(path: &Path) -> Result<VerificationKey> {
    read_json(path, "verification key")
}

#[derive(Debug, Deserialize)]
struct ClassifierFile {
    weights: Vec<Vec<i64>>,
    bias: Vec<i64>,
}

/// Loads the integer weights of a linear classifier head: `{"weights": [[..]], "bias": [..]}`,
/// one weight row and one bias per class.
pub fn load_classifier(path: &Path) -> Result<ClassifierCircuit> {
    let file: ClassifierFile = read_json(path, "classifier")?;
    let num_classes = file.weights.len();
    let dim = file.weights.first().map_or(0, Vec::len);
    if file.weights.iter().any(|row| row.len() != dim) {
        return Err(PipelineError::Encoding(
            "classifier weight rows differ in length".to_string(),
        ));
    }
    let weights = Array2::from_shape_vec(
        (num_classes, dim),
        file.weights.into_iter().flatten().collect(),
    )
    .map_err(|e| PipelineError::Encoding(e.to_string()))?;
    ClassifierCircuit::new(weights, file.bias)
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    fs::write(path, rendered).map_err(|e| {
        PipelineError::Encoding(format!("cannot write {}: {e}", path.display()))
    })
}
