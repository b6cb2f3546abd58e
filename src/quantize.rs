//! Quantization of model embeddings into circuit inputs.
//!
//! The circuit consumes a `BATCH_SIZE x EMBEDDING_DIM` matrix of integers. Each entry is the
//! corresponding embedding value rounded to the nearest integer, with ties rounded away from
//! zero. The circuit was compiled against exactly this rule: a different tie-break yields a
//! witness whose proof fails verification without any diagnostic.

use ndarray::Array2;
use serde::Serialize;

use crate::error::{PipelineError, Result};

/// Number of rows the circuit accepts.
pub const BATCH_SIZE: usize = 1;
/// Number of values per row consumed by the circuit.
pub const EMBEDDING_DIM: usize = 84;
/// Length of the raw face embedding produced by the upstream model.
pub const MODEL_EMBEDDING_LEN: usize = 512;

/// A `BATCH_SIZE x EMBEDDING_DIM` matrix of rounded embedding values.
///
/// Rows past the number of selected rows are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "Vec<Vec<i64>>")]
pub struct QuantizedEmbedding {
    values: Array2<i64>,
}

impl QuantizedEmbedding {
    /// Builds a matrix from explicit rows. Fails unless the shape is exactly
    /// `BATCH_SIZE x EMBEDDING_DIM`.
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Result<Self> {
        if rows.len() != BATCH_SIZE || rows.iter().any(|row| row.len() != EMBEDDING_DIM) {
            return Err(PipelineError::Shape(format!(
                "expected {BATCH_SIZE}x{EMBEDDING_DIM} matrix, got {} rows",
                rows.len()
            )));
        }
        let flat: Vec<i64> = rows.into_iter().flatten().collect();
        let values = Array2::from_shape_vec((BATCH_SIZE, EMBEDDING_DIM), flat)
            .map_err(|e| PipelineError::Shape(e.to_string()))?;
        Ok(Self { values })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn values(&self) -> &Array2<i64> {
        &self.values
    }

    pub fn row(&self, i: usize) -> Vec<i64> {
        self.values.row(i).to_vec()
    }

    pub fn rows(&self) -> Vec<Vec<i64>> {
        self.values.outer_iter().map(|row| row.to_vec()).collect()
    }
}

impl From<QuantizedEmbedding> for Vec<Vec<i64>> {
    fn from(quantized: QuantizedEmbedding) -> Self {
        quantized.rows()
    }
}

/// Rounds to the nearest integer, ties away from zero.
///
/// Fails on non-finite input and on values that do not fit in an `i64`.
pub fn round_half_away_from_zero(x: f32) -> Result<i64> {
    if !x.is_finite() {
        return Err(PipelineError::Shape(format!("non-finite embedding value {x}")));
    }
    // `f32::round` rounds half-way cases away from zero.
    let rounded = x.round();
    if rounded < i64::MIN as f32 || rounded >= i64::MAX as f32 {
        return Err(PipelineError::Shape(format!(
            "embedding value {x} does not fit in a 64-bit integer"
        )));
    }
    Ok(rounded as i64)
}

/// Quantizes the first `n_selected * EMBEDDING_DIM` values of `embedding`.
///
/// Row `i < n_selected`, column `j` holds `round(embedding[i * EMBEDDING_DIM + j])`; the
/// remaining rows are zero-filled so the result is always `BATCH_SIZE x EMBEDDING_DIM`.
pub fn quantize(embedding: &[f32], n_selected: usize) -> Result<QuantizedEmbedding> {
    if n_selected > BATCH_SIZE {
        return Err(PipelineError::Shape(format!(
            "cannot select {n_selected} rows, batch size is {BATCH_SIZE}"
        )));
    }
    let required = n_selected * EMBEDDING_DIM;
    if embedding.len() < required {
        return Err(PipelineError::Shape(format!(
            "embedding has {} values, {required} required for {n_selected} row(s)",
            embedding.len()
        )));
    }

    let mut values = Array2::<i64>::zeros((BATCH_SIZE, EMBEDDING_DIM));
    for i in 0..n_selected {
        for j in 0..EMBEDDING_DIM {
            values[(i, j)] = round_half_away_from_zero(embedding[i * EMBEDDING_DIM + j])?;
        }
    }

    Ok(QuantizedEmbedding { values })
}
