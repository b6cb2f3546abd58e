//! Circuit witness construction.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
    error::{PipelineError, Result},
    quantize::QuantizedEmbedding,
};

/// How the circuit expects its private input: the signal name it is bound to, the signed
/// bit width every value must fit in, and any constant signals fixed at compile time.
#[derive(Debug, Clone, PartialEq)]
pub struct WitnessLayout {
    pub signal: String,
    pub input_bits: u32,
    pub constants: BTreeMap<String, Value>,
}

impl Default for WitnessLayout {
    fn default() -> Self {
        Self {
            signal: "in".to_string(),
            input_bits: 32,
            constants: BTreeMap::new(),
        }
    }
}

impl WitnessLayout {
    /// Inclusive range of values the circuit accepts.
    pub fn input_range(&self) -> (i64, i64) {
        let bits = self.input_bits.clamp(1, 64);
        if bits == 64 {
            return (i64::MIN, i64::MAX);
        }
        let half = 1i64 << (bits - 1);
        (-half, half - 1)
    }
}

/// The private input of a single proof request.
///
/// Built fresh for every request and handed to the proving backend by value.
#[derive(Debug, Clone, PartialEq)]
pub struct Witness {
    signal: String,
    rows: Vec<Vec<i64>>,
    constants: BTreeMap<String, Value>,
}

impl Witness {
    /// Binds `quantized` to the layout's input signal.
    ///
    /// Fails with [`PipelineError::Proving`] when a value falls outside the circuit's input
    /// range: the circuit's constraints could not be satisfied by such a witness.
    pub fn new(layout: &WitnessLayout, quantized: &QuantizedEmbedding) -> Result<Self> {
        let (min, max) = layout.input_range();
        if let Some(((i, j), value)) = quantized
            .values()
            .indexed_iter()
            .find(|(_, v)| **v < min || **v > max)
        {
            return Err(PipelineError::Proving(format!(
                "witness value {value} at [{i}][{j}] is outside the circuit input range [{min}, {max}]"
            )));
        }

        Ok(Self {
            signal: layout.signal.clone(),
            rows: quantized.rows(),
            constants: layout.constants.clone(),
        })
    }

    pub fn rows(&self) -> &[Vec<i64>] {
        &self.rows
    }

    /// The witness as the JSON object consumed by circom witness generators,
    /// e.g. `{"in": [[1, -2, ...]]}`.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (name, value) in &self.constants {
            object.insert(name.clone(), value.clone());
        }
        object.insert(self.signal.clone(), serde_json::json!(self.rows));
        Value::Object(object)
    }
}
