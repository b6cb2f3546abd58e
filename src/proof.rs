//! Typed Groth16 proof artifacts.
//!
//! Proofs and public signals travel between the prover and the verifier in the JSON layout
//! emitted by snarkjs (`proof.json` / `public.json`). The untyped layout is parsed into
//! fixed records here, so a proof with the wrong number of coordinates or a projective
//! point that is not normalized can never reach the argument builder.

use std::fmt;

use ark_bn254::{Bn254, G1Affine, G2Affine};
use ark_groth16::Proof as ArkProof;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, Result},
    utils::{argmax, base_to_biguint, parse_field_element},
};

/// An affine point on the BN254 G1 curve, as raw base-field coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct G1Point {
    pub x: BigUint,
    pub y: BigUint,
}

/// An affine point on the BN254 G2 twist. Each coordinate is an `Fq2` element written
/// as `[c0, c1]`, i.e. `c0 + c1 * u`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct G2Point {
    pub x: [BigUint; 2],
    pub y: [BigUint; 2],
}

/// A Groth16 proof `(A, B, C)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnarkjsProof", into = "SnarkjsProof")]
pub struct Proof {
    pub a: G1Point,
    pub b: G2Point,
    pub c: G1Point,
}

/// The circuit's public outputs, one field element per class score.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct PublicSignals(Vec<BigUint>);

impl PublicSignals {
    pub fn new(values: Vec<BigUint>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[BigUint] {
        &self.0
    }

    /// Index of the highest score; ties resolve to the lowest index.
    pub fn prediction(&self) -> usize {
        argmax(&self.0)
    }
}

impl From<Vec<u64>> for PublicSignals {
    fn from(values: Vec<u64>) -> Self {
        Self(values.into_iter().map(BigUint::from).collect())
    }
}

impl TryFrom<Vec<String>> for PublicSignals {
    type Error = PipelineError;

    fn try_from(values: Vec<String>) -> Result<Self> {
        values
            .iter()
            .map(|s| parse_field_element(s))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }
}

impl From<PublicSignals> for Vec<String> {
    fn from(signals: PublicSignals) -> Self {
        signals.0.iter().map(|v| v.to_string()).collect()
    }
}

impl fmt::Display for PublicSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}

/// The proof layout written by `snarkjs groth16 prove`.
///
/// Points are projective: `pi_a = [x, y, z]`, `pi_b = [[x.c0, x.c1], [y.c0, y.c1], [z.c0, z.c1]]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
}

fn default_protocol() -> String {
    "groth16".to_string()
}

fn default_curve() -> String {
    "bn128".to_string()
}

fn shape_error(what: &str, detail: impl fmt::Display) -> PipelineError {
    PipelineError::Encoding(format!("malformed {what}: {detail}"))
}

pub(crate) fn parse_g1(name: &str, coords: &[String]) -> Result<G1Point> {
    match coords {
        [x, y, z] => {
            if parse_field_element(z)? != BigUint::from(1u8) {
                return Err(shape_error(name, "projective z coordinate is not 1"));
            }
            Ok(G1Point {
                x: parse_field_element(x)?,
                y: parse_field_element(y)?,
            })
        }
        _ => Err(shape_error(
            name,
            format!("expected 3 coordinates, got {}", coords.len()),
        )),
    }
}

fn parse_fq2(name: &str, coords: &[String]) -> Result<[BigUint; 2]> {
    match coords {
        [c0, c1] => Ok([parse_field_element(c0)?, parse_field_element(c1)?]),
        _ => Err(shape_error(
            name,
            format!("expected an Fq2 pair, got {} values", coords.len()),
        )),
    }
}

pub(crate) fn parse_g2(name: &str, coords: &[Vec<String>]) -> Result<G2Point> {
    match coords {
        [x, y, z] => {
            let z = parse_fq2(name, z)?;
            if z != [BigUint::from(1u8), BigUint::from(0u8)] {
                return Err(shape_error(name, "projective z coordinate is not [1, 0]"));
            }
            Ok(G2Point {
                x: parse_fq2(name, x)?,
                y: parse_fq2(name, y)?,
            })
        }
        _ => Err(shape_error(
            name,
            format!("expected 3 coordinates, got {}", coords.len()),
        )),
    }
}

impl TryFrom<SnarkjsProof> for Proof {
    type Error = PipelineError;

    fn try_from(raw: SnarkjsProof) -> Result<Self> {
        if raw.protocol != "groth16" {
            return Err(shape_error("proof", format!("protocol {:?}", raw.protocol)));
        }
        Ok(Self {
            a: parse_g1("pi_a", &raw.pi_a)?,
            b: parse_g2("pi_b", &raw.pi_b)?,
            c: parse_g1("pi_c", &raw.pi_c)?,
        })
    }
}

pub(crate) fn render_g1(p: &G1Point) -> Vec<String> {
    vec![p.x.to_string(), p.y.to_string(), "1".to_string()]
}

pub(crate) fn render_g2(p: &G2Point) -> Vec<Vec<String>> {
    let fq2 = |c: &[BigUint; 2]| vec![c[0].to_string(), c[1].to_string()];
    vec![fq2(&p.x), fq2(&p.y), vec!["1".to_string(), "0".to_string()]]
}

impl From<Proof> for SnarkjsProof {
    fn from(proof: Proof) -> Self {
        Self {
            pi_a: render_g1(&proof.a),
            pi_b: render_g2(&proof.b),
            pi_c: render_g1(&proof.c),
            protocol: default_protocol(),
            curve: default_curve(),
        }
    }
}

impl From<&G1Affine> for G1Point {
    fn from(p: &G1Affine) -> Self {
        if p.infinity {
            return Self {
                x: BigUint::from(0u8),
                y: BigUint::from(0u8),
            };
        }
        Self {
            x: base_to_biguint(p.x),
            y: base_to_biguint(p.y),
        }
    }
}

impl From<&G2Affine> for G2Point {
    fn from(p: &G2Affine) -> Self {
        if p.infinity {
            let zero = || BigUint::from(0u8);
            return Self {
                x: [zero(), zero()],
                y: [zero(), zero()],
            };
        }
        Self {
            x: [base_to_biguint(p.x.c0), base_to_biguint(p.x.c1)],
            y: [base_to_biguint(p.y.c0), base_to_biguint(p.y.c1)],
        }
    }
}

impl From<&ArkProof<Bn254>> for Proof {
    fn from(proof: &ArkProof<Bn254>) -> Self {
        Self {
            a: G1Point::from(&proof.a),
            b: G2Point::from(&proof.b),
            c: G1Point::from(&proof.c),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_proof() -> serde_json::Value {
        json!({
            "pi_a": ["1", "2", "1"],
            "pi_b": [["3", "4"], ["5", "6"], ["1", "0"]],
            "pi_c": ["7", "8", "1"],
            "protocol": "groth16",
            "curve": "bn128"
        })
    }

    #[test]
    fn test_parse_snarkjs_proof() {
        let proof: Proof = serde_json::from_value(raw_proof()).unwrap();
        assert_eq!(proof.a.x, BigUint::from(1u8));
        assert_eq!(proof.b.x, [BigUint::from(3u8), BigUint::from(4u8)]);
        assert_eq!(proof.b.y, [BigUint::from(5u8), BigUint::from(6u8)]);
        assert_eq!(proof.c.y, BigUint::from(8u8));
    }

    #[test]
    fn test_serialize_restores_snarkjs_layout() {
        let proof: Proof = serde_json::from_value(raw_proof()).unwrap();
        assert_eq!(serde_json::to_value(&proof).unwrap(), raw_proof());
    }

    #[test]
    fn test_rejects_wrong_coordinate_counts() {
        let mut raw = raw_proof();
        raw["pi_a"] = json!(["1", "2"]);
        assert!(serde_json::from_value::<Proof>(raw).is_err());

        let mut raw = raw_proof();
        raw["pi_b"] = json!([["3", "4"], ["5", "6"]]);
        assert!(serde_json::from_value::<Proof>(raw).is_err());

        let mut raw = raw_proof();
        raw["pi_b"] = json!([["3", "4", "9"], ["5", "6"], ["1", "0"]]);
        assert!(serde_json::from_value::<Proof>(raw).is_err());
    }

    #[test]
    fn test_rejects_unnormalized_points() {
        let mut raw = raw_proof();
        raw["pi_c"] = json!(["7", "8", "2"]);
        let err = Proof::try_from(serde_json::from_value::<SnarkjsProof>(raw).unwrap());
        assert!(matches!(err, Err(PipelineError::Encoding(_))));
    }

    #[test]
    fn test_rejects_other_protocols() {
        let mut raw = raw_proof();
        raw["protocol"] = json!("plonk");
        assert!(serde_json::from_value::<Proof>(raw).is_err());
    }

    #[test]
    fn test_public_signals_json() {
        let signals: PublicSignals = serde_json::from_str(r#"["3", "7", "2"]"#).unwrap();
        assert_eq!(signals, PublicSignals::from(vec![3, 7, 2]));
        assert_eq!(serde_json::to_string(&signals).unwrap(), r#"["3","7","2"]"#);
        assert!(serde_json::from_str::<PublicSignals>(r#"["3", "x"]"#).is_err());
    }

    #[test]
    fn test_prediction() {
        assert_eq!(PublicSignals::from(vec![3, 7, 2]).prediction(), 1);
        assert_eq!(PublicSignals::from(vec![5, 5, 1]).prediction(), 0);
    }
}
