//! In-process Groth16 verification over BN254.
//!
//! Consumes the same [`VerifierCallArgs`] as the on-chain verifier, so the argument builder's
//! output is checked exactly as a contract would see it, `Fq2` ordering included.

use ark_bn254::{Bn254, Fq2, Fr, G1Affine, G2Affine};
use ark_groth16::{
    prepare_verifying_key, Groth16, PreparedVerifyingKey, Proof as ArkProof, VerifyingKey,
};
use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Verifier;
use crate::{
    calldata::VerifierCallArgs,
    error::{PipelineError, Result},
    proof::{parse_g1, parse_g2, render_g1, render_g2, G1Point, G2Point},
    utils::{biguint_to_base, biguint_to_scalar, from_u256},
};

/// A Groth16 verification key in the `verification_key.json` layout of
/// `snarkjs zkey export verificationkey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnarkjsVerificationKey", into = "SnarkjsVerificationKey")]
pub struct VerificationKey {
    pub alpha: G1Point,
    pub beta: G2Point,
    pub gamma: G2Point,
    pub delta: G2Point,
    /// `IC[0]` is the constant term; one further point per public input.
    pub ic: Vec<G1Point>,
}

impl VerificationKey {
    pub fn num_public(&self) -> usize {
        self.ic.len().saturating_sub(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnarkjsVerificationKey {
    #[serde(default = "default_protocol")]
    protocol: String,
    #[serde(default = "default_curve")]
    curve: String,
    n_public: usize,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

fn default_protocol() -> String {
    "groth16".to_string()
}

fn default_curve() -> String {
    "bn128".to_string()
}

impl TryFrom<SnarkjsVerificationKey> for VerificationKey {
    type Error = PipelineError;

    fn try_from(raw: SnarkjsVerificationKey) -> Result<Self> {
        if raw.protocol != "groth16" {
            return Err(PipelineError::Encoding(format!(
                "unsupported verification key protocol {:?}",
                raw.protocol
            )));
        }
        if raw.ic.len() != raw.n_public + 1 {
            return Err(PipelineError::Encoding(format!(
                "verification key declares {} public inputs but has {} IC points",
                raw.n_public,
                raw.ic.len()
            )));
        }
        Ok(Self {
            alpha: parse_g1("vk_alpha_1", &raw.vk_alpha_1)?,
            beta: parse_g2("vk_beta_2", &raw.vk_beta_2)?,
            gamma: parse_g2("vk_gamma_2", &raw.vk_gamma_2)?,
            delta: parse_g2("vk_delta_2", &raw.vk_delta_2)?,
            ic: raw
                .ic
                .iter()
                .map(|p| parse_g1("IC", p))
                .collect::<Result<Vec<_>>>()?,
        })
    }
}

impl From<VerificationKey> for SnarkjsVerificationKey {
    fn from(vk: VerificationKey) -> Self {
        Self {
            protocol: default_protocol(),
            curve: default_curve(),
            n_public: vk.num_public(),
            vk_alpha_1: render_g1(&vk.alpha),
            vk_beta_2: render_g2(&vk.beta),
            vk_gamma_2: render_g2(&vk.gamma),
            vk_delta_2: render_g2(&vk.delta),
            ic: vk.ic.iter().map(render_g1).collect(),
        }
    }
}

impl From<&VerifyingKey<Bn254>> for VerificationKey {
    fn from(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            alpha: G1Point::from(&vk.alpha_g1),
            beta: G2Point::from(&vk.beta_g2),
            gamma: G2Point::from(&vk.gamma_g2),
            delta: G2Point::from(&vk.delta_g2),
            ic: vk.gamma_abc_g1.iter().map(G1Point::from).collect(),
        }
    }
}

fn check_point(name: &str, on_curve: bool, in_subgroup: bool) -> Result<()> {
    if !on_curve {
        return Err(PipelineError::Verification(format!("{name} is not on the curve")));
    }
    if !in_subgroup {
        return Err(PipelineError::Verification(format!(
            "{name} is not in the prime order subgroup"
        )));
    }
    Ok(())
}

fn to_g1(name: &str, p: &G1Point) -> Result<G1Affine> {
    let x = biguint_to_base(&p.x)?;
    let y = biguint_to_base(&p.y)?;
    // (0, 0) is how the point at infinity is written.
    let point = if p.x.bits() == 0 && p.y.bits() == 0 {
        G1Affine::identity()
    } else {
        G1Affine::new_unchecked(x, y)
    };
    check_point(
        name,
        point.is_on_curve(),
        point.is_in_correct_subgroup_assuming_on_curve(),
    )?;
    Ok(point)
}

fn to_g2(name: &str, p: &G2Point) -> Result<G2Affine> {
    let fq2 = |c: &[BigUint; 2]| -> Result<Fq2> {
        Ok(Fq2::new(biguint_to_base(&c[0])?, biguint_to_base(&c[1])?))
    };
    let point = if p.x.iter().chain(&p.y).all(|c| c.bits() == 0) {
        G2Affine::identity()
    } else {
        G2Affine::new_unchecked(fq2(&p.x)?, fq2(&p.y)?)
    };
    check_point(
        name,
        point.is_on_curve(),
        point.is_in_correct_subgroup_assuming_on_curve(),
    )?;
    Ok(point)
}

impl TryFrom<&VerificationKey> for VerifyingKey<Bn254> {
    type Error = PipelineError;

    fn try_from(vk: &VerificationKey) -> Result<Self> {
        // A malformed key is a configuration problem, not a rejected proof.
        let malformed =
            |e: PipelineError| PipelineError::Verification(format!("verification key: {e}"));
        Ok(VerifyingKey {
            alpha_g1: to_g1("alpha", &vk.alpha).map_err(malformed)?,
            beta_g2: to_g2("beta", &vk.beta).map_err(malformed)?,
            gamma_g2: to_g2("gamma", &vk.gamma).map_err(malformed)?,
            delta_g2: to_g2("delta", &vk.delta).map_err(malformed)?,
            gamma_abc_g1: vk
                .ic
                .iter()
                .map(|p| to_g1("IC", p))
                .collect::<Result<Vec<_>>>()
                .map_err(malformed)?,
        })
    }
}

/// Verifies proofs against a verification key held in memory.
pub struct LocalVerifier {
    prepared: PreparedVerifyingKey<Bn254>,
    num_public: usize,
}

impl LocalVerifier {
    pub fn new(vk: &VerificationKey) -> Result<Self> {
        Ok(Self::from_verifying_key(&VerifyingKey::try_from(vk)?))
    }

    pub fn from_verifying_key(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            num_public: vk.gamma_abc_g1.len().saturating_sub(1),
            prepared: prepare_verifying_key(vk),
        }
    }

    pub fn num_public(&self) -> usize {
        self.num_public
    }

    /// The proof points, or `None` when one is not a valid curve point.
    fn proof(args: &VerifierCallArgs) -> Option<ArkProof<Bn254>> {
        let word = from_u256;
        let a = G1Point {
            x: word(args.a[0]),
            y: word(args.a[1]),
        };
        // Undo the EIP-197 ordering: calldata carries [c1, c0].
        let b = G2Point {
            x: [word(args.b[0][1]), word(args.b[0][0])],
            y: [word(args.b[1][1]), word(args.b[1][0])],
        };
        let c = G1Point {
            x: word(args.c[0]),
            y: word(args.c[1]),
        };
        let rejected = |e: PipelineError| debug!("Rejecting proof: {e}");
        Some(ArkProof {
            a: to_g1("a", &a).map_err(rejected).ok()?,
            b: to_g2("b", &b).map_err(rejected).ok()?,
            c: to_g1("c", &c).map_err(rejected).ok()?,
        })
    }

    fn inputs(args: &VerifierCallArgs) -> Result<Vec<Fr>> {
        args.input
            .iter()
            .map(|w| {
                biguint_to_scalar(&from_u256(*w))
                    .map_err(|e| PipelineError::Verification(e.to_string()))
            })
            .collect()
    }

    fn check(&self, args: &VerifierCallArgs) -> Result<bool> {
        if args.input.len() != self.num_public {
            return Err(PipelineError::Verification(format!(
                "verification key expects {} public inputs, got {}",
                self.num_public,
                args.input.len()
            )));
        }
        // A corrupted proof point is an invalid proof, not a verifier failure.
        let Some(proof) = Self::proof(args) else {
            return Ok(false);
        };
        let inputs = Self::inputs(args)?;
        Groth16::<Bn254>::verify_proof(&self.prepared, &proof, &inputs)
            .map_err(|e| PipelineError::Verification(e.to_string()))
    }
}

#[async_trait]
impl Verifier for LocalVerifier {
    async fn verify(&self, args: &VerifierCallArgs) -> Result<bool> {
        let verified = self.check(args)?;
        debug!("Local pairing check: {verified}");
        Ok(verified)
    }
}

#[cfg(test)]
mod tests {
    use ark_ec::AffineRepr;
    use ethers::types::U256;
    use serde_json::json;

    use super::*;

    fn generator_g1() -> Vec<String> {
        vec!["1".to_string(), "2".to_string(), "1".to_string()]
    }

    fn raw_key(n_public: usize, ic: usize) -> serde_json::Value {
        let g2 = G2Point::from(&G2Affine::generator());
        let g2 = render_g2(&g2);
        json!({
            "protocol": "groth16",
            "curve": "bn128",
            "nPublic": n_public,
            "vk_alpha_1": generator_g1(),
            "vk_beta_2": g2,
            "vk_gamma_2": g2,
            "vk_delta_2": g2,
            "IC": vec![generator_g1(); ic],
        })
    }

    #[test]
    fn test_parse_verification_key() {
        let vk: VerificationKey = serde_json::from_value(raw_key(3, 4)).unwrap();
        assert_eq!(vk.num_public(), 3);
        assert_eq!(vk.alpha, G1Point::from(&G1Affine::generator()));

        let verifier = LocalVerifier::new(&vk).unwrap();
        assert_eq!(verifier.num_public(), 3);
    }

    #[test]
    fn test_verification_key_json_layout() {
        let vk: VerificationKey = serde_json::from_value(raw_key(3, 4)).unwrap();
        assert_eq!(serde_json::to_value(&vk).unwrap(), raw_key(3, 4));
    }

    #[test]
    fn test_inconsistent_verification_key() {
        assert!(serde_json::from_value::<VerificationKey>(raw_key(3, 2)).is_err());
    }

    #[test]
    fn test_point_off_curve_is_a_verification_error() {
        let mut vk: VerificationKey = serde_json::from_value(raw_key(1, 2)).unwrap();
        vk.alpha.y = BigUint::from(3u8);
        assert!(matches!(
            LocalVerifier::new(&vk),
            Err(PipelineError::Verification(_))
        ));
    }

    #[test]
    fn test_proof_point_off_curve_is_rejected() {
        let vk: VerificationKey = serde_json::from_value(raw_key(1, 2)).unwrap();
        let verifier = LocalVerifier::new(&vk).unwrap();
        let one = U256::one;
        let two = || U256::from(2u8);
        let mut args = VerifierCallArgs {
            a: [one(), two()],
            b: [[one(), one()], [one(), one()]],
            c: [one(), two()],
            input: vec![one()],
        };
        // (1, 3) is not on y^2 = x^3 + 3.
        args.a[1] = U256::from(3u8);
        assert!(!verifier.check(&args).unwrap());

        // Neither is a coordinate at or above the base field modulus.
        args.a[1] = U256::MAX;
        assert!(!verifier.check(&args).unwrap());

        // The input count is still checked before the proof.
        args.input.clear();
        assert!(matches!(
            verifier.check(&args),
            Err(PipelineError::Verification(_))
        ));
    }

    #[test]
    fn test_infinity_is_accepted() {
        let zero = || BigUint::from(0u8);
        let point = to_g1("p", &G1Point { x: zero(), y: zero() }).unwrap();
        assert!(point.is_zero());
    }
}
