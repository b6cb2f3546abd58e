use ark_bn254::{Fq, Fr};
use ark_ff::PrimeField;
use ethers::types::U256;
use num_bigint::BigUint;

use crate::error::{PipelineError, Result};

/// Index of the largest element. Ties go to the lowest index; an empty slice yields 0.
pub fn argmax<T: Ord>(values: &[T]) -> usize {
    let mut index = 0;
    for (i, x) in values.iter().enumerate() {
        if *x > values[index] {
            index = i;
        }
    }
    index
}

/// Order of the BN254 scalar field (public signals, witness values).
pub fn scalar_modulus() -> BigUint {
    BigUint::from(Fr::MODULUS)
}

/// Order of the BN254 base field (curve point coordinates).
pub fn base_modulus() -> BigUint {
    BigUint::from(Fq::MODULUS)
}

/// Parses a field element written in decimal, or in hex with a `0x` prefix.
pub fn parse_field_element(s: &str) -> Result<BigUint> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex_digits) => BigUint::parse_bytes(hex_digits.as_bytes(), 16),
        None => BigUint::parse_bytes(s.as_bytes(), 10),
    };
    parsed.ok_or_else(|| PipelineError::Encoding(format!("{s:?} is not a field element")))
}

/// Converts a canonical element of the field with the given modulus to a `uint256`.
pub fn to_u256(value: &BigUint, modulus: &BigUint) -> Result<U256> {
    if value >= modulus {
        return Err(PipelineError::Encoding(format!(
            "{value} is not a canonical field element"
        )));
    }
    Ok(U256::from_big_endian(&value.to_bytes_be()))
}

pub fn from_u256(value: U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    BigUint::from_bytes_be(&bytes)
}

/// `0x`-prefixed, zero-padded 32-byte hex word.
pub fn to_hex_word(value: U256) -> String {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// Maps a signed integer into the scalar field (negative values wrap to `r - |v|`).
pub fn signed_to_scalar(value: i64) -> Fr {
    Fr::from(value)
}

pub fn scalar_to_biguint(value: Fr) -> BigUint {
    BigUint::from(value.into_bigint())
}

pub fn base_to_biguint(value: Fq) -> BigUint {
    BigUint::from(value.into_bigint())
}

/// Strict conversion into the scalar field; non-canonical values are an encoding error.
pub fn biguint_to_scalar(value: &BigUint) -> Result<Fr> {
    if *value >= scalar_modulus() {
        return Err(PipelineError::Encoding(format!(
            "{value} is not a canonical scalar field element"
        )));
    }
    Ok(Fr::from(value.clone()))
}

/// Strict conversion into the base field; non-canonical values are an encoding error.
pub fn biguint_to_base(value: &BigUint) -> Result<Fq> {
    if *value >= base_modulus() {
        return Err(PipelineError::Encoding(format!(
            "{value} is not a canonical base field element"
        )));
    }
    Ok(Fq::from(value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[3u32, 7, 2]), 1);
        assert_eq!(argmax(&[5u32, 5, 1]), 0);
        assert_eq!(argmax(&[1u32, 5, 5]), 1);
        assert_eq!(argmax::<u32>(&[]), 0);
    }

    #[test]
    fn test_parse_field_element() {
        assert_eq!(parse_field_element("42").unwrap(), BigUint::from(42u8));
        assert_eq!(parse_field_element("0x2a").unwrap(), BigUint::from(42u8));
        assert!(parse_field_element("-1").is_err());
        assert!(parse_field_element("1.5").is_err());
        assert!(parse_field_element("").is_err());
    }

    #[test]
    fn test_to_u256_rejects_non_canonical() {
        let r = scalar_modulus();
        assert!(to_u256(&(&r - 1u8), &r).is_ok());
        assert!(to_u256(&r, &r).is_err());
    }

    #[test]
    fn test_u256_roundtrip_and_hex_word() {
        let value = BigUint::from(0x1234u32);
        let word = to_u256(&value, &base_modulus()).unwrap();
        assert_eq!(from_u256(word), value);
        assert_eq!(
            to_hex_word(word),
            "0x0000000000000000000000000000000000000000000000000000000000001234"
        );
    }

    #[test]
    fn test_signed_to_scalar_wraps_negatives() {
        let minus_three = scalar_to_biguint(signed_to_scalar(-3));
        assert_eq!(minus_three, scalar_modulus() - 3u8);
        assert_eq!(scalar_to_biguint(signed_to_scalar(7)), BigUint::from(7u8));
    }

    #[test]
    fn test_moduli_order() {
        // r < q for BN254.
        assert!(scalar_modulus() < base_modulus());
        assert!(biguint_to_scalar(&scalar_modulus()).is_err());
        assert!(biguint_to_base(&scalar_modulus()).is_ok());
    }
}
