//! Verification through a deployed Solidity verifier contract.

use std::sync::Arc;

use async_trait::async_trait;
use ethers::{
    abi::{Abi, Function},
    providers::{Middleware, MiddlewareError},
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest},
};
use tracing::{debug, warn};

use super::Verifier;
use crate::{
    calldata::{verify_proof_function, VerifierCallArgs},
    error::{PipelineError, Result},
};

/// Calls `verifyProof` on a verifier contract with `eth_call`.
///
/// The client and contract address are passed in explicitly; the verifier holds no other
/// session state.
pub struct EvmVerifier<M> {
    client: Arc<M>,
    address: Address,
    function: Function,
}

impl<M: Middleware> EvmVerifier<M> {
    /// A verifier for a contract compiled for `num_public` public inputs.
    pub fn new(client: Arc<M>, address: Address, num_public: usize) -> Result<Self> {
        Ok(Self {
            client,
            address,
            function: verify_proof_function(num_public)?,
        })
    }

    /// A verifier whose `verifyProof` description is taken from the contract's ABI.
    pub fn with_abi(client: Arc<M>, address: Address, abi: &Abi) -> Result<Self> {
        let function = abi
            .function("verifyProof")
            .map_err(|e| PipelineError::Encoding(format!("verifier ABI: {e}")))?
            .clone();
        Ok(Self {
            client,
            address,
            function,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The `eth_call` transaction for `args`.
    pub fn call_request(&self, args: &VerifierCallArgs) -> Result<TypedTransaction> {
        let calldata = self
            .function
            .encode_input(&args.to_tokens())
            .map_err(|e| PipelineError::Encoding(e.to_string()))?;
        Ok(TransactionRequest::new()
            .to(self.address)
            .data(calldata)
            .into())
    }

    fn decode_result(&self, output: &[u8]) -> Result<bool> {
        let tokens = self
            .function
            .decode_output(output)
            .map_err(|e| PipelineError::Verification(format!("undecodable result: {e}")))?;
        tokens
            .into_iter()
            .next()
            .and_then(|token| token.into_bool())
            .ok_or_else(|| PipelineError::Verification("verifier did not return a bool".to_string()))
    }
}

#[async_trait]
impl<M: Middleware + 'static> Verifier for EvmVerifier<M> {
    async fn verify(&self, args: &VerifierCallArgs) -> Result<bool> {
        let tx = self.call_request(args)?;
        debug!("Calling verifyProof on {:?}", self.address);

        match self.client.call(&tx, None).await {
            Ok(output) => self.decode_result(&output),
            Err(err) => match err.as_error_response() {
                // The node answered: the call itself reverted.
                Some(response) => {
                    warn!("verifyProof reverted: {}", response.message);
                    Err(PipelineError::Verification(response.message.clone()))
                }
                None => Err(PipelineError::Unavailable(err.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::{
        abi::{encode, Token},
        providers::{Http, Provider},
    };

    use super::*;
    use crate::calldata::ArgumentBuilder;
    use crate::proof::{G1Point, G2Point, Proof, PublicSignals};

    fn args() -> VerifierCallArgs {
        let one = || num_bigint::BigUint::from(1u8);
        let proof = Proof {
            a: G1Point { x: one(), y: one() },
            b: G2Point {
                x: [one(), one()],
                y: [one(), one()],
            },
            c: G1Point { x: one(), y: one() },
        };
        ArgumentBuilder::new(3)
            .build(&proof, &PublicSignals::from(vec![3, 7, 2]))
            .unwrap()
    }

    fn verifier(endpoint: &str) -> EvmVerifier<Provider<Http>> {
        let provider = Provider::<Http>::try_from(endpoint).unwrap();
        EvmVerifier::new(Arc::new(provider), Address::from_low_u64_be(0x42), 3).unwrap()
    }

    #[test]
    fn test_call_request_matches_encoded_calldata() {
        let verifier = verifier("http://127.0.0.1:8545");
        let tx = verifier.call_request(&args()).unwrap();
        assert_eq!(tx.to_addr(), Some(&Address::from_low_u64_be(0x42)));
        assert_eq!(tx.data().unwrap(), &args().encode_calldata().unwrap());
    }

    #[test]
    fn test_decode_result() {
        let verifier = verifier("http://127.0.0.1:8545");
        assert!(verifier.decode_result(&encode(&[Token::Bool(true)])).unwrap());
        assert!(!verifier.decode_result(&encode(&[Token::Bool(false)])).unwrap());
        assert!(matches!(
            verifier.decode_result(&[]),
            Err(PipelineError::Verification(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_unavailable() {
        // Nothing listens on port 9 (discard); the connection is refused.
        let verifier = verifier("http://127.0.0.1:9");
        assert!(matches!(
            verifier.verify(&args()).await,
            Err(PipelineError::Unavailable(_))
        ));
    }
}
