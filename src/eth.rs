//! Helpers for deploying the Solidity Groth16 verifier and pointing an [`EvmVerifier`] at it.
//!
//! The verifier contract itself is compiled outside of this crate (`snarkjs zkey export
//! solidityverifier` followed by a Solidity compiler); its hardhat-style artifact carries the
//! ABI and creation bytecode.
//!
//! # Example
//! ```no_run
//! # async fn run() -> eyre::Result<()> {
//! use std::path::Path;
//! use zk_face::eth::{EthClient, VerifierArtifact};
//!
//! let artifact = VerifierArtifact::load(Path::new("data/Verifier.json"))?;
//! let client = EthClient::new("anvil").await?;
//! let address = client.deploy_verifier(&artifact).await?;
//! let verifier = client.verifier(address, &artifact)?;
//! # Ok(())
//! # }
//! ```

use std::{env, fs, path::Path, str::FromStr, sync::Arc, time::Duration};

use ethers::{
    abi::Abi,
    contract::ContractFactory,
    middleware::SignerMiddleware,
    prelude::k256::ecdsa::SigningKey,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer, Wallet},
    types::{Address, Bytes, TransactionReceipt},
    utils::{Anvil, AnvilInstance},
};
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use tracing::info;

use crate::verifier::EvmVerifier;

/// Environment variable holding the deployer's private key for non-anvil endpoints.
pub const PRIVATE_KEY_VAR: &str = "ETH_PRIVATE_KEY";

/// The parts of a compiled contract artifact needed for deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierArtifact {
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl VerifierArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read verifier artifact {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("malformed verifier artifact {}", path.display()))?;
        if artifact.abi.function("verifyProof").is_err() {
            return Err(eyre!(
                "artifact {} has no verifyProof function",
                path.display()
            ));
        }
        Ok(artifact)
    }
}

fn print_receipt(receipt: &TransactionReceipt) {
    println!("== Transaction summary");
    println!("  Transaction hash: {:?}", receipt.transaction_hash);
    println!("  Included in block: {:?}", receipt.block_number);
    if let Some(gas_used) = receipt.gas_used {
        println!("  Gas used: {gas_used}");
    }
}

type ConcreteMiddleware = SignerMiddleware<Provider<Http>, Wallet<SigningKey>>;

/// A client to deploy verifier contracts and query them.
pub struct EthClient {
    /// Kept alive for as long as the client when connected to a local Anvil node.
    _anvil_instance: Option<AnvilInstance>,
    client: Arc<ConcreteMiddleware>,
    pub address: Address,
}

impl EthClient {
    /// Creates a new client.
    ///
    /// Arguments:
    /// - `endpoint`: The endpoint to connect to. If `anvil`, a local Anvil instance is
    ///   spawned. Otherwise, `ETH_PRIVATE_KEY` must be set and the client connects to the
    ///   given (http) endpoint.
    pub async fn new(endpoint: &str) -> Result<Self> {
        let (anvil, endpoint, wallet): (_, _, LocalWallet) = if endpoint == "anvil" {
            let anvil = Anvil::new().spawn();
            let endpoint = anvil.endpoint();
            let wallet = anvil.keys()[0].clone().into();
            (Some(anvil), endpoint, wallet)
        } else {
            let private_key = env::var(PRIVATE_KEY_VAR)
                .wrap_err_with(|| format!("{PRIVATE_KEY_VAR} is not set"))?;
            let wallet = LocalWallet::from_str(&private_key)
                .wrap_err_with(|| format!("{PRIVATE_KEY_VAR} is not a valid private key"))?;
            (None, endpoint.to_string(), wallet)
        };

        let address = wallet.address();

        let provider = Provider::<Http>::try_from(endpoint)?.interval(Duration::from_millis(10u64));
        let chain_id = provider.get_chainid().await?.as_u64();
        info!("Connected to chain {chain_id} as {address:?}");
        let client = SignerMiddleware::new(provider, wallet.with_chain_id(chain_id));

        Ok(Self {
            _anvil_instance: anvil,
            client: Arc::new(client),
            address,
        })
    }

    /// Deploys the verifier contract, returning its address.
    pub async fn deploy_verifier(&self, artifact: &VerifierArtifact) -> Result<Address> {
        let factory = ContractFactory::new(
            artifact.abi.clone(),
            artifact.bytecode.clone(),
            self.client.clone(),
        );

        let (contract, deploy_receipt) = factory.deploy(())?.send_with_receipt().await?;
        print_receipt(&deploy_receipt);
        println!("Deployed to address: {:?}", contract.address());

        Ok(contract.address())
    }

    /// A verifier bound to the contract at `address`, sharing this client's connection.
    pub fn verifier(
        &self,
        address: Address,
        artifact: &VerifierArtifact,
    ) -> Result<EvmVerifier<ConcreteMiddleware>> {
        Ok(EvmVerifier::with_abi(
            self.client.clone(),
            address,
            &artifact.abi,
        )?)
    }
}
