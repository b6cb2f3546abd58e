//! Runtime configuration, loaded from a TOML file or populated with defaults.
//!
//! ```toml
//! [circuit]
//! wasm = "circuit/model_js/model.wasm"
//! zkey = "circuit/model_final.zkey"
//! verification_key = "circuit/verification_key.json"
//!
//! [witness]
//! signal = "in"
//! n_selected = 1
//!
//! [witness.constants]
//! scale = 1000
//!
//! [verifier]
//! endpoint = "http://127.0.0.1:8545"
//! address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
//! n_public = 3
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use ethers::types::Address;
use eyre::{Result, WrapErr};
use serde::Deserialize;

use crate::{
    error::PipelineError,
    prover::SnarkjsProver,
    quantize::BATCH_SIZE,
    witness::WitnessLayout,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub circuit: CircuitConfig,

    #[serde(default)]
    pub witness: WitnessConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,
}

/// Compiled circuit artifacts and the snarkjs binary that consumes them.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitConfig {
    #[serde(default = "default_wasm")]
    pub wasm: PathBuf,

    #[serde(default = "default_zkey")]
    pub zkey: PathBuf,

    #[serde(default = "default_verification_key")]
    pub verification_key: PathBuf,

    /// The snarkjs executable, looked up on `PATH` unless absolute.
    #[serde(default = "default_snarkjs")]
    pub snarkjs: PathBuf,

    /// Scratch directory for `input.json`, `proof.json` and `public.json`.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WitnessConfig {
    /// Name of the circuit's input signal.
    #[serde(default = "default_signal")]
    pub signal: String,

    /// Signed bit width of each input value.
    #[serde(default = "default_input_bits")]
    pub input_bits: u32,

    /// Number of embedding rows passed to the circuit.
    #[serde(default = "default_n_selected")]
    pub n_selected: usize,

    /// Constant signals written alongside the embedding in every witness.
    #[serde(default)]
    pub constants: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    /// JSON-RPC endpoint. `anvil` spawns a local node.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Address of the deployed verifier contract.
    #[serde(default)]
    pub address: Option<String>,

    /// Number of public inputs the verifier was compiled for.
    #[serde(default = "default_n_public")]
    pub n_public: usize,

    /// Hardhat artifact of the verifier contract (ABI and bytecode).
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
}

fn default_wasm() -> PathBuf {
    PathBuf::from("circuit/model_js/model.wasm")
}

fn default_zkey() -> PathBuf {
    PathBuf::from("circuit/model_final.zkey")
}

fn default_verification_key() -> PathBuf {
    PathBuf::from("circuit/verification_key.json")
}

fn default_snarkjs() -> PathBuf {
    PathBuf::from("snarkjs")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("target/zk_face")
}

fn default_signal() -> String {
    "in".to_string()
}

fn default_input_bits() -> u32 {
    32
}

fn default_n_selected() -> usize {
    BATCH_SIZE
}

fn default_n_public() -> usize {
    3
}

fn default_artifact() -> PathBuf {
    PathBuf::from("data/Verifier.json")
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            wasm: default_wasm(),
            zkey: default_zkey(),
            verification_key: default_verification_key(),
            snarkjs: default_snarkjs(),
            work_dir: default_work_dir(),
        }
    }
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            signal: default_signal(),
            input_bits: default_input_bits(),
            n_selected: default_n_selected(),
            constants: BTreeMap::new(),
        }
    }
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            address: None,
            n_public: default_n_public(),
            artifact: default_artifact(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read config {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .wrap_err_with(|| format!("cannot parse config {}", path.display()))?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Config {} not found, using defaults",
                path.display()
            );
            return Ok(Config::default());
        }
        Self::load(path)
    }

    pub fn witness_layout(&self) -> WitnessLayout {
        WitnessLayout {
            signal: self.witness.signal.clone(),
            input_bits: self.witness.input_bits,
            constants: self.witness.constants.clone(),
        }
    }

    pub fn snarkjs_prover(&self) -> SnarkjsProver {
        SnarkjsProver::new(
            &self.circuit.snarkjs,
            &self.circuit.wasm,
            &self.circuit.zkey,
            &self.circuit.work_dir,
            self.verifier.n_public,
        )
    }
}

impl VerifierConfig {
    pub fn endpoint(&self) -> crate::Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| {
            PipelineError::Unavailable("no verifier endpoint configured".to_string())
        })
    }

    pub fn address(&self) -> crate::Result<Address> {
        let address = self.address.as_deref().ok_or_else(|| {
            PipelineError::Unavailable("no verifier address configured".to_string())
        })?;
        Address::from_str(address).map_err(|e| {
            PipelineError::Unavailable(format!("invalid verifier address {address:?}: {e}"))
        })
    }
}
