//! Proving through the snarkjs command line (`snarkjs groth16 fullprove`).

use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::debug;

use super::ProvingBackend;
use crate::{
    error::{PipelineError, Result},
    proof::{Proof, PublicSignals},
    witness::Witness,
};

const INPUT_FILE: &str = "input.json";
const PROOF_FILE: &str = "proof.json";
const PUBLIC_FILE: &str = "public.json";

/// Runs the circom witness generator and Groth16 prover for a compiled circuit.
///
/// Each instance owns a working directory for its intermediate files; two instances must
/// not share one.
#[derive(Debug, Clone)]
pub struct SnarkjsProver {
    snarkjs: PathBuf,
    wasm: PathBuf,
    zkey: PathBuf,
    work_dir: PathBuf,
    num_public: usize,
}

impl SnarkjsProver {
    pub fn new(
        snarkjs: impl Into<PathBuf>,
        wasm: impl Into<PathBuf>,
        zkey: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        num_public: usize,
    ) -> Self {
        Self {
            snarkjs: snarkjs.into(),
            wasm: wasm.into(),
            zkey: zkey.into(),
            work_dir: work_dir.into(),
            num_public,
        }
    }

    fn resolve_artifact(path: &Path, what: &str) -> Result<PathBuf> {
        if !path.is_file() {
            return Err(PipelineError::Proving(format!(
                "{what} not found at {}",
                path.display()
            )));
        }
        fs::canonicalize(path).map_err(|e| {
            PipelineError::Proving(format!("cannot resolve {what} {}: {e}", path.display()))
        })
    }

    /// The argument list passed to snarkjs. Input and output files are relative to the
    /// working directory, so the circuit artifacts must be given as absolute paths.
    pub fn command_args(wasm: &Path, zkey: &Path) -> Vec<String> {
        vec![
            "groth16".to_string(),
            "fullprove".to_string(),
            INPUT_FILE.to_string(),
            wasm.display().to_string(),
            zkey.display().to_string(),
            PROOF_FILE.to_string(),
            PUBLIC_FILE.to_string(),
        ]
    }

    fn read_outputs(&self) -> Result<(Proof, PublicSignals)> {
        let read = |name: &str| {
            fs::read_to_string(self.work_dir.join(name)).map_err(|e| {
                PipelineError::Proving(format!("cannot read {name} written by snarkjs: {e}"))
            })
        };
        let proof: Proof = serde_json::from_str(&read(PROOF_FILE)?)
            .map_err(|e| PipelineError::Proving(format!("malformed {PROOF_FILE}: {e}")))?;
        let public_signals: PublicSignals = serde_json::from_str(&read(PUBLIC_FILE)?)
            .map_err(|e| PipelineError::Proving(format!("malformed {PUBLIC_FILE}: {e}")))?;
        Ok((proof, public_signals))
    }
}

impl ProvingBackend for SnarkjsProver {
    fn num_public(&self) -> usize {
        self.num_public
    }

    fn prove(&self, witness: Witness) -> Result<(Proof, PublicSignals)> {
        let wasm = Self::resolve_artifact(&self.wasm, "circuit wasm")?;
        let zkey = Self::resolve_artifact(&self.zkey, "proving key")?;
        let args = Self::command_args(&wasm, &zkey);

        fs::create_dir_all(&self.work_dir).map_err(|e| {
            PipelineError::Proving(format!(
                "cannot create working directory {}: {e}",
                self.work_dir.display()
            ))
        })?;
        // Stale outputs from a previous run must never be mistaken for this run's.
        for name in [PROOF_FILE, PUBLIC_FILE] {
            let _ = fs::remove_file(self.work_dir.join(name));
        }
        fs::write(
            self.work_dir.join(INPUT_FILE),
            serde_json::to_vec(&witness.to_json())?,
        )
        .map_err(|e| PipelineError::Proving(format!("cannot write {INPUT_FILE}: {e}")))?;

        debug!("Running {} {}", self.snarkjs.display(), args.join(" "));
        let output = Command::new(&self.snarkjs)
            .args(&args)
            .current_dir(&self.work_dir)
            .output()
            .map_err(|e| {
                PipelineError::Proving(format!(
                    "cannot run {}: {e}",
                    self.snarkjs.display()
                ))
            })?;

        if !output.status.success() {
            return Err(PipelineError::Proving(format!(
                "snarkjs exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        self.read_outputs()
    }
}
