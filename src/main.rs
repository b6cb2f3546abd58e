use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use ethers::providers::{Http, Provider};
use eyre::Result;
use rand_core::OsRng;
use zk_face::{
    calldata::ArgumentBuilder,
    eth::{EthClient, VerifierArtifact},
    io::{load_proof, load_public_signals, load_verification_key, write_json},
    load_classifier, load_embedding, quantize, Config, EvmVerifier, LocalVerifier, NativeProver,
    Pipeline, ProofRequestor, Verifier,
};

#[derive(Parser)]
#[clap(name = "zk-face")]
#[clap(version)]
#[clap(author)]
#[clap(about)]
struct Arguments {
    /// Path to the TOML configuration file
    #[clap(long, default_value = "zk_face.toml")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Quantize an embedding and print the circuit input matrix
    Quantize { embedding_path: PathBuf },
    /// Prove the classification of an embedding with snarkjs
    Prove {
        embedding_path: PathBuf,
        /// Directory to write proof.json and public.json to
        #[clap(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print the verifyProof arguments for a proof, as `snarkjs zkey export soliditycalldata` does
    Calldata {
        proof_path: PathBuf,
        public_path: PathBuf,
    },
    /// Verify a proof against the deployed verifier contract
    Verify {
        proof_path: PathBuf,
        public_path: PathBuf,
        /// Check the pairing locally against the configured verification key instead
        #[clap(long)]
        local: bool,
    },
    /// Deploy the verifier contract
    Deploy {
        /// Compiled contract artifact (defaults to the configured one)
        artifact_path: Option<PathBuf>,
    },
    /// Run the whole pipeline in process, with a freshly set up classifier circuit
    Demo {
        embedding_path: PathBuf,
        classifier_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Arguments = Arguments::parse();
    let config = Config::load_or_default(&args.config)?;

    match args.command {
        Commands::Quantize { embedding_path } => {
            let embedding = load_embedding(&embedding_path)?;
            let quantized = quantize(&embedding, config.witness.n_selected)?;
            println!("{}", serde_json::to_string(&quantized)?);

            Ok(())
        }
        Commands::Prove {
            embedding_path,
            out_dir,
        } => {
            let embedding = load_embedding(&embedding_path)?;
            let quantized = quantize(&embedding, config.witness.n_selected)?;

            let requestor = ProofRequestor::new(config.snarkjs_prover(), config.witness_layout());
            let (proof, public_signals) = requestor.request_proof(&quantized).await?;

            write_json(&out_dir.join("proof.json"), &proof)?;
            write_json(&out_dir.join("public.json"), &public_signals)?;
            println!("Public signals: {public_signals}");
            println!("Prediction: {}", public_signals.prediction());

            Ok(())
        }
        Commands::Calldata {
            proof_path,
            public_path,
        } => {
            let proof = load_proof(&proof_path)?;
            let public_signals = load_public_signals(&public_path)?;
            let args = ArgumentBuilder::new(public_signals.len()).build(&proof, &public_signals)?;
            println!("{}", args.to_solidity_calldata());

            Ok(())
        }
        Commands::Verify {
            proof_path,
            public_path,
            local,
        } => {
            let proof = load_proof(&proof_path)?;
            let public_signals = load_public_signals(&public_path)?;
            let args =
                ArgumentBuilder::new(config.verifier.n_public).build(&proof, &public_signals)?;

            let verified = if local {
                let vk = load_verification_key(&config.circuit.verification_key)?;
                LocalVerifier::new(&vk)?.verify(&args).await?
            } else {
                let provider = Provider::<Http>::try_from(config.verifier.endpoint()?)?;
                let verifier = EvmVerifier::new(
                    Arc::new(provider),
                    config.verifier.address()?,
                    config.verifier.n_public,
                )?;
                verifier.verify(&args).await?
            };
            println!("Verified: {verified}");

            Ok(())
        }
        Commands::Deploy { artifact_path } => {
            let artifact_path = artifact_path.unwrap_or(config.verifier.artifact.clone());
            let artifact = VerifierArtifact::load(&artifact_path)?;

            let client = EthClient::new(config.verifier.endpoint()?).await?;
            client.deploy_verifier(&artifact).await?;

            Ok(())
        }
        Commands::Demo {
            embedding_path,
            classifier_path,
        } => {
            let embedding = load_embedding(&embedding_path)?;
            let classifier = load_classifier(&classifier_path)?;

            println!("Generating keys...");
            let (prover, vk) = NativeProver::setup(classifier, &mut OsRng)?;
            let pipeline = Pipeline::new(
                prover,
                config.witness_layout(),
                LocalVerifier::from_verifying_key(&vk),
            )
            .with_n_selected(config.witness.n_selected);

            println!("Proving...");
            let classification = pipeline.classify_and_prove(&embedding).await?;
            println!("Public signals: {}", classification.public_signals);
            println!("Prediction: {}", classification.prediction);

            println!("Verifying...");
            let verified = pipeline.verify().await?;
            println!("Verified: {verified} ({})", pipeline.state());

            Ok(())
        }
    }
}
