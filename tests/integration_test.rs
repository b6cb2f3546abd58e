use std::path::Path;

use ethers::types::U256;
use num_bigint::BigUint;
use rand::{rngs::StdRng, SeedableRng};
use zk_face::{
    checked_in_test_data::*,
    eth::{EthClient, VerifierArtifact},
    io::{load_proof, load_public_signals},
    load_classifier, load_embedding, quantize,
    utils::base_modulus,
    ArgumentBuilder, LocalVerifier, NativeProver, Pipeline, PipelineState, ProofRequestor,
    PublicSignals, VerificationKey, Verifier, WitnessLayout,
};

fn setup() -> (NativeProver, LocalVerifier) {
    let classifier = load_classifier(Path::new(CLASSIFIER_PATH)).unwrap();
    let (prover, vk) = NativeProver::setup(classifier, &mut StdRng::seed_from_u64(42)).unwrap();
    (prover, LocalVerifier::from_verifying_key(&vk))
}

#[test]
fn snapshot_quantized_embedding() {
    let embedding = load_embedding(Path::new(EMBEDDING_PATH)).unwrap();
    let quantized = quantize(&embedding, 1).unwrap();

    let expected: Vec<Vec<i64>> =
        serde_json::from_str(&std::fs::read_to_string(QUANTIZED_PATH).unwrap()).unwrap();
    assert_eq!(quantized.rows(), expected);
    // Halves round away from zero.
    assert_eq!(&quantized.row(0)[..4], &[1, -3, 2, -1]);
}

#[tokio::test]
async fn prove_and_verify_in_process() {
    let embedding = load_embedding(Path::new(EMBEDDING_PATH)).unwrap();
    let (prover, verifier) = setup();

    let pipeline = Pipeline::new(prover, WitnessLayout::default(), verifier);
    let classification = pipeline.classify_and_prove(&embedding).await.unwrap();
    assert_eq!(
        classification.public_signals,
        PublicSignals::from(vec![959, 1100, 1146])
    );
    assert_eq!(classification.prediction, 2);

    assert!(pipeline.verify().await.unwrap());
    assert_eq!(pipeline.state(), PipelineState::Verified);
}

#[tokio::test]
async fn tampered_arguments_are_rejected() {
    let embedding = load_embedding(Path::new(EMBEDDING_PATH)).unwrap();
    let (prover, verifier) = setup();
    let requestor = ProofRequestor::new(prover, WitnessLayout::default());

    let quantized = quantize(&embedding, 1).unwrap();
    let (proof, public_signals) = requestor.request_proof(&quantized).await.unwrap();
    let args = ArgumentBuilder::new(3).build(&proof, &public_signals).unwrap();
    assert!(verifier.verify(&args).await.unwrap());

    // A different score is a clean rejection.
    let mut tampered = args.clone();
    tampered.input[0] += U256::one();
    assert!(!verifier.verify(&tampered).await.unwrap());

    // So is a corrupted proof point.
    let mut corrupted = args.clone();
    corrupted.a[0] += U256::one();
    assert!(!verifier.verify(&corrupted).await.unwrap());

    // B without the Fq2 swap is not the proof that was generated.
    let mut unswapped = args.clone();
    for coordinate in unswapped.b.iter_mut() {
        coordinate.swap(0, 1);
    }
    assert!(!verifier.verify(&unswapped).await.unwrap());
}

#[tokio::test]
async fn verification_key_survives_snarkjs_json() {
    let embedding = load_embedding(Path::new(EMBEDDING_PATH)).unwrap();
    let classifier = load_classifier(Path::new(CLASSIFIER_PATH)).unwrap();
    let (prover, vk) = NativeProver::setup(classifier, &mut StdRng::seed_from_u64(1)).unwrap();

    let exported = serde_json::to_string(&VerificationKey::from(&vk)).unwrap();
    let imported: VerificationKey = serde_json::from_str(&exported).unwrap();
    assert_eq!(imported.num_public(), 3);

    let pipeline = Pipeline::new(
        prover,
        WitnessLayout::default(),
        LocalVerifier::new(&imported).unwrap(),
    );
    pipeline.classify_and_prove(&embedding).await.unwrap();
    assert!(pipeline.verify().await.unwrap());
}

#[test]
fn snarkjs_fixture_calldata() {
    let proof = load_proof(Path::new(PROOF_PATH)).unwrap();
    let public_signals = load_public_signals(Path::new(PUBLIC_PATH)).unwrap();
    assert_eq!(public_signals.prediction(), 2);

    let args = ArgumentBuilder::new(3).build(&proof, &public_signals).unwrap();
    assert_eq!(args.a, [U256::from(1), U256::from(2)]);
    assert_eq!(args.b[0][0], U256::from_dec_str(&proof.b.x[1].to_string()).unwrap());
    assert_eq!(args.b[0][1], U256::from_dec_str(&proof.b.x[0].to_string()).unwrap());
    let q_minus_two = base_modulus() - BigUint::from(2u8);
    assert_eq!(args.c[1], U256::from_dec_str(&q_minus_two.to_string()).unwrap());
    assert_eq!(
        args.input,
        vec![U256::from(959), U256::from(1100), U256::from(1146)]
    );

    let calldata = args.to_solidity_calldata();
    assert!(calldata.starts_with(
        "[\"0x0000000000000000000000000000000000000000000000000000000000000001\""
    ));
    assert_eq!(calldata.matches("\"0x").count(), 11);
}

/// Needs the `anvil` binary on `PATH`.
#[tokio::test]
#[ignore]
async fn deployed_verifier_on_anvil() {
    let artifact = VerifierArtifact::load(Path::new(VERIFIER_ARTIFACT_PATH)).unwrap();
    let client = EthClient::new("anvil").await.unwrap();
    let address = client.deploy_verifier(&artifact).await.unwrap();
    let verifier = client.verifier(address, &artifact).unwrap();

    let proof = load_proof(Path::new(PROOF_PATH)).unwrap();
    let public_signals = load_public_signals(Path::new(PUBLIC_PATH)).unwrap();
    let args = ArgumentBuilder::new(3).build(&proof, &public_signals).unwrap();
    assert!(verifier.verify(&args).await.unwrap());
}
