//! Shared fixtures for unit tests

use crate::attestation::{AttestationGenerator, GENESIS_DIGEST};
use crate::outcome::{Outcome, OutcomeStatus};
use serde_json::{json, Value};

/// A successful outcome chained to `prev` (or genesis)
pub fn sample_outcome(request_id: &str, prev: Option<&str>) -> Outcome {
    sample_outcome_with_result(
        request_id,
        prev,
        json!({"summary": "done", "items": [1, 2, 3]}),
    )
}

/// Like [`sample_outcome`], attesting the given result
pub fn sample_outcome_with_result(request_id: &str, prev: Option<&str>, result: Value) -> Outcome {
    let generator = AttestationGenerator::new("test-fingerprint", "test");
    let mut outcome = Outcome {
        request_id: request_id.to_string(),
        status: OutcomeStatus::Success,
        result,
        traces: None,
        input_hash: Some("a".repeat(64)),
        output_hash: Some("b".repeat(64)),
        latency_ms: 12,
        cost_cents: 0.25,
        break_glass: false,
        attestation: generator.attest(&json!(null), GENESIS_DIGEST),
        created_at: chrono::Utc::now(),
    };
    outcome.attestation =
        generator.attest(&outcome.attestation_subject(), prev.unwrap_or(GENESIS_DIGEST));
    outcome.created_at = outcome.attestation.timestamp;
    outcome
}
