//! Attestation generation
//!
//! An attestation binds an outcome to the policy and code version that
//! produced it, and to the attestation that came before it. The digest is
//! SHA-256 over the canonical form of
//! `{code_version, policy_fingerprint, prev_digest, subject, timestamp}`.

use super::canonical::hash_value;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `prev_digest` of the first attestation in every stream.
///
/// 64 hex zeros, which no real SHA-256 output is expected to equal.
pub const GENESIS_DIGEST: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Tamper-evident proof of one outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// SHA-256 (hex) of this attestation's canonical content
    pub digest: String,
    /// Digest of the preceding attestation, or [`GENESIS_DIGEST`]
    pub prev_digest: String,
    /// Issue time, microsecond precision
    pub timestamp: DateTime<Utc>,
    /// Fingerprint of the policy in force
    pub policy_fingerprint: String,
    /// Version of the wrapping code
    pub code_version: String,
}

impl Attestation {
    pub fn is_genesis(&self) -> bool {
        self.prev_digest == GENESIS_DIGEST
    }
}

/// Render a timestamp exactly as it enters the digest
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to the precision attestations carry
pub fn attestation_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Compute an attestation digest from its inputs
pub fn compute_digest(
    subject: &Value,
    policy_fingerprint: &str,
    code_version: &str,
    prev_digest: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    let envelope = json!({
        "code_version": code_version,
        "policy_fingerprint": policy_fingerprint,
        "prev_digest": prev_digest,
        "subject": subject,
        "timestamp": format_timestamp(timestamp),
    });
    hash_value(&envelope)
}

/// Outcome fields an attestation digest covers.
///
/// Only sanitized fields go in: the result after redaction, traces only
/// when they were revealed, and the post-redaction hashes. The audit
/// fields (latency, cost, break-glass) are bound as well.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubjectFields<'a> {
    pub request_id: &'a str,
    pub status: &'a str,
    pub result: &'a Value,
    pub traces: Option<&'a Value>,
    pub input_hash: Option<&'a str>,
    pub output_hash: Option<&'a str>,
    pub latency_ms: u64,
    pub cost_cents: f64,
    pub break_glass: bool,
}

impl<'a> SubjectFields<'a> {
    /// Fields with no traces, no hashes, zero latency and cost, no break-glass
    pub fn new(request_id: &'a str, status: &'a str, result: &'a Value) -> Self {
        Self {
            request_id,
            status,
            result,
            traces: None,
            input_hash: None,
            output_hash: None,
            latency_ms: 0,
            cost_cents: 0.0,
            break_glass: false,
        }
    }
}

/// Build the attested subject of an outcome
pub fn attestation_subject(fields: &SubjectFields<'_>) -> Value {
    json!({
        "request_id": fields.request_id,
        "status": fields.status,
        "result": fields.result,
        "traces": fields.traces,
        "input_hash": fields.input_hash,
        "output_hash": fields.output_hash,
        "latency_ms": fields.latency_ms,
        "cost_cents": fields.cost_cents,
        "break_glass": fields.break_glass,
    })
}

/// Issues attestations for one policy and code version
#[derive(Debug, Clone)]
pub struct AttestationGenerator {
    policy_fingerprint: String,
    code_version: String,
}

impl AttestationGenerator {
    pub fn new(policy_fingerprint: impl Into<String>, code_version: impl Into<String>) -> Self {
        Self {
            policy_fingerprint: policy_fingerprint.into(),
            code_version: code_version.into(),
        }
    }

    pub fn policy_fingerprint(&self) -> &str {
        &self.policy_fingerprint
    }

    pub fn code_version(&self) -> &str {
        &self.code_version
    }

    /// Attest a subject, chained to `prev_digest`, at the current time
    pub fn attest(&self, subject: &Value, prev_digest: &str) -> Attestation {
        self.attest_at(subject, prev_digest, attestation_now())
    }

    /// Attest a subject at an explicit time
    pub fn attest_at(
        &self,
        subject: &Value,
        prev_digest: &str,
        timestamp: DateTime<Utc>,
    ) -> Attestation {
        let timestamp = timestamp.trunc_subsecs(6);
        let digest = compute_digest(
            subject,
            &self.policy_fingerprint,
            &self.code_version,
            prev_digest,
            &timestamp,
        );
        Attestation {
            digest,
            prev_digest: prev_digest.to_string(),
            timestamp,
            policy_fingerprint: self.policy_fingerprint.clone(),
            code_version: self.code_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn subject() -> Value {
        attestation_subject(&SubjectFields::new("req-1", "success", &json!({"answer": 42})))
    }

    #[test]
    fn test_digest_deterministic() {
        let gen = AttestationGenerator::new("fp", "1.0.0");
        let a = gen.attest_at(&subject(), GENESIS_DIGEST, fixed_time());
        let b = gen.attest_at(&subject(), GENESIS_DIGEST, fixed_time());
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
        assert!(a.is_genesis());
    }

    #[test]
    fn test_each_input_changes_digest() {
        let base = compute_digest(&subject(), "fp", "1.0.0", GENESIS_DIGEST, &fixed_time());

        let result = json!({"answer": 42});
        let fields = SubjectFields::new("req-1", "success", &result);
        let other_result = json!({"answer": 43});
        let subjects = [
            SubjectFields::new("req-1", "success", &other_result),
            SubjectFields {
                break_glass: true,
                ..fields
            },
            SubjectFields {
                cost_cents: 0.5,
                ..fields
            },
            SubjectFields {
                latency_ms: 7,
                ..fields
            },
        ];
        for other in &subjects {
            let digest = compute_digest(
                &attestation_subject(other),
                "fp",
                "1.0.0",
                GENESIS_DIGEST,
                &fixed_time(),
            );
            assert_ne!(digest, base);
        }

        let variants = [
            compute_digest(&subject(), "fp2", "1.0.0", GENESIS_DIGEST, &fixed_time()),
            compute_digest(&subject(), "fp", "1.0.1", GENESIS_DIGEST, &fixed_time()),
            compute_digest(&subject(), "fp", "1.0.0", &"a".repeat(64), &fixed_time()),
            compute_digest(
                &subject(),
                "fp",
                "1.0.0",
                GENESIS_DIGEST,
                &(fixed_time() + chrono::Duration::microseconds(1)),
            ),
        ];
        for variant in variants {
            assert_ne!(variant, base);
        }
    }

    #[test]
    fn test_subject_key_order_irrelevant() {
        let a = attestation_subject(&SubjectFields::new("r", "success", &json!({"x": 1, "y": 2})));
        let b = attestation_subject(&SubjectFields::new("r", "success", &json!({"y": 2, "x": 1})));
        assert_eq!(
            compute_digest(&a, "fp", "v", GENESIS_DIGEST, &fixed_time()),
            compute_digest(&b, "fp", "v", GENESIS_DIGEST, &fixed_time())
        );
    }

    #[test]
    fn test_timestamp_truncated_to_micros() {
        let gen = AttestationGenerator::new("fp", "v");
        let precise = fixed_time() + chrono::Duration::nanoseconds(1_234_567);
        let att = gen.attest_at(&subject(), GENESIS_DIGEST, precise);
        assert_eq!(format_timestamp(&att.timestamp), "2026-03-01T12:00:00.001234Z");
    }

    #[test]
    fn test_attestation_serde_preserves_digest_inputs() {
        let gen = AttestationGenerator::new("fp", "v");
        let att = gen.attest(&subject(), GENESIS_DIGEST);
        let json = serde_json::to_string(&att).unwrap();
        let back: Attestation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, att);
        assert_eq!(
            compute_digest(
                &subject(),
                &back.policy_fingerprint,
                &back.code_version,
                &back.prev_digest,
                &back.timestamp
            ),
            att.digest
        );
    }
}
