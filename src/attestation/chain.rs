//! Attestation chain verification

use super::generator::{compute_digest, GENESIS_DIGEST};
use crate::outcome::Outcome;
use serde::Serialize;

/// Where and why a chain stopped verifying
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainBreak {
    /// Index of the first offending outcome
    pub index: usize,
    pub request_id: String,
    pub reason: String,
}

/// Result of verifying a sequence of outcomes in append order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    /// Number of outcomes examined
    pub length: usize,
    /// Digest of the last outcome, or genesis for an empty chain
    pub head: String,
    /// First break, if any
    pub broken: Option<ChainBreak>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.broken.is_none()
    }
}

/// Verify that `outcomes` form an unbroken chain starting at genesis.
///
/// Every digest is recomputed from the outcome's own fields, every
/// `prev_digest` must equal the digest before it, and `created_at` must
/// equal the attestation timestamp.
pub fn verify_chain(outcomes: &[Outcome]) -> ChainVerification {
    let mut expected_prev = GENESIS_DIGEST.to_string();

    for (index, outcome) in outcomes.iter().enumerate() {
        let att = &outcome.attestation;
        let fail = |reason: String| ChainVerification {
            length: outcomes.len(),
            head: expected_prev.clone(),
            broken: Some(ChainBreak {
                index,
                request_id: outcome.request_id.clone(),
                reason,
            }),
        };

        if outcome.created_at != att.timestamp {
            return fail(format!(
                "created_at {} does not match attestation timestamp {}",
                outcome.created_at, att.timestamp
            ));
        }

        if att.prev_digest != expected_prev {
            return fail(format!(
                "prev_digest {} does not match preceding digest {}",
                att.prev_digest, expected_prev
            ));
        }

        let recomputed = compute_digest(
            &outcome.attestation_subject(),
            &att.policy_fingerprint,
            &att.code_version,
            &att.prev_digest,
            &att.timestamp,
        );
        if recomputed != att.digest {
            return fail("digest does not match outcome content".to_string());
        }

        expected_prev = att.digest.clone();
    }

    ChainVerification {
        length: outcomes.len(),
        head: expected_prev,
        broken: None,
    }
}
