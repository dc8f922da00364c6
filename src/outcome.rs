//! Outcome record
//!
//! The sanitized, attested result of one wrapped execution. This is the
//! only artifact the wrapper returns to callers or hands to storage.

use crate::attestation::{attestation_subject, Attestation, SubjectFields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Final status of a wrapped execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
    Timeout,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "timeout" => Ok(Self::Timeout),
            other => Err(format!("unknown outcome status: {}", other)),
        }
    }
}

/// Sanitized, attested record of a single wrapped execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Caller-supplied request id, unique per logical request
    pub request_id: String,
    pub status: OutcomeStatus,
    /// Redacted result, error description, or null on timeout
    pub result: Value,
    /// Agent traces; null unless revealed by policy
    pub traces: Option<Value>,
    /// Hash of the redacted input, present iff the policy keeps hashes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_hash: Option<String>,
    /// Hash of the redacted result, present iff the policy keeps hashes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    /// Wall-clock execution time, including the agent invocation
    pub latency_ms: u64,
    /// Cost reported by the agent
    pub cost_cents: f64,
    /// Whether a break-glass override applied
    pub break_glass: bool,
    pub attestation: Attestation,
    pub created_at: DateTime<Utc>,
}

impl Outcome {
    /// The value this outcome's attestation digest covers
    pub fn attestation_subject(&self) -> Value {
        attestation_subject(&SubjectFields {
            request_id: &self.request_id,
            status: self.status.as_str(),
            result: &self.result,
            traces: self.traces.as_ref(),
            input_hash: self.input_hash.as_deref(),
            output_hash: self.output_hash.as_deref(),
            latency_ms: self.latency_ms,
            cost_cents: self.cost_cents,
            break_glass: self.break_glass,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            OutcomeStatus::Success,
            OutcomeStatus::Error,
            OutcomeStatus::Timeout,
        ] {
            assert_eq!(status.as_str().parse::<OutcomeStatus>().unwrap(), status);
        }
        assert!("pending".parse::<OutcomeStatus>().is_err());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&OutcomeStatus::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");
    }
}
