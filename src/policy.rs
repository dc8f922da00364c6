//! Execution policy and authorization
//!
//! A [`Policy`] is an immutable record of per-deployment constraints.
//! [`authorize`] turns a policy, a request id and a cost estimate into a
//! [`Decision`]; it holds no state and is safe to call from any task.

use crate::attestation::hash_value;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Default execution window for a wrapped agent
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Execution policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Suppress agent traces unless a break-glass override applies
    pub black_box: bool,
    /// Record hashes of the redacted input and output
    pub keep_hashes: bool,
    /// Cost ceiling in cents (`None` = unbounded)
    pub max_cost_cents: Option<f64>,
    /// Execution window for one agent invocation
    pub request_timeout_seconds: u64,
    /// Request ids allowed to reveal traces even in black-box mode
    pub break_glass_request_ids: BTreeSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            black_box: true,
            keep_hashes: false,
            max_cost_cents: None,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECS,
            break_glass_request_ids: BTreeSet::new(),
        }
    }
}

impl Policy {
    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_seconds == 0 {
            return Err(Error::Config(
                "request_timeout_seconds must be positive".to_string(),
            ));
        }
        if let Some(max) = self.max_cost_cents {
            if !max.is_finite() || max < 0.0 {
                return Err(Error::Config(format!(
                    "max_cost_cents must be a finite non-negative number, got {}",
                    max
                )));
            }
        }
        Ok(())
    }

    /// Stable SHA-256 over the policy's field values.
    ///
    /// Break-glass ids are a sorted set, so insertion order never changes
    /// the fingerprint.
    pub fn fingerprint(&self) -> String {
        hash_value(&json!({
            "black_box": self.black_box,
            "keep_hashes": self.keep_hashes,
            "max_cost_cents": self.max_cost_cents,
            "request_timeout_seconds": self.request_timeout_seconds,
            "break_glass_request_ids": self.break_glass_request_ids,
        }))
    }

    pub fn is_break_glass(&self, request_id: &str) -> bool {
        self.break_glass_request_ids.contains(request_id)
    }

    /// Whether traces may be exposed for this request
    pub fn reveal_traces(&self, request_id: &str) -> bool {
        !self.black_box || self.is_break_glass(request_id)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Permission to proceed, with the parameters of the execution window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    /// Traces survive into the outcome
    pub reveal_traces: bool,
    /// Traces are revealed only because of a break-glass override
    pub break_glass: bool,
    /// Bound on the agent invocation
    pub timeout: Duration,
}

impl Authorization {
    /// Deadline for an invocation starting at `start`
    pub fn deadline_from(&self, start: tokio::time::Instant) -> tokio::time::Instant {
        start + self.timeout
    }
}

/// Outcome of policy evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Proceed(Authorization),
    Reject { reason: String },
}

impl Decision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Decision::Proceed(_))
    }
}

/// Evaluate a request against a policy
pub fn authorize(request_id: &str, policy: &Policy, estimated_cost_cents: f64) -> Decision {
    if !estimated_cost_cents.is_finite() || estimated_cost_cents < 0.0 {
        return Decision::Reject {
            reason: format!("invalid cost estimate {}", estimated_cost_cents),
        };
    }
    if let Some(max) = policy.max_cost_cents {
        if estimated_cost_cents > max {
            return Decision::Reject {
                reason: format!(
                    "estimated cost {} cents exceeds ceiling {} cents",
                    estimated_cost_cents, max
                ),
            };
        }
    }

    let break_glass = policy.black_box && policy.is_break_glass(request_id);
    Decision::Proceed(Authorization {
        reveal_traces: policy.reveal_traces(request_id),
        break_glass,
        timeout: policy.request_timeout(),
    })
}

/// Policy engine bound to one validated policy
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: Arc<Policy>,
    fingerprint: String,
}

impl PolicyEngine {
    /// Validate and bind a policy
    pub fn new(policy: Policy) -> Result<Self> {
        policy.validate()?;
        let fingerprint = policy.fingerprint();
        Ok(Self {
            policy: Arc::new(policy),
            fingerprint,
        })
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn authorize(&self, request_id: &str, estimated_cost_cents: f64) -> Decision {
        authorize(request_id, &self.policy, estimated_cost_cents)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        let policy = Policy::default();
        let fingerprint = policy.fingerprint();
        Self {
            policy: Arc::new(policy),
            fingerprint,
        }
    }
}

/// Builder for policies
pub struct PolicyBuilder {
    policy: Policy,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self {
            policy: Policy::default(),
        }
    }

    pub fn black_box(mut self, enabled: bool) -> Self {
        self.policy.black_box = enabled;
        self
    }

    pub fn keep_hashes(mut self, keep: bool) -> Self {
        self.policy.keep_hashes = keep;
        self
    }

    pub fn max_cost_cents(mut self, max: f64) -> Self {
        self.policy.max_cost_cents = Some(max);
        self
    }

    pub fn request_timeout_seconds(mut self, secs: u64) -> Self {
        self.policy.request_timeout_seconds = secs;
        self
    }

    pub fn break_glass(mut self, request_id: impl Into<String>) -> Self {
        self.policy.break_glass_request_ids.insert(request_id.into());
        self
    }

    /// Build and validate the policy
    pub fn build(self) -> Result<Policy> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = Policy::default();
        assert!(policy.black_box);
        assert!(!policy.keep_hashes);
        assert!(policy.max_cost_cents.is_none());
        assert_eq!(policy.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(policy.break_glass_request_ids.is_empty());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_cost_ceiling_rejects() {
        let policy = PolicyBuilder::new().max_cost_cents(0.0).build().unwrap();
        match authorize("req-1", &policy, 0.5) {
            Decision::Reject { reason } => assert!(reason.contains("exceeds ceiling")),
            other => panic!("expected reject, got {:?}", other),
        }
        assert!(authorize("req-1", &policy, 0.0).is_proceed());
    }

    #[test]
    fn test_unbounded_cost() {
        let policy = Policy::default();
        assert!(authorize("req-1", &policy, 1_000_000.0).is_proceed());
    }

    #[test]
    fn test_invalid_estimate_rejected() {
        let policy = Policy::default();
        assert!(!authorize("req-1", &policy, -1.0).is_proceed());
        assert!(!authorize("req-1", &policy, f64::NAN).is_proceed());
    }

    #[test]
    fn test_reveal_traces_rules() {
        let black = PolicyBuilder::new().break_glass("debug-7").build().unwrap();
        assert!(!black.reveal_traces("req-1"));
        assert!(black.reveal_traces("debug-7"));

        let open = PolicyBuilder::new().black_box(false).build().unwrap();
        assert!(open.reveal_traces("req-1"));
    }

    #[test]
    fn test_authorization_fields() {
        let policy = PolicyBuilder::new()
            .request_timeout_seconds(5)
            .break_glass("debug-7")
            .build()
            .unwrap();

        match authorize("debug-7", &policy, 0.0) {
            Decision::Proceed(auth) => {
                assert!(auth.reveal_traces);
                assert!(auth.break_glass);
                assert_eq!(auth.timeout, Duration::from_secs(5));
            }
            other => panic!("expected proceed, got {:?}", other),
        }
        match authorize("req-1", &policy, 0.0) {
            Decision::Proceed(auth) => {
                assert!(!auth.reveal_traces);
                assert!(!auth.break_glass);
            }
            other => panic!("expected proceed, got {:?}", other),
        }
    }

    #[test]
    fn test_deadline_from_start() {
        let policy = PolicyBuilder::new()
            .request_timeout_seconds(7)
            .build()
            .unwrap();
        let Decision::Proceed(auth) = authorize("req-1", &policy, 0.0) else {
            panic!("expected proceed");
        };
        let start = tokio::time::Instant::now();
        assert_eq!(auth.deadline_from(start) - start, Duration::from_secs(7));
    }

    #[test]
    fn test_break_glass_not_flagged_when_open() {
        let policy = PolicyBuilder::new()
            .black_box(false)
            .break_glass("debug-7")
            .build()
            .unwrap();
        match authorize("debug-7", &policy, 0.0) {
            Decision::Proceed(auth) => {
                assert!(auth.reveal_traces);
                assert!(!auth.break_glass);
            }
            other => panic!("expected proceed, got {:?}", other),
        }
    }

    #[test]
    fn test_validation() {
        assert!(PolicyBuilder::new().request_timeout_seconds(0).build().is_err());
        assert!(PolicyBuilder::new().max_cost_cents(-1.0).build().is_err());
        assert!(PolicyBuilder::new()
            .max_cost_cents(f64::INFINITY)
            .build()
            .is_err());
    }

    #[test]
    fn test_fingerprint_stable_and_sensitive() {
        let a = PolicyBuilder::new()
            .break_glass("x")
            .break_glass("y")
            .build()
            .unwrap();
        let b = PolicyBuilder::new()
            .break_glass("y")
            .break_glass("x")
            .build()
            .unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = PolicyBuilder::new()
            .break_glass("x")
            .break_glass("y")
            .keep_hashes(true)
            .build()
            .unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_engine_rejects_invalid_policy() {
        let policy = Policy {
            request_timeout_seconds: 0,
            ..Default::default()
        };
        assert!(PolicyEngine::new(policy).is_err());
    }

    #[test]
    fn test_policy_toml_defaults() {
        let policy: Policy = toml::from_str("keep_hashes = true").unwrap();
        assert!(policy.black_box);
        assert!(policy.keep_hashes);
        assert_eq!(policy.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECS);
    }
}
