//! Wrapper orchestrator implementation

use crate::agent::{Agent, AgentResponse, AgentStatus, Params};
use crate::attestation::{
    attestation_subject, hash_value, verify_chain, AttestationGenerator, ChainVerification,
    SubjectFields, GENESIS_DIGEST,
};
use crate::config::BlackBoxConfig;
use crate::error::{Error, Result};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::outcome::{Outcome, OutcomeStatus};
use crate::policy::{Authorization, Decision, Policy, PolicyEngine};
use crate::privacy::{PatternCatalog, Redactor};
use crate::storage::{open_store, MemoryStore, OutcomeStore};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// One wrapped execution request
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Caller-supplied id, unique per logical request
    pub request_id: String,
    pub task: String,
    pub params: Params,
    /// Cost estimate checked against the policy ceiling
    pub estimated_cost_cents: f64,
}

impl RunRequest {
    pub fn new(request_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            task: task.into(),
            params: Params::new(),
            estimated_cost_cents: 0.0,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_estimated_cost(mut self, cents: f64) -> Self {
        self.estimated_cost_cents = cents;
        self
    }
}

/// What came back from the agent task before sanitization
enum RawRun {
    Completed(AgentResponse),
    Failed(String),
    TimedOut,
}

/// Aborts the agent task when dropped, so an abandoned request takes its
/// agent down with it. Aborting a finished task is a no-op.
struct AgentTask<T>(JoinHandle<T>);

impl<T> Drop for AgentTask<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Holds a request id in the in-flight set until dropped
struct InFlight<'a> {
    ids: &'a std::sync::Mutex<HashSet<String>>,
    request_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.request_id);
    }
}

/// Wraps an opaque agent so that only sanitized, attested outcomes leave it
pub struct BlackBoxWrapper {
    agent: Arc<dyn Agent>,
    policy: PolicyEngine,
    redactor: Redactor,
    redaction_enabled: bool,
    generator: AttestationGenerator,
    store: Arc<dyn OutcomeStore>,
    metrics: Arc<Metrics>,
    /// Digest of the last appended outcome; `None` until first use
    chain_head: Mutex<Option<String>>,
    /// Request ids between the duplicate check and append
    in_flight: std::sync::Mutex<HashSet<String>>,
}

impl BlackBoxWrapper {
    /// Start building a wrapper around `agent`
    pub fn builder(agent: Arc<dyn Agent>) -> BlackBoxWrapperBuilder {
        BlackBoxWrapperBuilder::new(agent)
    }

    /// Build a wrapper from configuration, opening the configured store
    pub async fn from_config(agent: Arc<dyn Agent>, config: &BlackBoxConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage).await?;
        tracing::info!(
            backend = store.name(),
            black_box = config.policy.black_box,
            redaction = config.privacy.redaction_enabled,
            "Opened outcome store"
        );

        BlackBoxWrapperBuilder::new(agent)
            .policy(config.policy.clone())
            .redaction_enabled(config.privacy.redaction_enabled)
            .catalog(config.privacy.catalog()?)
            .store(store)
            .code_version(config.attestation.code_version.clone())
            .build()
    }

    /// Run a task with no cost estimate
    pub async fn run(
        &self,
        request_id: impl Into<String>,
        task: impl Into<String>,
        params: Params,
    ) -> Result<Outcome> {
        self.execute(RunRequest::new(request_id, task).with_params(params))
            .await
    }

    /// Run one request through the full pipeline.
    ///
    /// Returns `Err` only when no outcome was persisted: policy rejection,
    /// an invalid or duplicate request id, or a storage failure. Agent
    /// failures and timeouts are persisted outcomes.
    ///
    /// A request id is reserved for the whole run, so a concurrent run with
    /// the same id on this wrapper is rejected as a duplicate without
    /// invoking the agent. Dropping the returned future aborts the agent
    /// and releases the id.
    pub async fn execute(&self, request: RunRequest) -> Result<Outcome> {
        let RunRequest {
            request_id,
            task,
            params,
            estimated_cost_cents,
        } = request;

        if request_id.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "request id must not be empty".to_string(),
            ));
        }

        let auth = match self.policy.authorize(&request_id, estimated_cost_cents) {
            Decision::Proceed(auth) => auth,
            Decision::Reject { reason } => {
                self.metrics.record_policy_rejection();
                tracing::warn!(request_id = %request_id, reason = %reason, "Policy rejected request");
                return Err(Error::PolicyRejected { request_id, reason });
            }
        };

        let Some(_reservation) = self.reserve(&request_id) else {
            return Err(self.reject_duplicate(request_id));
        };
        if self.store.contains(&request_id).await? {
            return Err(self.reject_duplicate(request_id));
        }

        if auth.break_glass {
            self.metrics.record_break_glass();
            tracing::warn!(request_id = %request_id, "Break-glass override: traces will be revealed");
        }

        tracing::debug!(
            request_id = %request_id,
            timeout_secs = auth.timeout.as_secs(),
            "Invoking agent"
        );
        let started = Instant::now();
        let raw = self
            .invoke_agent(&task, &params, auth.deadline_from(started))
            .await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, result, traces, cost_cents) = self.sanitize(&request_id, raw, &auth);

        let (input_hash, output_hash) = if self.policy.policy().keep_hashes {
            let input = self.redact_if_enabled(json!({"task": task, "params": params}));
            (Some(hash_value(&input)), Some(hash_value(&result)))
        } else {
            (None, None)
        };

        let outcome = self
            .attest_and_append(move |prev_digest| {
                let subject = attestation_subject(&SubjectFields {
                    request_id: &request_id,
                    status: status.as_str(),
                    result: &result,
                    traces: traces.as_ref(),
                    input_hash: input_hash.as_deref(),
                    output_hash: output_hash.as_deref(),
                    latency_ms,
                    cost_cents,
                    break_glass: auth.break_glass,
                });
                let attestation = self.generator.attest(&subject, prev_digest);
                Outcome {
                    request_id,
                    status,
                    result,
                    traces,
                    input_hash,
                    output_hash,
                    latency_ms,
                    cost_cents,
                    break_glass: auth.break_glass,
                    created_at: attestation.timestamp,
                    attestation,
                }
            })
            .await?;

        self.metrics.record_outcome(status, latency_ms, cost_cents);
        tracing::info!(
            request_id = %outcome.request_id,
            status = %outcome.status,
            latency_ms,
            "Request completed"
        );
        Ok(outcome)
    }

    /// Claim `request_id` for this run; `None` if another run holds it
    fn reserve(&self, request_id: &str) -> Option<InFlight<'_>> {
        let mut ids = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(request_id.to_string()) {
            return None;
        }
        Some(InFlight {
            ids: &self.in_flight,
            request_id: request_id.to_string(),
        })
    }

    fn reject_duplicate(&self, request_id: String) -> Error {
        self.metrics.record_duplicate_rejection();
        tracing::warn!(request_id = %request_id, "Rejected duplicate request id");
        Error::DuplicateRequest(request_id)
    }

    /// Run the agent on its own task so the deadline can abort it
    async fn invoke_agent(&self, task: &str, params: &Params, deadline: Instant) -> RawRun {
        let agent = self.agent.clone();
        let task = task.to_string();
        let params = params.clone();
        let mut running = AgentTask(tokio::spawn(async move {
            agent.invoke(&task, &params).await
        }));

        match tokio::time::timeout_at(deadline, &mut running.0).await {
            Ok(Ok(Ok(response))) => RawRun::Completed(response),
            Ok(Ok(Err(e))) => RawRun::Failed(format!("{:#}", e)),
            Ok(Err(join_err)) if join_err.is_panic() => {
                RawRun::Failed("agent panicked during execution".to_string())
            }
            Ok(Err(_)) => RawRun::Failed("agent task was cancelled".to_string()),
            // Dropping `running` aborts the task
            Err(_) => RawRun::TimedOut,
        }
    }

    /// Strip traces, then redact what is left
    fn sanitize(
        &self,
        request_id: &str,
        raw: RawRun,
        auth: &Authorization,
    ) -> (OutcomeStatus, Value, Option<Value>, f64) {
        match raw {
            RawRun::Completed(response) => {
                let status = match response.status {
                    AgentStatus::Success => OutcomeStatus::Success,
                    AgentStatus::Error => OutcomeStatus::Error,
                };
                let traces = if auth.reveal_traces {
                    response.traces
                } else {
                    if response.traces.is_some() {
                        self.metrics.record_traces_stripped();
                        tracing::debug!(request_id = %request_id, "Stripped agent traces");
                    }
                    None
                };
                let cost_cents = if response.cost_cents.is_finite() && response.cost_cents > 0.0 {
                    response.cost_cents
                } else {
                    0.0
                };
                let result = self.redact_if_enabled(response.result);
                let traces = traces.map(|t| self.redact_if_enabled(t));
                (status, result, traces, cost_cents)
            }
            RawRun::Failed(description) => {
                tracing::warn!(request_id = %request_id, "Agent execution failed");
                let description = self.redactor.redact_str(&description);
                (OutcomeStatus::Error, Value::String(description), None, 0.0)
            }
            RawRun::TimedOut => {
                tracing::warn!(
                    request_id = %request_id,
                    timeout_secs = auth.timeout.as_secs(),
                    "Agent execution timed out"
                );
                (OutcomeStatus::Timeout, Value::Null, None, 0.0)
            }
        }
    }

    fn redact_if_enabled(&self, value: Value) -> Value {
        if self.redaction_enabled {
            self.redactor.redact(&value)
        } else {
            value
        }
    }

    /// Attest against the current chain head and append, as one step.
    ///
    /// The head only advances once the store has accepted the outcome.
    async fn attest_and_append<F>(&self, build: F) -> Result<Outcome>
    where
        F: FnOnce(&str) -> Outcome,
    {
        let mut head = self.chain_head.lock().await;
        let prev_digest = match head.as_ref() {
            Some(digest) => digest.clone(),
            None => self
                .store
                .latest_digest()
                .await?
                .unwrap_or_else(|| GENESIS_DIGEST.to_string()),
        };

        let outcome = build(&prev_digest);
        self.store.append(&outcome).await?;
        *head = Some(outcome.attestation.digest.clone());
        Ok(outcome)
    }

    /// Fetch a stored outcome
    pub async fn get_outcome(&self, request_id: &str) -> Result<Outcome> {
        self.store.get(request_id).await
    }

    /// Verify the attestation chain over everything in the store
    pub async fn verify_chain(&self) -> Result<ChainVerification> {
        let outcomes = self.store.list().await?;
        Ok(verify_chain(&outcomes))
    }

    pub fn policy(&self) -> &Policy {
        self.policy.policy()
    }

    pub fn policy_fingerprint(&self) -> &str {
        self.policy.fingerprint()
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    pub fn store(&self) -> &Arc<dyn OutcomeStore> {
        &self.store
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Builder for BlackBoxWrapper
pub struct BlackBoxWrapperBuilder {
    agent: Arc<dyn Agent>,
    policy: Policy,
    redaction_enabled: bool,
    catalog: Option<PatternCatalog>,
    store: Option<Arc<dyn OutcomeStore>>,
    code_version: String,
    metrics: Option<Arc<Metrics>>,
}

impl BlackBoxWrapperBuilder {
    /// Defaults: default policy, redaction on, built-in catalog, in-memory store
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            policy: Policy::default(),
            redaction_enabled: true,
            catalog: None,
            store: None,
            code_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics: None,
        }
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn redaction_enabled(mut self, enabled: bool) -> Self {
        self.redaction_enabled = enabled;
        self
    }

    pub fn catalog(mut self, catalog: PatternCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn store(mut self, store: Arc<dyn OutcomeStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn code_version(mut self, version: impl Into<String>) -> Self {
        self.code_version = version.into();
        self
    }

    /// Share a metrics registry with other wrappers
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the wrapper, validating the policy and compiling the catalog
    pub fn build(self) -> Result<BlackBoxWrapper> {
        let policy = PolicyEngine::new(self.policy)?;
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => PatternCatalog::builtin()?,
        };
        let generator = AttestationGenerator::new(policy.fingerprint(), self.code_version);

        Ok(BlackBoxWrapper {
            agent: self.agent,
            policy,
            redactor: Redactor::new(Arc::new(catalog)),
            redaction_enabled: self.redaction_enabled,
            generator,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn OutcomeStore>),
            metrics: self.metrics.unwrap_or_default(),
            chain_head: Mutex::new(None),
            in_flight: std::sync::Mutex::new(HashSet::new()),
        })
    }
}
