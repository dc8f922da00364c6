//! Wrapped agent capability
//!
//! The wrapper treats an agent as an opaque capability with a single
//! asynchronous operation. Adapters for differently shaped agents live
//! outside this crate and implement [`Agent`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keyword parameters passed through to the agent
pub type Params = Map<String, Value>;

/// Status an agent reports for its own run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Success,
    Error,
}

/// What an agent returns from one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traces: Option<Value>,
    #[serde(default)]
    pub cost_cents: f64,
}

impl AgentResponse {
    pub fn success(result: Value) -> Self {
        Self {
            status: AgentStatus::Success,
            result,
            traces: None,
            cost_cents: 0.0,
        }
    }

    pub fn with_traces(mut self, traces: Value) -> Self {
        self.traces = Some(traces);
        self
    }

    pub fn with_cost(mut self, cost_cents: f64) -> Self {
        self.cost_cents = cost_cents;
        self
    }

    /// Interpret a loosely shaped agent reply.
    ///
    /// A mapping may carry `status`, `result`, `traces` (or `trace`) and
    /// `cost_cents`. A mapping without `result` is itself the result, and
    /// any non-mapping value is the result as-is.
    pub fn from_value(value: Value) -> Self {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Self::success(other),
        };

        let traces = map.remove("traces").or_else(|| map.remove("trace"));
        let cost_cents = map
            .remove("cost_cents")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let status = match map.get("status").and_then(Value::as_str) {
            Some("error") | Some("failed") | Some("failure") => AgentStatus::Error,
            _ => AgentStatus::Success,
        };

        let result = match map.remove("result") {
            Some(result) => result,
            None => {
                map.remove("status");
                Value::Object(map)
            }
        };

        Self {
            status,
            result,
            traces,
            cost_cents,
        }
    }
}

/// An opaque agent exposing one asynchronous invocation
#[async_trait]
pub trait Agent: Send + Sync {
    /// Run a task. Any error is captured by the wrapper into an
    /// `error` outcome; it never propagates to the wrapper's caller.
    async fn invoke(&self, task: &str, params: &Params) -> anyhow::Result<AgentResponse>;
}
