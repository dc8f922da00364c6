//! BlackBox - Privacy-Preserving Agent Wrapper
//!
//! BlackBox wraps opaque or third-party agents so that only sanitized,
//! attested outcomes are ever observable or persisted. Raw execution
//! traces and unredacted personal data never leave the wrapper.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        BlackBox Wrapper                              │
//! │                                                                      │
//! │  run(request_id, task, params)                                       │
//! │          │                                                           │
//! │  ┌───────▼───────────────────────────────────────────────────────┐  │
//! │  │                     Policy Engine                              │  │
//! │  │  - Cost ceiling                                                │  │
//! │  │  - Execution deadline                                          │  │
//! │  │  - Break-glass trace disclosure                                │  │
//! │  └───────┬───────────────────────────────────────────────────────┘  │
//! │          │                                                           │
//! │  ┌───────▼──────────────┐                                            │
//! │  │   Wrapped Agent      │  spawned task, aborted on timeout          │
//! │  └───────┬──────────────┘                                            │
//! │          │ status, result, traces                                    │
//! │  ┌───────▼───────────────────────────────────────────────────────┐  │
//! │  │              Trace Stripping + PII Redactor                    │  │
//! │  └───────┬───────────────────────────────────────────────────────┘  │
//! │          │                                                           │
//! │  ┌───────▼───────────────────────────────────────────────────────┐  │
//! │  │        Attestation Generator (SHA-256 hash chain)              │  │
//! │  └───────┬───────────────────────────────────────────────────────┘  │
//! └──────────┼──────────────────────────────────────────────────────────┘
//!            │ append-only
//! ┌──────────▼──────────────────────────────────────────────────────────┐
//! │                 Outcome Store (memory | SQLite)                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Features
//!
//! ### Black-Box Execution
//! - Agent traces are dropped before any further processing
//! - Explicit per-request break-glass override for debugging
//! - Timeouts and agent failures still produce audited outcomes
//!
//! ### PII Redaction
//! - 14 built-in patterns (email, keys, card numbers, addresses, ...)
//! - Custom patterns from configuration
//! - Recursive over arbitrary JSON structures
//!
//! ### Tamper Evidence
//! - Every outcome is attested and chained to its predecessor
//! - Chain verification over any stored stream
//!
//! ## Modules
//!
//! - [`wrapper`]: Request orchestration
//! - [`policy`]: Execution policy and authorization
//! - [`privacy`]: Pattern catalog and redaction
//! - [`attestation`]: Canonical hashing and attestation chain
//! - [`storage`]: Outcome stores
//! - [`agent`]: Wrapped agent capability
//! - [`metrics`]: Wrapper counters
//! - [`config`]: Configuration management

pub mod agent;
pub mod attestation;
pub mod config;
pub mod error;
pub mod metrics;
pub mod outcome;
pub mod policy;
pub mod privacy;
pub mod storage;
pub mod wrapper;

#[cfg(test)]
mod test_utils;

pub use agent::{Agent, AgentResponse, AgentStatus, Params};
pub use config::BlackBoxConfig;
pub use error::{Error, Result};
pub use outcome::{Outcome, OutcomeStatus};
pub use policy::{Policy, PolicyBuilder};
pub use wrapper::{BlackBoxWrapper, BlackBoxWrapperBuilder, RunRequest};
