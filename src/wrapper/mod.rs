//! Black-box wrapper orchestrator
//!
//! Composes the policy engine, redactor, attestation generator and outcome
//! store around a single agent invocation:
//!
//! ```text
//! run(request) ─► authorize ─► invoke agent (bounded) ─► strip traces
//!                                                          │
//!      Outcome ◄── append ◄── attest (chained) ◄── hash ◄── redact
//! ```
//!
//! Nothing after trace stripping sees the agent's raw traces.

mod orchestrator;

pub use crate::outcome::{Outcome, OutcomeStatus};
pub use orchestrator::{BlackBoxWrapper, BlackBoxWrapperBuilder, RunRequest};
