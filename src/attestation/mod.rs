//! Tamper-evident attestations
//!
//! Every outcome carries one attestation. Attestations form an
//! append-only SHA-256 hash chain: each one commits to its predecessor's
//! digest, so removing, reordering or editing any stored outcome breaks
//! every link after it.
//!
//! ```text
//! GENESIS ──► [digest₀] ──► [digest₁] ──► ... ──► [digestₙ]
//!               ▲              ▲
//!     subject₀ + policy   subject₁ + policy
//!     + code version      + code version
//! ```

mod canonical;
mod chain;
mod generator;

pub use canonical::{canonical_json, hash_value, sha256_hex};
pub use chain::{verify_chain, ChainBreak, ChainVerification};
pub use generator::{
    attestation_now, attestation_subject, compute_digest, format_timestamp, Attestation,
    AttestationGenerator, SubjectFields, GENESIS_DIGEST,
};
