//! PII redaction
//!
//! Provides the pattern catalog (built-in PII shapes plus operator-defined
//! rules) and the redactor that applies it to arbitrary nested values
//! before anything is hashed, attested or stored.

mod patterns;
mod redactor;

pub use patterns::{default_pattern_rules, PatternCatalog, PatternRule, RedactionPattern};
pub use redactor::{PiiCount, Redactor, ScanReport};
