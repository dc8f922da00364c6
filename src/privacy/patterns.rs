//! Redaction pattern catalog
//!
//! The catalog is an ordered list of compiled rules. Rules are applied in
//! catalog order, so when two rules could match the same text the one
//! registered first wins. Custom rules are appended; a custom rule with
//! the name of an existing rule replaces it in place.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Serializable redaction rule (as written in configuration)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    /// Unique rule name
    pub name: String,
    /// Regular expression source
    pub pattern: String,
    /// Token substituted for every match
    pub replacement: String,
}

impl PatternRule {
    pub fn new(
        name: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// A compiled redaction rule
#[derive(Debug, Clone)]
pub struct RedactionPattern {
    name: String,
    matcher: Regex,
    replacement_token: String,
}

impl RedactionPattern {
    /// Compile a rule, failing on an invalid expression
    pub fn compile(rule: &PatternRule) -> Result<Self> {
        if rule.name.trim().is_empty() {
            return Err(Error::PatternCompile {
                name: rule.name.clone(),
                reason: "pattern name must not be empty".to_string(),
            });
        }
        let matcher = Regex::new(&rule.pattern).map_err(|e| Error::PatternCompile {
            name: rule.name.clone(),
            reason: e.to_string(),
        })?;
        if matcher.is_match("") {
            return Err(Error::PatternCompile {
                name: rule.name.clone(),
                reason: "pattern matches the empty string".to_string(),
            });
        }

        Ok(Self {
            name: rule.name.clone(),
            matcher,
            replacement_token: rule.replacement.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn replacement_token(&self) -> &str {
        &self.replacement_token
    }
}

/// Ordered, immutable set of compiled redaction rules
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<RedactionPattern>,
}

impl PatternCatalog {
    /// Build a catalog from rules, in the given order.
    ///
    /// Later rules with a duplicate name replace the earlier entry at its
    /// original position. Fails if any rule does not compile, or if any
    /// replacement token would itself be matched by a rule in the catalog
    /// (which would break idempotent redaction).
    pub fn new(rules: Vec<PatternRule>) -> Result<Self> {
        let mut patterns: Vec<RedactionPattern> = Vec::with_capacity(rules.len());
        for rule in &rules {
            let compiled = RedactionPattern::compile(rule)?;
            match patterns.iter_mut().find(|p| p.name == compiled.name) {
                Some(existing) => *existing = compiled,
                None => patterns.push(compiled),
            }
        }

        for pattern in &patterns {
            if let Some(offender) = patterns
                .iter()
                .find(|other| other.matcher.is_match(&pattern.replacement_token))
            {
                return Err(Error::PatternCompile {
                    name: pattern.name.clone(),
                    reason: format!(
                        "replacement token '{}' is matched by pattern '{}'",
                        pattern.replacement_token, offender.name
                    ),
                });
            }
        }

        Ok(Self { patterns })
    }

    /// The built-in catalog
    pub fn builtin() -> Result<Self> {
        Self::new(default_pattern_rules())
    }

    /// Built-in catalog extended with custom rules
    pub fn with_custom(custom: Vec<PatternRule>) -> Result<Self> {
        let mut rules = default_pattern_rules();
        rules.extend(custom);
        Self::new(rules)
    }

    /// Patterns in evaluation order
    pub fn patterns(&self) -> &[RedactionPattern] {
        &self.patterns
    }

    pub fn get(&self, name: &str) -> Option<&RedactionPattern> {
        self.patterns.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Built-in PII rules, in evaluation order.
///
/// Structured identifiers (keys, wallet addresses, card numbers) come
/// before the looser numeric shapes so that, for example, a card number
/// is never half-consumed by the phone rule.
pub fn default_pattern_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new(
            "email",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            "[EMAIL]",
        ),
        PatternRule::new("aws_access_key", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b", "[AWS_KEY]"),
        PatternRule::new(
            "github_token",
            r"\bgh[pousr]_[A-Za-z0-9]{36,255}\b",
            "[GITHUB_TOKEN]",
        ),
        PatternRule::new("google_api_key", r"\bAIza[0-9A-Za-z_-]{35}", "[API_KEY]"),
        PatternRule::new(
            "stripe_key",
            r"\b(?:sk|pk|rk)_(?:live|test)_[A-Za-z0-9]{6,}",
            "[API_KEY]",
        ),
        PatternRule::new(
            "openai_api_key",
            r"\bsk-(?:proj-)?[A-Za-z0-9_-]{20,}",
            "[API_KEY]",
        ),
        PatternRule::new("ethereum_address", r"\b0x[a-fA-F0-9]{40}\b", "[ETH_ADDRESS]"),
        PatternRule::new(
            "bitcoin_address",
            r"\b(?:bc1[a-z0-9]{25,59}|[13][a-km-zA-HJ-NP-Z1-9]{25,34})\b",
            "[BTC_ADDRESS]",
        ),
        PatternRule::new(
            "credit_card",
            r"\b(?:\d{4}[- ]?){3}\d{4}\b|\b3[47]\d{2}[- ]?\d{6}[- ]?\d{5}\b",
            "[CREDIT_CARD]",
        ),
        PatternRule::new("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "[SSN]"),
        PatternRule::new(
            "ipv6",
            r"\b(?:[0-9A-Fa-f]{1,4}:){7}[0-9A-Fa-f]{1,4}\b|\b(?:[0-9A-Fa-f]{1,4}:){1,6}:(?:[0-9A-Fa-f]{1,4}(?::[0-9A-Fa-f]{1,4}){0,5})?",
            "[IPV6]",
        ),
        PatternRule::new(
            "ipv4",
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
            "[IPV4]",
        ),
        PatternRule::new(
            "phone_international",
            r"\+\d{1,3}[-. ]\d{1,4}[-. ]\d{3,4}[-. ]\d{3,4}\b",
            "[PHONE]",
        ),
        PatternRule::new(
            "phone_us",
            r"(?:\+?1[-. ]?)?(?:\(\d{3}\)\s?|\b\d{3}[-. ])\d{3}[-. ]\d{4}\b",
            "[PHONE]",
        ),
    ]
}
