//! Decoder registry
//!
//! Maps canonical arbitration-ID keys to their decode rules. Lookup is exact-match;
//! an ID with no rule is reported as [`Dispatch::UnknownId`], never routed to a
//! fallback decoder.

use std::collections::BTreeMap;
use std::fmt;

use crate::bits::{BitBuffer, BitRangeError};
use crate::signals;
use crate::types::{DecodedRow, IdKey};

/// Signature shared by every decode routine
pub type DecodeFn = fn(f64, &BitBuffer) -> Result<DecodedRow, BitRangeError>;

/// A static decode rule: which ID it handles, where its rows go, and how to decode
#[derive(Clone, Copy)]
pub struct DecodeRule {
    /// Arbitration ID handled by this rule
    pub can_id: u32,
    /// Human-readable rule name for logs
    pub name: &'static str,
    /// Output table identifier, stable across runs
    pub table: &'static str,
    /// Decoded columns in output order (the timestamp column is implicit)
    pub columns: &'static [&'static str],
    /// Decode routine
    pub decode: DecodeFn,
}

impl DecodeRule {
    pub fn id_key(&self) -> IdKey {
        IdKey::from_can_id(self.can_id)
    }
}

impl fmt::Debug for DecodeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeRule")
            .field("can_id", &format_args!("{:#x}", self.can_id))
            .field("name", &self.name)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Outcome of dispatching one frame
#[derive(Debug)]
pub enum Dispatch<'a> {
    /// A rule matched and produced a row
    Decoded { rule: &'a DecodeRule, row: DecodedRow },
    /// A rule matched but a field could not be extracted
    Failed {
        rule: &'a DecodeRule,
        error: BitRangeError,
    },
    /// No rule is registered for this ID
    UnknownId,
}

/// Registry of decode rules keyed by canonical ID
#[derive(Debug, Default)]
pub struct DecoderRegistry {
    rules: BTreeMap<IdKey, DecodeRule>,
}

impl DecoderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in rule
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for rule in signals::builtin_rules() {
            registry.register(rule);
        }
        registry
    }

    /// Register a rule under its ID key, replacing any existing rule for that key
    pub fn register(&mut self, rule: DecodeRule) {
        let key = rule.id_key();
        if let Some(previous) = self.rules.insert(key.clone(), rule) {
            log::warn!(
                "Decode rule '{}' for {} replaced by '{}'",
                previous.name,
                key,
                rule.name
            );
        }
    }

    pub fn lookup(&self, key: &IdKey) -> Option<&DecodeRule> {
        self.rules.get(key)
    }

    /// Look up the rule for `key` and run it
    pub fn dispatch(&self, key: &IdKey, timestamp: f64, bits: &BitBuffer) -> Dispatch<'_> {
        match self.lookup(key) {
            Some(rule) => match (rule.decode)(timestamp, bits) {
                Ok(row) => Dispatch::Decoded { rule, row },
                Err(error) => Dispatch::Failed { rule, error },
            },
            None => Dispatch::UnknownId,
        }
    }

    /// Registered rules in key order
    pub fn rules(&self) -> impl Iterator<Item = &DecodeRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
