//! Normalized rename rules
//!
//! Raw mapping keys and values use `.` separated names (`com.old.Foo`) and are
//! stored in internal form (`com/old/Foo`). A key ending in `:all` becomes a
//! prefix rule.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::consts::WILDCARD_SUFFIX;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// The whole symbol must equal the pattern
    Exact,
    /// The symbol must start with the pattern; the remainder is kept
    PrefixWildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappingRule {
    pub pattern: String,
    pub replacement: String,
    pub kind: RuleKind,
}

impl MappingRule {
    /// Build a rule from a raw configuration pair
    pub fn from_raw(key: &str, value: &str) -> Result<Self> {
        let (pattern, kind) = match key.strip_suffix(WILDCARD_SUFFIX) {
            Some(prefix) => (prefix, RuleKind::PrefixWildcard),
            None => (key, RuleKind::Exact),
        };
        let pattern = normalize(pattern.trim());
        if pattern.is_empty() {
            return Err(Error::config(format!("empty mapping key '{}'", key)));
        }
        Ok(Self { pattern, replacement: normalize(value.trim()), kind })
    }

    /// Apply this rule, returning the rewritten symbol when it matches
    pub fn apply(&self, symbol: &str) -> Option<String> {
        match self.kind {
            RuleKind::Exact if symbol == self.pattern => Some(self.replacement.clone()),
            RuleKind::PrefixWildcard => symbol
                .strip_prefix(self.pattern.as_str())
                .map(|rest| format!("{}{}", self.replacement, rest)),
            _ => None,
        }
    }

    fn canonical_cmp(&self, other: &Self) -> Ordering {
        let rank = |rule: &Self| match rule.kind {
            RuleKind::Exact => 0,
            RuleKind::PrefixWildcard => 1,
        };
        rank(self)
            .cmp(&rank(other))
            .then_with(|| other.pattern.len().cmp(&self.pattern.len()))
            .then_with(|| self.pattern.cmp(&other.pattern))
    }
}

impl fmt::Display for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RuleKind::Exact => write!(f, "{} -> {}", self.pattern, self.replacement),
            RuleKind::PrefixWildcard => {
                write!(f, "{}{} -> {}", self.pattern, WILDCARD_SUFFIX, self.replacement)
            }
        }
    }
}

/// Replace package separators with the internal path separator
pub fn normalize(name: &str) -> String {
    name.replace('.', "/")
}

/// Immutable, canonically ordered collection of rename rules
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
    exact: HashMap<String, usize>,
}

impl MappingTable {
    /// Normalize raw `(key, value)` pairs into a table.
    ///
    /// Duplicate keys are collapsed when they agree and rejected when they
    /// don't, so the table never depends on the order of `pairs`.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut seen: HashMap<(String, RuleKind), String> = HashMap::new();
        let mut rules = Vec::new();
        for (key, value) in pairs {
            let rule = MappingRule::from_raw(key.as_ref(), value.as_ref())?;
            let slot = (rule.pattern.clone(), rule.kind);
            match seen.get(&slot) {
                Some(existing) if *existing == rule.replacement => continue,
                Some(existing) => {
                    return Err(Error::config(format!(
                        "conflicting mappings for '{}': '{}' and '{}'",
                        key.as_ref(),
                        existing,
                        rule.replacement
                    )));
                }
                None => {
                    seen.insert(slot, rule.replacement.clone());
                    rules.push(rule);
                }
            }
        }
        rules.sort_by(MappingRule::canonical_cmp);

        let exact = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.kind == RuleKind::Exact)
            .map(|(i, rule)| (rule.pattern.clone(), i))
            .collect();
        Ok(Self { rules, exact })
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Exact rule for a whole symbol, if any
    pub fn exact(&self, symbol: &str) -> Option<&MappingRule> {
        self.exact.get(symbol).map(|&i| &self.rules[i])
    }

    /// Longest prefix rule matching the symbol, if any
    pub fn longest_prefix(&self, symbol: &str) -> Option<&MappingRule> {
        // prefix rules are sorted by descending pattern length
        self.rules
            .iter()
            .filter(|rule| rule.kind == RuleKind::PrefixWildcard)
            .find(|rule| symbol.starts_with(rule.pattern.as_str()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
