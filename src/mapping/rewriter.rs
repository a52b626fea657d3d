//! Fixed-point symbol rewriting
//!
//! Each scan step applies a single winning rule: an exact match on the whole
//! symbol, otherwise the longest matching prefix rule. Scanning restarts on
//! the new value until no rule applies.

use std::collections::HashSet;

use crate::consts::REWRITE_MAX_ITERS;
use crate::error::{Error, Result};

use super::table::{MappingRule, MappingTable};

/// Applies a [`MappingTable`] to individual symbols
#[derive(Debug, Clone, Default)]
pub struct SymbolRewriter {
    table: MappingTable,
}

impl SymbolRewriter {
    pub fn new(table: MappingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Rewrite a symbol to its fixed point
    pub fn rewrite(&self, symbol: &str) -> Result<String> {
        self.rewrite_tracked(symbol).map(|(out, _)| out)
    }

    /// Rewrite a symbol and report whether it differs from the input
    pub fn rewrite_tracked(&self, symbol: &str) -> Result<(String, bool)> {
        if self.table.is_empty() {
            return Ok((symbol.to_string(), false));
        }

        let mut current = symbol.to_string();
        let mut seen: HashSet<String> = HashSet::new();
        let mut steps = 0usize;
        while let Some(rule) = self.winner(&current) {
            let Some(next) = rule.apply(&current) else { break };
            if next == current {
                break;
            }
            steps += 1;
            if steps > REWRITE_MAX_ITERS || !seen.insert(current.clone()) {
                return Err(Error::RewriteCycle { symbol: symbol.to_string(), steps });
            }
            current = next;
        }
        let changed = current != symbol;
        Ok((current, changed))
    }

    /// New simple name of a field or method, if an exact rule renames it.
    ///
    /// Methods are looked up as `owner/name(descriptor)` first, then as
    /// `owner/name`; fields only as `owner/name`. The last `/` segment of the
    /// replacement is the new name.
    pub fn rename_member(&self, owner: &str, name: &str, descriptor: Option<&str>) -> Option<String> {
        if name.starts_with('<') || self.table.is_empty() {
            return None;
        }
        let plain = format!("{}/{}", owner, name);
        let rule = descriptor
            .filter(|desc| desc.starts_with('('))
            .and_then(|desc| self.table.exact(&format!("{}{}", plain, desc)))
            .or_else(|| self.table.exact(&plain))?;
        let renamed = rule
            .replacement
            .rsplit('/')
            .next()
            .unwrap_or(rule.replacement.as_str());
        (!renamed.is_empty() && renamed != name).then(|| renamed.to_string())
    }

    fn winner(&self, symbol: &str) -> Option<&MappingRule> {
        self.table.exact(symbol).or_else(|| self.table.longest_prefix(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter(pairs: &[(&str, &str)]) -> SymbolRewriter {
        SymbolRewriter::new(MappingTable::from_pairs(pairs.iter().copied()).unwrap())
    }

    #[test]
    fn test_unmatched_symbol_is_identity() {
        let rw = rewriter(&[("com.old.Foo", "com.new.Bar")]);
        assert_eq!(rw.rewrite_tracked("org/x/Y").unwrap(), ("org/x/Y".to_string(), false));
    }

    #[test]
    fn test_exact_rule() {
        let rw = rewriter(&[("com.old.Foo", "com.new.Bar")]);
        assert_eq!(rw.rewrite("com/old/Foo").unwrap(), "com/new/Bar");
        // exact rules never match a longer symbol
        assert_eq!(rw.rewrite("com/old/FooBar").unwrap(), "com/old/FooBar");
    }

    #[test]
    fn test_prefix_rule_keeps_remainder() {
        let rw = rewriter(&[("com.old:all", "com.new")]);
        assert_eq!(rw.rewrite("com/old/sub/Thing").unwrap(), "com/new/sub/Thing");
        assert_eq!(rw.rewrite("org/old/Thing").unwrap(), "org/old/Thing");
    }

    #[test]
    fn test_chained_rules_reach_fixed_point() {
        let rw = rewriter(&[("a.A", "b.B"), ("b.B", "c.C")]);
        let once = rw.rewrite("a/A").unwrap();
        assert_eq!(once, "c/C");
        assert_eq!(rw.rewrite(&once).unwrap(), once);
    }

    #[test]
    fn test_exact_beats_prefix_and_longest_prefix_wins() {
        let rw = rewriter(&[("com:all", "x"), ("com.old:all", "y"), ("com.old.Special", "z.Z")]);
        assert_eq!(rw.rewrite("com/old/Special").unwrap(), "z/Z");
        assert_eq!(rw.rewrite("com/old/Other").unwrap(), "y/Other");
        assert_eq!(rw.rewrite("com/misc/Other").unwrap(), "x/misc/Other");
    }

    #[test]
    fn test_cycle_is_reported() {
        let rw = rewriter(&[("a.A", "b.B"), ("b.B", "a.A")]);
        assert!(matches!(rw.rewrite("a/A"), Err(Error::RewriteCycle { .. })));
    }

    #[test]
    fn test_growing_prefix_is_capped() {
        let rw = rewriter(&[("a:all", "a.b")]);
        match rw.rewrite("a/X") {
            Err(Error::RewriteCycle { steps, .. }) => assert!(steps > REWRITE_MAX_ITERS),
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn test_identity_rule_is_not_a_change() {
        let rw = rewriter(&[("a.A", "a.A")]);
        assert_eq!(rw.rewrite_tracked("a/A").unwrap(), ("a/A".to_string(), false));
    }

    #[test]
    fn test_member_rename() {
        let rw = rewriter(&[("com.old.Foo.bar", "baz"), ("com.old.Foo.run(I)V", "go")]);
        assert_eq!(rw.rename_member("com/old/Foo", "bar", None), Some("baz".to_string()));
        assert_eq!(rw.rename_member("com/old/Foo", "run", Some("(I)V")), Some("go".to_string()));
        assert_eq!(rw.rename_member("com/old/Foo", "run", Some("(J)V")), None);
        assert_eq!(rw.rename_member("com/old/Foo", "<init>", Some("()V")), None);
    }
}
