//! Rename rules and their application to class file symbols

pub mod remapper;
pub mod rewriter;
pub mod signature;
pub mod table;

pub use remapper::Remapper;
pub use rewriter::SymbolRewriter;
pub use signature::remap_signature;
pub use table::{normalize, MappingRule, MappingTable, RuleKind};
