//! jremap: JVM class file symbol remapper
//!
//! Renames types, fields and methods inside compiled class files according to
//! a set of rename rules, recomputes StackMapTable frames against the renamed
//! type hierarchy, and optionally packages the result as a jar.
//!
//! ## Architecture
//!
//! - **mapping**: rename rules, their fixed-point application, signature remapping
//! - **classfile**: class file model, symbol visitor, frame analyzer, pool compaction
//! - **hierarchy**: JDK discovery, read-only type index and common-superclass queries
//! - **transform**: rewrites one class file
//! - **walker**: rewrites a class output tree
//! - **archive**: packages a tree into a jar
//!
//! ## Run Flow
//!
//! ```text
//! Config → MappingTable → SymbolRewriter → ClassIndex → HierarchyResolver
//!        → ClassTransformer (per .class, via TreeWalker) → ArchiveBuilder
//! ```

pub mod archive;
pub mod classfile;
pub mod config;
pub mod consts;
pub mod error;
pub mod hierarchy;
pub mod mapping;
pub mod transform;
pub mod walker;

use std::io;
use std::path::PathBuf;

use log::{info, warn};

pub use archive::{ArchiveBuilder, ArchiveEntry, EntrySource};
pub use config::{Config, OutputMode};
pub use error::{Error, Result};
pub use hierarchy::{ClassIndex, HierarchyResolver, JdkSource, TypeInfo};
pub use mapping::{MappingRule, MappingTable, RuleKind, SymbolRewriter};
pub use transform::{ClassTransformer, RewriteResult};
pub use walker::{FileOutcome, TreeWalker};

/// Result of one [`run`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<FileOutcome>,
    /// Archive written by the run, if packaging was enabled
    pub archive: Option<PathBuf>,
    /// No mapping was configured, so nothing was done
    pub skipped: bool,
}

impl RunSummary {
    pub fn changed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.changed).count()
    }
}

/// Rewrite the configured class tree and package it when asked to
pub fn run(config: &Config) -> Result<RunSummary> {
    let Some(table) = config.mapping_table()? else {
        warn!("No mapping configured, skipping {}", config.classes_dir.display());
        return Ok(RunSummary { skipped: true, ..RunSummary::default() });
    };
    if !config.classes_dir.is_dir() {
        let missing = io::Error::new(io::ErrorKind::NotFound, "classes directory does not exist");
        return Err(Error::from(missing).in_file(&config.classes_dir));
    }
    info!("Remapping {} with {} rules", config.classes_dir.display(), table.len());

    let rewriter = SymbolRewriter::new(table);
    let index = ClassIndex::build(&config.resolved_classpath(), &config.classes_dir, &rewriter)?;
    info!("Indexed {} types", index.len());
    let hierarchy = HierarchyResolver::new(index);
    let transformer = ClassTransformer::new(&rewriter, &hierarchy);
    let outcomes = TreeWalker::new(transformer, &config.output).walk(&config.classes_dir)?;

    let archive = match &config.output {
        OutputMode::SideDirectory { target, archive: Some(path) } => {
            ArchiveBuilder::new(&config.classes_dir)
                .with_rewritten(target)
                .exclude(target)
                .exclude(path)
                .build(path)?;
            Some(path.clone())
        }
        _ => None,
    };

    let summary = RunSummary { outcomes, archive, skipped: false };
    info!("Rewrote {} of {} class files", summary.changed_count(), summary.outcomes.len());
    Ok(summary)
}
