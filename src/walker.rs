//! Walks a class output tree and rewrites each class file

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::config::OutputMode;
use crate::consts::CLASS_SUFFIX;
use crate::error::{Error, Result};
use crate::transform::ClassTransformer;

/// What happened to one class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Path relative to the walked root
    pub relative_path: PathBuf,
    pub changed: bool,
}

pub struct TreeWalker<'a> {
    transformer: ClassTransformer<'a>,
    output: &'a OutputMode,
}

impl<'a> TreeWalker<'a> {
    pub fn new(transformer: ClassTransformer<'a>, output: &'a OutputMode) -> Self {
        Self { transformer, output }
    }

    /// Transform every `*.class` file under `root`, in file name order.
    ///
    /// The first failure aborts the walk; files already written stay written.
    pub fn walk(&self, root: &Path) -> Result<Vec<FileOutcome>> {
        let mut outcomes = Vec::new();
        for path in class_files(root, self.excluded())? {
            let outcome = self.process(root, &path).map_err(|e| e.in_file(&path))?;
            if outcome.changed {
                debug!("REWRITE: {}", outcome.relative_path.display());
            }
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn excluded(&self) -> Option<&Path> {
        match self.output {
            OutputMode::InPlace => None,
            OutputMode::SideDirectory { target, .. } => Some(target.as_path()),
        }
    }

    fn process(&self, root: &Path, path: &Path) -> Result<FileOutcome> {
        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| Error::config(format!("{} is outside {}", path.display(), root.display())))?
            .to_path_buf();
        let bytes = fs::read(path)?;
        let result = self.transformer.transform(&bytes)?;
        match self.output {
            OutputMode::InPlace => {
                if result.changed {
                    fs::write(path, &result.bytes)?;
                }
            }
            OutputMode::SideDirectory { target, .. } => {
                let destination = target.join(&relative_path);
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).map_err(|e| Error::from(e).in_file(parent))?;
                }
                fs::write(&destination, &result.bytes).map_err(|e| Error::from(e).in_file(&destination))?;
            }
        }
        Ok(FileOutcome { relative_path, changed: result.changed })
    }
}

/// Sorted class files under `root`, skipping the `excluded` subtree
pub fn class_files(root: &Path, excluded: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walk = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| excluded.map_or(true, |skip| entry.path() != skip));
    for entry in walk {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(CLASS_SUFFIX) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
