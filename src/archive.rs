//! Packages a class tree into a jar
//!
//! The manifest, when present, leads the archive (after its `META-INF/`
//! directory entry). Every other file follows in file name order, each
//! preceded by the directory entries it needs. Class files come from the
//! rewritten side directory when a copy exists there. Timestamps are fixed,
//! so building the same tree twice yields the same archive.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::consts::{CLASS_SUFFIX, MANIFEST_NAME, META_INF_DIR};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    Directory,
    Manifest(PathBuf),
    /// A file of the walked tree, copied verbatim
    Original(PathBuf),
    /// The side-directory copy of a class file
    Rewritten(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated name inside the archive; directories end with `/`
    pub path: String,
    pub source: EntrySource,
}

#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    root: PathBuf,
    rewritten: Option<PathBuf>,
    excluded: Vec<PathBuf>,
}

impl ArchiveBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), rewritten: None, excluded: Vec::new() }
    }

    /// Prefer class files found under `dir`
    pub fn with_rewritten(mut self, dir: impl Into<PathBuf>) -> Self {
        self.rewritten = Some(dir.into());
        self
    }

    /// Leave `path` (a file or a whole subtree of the root) out of the archive
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.excluded.push(path.into());
        self
    }

    /// Entries in archive order
    pub fn plan(&self) -> Result<Vec<ArchiveEntry>> {
        let mut manifest = None;
        let mut files = Vec::new();
        let walk = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.excluded.iter().any(|skip| entry.path() == skip));
        for entry in walk {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry_name(&self.root, entry.path())?;
            if manifest.is_none() && name.eq_ignore_ascii_case(MANIFEST_NAME) {
                manifest = Some(entry.into_path());
            } else {
                files.push((name, entry.into_path()));
            }
        }

        let mut entries = Vec::new();
        let mut directories = HashSet::new();
        if let Some(path) = manifest {
            directories.insert(META_INF_DIR.to_string());
            entries.push(ArchiveEntry { path: META_INF_DIR.to_string(), source: EntrySource::Directory });
            entries.push(ArchiveEntry { path: MANIFEST_NAME.to_string(), source: EntrySource::Manifest(path) });
        }
        for (name, path) in files {
            for (i, _) in name.match_indices('/') {
                let directory = &name[..=i];
                if directories.insert(directory.to_string()) {
                    entries.push(ArchiveEntry { path: directory.to_string(), source: EntrySource::Directory });
                }
            }
            let source = match self.rewritten_copy(&name) {
                Some(copy) => EntrySource::Rewritten(copy),
                None => EntrySource::Original(path),
            };
            entries.push(ArchiveEntry { path: name, source });
        }
        Ok(entries)
    }

    fn rewritten_copy(&self, name: &str) -> Option<PathBuf> {
        if !name.ends_with(CLASS_SUFFIX) {
            return None;
        }
        let candidate = self.rewritten.as_ref()?.join(name);
        candidate.is_file().then_some(candidate)
    }

    /// Write the planned entries to a new jar at `output`; returns the entry count
    pub fn build(&self, output: &Path) -> Result<usize> {
        let entries = self.plan()?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::from(e).in_file(parent))?;
        }
        let file = fs::File::create(output).map_err(|e| Error::from(e).in_file(output))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());

        for entry in &entries {
            match &entry.source {
                EntrySource::Directory => writer.add_directory(entry.path.as_str(), options)?,
                EntrySource::Manifest(path) | EntrySource::Original(path) | EntrySource::Rewritten(path) => {
                    writer.start_file(entry.path.as_str(), options)?;
                    let mut source = fs::File::open(path).map_err(|e| Error::from(e).in_file(path))?;
                    io::copy(&mut source, &mut writer).map_err(|e| Error::from(e).in_file(path))?;
                    debug!("ARCHIVE: {} <- {}", entry.path, path.display());
                }
            }
        }
        writer.finish()?;
        info!("ARCHIVE: wrote {} entries to {}", entries.len(), output.display());
        Ok(entries.len())
    }
}

/// `/`-separated path of `path` relative to `root`
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::config(format!("{} is outside {}", path.display(), root.display())))?;
    let parts: Vec<_> = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    Ok(parts.join("/"))
}
