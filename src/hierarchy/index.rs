//! Read-only type index built from class headers
//!
//! Rows are kept in post-rename form: every supertype is passed through the
//! rewriter, and a renamed type is also reachable under its new name unless a
//! real type already has that name.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use super::TypeInfo;
use crate::classfile::{ClassHeader, ClassRecord};
use crate::consts::CLASS_SUFFIX;

// jmod entries live under `classes/`; the zip reader skips the 4-byte `JM` header
const MODULE_INFO_CLASS: &str = "module-info.class";
use crate::error::{Error, Result};
use crate::mapping::SymbolRewriter;

#[derive(Debug, Clone, Default)]
pub struct ClassIndex {
    types: HashMap<String, TypeInfo>,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every class header found on `classpath` and under `classes_dir`.
    ///
    /// Classpath entries are directories or `.jar`/`.zip`/`.jmod` archives;
    /// a later entry wins over an earlier one, and `classes_dir` wins over all.
    pub fn build(classpath: &[PathBuf], classes_dir: &Path, rewriter: &SymbolRewriter) -> Result<Self> {
        let mut headers: HashMap<String, ClassHeader> = HashMap::new();
        for entry in classpath {
            if entry.is_dir() {
                debug!("CLASSPATH: indexing directory {}", entry.display());
                index_directory(entry, &mut headers)?;
            } else if is_archive(entry) && entry.is_file() {
                debug!("CLASSPATH: indexing archive {}", entry.display());
                index_archive(entry, &mut headers).map_err(|e| e.in_file(entry))?;
            } else {
                debug!("CLASSPATH: skipping missing or unsupported entry {}", entry.display());
            }
        }
        index_directory(classes_dir, &mut headers)?;
        Self::from_headers(headers.into_values(), rewriter)
    }

    /// Build the post-rename view of a set of headers
    pub fn from_headers(headers: impl IntoIterator<Item = ClassHeader>, rewriter: &SymbolRewriter) -> Result<Self> {
        let mut index = Self::new();
        let mut renamed = Vec::new();
        for header in headers {
            let info = TypeInfo {
                name: header.name.clone(),
                super_name: header.super_name.as_deref().map(|s| rewriter.rewrite(s)).transpose()?,
                interfaces: header
                    .interfaces
                    .iter()
                    .map(|i| rewriter.rewrite(i))
                    .collect::<Result<Vec<_>>>()?,
                is_interface: header.is_interface(),
            };
            let alias = rewriter.rewrite(&header.name)?;
            if alias != header.name {
                renamed.push(TypeInfo { name: alias, ..info.clone() });
            }
            index.insert(info);
        }
        for alias in renamed {
            if !index.types.contains_key(&alias.name) {
                debug!("CLASSPATH: alias {} for a renamed type", alias.name);
                index.insert(alias);
            }
        }
        Ok(index)
    }

    pub fn insert(&mut self, info: TypeInfo) {
        self.types.insert(info.name.clone(), info);
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<TypeInfo> for ClassIndex {
    fn from_iter<I: IntoIterator<Item = TypeInfo>>(iter: I) -> Self {
        let mut index = Self::new();
        for info in iter {
            index.insert(info);
        }
        index
    }
}

fn is_archive(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("jar") | Some("zip") | Some("jmod")
    )
}

fn record(headers: &mut HashMap<String, ClassHeader>, bytes: &[u8], origin: &dyn std::fmt::Display) {
    match ClassRecord::parse_header(bytes) {
        Ok(header) => {
            headers.insert(header.name.clone(), header);
        }
        Err(e) => warn!("CLASSPATH: ignoring unreadable class {}: {}", origin, e),
    }
}

fn index_directory(dir: &Path, headers: &mut HashMap<String, ClassHeader>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.to_string_lossy().ends_with(CLASS_SUFFIX) {
            let bytes = fs::read(path).map_err(|e| Error::from(e).in_file(path))?;
            record(headers, &bytes, &path.display());
        }
    }
    Ok(())
}

fn index_archive(path: &Path, headers: &mut HashMap<String, ClassHeader>) -> Result<()> {
    let file = fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();
        if entry.is_dir()
            || !name.ends_with(CLASS_SUFFIX)
            || name.ends_with(MODULE_INFO_CLASS)
            || name.starts_with("META-INF/versions/")
        {
            continue;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        record(headers, &bytes, &name);
    }
    Ok(())
}
