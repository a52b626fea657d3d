//! Run configuration
//!
//! The classpath used for hierarchy queries is the JDK's module archives, then
//! the configured entries, then the entries of the `JREMAP_CLASSPATH`
//! environment variable, split on the platform path separator (`:` on Unix,
//! `;` on Windows). Later entries win over earlier ones.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::consts::{CLASSPATH_ENV, DEFAULT_WORK_SUFFIX};
use crate::error::{Error, Result};
use crate::hierarchy::jdk::JdkSource;
use crate::mapping::MappingTable;

/// Where rewritten class files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Overwrite each class file that changed
    InPlace,
    /// Write every class file under `target`, then optionally package
    SideDirectory { target: PathBuf, archive: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub classes_dir: PathBuf,
    /// Raw `key -> value` pairs, `.`-separated
    pub mappings: Vec<(String, String)>,
    pub classpath: Vec<PathBuf>,
    pub jdk: JdkSource,
    pub output: OutputMode,
}

impl Config {
    /// Side-directory mode with the default target and archive locations
    pub fn new(classes_dir: impl Into<PathBuf>) -> Self {
        let classes_dir = classes_dir.into();
        let target = default_target(&classes_dir);
        let archive = Some(default_archive(&target));
        Self {
            classes_dir,
            mappings: Vec::new(),
            classpath: Vec::new(),
            jdk: JdkSource::Discover,
            output: OutputMode::SideDirectory { target, archive },
        }
    }

    pub fn with_mapping(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.mappings.push((key.into(), value.into()));
        self
    }

    pub fn with_mappings<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.mappings.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Append the pairs of a `key=value` mapping file
    pub fn with_mapping_file(self, path: &Path) -> Result<Self> {
        let pairs = load_mapping_file(path)?;
        Ok(self.with_mappings(pairs))
    }

    pub fn with_classpath_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.classpath.push(entry.into());
        self
    }

    /// Append every entry of a separator-delimited classpath string
    pub fn with_classpath(mut self, classpath: &str) -> Self {
        self.classpath.extend(parse_classpath_entries(classpath));
        self
    }

    pub fn with_jdk(mut self, jdk: JdkSource) -> Self {
        self.jdk = jdk;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn in_place(self) -> Self {
        self.with_output(OutputMode::InPlace)
    }

    /// Side directory at `target`, archive next to it
    pub fn with_target(self, target: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let archive = Some(default_archive(&target));
        self.with_output(OutputMode::SideDirectory { target, archive })
    }

    /// Set the archive path, or disable packaging with `None`.
    ///
    /// Has no effect in in-place mode, which never packages.
    pub fn with_archive(mut self, path: Option<PathBuf>) -> Self {
        if let OutputMode::SideDirectory { archive, .. } = &mut self.output {
            *archive = path;
        }
        self
    }

    /// `None` when no mapping is configured
    pub fn mapping_table(&self) -> Result<Option<MappingTable>> {
        if self.mappings.is_empty() {
            return Ok(None);
        }
        MappingTable::from_pairs(self.mappings.iter().map(|(k, v)| (k.as_str(), v.as_str()))).map(Some)
    }

    /// JDK archives, configured entries, then those of `JREMAP_CLASSPATH`
    pub fn resolved_classpath(&self) -> Vec<PathBuf> {
        let mut entries = self.jdk.archives();
        entries.extend(self.classpath.iter().cloned());
        if let Ok(value) = env::var(CLASSPATH_ENV) {
            debug!("CLASSPATH: Using {} environment variable: {}", CLASSPATH_ENV, value);
            entries.extend(parse_classpath_entries(&value));
        }
        entries
    }
}

/// `<classes>_remap_work`, next to the classes directory
pub fn default_target(classes_dir: &Path) -> PathBuf {
    let mut name = classes_dir.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "classes".into());
    name.push(DEFAULT_WORK_SUFFIX);
    classes_dir.with_file_name(name)
}

/// `<target>.jar`, next to the target directory
pub fn default_archive(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "classes".into());
    name.push(".jar");
    target.with_file_name(name)
}

/// Split a classpath string on the platform separator, dropping empty entries
pub fn parse_classpath_entries(classpath: &str) -> Vec<PathBuf> {
    let separator = if cfg!(windows) { ';' } else { ':' };
    classpath
        .split(separator)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

pub fn load_mapping_file(path: &Path) -> Result<Vec<(String, String)>> {
    let text = fs::read_to_string(path).map_err(|e| Error::from(e).in_file(path))?;
    parse_mapping_lines(&text).map_err(|e| e.in_file(path))
}

/// Parse `key=value` lines; `#` and `!` start comment lines
pub fn parse_mapping_lines(text: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| Error::config(format!("line {}: expected key=value, got '{}'", number + 1, line)))?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return Err(Error::config(format!("line {}: empty key or value", number + 1)));
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locations() {
        let config = Config::new("build/classes");
        assert_eq!(
            config.output,
            OutputMode::SideDirectory {
                target: PathBuf::from("build/classes_remap_work"),
                archive: Some(PathBuf::from("build/classes_remap_work.jar")),
            }
        );
        let config = config.with_target("out/work").with_archive(None);
        assert_eq!(config.output, OutputMode::SideDirectory { target: PathBuf::from("out/work"), archive: None });
    }

    #[test]
    fn test_mapping_lines() {
        let pairs = parse_mapping_lines("# comment\n! also\n\ncom.old:all = com.new\ncom.a.B=com.c.D\n").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("com.old:all".to_string(), "com.new".to_string()),
                ("com.a.B".to_string(), "com.c.D".to_string())
            ]
        );
        assert!(matches!(parse_mapping_lines("no separator"), Err(Error::Config { .. })));
    }

    #[test]
    fn test_classpath_entries() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let raw = format!("a.jar{sep} {sep}lib/classes", sep = separator);
        assert_eq!(parse_classpath_entries(&raw), vec![PathBuf::from("a.jar"), PathBuf::from("lib/classes")]);
        assert!(parse_classpath_entries("").is_empty());
    }

    #[test]
    fn test_jdk_archives_come_first() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join("jmods")).unwrap();
        fs::write(home.path().join("jmods/java.base.jmod"), b"").unwrap();

        let config = Config::new("c").with_classpath_entry("lib.jar").with_jdk(JdkSource::Home(home.path().into()));
        let classpath = config.resolved_classpath();
        assert_eq!(&classpath[..2], &[home.path().join("jmods/java.base.jmod"), PathBuf::from("lib.jar")]);

        let classpath = config.with_jdk(JdkSource::Disabled).resolved_classpath();
        assert_eq!(classpath.first(), Some(&PathBuf::from("lib.jar")));
    }

    #[test]
    fn test_empty_mapping_is_absent() {
        assert!(Config::new("c").mapping_table().unwrap().is_none());
        let table = Config::new("c").with_mapping("a.B", "c.D").mapping_table().unwrap().unwrap();
        assert_eq!(table.len(), 1);
    }
}
