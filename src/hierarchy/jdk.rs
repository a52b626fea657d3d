// Platform classes: JDK discovery, plus a built-in table of core types used
// when neither the JDK nor the classpath provides them

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;

use super::TypeInfo;
use crate::consts::JAVA_HOME_ENV;

/// Where platform class headers come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JdkSource {
    /// `$JAVA_HOME`, else the installation owning the `java` launcher on `PATH`
    #[default]
    Discover,
    /// A JDK installation directory
    Home(PathBuf),
    /// Only the built-in table
    Disabled,
}

impl JdkSource {
    /// Archives holding the platform classes, empty when no JDK is found
    pub fn archives(&self) -> Vec<PathBuf> {
        let home = match self {
            JdkSource::Discover => discover_home(),
            JdkSource::Home(home) => Some(home.clone()),
            JdkSource::Disabled => None,
        };
        let Some(home) = home else {
            debug!("JDK: no installation found, falling back to built-in types");
            return Vec::new();
        };
        let archives = module_archives(&home);
        if archives.is_empty() {
            debug!("JDK: no jmods or rt.jar under {}", home.display());
        } else {
            debug!("JDK: {} module archives under {}", archives.len(), home.display());
        }
        archives
    }
}

/// `$JAVA_HOME` if it names a directory, else `<home>` of `<home>/bin/java` found on `PATH`
pub fn discover_home() -> Option<PathBuf> {
    if let Some(home) = env::var_os(JAVA_HOME_ENV).map(PathBuf::from).filter(|p| p.is_dir()) {
        return Some(home);
    }
    let launcher = if cfg!(windows) { "java.exe" } else { "java" };
    let search = env::var_os("PATH")?;
    let java = env::split_paths(&search)
        .map(|dir| dir.join(launcher))
        .find(|candidate| candidate.is_file())?;
    // /usr/bin/java and the like link into the installation
    let java = fs::canonicalize(&java).unwrap_or(java);
    java.parent()?.parent().map(Path::to_path_buf)
}

/// Sorted `jmods/*.jmod` of a modular JDK, or the `rt.jar` of a JDK 8 layout
pub fn module_archives(home: &Path) -> Vec<PathBuf> {
    let mut modules: Vec<PathBuf> = fs::read_dir(home.join("jmods"))
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "jmod") && path.is_file())
                .collect()
        })
        .unwrap_or_default();
    if modules.is_empty() {
        modules = ["jre/lib/rt.jar", "lib/rt.jar"]
            .iter()
            .map(|relative| home.join(relative))
            .filter(|path| path.is_file())
            .collect();
    }
    modules.sort();
    modules
}

// (name, superclass, interfaces, is_interface)
const BUILTIN_TYPES: &[(&str, Option<&str>, &[&str], bool)] = &[
    ("java/lang/Object", None, &[], false),
    ("java/io/Serializable", Some("java/lang/Object"), &[], true),
    ("java/lang/Cloneable", Some("java/lang/Object"), &[], true),
    ("java/lang/Comparable", Some("java/lang/Object"), &[], true),
    ("java/lang/CharSequence", Some("java/lang/Object"), &[], true),
    ("java/lang/Runnable", Some("java/lang/Object"), &[], true),
    ("java/lang/AutoCloseable", Some("java/lang/Object"), &[], true),
    ("java/io/Closeable", Some("java/lang/Object"), &["java/lang/AutoCloseable"], true),
    ("java/lang/Appendable", Some("java/lang/Object"), &[], true),
    ("java/lang/Iterable", Some("java/lang/Object"), &[], true),
    ("java/lang/annotation/Annotation", Some("java/lang/Object"), &[], true),
    ("java/lang/reflect/Type", Some("java/lang/Object"), &[], true),
    ("java/lang/String", Some("java/lang/Object"), &["java/io/Serializable", "java/lang/Comparable", "java/lang/CharSequence"], false),
    ("java/lang/AbstractStringBuilder", Some("java/lang/Object"), &["java/lang/Appendable", "java/lang/CharSequence"], false),
    ("java/lang/StringBuilder", Some("java/lang/AbstractStringBuilder"), &["java/io/Serializable", "java/lang/Comparable", "java/lang/CharSequence"], false),
    ("java/lang/StringBuffer", Some("java/lang/AbstractStringBuilder"), &["java/io/Serializable", "java/lang/Comparable", "java/lang/CharSequence"], false),
    ("java/lang/Class", Some("java/lang/Object"), &["java/io/Serializable", "java/lang/reflect/Type"], false),
    ("java/lang/Enum", Some("java/lang/Object"), &["java/lang/Comparable", "java/io/Serializable"], false),
    ("java/lang/Record", Some("java/lang/Object"), &[], false),
    ("java/lang/Number", Some("java/lang/Object"), &["java/io/Serializable"], false),
    ("java/lang/Boolean", Some("java/lang/Object"), &["java/io/Serializable", "java/lang/Comparable"], false),
    ("java/lang/Character", Some("java/lang/Object"), &["java/io/Serializable", "java/lang/Comparable"], false),
    ("java/lang/Byte", Some("java/lang/Number"), &["java/lang/Comparable"], false),
    ("java/lang/Short", Some("java/lang/Number"), &["java/lang/Comparable"], false),
    ("java/lang/Integer", Some("java/lang/Number"), &["java/lang/Comparable"], false),
    ("java/lang/Long", Some("java/lang/Number"), &["java/lang/Comparable"], false),
    ("java/lang/Float", Some("java/lang/Number"), &["java/lang/Comparable"], false),
    ("java/lang/Double", Some("java/lang/Number"), &["java/lang/Comparable"], false),
    ("java/lang/Thread", Some("java/lang/Object"), &["java/lang/Runnable"], false),
    ("java/lang/Throwable", Some("java/lang/Object"), &["java/io/Serializable"], false),
    ("java/lang/Exception", Some("java/lang/Throwable"), &[], false),
    ("java/lang/Error", Some("java/lang/Throwable"), &[], false),
    ("java/lang/RuntimeException", Some("java/lang/Exception"), &[], false),
    ("java/lang/IllegalArgumentException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/IllegalStateException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/NullPointerException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/ClassCastException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/ArithmeticException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/IndexOutOfBoundsException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/ArrayIndexOutOfBoundsException", Some("java/lang/IndexOutOfBoundsException"), &[], false),
    ("java/lang/UnsupportedOperationException", Some("java/lang/RuntimeException"), &[], false),
    ("java/lang/ReflectiveOperationException", Some("java/lang/Exception"), &[], false),
    ("java/lang/ClassNotFoundException", Some("java/lang/ReflectiveOperationException"), &[], false),
    ("java/lang/InterruptedException", Some("java/lang/Exception"), &[], false),
    ("java/lang/CloneNotSupportedException", Some("java/lang/Exception"), &[], false),
    ("java/io/IOException", Some("java/lang/Exception"), &[], false),
    ("java/io/UncheckedIOException", Some("java/lang/RuntimeException"), &[], false),
    ("java/util/Iterator", Some("java/lang/Object"), &[], true),
    ("java/util/Collection", Some("java/lang/Object"), &["java/lang/Iterable"], true),
    ("java/util/List", Some("java/lang/Object"), &["java/util/Collection"], true),
    ("java/util/Set", Some("java/lang/Object"), &["java/util/Collection"], true),
    ("java/util/Map", Some("java/lang/Object"), &[], true),
    ("java/util/RandomAccess", Some("java/lang/Object"), &[], true),
    ("java/util/AbstractCollection", Some("java/lang/Object"), &["java/util/Collection"], false),
    ("java/util/AbstractList", Some("java/util/AbstractCollection"), &["java/util/List"], false),
    ("java/util/ArrayList", Some("java/util/AbstractList"), &["java/util/List", "java/util/RandomAccess", "java/lang/Cloneable", "java/io/Serializable"], false),
    ("java/util/AbstractSet", Some("java/util/AbstractCollection"), &["java/util/Set"], false),
    ("java/util/HashSet", Some("java/util/AbstractSet"), &["java/util/Set", "java/lang/Cloneable", "java/io/Serializable"], false),
    ("java/util/AbstractMap", Some("java/lang/Object"), &["java/util/Map"], false),
    ("java/util/HashMap", Some("java/util/AbstractMap"), &["java/util/Map", "java/lang/Cloneable", "java/io/Serializable"], false),
];

static BUILTIN: Lazy<HashMap<&'static str, TypeInfo>> = Lazy::new(|| {
    BUILTIN_TYPES
        .iter()
        .map(|(name, super_name, interfaces, is_interface)| {
            let info = TypeInfo {
                name: name.to_string(),
                super_name: super_name.map(str::to_string),
                interfaces: interfaces.iter().map(|i| i.to_string()).collect(),
                is_interface: *is_interface,
            };
            (*name, info)
        })
        .collect()
});

/// Built-in row for a core JDK type
pub fn builtin(name: &str) -> Option<&'static TypeInfo> {
    BUILTIN.get(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_supertypes_are_builtin() {
        for info in BUILTIN.values() {
            for parent in info.super_name.iter().chain(info.interfaces.iter()) {
                assert!(builtin(parent).is_some(), "{} -> {}", info.name, parent);
            }
        }
        assert!(builtin("java/util/List").unwrap().is_interface);
    }

    #[test]
    fn test_module_archives_of_a_modular_jdk() {
        let home = tempfile::tempdir().unwrap();
        let jmods = home.path().join("jmods");
        fs::create_dir_all(&jmods).unwrap();
        fs::write(jmods.join("java.sql.jmod"), b"").unwrap();
        fs::write(jmods.join("java.base.jmod"), b"").unwrap();
        fs::write(jmods.join("README"), b"").unwrap();

        assert_eq!(module_archives(home.path()), vec![jmods.join("java.base.jmod"), jmods.join("java.sql.jmod")]);
        assert_eq!(JdkSource::Home(home.path().to_path_buf()).archives().len(), 2);
        assert!(JdkSource::Disabled.archives().is_empty());
    }

    #[test]
    fn test_module_archives_of_a_legacy_jdk() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join("jre/lib")).unwrap();
        fs::write(home.path().join("jre/lib/rt.jar"), b"").unwrap();
        assert_eq!(module_archives(home.path()), vec![home.path().join("jre/lib/rt.jar")]);
        assert!(module_archives(&home.path().join("missing")).is_empty());
    }
}
