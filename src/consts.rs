// Well-known names and global safety caps

/// Suffix of a mapping key that turns it into a prefix rule
pub const WILDCARD_SUFFIX: &str = ":all";

/// Extension of compiled class files
pub const CLASS_SUFFIX: &str = ".class";

/// Conventional location of the jar manifest (compared case-insensitively)
pub const MANIFEST_NAME: &str = "META-INF/MANIFEST.MF";

/// Directory holding the manifest
pub const META_INF_DIR: &str = "META-INF/";

/// Universal root of the reference type hierarchy
pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// Type pushed by the synthetic handler of unreachable code
pub const JAVA_LANG_THROWABLE: &str = "java/lang/Throwable";

/// Environment variable appended to the configured classpath
pub const CLASSPATH_ENV: &str = "JREMAP_CLASSPATH";

/// Environment variable naming the JDK whose modules back hierarchy queries
pub const JAVA_HOME_ENV: &str = "JAVA_HOME";

/// Suffix of the default side directory, next to the classes directory
pub const DEFAULT_WORK_SUFFIX: &str = "_remap_work";

// Rewriter: maximum rule applications while resolving one symbol
pub const REWRITE_MAX_ITERS: usize = 64;

// Hierarchy: maximum supertype steps in any single walk
pub const HIERARCHY_MAX_STEPS: usize = 10_000;

// Signature remapper: maximum characters consumed per signature loop
pub const SIGNATURE_MAX_ITERS: usize = 200_000;

// Frame analyzer: maximum worklist steps per method
pub const FRAME_MAX_ITERS: usize = 1_000_000;
