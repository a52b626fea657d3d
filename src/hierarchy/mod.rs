//! Type hierarchy queries for frame computation
//!
//! Lookups go to the class currently being transformed first, then to the
//! [`ClassIndex`] (which holds the JDK's modules when one was found), then to
//! the built-in table of core JDK types.

pub mod index;
pub mod jdk;

use std::collections::HashSet;

use log::warn;

use crate::classfile::TypeMerger;
use crate::consts::{HIERARCHY_MAX_STEPS, JAVA_LANG_OBJECT};
use crate::error::{Error, Result};

pub use index::ClassIndex;
pub use jdk::JdkSource;

/// One row of the hierarchy: supertypes and the interface flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyResolver {
    index: ClassIndex,
}

impl HierarchyResolver {
    pub fn new(index: ClassIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &ClassIndex {
        &self.index
    }

    /// Queries that also see `local`, the class being transformed
    pub fn scope<'a>(&'a self, local: Option<&'a TypeInfo>) -> HierarchyScope<'a> {
        HierarchyScope { resolver: self, local }
    }

    pub fn common_superclass(&self, a: &str, b: &str) -> Result<String> {
        self.scope(None).common_superclass(a, b)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HierarchyScope<'a> {
    resolver: &'a HierarchyResolver,
    local: Option<&'a TypeInfo>,
}

impl<'a> HierarchyScope<'a> {
    pub fn lookup(&self, name: &str) -> Result<&'a TypeInfo> {
        if let Some(local) = self.local.filter(|l| l.name == name) {
            return Ok(local);
        }
        self.resolver
            .index
            .get(name)
            .or_else(|| jdk::builtin(name))
            .ok_or_else(|| Error::UnresolvableType { name: name.to_string() })
    }

    /// Nearest common superclass of two class or interface names.
    ///
    /// A circular supertype chain degrades to `java/lang/Object`.
    pub fn common_superclass(&self, a: &str, b: &str) -> Result<String> {
        match self.resolve_common(a, b) {
            Err(Error::CircularHierarchy { name }) => {
                warn!("HIERARCHY: circular supertypes through {}, using {}", name, JAVA_LANG_OBJECT);
                Ok(JAVA_LANG_OBJECT.to_string())
            }
            other => other,
        }
    }

    fn resolve_common(&self, a: &str, b: &str) -> Result<String> {
        if a == b {
            return Ok(a.to_string());
        }
        let ta = self.lookup(a)?;
        let tb = self.lookup(b)?;
        if self.is_assignable(b, a)? {
            return Ok(b.to_string());
        }
        if self.is_assignable(a, b)? {
            return Ok(a.to_string());
        }
        if ta.is_interface || tb.is_interface {
            return Ok(JAVA_LANG_OBJECT.to_string());
        }
        let mut current = ta.super_name.clone();
        let mut seen = HashSet::from([a.to_string()]);
        while let Some(candidate) = current {
            if !seen.insert(candidate.clone()) || seen.len() > HIERARCHY_MAX_STEPS {
                return Err(Error::CircularHierarchy { name: candidate });
            }
            if self.is_assignable(&candidate, b)? {
                return Ok(candidate);
            }
            current = self.lookup(&candidate)?.super_name.clone();
        }
        Ok(JAVA_LANG_OBJECT.to_string())
    }

    /// Whether a value of type `from` may be stored where `to` is expected
    pub fn is_assignable(&self, to: &str, from: &str) -> Result<bool> {
        if to == from || to == JAVA_LANG_OBJECT {
            return Ok(true);
        }
        // superclass chain, checked for cycles
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(from.to_string());
        while let Some(name) = current {
            if !seen.insert(name.clone()) || seen.len() > HIERARCHY_MAX_STEPS {
                return Err(Error::CircularHierarchy { name });
            }
            let info = self.lookup(&name)?;
            if name == to {
                return Ok(true);
            }
            chain.push(info);
            current = info.super_name.clone();
        }
        // interfaces of every class on the chain, transitively
        let mut pending: Vec<&str> = chain.iter().flat_map(|t| t.interfaces.iter().map(String::as_str)).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(name) = pending.pop() {
            if name == to {
                return Ok(true);
            }
            if !visited.insert(name) {
                continue;
            }
            if visited.len() > HIERARCHY_MAX_STEPS {
                return Err(Error::CircularHierarchy { name: name.to_string() });
            }
            pending.extend(self.lookup(name)?.interfaces.iter().map(String::as_str));
        }
        Ok(false)
    }
}

impl TypeMerger for HierarchyScope<'_> {
    fn common_superclass(&self, a: &str, b: &str) -> Result<String> {
        HierarchyScope::common_superclass(self, a, b)
    }
}
