//! Applies a [`SymbolRewriter`] to every symbol occurrence of a class file

use super::rewriter::SymbolRewriter;
use super::signature::remap_signature;
use crate::classfile::visitor::{MemberKind, SignatureKind, SymbolVisitor};
use crate::error::{Error, Result};

/// Symbol visitor that renames and remembers whether anything changed
#[derive(Debug)]
pub struct Remapper<'a> {
    rewriter: &'a SymbolRewriter,
    changed: bool,
}

impl<'a> Remapper<'a> {
    pub fn new(rewriter: &'a SymbolRewriter) -> Self {
        Self { rewriter, changed: false }
    }

    /// True once any visited symbol differed from its pre-image
    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn map_type(&mut self, internal_name: &str) -> Result<String> {
        let (out, changed) = self.rewriter.rewrite_tracked(internal_name)?;
        self.changed |= changed;
        Ok(out)
    }

    /// Rewrite every `L<name>;` inside a field or method descriptor
    pub fn map_descriptor(&mut self, descriptor: &str) -> Result<String> {
        if !descriptor.contains('L') {
            return Ok(descriptor.to_string());
        }
        let mut out = String::with_capacity(descriptor.len());
        let mut rest = descriptor;
        while let Some(start) = rest.find('L') {
            out.push_str(&rest[..start + 1]);
            let body = &rest[start + 1..];
            let end = body
                .find(';')
                .ok_or_else(|| Error::class_format(format!("invalid descriptor '{}'", descriptor)))?;
            let mapped = self.map_type(&body[..end])?;
            out.push_str(&mapped);
            out.push(';');
            rest = &body[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl SymbolVisitor for Remapper<'_> {
    fn visit_type(&mut self, internal_name: &str) -> Result<String> {
        self.map_type(internal_name)
    }

    fn visit_descriptor(&mut self, descriptor: &str) -> Result<String> {
        self.map_descriptor(descriptor)
    }

    fn visit_signature(&mut self, signature: &str, kind: SignatureKind) -> Result<String> {
        remap_signature(signature, kind, |name: &str| self.map_type(name))
    }

    fn visit_member(&mut self, owner: &str, name: &str, descriptor: &str, _kind: MemberKind) -> Result<String> {
        match self.rewriter.rename_member(owner, name, Some(descriptor)) {
            Some(renamed) => {
                self.changed = true;
                Ok(renamed)
            }
            None => Ok(name.to_string()),
        }
    }

    fn visit_annotation(&mut self, descriptor: &str) -> Result<String> {
        self.map_descriptor(descriptor)
    }

    fn visit_annotation_element(&mut self, annotation: &str, name: &str) -> Result<String> {
        let owner = annotation
            .strip_prefix('L')
            .and_then(|d| d.strip_suffix(';'))
            .unwrap_or(annotation);
        self.visit_member(owner, name, "", MemberKind::Method)
    }

    fn visit_package(&mut self, name: &str) -> Result<String> {
        self.map_type(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingTable;

    fn rewriter(pairs: &[(&str, &str)]) -> SymbolRewriter {
        SymbolRewriter::new(MappingTable::from_pairs(pairs.iter().copied()).unwrap())
    }

    #[test]
    fn test_descriptor_mapping() {
        let rw = rewriter(&[("com.old.Foo", "com.new.Bar")]);
        let mut r = Remapper::new(&rw);
        assert_eq!(r.map_descriptor("(ILjava/lang/String;)V").unwrap(), "(ILjava/lang/String;)V");
        assert!(!r.changed());
        assert_eq!(
            r.map_descriptor("([Lcom/old/Foo;J)Lcom/old/Foo;").unwrap(),
            "([Lcom/new/Bar;J)Lcom/new/Bar;"
        );
        assert!(r.changed());
    }

    #[test]
    fn test_signature_marks_change() {
        let rw = rewriter(&[("com.old:all", "com.new")]);
        let mut r = Remapper::new(&rw);
        let out = r.visit_signature("Ljava/util/List<Lcom/old/X;>;", SignatureKind::Field).unwrap();
        assert_eq!(out, "Ljava/util/List<Lcom/new/X;>;");
        assert!(r.changed());
    }

    #[test]
    fn test_members_and_annotation_elements() {
        let rw = rewriter(&[("com.old.Foo.count", "total"), ("com.old.Anno.value", "name")]);
        let mut r = Remapper::new(&rw);
        assert_eq!(r.visit_member("com/old/Foo", "count", "I", MemberKind::Field).unwrap(), "total");
        assert_eq!(r.visit_annotation_element("Lcom/old/Anno;", "value").unwrap(), "name");
        assert_eq!(r.visit_member("com/old/Other", "count", "I", MemberKind::Field).unwrap(), "count");
    }
}
