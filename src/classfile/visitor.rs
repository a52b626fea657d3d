//! Symbol visitor over a parsed class file
//!
//! [`walk_class`] reaches every symbolic name a class file embeds and hands it
//! to a [`SymbolVisitor`]. Whatever the visitor returns is written back: pool
//! entries that may be shared (UTF-8, NameAndType) are never edited in place,
//! new ones are appended and deduplicated instead.

use super::attribute::{Annotation, AttributeBody, AttributeInfo, ElementValue};
use super::class::ClassRecord;
use super::constpool::{Constant, ConstantPool};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Class,
    Method,
    /// Field, record component or local variable type signature
    Field,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Method,
}

/// One callback per kind of symbol occurrence; the defaults keep the symbol
pub trait SymbolVisitor {
    /// Internal name of a class or interface (`com/foo/Bar`)
    fn visit_type(&mut self, internal_name: &str) -> Result<String> {
        Ok(internal_name.to_string())
    }

    /// Field or method descriptor
    fn visit_descriptor(&mut self, descriptor: &str) -> Result<String> {
        Ok(descriptor.to_string())
    }

    fn visit_signature(&mut self, signature: &str, _kind: SignatureKind) -> Result<String> {
        Ok(signature.to_string())
    }

    /// Simple name of a field or method declared in, or referenced on, `owner`
    fn visit_member(&mut self, _owner: &str, name: &str, _descriptor: &str, _kind: MemberKind) -> Result<String> {
        Ok(name.to_string())
    }

    /// Descriptor of an annotation interface
    fn visit_annotation(&mut self, descriptor: &str) -> Result<String> {
        Ok(descriptor.to_string())
    }

    /// Name of an annotation element, given its annotation's descriptor
    fn visit_annotation_element(&mut self, _annotation: &str, name: &str) -> Result<String> {
        Ok(name.to_string())
    }

    /// Package name in internal form (`com/foo`)
    fn visit_package(&mut self, name: &str) -> Result<String> {
        Ok(name.to_string())
    }
}

/// Visit every symbol of `class`, applying the visitor's answers
pub fn walk_class<V: SymbolVisitor + ?Sized>(class: &mut ClassRecord, visitor: &mut V) -> Result<()> {
    // reads go to the untouched snapshot, writes to the live pool
    let original = class.constant_pool.clone();
    let this_name = original.class_name(class.this_class)?;
    let mut w = Walk { original: &original, pool: &mut class.constant_pool, visitor, this_name: &this_name };

    w.constant_pool()?;
    for field in &mut class.fields {
        let name = w.original.utf8(field.name_index)?;
        let desc = w.original.utf8(field.descriptor_index)?;
        let new_name = w.visitor.visit_member(w.this_name, &name, &desc, MemberKind::Field)?;
        field.name_index = w.replace_utf8(field.name_index, &name, &new_name)?;
        field.descriptor_index = w.descriptor(field.descriptor_index)?;
        w.attributes(&mut field.attributes, SignatureKind::Field)?;
    }
    for method in &mut class.methods {
        let name = w.original.utf8(method.name_index)?;
        let desc = w.original.utf8(method.descriptor_index)?;
        let new_name = w.visitor.visit_member(w.this_name, &name, &desc, MemberKind::Method)?;
        method.name_index = w.replace_utf8(method.name_index, &name, &new_name)?;
        method.descriptor_index = w.descriptor(method.descriptor_index)?;
        w.attributes(&mut method.attributes, SignatureKind::Method)?;
    }
    w.attributes(&mut class.attributes, SignatureKind::Class)
}

struct Walk<'a, V: ?Sized> {
    original: &'a ConstantPool,
    pool: &'a mut ConstantPool,
    visitor: &'a mut V,
    this_name: &'a str,
}

impl<'a, V: SymbolVisitor + ?Sized> Walk<'a, V> {
    fn replace_utf8(&mut self, index: u16, old: &str, new: &str) -> Result<u16> {
        if old == new {
            Ok(index)
        } else {
            self.pool.add_utf8(new)
        }
    }

    fn descriptor(&mut self, index: u16) -> Result<u16> {
        let old = self.original.utf8(index)?;
        let new = self.visitor.visit_descriptor(&old)?;
        self.replace_utf8(index, &old, &new)
    }

    fn signature(&mut self, index: u16, kind: SignatureKind) -> Result<u16> {
        let old = self.original.utf8(index)?;
        let new = self.visitor.visit_signature(&old, kind)?;
        self.replace_utf8(index, &old, &new)
    }

    /// Class name or array descriptor held by a CONSTANT_Class entry
    fn class_entry_name(&mut self, name: &str) -> Result<String> {
        if name.starts_with('[') {
            self.visitor.visit_descriptor(name)
        } else {
            self.visitor.visit_type(name)
        }
    }

    fn constant_pool(&mut self) -> Result<()> {
        let original = self.original;
        for (index, constant) in original.iter() {
            match constant {
                Constant::Class(name_index) => {
                    let old = original.utf8(*name_index)?;
                    let new = self.class_entry_name(&old)?;
                    if new != old {
                        let new_index = self.pool.add_utf8(&new)?;
                        self.pool.set(index, Constant::Class(new_index))?;
                    }
                }
                Constant::FieldRef(class_index, nat) => {
                    if let Some(nat) = self.member_nat(*class_index, *nat, MemberKind::Field)? {
                        self.pool.set(index, Constant::FieldRef(*class_index, nat))?;
                    }
                }
                Constant::MethodRef(class_index, nat) => {
                    if let Some(nat) = self.member_nat(*class_index, *nat, MemberKind::Method)? {
                        self.pool.set(index, Constant::MethodRef(*class_index, nat))?;
                    }
                }
                Constant::InterfaceMethodRef(class_index, nat) => {
                    if let Some(nat) = self.member_nat(*class_index, *nat, MemberKind::Method)? {
                        self.pool.set(index, Constant::InterfaceMethodRef(*class_index, nat))?;
                    }
                }
                Constant::MethodType(desc_index) => {
                    let new_index = self.descriptor(*desc_index)?;
                    if new_index != *desc_index {
                        self.pool.set(index, Constant::MethodType(new_index))?;
                    }
                }
                // call site names are chosen by the bootstrap method; only the type is remapped
                Constant::InvokeDynamic(bsm, nat) => {
                    if let Some(nat) = self.descriptor_only_nat(*nat)? {
                        self.pool.set(index, Constant::InvokeDynamic(*bsm, nat))?;
                    }
                }
                Constant::Dynamic(bsm, nat) => {
                    if let Some(nat) = self.descriptor_only_nat(*nat)? {
                        self.pool.set(index, Constant::Dynamic(*bsm, nat))?;
                    }
                }
                Constant::Package(name_index) => {
                    let old = original.utf8(*name_index)?;
                    let new = self.visitor.visit_package(&old)?;
                    if new != old {
                        let new_index = self.pool.add_utf8(&new)?;
                        self.pool.set(index, Constant::Package(new_index))?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn member_nat(&mut self, class_index: u16, nat: u16, kind: MemberKind) -> Result<Option<u16>> {
        let owner = self.original.class_name(class_index)?;
        let (name, desc) = self.original.name_and_type(nat)?;
        let new_name = self.visitor.visit_member(&owner, &name, &desc, kind)?;
        let new_desc = self.visitor.visit_descriptor(&desc)?;
        if new_name == name && new_desc == desc {
            return Ok(None);
        }
        self.pool.add_name_and_type(&new_name, &new_desc).map(Some)
    }

    fn descriptor_only_nat(&mut self, nat: u16) -> Result<Option<u16>> {
        let (name, desc) = self.original.name_and_type(nat)?;
        let new_desc = self.visitor.visit_descriptor(&desc)?;
        if new_desc == desc {
            return Ok(None);
        }
        self.pool.add_name_and_type(&name, &new_desc).map(Some)
    }

    fn attributes(&mut self, attributes: &mut [AttributeInfo], kind: SignatureKind) -> Result<()> {
        for attribute in attributes {
            self.attribute(&mut attribute.body, kind)?;
        }
        Ok(())
    }

    fn attribute(&mut self, body: &mut AttributeBody, kind: SignatureKind) -> Result<()> {
        match body {
            AttributeBody::Code(code) => self.attributes(&mut code.attributes, SignatureKind::Field)?,
            AttributeBody::Signature(index) => *index = self.signature(*index, kind)?,
            AttributeBody::InnerClasses(entries) => {
                for entry in entries {
                    if entry.inner_name_index == 0 {
                        continue;
                    }
                    let inner = self.original.class_name(entry.inner_class_info_index)?;
                    let mapped = self.visitor.visit_type(&inner)?;
                    if mapped == inner {
                        continue;
                    }
                    let old_simple = self.original.utf8(entry.inner_name_index)?;
                    let new_simple = inner_simple_name(&mapped, &old_simple);
                    entry.inner_name_index = self.replace_utf8(entry.inner_name_index, &old_simple, &new_simple)?;
                }
            }
            AttributeBody::EnclosingMethod { class_index, method_index } => {
                if *method_index != 0 {
                    if let Some(nat) = self.member_nat(*class_index, *method_index, MemberKind::Method)? {
                        *method_index = nat;
                    }
                }
            }
            AttributeBody::LocalVariableTable(entries) => {
                for entry in entries {
                    entry.descriptor_index = self.descriptor(entry.descriptor_index)?;
                }
            }
            AttributeBody::LocalVariableTypeTable(entries) => {
                for entry in entries {
                    entry.descriptor_index = self.signature(entry.descriptor_index, SignatureKind::Field)?;
                }
            }
            AttributeBody::Annotations(annotations) => {
                for annotation in annotations {
                    self.annotation(annotation)?;
                }
            }
            AttributeBody::ParameterAnnotations(params) => {
                for annotation in params.iter_mut().flatten() {
                    self.annotation(annotation)?;
                }
            }
            AttributeBody::TypeAnnotations(annotations) => {
                for type_annotation in annotations {
                    self.annotation(&mut type_annotation.annotation)?;
                }
            }
            AttributeBody::AnnotationDefault(value) => self.element_value(value)?,
            AttributeBody::Record(components) => {
                for component in components {
                    let name = self.original.utf8(component.name_index)?;
                    let desc = self.original.utf8(component.descriptor_index)?;
                    let new_name = self.visitor.visit_member(self.this_name, &name, &desc, MemberKind::Field)?;
                    component.name_index = self.replace_utf8(component.name_index, &name, &new_name)?;
                    component.descriptor_index = self.descriptor(component.descriptor_index)?;
                    self.attributes(&mut component.attributes, SignatureKind::Field)?;
                }
            }
            AttributeBody::Raw(_) => {}
        }
        Ok(())
    }

    fn annotation(&mut self, annotation: &mut Annotation) -> Result<()> {
        let old_type = self.original.utf8(annotation.type_index)?;
        let new_type = self.visitor.visit_annotation(&old_type)?;
        annotation.type_index = self.replace_utf8(annotation.type_index, &old_type, &new_type)?;
        for (name_index, value) in &mut annotation.elements {
            let old_name = self.original.utf8(*name_index)?;
            let new_name = self.visitor.visit_annotation_element(&old_type, &old_name)?;
            *name_index = self.replace_utf8(*name_index, &old_name, &new_name)?;
            self.element_value(value)?;
        }
        Ok(())
    }

    fn element_value(&mut self, value: &mut ElementValue) -> Result<()> {
        match value {
            ElementValue::Const(..) => {}
            ElementValue::Enum { type_name_index, .. } => *type_name_index = self.descriptor(*type_name_index)?,
            ElementValue::Class(index) => *index = self.descriptor(*index)?,
            ElementValue::Annotation(nested) => self.annotation(nested)?,
            ElementValue::Array(values) => {
                for v in values {
                    self.element_value(v)?;
                }
            }
        }
        Ok(())
    }
}

/// Simple name recorded in InnerClasses for an inner class renamed to `mapped`
fn inner_simple_name(mapped: &str, old_simple: &str) -> String {
    match mapped.rfind('$') {
        Some(i) => {
            let tail = &mapped[i + 1..];
            // local classes are named Outer$1Local
            tail.trim_start_matches(|c: char| c.is_ascii_digit()).to_string()
        }
        None => mapped.rsplit('/').next().unwrap_or(old_simple).to_string(),
    }
}

/// One symbol occurrence recorded by [`SymbolCollector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occurrence {
    Type(String),
    Descriptor(String),
    Signature(SignatureKind, String),
    Member { owner: String, name: String, descriptor: String, kind: MemberKind },
    Annotation(String),
    AnnotationElement { annotation: String, name: String },
    Package(String),
}

/// Records every occurrence in visiting order without changing anything
#[derive(Debug, Default)]
pub struct SymbolCollector {
    pub occurrences: Vec<Occurrence>,
}

impl SymbolCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk a copy of `class` and return what was found
    pub fn collect(class: &ClassRecord) -> Result<Vec<Occurrence>> {
        let mut copy = class.clone();
        let mut collector = Self::new();
        walk_class(&mut copy, &mut collector)?;
        Ok(collector.occurrences)
    }
}

impl SymbolVisitor for SymbolCollector {
    fn visit_type(&mut self, internal_name: &str) -> Result<String> {
        self.occurrences.push(Occurrence::Type(internal_name.to_string()));
        Ok(internal_name.to_string())
    }

    fn visit_descriptor(&mut self, descriptor: &str) -> Result<String> {
        self.occurrences.push(Occurrence::Descriptor(descriptor.to_string()));
        Ok(descriptor.to_string())
    }

    fn visit_signature(&mut self, signature: &str, kind: SignatureKind) -> Result<String> {
        self.occurrences.push(Occurrence::Signature(kind, signature.to_string()));
        Ok(signature.to_string())
    }

    fn visit_member(&mut self, owner: &str, name: &str, descriptor: &str, kind: MemberKind) -> Result<String> {
        self.occurrences.push(Occurrence::Member {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            kind,
        });
        Ok(name.to_string())
    }

    fn visit_annotation(&mut self, descriptor: &str) -> Result<String> {
        self.occurrences.push(Occurrence::Annotation(descriptor.to_string()));
        Ok(descriptor.to_string())
    }

    fn visit_annotation_element(&mut self, annotation: &str, name: &str) -> Result<String> {
        self.occurrences.push(Occurrence::AnnotationElement {
            annotation: annotation.to_string(),
            name: name.to_string(),
        });
        Ok(name.to_string())
    }

    fn visit_package(&mut self, name: &str) -> Result<String> {
        self.occurrences.push(Occurrence::Package(name.to_string()));
        Ok(name.to_string())
    }
}
