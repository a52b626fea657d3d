//! Constant pool compaction
//!
//! Renaming appends new entries and leaves the old names behind.
//! [`compact_pool`] drops every entry the class no longer refers to and
//! renumbers the rest. Entries keep their relative order, so an index never
//! grows and `ldc` operands still fit in one byte.

use log::debug;

use super::attribute::{Annotation, AttributeBody, AttributeInfo, CodeAttribute, ElementValue};
use super::class::ClassRecord;
use super::constpool::{Constant, ConstantPool};
use super::defs::attribute_names as names;
use super::frame::{StackMapFrame, StackMapTable, VerificationType};
use super::opcodes::*;
use crate::error::{ConstPoolError, Error, Result};

/// Remove unreferenced pool entries, returning how many slots were freed.
///
/// A class carrying an attribute whose layout is not known here keeps its
/// pool untouched, since that attribute may hold indices.
pub fn compact_pool(class: &mut ClassRecord) -> Result<usize> {
    let pool = std::mem::take(&mut class.constant_pool);
    let result = compact_with(class, &pool);
    match result {
        Ok(Some((compacted, freed))) => {
            class.constant_pool = compacted;
            Ok(freed)
        }
        Ok(None) => {
            class.constant_pool = pool;
            Ok(0)
        }
        Err(e) => {
            class.constant_pool = pool;
            Err(e)
        }
    }
}

fn compact_with(class: &mut ClassRecord, pool: &ConstantPool) -> Result<Option<(ConstantPool, usize)>> {
    let mut marks = Indices { pool, renumber: None, used: vec![false; pool.len()] };
    if let Some(name) = marks.class(class)? {
        debug!("POOL: keeping every entry, {} attribute has an unknown layout", name);
        return Ok(None);
    }
    let used = close_over_references(pool, marks.used)?;

    let mut renumber = vec![0u16; pool.len()];
    let mut next: u16 = 1;
    for (index, constant) in pool.iter() {
        if used[index as usize] {
            renumber[index as usize] = next;
            next += if matches!(constant, Constant::Long(_) | Constant::Double(_)) { 2 } else { 1 };
        }
    }
    let freed = pool.len() - next as usize;
    if freed == 0 {
        return Ok(None);
    }

    let mut compacted = ConstantPool::new();
    for (index, constant) in pool.iter() {
        if used[index as usize] {
            compacted.push(renumbered(constant, &renumber))?;
        }
    }
    let mut rewrite = Indices { pool, renumber: Some(&renumber), used: Vec::new() };
    rewrite.class(class)?;
    debug!("POOL: dropped {} unreferenced slots, {} remain", freed, compacted.len());
    Ok(Some((compacted, freed)))
}

/// Add every entry reachable from an already used one
fn close_over_references(pool: &ConstantPool, mut used: Vec<bool>) -> Result<Vec<bool>> {
    let mut pending: Vec<u16> = (0..used.len()).filter(|&i| used[i]).map(|i| i as u16).collect();
    while let Some(index) = pending.pop() {
        for referenced in references(pool.get(index)?) {
            let slot = used.get_mut(referenced as usize).ok_or(ConstPoolError::InvalidIndex(referenced))?;
            if !*slot {
                *slot = true;
                pending.push(referenced);
            }
        }
    }
    Ok(used)
}

fn references(constant: &Constant) -> Vec<u16> {
    match constant {
        Constant::Class(i) | Constant::String(i) | Constant::MethodType(i) | Constant::Module(i) | Constant::Package(i) => {
            vec![*i]
        }
        Constant::FieldRef(a, b)
        | Constant::MethodRef(a, b)
        | Constant::InterfaceMethodRef(a, b)
        | Constant::NameAndType(a, b) => vec![*a, *b],
        Constant::MethodHandle(_, reference) => vec![*reference],
        // the first operand indexes BootstrapMethods, not the pool
        Constant::Dynamic(_, nat) | Constant::InvokeDynamic(_, nat) => vec![*nat],
        _ => Vec::new(),
    }
}

fn renumbered(constant: &Constant, renumber: &[u16]) -> Constant {
    let r = |i: &u16| renumber[*i as usize];
    match constant {
        Constant::Class(i) => Constant::Class(r(i)),
        Constant::String(i) => Constant::String(r(i)),
        Constant::MethodType(i) => Constant::MethodType(r(i)),
        Constant::Module(i) => Constant::Module(r(i)),
        Constant::Package(i) => Constant::Package(r(i)),
        Constant::FieldRef(a, b) => Constant::FieldRef(r(a), r(b)),
        Constant::MethodRef(a, b) => Constant::MethodRef(r(a), r(b)),
        Constant::InterfaceMethodRef(a, b) => Constant::InterfaceMethodRef(r(a), r(b)),
        Constant::NameAndType(a, b) => Constant::NameAndType(r(a), r(b)),
        Constant::MethodHandle(kind, reference) => Constant::MethodHandle(*kind, r(reference)),
        Constant::Dynamic(bsm, nat) => Constant::Dynamic(*bsm, r(nat)),
        Constant::InvokeDynamic(bsm, nat) => Constant::InvokeDynamic(*bsm, r(nat)),
        other => other.clone(),
    }
}

/// Visits every pool index a class holds outside the pool itself.
///
/// Without a renumbering table it only marks indices as used; with one it
/// rewrites them.
struct Indices<'a> {
    pool: &'a ConstantPool,
    renumber: Option<&'a [u16]>,
    used: Vec<bool>,
}

impl Indices<'_> {
    fn index(&mut self, index: &mut u16) -> Result<()> {
        // 0 stands for "none" in optional index fields
        if *index == 0 {
            return Ok(());
        }
        match self.renumber {
            Some(renumber) => {
                *index = renumber.get(*index as usize).copied().ok_or(ConstPoolError::InvalidIndex(*index))?;
            }
            None => {
                *self.used.get_mut(*index as usize).ok_or(ConstPoolError::InvalidIndex(*index))? = true;
            }
        }
        Ok(())
    }

    /// Name of the first attribute with an unknown layout, if any
    fn class(&mut self, class: &mut ClassRecord) -> Result<Option<String>> {
        self.index(&mut class.this_class)?;
        self.index(&mut class.super_class)?;
        for interface in &mut class.interfaces {
            self.index(interface)?;
        }
        for member in class.fields.iter_mut().chain(class.methods.iter_mut()) {
            self.index(&mut member.name_index)?;
            self.index(&mut member.descriptor_index)?;
            if let Some(name) = self.attributes(&mut member.attributes)? {
                return Ok(Some(name));
            }
        }
        self.attributes(&mut class.attributes)
    }

    fn attributes(&mut self, attributes: &mut [AttributeInfo]) -> Result<Option<String>> {
        for attribute in attributes {
            let name = attribute.name(self.pool)?;
            self.index(&mut attribute.name_index)?;
            if !self.body(&name, &mut attribute.body)? {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    fn body(&mut self, name: &str, body: &mut AttributeBody) -> Result<bool> {
        match body {
            AttributeBody::Code(code) => return self.code(code),
            AttributeBody::Signature(index) => self.index(index)?,
            AttributeBody::InnerClasses(entries) => {
                for entry in entries {
                    self.index(&mut entry.inner_class_info_index)?;
                    self.index(&mut entry.outer_class_info_index)?;
                    self.index(&mut entry.inner_name_index)?;
                }
            }
            AttributeBody::EnclosingMethod { class_index, method_index } => {
                self.index(class_index)?;
                self.index(method_index)?;
            }
            AttributeBody::LocalVariableTable(entries) | AttributeBody::LocalVariableTypeTable(entries) => {
                for entry in entries {
                    self.index(&mut entry.name_index)?;
                    self.index(&mut entry.descriptor_index)?;
                }
            }
            AttributeBody::Annotations(annotations) => {
                for annotation in annotations {
                    self.annotation(annotation)?;
                }
            }
            AttributeBody::ParameterAnnotations(parameters) => {
                for annotation in parameters.iter_mut().flatten() {
                    self.annotation(annotation)?;
                }
            }
            AttributeBody::TypeAnnotations(annotations) => {
                for type_annotation in annotations {
                    self.annotation(&mut type_annotation.annotation)?;
                }
            }
            AttributeBody::AnnotationDefault(value) => self.element(value)?,
            AttributeBody::Record(components) => {
                for component in components {
                    self.index(&mut component.name_index)?;
                    self.index(&mut component.descriptor_index)?;
                    if self.attributes(&mut component.attributes)?.is_some() {
                        return Ok(false);
                    }
                }
            }
            AttributeBody::Raw(data) => return self.raw(name, data),
        }
        Ok(true)
    }

    fn code(&mut self, code: &mut CodeAttribute) -> Result<bool> {
        let mut pc = 0;
        while pc < code.code.len() {
            let len = instruction_length(&code.code, pc)?;
            match code.code[pc] {
                LDC => {
                    let mut index = code.code[pc + 1] as u16;
                    self.index(&mut index)?;
                    code.code[pc + 1] = u8::try_from(index)
                        .map_err(|_| Error::class_format(format!("ldc operand {} at offset {} exceeds a byte", index, pc)))?;
                }
                LDC_W | LDC2_W | GETSTATIC..=INVOKEDYNAMIC | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF
                | MULTIANEWARRAY => self.u2_at(&mut code.code, pc + 1)?,
                _ => {}
            }
            pc += len;
        }
        for entry in &mut code.exception_table {
            self.index(&mut entry.catch_type)?;
        }
        Ok(self.attributes(&mut code.attributes)?.is_none())
    }

    fn annotation(&mut self, annotation: &mut Annotation) -> Result<()> {
        self.index(&mut annotation.type_index)?;
        for (name_index, value) in &mut annotation.elements {
            self.index(name_index)?;
            self.element(value)?;
        }
        Ok(())
    }

    fn element(&mut self, value: &mut ElementValue) -> Result<()> {
        match value {
            ElementValue::Const(_, index) | ElementValue::Class(index) => self.index(index),
            ElementValue::Enum { type_name_index, const_name_index } => {
                self.index(type_name_index)?;
                self.index(const_name_index)
            }
            ElementValue::Annotation(annotation) => self.annotation(annotation),
            ElementValue::Array(values) => values.iter_mut().try_for_each(|v| self.element(v)),
        }
    }

    /// Attributes kept as bytes; `false` when the layout is unknown
    fn raw(&mut self, name: &str, data: &mut [u8]) -> Result<bool> {
        match name {
            names::LINE_NUMBER_TABLE | names::DEPRECATED | names::SYNTHETIC | names::SOURCE_DEBUG_EXTENSION => {}
            names::SOURCE_FILE | names::CONSTANT_VALUE | names::NEST_HOST => self.u2_at(data, 0)?,
            names::EXCEPTIONS | names::NEST_MEMBERS | names::PERMITTED_SUBCLASSES => {
                let count = u2(data, 0)? as usize;
                for i in 0..count {
                    self.u2_at(data, 2 + 2 * i)?;
                }
            }
            names::METHOD_PARAMETERS => {
                let count = *data.first().ok_or_else(|| truncated(name))? as usize;
                for i in 0..count {
                    self.u2_at(data, 1 + 4 * i)?;
                }
            }
            names::BOOTSTRAP_METHODS => {
                let count = u2(data, 0)?;
                let mut at = 2;
                for _ in 0..count {
                    self.u2_at(data, at)?;
                    let arguments = u2(data, at + 2)? as usize;
                    at += 4;
                    for _ in 0..arguments {
                        self.u2_at(data, at)?;
                        at += 2;
                    }
                }
            }
            names::STACK_MAP_TABLE => self.stack_map(data)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn stack_map(&mut self, data: &mut [u8]) -> Result<()> {
        let mut table = StackMapTable::parse(data)?;
        for frame in &mut table.frames {
            let types: Vec<&mut VerificationType> = match frame {
                StackMapFrame::Same { .. } | StackMapFrame::Chop { .. } => Vec::new(),
                StackMapFrame::SameLocals1StackItem { stack, .. } => vec![stack],
                StackMapFrame::Append { locals, .. } => locals.iter_mut().collect(),
                StackMapFrame::Full { locals, stack, .. } => locals.iter_mut().chain(stack.iter_mut()).collect(),
            };
            for ty in types {
                if let VerificationType::Object(index) = ty {
                    self.index(index)?;
                }
            }
        }
        if self.renumber.is_some() {
            let bytes = table.to_bytes();
            if bytes.len() != data.len() {
                return Err(Error::class_format("StackMapTable changed size while renumbering"));
            }
            data.copy_from_slice(&bytes);
        }
        Ok(())
    }

    fn u2_at(&mut self, data: &mut [u8], at: usize) -> Result<()> {
        let mut index = u2(data, at)?;
        self.index(&mut index)?;
        data[at..at + 2].copy_from_slice(&index.to_be_bytes());
        Ok(())
    }
}

fn u2(data: &[u8], at: usize) -> Result<u16> {
    data.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::class_format(format!("attribute truncated at byte {}", at)))
}

fn truncated(name: &str) -> Error {
    Error::class_format(format!("truncated {} attribute", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::defs::access_flags::{ACC_PUBLIC, ACC_STATIC, ACC_SUPER};
    use crate::classfile::MemberRecord;

    fn record(pool: ConstantPool, this_class: u16, super_class: u16) -> ClassRecord {
        ClassRecord {
            minor_version: 0,
            major_version: 52,
            constant_pool: pool,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    #[test]
    fn test_orphans_dropped_and_indices_follow() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("com/old/Gone").unwrap(); // 1
        pool.push(Constant::Long(42)).unwrap(); // 2, 3
        let this_class = pool.add_class("app/Main").unwrap(); // 4, 5
        let super_class = pool.add_class("java/lang/Object").unwrap(); // 6, 7
        let code_name = pool.add_utf8("Code").unwrap();
        let method = MemberRecord {
            access_flags: ACC_PUBLIC | ACC_STATIC,
            name_index: pool.add_utf8("answer").unwrap(),
            descriptor_index: pool.add_utf8("()J").unwrap(),
            attributes: vec![AttributeInfo::new(
                code_name,
                AttributeBody::Code(CodeAttribute::new(2, 0, vec![LDC2_W, 0x00, 0x02, LRETURN])),
            )],
        };
        let mut class = record(pool, this_class, super_class);
        class.methods.push(method);

        assert_eq!(compact_pool(&mut class).unwrap(), 1);
        let pool = &class.constant_pool;
        assert!(pool.iter().all(|(_, c)| c != &Constant::Utf8(b"com/old/Gone".to_vec())));
        assert_eq!(class.this_class, 4);
        assert_eq!(pool.class_name(class.this_class).unwrap(), "app/Main");
        assert_eq!(pool.class_name(class.super_class).unwrap(), "java/lang/Object");
        let AttributeBody::Code(code) = &class.methods[0].attributes[0].body else {
            panic!("expected Code");
        };
        assert_eq!(code.code, vec![LDC2_W, 0x00, 0x01, LRETURN]);
        assert_eq!(pool.get(1).unwrap(), &Constant::Long(42));
        assert_eq!(pool.utf8(class.methods[0].name_index).unwrap(), "answer");
        // nothing left to drop
        assert_eq!(compact_pool(&mut class).unwrap(), 0);
    }

    #[test]
    fn test_unknown_attribute_keeps_pool() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("com/old/Gone").unwrap();
        let this_class = pool.add_class("app/Main").unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        let name = pool.add_utf8("VendorData").unwrap();
        let mut class = record(pool, this_class, super_class);
        class.attributes.push(AttributeInfo::new(name, AttributeBody::Raw(vec![0x00, 0x01])));
        let before = class.clone();

        assert_eq!(compact_pool(&mut class).unwrap(), 0);
        assert_eq!(class, before);
    }

    #[test]
    fn test_raw_layouts_renumbered() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("unused").unwrap(); // 1
        let this_class = pool.add_class("app/Main").unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        let source_name = pool.add_utf8("SourceFile").unwrap();
        let source = pool.add_utf8("Main.java").unwrap();
        let nest_name = pool.add_utf8("NestMembers").unwrap();
        let member = pool.add_class("app/Main$Inner").unwrap();
        let mut class = record(pool, this_class, super_class);
        class.attributes.push(AttributeInfo::new(source_name, AttributeBody::Raw(source.to_be_bytes().to_vec())));
        let mut nest = vec![0x00, 0x01];
        nest.extend_from_slice(&member.to_be_bytes());
        class.attributes.push(AttributeInfo::new(nest_name, AttributeBody::Raw(nest)));

        assert_eq!(compact_pool(&mut class).unwrap(), 1);
        let pool = &class.constant_pool;
        let AttributeBody::Raw(data) = &class.attributes[0].body else {
            panic!("expected raw SourceFile");
        };
        assert_eq!(pool.utf8(u16::from_be_bytes([data[0], data[1]])).unwrap(), "Main.java");
        let AttributeBody::Raw(data) = &class.attributes[1].body else {
            panic!("expected raw NestMembers");
        };
        assert_eq!(pool.class_name(u16::from_be_bytes([data[2], data[3]])).unwrap(), "app/Main$Inner");
        assert_eq!(class.attributes[1].name(pool).unwrap(), "NestMembers");
    }
}
