//! Attributes and exception table structures for Java class files
//!
//! Attributes that embed symbolic names are decoded into typed bodies so the
//! symbol walk can reach every index they hold. Everything else stays raw.

use super::constpool::ConstantPool;
use super::defs::attribute_names as names;
use super::reader::{put_u1, put_u2, put_u4, ByteReader};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub body: AttributeBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeBody {
    Code(CodeAttribute),
    Signature(u16),
    InnerClasses(Vec<InnerClassEntry>),
    EnclosingMethod { class_index: u16, method_index: u16 },
    LocalVariableTable(Vec<LocalVariableEntry>),
    /// Same layout as the LVT; the second index points at a signature
    LocalVariableTypeTable(Vec<LocalVariableEntry>),
    Annotations(Vec<Annotation>),
    ParameterAnnotations(Vec<Vec<Annotation>>),
    TypeAnnotations(Vec<TypeAnnotation>),
    AnnotationDefault(ElementValue),
    Record(Vec<RecordComponent>),
    Raw(Vec<u8>),
}

impl AttributeInfo {
    pub fn new(name_index: u16, body: AttributeBody) -> Self {
        Self { name_index, body }
    }

    pub fn parse(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self> {
        let name_index = reader.u2()?;
        let len = reader.u4()? as usize;
        let data = reader.bytes(len)?;
        let name = pool.utf8(name_index)?;
        let body = AttributeBody::parse(&name, data, pool)
            .map_err(|e| Error::class_format(format!("in {} attribute: {}", name, e)))?;
        Ok(Self { name_index, body })
    }

    pub fn parse_list(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Vec<Self>> {
        let count = reader.u2()?;
        (0..count).map(|_| Self::parse(reader, pool)).collect()
    }

    pub fn name(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.name_index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = self.body.to_bytes();
        let mut bytes = Vec::with_capacity(payload.len() + 6);
        put_u2(&mut bytes, self.name_index);
        put_u4(&mut bytes, payload.len() as u32);
        bytes.extend_from_slice(&payload);
        bytes
    }
}

impl AttributeBody {
    fn parse(name: &str, data: &[u8], pool: &ConstantPool) -> Result<Self> {
        let mut r = ByteReader::new(data);
        let body = match name {
            names::CODE => AttributeBody::Code(CodeAttribute::parse(&mut r, pool)?),
            names::SIGNATURE => AttributeBody::Signature(r.u2()?),
            names::INNER_CLASSES => {
                let count = r.u2()?;
                let entries = (0..count)
                    .map(|_| {
                        Ok(InnerClassEntry {
                            inner_class_info_index: r.u2()?,
                            outer_class_info_index: r.u2()?,
                            inner_name_index: r.u2()?,
                            inner_class_access_flags: r.u2()?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                AttributeBody::InnerClasses(entries)
            }
            names::ENCLOSING_METHOD => AttributeBody::EnclosingMethod {
                class_index: r.u2()?,
                method_index: r.u2()?,
            },
            names::LOCAL_VARIABLE_TABLE => AttributeBody::LocalVariableTable(LocalVariableEntry::parse_list(&mut r)?),
            names::LOCAL_VARIABLE_TYPE_TABLE => {
                AttributeBody::LocalVariableTypeTable(LocalVariableEntry::parse_list(&mut r)?)
            }
            names::RUNTIME_VISIBLE_ANNOTATIONS | names::RUNTIME_INVISIBLE_ANNOTATIONS => {
                AttributeBody::Annotations(Annotation::parse_list(&mut r)?)
            }
            names::RUNTIME_VISIBLE_PARAMETER_ANNOTATIONS | names::RUNTIME_INVISIBLE_PARAMETER_ANNOTATIONS => {
                let count = r.u1()?;
                let params = (0..count)
                    .map(|_| Annotation::parse_list(&mut r))
                    .collect::<Result<Vec<_>>>()?;
                AttributeBody::ParameterAnnotations(params)
            }
            names::RUNTIME_VISIBLE_TYPE_ANNOTATIONS | names::RUNTIME_INVISIBLE_TYPE_ANNOTATIONS => {
                let count = r.u2()?;
                let annotations = (0..count)
                    .map(|_| TypeAnnotation::parse(&mut r))
                    .collect::<Result<Vec<_>>>()?;
                AttributeBody::TypeAnnotations(annotations)
            }
            names::ANNOTATION_DEFAULT => AttributeBody::AnnotationDefault(ElementValue::parse(&mut r)?),
            names::RECORD => {
                let count = r.u2()?;
                let components = (0..count)
                    .map(|_| {
                        Ok(RecordComponent {
                            name_index: r.u2()?,
                            descriptor_index: r.u2()?,
                            attributes: AttributeInfo::parse_list(&mut r, pool)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                AttributeBody::Record(components)
            }
            _ => return Ok(AttributeBody::Raw(data.to_vec())),
        };
        r.expect_end(name)?;
        Ok(body)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            AttributeBody::Code(code) => code.write(&mut out),
            AttributeBody::Signature(index) => put_u2(&mut out, *index),
            AttributeBody::InnerClasses(entries) => {
                put_u2(&mut out, entries.len() as u16);
                for e in entries {
                    put_u2(&mut out, e.inner_class_info_index);
                    put_u2(&mut out, e.outer_class_info_index);
                    put_u2(&mut out, e.inner_name_index);
                    put_u2(&mut out, e.inner_class_access_flags);
                }
            }
            AttributeBody::EnclosingMethod { class_index, method_index } => {
                put_u2(&mut out, *class_index);
                put_u2(&mut out, *method_index);
            }
            AttributeBody::LocalVariableTable(entries) | AttributeBody::LocalVariableTypeTable(entries) => {
                put_u2(&mut out, entries.len() as u16);
                for e in entries {
                    e.write(&mut out);
                }
            }
            AttributeBody::Annotations(annotations) => Annotation::write_list(annotations, &mut out),
            AttributeBody::ParameterAnnotations(params) => {
                put_u1(&mut out, params.len() as u8);
                for annotations in params {
                    Annotation::write_list(annotations, &mut out);
                }
            }
            AttributeBody::TypeAnnotations(annotations) => {
                put_u2(&mut out, annotations.len() as u16);
                for a in annotations {
                    out.extend_from_slice(&a.target);
                    a.annotation.write(&mut out);
                }
            }
            AttributeBody::AnnotationDefault(value) => value.write(&mut out),
            AttributeBody::Record(components) => {
                put_u2(&mut out, components.len() as u16);
                for c in components {
                    put_u2(&mut out, c.name_index);
                    put_u2(&mut out, c.descriptor_index);
                    write_attributes(&c.attributes, &mut out);
                }
            }
            AttributeBody::Raw(data) => out.extend_from_slice(data),
        }
        out
    }
}

pub(crate) fn write_attributes(attributes: &[AttributeInfo], out: &mut Vec<u8>) {
    put_u2(out, attributes.len() as u16);
    for attribute in attributes {
        out.extend_from_slice(&attribute.to_bytes());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self { max_stack, max_locals, code, exception_table: Vec::new(), attributes: Vec::new() }
    }

    fn parse(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self> {
        let max_stack = r.u2()?;
        let max_locals = r.u2()?;
        let code_len = r.u4()? as usize;
        let code = r.bytes(code_len)?.to_vec();
        let handlers = r.u2()?;
        let exception_table = (0..handlers)
            .map(|_| Ok(ExceptionTableEntry::new(r.u2()?, r.u2()?, r.u2()?, r.u2()?)))
            .collect::<Result<Vec<_>>>()?;
        let attributes = AttributeInfo::parse_list(r, pool)?;
        Ok(Self { max_stack, max_locals, code, exception_table, attributes })
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.max_stack);
        put_u2(out, self.max_locals);
        put_u4(out, self.code.len() as u32);
        out.extend_from_slice(&self.code);
        put_u2(out, self.exception_table.len() as u16);
        for entry in &self.exception_table {
            out.extend_from_slice(&entry.to_bytes());
        }
        write_attributes(&self.attributes, out);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl ExceptionTableEntry {
    pub fn new(start_pc: u16, end_pc: u16, handler_pc: u16, catch_type: u16) -> Self {
        Self { start_pc, end_pc, handler_pc, catch_type }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8);
        put_u2(&mut bytes, self.start_pc);
        put_u2(&mut bytes, self.end_pc);
        put_u2(&mut bytes, self.handler_pc);
        put_u2(&mut bytes, self.catch_type);
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    /// Descriptor in a LocalVariableTable, signature in a LocalVariableTypeTable
    pub descriptor_index: u16,
    pub index: u16,
}

impl LocalVariableEntry {
    fn parse_list(r: &mut ByteReader<'_>) -> Result<Vec<Self>> {
        let count = r.u2()?;
        (0..count)
            .map(|_| {
                Ok(Self {
                    start_pc: r.u2()?,
                    length: r.u2()?,
                    name_index: r.u2()?,
                    descriptor_index: r.u2()?,
                    index: r.u2()?,
                })
            })
            .collect()
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.start_pc);
        put_u2(out, self.length);
        put_u2(out, self.name_index);
        put_u2(out, self.descriptor_index);
        put_u2(out, self.index);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordComponent {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Field descriptor of the annotation interface
    pub type_index: u16,
    pub elements: Vec<(u16, ElementValue)>,
}

impl Annotation {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let type_index = r.u2()?;
        let count = r.u2()?;
        let elements = (0..count)
            .map(|_| Ok((r.u2()?, ElementValue::parse(r)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { type_index, elements })
    }

    fn parse_list(r: &mut ByteReader<'_>) -> Result<Vec<Self>> {
        let count = r.u2()?;
        (0..count).map(|_| Self::parse(r)).collect()
    }

    fn write(&self, out: &mut Vec<u8>) {
        put_u2(out, self.type_index);
        put_u2(out, self.elements.len() as u16);
        for (name_index, value) in &self.elements {
            put_u2(out, *name_index);
            value.write(out);
        }
    }

    fn write_list(annotations: &[Self], out: &mut Vec<u8>) {
        put_u2(out, annotations.len() as u16);
        for a in annotations {
            a.write(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// Primitive or string constant: tag and constant pool index
    Const(u8, u16),
    Enum { type_name_index: u16, const_name_index: u16 },
    /// Return descriptor of a class literal
    Class(u16),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let tag = r.u1()?;
        let value = match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => ElementValue::Const(tag, r.u2()?),
            b'e' => ElementValue::Enum { type_name_index: r.u2()?, const_name_index: r.u2()? },
            b'c' => ElementValue::Class(r.u2()?),
            b'@' => ElementValue::Annotation(Annotation::parse(r)?),
            b'[' => {
                let count = r.u2()?;
                ElementValue::Array((0..count).map(|_| Self::parse(r)).collect::<Result<Vec<_>>>()?)
            }
            other => {
                return Err(Error::class_format(format!("unknown element_value tag '{}'", other as char)));
            }
        };
        Ok(value)
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            ElementValue::Const(tag, index) => {
                put_u1(out, *tag);
                put_u2(out, *index);
            }
            ElementValue::Enum { type_name_index, const_name_index } => {
                put_u1(out, b'e');
                put_u2(out, *type_name_index);
                put_u2(out, *const_name_index);
            }
            ElementValue::Class(index) => {
                put_u1(out, b'c');
                put_u2(out, *index);
            }
            ElementValue::Annotation(annotation) => {
                put_u1(out, b'@');
                annotation.write(out);
            }
            ElementValue::Array(values) => {
                put_u1(out, b'[');
                put_u2(out, values.len() as u16);
                for v in values {
                    v.write(out);
                }
            }
        }
    }
}

/// A type annotation; `target` holds target_type, target_info and type_path verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotation {
    pub target: Vec<u8>,
    pub annotation: Annotation,
}

impl TypeAnnotation {
    fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        let start = r.clone();
        let target_type = r.u1()?;
        match target_type {
            0x00 | 0x01 | 0x16 => {
                r.u1()?;
            }
            0x10 | 0x17 | 0x42 | 0x43..=0x46 => {
                r.u2()?;
            }
            0x11 | 0x12 => {
                r.u1()?;
                r.u1()?;
            }
            0x13..=0x15 => {}
            0x40 | 0x41 => {
                let count = r.u2()? as usize;
                r.bytes(count * 6)?;
            }
            0x47..=0x4B => {
                r.u2()?;
                r.u1()?;
            }
            other => {
                return Err(Error::class_format(format!("unknown type annotation target 0x{:02x}", other)));
            }
        }
        let path_len = r.u1()? as usize;
        r.bytes(path_len * 2)?;
        let consumed = r.position() - start.position();
        let target = start.clone().bytes(consumed)?.to_vec();
        let annotation = Annotation::parse(r)?;
        Ok(Self { target, annotation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(names: &[&str]) -> ConstantPool {
        let mut pool = ConstantPool::new();
        for n in names {
            pool.add_utf8(n).unwrap();
        }
        pool
    }

    #[test]
    fn test_unknown_attribute_is_raw() {
        let pool = pool_with(&["Custom"]);
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0xAA, 0xBB, 0xCC];
        let attr = AttributeInfo::parse(&mut ByteReader::new(&data), &pool).unwrap();
        assert_eq!(attr.body, AttributeBody::Raw(vec![0xAA, 0xBB, 0xCC]));
        assert_eq!(attr.to_bytes(), data.to_vec());
    }

    #[test]
    fn test_type_annotation_keeps_target_bytes() {
        let pool = pool_with(&["RuntimeVisibleTypeAnnotations", "LAnno;"]);
        // one annotation: localvar target with one range, empty path, type 2, no elements
        let payload: Vec<u8> = vec![
            0x00, 0x01, 0x40, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x01, 0x00, 0x00, 0x02, 0x00, 0x00,
        ];
        let mut data = vec![0x00, 0x01, 0x00, 0x00, 0x00, payload.len() as u8];
        data.extend_from_slice(&payload);
        let attr = AttributeInfo::parse(&mut ByteReader::new(&data), &pool).unwrap();
        match &attr.body {
            AttributeBody::TypeAnnotations(list) => {
                assert_eq!(list[0].target, vec![0x40, 0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x01, 0x00]);
                assert_eq!(list[0].annotation.type_index, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(attr.to_bytes(), data);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let pool = pool_with(&["Signature"]);
        let data = [0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x00, 0x01, 0x00];
        assert!(AttributeInfo::parse(&mut ByteReader::new(&data), &pool).is_err());
    }
}
