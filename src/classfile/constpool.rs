//! Constant pool and constants for Java class files
//!
//! Entries are kept at their original indices while symbols are rewritten;
//! new entries are only ever appended. Renumbering happens afterwards, in
//! [`super::compact`], and only when every index holder is understood.

use std::collections::HashMap;

use super::reader::{decode_modified_utf8, encode_modified_utf8, ByteReader};
use crate::error::{ConstPoolError, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Slot 0 and the second slot of Long/Double entries
    Unusable,
    /// Raw modified UTF-8 bytes, kept verbatim so string literals survive untouched
    Utf8(Vec<u8>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

pub mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

impl Constant {
    fn parse(reader: &mut ByteReader<'_>, index: u16) -> Result<Self> {
        use constant_tags::*;
        let tag = reader.u1()?;
        let constant = match tag {
            CONSTANT_UTF8 => {
                let len = reader.u2()? as usize;
                Constant::Utf8(reader.bytes(len)?.to_vec())
            }
            CONSTANT_INTEGER => Constant::Integer(reader.u4()? as i32),
            CONSTANT_FLOAT => Constant::Float(f32::from_bits(reader.u4()?)),
            CONSTANT_LONG => {
                let high = reader.u4()? as u64;
                let low = reader.u4()? as u64;
                Constant::Long(((high << 32) | low) as i64)
            }
            CONSTANT_DOUBLE => {
                let high = reader.u4()? as u64;
                let low = reader.u4()? as u64;
                Constant::Double(f64::from_bits((high << 32) | low))
            }
            CONSTANT_CLASS => Constant::Class(reader.u2()?),
            CONSTANT_STRING => Constant::String(reader.u2()?),
            CONSTANT_FIELDREF => Constant::FieldRef(reader.u2()?, reader.u2()?),
            CONSTANT_METHODREF => Constant::MethodRef(reader.u2()?, reader.u2()?),
            CONSTANT_INTERFACEMETHODREF => Constant::InterfaceMethodRef(reader.u2()?, reader.u2()?),
            CONSTANT_NAMEANDTYPE => Constant::NameAndType(reader.u2()?, reader.u2()?),
            CONSTANT_METHODHANDLE => Constant::MethodHandle(reader.u1()?, reader.u2()?),
            CONSTANT_METHODTYPE => Constant::MethodType(reader.u2()?),
            CONSTANT_DYNAMIC => Constant::Dynamic(reader.u2()?, reader.u2()?),
            CONSTANT_INVOKEDYNAMIC => Constant::InvokeDynamic(reader.u2()?, reader.u2()?),
            CONSTANT_MODULE => Constant::Module(reader.u2()?),
            CONSTANT_PACKAGE => Constant::Package(reader.u2()?),
            tag => return Err(ConstPoolError::UnknownTag { tag, index }.into()),
        };
        Ok(constant)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        use constant_tags::*;
        let mut bytes = Vec::new();
        match self {
            Constant::Unusable => {}
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
                bytes.extend_from_slice(value);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Class(name_index) => {
                bytes.push(CONSTANT_CLASS);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::String(string_index) => {
                bytes.push(CONSTANT_STRING);
                bytes.extend_from_slice(&string_index.to_be_bytes());
            }
            Constant::FieldRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_FIELDREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::MethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_METHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::InterfaceMethodRef(class_index, name_and_type_index) => {
                bytes.push(CONSTANT_INTERFACEMETHODREF);
                bytes.extend_from_slice(&class_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::NameAndType(name_index, descriptor_index) => {
                bytes.push(CONSTANT_NAMEANDTYPE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::MethodHandle(reference_kind, reference_index) => {
                bytes.push(CONSTANT_METHODHANDLE);
                bytes.push(*reference_kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
            Constant::MethodType(descriptor_index) => {
                bytes.push(CONSTANT_METHODTYPE);
                bytes.extend_from_slice(&descriptor_index.to_be_bytes());
            }
            Constant::Dynamic(bootstrap_method_attr_index, name_and_type_index) => {
                bytes.push(CONSTANT_DYNAMIC);
                bytes.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::InvokeDynamic(bootstrap_method_attr_index, name_and_type_index) => {
                bytes.push(CONSTANT_INVOKEDYNAMIC);
                bytes.extend_from_slice(&bootstrap_method_attr_index.to_be_bytes());
                bytes.extend_from_slice(&name_and_type_index.to_be_bytes());
            }
            Constant::Module(name_index) => {
                bytes.push(CONSTANT_MODULE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
            Constant::Package(name_index) => {
                bytes.push(CONSTANT_PACKAGE);
                bytes.extend_from_slice(&name_index.to_be_bytes());
            }
        }
        bytes
    }

    fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

/// A resolved Fieldref / Methodref / InterfaceMethodref
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    pub(crate) constants: Vec<Constant>,
    utf8_lookup: HashMap<Vec<u8>, u16>,
    class_lookup: HashMap<u16, u16>,
    name_and_type_lookup: HashMap<(u16, u16), u16>,
}

impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.constants == other.constants
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: vec![Constant::Unusable], ..Default::default() }
    }

    pub fn parse(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u2()?;
        if count == 0 {
            return Err(Error::class_format("constant_pool_count must be at least 1"));
        }
        let mut pool = Self::new();
        let mut index: u16 = 1;
        while index < count {
            let constant = Constant::parse(reader, index)?;
            let wide = constant.is_wide();
            pool.register(index, &constant);
            pool.constants.push(constant);
            index += 1;
            if wide {
                pool.constants.push(Constant::Unusable);
                index += 1;
            }
        }
        if pool.constants.len() != count as usize {
            return Err(Error::class_format("wide constant overruns constant_pool_count"));
        }
        Ok(pool)
    }

    /// Number of slots including the unusable slot 0 (the `constant_pool_count`)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.len() <= 1
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.constants
            .iter()
            .enumerate()
            .filter(|(_, c)| !matches!(c, Constant::Unusable))
            .map(|(i, c)| (i as u16, c))
    }

    pub fn get(&self, index: u16) -> Result<&Constant> {
        match self.constants.get(index as usize) {
            None | Some(Constant::Unusable) => Err(ConstPoolError::InvalidIndex(index).into()),
            Some(constant) => Ok(constant),
        }
    }

    /// Replace an entry in place, keeping the dedup lookups consistent
    pub fn set(&mut self, index: u16, constant: Constant) -> Result<()> {
        let old = self.get(index)?.clone();
        match old {
            Constant::Class(name) if self.class_lookup.get(&name) == Some(&index) => {
                self.class_lookup.remove(&name);
            }
            Constant::NameAndType(n, d) if self.name_and_type_lookup.get(&(n, d)) == Some(&index) => {
                self.name_and_type_lookup.remove(&(n, d));
            }
            _ => {}
        }
        self.register(index, &constant);
        self.constants[index as usize] = constant;
        Ok(())
    }

    pub fn utf8(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Utf8(bytes) => decode_modified_utf8(bytes),
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "Utf8" }.into()),
        }
    }

    /// Name of a CONSTANT_Class entry (internal name or array descriptor)
    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            Constant::Class(name_index) => self.utf8(*name_index),
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "Class" }.into()),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.get(index)? {
            Constant::NameAndType(name, descriptor) => Ok((self.utf8(*name)?, self.utf8(*descriptor)?)),
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "NameAndType" }.into()),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef> {
        match self.get(index)? {
            Constant::FieldRef(class, nat)
            | Constant::MethodRef(class, nat)
            | Constant::InterfaceMethodRef(class, nat) => {
                let (name, descriptor) = self.name_and_type(*nat)?;
                Ok(MemberRef { owner: self.class_name(*class)?, name, descriptor })
            }
            _ => Err(ConstPoolError::UnexpectedKind { index, expected: "member reference" }.into()),
        }
    }

    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        let bytes = encode_modified_utf8(value);
        if let Some(&index) = self.utf8_lookup.get(&bytes) {
            return Ok(index);
        }
        self.push(Constant::Utf8(bytes))
    }

    pub fn add_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        if let Some(&index) = self.class_lookup.get(&name_index) {
            return Ok(index);
        }
        self.push(Constant::Class(name_index))
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        if let Some(&index) = self.name_and_type_lookup.get(&(name_index, descriptor_index)) {
            return Ok(index);
        }
        self.push(Constant::NameAndType(name_index, descriptor_index))
    }

    /// Append a constant as a new entry, without deduplication
    pub fn push(&mut self, constant: Constant) -> Result<u16> {
        if let Constant::Utf8(bytes) = &constant {
            if bytes.len() > u16::MAX as usize {
                return Err(ConstPoolError::Utf8TooLong { len: bytes.len() }.into());
            }
        }
        let needed = if constant.is_wide() { 2 } else { 1 };
        if self.constants.len() + needed > u16::MAX as usize {
            return Err(ConstPoolError::OutOfSpace.into());
        }
        let index = self.constants.len() as u16;
        self.register(index, &constant);
        let wide = constant.is_wide();
        self.constants.push(constant);
        if wide {
            self.constants.push(Constant::Unusable);
        }
        Ok(index)
    }

    fn register(&mut self, index: u16, constant: &Constant) {
        match constant {
            Constant::Utf8(bytes) => {
                self.utf8_lookup.entry(bytes.clone()).or_insert(index);
            }
            Constant::Class(name) => {
                self.class_lookup.entry(*name).or_insert(index);
            }
            Constant::NameAndType(name, descriptor) => {
                self.name_and_type_lookup.entry((*name, *descriptor)).or_insert(index);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_and_indices() {
        let mut pool = ConstantPool::new();
        let a = pool.add_class("com/example/A").unwrap();
        let again = pool.add_class("com/example/A").unwrap();
        assert_eq!(a, again);
        assert_eq!(pool.class_name(a).unwrap(), "com/example/A");
        // utf8 at 1, class at 2
        assert_eq!(a, 2);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_wide_constants_take_two_slots() {
        let mut bytes = vec![0x00, 0x04];
        bytes.extend_from_slice(&[5, 0, 0, 0, 0, 0, 0, 0, 7]);
        bytes.extend_from_slice(&[1, 0, 1, b'x']);
        let pool = ConstantPool::parse(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(pool.get(1).unwrap(), &Constant::Long(7));
        assert!(pool.get(2).is_err());
        assert_eq!(pool.utf8(3).unwrap(), "x");
    }

    #[test]
    fn test_set_keeps_lookup_consistent() {
        let mut pool = ConstantPool::new();
        let class = pool.add_class("a/Old").unwrap();
        let new_name = pool.add_utf8("b/New").unwrap();
        pool.set(class, Constant::Class(new_name)).unwrap();
        let old_again = pool.add_class("a/Old").unwrap();
        assert_ne!(old_again, class);
        assert_eq!(pool.add_class("b/New").unwrap(), class);
    }

    #[test]
    fn test_utf8_length_limit() {
        let mut pool = ConstantPool::new();
        assert!(pool.add_utf8(&"a".repeat(u16::MAX as usize)).is_ok());
        let err = pool.add_utf8(&"b".repeat(u16::MAX as usize + 1)).unwrap_err();
        assert!(matches!(err, Error::ConstPool(ConstPoolError::Utf8TooLong { len: 65536 })));
        // modified UTF-8 widens NUL to two bytes
        assert!(pool.add_utf8(&"\0".repeat(40_000)).is_err());
    }

    #[test]
    fn test_wrong_kind_is_reported() {
        let mut pool = ConstantPool::new();
        let utf8 = pool.add_utf8("x").unwrap();
        assert!(matches!(
            pool.class_name(utf8),
            Err(Error::ConstPool(ConstPoolError::UnexpectedKind { .. }))
        ));
    }
}
