//! Class file structure

use super::attribute::AttributeInfo;
use super::constpool::ConstantPool;
use super::defs::{access_flags, MAGIC};
use super::reader::ByteReader;
use super::writer::ClassfileWritable;
use crate::error::{Error, Result};

/// A field or method
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MemberRecord {
    fn parse(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self> {
        Ok(Self {
            access_flags: reader.u2()?,
            name_index: reader.u2()?,
            descriptor_index: reader.u2()?,
            attributes: AttributeInfo::parse_list(reader, pool)?,
        })
    }

    fn parse_list(reader: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Vec<Self>> {
        let count = reader.u2()?;
        (0..count).map(|_| Self::parse(reader, pool)).collect()
    }
}

/// Full structural parse of one class file
#[derive(Debug, Clone, PartialEq)]
pub struct ClassRecord {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberRecord>,
    pub methods: Vec<MemberRecord>,
    pub attributes: Vec<AttributeInfo>,
}

/// Supertype information read from a class file without its members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub access_flags: u16,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

impl ClassHeader {
    pub fn is_interface(&self) -> bool {
        self.access_flags & access_flags::ACC_INTERFACE != 0
    }
}

struct Prologue {
    minor_version: u16,
    major_version: u16,
    constant_pool: ConstantPool,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
}

fn parse_prologue(reader: &mut ByteReader<'_>) -> Result<Prologue> {
    let magic = reader.u4()?;
    if magic != MAGIC {
        return Err(Error::class_format(format!("bad magic 0x{:08x}", magic)));
    }
    let minor_version = reader.u2()?;
    let major_version = reader.u2()?;
    let constant_pool = ConstantPool::parse(reader)?;
    Ok(Prologue {
        minor_version,
        major_version,
        constant_pool,
        access_flags: reader.u2()?,
        this_class: reader.u2()?,
        super_class: reader.u2()?,
        interfaces: reader.u2_list()?,
    })
}

impl ClassRecord {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let p = parse_prologue(&mut reader)?;
        let fields = MemberRecord::parse_list(&mut reader, &p.constant_pool)?;
        let methods = MemberRecord::parse_list(&mut reader, &p.constant_pool)?;
        let attributes = AttributeInfo::parse_list(&mut reader, &p.constant_pool)?;
        reader.expect_end("class attributes")?;
        let record = Self {
            minor_version: p.minor_version,
            major_version: p.major_version,
            constant_pool: p.constant_pool,
            access_flags: p.access_flags,
            this_class: p.this_class,
            super_class: p.super_class,
            interfaces: p.interfaces,
            fields,
            methods,
            attributes,
        };
        record.name()?;
        Ok(record)
    }

    /// Read only the header (constant pool, this/super/interfaces)
    pub fn parse_header(bytes: &[u8]) -> Result<ClassHeader> {
        let mut reader = ByteReader::new(bytes);
        let p = parse_prologue(&mut reader)?;
        let pool = &p.constant_pool;
        Ok(ClassHeader {
            access_flags: p.access_flags,
            name: pool.class_name(p.this_class)?,
            super_name: match p.super_class {
                0 => None,
                index => Some(pool.class_name(index)?),
            },
            interfaces: p
                .interfaces
                .iter()
                .map(|&i| pool.class_name(i))
                .collect::<Result<Vec<_>>>()?,
        })
    }

    pub fn name(&self) -> Result<String> {
        self.constant_pool.class_name(self.this_class)
    }

    pub fn super_name(&self) -> Result<Option<String>> {
        match self.super_class {
            0 => Ok(None),
            index => self.constant_pool.class_name(index).map(Some),
        }
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces.iter().map(|&i| self.constant_pool.class_name(i)).collect()
    }

    pub fn header(&self) -> Result<ClassHeader> {
        Ok(ClassHeader {
            access_flags: self.access_flags,
            name: self.name()?,
            super_name: self.super_name()?,
            interfaces: self.interface_names()?,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_classfile_bytes()
    }
}
