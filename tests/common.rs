// Common test utilities: hand-assembled class files and run fixtures
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::Path;

use jremap::classfile::defs::access_flags::{ACC_PUBLIC, ACC_SUPER};
use jremap::classfile::{
    AttributeBody, AttributeInfo, ClassRecord, CodeAttribute, ConstantPool, MemberRecord, Occurrence, SymbolCollector,
};
use jremap::{MappingTable, SymbolRewriter};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builds a minimal class file, version 52 unless told otherwise
pub struct ClassBuilder {
    pool: ConstantPool,
    major_version: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<MemberRecord>,
    methods: Vec<MemberRecord>,
    attributes: Vec<AttributeInfo>,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(name).unwrap();
        let super_class = pool.add_class("java/lang/Object").unwrap();
        Self {
            pool,
            major_version: 52,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = self.pool.add_class(name).unwrap();
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.pool.add_class(name).unwrap();
        self.interfaces.push(index);
        self
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn version(mut self, major: u16) -> Self {
        self.major_version = major;
        self
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        let field = MemberRecord {
            access_flags: ACC_PUBLIC,
            name_index: self.pool.add_utf8(name).unwrap(),
            descriptor_index: self.pool.add_utf8(descriptor).unwrap(),
            attributes: Vec::new(),
        };
        self.fields.push(field);
        self
    }

    /// Add a method whose code is assembled against the class's pool
    pub fn method(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        code: impl FnOnce(&mut ConstantPool) -> CodeAttribute,
    ) -> Self {
        let name_index = self.pool.add_utf8(name).unwrap();
        let descriptor_index = self.pool.add_utf8(descriptor).unwrap();
        let code = code(&mut self.pool);
        let code_name = self.pool.add_utf8("Code").unwrap();
        self.methods.push(MemberRecord {
            access_flags,
            name_index,
            descriptor_index,
            attributes: vec![AttributeInfo::new(code_name, AttributeBody::Code(code))],
        });
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        let name = self.pool.add_utf8("Signature").unwrap();
        let value = self.pool.add_utf8(signature).unwrap();
        self.attributes.push(AttributeInfo::new(name, AttributeBody::Signature(value)));
        self
    }

    pub fn record(self) -> ClassRecord {
        ClassRecord {
            minor_version: 0,
            major_version: self.major_version,
            constant_pool: self.pool,
            access_flags: self.access_flags,
            this_class: self.this_class,
            super_class: self.super_class,
            interfaces: self.interfaces,
            fields: self.fields,
            methods: self.methods,
            attributes: self.attributes,
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.record().to_bytes()
    }
}

pub fn rewriter(pairs: &[(&str, &str)]) -> SymbolRewriter {
    SymbolRewriter::new(MappingTable::from_pairs(pairs.iter().copied()).unwrap())
}

/// Split a u16 constant pool index into big-endian operand bytes
pub fn be(index: u16) -> [u8; 2] {
    index.to_be_bytes()
}

pub fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Zip `entries` into `path`, after `prefix` (the `JM` header of a jmod, or nothing)
pub fn write_archive(path: &Path, prefix: &[u8], entries: &[(&str, Vec<u8>)]) {
    let mut file = fs::File::create(path).unwrap();
    file.write_all(prefix).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, bytes) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
}

/// A JDK home whose `java.base.jmod` knows `LinkedList` and `AbstractSequentialList`
pub fn fake_jdk(home: &Path) {
    fs::create_dir_all(home.join("jmods")).unwrap();
    write_archive(
        &home.join("jmods/java.base.jmod"),
        b"JM\x01\x00",
        &[
            ("classes/module-info.class", b"not a class header".to_vec()),
            (
                "classes/java/util/LinkedList.class",
                ClassBuilder::new("java/util/LinkedList").super_class("java/util/AbstractSequentialList").build(),
            ),
            (
                "classes/java/util/AbstractSequentialList.class",
                ClassBuilder::new("java/util/AbstractSequentialList").super_class("java/util/AbstractList").build(),
            ),
            ("legal/LICENSE", b"license text".to_vec()),
        ],
    );
}

/// Every symbol a class refers to, flattened to text
pub fn symbols(class: &ClassRecord) -> Vec<String> {
    SymbolCollector::collect(class)
        .unwrap()
        .into_iter()
        .map(|occurrence| match occurrence {
            Occurrence::Type(s) | Occurrence::Descriptor(s) | Occurrence::Annotation(s) | Occurrence::Package(s) => s,
            Occurrence::Signature(_, s) => s,
            Occurrence::Member { owner, name, descriptor, .. } => format!("{}.{}:{}", owner, name, descriptor),
            Occurrence::AnnotationElement { annotation, name } => format!("{}.{}", annotation, name),
        })
        .collect()
}

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}
