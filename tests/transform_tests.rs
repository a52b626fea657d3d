mod common;

use common::{be, init_logger, rewriter, symbols, ClassBuilder};
use jremap::classfile::attribute::InnerClassEntry;
use jremap::classfile::defs::access_flags::{ACC_PUBLIC, ACC_STATIC};
use jremap::classfile::defs::attribute_names::STACK_MAP_TABLE;
use jremap::classfile::opcodes::*;
use jremap::classfile::{
    AttributeBody, AttributeInfo, ClassHeader, ClassRecord, CodeAttribute, Constant, ConstantPool, StackMapFrame,
    StackMapTable, VerificationType,
};
use jremap::error::ConstPoolError;
use jremap::{ClassIndex, ClassTransformer, Error, HierarchyResolver, SymbolRewriter};

const PUBLIC_STATIC: u16 = ACC_PUBLIC | ACC_STATIC;

fn transform(rewriter: &SymbolRewriter, index: ClassIndex, bytes: &[u8]) -> jremap::Result<(ClassRecord, bool)> {
    let hierarchy = HierarchyResolver::new(index);
    let result = ClassTransformer::new(rewriter, &hierarchy).transform(bytes)?;
    Ok((ClassRecord::parse(&result.bytes)?, result.changed))
}

fn code_of<'a>(class: &'a ClassRecord, method: &str) -> &'a CodeAttribute {
    let pool = &class.constant_pool;
    class
        .methods
        .iter()
        .find(|m| pool.utf8(m.name_index).unwrap() == method)
        .and_then(|m| {
            m.attributes.iter().find_map(|a| match &a.body {
                AttributeBody::Code(code) => Some(code),
                _ => None,
            })
        })
        .unwrap_or_else(|| panic!("no code for {}", method))
}

fn stack_map(class: &ClassRecord, method: &str) -> Option<StackMapTable> {
    let pool = &class.constant_pool;
    let tables: Vec<_> = code_of(class, method)
        .attributes
        .iter()
        .filter(|a| a.name(pool).unwrap() == STACK_MAP_TABLE)
        .collect();
    assert!(tables.len() <= 1, "duplicate StackMapTable in {}", method);
    tables.first().map(|a| match &a.body {
        AttributeBody::Raw(data) => StackMapTable::parse(data).unwrap(),
        other => panic!("unexpected body {:?}", other),
    })
}

fn object_name(pool: &ConstantPool, ty: &VerificationType) -> String {
    match ty {
        VerificationType::Object(index) => pool.class_name(*index).unwrap(),
        other => panic!("not an object type: {:?}", other),
    }
}

fn header(name: &str, super_name: &str) -> ClassHeader {
    ClassHeader {
        access_flags: ACC_PUBLIC,
        name: name.to_string(),
        super_name: Some(super_name.to_string()),
        interfaces: Vec::new(),
    }
}

/// `static T pick(int flag)`: returns `(T) null` cast to `a` or `b` depending on `flag`
fn pick_method(builder: ClassBuilder, a: &str, b: &str, result: &str) -> ClassBuilder {
    let (a, b) = (a.to_string(), b.to_string());
    builder.method(PUBLIC_STATIC, "pick", &format!("(I)L{};", result), move |pool| {
        let [a_hi, a_lo] = be(pool.add_class(&a).unwrap());
        let [b_hi, b_lo] = be(pool.add_class(&b).unwrap());
        CodeAttribute::new(
            1,
            1,
            vec![
                ILOAD_0, IFEQ, 0x00, 0x0a, // -> 11
                ACONST_NULL, CHECKCAST, a_hi, a_lo, GOTO, 0x00, 0x07, // -> 15
                ACONST_NULL, CHECKCAST, b_hi, b_lo, // 11
                ARETURN, // 15
            ],
        )
    })
}

#[test]
fn test_type_renamed_everywhere_except_string_literals() {
    init_logger();
    let mut builder = ClassBuilder::new("app/Main").field("foo", "Lcom/old/Foo;");
    builder = builder.method(PUBLIC_STATIC, "make", "(Lcom/old/Foo;)Lcom/old/Foo;", |pool| {
        let [hi, lo] = be(pool.add_class("com/old/Foo").unwrap());
        CodeAttribute::new(1, 1, vec![ALOAD_0, CHECKCAST, hi, lo, ARETURN])
    });
    builder = builder.method(PUBLIC_STATIC, "create", "()Lcom/old/Foo;", |pool| {
        let owner = pool.add_class("com/old/Foo").unwrap();
        let nat = pool.add_name_and_type("create", "()Lcom/old/Foo;").unwrap();
        let [hi, lo] = be(pool.push(Constant::MethodRef(owner, nat)).unwrap());
        CodeAttribute::new(1, 0, vec![INVOKESTATIC, hi, lo, ARETURN])
    });
    builder = builder.method(PUBLIC_STATIC, "text", "()Ljava/lang/String;", |pool| {
        let utf8 = pool.add_utf8("com/old/Foo").unwrap();
        let string = pool.push(Constant::String(utf8)).unwrap();
        CodeAttribute::new(1, 0, vec![LDC, string as u8, ARETURN])
    });

    let (class, changed) = transform(&rewriter(&[("com.old.Foo", "com.new.Bar")]), ClassIndex::new(), &builder.build()).unwrap();
    assert!(changed);

    let found = symbols(&class);
    assert!(found.iter().all(|s| !s.contains("com/old/Foo")), "leftover symbol in {:?}", found);
    assert!(found.iter().any(|s| s == "com/new/Bar"));
    assert!(found.iter().any(|s| s == "Lcom/new/Bar;"));
    assert!(found.iter().any(|s| s == "(Lcom/new/Bar;)Lcom/new/Bar;"));
    assert!(found.iter().any(|s| s == "com/new/Bar.create:()Lcom/new/Bar;"));

    let code = &code_of(&class, "text").code;
    assert_eq!(code[0], LDC);
    let pool = &class.constant_pool;
    match pool.get(code[1] as u16).unwrap() {
        Constant::String(utf8) => assert_eq!(pool.utf8(*utf8).unwrap(), "com/old/Foo"),
        other => panic!("ldc operand changed to {:?}", other),
    }
}

#[test]
fn test_package_rule_leaves_other_roots_alone() {
    let rewriter = rewriter(&[("com.old:all", "com.new")]);

    let (class, changed) = transform(&rewriter, ClassIndex::new(), &ClassBuilder::new("com/old/sub/Thing").build()).unwrap();
    assert!(changed);
    assert_eq!(class.name().unwrap(), "com/new/sub/Thing");

    let other = ClassBuilder::new("org/old/Thing").field("peer", "Lorg/old/sub/Thing;").build();
    let hierarchy = HierarchyResolver::default();
    let result = ClassTransformer::new(&rewriter, &hierarchy).transform(&other).unwrap();
    assert!(!result.changed);
    assert_eq!(result.bytes, other);
}

#[test]
fn test_prefix_rule_moves_a_package() {
    let rewriter = rewriter(&[("com.old:all", "com.moved")]);
    let bytes = ClassBuilder::new("com/old/a/Impl")
        .super_class("com/old/Base")
        .interface("com/old/api/Service")
        .build();

    let (class, changed) = transform(&rewriter, ClassIndex::new(), &bytes).unwrap();
    assert!(changed);
    let header = class.header().unwrap();
    assert_eq!(header.name, "com/moved/a/Impl");
    assert_eq!(header.super_name.as_deref(), Some("com/moved/Base"));
    assert_eq!(header.interfaces, vec!["com/moved/api/Service".to_string()]);
}

#[test]
fn test_generic_signature_rewritten() {
    let bytes = ClassBuilder::new("app/Holder")
        .signature("<T:Lcom/old/Foo;>Ljava/lang/Object;Ljava/lang/Iterable<Lcom/old/Foo$Entry<TT;>;>;")
        .build();
    let rewriter = rewriter(&[("com.old.Foo", "com.new.Bar"), ("com.old.Foo$Entry", "com.new.Bar$Item")]);

    let (class, changed) = transform(&rewriter, ClassIndex::new(), &bytes).unwrap();
    assert!(changed);
    let signature = class
        .attributes
        .iter()
        .find_map(|a| match a.body {
            AttributeBody::Signature(index) => Some(class.constant_pool.utf8(index).unwrap()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        signature,
        "<T:Lcom/new/Bar;>Ljava/lang/Object;Ljava/lang/Iterable<Lcom/new/Bar$Item<TT;>;>;"
    );
}

#[test]
fn test_inner_class_simple_name_follows_rename() {
    let mut builder = ClassBuilder::new("com/old/Outer");
    let pool = builder.pool();
    let inner = pool.add_class("com/old/Outer$Inner").unwrap();
    let outer = pool.add_class("com/old/Outer").unwrap();
    let inner_name = pool.add_utf8("Inner").unwrap();
    let attribute_name = pool.add_utf8("InnerClasses").unwrap();
    let mut record = builder.record();
    record.attributes.push(AttributeInfo::new(
        attribute_name,
        AttributeBody::InnerClasses(vec![InnerClassEntry {
            inner_class_info_index: inner,
            outer_class_info_index: outer,
            inner_name_index: inner_name,
            inner_class_access_flags: ACC_PUBLIC,
        }]),
    ));

    let rewriter = rewriter(&[("com.old.Outer$Inner", "com.new.Outer$Nested"), ("com.old.Outer", "com.new.Outer")]);
    let (class, _) = transform(&rewriter, ClassIndex::new(), &record.to_bytes()).unwrap();
    let pool = &class.constant_pool;
    let entries = class
        .attributes
        .iter()
        .find_map(|a| match &a.body {
            AttributeBody::InnerClasses(entries) => Some(entries.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(pool.class_name(entries[0].inner_class_info_index).unwrap(), "com/new/Outer$Nested");
    assert_eq!(pool.class_name(entries[0].outer_class_info_index).unwrap(), "com/new/Outer");
    assert_eq!(pool.utf8(entries[0].inner_name_index).unwrap(), "Nested");
}

#[test]
fn test_empty_mapping_is_identity() {
    let bytes = ClassBuilder::new("app/Plain")
        .field("count", "I")
        .method(PUBLIC_STATIC, "id", "(Ljava/lang/String;)Ljava/lang/String;", |_| {
            CodeAttribute::new(1, 1, vec![ALOAD_0, ARETURN])
        })
        .build();
    let hierarchy = HierarchyResolver::default();
    let rewriter = SymbolRewriter::default();
    let result = ClassTransformer::new(&rewriter, &hierarchy).transform(&bytes).unwrap();
    assert!(!result.changed);
    assert_eq!(result.bytes, bytes);
}

#[test]
fn test_stale_frames_replaced() {
    let mut builder = ClassBuilder::new("app/Choice");
    builder = builder.method(PUBLIC_STATIC, "choose", "(I)Ljava/lang/String;", |pool| {
        let text = pool.add_utf8("yes").unwrap();
        let string = pool.push(Constant::String(text)).unwrap();
        let mut code = CodeAttribute::new(
            1,
            1,
            vec![
                ILOAD_0, IFEQ, 0x00, 0x08, // -> 9
                LDC, string as u8, GOTO, 0x00, 0x04, // -> 10
                ACONST_NULL, // 9
                ARETURN, // 10
            ],
        );
        let name = pool.add_utf8(STACK_MAP_TABLE).unwrap();
        code.attributes.push(AttributeInfo::new(name, AttributeBody::Raw(vec![0x00, 0x01, 0x00])));
        code
    });

    let (class, changed) = transform(&rewriter(&[("com.old.Foo", "com.new.Bar")]), ClassIndex::new(), &builder.build()).unwrap();
    assert!(!changed);
    let table = stack_map(&class, "choose").unwrap();
    assert_eq!(table.offsets(), vec![9, 10]);
    assert_eq!(table.frames[0], StackMapFrame::Same { offset_delta: 9 });
    match &table.frames[1] {
        StackMapFrame::SameLocals1StackItem { offset_delta: 0, stack } => {
            assert_eq!(object_name(&class.constant_pool, stack), "java/lang/String");
        }
        other => panic!("unexpected frame {:?}", other),
    }
}

#[test]
fn test_merge_uses_renamed_hierarchy() {
    let rewriter = rewriter(&[("com.old:all", "com.new")]);
    let index = ClassIndex::from_headers(
        vec![
            header("com/old/Base", "java/lang/Object"),
            header("com/old/A", "com/old/Base"),
            header("com/old/B", "com/old/Base"),
        ],
        &rewriter,
    )
    .unwrap();
    let bytes = pick_method(ClassBuilder::new("com/old/Factory"), "com/old/A", "com/old/B", "com/old/Base").build();

    let (class, changed) = transform(&rewriter, index, &bytes).unwrap();
    assert!(changed);
    let table = stack_map(&class, "pick").unwrap();
    assert_eq!(table.offsets(), vec![11, 15]);
    match &table.frames[1] {
        StackMapFrame::SameLocals1StackItem { stack, .. } => {
            assert_eq!(object_name(&class.constant_pool, stack), "com/new/Base");
        }
        other => panic!("unexpected frame {:?}", other),
    }
}

#[test]
fn test_unresolvable_merge_fails() {
    let bytes = pick_method(ClassBuilder::new("app/Factory"), "com/x/P", "com/x/Q", "java/lang/Object").build();
    let err = transform(&SymbolRewriter::default(), ClassIndex::new(), &bytes).unwrap_err();
    assert!(matches!(err, Error::UnresolvableType { .. }), "got {:?}", err);
}

#[test]
fn test_old_class_versions_keep_their_code_untouched() {
    let bytes = pick_method(ClassBuilder::new("app/Legacy").version(49), "com/x/P", "com/x/Q", "java/lang/Object").build();
    let (class, changed) = transform(&SymbolRewriter::default(), ClassIndex::new(), &bytes).unwrap();
    assert!(!changed);
    assert!(stack_map(&class, "pick").is_none());
}

#[test]
fn test_truncated_class_rejected() {
    let bytes = ClassBuilder::new("app/Short").build();
    let hierarchy = HierarchyResolver::default();
    let rewriter = SymbolRewriter::default();
    let result = ClassTransformer::new(&rewriter, &hierarchy).transform(&bytes[..bytes.len() - 3]);
    assert!(matches!(result, Err(Error::ClassFormat { .. })));
}

#[test]
fn test_oversized_rename_is_rejected() {
    let signature = format!("Ljava/lang/Object;{}", "Lcom/old/Foo;".repeat(5000));
    assert!(signature.len() <= u16::MAX as usize);
    let bytes = ClassBuilder::new("app/Wide").signature(&signature).build();

    let err = transform(&rewriter(&[("com.old.Foo", "com.newer.LongerName")]), ClassIndex::new(), &bytes).unwrap_err();
    assert!(
        matches!(err.root(), Error::ConstPool(ConstPoolError::Utf8TooLong { .. })),
        "got {:?}",
        err
    );
}

fn utf8_entries(pool: &ConstantPool) -> Vec<String> {
    pool.iter()
        .filter(|(_, c)| matches!(c, Constant::Utf8(_)))
        .map(|(index, _)| pool.utf8(index).unwrap())
        .collect()
}

fn class_using_foo() -> ClassBuilder {
    let mut builder = ClassBuilder::new("app/Main").field("foo", "Lcom/old/Foo;");
    builder = builder.method(PUBLIC_STATIC, "make", "(Ljava/lang/Object;)Lcom/old/Foo;", |pool| {
        let [hi, lo] = be(pool.add_class("com/old/Foo").unwrap());
        CodeAttribute::new(1, 1, vec![ALOAD_0, CHECKCAST, hi, lo, ARETURN])
    });
    builder.method(PUBLIC_STATIC, "text", "()Ljava/lang/String;", |pool| {
        let utf8 = pool.add_utf8("com/old/Foo").unwrap();
        let string = pool.push(Constant::String(utf8)).unwrap();
        CodeAttribute::new(1, 0, vec![LDC, string as u8, ARETURN])
    })
}

#[test]
fn test_old_names_leave_the_pool() {
    let mut builder = class_using_foo();
    let source_name = builder.pool().add_utf8("SourceFile").unwrap();
    let source = builder.pool().add_utf8("Main.java").unwrap();
    let mut record = builder.record();
    record.attributes.push(AttributeInfo::new(source_name, AttributeBody::Raw(source.to_be_bytes().to_vec())));
    let before = record.constant_pool.len();

    let (class, changed) = transform(&rewriter(&[("com.old.Foo", "com.new.Bar")]), ClassIndex::new(), &record.to_bytes()).unwrap();
    assert!(changed);
    let pool = &class.constant_pool;
    let entries = utf8_entries(pool);
    // the string literal is the only old name left
    assert_eq!(entries.iter().filter(|s| s.contains("com/old/Foo")).collect::<Vec<_>>(), vec!["com/old/Foo"]);
    assert!(entries.contains(&"Lcom/new/Bar;".to_string()));
    assert!(pool.len() <= before + 2, "pool grew from {} to {}", before, pool.len());

    let code = &code_of(&class, "text").code;
    match pool.get(code[1] as u16).unwrap() {
        Constant::String(utf8) => assert_eq!(pool.utf8(*utf8).unwrap(), "com/old/Foo"),
        other => panic!("ldc operand points at {:?}", other),
    }
    let code = &code_of(&class, "make").code;
    assert_eq!(pool.class_name(u16::from_be_bytes([code[2], code[3]])).unwrap(), "com/new/Bar");
    let AttributeBody::Raw(data) = &class.attributes[0].body else {
        panic!("expected a raw SourceFile");
    };
    assert_eq!(class.attributes[0].name(pool).unwrap(), "SourceFile");
    assert_eq!(pool.utf8(u16::from_be_bytes([data[0], data[1]])).unwrap(), "Main.java");
}

#[test]
fn test_unknown_attribute_keeps_old_entries() {
    let mut builder = class_using_foo();
    let vendor = builder.pool().add_utf8("VendorData").unwrap();
    let mut record = builder.record();
    record.attributes.push(AttributeInfo::new(vendor, AttributeBody::Raw(vec![0x00, 0x07])));

    let (class, changed) = transform(&rewriter(&[("com.old.Foo", "com.new.Bar")]), ClassIndex::new(), &record.to_bytes()).unwrap();
    assert!(changed);
    assert!(symbols(&class).iter().all(|s| !s.contains("Lcom/old/Foo;")));
    // the attribute may hold indices, so nothing moves
    assert!(utf8_entries(&class.constant_pool).contains(&"Lcom/old/Foo;".to_string()));
    assert_eq!(class.attributes[0].body, AttributeBody::Raw(vec![0x00, 0x07]));
}
