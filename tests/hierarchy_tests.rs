mod common;

use std::path::Path;

use common::{fake_jdk, rewriter, write_archive, write_file, ClassBuilder};
use jremap::classfile::defs::access_flags::{ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC};
use jremap::classfile::ClassHeader;
use jremap::{ClassIndex, Error, HierarchyResolver, JdkSource, SymbolRewriter};

fn write_jar(path: &Path, entries: &[(&str, Vec<u8>)]) {
    write_archive(path, b"", entries);
}

fn header(name: &str, super_name: &str, interfaces: &[&str], flags: u16) -> ClassHeader {
    ClassHeader {
        access_flags: flags,
        name: name.to_string(),
        super_name: Some(super_name.to_string()),
        interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
    }
}

#[test]
fn test_index_reads_directories_and_jars() {
    let dir = tempfile::tempdir().unwrap();
    let classes = dir.path().join("classes");
    let jar = dir.path().join("lib.jar");
    write_jar(
        &jar,
        &[
            ("com/lib/Base.class", ClassBuilder::new("com/lib/Base").build()),
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
        ],
    );
    write_file(&classes, "app/Child.class", &ClassBuilder::new("app/Child").super_class("com/lib/Base").build());
    write_file(&classes, "app/Other.class", &ClassBuilder::new("app/Other").super_class("com/lib/Base").build());
    write_file(&classes, "app/notes.txt", b"not a class");

    let classpath = vec![jar, dir.path().join("missing.jar")];
    let index = ClassIndex::build(&classpath, &classes, &SymbolRewriter::default()).unwrap();
    assert_eq!(index.len(), 3);

    let resolver = HierarchyResolver::new(index);
    assert_eq!(resolver.common_superclass("app/Child", "app/Other").unwrap(), "com/lib/Base");
    assert_eq!(resolver.common_superclass("app/Child", "com/lib/Base").unwrap(), "com/lib/Base");
    assert_eq!(resolver.common_superclass("app/Child", "java/lang/String").unwrap(), "java/lang/Object");
}

#[test]
fn test_jdk_modules_resolve_library_types() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("jdk");
    fake_jdk(&home);

    let archives = JdkSource::Home(home.clone()).archives();
    assert_eq!(archives, vec![home.join("jmods/java.base.jmod")]);
    let index = ClassIndex::build(&archives, &dir.path().join("classes"), &SymbolRewriter::default()).unwrap();
    assert_eq!(index.len(), 2);
    assert!(index.get("module-info").is_none());

    let resolver = HierarchyResolver::new(index);
    // ArrayList itself comes from the built-in table
    assert_eq!(resolver.common_superclass("java/util/LinkedList", "java/util/ArrayList").unwrap(), "java/util/AbstractList");
    assert!(resolver.scope(None).is_assignable("java/util/List", "java/util/LinkedList").unwrap());
}

#[test]
fn test_classes_dir_wins_over_classpath() {
    let dir = tempfile::tempdir().unwrap();
    let classes = dir.path().join("classes");
    let lib = dir.path().join("lib");
    write_file(&lib, "app/Shared.class", &ClassBuilder::new("app/Shared").super_class("java/lang/Number").build());
    write_file(&classes, "app/Shared.class", &ClassBuilder::new("app/Shared").build());

    let index = ClassIndex::build(&[lib], &classes, &SymbolRewriter::default()).unwrap();
    assert_eq!(index.get("app/Shared").unwrap().super_name.as_deref(), Some("java/lang/Object"));
}

#[test]
fn test_unreadable_class_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "Broken.class", &[0xCA, 0xFE]);
    write_file(dir.path(), "Fine.class", &ClassBuilder::new("Fine").build());
    let index = ClassIndex::build(&[], dir.path(), &SymbolRewriter::default()).unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.get("Fine").is_some());
}

#[test]
fn test_index_sees_renamed_supertypes() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "com/old/Base.class", &ClassBuilder::new("com/old/Base").access(ACC_PUBLIC | ACC_ABSTRACT).build());
    write_file(dir.path(), "com/old/Left.class", &ClassBuilder::new("com/old/Left").super_class("com/old/Base").build());
    write_file(dir.path(), "com/old/Right.class", &ClassBuilder::new("com/old/Right").super_class("com/old/Base").build());

    let rw = rewriter(&[("com.old:all", "com.new")]);
    let resolver = HierarchyResolver::new(ClassIndex::build(&[], dir.path(), &rw).unwrap());
    assert_eq!(resolver.common_superclass("com/new/Left", "com/new/Right").unwrap(), "com/new/Base");
}

#[test]
fn test_interfaces_merge_to_object() {
    let index = ClassIndex::from_headers(
        vec![
            header("app/Api", "java/lang/Object", &[], ACC_INTERFACE | ACC_ABSTRACT),
            header("app/Impl", "java/lang/Object", &["app/Api"], ACC_PUBLIC),
            header("app/Other", "java/lang/Object", &[], ACC_PUBLIC),
        ],
        &SymbolRewriter::default(),
    )
    .unwrap();
    let resolver = HierarchyResolver::new(index);
    assert_eq!(resolver.common_superclass("app/Impl", "app/Api").unwrap(), "app/Api");
    assert_eq!(resolver.common_superclass("app/Api", "app/Other").unwrap(), "java/lang/Object");
}

#[test]
fn test_circular_chain_degrades_to_object() {
    let index = ClassIndex::from_headers(
        vec![
            header("app/A", "app/B", &[], ACC_PUBLIC),
            header("app/B", "app/A", &[], ACC_PUBLIC),
            header("app/C", "java/lang/Object", &[], ACC_PUBLIC),
        ],
        &SymbolRewriter::default(),
    )
    .unwrap();
    let resolver = HierarchyResolver::new(index);
    assert_eq!(resolver.common_superclass("app/A", "app/C").unwrap(), "java/lang/Object");
}

#[test]
fn test_unknown_type_is_an_error() {
    let resolver = HierarchyResolver::default();
    let err = resolver.common_superclass("app/Nowhere", "java/lang/Object").unwrap_err();
    assert!(matches!(err, Error::UnresolvableType { ref name } if name == "app/Nowhere"), "got {:?}", err);
}
