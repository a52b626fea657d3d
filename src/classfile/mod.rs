//! Class file model
//!
//! This module parses `.class` files into an editable record, walks every
//! symbol they contain, recomputes StackMapTable frames, drops pool entries
//! left unreferenced and writes the result back out.

pub mod analyzer;
pub mod attribute;
pub mod class;
pub mod compact;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod frame;
pub mod opcodes;
pub mod reader;
pub mod visitor;
pub mod writer;

pub use analyzer::{compute_frames, MethodContext, TypeMerger};
pub use attribute::{AttributeBody, AttributeInfo, CodeAttribute, ExceptionTableEntry};
pub use class::{ClassHeader, ClassRecord, MemberRecord};
pub use compact::compact_pool;
pub use constpool::{Constant, ConstantPool, MemberRef};
pub use frame::{StackMapFrame, StackMapTable, VerificationType};
pub use visitor::{walk_class, MemberKind, Occurrence, SignatureKind, SymbolCollector, SymbolVisitor};
pub use writer::ClassfileWritable;
