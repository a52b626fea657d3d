//! Per-class rewriting: rename symbols, recompute frames, then drop the pool
//! entries the old names left behind

use log::trace;

use crate::classfile::defs::access_flags::ACC_STATIC;
use crate::classfile::defs::attribute_names::STACK_MAP_TABLE;
use crate::classfile::defs::FIRST_FRAME_VERSION;
use crate::classfile::{
    compact_pool, compute_frames, walk_class, AttributeBody, AttributeInfo, ClassRecord, MethodContext,
};
use crate::error::Result;
use crate::hierarchy::{HierarchyResolver, TypeInfo};
use crate::mapping::{Remapper, SymbolRewriter};

/// Output of one transformation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub bytes: Vec<u8>,
    /// At least one symbol differed from its pre-image
    pub changed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassTransformer<'a> {
    rewriter: &'a SymbolRewriter,
    hierarchy: &'a HierarchyResolver,
}

impl<'a> ClassTransformer<'a> {
    pub fn new(rewriter: &'a SymbolRewriter, hierarchy: &'a HierarchyResolver) -> Self {
        Self { rewriter, hierarchy }
    }

    /// Rewrite one class file. Performs no I/O.
    pub fn transform(&self, bytes: &[u8]) -> Result<RewriteResult> {
        let mut class = ClassRecord::parse(bytes)?;
        let mut remapper = Remapper::new(self.rewriter);
        walk_class(&mut class, &mut remapper)?;
        if class.major_version >= FIRST_FRAME_VERSION {
            self.recompute_frames(&mut class)?;
        }
        // an unchanged class keeps its pool byte for byte
        if remapper.changed() {
            compact_pool(&mut class)?;
        }
        Ok(RewriteResult { bytes: class.to_bytes(), changed: remapper.changed() })
    }

    fn recompute_frames(&self, class: &mut ClassRecord) -> Result<()> {
        let header = class.header()?;
        let local = TypeInfo {
            name: header.name.clone(),
            super_name: header.super_name.clone(),
            interfaces: header.interfaces.clone(),
            is_interface: header.is_interface(),
        };
        let scope = self.hierarchy.scope(Some(&local));
        let pool = &mut class.constant_pool;

        for method in &mut class.methods {
            let name = pool.utf8(method.name_index)?;
            let descriptor = pool.utf8(method.descriptor_index)?;
            let context = MethodContext {
                class_name: &header.name,
                name: &name,
                descriptor: &descriptor,
                is_static: method.access_flags & ACC_STATIC != 0,
            };
            for attribute in &mut method.attributes {
                let AttributeBody::Code(code) = &mut attribute.body else {
                    continue;
                };
                let previous = std::mem::take(&mut code.attributes);
                for nested in previous {
                    if nested.name(pool)? != STACK_MAP_TABLE {
                        code.attributes.push(nested);
                    }
                }
                if let Some(table) = compute_frames(code, pool, &context, &scope)? {
                    trace!("FRAMES: {}.{}{} -> {} frames", header.name, name, descriptor, table.frames.len());
                    let name_index = pool.add_utf8(STACK_MAP_TABLE)?;
                    code.attributes.push(AttributeInfo::new(name_index, AttributeBody::Raw(table.to_bytes())));
                }
            }
        }
        Ok(())
    }
}
