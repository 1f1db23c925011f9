//! The shared, read-mostly context every rule invocation receives.

use std::rc::Rc;

use crate::{
    cpool::ConstantPool,
    diagnostics::Diagnostics,
    options::SimplifyOptions,
    segment::SegmentOp,
    typeinfo::Datatype,
};

/// Everything a [`crate::engine::rule::Rule`] needs beyond the `FunctionData`
/// it mutates: tunables, the external collaborator façades (spec §6), and
/// the warning sink.
///
/// The architecture façade (type factory, constant pool, segment-op table)
/// is read-only during simplification (spec §5): `RuleContext` only ever
/// hands out shared references to it.
pub struct RuleContext<'a> {
    /// Tunables (spec §6.6).
    pub options: &'a SimplifyOptions,
    /// Warning sink (spec §7.3, §7.5).
    pub diagnostics: &'a mut Diagnostics,
    /// Type-factory façade, if one was supplied. Pointer/struct-offset
    /// rules decline to fire without it.
    pub types: Option<&'a dyn TypeLookup>,
    /// Segment-op table, keyed by the `CALLOTHER`/`SEGMENTOP` index the
    /// lifter assigned it.
    pub segment_ops: &'a [Rc<dyn SegmentOp>],
    /// The constant pool, if this architecture has one (language-runtime
    /// targets only).
    pub constant_pool: Option<&'a dyn ConstantPool>,
}

/// Thin indirection so `RuleContext` doesn't need a type parameter: looks
/// up the data-type attached to a Varnode by its (space, offset) identity.
/// A production front-end backs this with its symbol-scope/type-factory;
/// tests back it with a small fixed map.
pub trait TypeLookup {
    /// Returns the data-type believed to describe the value at `key`, if
    /// the type system has one on file.
    fn lookup(&self, key: TypeKey) -> Option<Rc<dyn Datatype>>;
}

/// Identifies a Varnode for the purposes of a [`TypeLookup`] query: its
/// address-space id and offset (a Varnode's (space, offset, size) identity
/// per spec §6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    /// Address-space id.
    pub space: u16,
    /// Offset within the space.
    pub offset: u64,
}
