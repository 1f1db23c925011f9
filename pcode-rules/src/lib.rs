//! The rewrite-rule catalogue and worklist scheduler for p-code
//! simplification: the engine that drives [`pcode_ir::FunctionData`]
//! toward a fixed point under a named set of [`rules`] (spec §4, §5).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cpool;
pub mod diagnostics;
pub mod engine;
pub mod evaluate;
pub mod options;
pub mod rules;
pub mod segment;
pub mod typeinfo;

pub use cpool::{
    ConstantPool,
    CPoolRecord,
    CPoolTag,
};
pub use diagnostics::Diagnostics;
pub use engine::{
    ActionGroup,
    RuleContext,
    Rule,
    OpList,
    Scheduler,
    SchedulerReport,
    TypeKey,
    TypeLookup,
};
pub use options::SimplifyOptions;
pub use segment::{
    FlatSegmentOp,
    SegmentOp,
};
pub use typeinfo::{
    Array,
    Datatype,
    Field,
    Metatype,
    Pointer,
    PointerRelative,
    Primitive,
    Struct,
};
