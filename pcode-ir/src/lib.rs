//! The p-code def-use IR graph: Varnodes, PcodeOps, basic blocks, and the
//! function-data container that owns and mutates them (spec §3, §4.2).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod block;
pub mod builder;
pub mod error;
pub mod function_data;
pub mod ids;
pub mod opcode;
pub mod pcodeop;
pub mod spaces;
pub mod varnode;

pub use block::BasicBlock;
pub use error::IrError;
pub use function_data::FunctionData;
pub use ids::{
    BlockId,
    OpId,
    VarnodeId,
};
pub use opcode::OpCode;
pub use pcodeop::{
    OpFlags,
    PcodeOp,
};
pub use spaces::SpaceManager;
pub use varnode::{
    Varnode,
    VarnodeFlags,
};
