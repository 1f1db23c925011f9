//! PcodeOps: IR instructions (spec §3.3).

use smallvec::SmallVec;

use pcode_types::space::Address;

use crate::{
    BlockId,
    OpCode,
    VarnodeId,
};

bitflags::bitflags! {
    /// PcodeOp flag set (spec §3.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpFlags: u32 {
        /// Scratch bit for traversal algorithms (spec §5); must be
        /// cleared by whichever rule sets it before returning.
        const MARK               = 1 << 0;
        /// A `CPOOLREF` already resolved against the constant pool.
        const CPOOL_TRANSFORMED  = 1 << 1;
        /// Output is known to be a strict boolean (0 or 1), letting
        /// comparison rules skip re-deriving that fact.
        const CALCULATED_BOOL    = 1 << 2;
        /// Type-propagation rules must not cross this op.
        const STOP_TYPE_PROPAGATION = 1 << 3;
        /// An `INDIRECT` whose output models a value created (not merely
        /// passed through) by the causing op.
        const INDIRECT_CREATION  = 1 << 4;
        /// The op referenced by an `INDIRECT`'s second input.
        const INDIRECT_SOURCE    = 1 << 5;
        /// Root of a structured `PIECE` tree (spec "piece_structure").
        const PARTIAL_ROOT       = 1 << 6;
        /// Participates in pointer-flow propagation (`RulePtrFlow`).
        const PTR_FLOW           = 1 << 7;
        /// A `COPY` inserted purely to preserve a return-value's storage
        /// location; exempt from `propagate_copy`'s chase.
        const RET_COPY           = 1 << 8;
        /// Has custom/non-default pretty-printing; simplification must
        /// not restructure it in ways that would invalidate that.
        const SPECIAL_PRINTING   = 1 << 9;
        /// A `STORE` to a space with no modeled load aliasing; `expand_load`
        /// and friends must not assume coverage.
        const STORE_UNMAPPED     = 1 << 10;
        /// Exempt from `multi_collapse`/similar op-merging rules.
        const NO_COLLAPSE        = 1 << 11;
        /// Marked dead; unlinked from all edges but not yet arena-freed
        /// (spec §5: "Destroyed ops are not freed until end-of-pass").
        const DEAD               = 1 << 12;
    }
}

/// A single IR instruction (spec §3.3).
#[derive(Debug, Clone)]
pub struct PcodeOp {
    /// The operation performed.
    pub opcode: OpCode,
    /// Ordered operands. A slot is `None` only transiently, between
    /// `new_op` allocating it and `op_set_input` wiring it (spec §4.2);
    /// every input slot of a live, inserted op is expected to be filled.
    pub inputs: SmallVec<[Option<VarnodeId>; 3]>,
    /// The single output, if any.
    pub output: Option<VarnodeId>,
    /// Basic block this op belongs to.
    pub parent: BlockId,
    /// Position within `parent`'s op list; ops are totally ordered within
    /// a block by this sequence number.
    pub seq: u32,
    /// Source address in the original program.
    pub address: Address,
    /// Flag set (spec §3.3).
    pub flags: OpFlags,
}

impl PcodeOp {
    /// Builds a detached op (no block/seq assigned yet) with `nin` empty
    /// input slots, mirroring `new_op(nin, addr)` (spec §4.2). Callers fill
    /// slots with `op_set_input` before the op is inserted.
    pub fn new_detached(opcode: OpCode, nin: usize, address: Address) -> Self {
        PcodeOp {
            opcode,
            inputs: SmallVec::from_elem(None, nin),
            output: None,
            parent: BlockId::from_raw(u32::MAX),
            seq: 0,
            address,
            flags: OpFlags::empty(),
        }
    }

    /// `true` if this op has been marked dead (invariant: destroyed ops
    /// remain reachable but flagged during a pass, spec §5).
    pub fn is_dead(&self) -> bool {
        self.flags.contains(OpFlags::DEAD)
    }

    /// The input at `slot`, if in range and wired.
    pub fn input(&self, slot: usize) -> Option<VarnodeId> {
        self.inputs.get(slot).copied().flatten()
    }
}
