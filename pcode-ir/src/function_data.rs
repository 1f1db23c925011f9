//! The function-data container (spec §3.5, §4.2): owns every Varnode, op,
//! and block, and is the sole point through which rules mutate the IR.

use smallvec::SmallVec;
use tracing::trace;

use pcode_types::{
    mask::calc_mask,
    space::Address,
};

use crate::{
    block::BasicBlock,
    error::IrError,
    ids::{
        BlockId,
        OpId,
        VarnodeId,
    },
    opcode::OpCode,
    pcodeop::{
        OpFlags,
        PcodeOp,
    },
    spaces::SpaceManager,
    varnode::{
        Varnode,
        VarnodeFlags,
    },
};

/// Owns all Varnodes, ops, and blocks of a single function, plus the
/// simplification-phase flags spec §3.5 calls out.
pub struct FunctionData {
    varnodes: Vec<Option<Varnode>>,
    ops: Vec<Option<PcodeOp>>,
    blocks: Vec<BasicBlock>,
    spaces: SpaceManager,
    /// Ops destroyed during the current pass; still arena-resident and
    /// reachable by id, but flagged `DEAD`, per spec §5: "Destroyed ops are
    /// not freed until end-of-pass". `gc()` reclaims them.
    pending_dead: Vec<OpId>,
    /// Whether pointer/struct-offset recovery rules have started running
    /// on this function.
    pub type_recovery_started: bool,
    /// Whether type recovery exceeded its iteration budget on this
    /// function and should no longer attempt new pointer resolutions.
    pub type_recovery_exceeded: bool,
}

impl FunctionData {
    /// Creates an empty function over the given address spaces.
    pub fn new(spaces: SpaceManager) -> Self {
        FunctionData {
            varnodes: Vec::new(),
            ops: Vec::new(),
            blocks: Vec::new(),
            spaces,
            pending_dead: Vec::new(),
            type_recovery_started: false,
            type_recovery_exceeded: false,
        }
    }

    /// The space registry.
    pub fn spaces(&self) -> &SpaceManager {
        &self.spaces
    }

    /// Mutable access to the space registry (for `dead_removal_allowed`
    /// toggles, §6.6).
    pub fn spaces_mut(&mut self) -> &mut SpaceManager {
        &mut self.spaces
    }

    // ---- arena accessors ----------------------------------------------

    /// Looks up a Varnode. Panics if `id` was never allocated; returns
    /// `None` if it has since been freed (callers walking the graph after
    /// a mutation must treat that as "this value is gone").
    pub fn varnode(&self, id: VarnodeId) -> Option<&Varnode> {
        self.varnodes.get(id.raw() as usize)?.as_ref()
    }

    /// Mutable Varnode access.
    pub fn varnode_mut(&mut self, id: VarnodeId) -> Option<&mut Varnode> {
        self.varnodes.get_mut(id.raw() as usize)?.as_mut()
    }

    /// Looks up an op by id.
    pub fn op(&self, id: OpId) -> Option<&PcodeOp> {
        self.ops.get(id.raw() as usize)?.as_ref()
    }

    /// Mutable op access.
    pub fn op_mut(&mut self, id: OpId) -> Option<&mut PcodeOp> {
        self.ops.get_mut(id.raw() as usize)?.as_mut()
    }

    /// Looks up a block by id.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.raw() as usize]
    }

    /// Mutable block access.
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.raw() as usize]
    }

    /// Allocates a fresh, empty basic block and returns its id.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::from_raw(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::default());
        id
    }

    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Current length of the op arena; ids `0..len` are either live, dead,
    /// or freed. Used by the rule scheduler to detect which ids were
    /// allocated during a rule invocation (spec §9: "ops created ... during
    /// a pass are appended to the appropriate bucket").
    pub fn op_arena_len(&self) -> usize {
        self.ops.len()
    }

    /// Iterates over all live (non-dead, arena-resident) op ids.
    pub fn live_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.ops.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref()
                .filter(|op| !op.is_dead())
                .map(|_| OpId::from_raw(i as u32))
        })
    }

    // ---- Varnode factory -------------------------------------------------

    fn alloc_varnode(&mut self, vn: Varnode) -> VarnodeId {
        let id = VarnodeId::from_raw(self.varnodes.len() as u32);
        self.varnodes.push(Some(vn));
        id
    }

    /// `new_constant(size, value)`: a Varnode in constant space whose
    /// offset is `value` masked to `size` bytes (spec §4.2).
    pub fn new_constant(&mut self, size: u32, value: u128) -> VarnodeId {
        let masked = value & calc_mask(size);
        let addr = Address::new(self.spaces.constant_space(), masked as u64);
        let mut vn = Varnode::new(addr, size, VarnodeFlags::CONSTANT);
        vn.nz_mask = masked;
        self.alloc_varnode(vn)
    }

    /// `new_unique_out(size, op)`: allocates a fresh internal-temporary
    /// Varnode as `op`'s output (spec §4.2).
    pub fn new_unique_out(&mut self, size: u32, op: OpId) -> VarnodeId {
        let offset = self.varnodes.len() as u64; // internal temps just need distinct offsets
        let addr = Address::new(self.spaces.unique_space(), offset);
        let vn = Varnode::new(addr, size, VarnodeFlags::WRITTEN);
        let id = self.alloc_varnode(vn);
        self.varnode_mut(id).unwrap().def = Some(op);
        self.set_output_unchecked(op, Some(id));
        id
    }

    /// `new_varnode_out(size, addr, op)`: allocates an addressable output
    /// at `addr` for `op` (spec §4.2). Used when the result must live at a
    /// specific, externally-visible location (`ADDR_TIED`).
    pub fn new_varnode_out(&mut self, size: u32, addr: Address, op: OpId) -> VarnodeId {
        let vn = Varnode::new(addr, size, VarnodeFlags::WRITTEN | VarnodeFlags::ADDR_TIED);
        let id = self.alloc_varnode(vn);
        self.varnode_mut(id).unwrap().def = Some(op);
        self.set_output_unchecked(op, Some(id));
        id
    }

    /// Allocates a free-floating input Varnode (used by test builders and
    /// by rules that need to materialize a pre-existing register/stack
    /// read that has no local def).
    pub fn new_input(&mut self, size: u32, addr: Address) -> VarnodeId {
        self.alloc_varnode(Varnode::new(addr, size, VarnodeFlags::INPUT))
    }

    fn set_output_unchecked(&mut self, op: OpId, output: Option<VarnodeId>) {
        if let Some(o) = self.op_mut(op) {
            o.output = output;
        }
    }

    /// Frees a Varnode if it is dead: no def and no descendants, and not
    /// `ADDR_TIED` (invariant: addr-tied Varnodes persist until their
    /// address itself is freed, spec §3.5 "Lifecycles").
    fn try_free_varnode(&mut self, id: VarnodeId) {
        let Some(vn) = self.varnode(id) else { return };
        if vn.def.is_none()
            && vn.descendants.is_empty()
            && !vn.flags.contains(VarnodeFlags::ADDR_TIED)
            && !vn.flags.contains(VarnodeFlags::INPUT)
        {
            self.varnodes[id.raw() as usize] = None;
        }
    }

    // ---- PcodeOp factory and wiring --------------------------------------

    /// `new_op(nin, addr)`: creates a detached op with `nin` empty input
    /// slots (spec §4.2).
    pub fn new_op(&mut self, opcode: OpCode, nin: usize, address: Address) -> OpId {
        let id = OpId::from_raw(self.ops.len() as u32);
        self.ops.push(Some(PcodeOp::new_detached(opcode, nin, address)));
        id
    }

    /// `op_set_opcode(op, code)`: re-tags an op. Caller must ensure
    /// arity/sizes still hold (spec §4.2); this call does not re-validate
    /// them, keeping this hot mutation path free of redundant checks the
    /// rule already performed.
    pub fn op_set_opcode(&mut self, op: OpId, code: OpCode) {
        if let Some(o) = self.op_mut(op) {
            o.opcode = code;
        }
    }

    /// `op_set_input(op, v, slot)`: re-wires input `slot` of `op` to read
    /// `v`, updating descendant sets on both the old and new Varnode
    /// (spec §4.2).
    pub fn op_set_input(&mut self, op: OpId, v: VarnodeId, slot: usize) {
        let old = self.op(op).and_then(|o| o.input(slot));
        if let Some(old_vn) = old {
            if let Some(vn) = self.varnode_mut(old_vn) {
                vn.remove_one_descendant(op);
            }
            self.try_free_varnode(old_vn);
        }
        if let Some(o) = self.op_mut(op) {
            if slot >= o.inputs.len() {
                o.inputs.resize(slot + 1, None);
            }
            o.inputs[slot] = Some(v);
        }
        if let Some(vn) = self.varnode_mut(v) {
            vn.add_descendant(op);
        }
    }

    /// `op_remove_input(op, slot)`: shrinks the input vector, shifting
    /// higher slots down (spec §4.2). Unlinks the removed input's
    /// descendant edge first.
    pub fn op_remove_input(&mut self, op: OpId, slot: usize) {
        let removed = self.op(op).and_then(|o| o.input(slot));
        if let Some(old_vn) = removed {
            if let Some(vn) = self.varnode_mut(old_vn) {
                vn.remove_one_descendant(op);
            }
            self.try_free_varnode(old_vn);
        }
        if let Some(o) = self.op_mut(op) {
            if slot < o.inputs.len() {
                o.inputs.remove(slot);
            }
        }
    }

    /// Appends a new trailing input slot set to `v`.
    pub fn op_append_input(&mut self, op: OpId, v: VarnodeId) {
        let slot = self.op(op).map(|o| o.inputs.len()).unwrap_or(0);
        self.op_set_input(op, v, slot);
    }

    /// `op_insert_begin(op, block)`: attaches `op` to the start of
    /// `block`'s op list (before any existing op), except that
    /// `MULTIEQUAL`s are sorted first among themselves (spec §4.2,
    /// §3.4 "ops have a sequence number giving a total order").
    pub fn op_insert_begin(&mut self, op: OpId, block: BlockId) {
        self.set_parent(op, block);
        let b = self.block_mut(block);
        b.ops.insert(0, op);
        self.renumber(block);
    }

    /// `op_insert_before(op, reference)`: attaches `op` immediately before
    /// `reference` in `reference`'s block.
    pub fn op_insert_before(&mut self, op: OpId, reference: OpId) {
        let block = self.op(reference).map(|o| o.parent).expect("reference op must be inserted");
        let pos = self.block(block).position_of(reference).expect("reference op must be in its parent block");
        self.set_parent(op, block);
        self.block_mut(block).ops.insert(pos, op);
        self.renumber(block);
    }

    /// `op_insert_after(op, reference)`: attaches `op` immediately after
    /// `reference`.
    pub fn op_insert_after(&mut self, op: OpId, reference: OpId) {
        let block = self.op(reference).map(|o| o.parent).expect("reference op must be inserted");
        let pos = self.block(block).position_of(reference).expect("reference op must be in its parent block");
        self.set_parent(op, block);
        self.block_mut(block).ops.insert(pos + 1, op);
        self.renumber(block);
    }

    fn set_parent(&mut self, op: OpId, block: BlockId) {
        if let Some(o) = self.op_mut(op) {
            o.parent = block;
        }
    }

    fn renumber(&mut self, block: BlockId) {
        let ops = self.block(block).ops.clone();
        for (i, op) in ops.into_iter().enumerate() {
            if let Some(o) = self.op_mut(op) {
                o.seq = i as u32;
            }
        }
    }

    /// `op_uninsert(op)`: detaches `op` from its block while preserving
    /// its input/output edges (spec §4.2).
    pub fn op_uninsert(&mut self, op: OpId) {
        let Some(block) = self.op(op).map(|o| o.parent) else { return };
        self.block_mut(block).ops.retain(|&o| o != op);
        self.renumber(block);
    }

    /// `op_destroy(op)`: unlinks all of `op`'s input/output edges and
    /// marks it dead; arena-reclaimed at end-of-pass via [`Self::gc`]
    /// (spec §4.2, §5).
    pub fn op_destroy(&mut self, op: OpId) {
        let nin = self.op(op).map(|o| o.inputs.len()).unwrap_or(0);
        for slot in (0..nin).rev() {
            self.op_remove_input(op, slot);
        }
        if let Some(out) = self.op(op).and_then(|o| o.output) {
            if let Some(vn) = self.varnode_mut(out) {
                vn.def = None;
                vn.flags.insert(VarnodeFlags::FREE);
            }
            self.try_free_varnode(out);
        }
        self.op_uninsert(op);
        if let Some(o) = self.op_mut(op) {
            o.output = None;
            o.flags.insert(OpFlags::DEAD);
        }
        self.pending_dead.push(op);
    }

    /// Reclaims ops destroyed during the pass that just ended. Called by
    /// the scheduler between passes, never mid-pass (spec §5: dead ops
    /// must remain reachable-but-flagged for the remainder of the pass
    /// that destroyed them).
    pub fn gc(&mut self) {
        for op in self.pending_dead.drain(..) {
            self.ops[op.raw() as usize] = None;
        }
    }

    /// `total_replace(old, new)`: rewires every descendant of `old` to
    /// read `new` instead; `old` becomes unreachable (spec §4.2).
    pub fn total_replace(&mut self, old: VarnodeId, new: VarnodeId) {
        let descendants: SmallVec<[OpId; 4]> = self
            .varnode(old)
            .map(|v| v.descendants.iter().copied().collect())
            .unwrap_or_default();
        for op in descendants {
            let Some(pcode_op) = self.op(op) else { continue };
            let slots: SmallVec<[usize; 2]> = pcode_op
                .inputs
                .iter()
                .enumerate()
                .filter_map(|(i, v)| (*v == Some(old)).then_some(i))
                .collect();
            for slot in slots {
                self.op_set_input(op, new, slot);
            }
        }
    }

    /// `cse_eliminate_list(pairs, out)`: given candidate `(OpId, OpId)`
    /// pairs already hashed as syntactically identical by the caller,
    /// collapses each duplicate pair by `total_replace`-ing the second
    /// op's output with the first's and destroying the second op.
    /// Returns the surviving op for each input pair.
    ///
    /// The real hash (`getCseHash`) that groups candidates is an external
    /// concern the lifter owns (spec §9 open question); this function
    /// only performs the collapse once candidates are already paired.
    pub fn cse_eliminate_list(&mut self, pairs: &[(OpId, OpId)]) -> Vec<OpId> {
        let mut survivors = Vec::with_capacity(pairs.len());
        for &(keep, remove) in pairs {
            if keep == remove {
                survivors.push(keep);
                continue;
            }
            let (keep_out, remove_out) = (
                self.op(keep).and_then(|o| o.output),
                self.op(remove).and_then(|o| o.output),
            );
            if let (Some(k), Some(r)) = (keep_out, remove_out) {
                self.total_replace(r, k);
            }
            self.op_destroy(remove);
            survivors.push(keep);
        }
        survivors
    }

    /// `new_indirect_creation(target, addr, size, possible_out)`: inserts
    /// a fresh `INDIRECT` immediately before `target` representing a
    /// value created by `target`'s effect (spec §4.2).
    pub fn new_indirect_creation(
        &mut self,
        target: OpId,
        addr: Address,
        size: u32,
        possible_out: bool,
    ) -> OpId {
        let source_addr = self.op(target).map(|o| o.address).unwrap_or(addr);
        let indirect = self.new_op(OpCode::Indirect, 2, source_addr);
        let zero_in = self.new_constant(size, 0);
        self.op_set_input(indirect, zero_in, 0);
        let iop = self.new_iop_reference(target);
        self.op_set_input(indirect, iop, 1);
        if possible_out {
            self.new_varnode_out(size, addr, indirect);
        } else {
            self.new_unique_out(size, indirect);
        }
        if let Some(o) = self.op_mut(indirect) {
            o.flags.insert(OpFlags::INDIRECT_CREATION);
        }
        if let Some(o) = self.op_mut(target) {
            o.flags.insert(OpFlags::INDIRECT_SOURCE);
        }
        self.op_insert_before(indirect, target);
        indirect
    }

    /// Builds the IOP-space constant encoding a pointer to `op`, for use
    /// as `INDIRECT`'s second input (invariant P5).
    fn new_iop_reference(&mut self, op: OpId) -> VarnodeId {
        let space = self
            .spaces
            .spaces()
            .iter()
            .find(|s| s.space_type == pcode_types::space::AddressSpaceType::Iop)
            .map(|s| s.id)
            .unwrap_or_else(|| self.spaces.constant_space());
        let addr = Address::new(space, op.raw() as u64);
        self.alloc_varnode(Varnode::new(addr, 8, VarnodeFlags::CONSTANT))
    }

    /// `distribute_int_mult_add(mult_op)`: rewrites `(a+b)*c` into
    /// `a*c + b*c` (spec §4.2). Returns `false` without mutating anything
    /// if `mult_op` does not match that shape.
    pub fn distribute_int_mult_add(&mut self, mult_op: OpId) -> bool {
        let Some(op) = self.op(mult_op) else { return false };
        if op.opcode != OpCode::IntMult || op.inputs.len() != 2 {
            return false;
        }
        let (Some(in0), Some(in1)) = (op.input(0), op.input(1)) else {
            return false;
        };
        let size = match op.output.and_then(|o| self.varnode(o)).map(|v| v.size) {
            Some(s) => s,
            None => return false,
        };
        let address = op.address;

        let (add_vn, const_vn) = match (self.varnode(in0), self.varnode(in1)) {
            (Some(v0), Some(v1)) if v1.is_constant() && v0.def.is_some() => (in0, in1),
            (Some(v0), Some(v1)) if v0.is_constant() && v1.def.is_some() => (in1, in0),
            _ => return false,
        };
        let add_op = match self.varnode(add_vn).and_then(|v| v.def) {
            Some(def_op) if self.op(def_op).map(|o| o.opcode) == Some(OpCode::IntAdd) => def_op,
            _ => return false,
        };
        let Some(add) = self.op(add_op) else { return false };
        if add.inputs.len() != 2 {
            return false;
        }
        let (Some(a), Some(b)) = (add.input(0), add.input(1)) else {
            return false;
        };

        let mult_a = self.new_op(OpCode::IntMult, 2, address);
        self.op_set_input(mult_a, a, 0);
        self.op_set_input(mult_a, const_vn, 1);
        let out_a = self.new_unique_out(size, mult_a);

        let mult_b = self.new_op(OpCode::IntMult, 2, address);
        self.op_set_input(mult_b, b, 0);
        self.op_set_input(mult_b, const_vn, 1);
        let out_b = self.new_unique_out(size, mult_b);

        let new_add = self.new_op(OpCode::IntAdd, 2, address);
        self.op_set_input(new_add, out_a, 0);
        self.op_set_input(new_add, out_b, 1);
        let new_out = self.new_unique_out(size, new_add);

        self.op_insert_before(mult_a, mult_op);
        self.op_insert_before(mult_b, mult_op);
        self.op_insert_before(new_add, mult_op);

        if let Some(old_out) = self.op(mult_op).and_then(|o| o.output) {
            self.total_replace(old_out, new_out);
        }
        self.op_destroy(mult_op);
        trace!(op = %mult_op, "distribute_int_mult_add fired");
        true
    }

    /// `collapse_int_mult_mult(vn)`: collapses `(x*c)*d -> x*(c*d)` (spec
    /// §4.2). Returns the new product Varnode, or `None` if `vn` is not
    /// the output of such a nested multiply.
    pub fn collapse_int_mult_mult(&mut self, vn: VarnodeId) -> Option<VarnodeId> {
        let outer_def = self.varnode(vn)?.def?;
        let outer = self.op(outer_def)?;
        if outer.opcode != OpCode::IntMult || outer.inputs.len() != 2 {
            return None;
        }
        let size = self.varnode(vn)?.size;
        let address = outer.address;
        let (Some(in0), Some(in1)) = (outer.input(0), outer.input(1)) else {
            return None;
        };
        let (inner_vn, outer_const) = match (self.varnode(in0)?, self.varnode(in1)?) {
            (v0, v1) if v1.is_constant() && v0.def.is_some() => (in0, in1),
            (v0, v1) if v0.is_constant() && v1.def.is_some() => (in1, in0),
            _ => return None,
        };
        let inner_def = self.varnode(inner_vn)?.def?;
        let inner = self.op(inner_def)?;
        if inner.opcode != OpCode::IntMult || inner.inputs.len() != 2 {
            return None;
        }
        let (Some(iin0), Some(iin1)) = (inner.input(0), inner.input(1)) else {
            return None;
        };
        let (base_vn, inner_const) = match (self.varnode(iin0)?, self.varnode(iin1)?) {
            (v0, v1) if v1.is_constant() => (iin0, iin1),
            (v0, v1) if v0.is_constant() => (iin1, iin0),
            _ => return None,
        };
        let c = self.varnode(outer_const)?.constant_value()?;
        let d = self.varnode(inner_const)?.constant_value()?;
        let folded = c.wrapping_mul(d) & calc_mask(size);

        let folded_vn = self.new_constant(size, folded);
        let new_mult = self.new_op(OpCode::IntMult, 2, address);
        self.op_set_input(new_mult, base_vn, 0);
        self.op_set_input(new_mult, folded_vn, 1);
        let new_out = self.new_unique_out(size, new_mult);
        self.op_insert_before(new_mult, outer_def);
        self.total_replace(vn, new_out);
        self.op_destroy(outer_def);
        trace!(vn = %vn, "collapse_int_mult_mult fired");
        Some(new_out)
    }

    /// `op_undo_ptradd(op, keep_base)`: turns a `PTRADD` back into
    /// `INT_ADD` (plus `INT_MULT` if the element size is not 1), spec
    /// §4.2. `keep_base` selects whether the base or the index operand is
    /// written to input slot 0 of the resulting `INT_ADD` — it has no
    /// arithmetic effect, only an ordering one, mirroring how downstream
    /// pointer-arithmetic rules prefer the base operand in a fixed slot.
    pub fn op_undo_ptradd(&mut self, op: OpId, keep_base: bool) -> Result<(), IrError> {
        let Some(pcode_op) = self.op(op) else {
            return Ok(());
        };
        if pcode_op.opcode != OpCode::PtrAdd || pcode_op.inputs.len() != 3 {
            return Err(IrError::InvariantViolation {
                op,
                address: pcode_op.address,
                detail: "op_undo_ptradd requires a 3-input PTRADD".into(),
            });
        }
        let (Some(base), Some(index), Some(elsize_vn)) =
            (pcode_op.input(0), pcode_op.input(1), pcode_op.input(2))
        else {
            return Ok(());
        };
        let size = pcode_op
            .output
            .and_then(|o| self.varnode(o))
            .map(|v| v.size)
            .unwrap_or(0);
        let address = pcode_op.address;
        let elsize = self.varnode(elsize_vn).and_then(|v| v.constant_value()).unwrap_or(1);

        self.op_remove_input(op, 2);

        let scaled_index = if elsize > 1 {
            let mult = self.new_op(OpCode::IntMult, 2, address);
            self.op_set_input(mult, index, 0);
            let c = self.new_constant(size, elsize);
            self.op_set_input(mult, c, 1);
            let out = self.new_unique_out(size, mult);
            self.op_insert_before(mult, op);
            out
        } else {
            index
        };

        self.op_set_opcode(op, OpCode::IntAdd);
        if keep_base {
            self.op_set_input(op, base, 0);
            self.op_set_input(op, scaled_index, 1);
        } else {
            self.op_set_input(op, scaled_index, 0);
            self.op_set_input(op, base, 1);
        }
        trace!(op = %op, "op_undo_ptradd fired");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TestFunctionBuilder;

    #[test]
    fn new_constant_masks_to_size() {
        let (mut fd, _, _) = TestFunctionBuilder::build();
        let c = fd.new_constant(1, 0x1FF);
        assert_eq!(fd.varnode(c).unwrap().constant_value(), Some(0xFF));
    }

    #[test]
    fn op_set_input_maintains_def_use_consistency() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_constant(4, 1);
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, b, 1);
        let out = fd.new_unique_out(4, op);

        assert_eq!(fd.op(op).unwrap().output, Some(out));
        assert!(fd.varnode(a).unwrap().descendants.contains(&op));
        assert!(fd.varnode(b).unwrap().descendants.contains(&op));
    }

    #[test]
    fn total_replace_rewires_every_descendant() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let op1 = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op1, block);
        fd.op_set_input(op1, a, 0);
        let c1 = fd.new_constant(4, 1);
        fd.op_set_input(op1, c1, 1);
        let out1 = fd.new_unique_out(4, op1);

        let op2 = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op2, block);
        fd.op_set_input(op2, out1, 0);
        fd.op_set_input(op2, out1, 1); // same varnode twice: multiset descendant

        let replacement = fd.new_constant(4, 42);
        fd.total_replace(out1, replacement);

        assert_eq!(fd.op(op2).unwrap().input(0), Some(replacement));
        assert_eq!(fd.op(op2).unwrap().input(1), Some(replacement));
        assert!(fd.varnode(out1).is_none(), "old varnode should be freed once dangling");
    }

    #[test]
    fn op_destroy_unlinks_inputs_and_frees_dead_output() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        let c = fd.new_constant(4, 1);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, c, 1);
        let out = fd.new_unique_out(4, op);

        fd.op_destroy(op);
        assert!(fd.op(op).unwrap().is_dead());
        assert!(fd.varnode(a).unwrap().descendants.is_empty());
        assert!(fd.block(block).ops.is_empty());
        fd.gc();
        assert!(fd.op(op).is_none());
        let _ = out;
    }

    #[test]
    fn distribute_int_mult_add_matches_spec_rewrite() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));
        let add = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(add, block);
        fd.op_set_input(add, a, 0);
        fd.op_set_input(add, b, 1);
        let add_out = fd.new_unique_out(4, add);

        let mult = fd.new_op(OpCode::IntMult, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(mult, add);
        fd.op_set_input(mult, add_out, 0);
        let c = fd.new_constant(4, 3);
        fd.op_set_input(mult, c, 1);
        let _mult_out = fd.new_unique_out(4, mult);

        assert!(fd.distribute_int_mult_add(mult));
        // the block should now contain the original add plus three new ops
        // (mult_a, mult_b, new_add), with the old mult gone.
        let live: Vec<_> = fd.block(block).ops.clone();
        assert_eq!(live.len(), 4);
        assert!(fd.op(mult).unwrap().is_dead());
        let mult_count = live
            .iter()
            .filter(|&&op| fd.op(op).unwrap().opcode == OpCode::IntMult)
            .count();
        assert_eq!(mult_count, 2, "expected exactly mult_a and mult_b to survive");
    }

    #[test]
    fn op_undo_ptradd_with_unit_elsize_becomes_plain_add() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let idx = fd.new_input(8, TestFunctionBuilder::addr(reg, 8));
        let elsize = fd.new_constant(8, 1);
        let op = fd.new_op(OpCode::PtrAdd, 3, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, idx, 1);
        fd.op_set_input(op, elsize, 2);
        let _out = fd.new_unique_out(8, op);

        fd.op_undo_ptradd(op, true).unwrap();
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntAdd);
        assert_eq!(rewritten.inputs.len(), 2);
    }

    #[test]
    fn op_undo_ptradd_with_scaled_elsize_inserts_multiply() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let idx = fd.new_input(8, TestFunctionBuilder::addr(reg, 8));
        let elsize = fd.new_constant(8, 4);
        let op = fd.new_op(OpCode::PtrAdd, 3, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, idx, 1);
        fd.op_set_input(op, elsize, 2);
        let _out = fd.new_unique_out(8, op);

        fd.op_undo_ptradd(op, true).unwrap();
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntAdd);
        let mult_input = rewritten.input(1).unwrap();
        let mult_def = fd.varnode(mult_input).unwrap().def.unwrap();
        assert_eq!(fd.op(mult_def).unwrap().opcode, OpCode::IntMult);
    }
}
