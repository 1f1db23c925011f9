//! Structured-data reconstruction (spec §4.4 "Structured data").

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpFlags,
    OpId,
    VarnodeFlags,
    VarnodeId,
};

use crate::engine::{
    context::{
        RuleContext,
        TypeKey,
    },
    rule::{
        OpList,
        Rule,
    },
};

use super::util::{
    const_value,
    replace_with_copy,
};

/// Appends `new_op` to the end of `block`, before its terminator if it has
/// one already (a branch/return/call always ends a block's live range).
fn append_end_of_block(fd: &mut FunctionData, block: pcode_ir::BlockId, new_op: OpId) {
    let ops = fd.block(block).ops.clone();
    let Some(&last) = ops.last() else {
        fd.op_insert_begin(new_op, block);
        return;
    };
    let is_terminator = matches!(
        fd.op(last).map(|o| o.opcode),
        Some(
            OpCode::Branch
                | OpCode::CBranch
                | OpCode::BranchInd
                | OpCode::Return
                | OpCode::Call
                | OpCode::CallInd
        )
    );
    if is_terminator {
        fd.op_insert_before(new_op, last);
    } else {
        fd.op_insert_after(new_op, last);
    }
}

/// Pushes a narrow bitwise/arithmetic op through two matching
/// zero-extensions: `ZEXT(a) op ZEXT(b) -> ZEXT(a op b)` when the narrow
/// result cannot overflow into the extended bits (spec §4.4
/// `extension_push`).
pub struct ExtensionPush;

impl Rule for ExtensionPush {
    fn name(&self) -> &'static str {
        "extension_push"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntAnd, OpCode::IntOr, OpCode::IntXor])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(a), Some(b)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let opcode = pcode_op.opcode;

        let Some(a_def) = fd.varnode(a).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(b_def) = fd.varnode(b).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(a_op) = fd.op(a_def) else {
            return Ok(0);
        };
        let Some(b_op) = fd.op(b_def) else {
            return Ok(0);
        };
        if a_op.opcode != OpCode::IntZext || b_op.opcode != OpCode::IntZext {
            return Ok(0);
        }
        let Some(ax) = a_op.input(0) else {
            return Ok(0);
        };
        let Some(bx) = b_op.input(0) else {
            return Ok(0);
        };
        let ax_size = fd.varnode(ax).map(|v| v.size).unwrap_or(0);
        let bx_size = fd.varnode(bx).map(|v| v.size).unwrap_or(0);
        if ax_size == 0 || ax_size != bx_size || ax_size >= out_size {
            return Ok(0);
        }

        let address = pcode_op.address;
        let inner = fd.new_op(opcode, 2, address);
        fd.op_set_input(inner, ax, 0);
        fd.op_set_input(inner, bx, 1);
        let inner_out = fd.new_unique_out(ax_size, inner);
        fd.op_insert_before(inner, op);

        fd.op_set_opcode(op, OpCode::IntZext);
        fd.op_remove_input(op, 1);
        fd.op_set_input(op, inner_out, 0);
        Ok(1)
    }
}

/// Marks the root of a `PIECE` tree that reconstructs a value the type
/// factory says must be rebuilt field-by-field rather than read as a
/// scalar, and marks every Varnode in that tree so later rules leave it
/// alone (spec §4.4 `piece_structure`, `OpFlags::PARTIAL_ROOT`,
/// `VarnodeFlags::PROTO_PARTIAL`).
pub struct PieceStructure;

impl Rule for PieceStructure {
    fn name(&self) -> &'static str {
        "piece_structure"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Piece])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(types) = ctx.types else {
            return Ok(0);
        };
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.flags.contains(OpFlags::PARTIAL_ROOT) {
            return Ok(0);
        }
        let Some(out) = pcode_op.output else {
            return Ok(0);
        };
        let is_nested = fd
            .varnode(out)
            .map(|v| {
                v.descendants
                    .iter()
                    .any(|&d| fd.op(d).map(|o| o.opcode) == Some(OpCode::Piece))
            })
            .unwrap_or(false);
        if is_nested {
            return Ok(0);
        }
        let Some(out_vn) = fd.varnode(out) else {
            return Ok(0);
        };
        let key = TypeKey {
            space: out_vn.address.space.0,
            offset: out_vn.address.offset,
        };
        let Some(datatype) = types.lookup(key) else {
            return Ok(0);
        };
        if !datatype.is_piece_structured() {
            return Ok(0);
        }

        if let Some(o) = fd.op_mut(op) {
            o.flags.insert(OpFlags::PARTIAL_ROOT);
        }
        let mut touched = 1usize;
        let mut stack = vec![op];
        while let Some(cur) = stack.pop() {
            let Some(cur_op) = fd.op(cur) else {
                continue;
            };
            if cur_op.opcode != OpCode::Piece {
                continue;
            }
            let inputs: Vec<VarnodeId> = cur_op.inputs.iter().flatten().copied().collect();
            for in_vn in inputs {
                let already_marked = fd
                    .varnode(in_vn)
                    .map(|v| v.flags.contains(VarnodeFlags::PROTO_PARTIAL))
                    .unwrap_or(true);
                if let Some(v) = fd.varnode_mut(in_vn) {
                    v.flags.insert(VarnodeFlags::PROTO_PARTIAL);
                }
                if !already_marked {
                    touched += 1;
                }
                if let Some(def) = fd.varnode(in_vn).and_then(|v| v.def) {
                    stack.push(def);
                }
            }
        }
        Ok(touched)
    }
}

/// Hoists a unary op above a `MULTIEQUAL` when every incoming branch
/// computes the same op over a differing operand:
/// `MULTIEQUAL(ZEXT(a1), ZEXT(a2), ...) -> ZEXT(MULTIEQUAL(a1, a2, ...))`.
/// Collapses the duplicated per-branch computation into one, downstream of
/// the merge, for `INT_ZEXT`/`INT_SEXT`/`INT_2COMP`/`INT_NEGATE` (spec
/// §4.4 `push_multi`).
pub struct PushMulti;

impl Rule for PushMulti {
    fn name(&self) -> &'static str {
        "push_multi"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::MultiEqual])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        let n = pcode_op.inputs.len();
        if n < 2 {
            return Ok(0);
        }
        let block = pcode_op.parent;
        let address = pcode_op.address;

        let mut common_opcode = None;
        let mut inners = Vec::with_capacity(n);
        for slot in 0..n {
            let Some(in_vn) = pcode_op.input(slot) else {
                return Ok(0);
            };
            let Some(def) = fd.varnode(in_vn).and_then(|v| v.def) else {
                return Ok(0);
            };
            let Some(def_op) = fd.op(def) else {
                return Ok(0);
            };
            if def_op.inputs.len() != 1
                || !matches!(
                    def_op.opcode,
                    OpCode::IntZext | OpCode::IntSext | OpCode::Int2Comp | OpCode::IntNegate
                )
            {
                return Ok(0);
            }
            match common_opcode {
                None => common_opcode = Some(def_op.opcode),
                Some(c) if c == def_op.opcode => {}
                _ => return Ok(0),
            }
            let Some(inner) = def_op.input(0) else {
                return Ok(0);
            };
            inners.push(inner);
        }
        let Some(opcode) = common_opcode else {
            return Ok(0);
        };
        let inner_size = fd.varnode(inners[0]).map(|v| v.size).unwrap_or(0);
        if inner_size == 0
            || inners
                .iter()
                .any(|&v| fd.varnode(v).map(|vv| vv.size) != Some(inner_size))
        {
            return Ok(0);
        }

        let new_phi = fd.new_op(OpCode::MultiEqual, n, address);
        fd.op_insert_begin(new_phi, block);
        for (slot, &inner) in inners.iter().enumerate() {
            fd.op_set_input(new_phi, inner, slot);
        }
        let phi_out = fd.new_unique_out(inner_size, new_phi);

        for slot in (1..n).rev() {
            fd.op_remove_input(op, slot);
        }
        fd.op_set_input(op, phi_out, 0);
        fd.op_set_opcode(op, opcode);
        Ok(1)
    }
}

/// The dual of [`PushMulti`]: pulls a `SUBPIECE` through a `MULTIEQUAL` so
/// each incoming branch narrows its own value instead of the merge
/// producing a full-width result that's immediately truncated —
/// `SUBPIECE(MULTIEQUAL(a1, a2, ...), off) -> MULTIEQUAL(SUBPIECE(a1, off),
/// SUBPIECE(a2, off), ...)` (spec §4.4 `pullsub_multi`).
pub struct PullsubMulti;

impl Rule for PullsubMulti {
    fn name(&self) -> &'static str {
        "pullsub_multi"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::SubPiece])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(src), Some(off_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(offset) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let off_size = fd.varnode(off_vn).map(|v| v.size).unwrap_or(1);
        let address = pcode_op.address;

        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(def_op) = fd.op(def) else {
            return Ok(0);
        };
        if def_op.opcode != OpCode::MultiEqual {
            return Ok(0);
        }
        let n = def_op.inputs.len();
        if n < 2 {
            return Ok(0);
        }
        let phi_block = def_op.parent;
        let predecessors = fd.block(phi_block).predecessors.clone();
        if predecessors.len() != n {
            return Ok(0);
        }
        let Some(branch_inputs) = (0..n)
            .map(|i| def_op.input(i))
            .collect::<Option<Vec<_>>>()
        else {
            return Ok(0);
        };

        let mut new_inputs = Vec::with_capacity(n);
        for i in 0..n {
            let sub = fd.new_op(OpCode::SubPiece, 2, address);
            append_end_of_block(fd, predecessors[i], sub);
            fd.op_set_input(sub, branch_inputs[i], 0);
            let off_const = fd.new_constant(off_size, offset);
            fd.op_set_input(sub, off_const, 1);
            let sub_out = fd.new_unique_out(out_size, sub);
            new_inputs.push(sub_out);
        }

        let new_phi = fd.new_op(OpCode::MultiEqual, n, address);
        fd.op_insert_begin(new_phi, phi_block);
        for (i, &v) in new_inputs.iter().enumerate() {
            fd.op_set_input(new_phi, v, i);
        }
        let phi_out = fd.new_unique_out(out_size, new_phi);

        Ok(replace_with_copy(fd, op, phi_out))
    }
}

/// Pulls a `SUBPIECE` through an `INDIRECT` effect barrier, narrowing what
/// the barrier covers instead of computing the full-width indirect value
/// just to truncate it immediately after: `SUBPIECE(INDIRECT(a, iop), off)
/// -> INDIRECT(SUBPIECE(a, off), iop)` (spec §4.4 `pullsub_indirect`).
pub struct PullsubIndirect;

impl Rule for PullsubIndirect {
    fn name(&self) -> &'static str {
        "pullsub_indirect"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::SubPiece])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        _ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(src), Some(off_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(offset) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let off_size = fd.varnode(off_vn).map(|v| v.size).unwrap_or(1);
        let address = pcode_op.address;

        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(def_op) = fd.op(def) else {
            return Ok(0);
        };
        if def_op.opcode != OpCode::Indirect {
            return Ok(0);
        }
        let (Some(value_in), Some(iop_in)) = (def_op.input(0), def_op.input(1)) else {
            return Ok(0);
        };

        let new_sub = fd.new_op(OpCode::SubPiece, 2, address);
        fd.op_insert_before(new_sub, def);
        fd.op_set_input(new_sub, value_in, 0);
        let new_off = fd.new_constant(off_size, offset);
        fd.op_set_input(new_sub, new_off, 1);
        let sub_out = fd.new_unique_out(out_size, new_sub);

        let new_indirect = fd.new_op(OpCode::Indirect, 2, address);
        fd.op_insert_after(new_indirect, new_sub);
        fd.op_set_input(new_indirect, sub_out, 0);
        fd.op_set_input(new_indirect, iop_in, 1);
        let new_out = fd.new_unique_out(out_size, new_indirect);
        if let Some(o) = fd.op_mut(new_indirect) {
            o.flags.insert(OpFlags::INDIRECT_CREATION);
        }

        Ok(replace_with_copy(fd, op, new_out))
    }
}
