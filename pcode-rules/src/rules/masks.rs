//! Mask and zero/sign-extension rules (spec §4.4 "Masks and extensions").
//!
//! `SUBPIECE`'s second input is a byte offset counted from the
//! least-significant byte of the source (real Ghidra semantics): the
//! output is `(source >> (offset*8))` truncated to the output Varnode's
//! own size. Every `sub_*` rule below is written against that convention.

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpId,
};
use pcode_types::mask::calc_mask;

use crate::engine::{
    context::RuleContext,
    rule::{
        OpList,
        Rule,
    },
};

use super::util::{
    const_value,
    fold_to_constant,
    replace_with_copy,
};

/// Drops an `AND` against a constant mask that already covers every bit
/// the masked value could possibly have set (spec §4.4 `and_mask`,
/// driven by `nz_mask`).
pub struct AndMask;

impl Rule for AndMask {
    fn name(&self) -> &'static str {
        "and_mask"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntAnd])
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
        for (value, mask_vn) in [(a, b), (b, a)] {
            let Some(mask) = const_value(fd, mask_vn) else {
                continue;
            };
            let Some(nz) = fd.varnode(value).map(|v| v.nz_mask) else {
                continue;
            };
            if nz & !mask == 0 {
                return Ok(replace_with_copy(fd, op, value));
            }
        }
        Ok(0)
    }
}

/// Dual of [`AndMask`]: an `OR` against a constant mask that already
/// covers every bit the other operand could possibly contribute
/// collapses to the constant outright, since nothing the value supplies
/// can change the result (spec §4.4 `or_mask`).
pub struct OrMask;

impl Rule for OrMask {
    fn name(&self) -> &'static str {
        "or_mask"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntOr])
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
        for (value, mask_vn) in [(a, b), (b, a)] {
            let Some(mask) = const_value(fd, mask_vn) else {
                continue;
            };
            let Some(nz) = fd.varnode(value).map(|v| v.nz_mask) else {
                continue;
            };
            if nz & !mask == 0 {
                return Ok(fold_to_constant(fd, op, mask));
            }
        }
        Ok(0)
    }
}

/// Folds `(x | c1) | c2` into `x | (c1 | c2)` (spec §4.4 `or_collapse`).
pub struct OrCollapse;

impl Rule for OrCollapse {
    fn name(&self) -> &'static str {
        "or_collapse"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntOr])
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
        for (inner_vn, outer_const) in [(a, b), (b, a)] {
            let Some(c2) = const_value(fd, outer_const) else {
                continue;
            };
            let Some(def) = fd.varnode(inner_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(inner) = fd.op(def) else {
                continue;
            };
            if inner.opcode != OpCode::IntOr || inner.inputs.len() != 2 {
                continue;
            }
            let (Some(ia), Some(ib)) = (inner.input(0), inner.input(1)) else {
                continue;
            };
            let (base, c1) = match (const_value(fd, ia), const_value(fd, ib)) {
                (Some(c1), None) => (ib, c1),
                (None, Some(c1)) => (ia, c1),
                _ => continue,
            };
            let size = pcode_op
                .output
                .and_then(|v| fd.varnode(v))
                .map(|v| v.size)
                .unwrap_or(0);
            let combined = (c1 | c2) & calc_mask(size);
            let new_const = fd.new_constant(size, combined);
            fd.op_set_input(op, base, 0);
            fd.op_set_input(op, new_const, 1);
            return Ok(1);
        }
        Ok(0)
    }
}

/// Absorption: `OR(a, AND(a, b)) -> a` (spec §4.4 `or_consume`, driven by
/// `consume_mask`: whatever `AND(a, b)` could contribute is already a
/// subset of what `a` itself contributes).
pub struct OrConsume;

impl Rule for OrConsume {
    fn name(&self) -> &'static str {
        "or_consume"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntOr])
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
        for (plain, andish) in [(a, b), (b, a)] {
            let Some(def) = fd.varnode(andish).and_then(|v| v.def) else {
                continue;
            };
            let Some(and_op) = fd.op(def) else {
                continue;
            };
            if and_op.opcode != OpCode::IntAnd || and_op.inputs.len() != 2 {
                continue;
            }
            let (Some(x), Some(y)) = (and_op.input(0), and_op.input(1)) else {
                continue;
            };
            if x == plain || y == plain {
                return Ok(replace_with_copy(fd, op, plain));
            }
        }
        Ok(0)
    }
}

/// `PIECE(0, x) -> ZEXT(x)`: a concatenation whose high half is the
/// constant zero is exactly a zero-extension (spec §4.4 `piece2zext`).
pub struct Piece2Zext;

impl Rule for Piece2Zext {
    fn name(&self) -> &'static str {
        "piece2zext"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Piece])
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
        let Some(hi) = pcode_op.input(0) else {
            return Ok(0);
        };
        if const_value(fd, hi) != Some(0) {
            return Ok(0);
        }
        fd.op_remove_input(op, 0);
        fd.op_set_opcode(op, OpCode::IntZext);
        Ok(1)
    }
}

/// `PIECE(SRIGHT(x, size*8-1), x) -> SEXT(x)`: the high half is exactly
/// the sign-bit broadcast of the low half (spec §4.4 `piece2sext`).
pub struct Piece2Sext;

impl Rule for Piece2Sext {
    fn name(&self) -> &'static str {
        "piece2sext"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Piece])
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
        let (Some(hi), Some(lo)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let lo_size = fd.varnode(lo).map(|v| v.size).unwrap_or(0);
        let Some(hi_def) = fd.varnode(hi).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(hi_op) = fd.op(hi_def) else {
            return Ok(0);
        };
        if hi_op.opcode != OpCode::IntSRight || hi_op.inputs.len() != 2 {
            return Ok(0);
        }
        let Some(shifted) = hi_op.input(0) else {
            return Ok(0);
        };
        if shifted != lo {
            return Ok(0);
        }
        let Some(amount_vn) = hi_op.input(1) else {
            return Ok(0);
        };
        let Some(amount) = const_value(fd, amount_vn) else {
            return Ok(0);
        };
        if lo_size == 0 || amount as u32 != lo_size * 8 - 1 {
            return Ok(0);
        }
        fd.op_remove_input(op, 0);
        fd.op_set_opcode(op, OpCode::IntSext);
        Ok(1)
    }
}

/// Drops a `ZEXT`/`SEXT` whose input already occupies the full output
/// width (spec §4.4 `zext_eliminate`).
pub struct ZextEliminate;

impl Rule for ZextEliminate {
    fn name(&self) -> &'static str {
        "zext_eliminate"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntZext, OpCode::IntSext])
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
        let Some(input) = pcode_op.input(0) else {
            return Ok(0);
        };
        let Some(out) = pcode_op.output else {
            return Ok(0);
        };
        let in_size = fd.varnode(input).map(|v| v.size).unwrap_or(0);
        let out_size = fd.varnode(out).map(|v| v.size).unwrap_or(0);
        if in_size != 0 && in_size == out_size {
            return Ok(replace_with_copy(fd, op, input));
        }
        Ok(0)
    }
}

/// `AND(ZEXT(x), c) -> ZEXT(AND(x, c'))`: a mask applied after widening
/// can be applied to the narrow value first, since the widened bits are
/// already zero (spec §4.4 `and_zext`).
pub struct AndZext;

impl Rule for AndZext {
    fn name(&self) -> &'static str {
        "and_zext"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntAnd])
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
        for (zext_vn, mask_vn) in [(a, b), (b, a)] {
            let Some(mask) = const_value(fd, mask_vn) else {
                continue;
            };
            let Some(def) = fd.varnode(zext_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(zext) = fd.op(def) else {
                continue;
            };
            if zext.opcode != OpCode::IntZext {
                continue;
            }
            let Some(x) = zext.input(0) else {
                continue;
            };
            let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
            if x_size == 0 {
                continue;
            }
            let address = pcode_op.address;
            let narrow_mask = fd.new_constant(x_size, mask & calc_mask(x_size));
            let and_inner = fd.new_op(OpCode::IntAnd, 2, address);
            fd.op_set_input(and_inner, x, 0);
            fd.op_set_input(and_inner, narrow_mask, 1);
            let inner_out = fd.new_unique_out(x_size, and_inner);
            fd.op_insert_before(and_inner, op);

            fd.op_remove_input(op, 1);
            fd.op_set_opcode(op, OpCode::IntZext);
            fd.op_set_input(op, inner_out, 0);
            return Ok(1);
        }
        Ok(0)
    }
}

/// `SUBPIECE(ZEXT(x), off) -> SUBPIECE(x, off)` (or to a zero constant if
/// `off` reaches entirely into the zero-filled high bits), since the
/// widened bits contribute nothing a narrower extraction can observe
/// (spec §4.4 `sub_zext`).
pub struct SubZext;

impl Rule for SubZext {
    fn name(&self) -> &'static str {
        "sub_zext"
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
        let Some(off) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(zext) = fd.op(def) else {
            return Ok(0);
        };
        if zext.opcode != OpCode::IntZext {
            return Ok(0);
        }
        let Some(x) = zext.input(0) else {
            return Ok(0);
        };
        let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
        if off as u32 >= x_size {
            return Ok(fold_to_constant(fd, op, 0));
        }
        fd.op_set_input(op, x, 0);
        Ok(1)
    }
}

/// Commutes `SUBPIECE` through `SEXT` when the extracted region lies
/// entirely inside the un-extended value, so the sign-filled bits are
/// never touched (spec §4.4 `sub_ext_comm`).
pub struct SubExtComm;

impl Rule for SubExtComm {
    fn name(&self) -> &'static str {
        "sub_ext_comm"
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
        let Some(out) = pcode_op.output else {
            return Ok(0);
        };
        let out_size = fd.varnode(out).map(|v| v.size).unwrap_or(0);
        let Some(off) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(sext) = fd.op(def) else {
            return Ok(0);
        };
        if sext.opcode != OpCode::IntSext {
            return Ok(0);
        }
        let Some(x) = sext.input(0) else {
            return Ok(0);
        };
        let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
        if x_size == 0 || off as u32 + out_size > x_size {
            return Ok(0);
        }
        fd.op_set_input(op, x, 0);
        Ok(1)
    }
}

/// `SUBPIECE(x, 0)` whose output already spans all of `x` is the identity
/// (spec §4.4 `subpiece_normal`). The narrowing case (`out_size < x_size`)
/// is already in its simplest form and this rule leaves it untouched.
pub struct SubpieceNormal;

impl Rule for SubpieceNormal {
    fn name(&self) -> &'static str {
        "subpiece_normal"
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
        if const_value(fd, off_vn) != Some(0) {
            return Ok(0);
        }
        let Some(out) = pcode_op.output else {
            return Ok(0);
        };
        let src_size = fd.varnode(src).map(|v| v.size).unwrap_or(0);
        let out_size = fd.varnode(out).map(|v| v.size).unwrap_or(0);
        if src_size != 0 && src_size == out_size {
            return Ok(replace_with_copy(fd, op, src));
        }
        Ok(0)
    }
}

/// Pushes `SUBPIECE` through a byte-aligned unsigned right shift:
/// `SUBPIECE(INT_RIGHT(x, c), off) -> SUBPIECE(x, off + c/8)` when `c` is
/// a multiple of 8 (spec §4.4 `sub_commute`).
pub struct SubCommute;

impl Rule for SubCommute {
    fn name(&self) -> &'static str {
        "sub_commute"
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
        let Some(off) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(shr) = fd.op(def) else {
            return Ok(0);
        };
        if shr.opcode != OpCode::IntRight || shr.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(x), Some(c_vn)) = (shr.input(0), shr.input(1)) else {
            return Ok(0);
        };
        let Some(c) = const_value(fd, c_vn) else {
            return Ok(0);
        };
        if c == 0 || c % 8 != 0 {
            return Ok(0);
        }
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let new_off = fd.new_constant(out_size.max(1), off + c / 8);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, new_off, 1);
        Ok(1)
    }
}

/// Cancels nested `SUBPIECE`s: `SUBPIECE(SUBPIECE(x, off1), off2) ->
/// SUBPIECE(x, off1 + off2)` (spec §4.4 `sub_cancel`).
pub struct SubCancel;

impl Rule for SubCancel {
    fn name(&self) -> &'static str {
        "sub_cancel"
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
        let (Some(src), Some(off2_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(off2) = const_value(fd, off2_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        if inner.opcode != OpCode::SubPiece || inner.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(x), Some(off1_vn)) = (inner.input(0), inner.input(1)) else {
            return Ok(0);
        };
        let Some(off1) = const_value(fd, off1_vn) else {
            return Ok(0);
        };
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let new_off = fd.new_constant(out_size.max(1), off1 + off2);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, new_off, 1);
        Ok(1)
    }
}

/// Converts a nonzero-offset `SUBPIECE` into a single right shift:
/// `SUBPIECE(x, off) -> INT_RIGHT(x, off*8)`, truncated to the same
/// output width by the op's own output Varnode (spec §4.4 `sub_right`).
pub struct SubRight;

impl Rule for SubRight {
    fn name(&self) -> &'static str {
        "sub_right"
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
        let Some(off) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        if off == 0 {
            return Ok(0);
        }
        let src_size = fd.varnode(src).map(|v| v.size).unwrap_or(0);
        let bit_amount = fd.new_constant(src_size.max(1), off * 8);
        fd.op_set_opcode(op, OpCode::IntRight);
        fd.op_set_input(op, src, 0);
        fd.op_set_input(op, bit_amount, 1);
        Ok(1)
    }
}

/// `INT_SLESS(ZEXT(x), ZEXT(y)) -> INT_LESS(x, y)`: both operands of a
/// zero-extension are non-negative at the wider width, so the signed and
/// unsigned comparisons of the narrow values agree (spec §4.4
/// `zext_sless`).
pub struct ZextSless;

impl Rule for ZextSless {
    fn name(&self) -> &'static str {
        "zext_sless"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntSLess, OpCode::IntSLessEqual])
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
        let (Some(x), Some(y)) = (a_op.input(0), b_op.input(0)) else {
            return Ok(0);
        };
        let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
        let y_size = fd.varnode(y).map(|v| v.size).unwrap_or(0);
        if x_size == 0 || x_size != y_size {
            return Ok(0);
        }
        let new_code = if pcode_op.opcode == OpCode::IntSLess {
            OpCode::IntLess
        } else {
            OpCode::IntLessEqual
        };
        fd.op_set_opcode(op, new_code);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, y, 1);
        Ok(1)
    }
}

/// `INT_RIGHT(ZEXT(x), c) -> ZEXT(INT_RIGHT(x, c))` when `c` is within
/// `x`'s own width: the widened zero bits never participate, so the
/// shift can run at the narrow width (spec §4.4 `zext_shift_zext`).
/// When `c` reaches or exceeds `x`'s width the whole result is zero.
pub struct ZextShiftZext;

impl Rule for ZextShiftZext {
    fn name(&self) -> &'static str {
        "zext_shift_zext"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntRight])
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
        let (Some(src), Some(c_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(c) = const_value(fd, c_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(zext) = fd.op(def) else {
            return Ok(0);
        };
        if zext.opcode != OpCode::IntZext {
            return Ok(0);
        }
        let Some(x) = zext.input(0) else {
            return Ok(0);
        };
        let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
        if x_size == 0 {
            return Ok(0);
        }
        let x_bits = (x_size * 8) as u128;
        if c >= x_bits {
            return Ok(fold_to_constant(fd, op, 0));
        }
        if c == 0 {
            return Ok(0);
        }
        let address = pcode_op.address;
        let narrow_c = fd.new_constant(x_size, c);
        let inner = fd.new_op(OpCode::IntRight, 2, address);
        fd.op_set_input(inner, x, 0);
        fd.op_set_input(inner, narrow_c, 1);
        let inner_out = fd.new_unique_out(x_size, inner);
        fd.op_insert_before(inner, op);

        fd.op_remove_input(op, 1);
        fd.op_set_opcode(op, OpCode::IntZext);
        fd.op_set_input(op, inner_out, 0);
        Ok(1)
    }
}

/// `INT_EQUAL(ZEXT(x), c)` where `c` has a nonzero bit above `x`'s own
/// width can never hold; where it doesn't, the comparison can run at
/// `x`'s narrow width directly (spec §4.4 `zext_commute`).
pub struct ZextCommute;

impl Rule for ZextCommute {
    fn name(&self) -> &'static str {
        "zext_commute"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntEqual, OpCode::IntNotEqual])
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
        for (zext_vn, const_vn) in [(a, b), (b, a)] {
            let Some(c) = const_value(fd, const_vn) else {
                continue;
            };
            let Some(def) = fd.varnode(zext_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(zext) = fd.op(def) else {
                continue;
            };
            if zext.opcode != OpCode::IntZext {
                continue;
            }
            let Some(x) = zext.input(0) else {
                continue;
            };
            let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
            if x_size == 0 {
                continue;
            }
            if c & !calc_mask(x_size) != 0 {
                let unreachable = pcode_op.opcode == OpCode::IntEqual;
                return Ok(fold_to_constant(fd, op, unreachable as u128 ^ 1));
            }
            let narrow = fd.new_constant(x_size, c);
            fd.op_set_input(op, x, if zext_vn == a { 0 } else { 1 });
            fd.op_set_input(op, narrow, if zext_vn == a { 1 } else { 0 });
            return Ok(1);
        }
        Ok(0)
    }
}
