//! Shift-simplification rules (spec §4.4 "Shifts").

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpId,
};

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

/// Collapses a shift by zero to its value, and an unsigned shift whose
/// amount is at least the operand's bit width to zero (spec §4.4
/// `trivial_shift`). `INT_SRIGHT` by an out-of-range amount is left for
/// `collapse_constants`/`and_mask` to finish once its sign-fill value is
/// known, since the result there is all-ones rather than zero.
pub struct TrivialShift;

impl Rule for TrivialShift {
    fn name(&self) -> &'static str {
        "trivial_shift"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLeft, OpCode::IntRight, OpCode::IntSRight])
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
        let (Some(val), Some(amt_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(amount) = const_value(fd, amt_vn) else {
            return Ok(0);
        };
        if amount == 0 {
            return Ok(replace_with_copy(fd, op, val));
        }
        if pcode_op.opcode == OpCode::IntSRight {
            return Ok(0);
        }
        let in_size = fd.varnode(val).map(|v| v.size).unwrap_or(0);
        let bits = in_size * 8;
        if bits != 0 && amount as u32 >= bits {
            return Ok(fold_to_constant(fd, op, 0));
        }
        Ok(0)
    }
}

/// Combines `(x << c1) << c2` into `x << (c1+c2)`, and the analogous
/// `INT_RIGHT`/`INT_SRIGHT` chains (spec §4.4 `double_shift`,
/// `double_arith_shift`).
pub struct DoubleShift;

impl Rule for DoubleShift {
    fn name(&self) -> &'static str {
        "double_shift"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLeft, OpCode::IntRight, OpCode::IntSRight])
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
        let opcode = pcode_op.opcode;
        let (Some(inner_vn), Some(c2_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(c2) = const_value(fd, c2_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(inner_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        if inner.opcode != opcode || inner.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(base), Some(c1_vn)) = (inner.input(0), inner.input(1)) else {
            return Ok(0);
        };
        let Some(c1) = const_value(fd, c1_vn) else {
            return Ok(0);
        };
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let bits = out_size * 8;
        // A chain of arithmetic right shifts saturates at `bits-1`: that's
        // the shift amount that already broadcasts the sign bit across the
        // whole value, so any larger combined amount is equivalent to it.
        // Logical shifts saturate at `bits`, past which the result is zero.
        let cap = if opcode == OpCode::IntSRight {
            bits.saturating_sub(1)
        } else {
            bits
        };
        let combined = c1.saturating_add(c2).min(cap as u128);
        let new_amt = fd.new_constant(out_size, combined);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, new_amt, 1);
        Ok(1)
    }
}

/// Concatenation followed by a right shift that consumes the whole low
/// piece collapses to an extension of the high piece, possibly shifted
/// further (spec §4.4 `concat_shift`).
pub struct ConcatShift;

impl Rule for ConcatShift {
    fn name(&self) -> &'static str {
        "concat_shift"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntRight, OpCode::IntSRight])
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
        let opcode = pcode_op.opcode;
        let (Some(src), Some(c_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(c) = const_value(fd, c_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(piece) = fd.op(def) else {
            return Ok(0);
        };
        if piece.opcode != OpCode::Piece || piece.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(hi), Some(lo)) = (piece.input(0), piece.input(1)) else {
            return Ok(0);
        };
        let lo_size = fd.varnode(lo).map(|v| v.size).unwrap_or(0);
        let hi_size = fd.varnode(hi).map(|v| v.size).unwrap_or(0);
        if lo_size == 0 || hi_size == 0 {
            return Ok(0);
        }
        let lo_bits = (lo_size * 8) as u128;
        if c < lo_bits {
            return Ok(0);
        }
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);
        let remaining = c - lo_bits;
        let address = pcode_op.address;

        let shifted_hi = if remaining == 0 {
            hi
        } else {
            let amt = fd.new_constant(hi_size, remaining);
            let shift_op = fd.new_op(opcode, 2, address);
            fd.op_set_input(shift_op, hi, 0);
            fd.op_set_input(shift_op, amt, 1);
            let out = fd.new_unique_out(hi_size, shift_op);
            fd.op_insert_before(shift_op, op);
            out
        };

        if out_size == hi_size {
            return Ok(replace_with_copy(fd, op, shifted_hi));
        }
        let ext_code = if opcode == OpCode::IntSRight {
            OpCode::IntSext
        } else {
            OpCode::IntZext
        };
        fd.op_remove_input(op, 1);
        fd.op_set_opcode(op, ext_code);
        fd.op_set_input(op, shifted_hi, 0);
        Ok(1)
    }
}

/// `(v << c) >> c` (or the signed variant) with a byte-aligned `c`
/// clears/sign-fills the top `c` bits of `v` and is equivalent to masking
/// or sign-extending a narrower view of `v` directly (spec §4.4
/// `left_right`).
pub struct LeftRight;

impl Rule for LeftRight {
    fn name(&self) -> &'static str {
        "left_right"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntRight, OpCode::IntSRight])
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
        let opcode = pcode_op.opcode;
        let (Some(src), Some(c2_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(c2) = const_value(fd, c2_vn) else {
            return Ok(0);
        };
        if c2 == 0 || c2 % 8 != 0 {
            return Ok(0);
        }
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(shl) = fd.op(def) else {
            return Ok(0);
        };
        if shl.opcode != OpCode::IntLeft || shl.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(v), Some(c1_vn)) = (shl.input(0), shl.input(1)) else {
            return Ok(0);
        };
        let Some(c1) = const_value(fd, c1_vn) else {
            return Ok(0);
        };
        if c1 != c2 {
            return Ok(0);
        }
        let v_size = fd.varnode(v).map(|v| v.size).unwrap_or(0);
        let bits = (v_size * 8) as u128;
        if v_size == 0 || c2 >= bits {
            return Ok(0);
        }
        let narrow_size = ((bits - c2) / 8) as u32;
        let address = pcode_op.address;
        let off = fd.new_constant(v_size, 0);
        let sub_op = fd.new_op(OpCode::SubPiece, 2, address);
        fd.op_set_input(sub_op, v, 0);
        fd.op_set_input(sub_op, off, 1);
        let narrow = fd.new_unique_out(narrow_size, sub_op);
        fd.op_insert_before(sub_op, op);

        let ext_code = if opcode == OpCode::IntSRight {
            OpCode::IntSext
        } else {
            OpCode::IntZext
        };
        fd.op_remove_input(op, 1);
        fd.op_set_opcode(op, ext_code);
        fd.op_set_input(op, narrow, 0);
        Ok(1)
    }
}

/// Pushes a shift inward through a bitwise op (always sound: shifting is
/// per-bit-position) or through `INT_ADD` under a left shift specifically
/// (sound because left shift is multiplication by a power of two, which
/// distributes over addition) (spec §4.4 `shift_bitops`).
pub struct ShiftBitops;

impl Rule for ShiftBitops {
    fn name(&self) -> &'static str {
        "shift_bitops"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLeft, OpCode::IntRight, OpCode::IntSRight])
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
        let shift_code = pcode_op.opcode;
        let (Some(src), Some(c_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(src).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        let bitwise = matches!(
            inner.opcode,
            OpCode::IntAnd | OpCode::IntOr | OpCode::IntXor
        );
        let add_under_left = inner.opcode == OpCode::IntAdd && shift_code == OpCode::IntLeft;
        if !bitwise && !add_under_left {
            return Ok(0);
        }
        if inner.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(a), Some(b)) = (inner.input(0), inner.input(1)) else {
            return Ok(0);
        };
        let inner_code = inner.opcode;
        let c = c_vn;
        let c_size = fd.varnode(c_vn).map(|v| v.size).unwrap_or(0);
        let address = pcode_op.address;
        let out_size = pcode_op
            .output
            .and_then(|v| fd.varnode(v))
            .map(|v| v.size)
            .unwrap_or(0);

        let mut shift_of = |fd: &mut FunctionData, val: pcode_ir::VarnodeId| {
            let val_size = fd.varnode(val).map(|v| v.size).unwrap_or(out_size);
            let c_copy = fd.new_constant(c_size.max(1), const_value(fd, c).unwrap_or(0));
            let shift_op = fd.new_op(shift_code, 2, address);
            fd.op_set_input(shift_op, val, 0);
            fd.op_set_input(shift_op, c_copy, 1);
            let out = fd.new_unique_out(val_size, shift_op);
            fd.op_insert_before(shift_op, op);
            out
        };

        let shifted_a = shift_of(fd, a);
        let shifted_b = shift_of(fd, b);
        fd.op_set_opcode(op, inner_code);
        fd.op_set_input(op, shifted_a, 0);
        fd.op_set_input(op, shifted_b, 1);
        Ok(1)
    }
}

/// Cancels a common left shift applied to both sides of a comparison when
/// neither operand's significant bits are disturbed by it, determined via
/// `nz_mask` (spec §4.4 `shift_compare`).
pub struct ShiftCompare;

impl Rule for ShiftCompare {
    fn name(&self) -> &'static str {
        "shift_compare"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[
            OpCode::IntLess,
            OpCode::IntLessEqual,
            OpCode::IntEqual,
            OpCode::IntNotEqual,
        ])
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
        if a_op.opcode != OpCode::IntLeft || b_op.opcode != OpCode::IntLeft {
            return Ok(0);
        }
        if a_op.inputs.len() != 2 || b_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(x), Some(ca_vn)) = (a_op.input(0), a_op.input(1)) else {
            return Ok(0);
        };
        let (Some(y), Some(cb_vn)) = (b_op.input(0), b_op.input(1)) else {
            return Ok(0);
        };
        let Some(ca) = const_value(fd, ca_vn) else {
            return Ok(0);
        };
        let Some(cb) = const_value(fd, cb_vn) else {
            return Ok(0);
        };
        if ca != cb || ca == 0 {
            return Ok(0);
        }
        let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
        let y_size = fd.varnode(y).map(|v| v.size).unwrap_or(0);
        if x_size == 0 || y_size == 0 {
            return Ok(0);
        }
        let x_nz = fd.varnode(x).map(|v| v.nz_mask).unwrap_or(u128::MAX);
        let y_nz = fd.varnode(y).map(|v| v.nz_mask).unwrap_or(u128::MAX);
        // Mask of the top `amt` bits of a `bits`-wide value: if either
        // operand has a set bit there, the shift would have truncated it
        // and the comparison can't be replayed on the un-shifted values.
        let top_mask = |bits: u32, amt: u128| -> u128 {
            if amt == 0 || amt as u32 >= bits {
                return if bits >= 128 { u128::MAX } else { (1u128 << bits) - 1 };
            }
            ((1u128 << amt) - 1) << (bits as u128 - amt)
        };
        let x_bits = x_size * 8;
        let y_bits = y_size * 8;
        if x_nz & top_mask(x_bits, ca) != 0 || y_nz & top_mask(y_bits, ca) != 0 {
            return Ok(0);
        }
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, y, 1);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcode_ir::builder::TestFunctionBuilder;
    use crate::{
        diagnostics::Diagnostics,
        options::SimplifyOptions,
    };

    fn ctx<'a>(options: &'a SimplifyOptions, diag: &'a mut Diagnostics) -> RuleContext<'a> {
        RuleContext {
            options,
            diagnostics: diag,
            types: None,
            segment_ops: &[],
            constant_pool: None,
        }
    }

    #[test]
    fn double_shift_combines_amounts() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let c1 = fd.new_constant(4, 2);
        let inner = fd.new_op(OpCode::IntLeft, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(inner, block);
        fd.op_set_input(inner, x, 0);
        fd.op_set_input(inner, c1, 1);
        let inner_out = fd.new_unique_out(4, inner);

        let c2 = fd.new_constant(4, 3);
        let outer = fd.new_op(OpCode::IntLeft, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(outer, inner);
        fd.op_set_input(outer, inner_out, 0);
        fd.op_set_input(outer, c2, 1);
        let _out = fd.new_unique_out(4, outer);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(DoubleShift.apply_op(outer, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(outer).unwrap();
        assert_eq!(rewritten.input(0), Some(x));
        let amt = rewritten.input(1).unwrap();
        assert_eq!(fd.varnode(amt).unwrap().constant_value(), Some(5));
    }

    #[test]
    fn double_arith_shift_saturates_at_bits_minus_one() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let c1 = fd.new_constant(4, 20);
        let inner = fd.new_op(OpCode::IntSRight, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(inner, block);
        fd.op_set_input(inner, x, 0);
        fd.op_set_input(inner, c1, 1);
        let inner_out = fd.new_unique_out(4, inner);

        let c2 = fd.new_constant(4, 20);
        let outer = fd.new_op(OpCode::IntSRight, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(outer, inner);
        fd.op_set_input(outer, inner_out, 0);
        fd.op_set_input(outer, c2, 1);
        let _out = fd.new_unique_out(4, outer);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(DoubleShift.apply_op(outer, &mut fd, &mut rc).unwrap(), 1);
        let amt = fd.op(outer).unwrap().input(1).unwrap();
        assert_eq!(fd.varnode(amt).unwrap().constant_value(), Some(31));
    }

    #[test]
    fn concat_shift_collapses_to_extension_of_high_half() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let hi = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let lo = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));
        let piece = fd.new_op(OpCode::Piece, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(piece, block);
        fd.op_set_input(piece, hi, 0);
        fd.op_set_input(piece, lo, 1);
        let piece_out = fd.new_unique_out(8, piece);

        let shift_amt = fd.new_constant(8, 32);
        let shr = fd.new_op(OpCode::IntRight, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(shr, piece);
        fd.op_set_input(shr, piece_out, 0);
        fd.op_set_input(shr, shift_amt, 1);
        let _out = fd.new_unique_out(4, shr);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(ConcatShift.apply_op(shr, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(shr).unwrap();
        assert_eq!(rewritten.opcode, OpCode::Copy);
        assert_eq!(rewritten.input(0), Some(hi));
    }

    #[test]
    fn left_right_narrows_to_sign_extend() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let v = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let c1 = fd.new_constant(4, 16);
        let shl = fd.new_op(OpCode::IntLeft, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(shl, block);
        fd.op_set_input(shl, v, 0);
        fd.op_set_input(shl, c1, 1);
        let shl_out = fd.new_unique_out(4, shl);

        let c2 = fd.new_constant(4, 16);
        let sra = fd.new_op(OpCode::IntSRight, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(sra, shl);
        fd.op_set_input(sra, shl_out, 0);
        fd.op_set_input(sra, c2, 1);
        let _out = fd.new_unique_out(4, sra);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(LeftRight.apply_op(sra, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(sra).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntSext);
    }

    #[test]
    fn shift_bitops_distributes_over_and() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));
        let and_op = fd.new_op(OpCode::IntAnd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(and_op, block);
        fd.op_set_input(and_op, a, 0);
        fd.op_set_input(and_op, b, 1);
        let and_out = fd.new_unique_out(4, and_op);

        let amt = fd.new_constant(4, 2);
        let shl = fd.new_op(OpCode::IntLeft, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(shl, and_op);
        fd.op_set_input(shl, and_out, 0);
        fd.op_set_input(shl, amt, 1);
        let _out = fd.new_unique_out(4, shl);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(ShiftBitops.apply_op(shl, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(shl).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntAnd);
    }

    #[test]
    fn shift_compare_cancels_common_left_shift() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let y = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));
        fd.varnode_mut(x).unwrap().nz_mask = 0xFF;
        fd.varnode_mut(y).unwrap().nz_mask = 0xFF;

        let ca = fd.new_constant(4, 8);
        let shl_a = fd.new_op(OpCode::IntLeft, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(shl_a, block);
        fd.op_set_input(shl_a, x, 0);
        fd.op_set_input(shl_a, ca, 1);
        let a_out = fd.new_unique_out(4, shl_a);

        let cb = fd.new_constant(4, 8);
        let shl_b = fd.new_op(OpCode::IntLeft, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(shl_b, shl_a);
        fd.op_set_input(shl_b, y, 0);
        fd.op_set_input(shl_b, cb, 1);
        let b_out = fd.new_unique_out(4, shl_b);

        let cmp = fd.new_op(OpCode::IntLess, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(cmp, shl_b);
        fd.op_set_input(cmp, a_out, 0);
        fd.op_set_input(cmp, b_out, 1);
        let _out = fd.new_unique_out(1, cmp);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(ShiftCompare.apply_op(cmp, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(cmp).unwrap();
        assert_eq!(rewritten.input(0), Some(x));
        assert_eq!(rewritten.input(1), Some(y));
    }
}
