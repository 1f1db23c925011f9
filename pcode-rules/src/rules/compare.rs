//! Comparison-normalization and boolean-algebra rules (spec §4.4
//! "Comparisons and booleans").

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpId,
    VarnodeId,
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

fn sign_bit(bytes: u32) -> u128 {
    if bytes == 0 {
        0
    } else {
        1u128 << (bytes * 8 - 1)
    }
}

/// `(x - y) == 0 -> x == y`, and the `!=` counterpart (spec §4.4
/// `equal2_zero`).
pub struct Equal2Zero;

impl Rule for Equal2Zero {
    fn name(&self) -> &'static str {
        "equal2_zero"
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
        for (sub_vn, zero_vn) in [(a, b), (b, a)] {
            if const_value(fd, zero_vn) != Some(0) {
                continue;
            }
            let Some(def) = fd.varnode(sub_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(sub_op) = fd.op(def) else {
                continue;
            };
            if sub_op.opcode != OpCode::IntSub || sub_op.inputs.len() != 2 {
                continue;
            }
            let (Some(x), Some(y)) = (sub_op.input(0), sub_op.input(1)) else {
                continue;
            };
            fd.op_set_input(op, x, 0);
            fd.op_set_input(op, y, 1);
            return Ok(1);
        }
        Ok(0)
    }
}

/// Collapses the classic idiom `(a < b) | (a == b)` into `a <= b`, both
/// signed and unsigned forms (spec §4.4 `less_equal`).
pub struct LessEqual;

impl Rule for LessEqual {
    fn name(&self) -> &'static str {
        "less_equal"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::BoolOr])
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
        if a_op.inputs.len() != 2 || b_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(ax), Some(ay)) = (a_op.input(0), a_op.input(1)) else {
            return Ok(0);
        };
        let (Some(bx), Some(by)) = (b_op.input(0), b_op.input(1)) else {
            return Ok(0);
        };
        if !(ax == bx && ay == by) {
            return Ok(0);
        }
        let new_code = match (a_op.opcode, b_op.opcode) {
            (OpCode::IntLess, OpCode::IntEqual) | (OpCode::IntEqual, OpCode::IntLess) => {
                OpCode::IntLessEqual
            }
            (OpCode::IntSLess, OpCode::IntEqual) | (OpCode::IntEqual, OpCode::IntSLess) => {
                OpCode::IntSLessEqual
            }
            _ => return Ok(0),
        };
        fd.op_set_opcode(op, new_code);
        fd.op_set_input(op, ax, 0);
        fd.op_set_input(op, ay, 1);
        Ok(1)
    }
}

/// `(a < b) | (b < a) -> a != b`: the only way two values both fail to be
/// less than each other, and also aren't ordered either way, is if they
/// differ (spec §4.4 `less_not_equal`).
pub struct LessNotEqual;

impl Rule for LessNotEqual {
    fn name(&self) -> &'static str {
        "less_not_equal"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::BoolOr])
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
        let same_flavor = matches!(
            (a_op.opcode, b_op.opcode),
            (OpCode::IntLess, OpCode::IntLess) | (OpCode::IntSLess, OpCode::IntSLess)
        );
        if !same_flavor || a_op.inputs.len() != 2 || b_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(ax), Some(ay)) = (a_op.input(0), a_op.input(1)) else {
            return Ok(0);
        };
        let (Some(bx), Some(by)) = (b_op.input(0), b_op.input(1)) else {
            return Ok(0);
        };
        if !(ax == by && ay == bx) {
            return Ok(0);
        }
        fd.op_set_opcode(op, OpCode::IntNotEqual);
        fd.op_set_input(op, ax, 0);
        fd.op_set_input(op, ay, 1);
        Ok(1)
    }
}

/// `x < 1 -> x == 0` for an unsigned comparison: the only value smaller
/// than one is zero (spec §4.4 `less_one`).
pub struct LessOne;

impl Rule for LessOne {
    fn name(&self) -> &'static str {
        "less_one"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLess])
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
        let (Some(x), Some(one_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        if const_value(fd, one_vn) != Some(1) {
            return Ok(0);
        }
        let zero = fd.new_constant(fd.varnode(one_vn).map(|v| v.size).unwrap_or(1), 0);
        fd.op_set_opcode(op, OpCode::IntEqual);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, zero, 1);
        Ok(1)
    }
}

/// `0 < x -> x != 0` for an unsigned comparison (spec §4.4 `less2zero`).
pub struct Less2Zero;

impl Rule for Less2Zero {
    fn name(&self) -> &'static str {
        "less2zero"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLess])
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
        let (Some(zero_vn), Some(x)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        if const_value(fd, zero_vn) != Some(0) {
            return Ok(0);
        }
        fd.op_set_opcode(op, OpCode::IntNotEqual);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, zero_vn, 1);
        Ok(1)
    }
}

/// `x <= 0 -> x == 0` for an unsigned comparison (spec §4.4
/// `lessequal2zero`).
pub struct LessEqual2Zero;

impl Rule for LessEqual2Zero {
    fn name(&self) -> &'static str {
        "lessequal2zero"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLessEqual])
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
        let (Some(x), Some(zero_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        if const_value(fd, zero_vn) != Some(0) {
            return Ok(0);
        }
        fd.op_set_opcode(op, OpCode::IntEqual);
        Ok(1)
    }
}

/// Recognizes an explicit sign-bit test `(x >> (bits-1)) != 0` and
/// collapses it to the cheaper `x s< 0` (spec §4.4 `sless2zero`).
pub struct SLess2Zero;

impl Rule for SLess2Zero {
    fn name(&self) -> &'static str {
        "sless2zero"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntNotEqual])
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
        let (Some(shift_vn), Some(zero_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        if const_value(fd, zero_vn) != Some(0) {
            return Ok(0);
        }
        let Some(def) = fd.varnode(shift_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(shr) = fd.op(def) else {
            return Ok(0);
        };
        if shr.opcode != OpCode::IntRight || shr.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(x), Some(amt_vn)) = (shr.input(0), shr.input(1)) else {
            return Ok(0);
        };
        let Some(amt) = const_value(fd, amt_vn) else {
            return Ok(0);
        };
        let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
        if x_size == 0 || amt as u32 != x_size * 8 - 1 {
            return Ok(0);
        }
        let new_zero = fd.new_constant(x_size, 0);
        fd.op_set_opcode(op, OpCode::IntSLess);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, new_zero, 1);
        Ok(1)
    }
}

/// `x s< y -> x < y` when neither operand can ever be negative (spec
/// §4.4 `sless_to_less`).
pub struct SlessToLess;

impl Rule for SlessToLess {
    fn name(&self) -> &'static str {
        "sless_to_less"
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
        let a_vn = fd.varnode(a);
        let b_vn = fd.varnode(b);
        let (Some(a_vn), Some(b_vn)) = (a_vn, b_vn) else {
            return Ok(0);
        };
        let a_sign = sign_bit(a_vn.size);
        let b_sign = sign_bit(b_vn.size);
        if a_vn.nz_mask & a_sign != 0 || b_vn.nz_mask & b_sign != 0 {
            return Ok(0);
        }
        let new_code = if pcode_op.opcode == OpCode::IntSLess {
            OpCode::IntLess
        } else {
            OpCode::IntLessEqual
        };
        fd.op_set_opcode(op, new_code);
        Ok(1)
    }
}

/// Canonicalizes `x <= c` to `x < c+1` when `c` doesn't saturate the
/// type's range, matching the decompiler's preference for strict `<`
/// (spec §4.4, "`int_less_equal` canonicalizes to `INT_LESS(c+1)`").
pub struct IntLessEqualToLess;

impl Rule for IntLessEqualToLess {
    fn name(&self) -> &'static str {
        "int_less_equal_to_less"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntLessEqual])
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
        let (Some(x), Some(c_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(c) = const_value(fd, c_vn) else {
            return Ok(0);
        };
        let size = fd.varnode(c_vn).map(|v| v.size).unwrap_or(0);
        let full = calc_mask(size);
        if size == 0 || c == full {
            return Ok(0);
        }
        let bumped = fd.new_constant(size, (c + 1) & full);
        fd.op_set_opcode(op, OpCode::IntLess);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, bumped, 1);
        Ok(1)
    }
}

/// `(x + c1) == c2 -> x == (c2 - c1)`: pulls an additive constant out of
/// an equality comparison (spec §4.4 `equal2_constant`).
pub struct Equal2Constant;

impl Rule for Equal2Constant {
    fn name(&self) -> &'static str {
        "equal2_constant"
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
        for (add_vn, c2_vn) in [(a, b), (b, a)] {
            let Some(c2) = const_value(fd, c2_vn) else {
                continue;
            };
            let Some(def) = fd.varnode(add_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(add_op) = fd.op(def) else {
                continue;
            };
            if add_op.opcode != OpCode::IntAdd || add_op.inputs.len() != 2 {
                continue;
            }
            let (Some(x), Some(c1_vn)) = (add_op.input(0), add_op.input(1)) else {
                continue;
            };
            let Some(c1) = const_value(fd, c1_vn) else {
                continue;
            };
            let size = fd.varnode(c1_vn).map(|v| v.size).unwrap_or(0);
            if size == 0 {
                continue;
            }
            let full = calc_mask(size);
            let new_c = (c2.wrapping_sub(c1)) & full;
            let new_const = fd.new_constant(size, new_c);
            fd.op_set_input(op, x, 0);
            fd.op_set_input(op, new_const, 1);
            return Ok(1);
        }
        Ok(0)
    }
}

fn is_bool_valued(fd: &FunctionData, vn: VarnodeId) -> bool {
    let Some(def) = fd.varnode(vn).and_then(|v| v.def) else {
        return false;
    };
    let Some(op) = fd.op(def) else {
        return false;
    };
    matches!(
        op.opcode,
        OpCode::IntEqual
            | OpCode::IntNotEqual
            | OpCode::IntLess
            | OpCode::IntLessEqual
            | OpCode::IntSLess
            | OpCode::IntSLessEqual
            | OpCode::BoolAnd
            | OpCode::BoolOr
            | OpCode::BoolXor
            | OpCode::BoolNegate
    )
}

/// `ZEXT(boolop) != 0 -> boolop`, and the `== 1` form: a zero-extended
/// boolean compared back against its own range is the boolean itself
/// (spec §4.4 `bool_zext`).
pub struct BoolZext;

impl Rule for BoolZext {
    fn name(&self) -> &'static str {
        "bool_zext"
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
        let is_not_equal = pcode_op.opcode == OpCode::IntNotEqual;
        let (Some(a), Some(b)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        for (zext_vn, const_vn) in [(a, b), (b, a)] {
            let Some(c) = const_value(fd, const_vn) else {
                continue;
            };
            let wants_true = (c == 1 && !is_not_equal) || (c == 0 && is_not_equal);
            if !wants_true {
                continue;
            }
            let Some(def) = fd.varnode(zext_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(zext) = fd.op(def) else {
                continue;
            };
            if zext.opcode != OpCode::IntZext {
                continue;
            }
            let Some(inner) = zext.input(0) else {
                continue;
            };
            if !is_bool_valued(fd, inner) {
                continue;
            }
            return Ok(replace_with_copy(fd, op, inner));
        }
        Ok(0)
    }
}

/// Retypes a bitwise `AND`/`OR`/`XOR` on single-bit operands to its
/// boolean-domain counterpart, once both sides are known never to carry
/// more than bit 0 (spec §4.4 `logic2bool`).
pub struct Logic2Bool;

impl Rule for Logic2Bool {
    fn name(&self) -> &'static str {
        "logic2bool"
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
        let a_nz = fd.varnode(a).map(|v| v.nz_mask).unwrap_or(u128::MAX);
        let b_nz = fd.varnode(b).map(|v| v.nz_mask).unwrap_or(u128::MAX);
        if a_nz > 1 || b_nz > 1 {
            return Ok(0);
        }
        let new_code = match pcode_op.opcode {
            OpCode::IntAnd => OpCode::BoolAnd,
            OpCode::IntOr => OpCode::BoolOr,
            OpCode::IntXor => OpCode::BoolXor,
            _ => return Ok(0),
        };
        fd.op_set_opcode(op, new_code);
        Ok(1)
    }
}

/// De Morgan's laws: `!(a & b) -> !a | !b` and `!(a | b) -> !a & !b`
/// (spec §4.4 `not_distribute`).
pub struct NotDistribute;

impl Rule for NotDistribute {
    fn name(&self) -> &'static str {
        "not_distribute"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::BoolNegate])
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
        let Some(def) = fd.varnode(input).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        let (dual, a, b) = match inner.opcode {
            OpCode::BoolAnd if inner.inputs.len() == 2 => {
                (OpCode::BoolOr, inner.input(0), inner.input(1))
            }
            OpCode::BoolOr if inner.inputs.len() == 2 => {
                (OpCode::BoolAnd, inner.input(0), inner.input(1))
            }
            _ => return Ok(0),
        };
        let (Some(a), Some(b)) = (a, b) else {
            return Ok(0);
        };
        let address = pcode_op.address;
        let size = fd.varnode(a).map(|v| v.size).unwrap_or(1);

        let neg_a = fd.new_op(OpCode::BoolNegate, 1, address);
        fd.op_set_input(neg_a, a, 0);
        let neg_a_out = fd.new_unique_out(size, neg_a);
        fd.op_insert_before(neg_a, op);

        let neg_b = fd.new_op(OpCode::BoolNegate, 1, address);
        fd.op_set_input(neg_b, b, 0);
        let neg_b_out = fd.new_unique_out(size, neg_b);
        fd.op_insert_before(neg_b, op);

        fd.op_append_input(op, neg_b_out);
        fd.op_set_opcode(op, dual);
        fd.op_set_input(op, neg_a_out, 0);
        fd.op_set_input(op, neg_b_out, 1);
        Ok(1)
    }
}

/// Factors a common term out of a boolean distribution: `(a & b) | (a &
/// c) -> a & (b | c)`, and the dual `(a | b) & (a | c) -> a | (b & c)`
/// (spec §4.4 `boolean_undistribute`).
pub struct BooleanUndistribute;

impl Rule for BooleanUndistribute {
    fn name(&self) -> &'static str {
        "boolean_undistribute"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::BoolOr, OpCode::BoolAnd])
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
        let outer = pcode_op.opcode;
        let inner_code = if outer == OpCode::BoolOr {
            OpCode::BoolAnd
        } else {
            OpCode::BoolOr
        };
        let (Some(p), Some(q)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(p_def) = fd.varnode(p).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(q_def) = fd.varnode(q).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(p_op) = fd.op(p_def) else {
            return Ok(0);
        };
        let Some(q_op) = fd.op(q_def) else {
            return Ok(0);
        };
        if p_op.opcode != inner_code
            || q_op.opcode != inner_code
            || p_op.inputs.len() != 2
            || q_op.inputs.len() != 2
        {
            return Ok(0);
        }
        let (Some(p0), Some(p1)) = (p_op.input(0), p_op.input(1)) else {
            return Ok(0);
        };
        let (Some(q0), Some(q1)) = (q_op.input(0), q_op.input(1)) else {
            return Ok(0);
        };
        let (common, b, c) = if p0 == q0 {
            (p0, p1, q1)
        } else if p0 == q1 {
            (p0, p1, q0)
        } else if p1 == q0 {
            (p1, p0, q1)
        } else if p1 == q1 {
            (p1, p0, q0)
        } else {
            return Ok(0);
        };
        let address = pcode_op.address;
        let size = fd.varnode(b).map(|v| v.size).unwrap_or(1);
        let inner_new = fd.new_op(outer, 2, address);
        fd.op_set_input(inner_new, b, 0);
        fd.op_set_input(inner_new, c, 1);
        let inner_out = fd.new_unique_out(size, inner_new);
        fd.op_insert_before(inner_new, op);

        fd.op_set_opcode(op, inner_code);
        fd.op_set_input(op, common, 0);
        fd.op_set_input(op, inner_out, 1);
        Ok(1)
    }
}

/// Self-dedup for boolean ops: `a & a -> a`, `a | a -> a`, `a ^ a ->
/// false` (spec §4.4 `boolean_dedup`; the integer-typed analogue already
/// lives in `TrivialArith`).
pub struct BooleanDedup;

impl Rule for BooleanDedup {
    fn name(&self) -> &'static str {
        "boolean_dedup"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::BoolAnd, OpCode::BoolOr, OpCode::BoolXor])
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
        if a != b {
            return Ok(0);
        }
        if pcode_op.opcode == OpCode::BoolXor {
            return Ok(fold_to_constant(fd, op, 0));
        }
        Ok(replace_with_copy(fd, op, a))
    }
}

/// Collapses the sum-of-zero-extended-comparisons idiom used to
/// implement three-way compare (`strcmp`-style `<=>`):
/// `SUB(ZEXT(a < b), ZEXT(b < a))` compared against `-1`, `0`, or `1`
/// rewrites directly to the corresponding ordering test on `a`/`b`
/// (spec §4.4 `three_way_compare`).
pub struct ThreeWayCompare;

struct ThreeWay {
    a: VarnodeId,
    b: VarnodeId,
    signed: bool,
}

fn match_three_way(fd: &FunctionData, vn: VarnodeId) -> Option<ThreeWay> {
    let def = fd.varnode(vn)?.def?;
    let sub = fd.op(def)?;
    if sub.opcode != OpCode::IntSub || sub.inputs.len() != 2 {
        return None;
    }
    let (lt_vn, gt_vn) = (sub.input(0)?, sub.input(1)?);

    let unwrap_zext = |vn: VarnodeId| -> Option<(VarnodeId, VarnodeId, OpCode)> {
        let def = fd.varnode(vn)?.def?;
        let zext = fd.op(def)?;
        if zext.opcode != OpCode::IntZext {
            return None;
        }
        let inner_vn = zext.input(0)?;
        let inner_def = fd.varnode(inner_vn)?.def?;
        let cmp = fd.op(inner_def)?;
        if cmp.inputs.len() != 2 {
            return None;
        }
        Some((cmp.input(0)?, cmp.input(1)?, cmp.opcode))
    };

    let (lt_x, lt_y, lt_code) = unwrap_zext(lt_vn)?;
    let (gt_x, gt_y, gt_code) = unwrap_zext(gt_vn)?;
    let signed = match (lt_code, gt_code) {
        (OpCode::IntLess, OpCode::IntLess) => false,
        (OpCode::IntSLess, OpCode::IntSLess) => true,
        _ => return None,
    };
    // lt = a < b, gt = b < a
    if lt_x == gt_y && lt_y == gt_x {
        Some(ThreeWay {
            a: lt_x,
            b: lt_y,
            signed,
        })
    } else {
        None
    }
}

impl Rule for ThreeWayCompare {
    fn name(&self) -> &'static str {
        "three_way_compare"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[
            OpCode::IntEqual,
            OpCode::IntNotEqual,
            OpCode::IntSLess,
            OpCode::IntSLessEqual,
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
        let opcode = pcode_op.opcode;
        let (Some(lhs), Some(rhs)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        // Only the compiler-realistic shape `threeway OP constant` is
        // handled; the mirrored `constant OP threeway` form is left for a
        // future `term_order`-style canonicalization pass to normalize
        // into this one first.
        let Some(three_way) = match_three_way(fd, lhs) else {
            return Ok(0);
        };
        if !three_way.signed {
            return Ok(0);
        }
        let Some(c) = const_value(fd, rhs) else {
            return Ok(0);
        };
        let size = fd.varnode(rhs).map(|v| v.size).unwrap_or(1);
        let full = calc_mask(size);
        let signed_c: i128 = if c == 1 {
            1
        } else if c == full {
            -1
        } else if c == 0 {
            0
        } else {
            return Ok(0);
        };

        let (new_code, out_a, out_b) = match (opcode, signed_c) {
            (OpCode::IntEqual, -1) => (OpCode::IntSLess, three_way.a, three_way.b),
            (OpCode::IntEqual, 1) => (OpCode::IntSLess, three_way.b, three_way.a),
            (OpCode::IntEqual, 0) => (OpCode::IntEqual, three_way.a, three_way.b),
            (OpCode::IntNotEqual, -1) => (OpCode::IntSLessEqual, three_way.b, three_way.a),
            (OpCode::IntNotEqual, 1) => (OpCode::IntSLessEqual, three_way.a, three_way.b),
            (OpCode::IntNotEqual, 0) => (OpCode::IntNotEqual, three_way.a, three_way.b),
            (OpCode::IntSLess, 0) => (OpCode::IntSLess, three_way.a, three_way.b),
            (OpCode::IntSLessEqual, 0) => (OpCode::IntSLessEqual, three_way.a, three_way.b),
            _ => return Ok(0),
        };
        fd.op_set_opcode(op, new_code);
        fd.op_set_input(op, out_a, 0);
        fd.op_set_input(op, out_b, 1);
        Ok(1)
    }
}

/// Pushes `BOOL_NEGATE` through a double negation or a comparison (spec
/// §4.4 `boolean_negate`).
pub struct BooleanNegate;

impl Rule for BooleanNegate {
    fn name(&self) -> &'static str {
        "boolean_negate"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::BoolNegate])
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
        let Some(def) = fd.varnode(input).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        match inner.opcode {
            OpCode::BoolNegate => {
                let Some(x) = inner.input(0) else {
                    return Ok(0);
                };
                Ok(replace_with_copy(fd, op, x))
            }
            OpCode::IntEqual | OpCode::IntNotEqual if inner.inputs.len() == 2 => {
                let (Some(x), Some(y)) = (inner.input(0), inner.input(1)) else {
                    return Ok(0);
                };
                let new_code = if inner.opcode == OpCode::IntEqual {
                    OpCode::IntNotEqual
                } else {
                    OpCode::IntEqual
                };
                fd.op_set_opcode(op, new_code);
                fd.op_set_input(op, x, 0);
                fd.op_set_input(op, y, 1);
                Ok(1)
            }
            _ => Ok(0),
        }
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
    fn less_equal_collapses_less_or_equal() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));

        let less = fd.new_op(OpCode::IntLess, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(less, block);
        fd.op_set_input(less, a, 0);
        fd.op_set_input(less, b, 1);
        let less_out = fd.new_unique_out(1, less);

        let eq = fd.new_op(OpCode::IntEqual, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(eq, less);
        fd.op_set_input(eq, a, 0);
        fd.op_set_input(eq, b, 1);
        let eq_out = fd.new_unique_out(1, eq);

        let or_op = fd.new_op(OpCode::BoolOr, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(or_op, eq);
        fd.op_set_input(or_op, less_out, 0);
        fd.op_set_input(or_op, eq_out, 1);
        let _out = fd.new_unique_out(1, or_op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(LessEqual.apply_op(or_op, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(or_op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntLessEqual);
        assert_eq!(rewritten.input(0), Some(a));
        assert_eq!(rewritten.input(1), Some(b));
    }

    #[test]
    fn less_one_becomes_equal_zero() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let one = fd.new_constant(4, 1);
        let op = fd.new_op(OpCode::IntLess, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, one, 1);
        let _out = fd.new_unique_out(1, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(LessOne.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntEqual);
        assert_eq!(fd.varnode(rewritten.input(1).unwrap()).unwrap().constant_value(), Some(0));
    }

    #[test]
    fn sless2zero_recognizes_sign_bit_test() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let amt = fd.new_constant(4, 31);
        let shr = fd.new_op(OpCode::IntRight, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(shr, block);
        fd.op_set_input(shr, x, 0);
        fd.op_set_input(shr, amt, 1);
        let shr_out = fd.new_unique_out(4, shr);

        let zero = fd.new_constant(4, 0);
        let ne = fd.new_op(OpCode::IntNotEqual, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(ne, shr);
        fd.op_set_input(ne, shr_out, 0);
        fd.op_set_input(ne, zero, 1);
        let _out = fd.new_unique_out(1, ne);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(SLess2Zero.apply_op(ne, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(ne).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntSLess);
        assert_eq!(rewritten.input(0), Some(x));
    }

    #[test]
    fn sless_to_less_uses_nz_mask() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));
        fd.varnode_mut(a).unwrap().nz_mask = 0x7FFF_FFFF;
        fd.varnode_mut(b).unwrap().nz_mask = 0x7FFF_FFFF;
        let op = fd.new_op(OpCode::IntSLess, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, b, 1);
        let _out = fd.new_unique_out(1, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(SlessToLess.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        assert_eq!(fd.op(op).unwrap().opcode, OpCode::IntLess);
    }

    #[test]
    fn equal2_constant_folds_additive_term() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let c1 = fd.new_constant(4, 5);
        let add = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(add, block);
        fd.op_set_input(add, x, 0);
        fd.op_set_input(add, c1, 1);
        let add_out = fd.new_unique_out(4, add);

        let c2 = fd.new_constant(4, 10);
        let eq = fd.new_op(OpCode::IntEqual, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(eq, add);
        fd.op_set_input(eq, add_out, 0);
        fd.op_set_input(eq, c2, 1);
        let _out = fd.new_unique_out(1, eq);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(Equal2Constant.apply_op(eq, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(eq).unwrap();
        assert_eq!(rewritten.input(0), Some(x));
        assert_eq!(fd.varnode(rewritten.input(1).unwrap()).unwrap().constant_value(), Some(5));
    }

    #[test]
    fn logic2bool_retypes_single_bit_and() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(1, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(1, TestFunctionBuilder::addr(reg, 1));
        fd.varnode_mut(a).unwrap().nz_mask = 1;
        fd.varnode_mut(b).unwrap().nz_mask = 1;
        let op = fd.new_op(OpCode::IntAnd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, b, 1);
        let _out = fd.new_unique_out(1, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(Logic2Bool.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        assert_eq!(fd.op(op).unwrap().opcode, OpCode::BoolAnd);
    }

    #[test]
    fn not_distribute_applies_de_morgan() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(1, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(1, TestFunctionBuilder::addr(reg, 1));
        let and_op = fd.new_op(OpCode::BoolAnd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(and_op, block);
        fd.op_set_input(and_op, a, 0);
        fd.op_set_input(and_op, b, 1);
        let and_out = fd.new_unique_out(1, and_op);

        let neg = fd.new_op(OpCode::BoolNegate, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(neg, and_op);
        fd.op_set_input(neg, and_out, 0);
        let _out = fd.new_unique_out(1, neg);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(NotDistribute.apply_op(neg, &mut fd, &mut rc).unwrap(), 1);
        assert_eq!(fd.op(neg).unwrap().opcode, OpCode::BoolOr);
    }

    #[test]
    fn boolean_dedup_collapses_self_xor() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(1, TestFunctionBuilder::addr(reg, 0));
        let op = fd.new_op(OpCode::BoolXor, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, a, 1);
        let _out = fd.new_unique_out(1, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(BooleanDedup.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        assert!(fd.op(op).unwrap().is_dead());
    }

    #[test]
    fn three_way_compare_recovers_sless_from_minus_one() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_input(4, TestFunctionBuilder::addr(reg, 4));

        let lt = fd.new_op(OpCode::IntSLess, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(lt, block);
        fd.op_set_input(lt, a, 0);
        fd.op_set_input(lt, b, 1);
        let lt_out = fd.new_unique_out(1, lt);
        let zlt = fd.new_op(OpCode::IntZext, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(zlt, lt);
        fd.op_set_input(zlt, lt_out, 0);
        let zlt_out = fd.new_unique_out(4, zlt);

        let gt = fd.new_op(OpCode::IntSLess, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(gt, zlt);
        fd.op_set_input(gt, b, 0);
        fd.op_set_input(gt, a, 1);
        let gt_out = fd.new_unique_out(1, gt);
        let zgt = fd.new_op(OpCode::IntZext, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(zgt, gt);
        fd.op_set_input(zgt, gt_out, 0);
        let zgt_out = fd.new_unique_out(4, zgt);

        let sub = fd.new_op(OpCode::IntSub, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(sub, zgt);
        fd.op_set_input(sub, zlt_out, 0);
        fd.op_set_input(sub, zgt_out, 1);
        let sub_out = fd.new_unique_out(4, sub);

        let neg_one = fd.new_constant(4, calc_mask(4));
        let eq = fd.new_op(OpCode::IntEqual, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(eq, sub);
        fd.op_set_input(eq, sub_out, 0);
        fd.op_set_input(eq, neg_one, 1);
        let _out = fd.new_unique_out(1, eq);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(ThreeWayCompare.apply_op(eq, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(eq).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntSLess);
        assert_eq!(rewritten.input(0), Some(a));
        assert_eq!(rewritten.input(1), Some(b));
    }
}
