//! Division-by-constant and related multiplicative-idiom recovery (spec
//! §4.4 "Division").
//!
//! A compiler lowers `x / d` (a compile-time constant divisor that isn't
//! a power of two) into a fixed-point-reciprocal multiply followed by a
//! shift. [`magicu_for`] is the unsigned magic-number selection algorithm
//! from Hacker's Delight §10-9 (`magicu2`), generalized from its
//! 32-bit-specific presentation to an arbitrary bit width: it recovers
//! the exact multiplier and shift amount a real compiler would have
//! chosen, including the cases that need the extra "round up" addition
//! term (`add_indicator`), rather than a self-consistent but
//! non-compiler-matching formula.

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

use super::util::const_value;

/// Unsigned magic-number selection (Hacker's Delight `magicu2`,
/// generalized over bit width). Returns `(magic, shift, add_indicator)`
/// such that, for `add_indicator == false`:
///
/// `x / d == (x * magic) >> (bits + shift)` computed at `2*bits` width.
///
/// For `add_indicator == true` the plain multiply-shift isn't exact on
/// its own; the caller must add the Hacker's Delight round-up correction
/// (see [`DivTermAdd`]) before the final `shift - 1` right shift.
fn magicu_for(d: u128, bits: u32) -> (u128, u32, bool) {
    debug_assert!(d >= 2 && bits >= 2 && bits <= 64);
    let max = calc_mask(bits.div_ceil(8).max(1));
    let half = 1u128 << (bits - 1);
    let mut add_indicator = false;

    let nc = max - (max % d);
    let mut p: u32 = bits - 1;
    let mut q1 = half / nc;
    let mut r1 = half - q1 * nc;
    let mut q2 = (half - 1) / d;
    let mut r2 = (half - 1) - q2 * d;

    loop {
        p += 1;
        if r1 >= nc - r1 {
            q1 = 2 * q1 + 1;
            r1 = 2 * r1 - nc;
        } else {
            q1 = 2 * q1;
            r1 = 2 * r1;
        }
        if r2 + 1 >= d - r2 {
            if q2 >= half - 1 {
                add_indicator = true;
            }
            q2 = 2 * q2 + 1;
            r2 = 2 * r2 + 1 - d;
        } else {
            if q2 >= half {
                add_indicator = true;
            }
            q2 = 2 * q2;
            r2 = 2 * r2 + 1;
        }
        let delta = d - 1 - r2;
        if p >= 2 * bits || !(q1 < delta || (q1 == delta && r1 == 0)) {
            break;
        }
    }
    (q2 + 1, p - bits, add_indicator)
}

/// The largest divisor this rule searches for a matching reciprocal.
/// Compiler-emitted division-by-constant overwhelmingly targets small
/// literals (array strides, percentages, bases); unbounded search would
/// cost a full pass over `u64` for no realistic benefit.
const MAX_DIVISOR: u128 = 4096;

fn out_size_of(fd: &FunctionData, op: OpId) -> u32 {
    fd.op(op)
        .and_then(|o| o.output)
        .and_then(|v| fd.varnode(v))
        .map(|v| v.size)
        .unwrap_or(0)
}

/// Matches `INT_MULT(x, magic)` whose output Varnode is twice `x`'s
/// width, the p-code idiom for "compute the full double-width product"
/// that the magic-number multiply-shift sequence relies on.
fn match_wide_mult(fd: &FunctionData, vn: VarnodeId) -> Option<(VarnodeId, u128, u32)> {
    let def = fd.varnode(vn)?.def?;
    let mult = fd.op(def)?;
    if mult.opcode != OpCode::IntMult || mult.inputs.len() != 2 {
        return None;
    }
    let (x, magic_vn) = (mult.input(0)?, mult.input(1)?);
    let magic = const_value(fd, magic_vn)?;
    let x_size = fd.varnode(x)?.size;
    let wide_size = out_size_of(fd, def);
    if wide_size != x_size * 2 {
        return None;
    }
    Some((x, magic, x_size))
}

/// Matches `SUBPIECE(INT_MULT(x, magic), out_size)`, the high-half
/// extraction ("get the top `out_size` bytes of the double-width
/// product") that the round-up correction in [`DivTermAdd`] operates on.
fn match_mulhi(fd: &FunctionData, vn: VarnodeId) -> Option<(VarnodeId, u128, u32)> {
    let def = fd.varnode(vn)?.def?;
    let sub_op = fd.op(def)?;
    if sub_op.opcode != OpCode::SubPiece || sub_op.inputs.len() != 2 {
        return None;
    }
    let wide_vn = sub_op.input(0)?;
    let offset_vn = sub_op.input(1)?;
    let offset = const_value(fd, offset_vn)?;
    let (x, magic, out_size) = match_wide_mult(fd, wide_vn)?;
    if offset != out_size as u128 {
        return None;
    }
    Some((x, magic, out_size))
}

/// Recovers `x / d` from the canonical unsigned multiply-then-shift
/// sequence `(x * magic) >> (bits + s)`, searching small divisors for
/// one whose real compiler-chosen magic number ([`magicu_for`]) matches
/// (spec §4.4 `div_opt`).
pub struct DivOpt;

impl Rule for DivOpt {
    fn name(&self) -> &'static str {
        "div_opt"
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
        let (Some(mult_vn), Some(shift_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(total_shift) = const_value(fd, shift_vn) else {
            return Ok(0);
        };
        let Some((x, magic, out_size)) = match_wide_mult(fd, mult_vn) else {
            return Ok(0);
        };
        let bits = out_size * 8;
        if bits < 2 || bits > 64 {
            return Ok(0);
        }

        let mut divisor = 2u128;
        while divisor <= MAX_DIVISOR {
            let (candidate_magic, s, add_indicator) = magicu_for(divisor, bits);
            if !add_indicator
                && candidate_magic & calc_mask(out_size) == magic & calc_mask(out_size)
                && (bits + s) as u128 == total_shift
            {
                let d_vn = fd.new_constant(out_size, divisor);
                fd.op_set_opcode(op, OpCode::IntDiv);
                fd.op_set_input(op, x, 0);
                fd.op_set_input(op, d_vn, 1);
                return Ok(1);
            }
            divisor += 1;
        }
        Ok(0)
    }
}

/// Recovers `x / d` for divisors whose magic number needs the Hacker's
/// Delight round-up correction: `t = MULHI(x, magic); q = (t + ((x - t)
/// >> 1)) >> (s-1)` (spec §4.4 `div_term_add`).
pub struct DivTermAdd;

impl Rule for DivTermAdd {
    fn name(&self) -> &'static str {
        "div_term_add"
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
        let (Some(sum_vn), Some(final_shift_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(final_shift) = const_value(fd, final_shift_vn) else {
            return Ok(0);
        };

        // sum = t + half, half = (x - t) >> 1
        let Some(sum_def) = fd.varnode(sum_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(sum_op) = fd.op(sum_def) else {
            return Ok(0);
        };
        if sum_op.opcode != OpCode::IntAdd || sum_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(t_cand), Some(half_cand)) = (sum_op.input(0), sum_op.input(1)) else {
            return Ok(0);
        };
        for (t_vn, half_vn) in [(t_cand, half_cand), (half_cand, t_cand)] {
            let Some((x, magic, out_size)) = match_mulhi(fd, t_vn) else {
                continue;
            };
            let Some(half_def) = fd.varnode(half_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(half_op) = fd.op(half_def) else {
                continue;
            };
            if half_op.opcode != OpCode::IntRight || half_op.inputs.len() != 2 {
                continue;
            }
            let (Some(diff_vn), Some(one_vn)) = (half_op.input(0), half_op.input(1)) else {
                continue;
            };
            if const_value(fd, one_vn) != Some(1) {
                continue;
            }
            let Some(diff_def) = fd.varnode(diff_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(diff_op) = fd.op(diff_def) else {
                continue;
            };
            if diff_op.opcode != OpCode::IntSub || diff_op.inputs.len() != 2 {
                continue;
            }
            let (Some(diff_x), Some(diff_t)) = (diff_op.input(0), diff_op.input(1)) else {
                continue;
            };
            if diff_x != x || diff_t != t_vn {
                continue;
            }

            let bits = out_size * 8;
            if bits < 2 || bits > 64 {
                continue;
            }
            let mut divisor = 2u128;
            while divisor <= MAX_DIVISOR {
                let (candidate_magic, s, add_indicator) = magicu_for(divisor, bits);
                if add_indicator
                    && candidate_magic & calc_mask(out_size) == magic & calc_mask(out_size)
                    && s >= 1
                    && (s - 1) as u128 == final_shift
                {
                    let d_vn = fd.new_constant(out_size, divisor);
                    fd.op_set_opcode(op, OpCode::IntDiv);
                    fd.op_set_input(op, x, 0);
                    fd.op_set_input(op, d_vn, 1);
                    return Ok(1);
                }
                divisor += 1;
            }
        }
        Ok(0)
    }
}

/// `x s/ 2^n -> (x + ((x s>> (bits-1)) >> (bits-n))) s>> n`: the
/// sign-correction idiom a compiler uses to round a negative dividend
/// toward zero before an arithmetic shift implements signed division by
/// a power of two (spec §4.4 `sign_div2`).
pub struct SignDiv2;

impl Rule for SignDiv2 {
    fn name(&self) -> &'static str {
        "sign_div2"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntSRight])
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
        let (Some(sum_vn), Some(n_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(n) = const_value(fd, n_vn) else {
            return Ok(0);
        };
        if n == 0 {
            return Ok(0);
        }
        let Some(sum_def) = fd.varnode(sum_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(sum_op) = fd.op(sum_def) else {
            return Ok(0);
        };
        if sum_op.opcode != OpCode::IntAdd || sum_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(a), Some(b)) = (sum_op.input(0), sum_op.input(1)) else {
            return Ok(0);
        };
        for (x_cand, correction) in [(a, b), (b, a)] {
            let Some(corr_def) = fd.varnode(correction).and_then(|v| v.def) else {
                continue;
            };
            let Some(corr_op) = fd.op(corr_def) else {
                continue;
            };
            if corr_op.opcode != OpCode::IntRight || corr_op.inputs.len() != 2 {
                continue;
            }
            let (Some(sign_vn), Some(shift2_vn)) = (corr_op.input(0), corr_op.input(1)) else {
                continue;
            };
            let Some(shift2) = const_value(fd, shift2_vn) else {
                continue;
            };
            let Some(sign_def) = fd.varnode(sign_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(sign_op) = fd.op(sign_def) else {
                continue;
            };
            if sign_op.opcode != OpCode::IntSRight || sign_op.inputs.len() != 2 {
                continue;
            }
            let (Some(x), Some(sign_amt_vn)) = (sign_op.input(0), sign_op.input(1)) else {
                continue;
            };
            if x != x_cand {
                continue;
            }
            let x_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
            let bits = x_size * 8;
            let Some(sign_amt) = const_value(fd, sign_amt_vn) else {
                continue;
            };
            if bits == 0
                || sign_amt as u32 != bits - 1
                || shift2 as u32 != bits - n as u32
            {
                continue;
            }
            let d_vn = fd.new_constant(x_size, 1u128 << n);
            fd.op_set_opcode(op, OpCode::IntSDiv);
            fd.op_set_input(op, x, 0);
            fd.op_set_input(op, d_vn, 1);
            return Ok(1);
        }
        Ok(0)
    }
}

/// `x - (x / d) * d -> x % d` (spec §4.4 `mod_opt`). Runs after
/// [`DivOpt`]/[`DivTermAdd`] have already turned the reciprocal multiply
/// into a plain `INT_DIV` within the same fixed-point pass.
pub struct ModOpt;

impl Rule for ModOpt {
    fn name(&self) -> &'static str {
        "mod_opt"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntSub])
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
        let (Some(x), Some(prod_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(prod_def) = fd.varnode(prod_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(prod_op) = fd.op(prod_def) else {
            return Ok(0);
        };
        if prod_op.opcode != OpCode::IntMult || prod_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(quot), Some(d_vn)) = (prod_op.input(0), prod_op.input(1)) else {
            return Ok(0);
        };
        let Some(d) = const_value(fd, d_vn) else {
            return Ok(0);
        };
        let Some(quot_def) = fd.varnode(quot).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(quot_op) = fd.op(quot_def) else {
            return Ok(0);
        };
        let div_code = quot_op.opcode;
        if !matches!(div_code, OpCode::IntDiv | OpCode::IntSDiv) || quot_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(quot_x), Some(quot_d_vn)) = (quot_op.input(0), quot_op.input(1)) else {
            return Ok(0);
        };
        if quot_x != x || const_value(fd, quot_d_vn) != Some(d) {
            return Ok(0);
        }
        let rem_code = if div_code == OpCode::IntDiv {
            OpCode::IntRem
        } else {
            OpCode::IntSRem
        };
        fd.op_set_opcode(op, rem_code);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, d_vn, 1);
        Ok(1)
    }
}

/// `x - (x s>> n << n) -> x s% 2^n` expressed via the AND-masking form a
/// compiler emits for signed modulo by a power of two once the sign
/// adjustment from [`SignDiv2`] is in place (spec §4.4 `sign_mod2_opt`).
pub struct SignMod2Opt;

impl Rule for SignMod2Opt {
    fn name(&self) -> &'static str {
        "sign_mod2_opt"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntSub])
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
        let (Some(x), Some(shl_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(shl_def) = fd.varnode(shl_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(shl_op) = fd.op(shl_def) else {
            return Ok(0);
        };
        if shl_op.opcode != OpCode::IntLeft || shl_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(div_vn), Some(n1_vn)) = (shl_op.input(0), shl_op.input(1)) else {
            return Ok(0);
        };
        let Some(n1) = const_value(fd, n1_vn) else {
            return Ok(0);
        };
        let Some(div_def) = fd.varnode(div_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(div_op) = fd.op(div_def) else {
            return Ok(0);
        };
        if div_op.opcode != OpCode::IntSDiv || div_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(div_x), Some(d_vn)) = (div_op.input(0), div_op.input(1)) else {
            return Ok(0);
        };
        let Some(d) = const_value(fd, d_vn) else {
            return Ok(0);
        };
        if div_x != x || !d.is_power_of_two() || d.trailing_zeros() as u128 != n1 {
            return Ok(0);
        }
        let d_copy = fd.new_constant(fd.varnode(d_vn).map(|v| v.size).unwrap_or(1), d);
        fd.op_set_opcode(op, OpCode::IntSRem);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, d_copy, 1);
        Ok(1)
    }
}

/// `(x / d1) / d2 -> x / (d1*d2)` when the combined divisor doesn't
/// overflow the operand width (spec §4.4 `div_chain`).
pub struct DivChain;

impl Rule for DivChain {
    fn name(&self) -> &'static str {
        "div_chain"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntDiv])
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
        let (Some(inner_vn), Some(d2_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(d2) = const_value(fd, d2_vn) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(inner_vn).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        if inner.opcode != OpCode::IntDiv || inner.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(x), Some(d1_vn)) = (inner.input(0), inner.input(1)) else {
            return Ok(0);
        };
        let Some(d1) = const_value(fd, d1_vn) else {
            return Ok(0);
        };
        let size = fd.varnode(d1_vn).map(|v| v.size).unwrap_or(0);
        if size == 0 {
            return Ok(0);
        }
        let Some(combined) = d1.checked_mul(d2) else {
            return Ok(0);
        };
        if combined > calc_mask(size) {
            return Ok(0);
        }
        let new_d = fd.new_constant(size, combined);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, new_d, 1);
        Ok(1)
    }
}

/// `x * -1 -> -x` (spec §4.4 `mult_neg_one`).
pub struct MultNegOne;

impl Rule for MultNegOne {
    fn name(&self) -> &'static str {
        "mult_neg_one"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntMult])
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
        let all_ones = calc_mask(out_size);
        for (value, constant) in [(a, b), (b, a)] {
            if const_value(fd, constant) == Some(all_ones) {
                fd.op_remove_input(op, if value == a { 1 } else { 0 });
                fd.op_set_input(op, value, 0);
                fd.op_set_opcode(op, OpCode::Int2Comp);
                return Ok(1);
            }
        }
        Ok(0)
    }
}

/// `(-x) * c -> x * (-c)`: pushes a two's-complement negation into a
/// multiplicative constant instead of carrying it as a separate op
/// (spec §4.4 `2comp2_mult`).
pub struct TwoComp2Mult;

impl Rule for TwoComp2Mult {
    fn name(&self) -> &'static str {
        "2comp2_mult"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntMult])
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
        for (neg_vn, c_vn) in [(a, b), (b, a)] {
            let Some(c) = const_value(fd, c_vn) else {
                continue;
            };
            let Some(def) = fd.varnode(neg_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(neg_op) = fd.op(def) else {
                continue;
            };
            if neg_op.opcode != OpCode::Int2Comp {
                continue;
            }
            let Some(x) = neg_op.input(0) else {
                continue;
            };
            let size = fd.varnode(c_vn).map(|v| v.size).unwrap_or(0);
            if size == 0 {
                continue;
            }
            let full = calc_mask(size);
            let neg_c = (full.wrapping_sub(c).wrapping_add(1)) & full;
            let new_c = fd.new_constant(size, neg_c);
            fd.op_set_input(op, x, if neg_vn == a { 0 } else { 1 });
            fd.op_set_input(op, new_c, if neg_vn == a { 1 } else { 0 });
            return Ok(1);
        }
        Ok(0)
    }
}

/// `-(a - b) -> b - a` (spec §4.4 `2comp2_sub`).
pub struct TwoComp2Sub;

impl Rule for TwoComp2Sub {
    fn name(&self) -> &'static str {
        "2comp2_sub"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Int2Comp])
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
        let Some(sub_op) = fd.op(def) else {
            return Ok(0);
        };
        if sub_op.opcode != OpCode::IntSub || sub_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(a), Some(b)) = (sub_op.input(0), sub_op.input(1)) else {
            return Ok(0);
        };
        fd.op_append_input(op, b);
        fd.op_set_opcode(op, OpCode::IntSub);
        fd.op_set_input(op, b, 0);
        fd.op_set_input(op, a, 1);
        Ok(1)
    }
}
