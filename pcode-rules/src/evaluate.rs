//! The per-opcode constant-folding behavior table (spec §4.4
//! `collapse_constants`, §9 "Double-dispatch for op-code behavior").
//!
//! Modeled as a flat match over [`OpCode`] rather than a vtable, per spec
//! §9's note that a dispatch table indexed by the op-code enum is more
//! cache-friendly than virtual dispatch — in Rust that's simply a `match`,
//! which the compiler lowers to a jump table for a dense enum.

use pcode_types::mask::{
    calc_mask,
    shift_left,
    shift_right_signed,
    shift_right_unsigned,
    sign_extend,
};
use pcode_ir::OpCode;

/// Evaluates a unary op-code against a constant-folded input.
/// `out_size`/`in_size` are in bytes. Returns `None` for op-codes this
/// table does not constant-fold (loads, calls, branches, float ops not
/// modeled here, ...).
pub fn evaluate_unary(opcode: OpCode, out_size: u32, in_size: u32, input: u128) -> Option<u128> {
    let in_bits = in_size * 8;
    let out_mask = calc_mask(out_size);
    let value = match opcode {
        OpCode::Copy => input,
        OpCode::IntNegate => (!input) & calc_mask(in_size),
        OpCode::Int2Comp => input.wrapping_neg() & calc_mask(in_size),
        OpCode::BoolNegate => {
            if input & 1 == 0 {
                1
            } else {
                0
            }
        }
        OpCode::IntZext => input,
        OpCode::IntSext => sign_extend(input, in_bits.saturating_sub(1)),
        OpCode::PopCount => input.count_ones() as u128,
        OpCode::LzCount => pcode_types::mask::count_leading_zeros(input, in_bits) as u128,
        _ => return None,
    };
    Some(value & out_mask)
}

/// Evaluates a binary op-code against two constant-folded inputs, both of
/// `in_size` bytes (spec invariant P1: uniform operand size for arithmetic
/// op-codes), producing an `out_size`-byte result.
pub fn evaluate_binary(
    opcode: OpCode,
    out_size: u32,
    in_size: u32,
    a: u128,
    b: u128,
) -> Option<u128> {
    let bits = in_size * 8;
    let mask = calc_mask(in_size);
    let out_mask = calc_mask(out_size);
    let sa = sign_extend(a & mask, bits.saturating_sub(1));
    let sb = sign_extend(b & mask, bits.saturating_sub(1));
    let value = match opcode {
        OpCode::IntAdd => a.wrapping_add(b) & mask,
        OpCode::IntSub => a.wrapping_sub(b) & mask,
        OpCode::IntMult => a.wrapping_mul(b) & mask,
        OpCode::IntDiv => {
            if b & mask == 0 {
                return None;
            }
            (a & mask) / (b & mask)
        }
        OpCode::IntSDiv => {
            if sb == 0 {
                return None;
            }
            ((sa as i128) / (sb as i128)) as u128 & mask
        }
        OpCode::IntRem => {
            if b & mask == 0 {
                return None;
            }
            (a & mask) % (b & mask)
        }
        OpCode::IntSRem => {
            if sb == 0 {
                return None;
            }
            ((sa as i128) % (sb as i128)) as u128 & mask
        }
        OpCode::IntAnd => a & b & mask,
        OpCode::IntOr => (a | b) & mask,
        OpCode::IntXor => (a ^ b) & mask,
        OpCode::IntLeft => shift_left(a & mask, (b & mask) as u32, bits),
        OpCode::IntRight => shift_right_unsigned(a & mask, (b & mask) as u32, bits),
        OpCode::IntSRight => shift_right_signed(a & mask, (b & mask) as u32, bits),
        OpCode::IntEqual => ((a & mask) == (b & mask)) as u128,
        OpCode::IntNotEqual => ((a & mask) != (b & mask)) as u128,
        OpCode::IntLess => ((a & mask) < (b & mask)) as u128,
        OpCode::IntLessEqual => ((a & mask) <= (b & mask)) as u128,
        OpCode::IntSLess => (sa < sb) as u128,
        OpCode::IntSLessEqual => (sa <= sb) as u128,
        OpCode::IntCarry => {
            let sum = (a & mask).wrapping_add(b & mask);
            ((sum & mask) < (a & mask)) as u128
        }
        OpCode::IntSCarry => {
            let sum = sa.wrapping_add(sb);
            let overflow = (sa >= 0) == (sb >= 0) && (sum >= 0) != (sa >= 0);
            overflow as u128
        }
        OpCode::IntSBorrow => {
            let diff = sa.wrapping_sub(sb);
            let overflow = (sa >= 0) != (sb >= 0) && (diff >= 0) != (sa >= 0);
            overflow as u128
        }
        OpCode::BoolAnd => (a & 1 != 0 && b & 1 != 0) as u128,
        OpCode::BoolOr => (a & 1 != 0 || b & 1 != 0) as u128,
        OpCode::BoolXor => ((a & 1) ^ (b & 1)) as u128,
        _ => return None,
    };
    Some(value & out_mask)
}
