//! Load/store and effect-barrier rules (spec §4.4 "Loads and stores").
//!
//! `LoadVarnode`/`StoreVarnode`/`ExpandLoad` are the same-block,
//! syntactic slice of alias analysis: they recognize a `LOAD`/`STORE`
//! whose address operand is provably the same Varnode (or the same
//! constant) as a neighboring memory op, without needing a full
//! points-to model over arbitrary memory. `IndirectCollapse` handles
//! the complementary case the IR's own `INDIRECT`-to-causing-op
//! encoding (spec §4.2 `new_indirect_creation`) can answer on its own:
//! an effect barrier whose cause has already been proven dead.

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpId,
    VarnodeId,
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
    replace_with_copy,
};

fn same_address(fd: &FunctionData, a: VarnodeId, b: VarnodeId) -> bool {
    a == b || matches!((const_value(fd, a), const_value(fd, b)), (Some(x), Some(y)) if x == y)
}

/// Collapses an `INDIRECT` to a plain copy of its first input once the op
/// it was protecting against (encoded in its second, IOP-space input per
/// `new_indirect_creation`) is gone or marked dead (spec §4.4
/// `indirect_collapse`).
pub struct IndirectCollapse;

impl Rule for IndirectCollapse {
    fn name(&self) -> &'static str {
        "indirect_collapse"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Indirect])
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
        let (Some(value), Some(iop)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(iop_vn) = fd.varnode(iop) else {
            return Ok(0);
        };
        let target = pcode_ir::OpId::from_raw(iop_vn.address.offset as u32);
        let collapses = match fd.op(target) {
            None => true,
            Some(t) => t.is_dead(),
        };
        if !collapses {
            return Ok(0);
        }
        Ok(replace_with_copy(fd, op, value))
    }
}

/// Forwards a `LOAD` to the value a preceding `STORE` to the same
/// (space, address, size) already wrote in the same block, with no
/// intervening memory-writing op that could have clobbered it (spec
/// §4.4 `load_varnode`).
pub struct LoadVarnode;

impl Rule for LoadVarnode {
    fn name(&self) -> &'static str {
        "load_varnode"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Load])
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
        let (Some(space_vn), Some(addr_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(out_vn) = pcode_op.output else {
            return Ok(0);
        };
        let out_size = fd.varnode(out_vn).map(|v| v.size).unwrap_or(0);
        let block = pcode_op.parent;
        let seq = pcode_op.seq;
        let space = const_value(fd, space_vn);

        let ops = fd.block(block).ops.clone();
        let mut forwarded = None;
        for &candidate in ops.iter().rev() {
            let Some(cand) = fd.op(candidate) else {
                continue;
            };
            if cand.seq >= seq {
                continue;
            }
            match cand.opcode {
                OpCode::Store => {
                    if cand.inputs.len() != 3 {
                        break;
                    }
                    let (Some(cs), Some(ca), Some(cv)) =
                        (cand.input(0), cand.input(1), cand.input(2))
                    else {
                        break;
                    };
                    let cv_size = fd.varnode(cv).map(|v| v.size).unwrap_or(0);
                    if const_value(fd, cs) == space
                        && same_address(fd, ca, addr_vn)
                        && cv_size == out_size
                    {
                        forwarded = Some(cv);
                    }
                    break;
                }
                OpCode::Call | OpCode::CallInd | OpCode::CallOther => break,
                _ => continue,
            }
        }
        match forwarded {
            Some(value) => Ok(replace_with_copy(fd, op, value)),
            None => Ok(0),
        }
    }
}

/// Removes a `STORE` that is unconditionally overwritten by a later
/// `STORE` to the same (space, address) before anything in between
/// could read it: the earlier value is never observed (spec §4.4
/// `store_varnode`).
pub struct StoreVarnode;

impl Rule for StoreVarnode {
    fn name(&self) -> &'static str {
        "store_varnode"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Store])
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
        if pcode_op.inputs.len() != 3 {
            return Ok(0);
        }
        let (Some(space_vn), Some(addr_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let block = pcode_op.parent;
        let seq = pcode_op.seq;
        let space = const_value(fd, space_vn);

        let ops = fd.block(block).ops.clone();
        let mut dead = false;
        for &candidate in ops.iter() {
            let Some(cand) = fd.op(candidate) else {
                continue;
            };
            if cand.seq <= seq {
                continue;
            }
            match cand.opcode {
                OpCode::Store => {
                    if cand.inputs.len() != 3 {
                        break;
                    }
                    let (Some(cs), Some(ca)) = (cand.input(0), cand.input(1)) else {
                        break;
                    };
                    if const_value(fd, cs) == space && same_address(fd, ca, addr_vn) {
                        dead = true;
                    }
                    break;
                }
                OpCode::Load
                | OpCode::Call
                | OpCode::CallInd
                | OpCode::CallOther
                | OpCode::Indirect => break,
                _ => continue,
            }
        }
        if dead {
            fd.op_destroy(op);
            return Ok(1);
        }
        Ok(0)
    }
}

/// Expands a `LOAD` whose result is only ever read back through
/// `SUBPIECE` field extractions into one narrower `LOAD` per field, at
/// the field's own address, so later structure-aware rules see direct
/// loads instead of a load-then-slice (spec §4.4 `expand_load`).
pub struct ExpandLoad;

impl Rule for ExpandLoad {
    fn name(&self) -> &'static str {
        "expand_load"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Load])
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
        let (Some(space_vn), Some(addr_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let Some(out_vn) = pcode_op.output else {
            return Ok(0);
        };
        let address = pcode_op.address;
        let space_value = const_value(fd, space_vn).unwrap_or(0);
        let space_size = fd.varnode(space_vn).map(|v| v.size).unwrap_or(8);
        let addr_size = fd.varnode(addr_vn).map(|v| v.size).unwrap_or(8);

        let Some(out) = fd.varnode(out_vn) else {
            return Ok(0);
        };
        if out.descendants.is_empty() {
            return Ok(0);
        }
        let mut fields = Vec::new();
        for &desc_op in &out.descendants {
            let Some(d) = fd.op(desc_op) else {
                return Ok(0);
            };
            if d.opcode != OpCode::SubPiece || d.inputs.len() != 2 || d.input(0) != Some(out_vn) {
                return Ok(0);
            }
            let Some(offset_vn) = d.input(1) else {
                return Ok(0);
            };
            let Some(offset) = const_value(fd, offset_vn) else {
                return Ok(0);
            };
            let Some(sub_out_size) = d.output.and_then(|v| fd.varnode(v)).map(|v| v.size) else {
                return Ok(0);
            };
            fields.push((desc_op, offset, sub_out_size));
        }
        if fields.is_empty() {
            return Ok(0);
        }

        let mut count = 0;
        for (sub_op, offset, sub_out_size) in fields {
            let new_addr = if offset == 0 {
                addr_vn
            } else {
                let off_const = fd.new_constant(addr_size, offset);
                let add_op = fd.new_op(OpCode::IntAdd, 2, address);
                fd.op_insert_before(add_op, op);
                fd.op_set_input(add_op, addr_vn, 0);
                fd.op_set_input(add_op, off_const, 1);
                fd.new_unique_out(addr_size, add_op)
            };
            let space_copy = fd.new_constant(space_size, space_value);
            let narrow_load = fd.new_op(OpCode::Load, 2, address);
            fd.op_insert_before(narrow_load, op);
            fd.op_set_input(narrow_load, space_copy, 0);
            fd.op_set_input(narrow_load, new_addr, 1);
            let narrow_out = fd.new_unique_out(sub_out_size, narrow_load);
            count += replace_with_copy(fd, sub_op, narrow_out);
        }
        Ok(count)
    }
}

/// `FLOAT_NAN(x) -> false` once the caller has asserted NaN never
/// occurs (spec §4.4 `ignore_nan`, driven by
/// [`crate::options::SimplifyOptions::nan_ignore_all`]).
pub struct IgnoreNan;

impl Rule for IgnoreNan {
    fn name(&self) -> &'static str {
        "ignore_nan"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::FloatNan])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        if !ctx.options.nan_ignore_all {
            return Ok(0);
        }
        Ok(super::util::fold_to_constant(fd, op, 0))
    }
}

/// `FLOAT_NEG(FLOAT_NEG(x)) -> x` and `FLOAT_ABS(FLOAT_NEG(x)) ->
/// FLOAT_ABS(x)`: sign-bit round-trips a compiler emits around a
/// negation cancel out (spec §4.4 `float_sign_cleanup`).
pub struct FloatSignCleanup;

impl Rule for FloatSignCleanup {
    fn name(&self) -> &'static str {
        "float_sign_cleanup"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::FloatNeg, OpCode::FloatAbs])
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
        let opcode = pcode_op.opcode;
        let Some(input) = pcode_op.input(0) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(input).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(inner) = fd.op(def) else {
            return Ok(0);
        };
        if inner.opcode != OpCode::FloatNeg {
            return Ok(0);
        }
        let Some(x) = inner.input(0) else {
            return Ok(0);
        };
        match opcode {
            OpCode::FloatNeg => Ok(replace_with_copy(fd, op, x)),
            OpCode::FloatAbs => {
                fd.op_set_input(op, x, 0);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

/// `FLOAT_FLOAT2FLOAT(x)` folds away when the input and output
/// precisions are identical: a same-width float-to-float cast carries
/// the value unchanged (spec §4.4 `float_cast`).
pub struct FloatCast;

impl Rule for FloatCast {
    fn name(&self) -> &'static str {
        "float_cast"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::FloatFloat2Float])
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
        let Some(out_vn) = pcode_op.output else {
            return Ok(0);
        };
        let in_size = fd.varnode(input).map(|v| v.size).unwrap_or(0);
        let out_size = fd.varnode(out_vn).map(|v| v.size).unwrap_or(0);
        if in_size == 0 || in_size != out_size {
            return Ok(0);
        }
        Ok(replace_with_copy(fd, op, input))
    }
}

fn f64_to_float_bits(size: u32, value: f64) -> Option<u128> {
    match size {
        4 => Some((value as f32).to_bits() as u128),
        8 => Some(value.to_bits() as u128),
        _ => None,
    }
}

/// Constant-folds `FLOAT_INT2FLOAT(c)` to the literal float bit pattern
/// at compile time rather than leaving the conversion as a runtime op
/// (spec §4.4 `int2float_collapse`).
pub struct Int2FloatCollapse;

impl Rule for Int2FloatCollapse {
    fn name(&self) -> &'static str {
        "int2float_collapse"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::FloatInt2Float])
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
        let Some(value) = const_value(fd, input) else {
            return Ok(0);
        };
        let in_size = fd.varnode(input).map(|v| v.size).unwrap_or(0);
        let Some(out_size) = pcode_op.output.and_then(|v| fd.varnode(v)).map(|v| v.size) else {
            return Ok(0);
        };
        let signed_value = if in_size == 0 {
            return Ok(0);
        } else {
            pcode_types::mask::sign_extend(value, in_size * 8 - 1) as i128 as f64
        };
        let Some(bits) = f64_to_float_bits(out_size, signed_value) else {
            return Ok(0);
        };
        Ok(super::util::fold_to_constant(fd, op, bits))
    }
}
