//! Dead-code and trivial-identity rules (spec §4.4 "Dead code").

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpFlags,
    OpId,
    VarnodeFlags,
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

fn has_side_effect(opcode: OpCode) -> bool {
    matches!(
        opcode,
        OpCode::Store
            | OpCode::Branch
            | OpCode::CBranch
            | OpCode::BranchInd
            | OpCode::Call
            | OpCode::CallInd
            | OpCode::CallOther
            | OpCode::Return
            | OpCode::Indirect
    )
}

/// Removes an op whose output has no descendants and lives in a space
/// that permits dead-code elimination (spec §4.4 `early_removal`, §6.6
/// `dead_removal_allowed`).
pub struct EarlyRemoval;

impl Rule for EarlyRemoval {
    fn name(&self) -> &'static str {
        "early_removal"
    }

    fn op_list(&self) -> OpList {
        OpList::Universal
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
        if has_side_effect(pcode_op.opcode) {
            return Ok(0);
        }
        let Some(out) = pcode_op.output else {
            return Ok(0);
        };
        let Some(vn) = fd.varnode(out) else {
            return Ok(0);
        };
        if !vn.descendants.is_empty() {
            return Ok(0);
        }
        if vn.flags.intersects(VarnodeFlags::ADDR_TIED | VarnodeFlags::AUTO_LIVE) {
            return Ok(0);
        }
        let allowed = fd
            .spaces()
            .get(vn.address.space)
            .map(|s| s.dead_removal_allowed)
            .unwrap_or(false);
        if !allowed {
            return Ok(0);
        }
        fd.op_destroy(op);
        Ok(1)
    }
}

/// Collapses the additive/multiplicative/bitwise identities: `x+0`,
/// `x|0`, `x^0` to `x`; `x*1` to `x`; `x*0`/`x&0` to `0`; `x & -1` to `x`
/// (spec §4.4 `identity_el`).
pub struct IdentityEl;

impl Rule for IdentityEl {
    fn name(&self) -> &'static str {
        "identity_el"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[
            OpCode::IntAdd,
            OpCode::IntOr,
            OpCode::IntXor,
            OpCode::IntMult,
            OpCode::IntAnd,
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
        let opcode = pcode_op.opcode;
        let out_size = pcode_op
            .output
            .and_then(|o| fd.varnode(o))
            .map(|v| v.size)
            .unwrap_or(0);
        let full = calc_mask(out_size);

        for (value_vn, const_vn) in [(a, b), (b, a)] {
            let Some(c) = const_value(fd, const_vn) else {
                continue;
            };
            match opcode {
                OpCode::IntAdd | OpCode::IntOr | OpCode::IntXor if c == 0 => {
                    return Ok(replace_with_copy(fd, op, value_vn));
                }
                OpCode::IntMult if c == 1 => {
                    return Ok(replace_with_copy(fd, op, value_vn));
                }
                OpCode::IntMult if c == 0 => {
                    return Ok(fold_to_constant(fd, op, 0));
                }
                OpCode::IntAnd if c == full => {
                    return Ok(replace_with_copy(fd, op, value_vn));
                }
                OpCode::IntAnd if c == 0 => {
                    return Ok(fold_to_constant(fd, op, 0));
                }
                _ => {}
            }
        }
        Ok(0)
    }
}

/// Collapses self-referential arithmetic and comparisons: `x-x`, `x^x` to
/// `0`; `x&x`, `x|x` to `x`; `x==x` to `true`; `x!=x`, `x<x`, `x s< x` to
/// `false`; `x-0` to `x` (spec §4.4 `trivial_arith`, `trivial_bool`).
pub struct TrivialArith;

impl Rule for TrivialArith {
    fn name(&self) -> &'static str {
        "trivial_arith"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[
            OpCode::IntSub,
            OpCode::IntXor,
            OpCode::IntAnd,
            OpCode::IntOr,
            OpCode::IntEqual,
            OpCode::IntNotEqual,
            OpCode::IntLess,
            OpCode::IntSLess,
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
        let opcode = pcode_op.opcode;

        if opcode == OpCode::IntSub {
            if let Some(c) = const_value(fd, b) {
                if c == 0 {
                    return Ok(replace_with_copy(fd, op, a));
                }
            }
        }

        if a != b {
            return Ok(0);
        }
        match opcode {
            OpCode::IntXor | OpCode::IntSub => Ok(fold_to_constant(fd, op, 0)),
            OpCode::IntAnd | OpCode::IntOr => Ok(replace_with_copy(fd, op, a)),
            OpCode::IntEqual => Ok(fold_to_constant(fd, op, 1)),
            OpCode::IntNotEqual | OpCode::IntLess | OpCode::IntSLess => {
                Ok(fold_to_constant(fd, op, 0))
            }
            _ => Ok(0),
        }
    }
}

/// Constant-folds any op whose every input is already a constant,
/// dispatching through the shared evaluation table (spec §4.4
/// `collapse_constants`).
pub struct CollapseConstants;

impl Rule for CollapseConstants {
    fn name(&self) -> &'static str {
        "collapse_constants"
    }

    fn op_list(&self) -> OpList {
        OpList::Universal
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
        let Some(out) = pcode_op.output else {
            return Ok(0);
        };
        let out_size = fd.varnode(out).map(|v| v.size).unwrap_or(0);
        match pcode_op.inputs.len() {
            1 => {
                let Some(a) = pcode_op.input(0) else {
                    return Ok(0);
                };
                let Some(av) = const_value(fd, a) else {
                    return Ok(0);
                };
                let in_size = fd.varnode(a).map(|v| v.size).unwrap_or(0);
                match crate::evaluate::evaluate_unary(pcode_op.opcode, out_size, in_size, av) {
                    Some(v) => Ok(fold_to_constant(fd, op, v)),
                    None => Ok(0),
                }
            }
            2 => {
                let (Some(a), Some(b)) = (pcode_op.input(0), pcode_op.input(1)) else {
                    return Ok(0);
                };
                let (Some(av), Some(bv)) = (const_value(fd, a), const_value(fd, b)) else {
                    return Ok(0);
                };
                let in_size = fd.varnode(a).map(|v| v.size).unwrap_or(0);
                match crate::evaluate::evaluate_binary(pcode_op.opcode, out_size, in_size, av, bv)
                {
                    Some(v) => Ok(fold_to_constant(fd, op, v)),
                    None => Ok(0),
                }
            }
            _ => Ok(0),
        }
    }
}

/// Chases an input back through a `COPY` chain, rewiring directly to the
/// `COPY`'s own source (spec §4.4 `propagate_copy`). Skips `COPY`s flagged
/// [`OpFlags::RET_COPY`], which exist to pin a return value's storage
/// location and must survive even when otherwise redundant.
pub struct PropagateCopy;

impl Rule for PropagateCopy {
    fn name(&self) -> &'static str {
        "propagate_copy"
    }

    fn op_list(&self) -> OpList {
        OpList::Universal
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
        if pcode_op.opcode == OpCode::MultiEqual {
            // Phi operands are positionally tied to predecessor blocks
            // (invariant P4); bypassing one here would desync that
            // correspondence. `push_multi` owns MULTIEQUAL's copy-chasing.
            return Ok(0);
        }
        let nin = pcode_op.inputs.len();
        for slot in 0..nin {
            let Some(vn) = fd.op(op).and_then(|o| o.input(slot)) else {
                continue;
            };
            let Some(def) = fd.varnode(vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(def_op) = fd.op(def) else {
                continue;
            };
            if def_op.opcode != OpCode::Copy || def_op.flags.contains(OpFlags::RET_COPY) {
                continue;
            }
            let Some(src) = def_op.input(0) else {
                continue;
            };
            if src == vn {
                continue;
            }
            fd.op_set_input(op, src, slot);
            return Ok(1);
        }
        Ok(0)
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
    fn identity_el_collapses_add_zero() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let zero = fd.new_constant(4, 0);
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, zero, 1);
        let _out = fd.new_unique_out(4, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(IdentityEl.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        assert_eq!(fd.op(op).unwrap().opcode, OpCode::Copy);
        assert_eq!(fd.op(op).unwrap().input(0), Some(a));
    }

    #[test]
    fn collapse_constants_folds_add() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_constant(4, 2);
        let b = fd.new_constant(4, 3);
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, b, 1);
        let out = fd.new_unique_out(4, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(
            CollapseConstants.apply_op(op, &mut fd, &mut rc).unwrap(),
            1
        );
        assert!(fd.op(op).unwrap().is_dead());
        assert!(fd.varnode(out).is_none());
    }

    #[test]
    fn early_removal_deletes_unused_unique_result() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let a = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let b = fd.new_constant(4, 1);
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, b, 1);
        let _out = fd.new_unique_out(4, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(EarlyRemoval.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        assert!(fd.op(op).unwrap().is_dead());
    }
}
