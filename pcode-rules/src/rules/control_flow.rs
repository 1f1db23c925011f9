//! Control-flow merge simplification (spec §4.4 "Control flow").

use itertools::Itertools;
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
    replace_with_copy,
};

/// Recognizes a `MULTIEQUAL` merging the boolean constants `1`/`0` at the
/// join of a two-way branch and replaces it with the branch's own
/// condition (or its negation), per invariant P4 (operand `i`
/// corresponds to incoming block `i`), spec §4.4 `conditional_move`.
pub struct ConditionalMove;

impl Rule for ConditionalMove {
    fn name(&self) -> &'static str {
        "conditional_move"
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
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(in0), Some(in1)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        let (Some(v0), Some(v1)) = (const_value(fd, in0), const_value(fd, in1)) else {
            return Ok(0);
        };
        if !((v0 == 1 && v1 == 0) || (v0 == 0 && v1 == 1)) {
            return Ok(0);
        }
        let block = pcode_op.parent;
        let preds = fd.block(block).predecessors.clone();
        if preds.len() != 2 {
            return Ok(0);
        }
        let Some(&last) = fd.block(preds[0]).ops.last() else {
            return Ok(0);
        };
        let Some(branch) = fd.op(last) else {
            return Ok(0);
        };
        if branch.opcode != OpCode::CBranch || branch.inputs.len() != 2 {
            return Ok(0);
        }
        let Some(cond) = branch.input(1) else {
            return Ok(0);
        };
        if v0 == 1 {
            Ok(replace_with_copy(fd, op, cond))
        } else {
            fd.op_remove_input(op, 1);
            fd.op_set_input(op, cond, 0);
            fd.op_set_opcode(op, OpCode::BoolNegate);
            Ok(1)
        }
    }
}

/// Collapses a `MULTIEQUAL` all of whose operands are the same Varnode
/// (every predecessor agrees) into a `COPY` of that value (spec §4.4
/// `multi_collapse`).
pub struct MultiCollapse;

impl Rule for MultiCollapse {
    fn name(&self) -> &'static str {
        "multi_collapse"
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
        if pcode_op.inputs.is_empty() {
            return Ok(0);
        }
        if !pcode_op.inputs.iter().all_equal() {
            return Ok(0);
        }
        let Some(first) = pcode_op.input(0) else {
            return Ok(0);
        };
        Ok(replace_with_copy(fd, op, first))
    }
}
