//! Grab-bag of small rules that don't carry a themed module of their own
//! (spec §4.4 "Miscellaneous").

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpFlags,
    OpId,
};
use pcode_types::mask::calc_mask;

use crate::{
    cpool::CPoolTag,
    engine::{
        context::RuleContext,
        rule::{
            OpList,
            Rule,
        },
    },
};

use super::util::{
    const_value,
    fold_to_constant,
};

/// Masks off the low alignment bits of an indirect call target before the
/// call, the canonical encoding for "this pointer is only accurate up to
/// instruction alignment" (spec §4.4 `funcptr_encoding`, driven by
/// [`crate::options::SimplifyOptions::funcptr_align_bits`]).
pub struct FuncPtrEncoding;

impl Rule for FuncPtrEncoding {
    fn name(&self) -> &'static str {
        "funcptr_encoding"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::CallInd])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(align_bits) = ctx.options.funcptr_align_bits else {
            return Ok(0);
        };
        if align_bits == 0 {
            return Ok(0);
        }
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        let Some(target) = pcode_op.input(0) else {
            return Ok(0);
        };
        let Some(target_vn) = fd.varnode(target) else {
            return Ok(0);
        };
        if target_vn.is_constant() {
            return Ok(0);
        }
        let size = target_vn.size;
        let align_mask = !((1u128 << align_bits) - 1) & calc_mask(size);

        if let Some(def) = target_vn.def {
            if let Some(def_op) = fd.op(def) {
                if def_op.opcode == OpCode::IntAnd && def_op.inputs.len() == 2 {
                    let already = [def_op.input(0), def_op.input(1)]
                        .into_iter()
                        .flatten()
                        .any(|v| const_value(fd, v) == Some(align_mask));
                    if already {
                        return Ok(0);
                    }
                }
            }
        }

        let address = pcode_op.address;
        let mask_const = fd.new_constant(size, align_mask);
        let and_op = fd.new_op(OpCode::IntAnd, 2, address);
        fd.op_set_input(and_op, target, 0);
        fd.op_set_input(and_op, mask_const, 1);
        let masked = fd.new_unique_out(size, and_op);
        fd.op_insert_before(and_op, op);
        fd.op_set_input(op, masked, 0);
        Ok(1)
    }
}

/// `LZCOUNT(x) == bits -> x == 0`: counting leading zeros across the whole
/// width is only possible when there are no set bits at all (spec §4.4
/// `lzcount_shift_bool`).
pub struct LzcountShiftBool;

impl Rule for LzcountShiftBool {
    fn name(&self) -> &'static str {
        "lzcount_shift_bool"
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
        for (lz_vn, const_vn) in [(a, b), (b, a)] {
            let Some(bits_value) = const_value(fd, const_vn) else {
                continue;
            };
            let Some(lz_def) = fd.varnode(lz_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(lz_op) = fd.op(lz_def) else {
                continue;
            };
            if lz_op.opcode != OpCode::LzCount {
                continue;
            }
            let Some(x) = lz_op.input(0) else {
                continue;
            };
            let in_size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
            if bits_value != (in_size as u128) * 8 {
                continue;
            }
            let zero = fd.new_constant(in_size, 0);
            fd.op_set_input(op, x, if lz_vn == a { 0 } else { 1 });
            fd.op_set_input(op, zero, if lz_vn == a { 1 } else { 0 });
            return Ok(1);
        }
        Ok(0)
    }
}

/// Canonicalizes commutative operand order, moving a constant operand
/// into the second slot so later rules can assume "constant is last"
/// (spec §4.4 `term_order`).
pub struct TermOrder;

impl Rule for TermOrder {
    fn name(&self) -> &'static str {
        "term_order"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[
            OpCode::IntAdd,
            OpCode::IntMult,
            OpCode::IntAnd,
            OpCode::IntOr,
            OpCode::IntXor,
            OpCode::IntEqual,
            OpCode::IntNotEqual,
            OpCode::BoolAnd,
            OpCode::BoolOr,
            OpCode::BoolXor,
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
        let a_is_const = fd.varnode(a).map(|v| v.is_constant()).unwrap_or(false);
        let b_is_const = fd.varnode(b).map(|v| v.is_constant()).unwrap_or(false);
        if a_is_const && !b_is_const {
            fd.op_set_input(op, b, 0);
            fd.op_set_input(op, a, 1);
            return Ok(1);
        }
        Ok(0)
    }
}

/// `POPCOUNT(x) & 1 -> parity(x)`, replacing a full population count with
/// the cheaper XOR-fold parity computation (Hacker's Delight §5-2) when
/// only the low bit of the count is ever read (spec §4.4
/// `popcount_bool_xor`).
pub struct PopcountBoolXor;

impl Rule for PopcountBoolXor {
    fn name(&self) -> &'static str {
        "popcount_bool_xor"
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
        let address = pcode_op.address;
        for (pop_vn, one_vn) in [(a, b), (b, a)] {
            if const_value(fd, one_vn) != Some(1) {
                continue;
            }
            let Some(def) = fd.varnode(pop_vn).and_then(|v| v.def) else {
                continue;
            };
            let Some(pop_op) = fd.op(def) else {
                continue;
            };
            if pop_op.opcode != OpCode::PopCount {
                continue;
            }
            let Some(x) = pop_op.input(0) else {
                continue;
            };
            let size = fd.varnode(x).map(|v| v.size).unwrap_or(0);
            let bits = size * 8;
            if bits == 0 || bits > 64 || !bits.is_power_of_two() {
                continue;
            }

            let mut acc = x;
            let mut shift_amt = bits / 2;
            while shift_amt >= 1 {
                let shift_c = fd.new_constant(size, shift_amt as u128);
                let shr = fd.new_op(OpCode::IntRight, 2, address);
                fd.op_insert_before(shr, op);
                fd.op_set_input(shr, acc, 0);
                fd.op_set_input(shr, shift_c, 1);
                let shr_out = fd.new_unique_out(size, shr);

                let xor = fd.new_op(OpCode::IntXor, 2, address);
                fd.op_insert_before(xor, op);
                fd.op_set_input(xor, acc, 0);
                fd.op_set_input(xor, shr_out, 1);
                acc = fd.new_unique_out(size, xor);

                shift_amt /= 2;
            }

            fd.op_set_input(op, acc, if pop_vn == a { 0 } else { 1 });
            fd.op_set_input(op, one_vn, if pop_vn == a { 1 } else { 0 });
            return Ok(1);
        }
        Ok(0)
    }
}

/// Merges a constant addend scattered across an associative chain of
/// `INT_ADD`s into a single term: `(x + c1) + c2 -> x + (c1 + c2)` (spec
/// §4.4 `collect_terms`). Runs after [`TermOrder`] has already moved each
/// level's constant into the second slot.
pub struct CollectTerms;

impl Rule for CollectTerms {
    fn name(&self) -> &'static str {
        "collect_terms"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntAdd])
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
        let Some(c2) = const_value(fd, b) else {
            return Ok(0);
        };
        let Some(def) = fd.varnode(a).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(def_op) = fd.op(def) else {
            return Ok(0);
        };
        if def_op.opcode != OpCode::IntAdd || def_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(x), Some(c1_vn)) = (def_op.input(0), def_op.input(1)) else {
            return Ok(0);
        };
        let Some(c1) = const_value(fd, c1_vn) else {
            return Ok(0);
        };
        let size = fd.varnode(b).map(|v| v.size).unwrap_or(0);
        let combined = c1.wrapping_add(c2) & calc_mask(size);
        let new_const = fd.new_constant(size, combined);
        fd.op_set_input(op, x, 0);
        fd.op_set_input(op, new_const, 1);
        Ok(1)
    }
}

/// Folds a segmented-addressing op once both the segment and offset
/// operands are constant, delegating the architecture-specific combine to
/// the [`crate::segment::SegmentOp`] the lifter registered at the index
/// named by the op's first input (spec §4.4 `segment`, §6.4).
pub struct RuleSegment;

impl Rule for RuleSegment {
    fn name(&self) -> &'static str {
        "segment"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::SegmentOp])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.inputs.len() != 3 {
            return Ok(0);
        }
        let (Some(index_vn), Some(seg_vn), Some(off_vn)) =
            (pcode_op.input(0), pcode_op.input(1), pcode_op.input(2))
        else {
            return Ok(0);
        };
        let Some(index) = const_value(fd, index_vn) else {
            return Ok(0);
        };
        let Some(seg_op) = ctx.segment_ops.get(index as usize) else {
            return Ok(0);
        };
        let Some(segment) = const_value(fd, seg_vn) else {
            return Ok(0);
        };
        let Some(offset) = const_value(fd, off_vn) else {
            return Ok(0);
        };
        let Some(result) = seg_op.execute(&[segment, offset]) else {
            return Ok(0);
        };
        Ok(fold_to_constant(fd, op, result))
    }
}

/// Resolves a `CPOOLREF` against the architecture's constant pool (spec
/// §4.4 `transform_cpool`, §6.5): primitive and `instanceof` tags fold
/// straight to their constant value; anything else is left in place but
/// marked transformed so the rule doesn't re-query the same reference
/// every pass.
pub struct RuleTransformCpool;

impl Rule for RuleTransformCpool {
    fn name(&self) -> &'static str {
        "transform_cpool"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::CPoolRef])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        let Some(pool) = ctx.constant_pool else {
            return Ok(0);
        };
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.flags.contains(OpFlags::CPOOL_TRANSFORMED) {
            return Ok(0);
        }
        if pcode_op.inputs.len() < 2 {
            return Ok(0);
        }
        let Some(refs) = pcode_op.inputs[1..]
            .iter()
            .map(|slot| slot.and_then(|v| const_value(fd, v)).map(|v| v as u64))
            .collect::<Option<Vec<u64>>>()
        else {
            return Ok(0);
        };
        let Some(record) = pool.get_record(&refs) else {
            return Ok(0);
        };
        match record.get_tag() {
            CPoolTag::Primitive => Ok(fold_to_constant(fd, op, record.get_value())),
            CPoolTag::InstanceOf => Ok(fold_to_constant(fd, op, record.get_value() & 1)),
            CPoolTag::Other => {
                if let Some(o) = fd.op_mut(op) {
                    o.flags.insert(OpFlags::CPOOL_TRANSFORMED);
                }
                Ok(1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use pcode_ir::builder::TestFunctionBuilder;
    use crate::{
        cpool::{
            CPoolRecord,
            ConstantPool,
        },
        diagnostics::Diagnostics,
        options::SimplifyOptions,
        segment::{
            FlatSegmentOp,
            SegmentOp,
        },
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
    fn funcptr_encoding_masks_call_target() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let target = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let call = fd.new_op(OpCode::CallInd, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(call, block);
        fd.op_set_input(call, target, 0);

        let mut options = SimplifyOptions::default();
        options.funcptr_align_bits = Some(2);
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(FuncPtrEncoding.apply_op(call, &mut fd, &mut rc).unwrap(), 1);
        let masked = fd.op(call).unwrap().input(0).unwrap();
        let def = fd.varnode(masked).unwrap().def.unwrap();
        assert_eq!(fd.op(def).unwrap().opcode, OpCode::IntAnd);
    }

    #[test]
    fn lzcount_shift_bool_becomes_zero_compare() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let lz = fd.new_op(OpCode::LzCount, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(lz, block);
        fd.op_set_input(lz, x, 0);
        let lz_out = fd.new_unique_out(4, lz);

        let bits = fd.new_constant(4, 32);
        let eq = fd.new_op(OpCode::IntEqual, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(eq, lz);
        fd.op_set_input(eq, lz_out, 0);
        fd.op_set_input(eq, bits, 1);
        let _out = fd.new_unique_out(1, eq);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(
            LzcountShiftBool.apply_op(eq, &mut fd, &mut rc).unwrap(),
            1
        );
        let rewritten = fd.op(eq).unwrap();
        assert_eq!(rewritten.input(0), Some(x));
        let zero = rewritten.input(1).unwrap();
        assert_eq!(fd.varnode(zero).unwrap().constant_value(), Some(0));
    }

    #[test]
    fn term_order_moves_constant_to_second_slot() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let c = fd.new_constant(4, 7);
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, c, 0);
        fd.op_set_input(op, x, 1);
        let _out = fd.new_unique_out(4, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(TermOrder.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.input(0), Some(x));
        assert_eq!(rewritten.input(1), Some(c));
    }

    #[test]
    fn popcount_bool_xor_folds_parity() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let pop = fd.new_op(OpCode::PopCount, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(pop, block);
        fd.op_set_input(pop, x, 0);
        let pop_out = fd.new_unique_out(4, pop);

        let one = fd.new_constant(4, 1);
        let and = fd.new_op(OpCode::IntAnd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(and, pop);
        fd.op_set_input(and, pop_out, 0);
        fd.op_set_input(and, one, 1);
        let _out = fd.new_unique_out(4, and);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(
            PopcountBoolXor.apply_op(and, &mut fd, &mut rc).unwrap(),
            1
        );
        let rewritten = fd.op(and).unwrap();
        assert_eq!(rewritten.input(1), Some(one));
        let acc = rewritten.input(0).unwrap();
        let acc_def = fd.varnode(acc).unwrap().def.unwrap();
        assert_eq!(fd.op(acc_def).unwrap().opcode, OpCode::IntXor);
    }

    #[test]
    fn collect_terms_merges_nested_constant_addends() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));
        let c1 = fd.new_constant(4, 5);
        let inner = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(inner, block);
        fd.op_set_input(inner, x, 0);
        fd.op_set_input(inner, c1, 1);
        let inner_out = fd.new_unique_out(4, inner);

        let c2 = fd.new_constant(4, 3);
        let outer = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(outer, inner);
        fd.op_set_input(outer, inner_out, 0);
        fd.op_set_input(outer, c2, 1);
        let _out = fd.new_unique_out(4, outer);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = ctx(&options, &mut diag);
        assert_eq!(
            CollectTerms.apply_op(outer, &mut fd, &mut rc).unwrap(),
            1
        );
        let rewritten = fd.op(outer).unwrap();
        assert_eq!(rewritten.input(0), Some(x));
        let combined = rewritten.input(1).unwrap();
        assert_eq!(fd.varnode(combined).unwrap().constant_value(), Some(8));
    }

    #[test]
    fn segment_folds_constant_far_pointer() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let index = fd.new_constant(4, 0);
        let segment = fd.new_constant(2, 0x1000);
        let offset = fd.new_constant(2, 0x20);
        let op = fd.new_op(OpCode::SegmentOp, 3, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, index, 0);
        fd.op_set_input(op, segment, 1);
        fd.op_set_input(op, offset, 2);
        let out = fd.new_unique_out(8, op);

        let segment_ops: Vec<Rc<dyn SegmentOp>> = vec![Rc::new(FlatSegmentOp { scale: 0x10 })];
        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: None,
            segment_ops: &segment_ops,
            constant_pool: None,
        };
        assert_eq!(RuleSegment.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        assert!(fd.op(op).unwrap().is_dead());
        assert!(fd.varnode(out).is_none());
    }

    #[derive(Debug)]
    struct FixedPool(CPoolRecord);

    impl ConstantPool for FixedPool {
        fn get_record(&self, _refs: &[u64]) -> Option<CPoolRecord> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn transform_cpool_folds_primitive_tag() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let this_ref = fd.new_constant(8, 0);
        let tag_ref = fd.new_constant(8, 42);
        let op = fd.new_op(OpCode::CPoolRef, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, this_ref, 0);
        fd.op_set_input(op, tag_ref, 1);
        let out = fd.new_unique_out(4, op);

        let pool = FixedPool(CPoolRecord::new(CPoolTag::Primitive, 99, None));
        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: None,
            segment_ops: &[],
            constant_pool: Some(&pool),
        };
        assert_eq!(
            RuleTransformCpool.apply_op(op, &mut fd, &mut rc).unwrap(),
            1
        );
        assert!(fd.op(op).unwrap().is_dead());
        assert!(fd.varnode(out).is_none());
    }
}
