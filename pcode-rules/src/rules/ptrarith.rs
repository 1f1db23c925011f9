//! Pointer-arithmetic and struct-offset recovery (spec §4.4 "Pointer
//! arithmetic", §6.3's `AddTreeState`-driven rules).
//!
//! `RulePtrArith` keys its type lookup off the pointer *value's own*
//! Varnode identity (its address-space id and offset) rather than
//! chasing the value through arbitrary dataflow to find where it was
//! computed. That covers the common case type recovery actually resolves
//! — a pointer read directly from a global, a parameter, or a known
//! stack slot — and matches how [`crate::engine::context::TypeKey`] is
//! documented to identify a Varnode. Resolving a pointer's type after it
//! has been computed by unrelated arithmetic is the type-propagation
//! subsystem's job (spec §6.3, an external collaborator), not this rule's.

use pcode_ir::{
    FunctionData,
    IrError,
    OpCode,
    OpId,
};

use crate::{
    engine::{
        context::{
            RuleContext,
            TypeKey,
        },
        rule::{
            OpList,
            Rule,
        },
    },
    typeinfo::Metatype,
};

use super::util::{
    const_value,
    replace_with_copy,
};

/// Rewrites `INT_ADD(ptr, const_offset)` into `PTRSUB(ptr, const_offset)`
/// once the type factory confirms `ptr` is a pointer whose pointee has a
/// field or element at that offset (spec §4.4 `ptr_arith`, §6.3
/// `get_sub_type`).
pub struct RulePtrArith;

impl Rule for RulePtrArith {
    fn name(&self) -> &'static str {
        "ptr_arith"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntAdd])
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
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(a), Some(b)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        for (ptr_vn, off_vn) in [(a, b), (b, a)] {
            let Some(offset) = const_value(fd, off_vn) else {
                continue;
            };
            let Some(ptr) = fd.varnode(ptr_vn) else {
                continue;
            };
            let key = TypeKey {
                space: ptr.address.space.0,
                offset: ptr.address.offset,
            };
            let Some(datatype) = types.lookup(key) else {
                continue;
            };
            if datatype.get_metatype() != Metatype::Ptr {
                continue;
            }
            let Some(pointee) = datatype.get_ptr_to() else {
                continue;
            };
            if pointee.get_sub_type(offset as i64).is_none() {
                continue;
            }
            let out_size = pcode_op
                .output
                .and_then(|v| fd.varnode(v))
                .map(|v| v.size)
                .unwrap_or(0);
            let off_const = fd.new_constant(out_size, offset);
            fd.op_set_opcode(op, OpCode::PtrSub);
            fd.op_set_input(op, ptr_vn, 0);
            fd.op_set_input(op, off_const, 1);
            return Ok(1);
        }
        Ok(0)
    }
}

/// `PTRSUB(base, 0) -> base`: a zero-offset struct-field access is the
/// base pointer itself (spec §4.4 `struct_offset_0`).
pub struct RuleStructOffset0;

impl Rule for RuleStructOffset0 {
    fn name(&self) -> &'static str {
        "struct_offset_0"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::PtrSub])
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
        let (Some(base), Some(off_vn)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        if const_value(fd, off_vn) == Some(0) {
            return Ok(replace_with_copy(fd, op, base));
        }
        Ok(0)
    }
}

/// Once type recovery has exceeded its iteration budget (spec §6.6
/// `type_recovery_exceeded`), undoes a `PTRSUB` back into plain
/// `INT_ADD` rather than risk resolving it against stale type
/// information (spec §4.4 `ptrsub_undo`).
pub struct RulePtrsubUndo;

impl Rule for RulePtrsubUndo {
    fn name(&self) -> &'static str {
        "ptrsub_undo"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::PtrSub])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        if !ctx.options.type_recovery_exceeded {
            return Ok(0);
        }
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        fd.op_set_opcode(op, OpCode::IntAdd);
        Ok(1)
    }
}

/// Rewrites `INT_ADD(ptr, INT_MULT(index, elsize))` into `PTRADD(ptr,
/// index, elsize)` once the type factory confirms `ptr`'s pointee is
/// addressed in units of `elsize` — the scaled-index sibling of
/// `RulePtrArith`'s constant-offset case (spec §4.4 `push_ptr`, §6.3
/// `get_word_size`).
pub struct RulePushPtr;

impl RulePushPtr {
    fn match_scaled_index(
        fd: &FunctionData,
        mult_vn: pcode_ir::VarnodeId,
    ) -> Option<(pcode_ir::VarnodeId, u128)> {
        let def = fd.varnode(mult_vn)?.def?;
        let mult = fd.op(def)?;
        if mult.opcode != OpCode::IntMult || mult.inputs.len() != 2 {
            return None;
        }
        let (a, b) = (mult.input(0)?, mult.input(1)?);
        for (index, stride_vn) in [(a, b), (b, a)] {
            if let Some(stride) = const_value(fd, stride_vn) {
                return Some((index, stride));
            }
        }
        None
    }
}

impl Rule for RulePushPtr {
    fn name(&self) -> &'static str {
        "push_ptr"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::IntAdd])
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
        if pcode_op.inputs.len() != 2 {
            return Ok(0);
        }
        let (Some(a), Some(b)) = (pcode_op.input(0), pcode_op.input(1)) else {
            return Ok(0);
        };
        for (ptr_vn, mult_vn) in [(a, b), (b, a)] {
            let Some((index, stride)) = Self::match_scaled_index(fd, mult_vn) else {
                continue;
            };
            let Some(ptr) = fd.varnode(ptr_vn) else {
                continue;
            };
            let key = TypeKey {
                space: ptr.address.space.0,
                offset: ptr.address.offset,
            };
            let Some(datatype) = types.lookup(key) else {
                continue;
            };
            if datatype.get_metatype() != Metatype::Ptr {
                continue;
            }
            if datatype.get_word_size() as u128 != stride {
                continue;
            }
            let out_size = pcode_op
                .output
                .and_then(|v| fd.varnode(v))
                .map(|v| v.size)
                .unwrap_or(0);
            let elsize = fd.new_constant(out_size, stride);
            fd.op_set_opcode(op, OpCode::PtrAdd);
            fd.op_set_input(op, ptr_vn, 0);
            fd.op_set_input(op, index, 1);
            fd.op_append_input(op, elsize);
            return Ok(1);
        }
        Ok(0)
    }
}

/// Once type recovery has exceeded its iteration budget, undoes a
/// `PTRADD` back into the plain `INT_ADD(ptr, INT_MULT(index, elsize))`
/// it was recovered from, the scaled-index sibling of
/// `RulePtrsubUndo` (spec §4.4 `ptradd_undo`, §6.6
/// `type_recovery_exceeded`).
pub struct RulePtraddUndo;

impl Rule for RulePtraddUndo {
    fn name(&self) -> &'static str {
        "ptradd_undo"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::PtrAdd])
    }

    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, IrError> {
        if !ctx.options.type_recovery_exceeded {
            return Ok(0);
        }
        let Some(pcode_op) = fd.op(op) else {
            return Ok(0);
        };
        if pcode_op.inputs.len() != 3 {
            return Ok(0);
        }
        let (Some(ptr), Some(index), Some(elsize_vn)) =
            (pcode_op.input(0), pcode_op.input(1), pcode_op.input(2))
        else {
            return Ok(0);
        };
        let address = pcode_op.address;
        let mult_out_size = fd.varnode(index).map(|v| v.size).unwrap_or(0);
        let mult = fd.new_op(OpCode::IntMult, 2, address);
        fd.op_insert_before(mult, op);
        fd.op_set_input(mult, index, 0);
        fd.op_set_input(mult, elsize_vn, 1);
        let scaled = fd.new_unique_out(mult_out_size, mult);

        fd.op_remove_input(op, 2);
        fd.op_set_opcode(op, OpCode::IntAdd);
        fd.op_set_input(op, ptr, 0);
        fd.op_set_input(op, scaled, 1);
        Ok(1)
    }
}

/// Collapses a `CAST` that immediately follows pointer-arithmetic
/// recovery (`PTRADD`/`PTRSUB`) when the cast's output is the same size
/// as its input: the arithmetic rule already established the value's
/// pointer-ness, so a same-size cast carries no further information
/// (spec §4.4 `ptr_flow`).
pub struct RulePtrFlow;

impl Rule for RulePtrFlow {
    fn name(&self) -> &'static str {
        "ptr_flow"
    }

    fn op_list(&self) -> OpList {
        OpList::Specific(&[OpCode::Cast])
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
        if in_size != out_size || in_size == 0 {
            return Ok(0);
        }
        let Some(def) = fd.varnode(input).and_then(|v| v.def) else {
            return Ok(0);
        };
        let Some(def_op) = fd.op(def) else {
            return Ok(0);
        };
        if !matches!(def_op.opcode, OpCode::PtrAdd | OpCode::PtrSub) {
            return Ok(0);
        }
        Ok(replace_with_copy(fd, op, input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use pcode_ir::builder::TestFunctionBuilder;
    use crate::{
        diagnostics::Diagnostics,
        engine::context::TypeLookup,
        options::SimplifyOptions,
        typeinfo::{
            Datatype,
            Field,
            Pointer,
            Primitive,
            Struct,
        },
    };

    struct FixedTypes(Rc<dyn Datatype>);

    impl TypeLookup for FixedTypes {
        fn lookup(&self, _key: TypeKey) -> Option<Rc<dyn Datatype>> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn ptr_arith_rewrites_into_ptrsub_at_field_offset() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();

        let int32: Rc<dyn Datatype> = Rc::new(Primitive {
            size: 4,
            metatype: Metatype::Int,
            char_print: false,
        });
        let s = Struct {
            size: 12,
            align: 4,
            fields: vec![
                Field { name: "a".into(), offset: 0, datatype: int32.clone() },
                Field { name: "b".into(), offset: 4, datatype: int32.clone() },
                Field { name: "c".into(), offset: 8, datatype: int32 },
            ],
        };
        let ptr_type: Rc<dyn Datatype> = Rc::new(Pointer { pointee: Rc::new(s), size: 8 });
        let types = FixedTypes(ptr_type);

        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let offset = fd.new_constant(8, 8);
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, offset, 1);
        let _out = fd.new_unique_out(8, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: Some(&types),
            segment_ops: &[],
            constant_pool: None,
        };

        assert_eq!(RulePtrArith.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::PtrSub);
        assert_eq!(rewritten.input(0), Some(base));
        let off = rewritten.input(1).unwrap();
        assert_eq!(fd.varnode(off).unwrap().constant_value(), Some(8));
    }

    #[test]
    fn struct_offset_0_collapses_to_base() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let zero = fd.new_constant(8, 0);
        let op = fd.new_op(OpCode::PtrSub, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, zero, 1);
        let _out = fd.new_unique_out(8, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: None,
            segment_ops: &[],
            constant_pool: None,
        };
        assert_eq!(
            RuleStructOffset0.apply_op(op, &mut fd, &mut rc).unwrap(),
            1
        );
        assert_eq!(fd.op(op).unwrap().opcode, OpCode::Copy);
    }

    #[test]
    fn push_ptr_rewrites_scaled_index_into_ptradd() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();

        let int32: Rc<dyn Datatype> = Rc::new(Primitive {
            size: 4,
            metatype: Metatype::Int,
            char_print: false,
        });
        let ptr_type: Rc<dyn Datatype> = Rc::new(Pointer { pointee: int32, size: 8 });
        let types = FixedTypes(ptr_type);

        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let index = fd.new_input(8, TestFunctionBuilder::addr(reg, 8));
        let elsize = fd.new_constant(8, 4);
        let mult = fd.new_op(OpCode::IntMult, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(mult, block);
        fd.op_set_input(mult, index, 0);
        fd.op_set_input(mult, elsize, 1);
        let mult_out = fd.new_unique_out(8, mult);

        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(op, mult);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, mult_out, 1);
        let _out = fd.new_unique_out(8, op);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: Some(&types),
            segment_ops: &[],
            constant_pool: None,
        };
        assert_eq!(RulePushPtr.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::PtrAdd);
        assert_eq!(rewritten.input(0), Some(base));
        assert_eq!(rewritten.input(1), Some(index));
        let stride = rewritten.input(2).unwrap();
        assert_eq!(fd.varnode(stride).unwrap().constant_value(), Some(4));
    }

    #[test]
    fn ptradd_undo_reverses_under_exceeded_budget() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let index = fd.new_input(8, TestFunctionBuilder::addr(reg, 8));
        let elsize = fd.new_constant(8, 4);
        let op = fd.new_op(OpCode::PtrAdd, 3, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, base, 0);
        fd.op_set_input(op, index, 1);
        fd.op_set_input(op, elsize, 2);
        let _out = fd.new_unique_out(8, op);

        let mut options = SimplifyOptions::default();
        options.type_recovery_exceeded = true;
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: None,
            segment_ops: &[],
            constant_pool: None,
        };
        assert_eq!(RulePtraddUndo.apply_op(op, &mut fd, &mut rc).unwrap(), 1);
        let rewritten = fd.op(op).unwrap();
        assert_eq!(rewritten.opcode, OpCode::IntAdd);
        assert_eq!(rewritten.input(0), Some(base));
        let mult_vn = rewritten.input(1).unwrap();
        let mult_def = fd.varnode(mult_vn).unwrap().def.unwrap();
        assert_eq!(fd.op(mult_def).unwrap().opcode, OpCode::IntMult);
    }

    #[test]
    fn ptr_flow_collapses_redundant_cast() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = fd.new_block();
        let base = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
        let off = fd.new_constant(8, 4);
        let ptradd = fd.new_op(OpCode::PtrSub, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(ptradd, block);
        fd.op_set_input(ptradd, base, 0);
        fd.op_set_input(ptradd, off, 1);
        let ptr_out = fd.new_unique_out(8, ptradd);

        let cast = fd.new_op(OpCode::Cast, 1, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_after(cast, ptradd);
        fd.op_set_input(cast, ptr_out, 0);
        let _out = fd.new_unique_out(8, cast);

        let options = SimplifyOptions::default();
        let mut diag = Diagnostics::new();
        let mut rc = RuleContext {
            options: &options,
            diagnostics: &mut diag,
            types: None,
            segment_ops: &[],
            constant_pool: None,
        };
        assert_eq!(RulePtrFlow.apply_op(cast, &mut fd, &mut rc).unwrap(), 1);
        assert_eq!(fd.op(cast).unwrap().opcode, OpCode::Copy);
    }
}
