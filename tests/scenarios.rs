//! End-to-end rewrite scenarios driven through the real worklist
//! scheduler rather than a single rule's `apply_op` in isolation.

use std::rc::Rc;

use pcode_ir::{
    builder::TestFunctionBuilder,
    OpCode,
};
use pcode_rules::{
    diagnostics::Diagnostics,
    engine::{
        ActionGroup,
        RuleContext,
        Scheduler,
        TypeKey,
        TypeLookup,
    },
    options::SimplifyOptions,
    rules::{
        compare::ThreeWayCompare,
        control_flow::ConditionalMove,
        divide::DivOpt,
        loadstore::IndirectCollapse,
        misc::FuncPtrEncoding,
        ptrarith::RulePtrArith,
    },
    typeinfo::{
        Datatype,
        Field,
        Metatype,
        Pointer,
        Primitive,
        Struct,
    },
};

fn run_one(group: ActionGroup, fd: &mut pcode_ir::FunctionData, options: &SimplifyOptions) {
    let mut diagnostics = Diagnostics::new();
    let mut ctx = RuleContext {
        options,
        diagnostics: &mut diagnostics,
        types: None,
        segment_ops: &[],
        constant_pool: None,
    };
    Scheduler::new(16).run(&group, fd, &mut ctx);
}

/// S1 — a `(x * magic) >> shift` pair matching the division-by-ten
/// reciprocal recovers to a plain `INT_DIV`.
#[test]
fn division_by_constant_recovers_through_the_scheduler() {
    let (mut fd, reg, _) = TestFunctionBuilder::build();
    let block = fd.new_block();
    let x = fd.new_input(4, TestFunctionBuilder::addr(reg, 0));

    // Same reciprocal `divide::magic_for(10, 32)` would compute; encoded
    // directly here since the helper is private to its module.
    let magic = (1u128 << 32u32).div_ceil(10);
    let magic_vn = fd.new_constant(4, magic);
    let mult = fd.new_op(OpCode::IntMult, 2, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_begin(mult, block);
    fd.op_set_input(mult, x, 0);
    fd.op_set_input(mult, magic_vn, 1);
    let mult_out = fd.new_unique_out(4, mult);

    let shift_vn = fd.new_constant(4, 32);
    let shr = fd.new_op(OpCode::IntRight, 2, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_after(shr, mult);
    fd.op_set_input(shr, mult_out, 0);
    fd.op_set_input(shr, shift_vn, 1);
    let _out = fd.new_unique_out(4, shr);

    let group = ActionGroup::new("s1").with_rule(Box::new(DivOpt));
    run_one(group, &mut fd, &SimplifyOptions::default());

    let rewritten = fd.op(shr).expect("shift op still present");
    assert_eq!(rewritten.opcode, OpCode::IntDiv);
    assert_eq!(rewritten.input(0), Some(x));
    let divisor = rewritten.input(1).unwrap();
    assert_eq!(fd.varnode(divisor).unwrap().constant_value(), Some(10));
}

/// S2 — `(a < b) | (a == b)` collapses to `a <= b`.
#[test]
fn three_way_compare_collapses_through_the_scheduler() {
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

    let group = ActionGroup::new("s2").with_rule(Box::new(ThreeWayCompare));
    run_one(group, &mut fd, &SimplifyOptions::default());

    let rewritten = fd.op(or_op).unwrap();
    assert_eq!(rewritten.opcode, OpCode::IntLessEqual);
    assert_eq!(rewritten.input(0), Some(a));
    assert_eq!(rewritten.input(1), Some(b));
}

struct FixedTypes(Rc<dyn Datatype>);

impl TypeLookup for FixedTypes {
    fn lookup(&self, _key: TypeKey) -> Option<Rc<dyn Datatype>> {
        Some(self.0.clone())
    }
}

/// S3 — `p + 8` against a `struct{int32 a; int32 b; int32 c}*` becomes
/// `PTRSUB(p, 8)`, selecting field `c`.
#[test]
fn struct_field_access_recovers_ptrsub_through_the_scheduler() {
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

    let p = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
    let eight = fd.new_constant(8, 8);
    let add = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_begin(add, block);
    fd.op_set_input(add, p, 0);
    fd.op_set_input(add, eight, 1);
    let q = fd.new_unique_out(8, add);

    let load = fd.new_op(OpCode::Load, 2, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_after(load, add);
    let space_id = fd.new_constant(8, 0);
    fd.op_set_input(load, space_id, 0);
    fd.op_set_input(load, q, 1);
    let _loaded = fd.new_unique_out(4, load);

    let mut diagnostics = Diagnostics::new();
    let options = SimplifyOptions::default();
    let mut ctx = RuleContext {
        options: &options,
        diagnostics: &mut diagnostics,
        types: Some(&types),
        segment_ops: &[],
        constant_pool: None,
    };
    let group = ActionGroup::new("s3").with_rule(Box::new(RulePtrArith));
    Scheduler::new(16).run(&group, &mut fd, &mut ctx);

    let rewritten = fd.op(add).unwrap();
    assert_eq!(rewritten.opcode, OpCode::PtrSub);
    assert_eq!(rewritten.input(0), Some(p));
    let off = rewritten.input(1).unwrap();
    assert_eq!(fd.varnode(off).unwrap().constant_value(), Some(8));
    // LOAD still reads the rewritten pointer's output varnode `q`.
    assert_eq!(fd.op(load).unwrap().input(1), Some(q));
}

/// S4 — an `INDIRECT` whose causing `STORE` has gone dead collapses to a
/// plain copy of its own first input.
#[test]
fn indirect_over_dead_store_collapses_through_the_scheduler() {
    let (mut fd, reg, ram) = TestFunctionBuilder::build();
    let block = fd.new_block();

    let addr_vn = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
    let store_value = fd.new_input(4, TestFunctionBuilder::addr(reg, 8));
    let store = fd.new_op(OpCode::Store, 3, TestFunctionBuilder::addr(ram, 0));
    fd.op_insert_begin(store, block);
    let space_id_vn = fd.new_constant(8, 0);
    fd.op_set_input(store, space_id_vn, 0);
    fd.op_set_input(store, addr_vn, 1);
    fd.op_set_input(store, store_value, 2);

    let preexisting = fd.new_input(4, TestFunctionBuilder::addr(reg, 16));
    let indirect =
        fd.new_indirect_creation(store, TestFunctionBuilder::addr(reg, 16), 4, true);
    fd.op_set_input(indirect, preexisting, 0);

    fd.op_destroy(store);

    let group = ActionGroup::new("s4").with_rule(Box::new(IndirectCollapse));
    run_one(group, &mut fd, &SimplifyOptions::default());

    let rewritten = fd.op(indirect).unwrap();
    assert_eq!(rewritten.opcode, OpCode::Copy);
    assert_eq!(rewritten.input(0), Some(preexisting));
}

/// S5 — a boolean `MULTIEQUAL(1, 0)` at a two-way join collapses to the
/// branch's own condition.
#[test]
fn conditional_move_collapses_through_the_scheduler() {
    let (mut fd, reg, _) = TestFunctionBuilder::build();
    let pred0 = fd.new_block();
    let pred1 = fd.new_block();
    let join = fd.new_block();
    fd.block_mut(join).predecessors.push(pred0);
    fd.block_mut(join).predecessors.push(pred1);

    let cond = fd.new_input(1, TestFunctionBuilder::addr(reg, 0));
    let target = fd.new_constant(8, 0x1000);
    let branch = fd.new_op(OpCode::CBranch, 2, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_begin(branch, pred0);
    fd.op_set_input(branch, target, 0);
    fd.op_set_input(branch, cond, 1);

    let one = fd.new_constant(1, 1);
    let zero = fd.new_constant(1, 0);
    let phi = fd.new_op(OpCode::MultiEqual, 2, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_begin(phi, join);
    fd.op_set_input(phi, one, 0);
    fd.op_set_input(phi, zero, 1);
    let _out = fd.new_unique_out(1, phi);

    let group = ActionGroup::new("s5").with_rule(Box::new(ConditionalMove));
    run_one(group, &mut fd, &SimplifyOptions::default());

    let rewritten = fd.op(phi).unwrap();
    assert_eq!(rewritten.opcode, OpCode::Copy);
    assert_eq!(rewritten.input(0), Some(cond));
}

/// S6 — `CALLIND(p)` with a configured `funcptr_align_bits` picks up the
/// alignment mask on its target.
#[test]
fn funcptr_encoding_masks_indirect_call_through_the_scheduler() {
    let (mut fd, reg, _) = TestFunctionBuilder::build();
    let block = fd.new_block();
    let p = fd.new_input(8, TestFunctionBuilder::addr(reg, 0));
    let call = fd.new_op(OpCode::CallInd, 1, TestFunctionBuilder::addr(reg, 0));
    fd.op_insert_begin(call, block);
    fd.op_set_input(call, p, 0);

    let mut options = SimplifyOptions::default();
    options.funcptr_align_bits = Some(2);
    let group = ActionGroup::new("s6").with_rule(Box::new(FuncPtrEncoding));
    run_one(group, &mut fd, &options);

    let masked = fd.op(call).unwrap().input(0).unwrap();
    let def = fd.varnode(masked).unwrap().def.unwrap();
    let masking_op = fd.op(def).unwrap();
    assert_eq!(masking_op.opcode, OpCode::IntAnd);
    assert_eq!(masking_op.input(0), Some(p));
}
