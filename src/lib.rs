//! P-code IR simplification engine.
//!
//! Re-exports the three member crates and hosts [`Simplifier`], the
//! top-level facade that drives a [`pcode_ir::FunctionData`] through the
//! full, ordered sequence of rewrite-rule action groups (spec §5) to a
//! fixed point.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub use pcode_ir;
pub use pcode_rules;
pub use pcode_types;

use std::rc::Rc;

use pcode_ir::FunctionData;
use pcode_rules::{
    cpool::ConstantPool,
    diagnostics::Diagnostics,
    engine::{
        RuleContext,
        Scheduler,
        SchedulerReport,
        TypeLookup,
    },
    options::SimplifyOptions,
    rules::standard_action_groups,
    segment::SegmentOp,
};

/// External collaborators a single [`Simplifier::run`] call can draw on
/// (spec §6): the type factory, the segment-op table, and the constant
/// pool. Each is optional — a caller with no type-propagation subsystem
/// wired up simply passes `None` and forgoes the structure-recovery rules
/// that need it.
#[derive(Default)]
pub struct Collaborators<'a> {
    /// Per-Varnode type lookup (§6.3). Drives `ptr_arith` and friends.
    pub types: Option<&'a dyn TypeLookup>,
    /// Segment-relative addressing helpers (§6.4).
    pub segment_ops: &'a [Rc<dyn SegmentOp>],
    /// Constant-pool reference resolution (§6.5).
    pub constant_pool: Option<&'a dyn ConstantPool>,
}

/// Drives a function's p-code graph through the standard action-group
/// pipeline until every group reaches its fixed point or exhausts its
/// pass budget (spec §5).
pub struct Simplifier {
    options: SimplifyOptions,
    scheduler: Scheduler,
}

impl Simplifier {
    /// Builds a simplifier with the given tunables (§6.6) and a
    /// per-group round budget (§5's "pass budget").
    pub fn new(options: SimplifyOptions) -> Self {
        let max_rounds = options.max_rounds_per_group;
        Simplifier {
            options,
            scheduler: Scheduler::new(max_rounds),
        }
    }

    /// Runs the standard action-group pipeline (early, logical,
    /// arithmetic, structure, control flow) over `fd` once each, in
    /// order, returning the accumulated diagnostics and a per-group
    /// report.
    pub fn run(
        &self,
        fd: &mut FunctionData,
        collaborators: Collaborators<'_>,
    ) -> (Diagnostics, Vec<SchedulerReport>) {
        let mut diagnostics = Diagnostics::new();
        let mut reports = Vec::new();
        for group in standard_action_groups() {
            let mut ctx = RuleContext {
                options: &self.options,
                diagnostics: &mut diagnostics,
                types: collaborators.types,
                segment_ops: collaborators.segment_ops,
                constant_pool: collaborators.constant_pool,
            };
            reports.push(self.scheduler.run(&group, fd, &mut ctx));
        }
        (diagnostics, reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcode_ir::{
        builder::TestFunctionBuilder,
        OpCode,
    };

    #[test]
    fn simplifier_folds_constant_addition_end_to_end() {
        let (mut fd, reg, _) = TestFunctionBuilder::build();
        let block = TestFunctionBuilder::single_block(&mut fd);
        let a = fd.new_constant(4, 2);
        let b = fd.new_constant(4, 3);
        let op = fd.new_op(OpCode::IntAdd, 2, TestFunctionBuilder::addr(reg, 0));
        fd.op_insert_begin(op, block);
        fd.op_set_input(op, a, 0);
        fd.op_set_input(op, b, 1);
        let out = fd.new_unique_out(4, op);

        let simplifier = Simplifier::new(SimplifyOptions::default());
        let (diagnostics, _reports) = simplifier.run(&mut fd, Collaborators::default());
        assert!(diagnostics.is_clean());
        let def = fd.varnode(out).and_then(|v| v.def);
        if let Some(def) = def {
            if let Some(op) = fd.op(def) {
                assert_eq!(op.opcode, OpCode::Copy);
            }
        }
    }
}
