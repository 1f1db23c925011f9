//! The rule trait (spec §4.3).

use pcode_ir::{
    FunctionData,
    OpCode,
    OpId,
};

use super::context::RuleContext;

/// The op-codes a rule subscribes to (spec §4.3 `get_op_list`). An empty
/// list means universal: the rule is invoked for every op-code.
#[derive(Debug, Clone)]
pub enum OpList {
    /// Invoked only for ops whose code is in this list.
    Specific(&'static [OpCode]),
    /// Invoked for every op, regardless of its code.
    Universal,
}

impl OpList {
    /// `true` if this subscription covers `code`.
    pub fn matches(&self, code: OpCode) -> bool {
        match self {
            OpList::Specific(list) => list.contains(&code),
            OpList::Universal => true,
        }
    }
}

/// A single local graph rewrite (spec §4.3).
///
/// A rule never throws to signal "no match"; it returns `0` from
/// `apply_op` (spec §9 "Avoidance of hidden control flow"). Hard failures
/// (spec §7.1) are reported through `FunctionData`'s own `Result`-typed
/// mutation calls and propagate as an `Err` from `apply_op` only for
/// genuinely unrecoverable invariant violations — never for "this rule
/// doesn't apply here".
pub trait Rule {
    /// Stable rule name, used in `tracing` spans and `DESIGN.md`-style
    /// provenance, matching spec §4.4's naming (`"div_opt"`,
    /// `"term_order"`, ...).
    fn name(&self) -> &'static str;

    /// The op-codes this rule subscribes to (spec §4.3).
    fn op_list(&self) -> OpList;

    /// Attempts to match and rewrite `op`. Returns the number of
    /// individual mutations committed (`0` if the rule declined to fire).
    fn apply_op(
        &self,
        op: OpId,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> Result<usize, pcode_ir::IrError>;
}
