//! The worklist-driven rule scheduler (spec §4.3, §5, §9).

use std::collections::VecDeque;

use pcode_ir::{
    FunctionData,
    OpId,
};
use tracing::{
    debug,
    trace,
};

use super::{
    context::RuleContext,
    rule::Rule,
};

/// A named subset of rules applied together until they reach a fixed
/// point (spec glossary "Action group").
pub struct ActionGroup {
    /// Name shown in `tracing` output (e.g. `"early"`, `"type_recovery"`).
    pub name: &'static str,
    /// Rules in this group, in subscription-priority order: for a given
    /// op, earlier rules in this list are tried first.
    pub rules: Vec<Box<dyn Rule>>,
}

impl ActionGroup {
    /// Builds a named, empty group.
    pub fn new(name: &'static str) -> Self {
        ActionGroup {
            name,
            rules: Vec::new(),
        }
    }

    /// Appends a rule.
    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Outcome of running one [`ActionGroup`] to its fixed point (or budget).
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchedulerReport {
    /// Number of worklist rounds actually run.
    pub rounds_run: usize,
    /// Total mutation count summed across every rule invocation that
    /// fired.
    pub total_mutations: usize,
    /// `true` if the group was cut off by `max_rounds` rather than
    /// reaching a genuine fixed point (spec §7.5).
    pub budget_exceeded: bool,
}

/// Drives an [`ActionGroup`] to a fixed point over a function's IR.
pub struct Scheduler {
    /// Per-group cap on worklist rounds (spec §5 "pass budget").
    pub max_rounds: usize,
}

impl Scheduler {
    /// Builds a scheduler with the given round budget.
    pub fn new(max_rounds: usize) -> Self {
        Scheduler { max_rounds }
    }

    /// Runs `group` over `fd` until no rule in the group mutates anything
    /// in a full round, or `max_rounds` is exceeded.
    ///
    /// Matches spec §9's worklist model: ops created or re-coded during a
    /// round are appended to the pending queue and seen within the same
    /// run, not deferred to a later round. "Round" here is the unit the
    /// pass budget counts against (spec §5's "per action group" budget),
    /// not a claim that the underlying Ghidra implementation's per-opcode
    /// bucket sweep and this worklist drain are identical in shape — both
    /// converge to the same fixed point for a terminating rule set.
    pub fn run(
        &self,
        group: &ActionGroup,
        fd: &mut FunctionData,
        ctx: &mut RuleContext<'_>,
    ) -> SchedulerReport {
        let mut worklist: VecDeque<OpId> = fd.live_ops().collect();
        let mut report = SchedulerReport::default();

        'rounds: loop {
            if worklist.is_empty() {
                break;
            }
            report.rounds_run += 1;
            if report.rounds_run > self.max_rounds {
                report.budget_exceeded = true;
                ctx.diagnostics.warn(
                    fd.live_ops()
                        .next()
                        .and_then(|op| fd.op(op))
                        .map(|o| o.address)
                        .unwrap_or(pcode_types::space::Address::new(
                            pcode_types::space::AddressSpaceId(0),
                            0,
                        )),
                    format!(
                        "action group '{}' exceeded its pass budget of {} rounds",
                        group.name, self.max_rounds
                    ),
                );
                break 'rounds;
            }

            let mut next_round = Vec::new();
            let mut any_mutation = false;

            while let Some(op) = worklist.pop_front() {
                let Some(pcode_op) = fd.op(op) else { continue };
                if pcode_op.is_dead() {
                    // spec §5: rules must ignore dead ops.
                    continue;
                }
                let opcode = pcode_op.opcode;

                for rule in &group.rules {
                    if !rule.op_list().matches(opcode) {
                        continue;
                    }
                    let before_len = fd.op_arena_len();
                    match rule.apply_op(op, fd, ctx) {
                        Ok(0) => continue,
                        Ok(mutated) => {
                            report.total_mutations += mutated;
                            any_mutation = true;
                            trace!(rule = rule.name(), op = %op, "rule fired");
                            let after_len = fd.op_arena_len();
                            for raw in before_len..after_len {
                                let candidate = OpId::from_raw(raw as u32);
                                if fd.op(candidate).map(|o| !o.is_dead()).unwrap_or(false) {
                                    next_round.push(candidate);
                                }
                            }
                            if fd.op(op).map(|o| !o.is_dead()).unwrap_or(false) {
                                next_round.push(op);
                            }
                            break;
                        }
                        Err(_err) => {
                            // Spec §7.1: invariant violations are
                            // unrecoverable at the function level, but the
                            // scheduler itself has no caller to propagate
                            // an error to mid-group; surface it as a
                            // maximally-severe warning and stop touching
                            // this op for the rest of the group.
                            ctx.diagnostics.warn(
                                fd.op(op).map(|o| o.address).unwrap_or(pcode_types::space::Address::new(
                                    pcode_types::space::AddressSpaceId(0),
                                    0,
                                )),
                                format!("rule '{}' hit an invariant violation", rule.name()),
                            );
                            break;
                        }
                    }
                }
            }

            if !any_mutation {
                break;
            }
            worklist.extend(next_round);
            fd.gc();
        }

        debug!(
            group = group.name,
            rounds = report.rounds_run,
            mutations = report.total_mutations,
            "action group reached fixed point"
        );
        report
    }
}
