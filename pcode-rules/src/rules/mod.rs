//! The rewrite-rule catalogue (spec §4.4) and the action groups that
//! bundle rules into coherent simplification passes (spec §5).

mod util;

pub mod compare;
pub mod control_flow;
pub mod dead_code;
pub mod divide;
pub mod loadstore;
pub mod masks;
pub mod misc;
pub mod ptrarith;
pub mod shifts;
pub mod structure;

use crate::engine::scheduler::ActionGroup;

/// The "early" group: cheap, universally-safe cleanup that every other
/// group benefits from running first — dead code, constant folding,
/// copy propagation, and the small algebraic identities (spec §5's
/// "early" action group).
pub fn early_group() -> ActionGroup {
    ActionGroup::new("early")
        .with_rule(Box::new(dead_code::EarlyRemoval))
        .with_rule(Box::new(dead_code::CollapseConstants))
        .with_rule(Box::new(dead_code::PropagateCopy))
        .with_rule(Box::new(dead_code::IdentityEl))
        .with_rule(Box::new(dead_code::TrivialArith))
        .with_rule(Box::new(misc::TermOrder))
        .with_rule(Box::new(misc::CollectTerms))
}

/// Bitwise, shift, and comparison normalization (spec §5's "logical"
/// action group).
pub fn logical_group() -> ActionGroup {
    ActionGroup::new("logical")
        .with_rule(Box::new(masks::AndMask))
        .with_rule(Box::new(masks::OrMask))
        .with_rule(Box::new(masks::OrCollapse))
        .with_rule(Box::new(masks::OrConsume))
        .with_rule(Box::new(masks::Piece2Zext))
        .with_rule(Box::new(masks::Piece2Sext))
        .with_rule(Box::new(masks::ZextEliminate))
        .with_rule(Box::new(masks::AndZext))
        .with_rule(Box::new(masks::SubZext))
        .with_rule(Box::new(masks::SubExtComm))
        .with_rule(Box::new(masks::SubpieceNormal))
        .with_rule(Box::new(masks::SubCommute))
        .with_rule(Box::new(masks::SubCancel))
        .with_rule(Box::new(masks::SubRight))
        .with_rule(Box::new(masks::ZextSless))
        .with_rule(Box::new(masks::ZextShiftZext))
        .with_rule(Box::new(masks::ZextCommute))
        .with_rule(Box::new(shifts::TrivialShift))
        .with_rule(Box::new(shifts::DoubleShift))
        .with_rule(Box::new(shifts::ConcatShift))
        .with_rule(Box::new(shifts::LeftRight))
        .with_rule(Box::new(shifts::ShiftBitops))
        .with_rule(Box::new(shifts::ShiftCompare))
        .with_rule(Box::new(compare::Equal2Zero))
        .with_rule(Box::new(compare::LessEqual))
        .with_rule(Box::new(compare::LessNotEqual))
        .with_rule(Box::new(compare::LessOne))
        .with_rule(Box::new(compare::Less2Zero))
        .with_rule(Box::new(compare::LessEqual2Zero))
        .with_rule(Box::new(compare::SLess2Zero))
        .with_rule(Box::new(compare::SlessToLess))
        .with_rule(Box::new(compare::IntLessEqualToLess))
        .with_rule(Box::new(compare::Equal2Constant))
        .with_rule(Box::new(compare::BoolZext))
        .with_rule(Box::new(compare::Logic2Bool))
        .with_rule(Box::new(compare::NotDistribute))
        .with_rule(Box::new(compare::BooleanUndistribute))
        .with_rule(Box::new(compare::BooleanDedup))
        .with_rule(Box::new(compare::ThreeWayCompare))
        .with_rule(Box::new(compare::BooleanNegate))
        .with_rule(Box::new(misc::LzcountShiftBool))
        .with_rule(Box::new(misc::PopcountBoolXor))
}

/// Arithmetic-idiom recovery: division-by-constant and the small sibling
/// rules around it (spec §5's "arithmetic" action group).
pub fn arithmetic_group() -> ActionGroup {
    ActionGroup::new("arithmetic")
        .with_rule(Box::new(divide::DivOpt))
        .with_rule(Box::new(divide::DivTermAdd))
        .with_rule(Box::new(divide::SignDiv2))
        .with_rule(Box::new(divide::ModOpt))
        .with_rule(Box::new(divide::SignMod2Opt))
        .with_rule(Box::new(divide::DivChain))
        .with_rule(Box::new(divide::MultNegOne))
        .with_rule(Box::new(divide::TwoComp2Mult))
        .with_rule(Box::new(divide::TwoComp2Sub))
}

/// Structured-data and pointer-arithmetic recovery: depends on the type
/// factory (`ctx.types`) being populated by the type-propagation
/// subsystem before this group runs (spec §5's "structure" action
/// group, §6.3).
pub fn structure_group() -> ActionGroup {
    ActionGroup::new("structure")
        .with_rule(Box::new(structure::ExtensionPush))
        .with_rule(Box::new(structure::PieceStructure))
        .with_rule(Box::new(structure::PushMulti))
        .with_rule(Box::new(structure::PullsubMulti))
        .with_rule(Box::new(structure::PullsubIndirect))
        .with_rule(Box::new(ptrarith::RulePtrArith))
        .with_rule(Box::new(ptrarith::RulePushPtr))
        .with_rule(Box::new(ptrarith::RuleStructOffset0))
        .with_rule(Box::new(ptrarith::RulePtrsubUndo))
        .with_rule(Box::new(ptrarith::RulePtraddUndo))
        .with_rule(Box::new(ptrarith::RulePtrFlow))
        .with_rule(Box::new(misc::RuleSegment))
        .with_rule(Box::new(misc::RuleTransformCpool))
}

/// Control-flow merge collapse and the remaining effect-barrier and
/// call-target rules (spec §5's "control flow" action group).
pub fn control_flow_group() -> ActionGroup {
    ActionGroup::new("control_flow")
        .with_rule(Box::new(control_flow::ConditionalMove))
        .with_rule(Box::new(control_flow::MultiCollapse))
        .with_rule(Box::new(loadstore::IndirectCollapse))
        .with_rule(Box::new(loadstore::LoadVarnode))
        .with_rule(Box::new(loadstore::StoreVarnode))
        .with_rule(Box::new(loadstore::ExpandLoad))
        .with_rule(Box::new(loadstore::IgnoreNan))
        .with_rule(Box::new(loadstore::FloatSignCleanup))
        .with_rule(Box::new(loadstore::FloatCast))
        .with_rule(Box::new(loadstore::Int2FloatCollapse))
        .with_rule(Box::new(misc::FuncPtrEncoding))
}

/// The full, ordered pipeline a whole-function simplification run drives
/// through (spec §5 "Simplification runs as an ordered sequence of
/// action groups").
pub fn standard_action_groups() -> Vec<ActionGroup> {
    vec![
        early_group(),
        logical_group(),
        arithmetic_group(),
        structure_group(),
        control_flow_group(),
    ]
}
