//! The p-code op-code enumeration (spec §3.3, §6.1).

use strum::EnumIter;

/// Every op-code the simplification engine understands, plus the two
/// synthetic values of spec §6.1.
///
/// `Labelbuild` belongs to the injection/p-code-construction subsystem,
/// which is an external collaborator (spec §1); it exists here purely so
/// the enumeration is a complete mirror of the lifter's op-code space and a
/// function-data container built against someone else's lifter output
/// never hits an unrepresentable op-code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum OpCode {
    Copy,
    Load,
    Store,
    Branch,
    CBranch,
    BranchInd,
    Call,
    CallInd,
    CallOther,
    Return,

    IntEqual,
    IntNotEqual,
    IntLess,
    IntLessEqual,
    IntSLess,
    IntSLessEqual,
    IntCarry,
    IntSCarry,
    IntSBorrow,
    Int2Comp,
    IntNegate,
    IntXor,
    IntAnd,
    IntOr,
    IntLeft,
    IntRight,
    IntSRight,
    IntAdd,
    IntSub,
    IntMult,
    IntDiv,
    IntSDiv,
    IntRem,
    IntSRem,
    IntZext,
    IntSext,

    BoolNegate,
    BoolXor,
    BoolAnd,
    BoolOr,

    FloatEqual,
    FloatNotEqual,
    FloatLess,
    FloatLessEqual,
    FloatNan,
    FloatAdd,
    FloatDiv,
    FloatMult,
    FloatSub,
    FloatNeg,
    FloatAbs,
    FloatSqrt,
    FloatInt2Float,
    FloatFloat2Float,
    FloatTrunc,
    FloatCeil,
    FloatFloor,
    FloatRound,

    MultiEqual,
    Indirect,
    Piece,
    SubPiece,

    Cast,
    PtrAdd,
    PtrSub,
    SegmentOp,
    CPoolRef,
    New,
    Insert,
    Extract,
    PopCount,
    LzCount,

    /// Sentinel marking the end of the real op-code range; never produced
    /// by a lifter and never consumed as an op-code to subscribe to.
    CpuiMax,
    /// External-collaborator op-code used only by the p-code injection
    /// subsystem (spec §6.1); the core simplifier never rewrites it.
    Labelbuild,
}

impl OpCode {
    /// Returns `true` for the small set of op-codes whose output is always
    /// a single byte, boolean-valued result (spec §3.3: `INT_CARRY`,
    /// `INT_SCARRY`, `INT_SBORROW`, the comparisons, and the boolean ops).
    pub fn is_boolean_producing(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            IntEqual
                | IntNotEqual
                | IntLess
                | IntLessEqual
                | IntSLess
                | IntSLessEqual
                | IntCarry
                | IntSCarry
                | IntSBorrow
                | BoolNegate
                | BoolXor
                | BoolAnd
                | BoolOr
                | FloatEqual
                | FloatNotEqual
                | FloatLess
                | FloatLessEqual
                | FloatNan
        )
    }

    /// Returns `true` for op-codes whose inputs and output must all share a
    /// single common size (most arithmetic/logic ops, spec §3.3 "P1").
    pub fn requires_uniform_size(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            IntAdd
                | IntSub
                | IntMult
                | IntDiv
                | IntSDiv
                | IntRem
                | IntSRem
                | IntAnd
                | IntOr
                | IntXor
                | IntNegate
                | Int2Comp
                | IntLeft
                | IntRight
                | IntSRight
        )
    }

    /// Returns `true` for commutative binary op-codes, used by
    /// `term_order`/`collect_terms` to canonicalize operand order.
    pub fn is_commutative(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            IntAdd
                | IntMult
                | IntAnd
                | IntOr
                | IntXor
                | IntEqual
                | IntNotEqual
                | BoolAnd
                | BoolOr
                | BoolXor
        )
    }
}
