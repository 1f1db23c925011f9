//! Segment-op and user-op external interfaces (spec §6.4).

/// A segmented-addressing opcode, folded by `RuleSegment` when both
/// operands are constant.
pub trait SegmentOp: std::fmt::Debug {
    /// Evaluates the segment op against constant-folded input bindings,
    /// returning the combined flat address, if representable.
    fn execute(&self, bindings: &[u128]) -> Option<u128>;

    /// `true` if this architecture's segmentation scheme supports far
    /// (cross-segment) pointers; gates whether `RuleSegment` may combine a
    /// segment and offset from unrelated definitions.
    fn has_far_pointer_support(&self) -> bool {
        false
    }
}

/// A trivial segment-op for flat (non-segmented) architectures: folds to
/// `segment * scale + offset`.
#[derive(Debug, Clone, Copy)]
pub struct FlatSegmentOp {
    /// Multiplier applied to the segment operand before combining.
    pub scale: u128,
}

impl SegmentOp for FlatSegmentOp {
    fn execute(&self, bindings: &[u128]) -> Option<u128> {
        let &[segment, offset] = bindings else {
            return None;
        };
        Some(segment.wrapping_mul(self.scale).wrapping_add(offset))
    }

    fn has_far_pointer_support(&self) -> bool {
        true
    }
}
