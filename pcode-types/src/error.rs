//! Error kinds for the value-primitive layer.

/// Errors a primitive helper can report.
///
/// These are all non-fatal in the sense of spec §7.2: a rule that hits one
/// of these simply declines to fire (`apply_op` returns `0`); nothing here
/// aborts a simplification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    /// A precision-limited helper (e.g. a mask or shift computation) was
    /// handed an operand wider than [`crate::MAX_NATIVE_BYTES`] bytes.
    #[error("operand of {0} bytes exceeds the {} byte native width", crate::MAX_NATIVE_BYTES)]
    OperandTooWide(u32),
    /// A byte size of zero was supplied where a nonzero size is required.
    #[error("zero-byte operand is not meaningful here")]
    ZeroSizeOperand,
    /// Division by zero was attempted by a constant-folding helper.
    #[error("division by zero")]
    DivideByZero,
}
