//! Error kinds for the IR graph and its mutation API (spec §7).

use pcode_types::space::Address;

use crate::OpId;

/// Unrecoverable invariant violations (spec §7.1). These are never raised
/// by a rule declining to match; a rule returns `0` for that. They signal
/// that continuing would leave the IR structurally invalid, so the caller
/// is expected to treat the function as un-decompilable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// A `COPY` (or similar) op was found whose output equals one of its
    /// own inputs, which would make the def-use graph cyclic.
    #[error("op {op} at {address} is self-referential")]
    SelfReferentialOp {
        /// The offending op.
        op: OpId,
        /// Its source address, for localization.
        address: Address,
    },
    /// A handle referred to an arena slot that does not hold a live value
    /// of the expected kind.
    #[error("op {op} at {address}: invariant violated: {detail}")]
    InvariantViolation {
        /// The offending op.
        op: OpId,
        /// Its source address.
        address: Address,
        /// Human-readable description of which invariant failed.
        detail: String,
    },
}
