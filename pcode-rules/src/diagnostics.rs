//! Non-fatal warning collection (spec §7.3, §7.5).
//!
//! Mirrors the ambient side-channels a production VM accumulates during
//! execution for later inspection (e.g. a profiler or backtrace buffer)
//! rather than threading extra return values through every call.

use pcode_types::space::Address;
use tracing::warn;

/// A single non-fatal warning raised during simplification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Warning {
    /// Source address to localize the warning (spec §7: "Warnings carry
    /// the op's source address").
    pub address: Address,
    /// Human-readable description.
    pub message: String,
}

/// Accumulates warnings raised over the course of a simplification run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Records a warning and emits it via `tracing::warn!`.
    pub fn warn(&mut self, address: Address, message: impl Into<String>) {
        let message = message.into();
        warn!(%address, %message, "simplification warning");
        self.warnings.push(Warning { address, message });
    }

    /// All warnings recorded so far, oldest first.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// `true` if no warnings have been recorded.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
