//! Simplification tunables (spec §6.6). No file format, environment
//! variables, or persisted state back these — spec §6.6 is explicit that
//! the core has no CLI/env/disk surface; gas-cost and panic-reason style
//! tables stay plain in-memory structs, not config files.

/// Runtime-adjustable knobs the rule catalogue consults.
#[derive(Debug, Clone)]
pub struct SimplifyOptions {
    /// When set, every `FLOAT_NAN` rewrites to boolean `false`
    /// (`nan_ignore_all`).
    pub nan_ignore_all: bool,
    /// Alignment, in bits, `RuleFuncPtrEncoding` strips from called
    /// addresses (e.g. `2` for ARM Thumb's low-bit function-pointer tag).
    /// `None` disables the rule.
    pub funcptr_align_bits: Option<u32>,
    /// Gates which pointer/struct-offset rules run; set once type recovery
    /// has examined the function.
    pub type_recovery_started: bool,
    /// Set once type recovery has exceeded its iteration budget; pointer
    /// rules stop attempting new resolutions but may still undo stale
    /// ones.
    pub type_recovery_exceeded: bool,
    /// Per-action-group cap on worklist rounds (spec §5 "pass budget").
    /// Exceeding it is a non-fatal warning (spec §7.5).
    pub max_rounds_per_group: usize,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        SimplifyOptions {
            nan_ignore_all: false,
            funcptr_align_bits: None,
            type_recovery_started: false,
            type_recovery_exceeded: false,
            max_rounds_per_group: 256,
        }
    }
}
