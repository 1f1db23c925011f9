//! Sized-integer and address-space primitives underlying the p-code IR.
//!
//! This crate has no dependency on the IR graph itself: it only knows about
//! bit masks, multi-precision arithmetic, and address-space bookkeeping, the
//! same separation the atomic-type crate in a production VM workspace draws
//! between "what a value means" and "how it is wired into a graph".

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod mask;
pub mod space;
pub mod uint128;

pub use error::PrimitiveError;
pub use space::{
    Address,
    AddressSpace,
    AddressSpaceId,
    AddressSpaceType,
    Endianness,
};
pub use uint128::Uint128;

/// Maximum size in bytes of a single Varnode this crate can reason about
/// bit-precisely with native integers. Larger values still exist in the IR
/// (e.g. wide vector loads) but most rewrite rules that inspect bit patterns
/// decline to fire above this width (§7 "bit-width overflow").
pub const MAX_NATIVE_BYTES: u32 = 8;
