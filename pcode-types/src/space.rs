//! Address spaces and addresses (spec §3.1).

use std::fmt;

/// Byte order of values stored in an address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    /// Least-significant byte first.
    Little,
    /// Most-significant byte first.
    Big,
}

/// The closed set of address-space roles (spec §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AddressSpaceType {
    /// Holds constant values; offset *is* the value.
    Constant,
    /// The processor's main memory-mapped address space.
    Processor,
    /// Machine registers.
    Register,
    /// Internal temporaries with no user-visible address (SSA scratch).
    InternalTemporary,
    /// The stack frame, addressed relative to a spacebase Varnode.
    StackBase,
    /// Executable code, used for branch/call targets.
    Code,
    /// Encodes pointers to `PcodeOp`s, used by `INDIRECT`'s second input.
    Iop,
    /// A synthetic space joining multiple storage locations (e.g. a value
    /// split across two registers).
    Join,
}

impl AddressSpaceType {
    /// Whether dead-code elimination is ever permitted for Varnodes in a
    /// space of this type. Registers and processor memory may be
    /// externally observable; internal temporaries and the constant space
    /// never are.
    pub fn permits_dead_code_by_default(self) -> bool {
        matches!(
            self,
            AddressSpaceType::InternalTemporary | AddressSpaceType::Constant
        )
    }
}

/// Opaque handle identifying an [`AddressSpace`] within a function's space
/// manager. Kept tiny and `Copy` so Varnodes can carry it by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressSpaceId(pub u16);

/// A named region of addressable storage (spec §3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AddressSpace {
    /// Handle other structures use to refer back to this space.
    pub id: AddressSpaceId,
    /// Human-readable name (`"ram"`, `"register"`, `"const"`, ...).
    pub name: String,
    /// Bytes per addressable unit (usually 1).
    pub word_size: u32,
    /// Width in bytes of an address/pointer into this space.
    pub address_size: u32,
    /// Byte order of multi-byte values in this space.
    pub endianness: Endianness,
    /// The role this space plays.
    pub space_type: AddressSpaceType,
    /// Whether dead-code elimination may run in this space. Defaults from
    /// [`AddressSpaceType::permits_dead_code_by_default`] but can be
    /// overridden per §6.6 (`dead_removal_allowed`).
    pub dead_removal_allowed: bool,
}

impl AddressSpace {
    /// Constructs a space with dead-code removal defaulted from its type.
    pub fn new(
        id: AddressSpaceId,
        name: impl Into<String>,
        word_size: u32,
        address_size: u32,
        endianness: Endianness,
        space_type: AddressSpaceType,
    ) -> Self {
        AddressSpace {
            id,
            name: name.into(),
            word_size,
            address_size,
            endianness,
            dead_removal_allowed: space_type.permits_dead_code_by_default(),
            space_type,
        }
    }

    /// Converts a byte offset to an address-space offset (divides by word
    /// size, spec §4.1).
    pub fn byte_to_address(&self, byte_offset: u64) -> u64 {
        if self.word_size <= 1 {
            byte_offset
        } else {
            byte_offset / self.word_size as u64
        }
    }

    /// Converts an address-space offset to a byte offset (multiplies by
    /// word size, spec §4.1).
    pub fn address_to_byte(&self, address_offset: u64) -> u64 {
        address_offset.saturating_mul(self.word_size as u64)
    }
}

/// A location within an [`AddressSpace`]: the space handle plus an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// The space this address is relative to.
    pub space: AddressSpaceId,
    /// Offset within the space, in address units (not necessarily bytes;
    /// see [`AddressSpace::address_to_byte`]).
    pub offset: u64,
}

impl Address {
    /// Builds an address.
    pub const fn new(space: AddressSpaceId, offset: u64) -> Self {
        Address { space, offset }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space#{}:{:#x}", self.space.0, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_address_round_trip_for_word_addressed_space() {
        let space = AddressSpace::new(
            AddressSpaceId(0),
            "ram16",
            2,
            4,
            Endianness::Little,
            AddressSpaceType::Processor,
        );
        assert_eq!(space.byte_to_address(8), 4);
        assert_eq!(space.address_to_byte(4), 8);
    }

    #[test]
    fn internal_temporaries_permit_dead_code_by_default() {
        assert!(AddressSpaceType::InternalTemporary.permits_dead_code_by_default());
        assert!(!AddressSpaceType::Processor.permits_dead_code_by_default());
    }
}
