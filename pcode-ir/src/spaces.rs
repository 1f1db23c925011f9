//! Per-function address-space registry.

use pcode_types::space::{
    AddressSpace,
    AddressSpaceId,
};

/// Owns the set of address spaces a function's IR is built over, and knows
/// which ones play the distinguished roles the mutation API needs
/// (constant folding, internal-temporary allocation).
#[derive(Debug, Clone)]
pub struct SpaceManager {
    spaces: Vec<AddressSpace>,
    constant: AddressSpaceId,
    unique: AddressSpaceId,
}

impl SpaceManager {
    /// Builds a manager from an explicit space list; `constant` and
    /// `unique` must each name a space present in `spaces`.
    pub fn new(spaces: Vec<AddressSpace>, constant: AddressSpaceId, unique: AddressSpaceId) -> Self {
        debug_assert!(spaces.iter().any(|s| s.id == constant));
        debug_assert!(spaces.iter().any(|s| s.id == unique));
        SpaceManager {
            spaces,
            constant,
            unique,
        }
    }

    /// The constant address space (spec §3.2: "Constants inhabit the
    /// distinguished constant space").
    pub fn constant_space(&self) -> AddressSpaceId {
        self.constant
    }

    /// The internal-temporary space `new_unique_out` allocates from.
    pub fn unique_space(&self) -> AddressSpaceId {
        self.unique
    }

    /// Looks up a space by id.
    pub fn get(&self, id: AddressSpaceId) -> Option<&AddressSpace> {
        self.spaces.iter().find(|s| s.id == id)
    }

    /// Mutable lookup, used to flip `dead_removal_allowed` (§6.6).
    pub fn get_mut(&mut self, id: AddressSpaceId) -> Option<&mut AddressSpace> {
        self.spaces.iter_mut().find(|s| s.id == id)
    }

    /// All registered spaces.
    pub fn spaces(&self) -> &[AddressSpace] {
        &self.spaces
    }
}
