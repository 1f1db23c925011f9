//! Varnodes: typed, sized SSA values (spec §3.2).

use smallvec::SmallVec;

use pcode_types::{
    mask::calc_mask,
    space::Address,
};

use crate::OpId;

bitflags::bitflags! {
    /// Varnode flag set (spec §3.2). Named to match the source document
    /// rather than abbreviated, since these are read far more often than
    /// written.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VarnodeFlags: u32 {
        /// Lives in the constant address space.
        const CONSTANT     = 1 << 0;
        /// A function input (parameter or free register read before any
        /// def in this function).
        const INPUT        = 1 << 1;
        /// Fixed to a memory-mapped location; may not be renamed/coalesced
        /// across its address (invariant I4).
        const ADDR_TIED    = 1 << 2;
        /// Must exist at this address after simplification completes.
        const ADDR_FORCE   = 1 << 3;
        /// Has a defining `PcodeOp` (mutually exclusive with `FREE`).
        const WRITTEN      = 1 << 4;
        /// No def and not an input: a dangling reference that must not
        /// persist past the rewrite that created it.
        const FREE         = 1 << 5;
        /// Plays the role of a stack/frame pointer.
        const SPACEBASE    = 1 << 6;
        /// Low half of a double-precision value split across two
        /// Varnodes.
        const PRECIS_LO    = 1 << 7;
        /// High half of such a split.
        const PRECIS_HI    = 1 << 8;
        /// Participates in a structured `PIECE`/`CONCAT` tree.
        const PROTO_PARTIAL = 1 << 9;
        /// Data-type/symbol heritage analysis has examined this Varnode.
        const HERITAGE_KNOWN = 1 << 10;
        /// Live by construction even with no descendants yet observed.
        const AUTO_LIVE    = 1 << 11;
        /// Scratch bit for traversal algorithms; must be cleared by
        /// whichever rule sets it before returning (spec §5).
        const MARK         = 1 << 12;
    }
}

/// An SSA-like value occupying a contiguous byte range of an address space
/// (spec §3.2).
#[derive(Debug, Clone)]
pub struct Varnode {
    /// Location this Varnode occupies.
    pub address: Address,
    /// Size in bytes.
    pub size: u32,
    /// The op that produces this value, or `None` for input/constant/free
    /// Varnodes (invariant I1).
    pub def: Option<OpId>,
    /// Ops reading this Varnode. A multiset: an op consuming the same
    /// Varnode on two input slots appears twice.
    pub descendants: SmallVec<[OpId; 2]>,
    /// Forward-propagated bound on which bits might be 1.
    pub nz_mask: u128,
    /// Backward-propagated bound on which bits any descendant observes.
    pub consume_mask: u128,
    /// The flag set (spec §3.2).
    pub flags: VarnodeFlags,
}

impl Varnode {
    /// Builds a fresh Varnode with nz_mask set to "all bits of this size
    /// may be 1" (the conservative starting bound) and no descendants.
    pub fn new(address: Address, size: u32, flags: VarnodeFlags) -> Self {
        let full_mask = calc_mask(size);
        Varnode {
            address,
            size,
            def: None,
            descendants: SmallVec::new(),
            nz_mask: full_mask,
            consume_mask: full_mask,
            flags,
        }
    }

    /// The mask of all bits addressable at this Varnode's size.
    pub fn full_mask(&self) -> u128 {
        calc_mask(self.size)
    }

    /// `true` if this Varnode has neither a def nor the `INPUT` flag: a
    /// dangling reference that must not persist past the rewrite that
    /// created it (spec glossary "Free Varnode").
    pub fn is_free(&self) -> bool {
        self.def.is_none() && !self.flags.contains(VarnodeFlags::INPUT)
    }

    /// `true` if this Varnode inhabits the constant address space; its
    /// integer value is then its address offset.
    pub fn is_constant(&self) -> bool {
        self.flags.contains(VarnodeFlags::CONSTANT)
    }

    /// The constant value, if this is a constant Varnode.
    pub fn constant_value(&self) -> Option<u128> {
        self.is_constant()
            .then_some(self.address.offset as u128 & self.full_mask())
    }

    /// Adds `op` to the descendant multiset.
    pub fn add_descendant(&mut self, op: OpId) {
        self.descendants.push(op);
    }

    /// Removes one occurrence of `op` from the descendant multiset, per
    /// the slot the caller is unwiring. No-op if `op` is not present.
    pub fn remove_one_descendant(&mut self, op: OpId) {
        if let Some(pos) = self.descendants.iter().position(|&d| d == op) {
            self.descendants.swap_remove(pos);
        }
    }

    /// Intersects `nz_mask` with `full_mask()`, maintaining invariant I3.
    pub fn clamp_nz_mask(&mut self) {
        self.nz_mask &= self.full_mask();
    }
}
