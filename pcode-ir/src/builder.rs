//! A minimal in-memory function builder, used only by tests to construct
//! small IR graphs without hand-writing arena indices.
//!
//! Real front-ends populate a [`FunctionData`] directly through the §4.2
//! mutation API (spec §6.2); this module is test tooling, not part of the
//! public surface a production lifter is expected to use.

use pcode_types::space::{
    Address,
    AddressSpace,
    AddressSpaceId,
    AddressSpaceType,
    Endianness,
};

use crate::{
    function_data::FunctionData,
    ids::BlockId,
    spaces::SpaceManager,
};

/// Builds a [`FunctionData`] with the standard four-space layout test
/// fixtures need: constant, register, a RAM-like processor space, and an
/// internal-temporary ("unique") space.
pub struct TestFunctionBuilder;

impl TestFunctionBuilder {
    /// Returns `(function, register_space, ram_space)` so callers can
    /// build addresses in the spaces most tests care about.
    pub fn build() -> (FunctionData, AddressSpaceId, AddressSpaceId) {
        let constant = AddressSpaceId(0);
        let unique = AddressSpaceId(1);
        let register = AddressSpaceId(2);
        let ram = AddressSpaceId(3);
        let iop = AddressSpaceId(4);

        let spaces = vec![
            AddressSpace::new(constant, "const", 1, 8, Endianness::Little, AddressSpaceType::Constant),
            AddressSpace::new(unique, "unique", 1, 8, Endianness::Little, AddressSpaceType::InternalTemporary),
            AddressSpace::new(register, "register", 1, 8, Endianness::Little, AddressSpaceType::Register),
            AddressSpace::new(ram, "ram", 1, 8, Endianness::Little, AddressSpaceType::Processor),
            AddressSpace::new(iop, "iop", 1, 8, Endianness::Little, AddressSpaceType::Iop),
        ];
        let manager = SpaceManager::new(spaces, constant, unique);
        (FunctionData::new(manager), register, ram)
    }

    /// Adds a single-block function and returns the block id.
    pub fn single_block(fd: &mut FunctionData) -> BlockId {
        fd.new_block()
    }

    /// Builds an address in the given space.
    pub fn addr(space: AddressSpaceId, offset: u64) -> Address {
        Address::new(space, offset)
    }
}
