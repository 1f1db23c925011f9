//! Small helpers shared by the rewrite-rule catalogue's thematic modules.

use pcode_ir::{
    FunctionData,
    OpCode,
    OpId,
    VarnodeId,
};

/// The constant value carried by `vn`, if it is a constant Varnode.
pub fn const_value(fd: &FunctionData, vn: VarnodeId) -> Option<u128> {
    fd.varnode(vn)?.constant_value()
}

/// Replaces every use of `op`'s output with a fresh constant Varnode
/// holding `value`, then destroys `op`. Returns `1`, the usual
/// single-mutation count a [`crate::engine::rule::Rule::apply_op`] reports.
pub fn fold_to_constant(fd: &mut FunctionData, op: OpId, value: u128) -> usize {
    let Some(out) = fd.op(op).and_then(|o| o.output) else {
        return 0;
    };
    let size = fd.varnode(out).map(|v| v.size).unwrap_or(0);
    let folded = fd.new_constant(size, value);
    fd.total_replace(out, folded);
    fd.op_destroy(op);
    1
}

/// Rewrites `op` in place into a single-input `COPY` of `src`, preserving
/// its existing output Varnode. Used by the many rules in spec §4.4 that
/// collapse an op to an identity of one of its own operands.
pub fn replace_with_copy(fd: &mut FunctionData, op: OpId, src: VarnodeId) -> usize {
    let nin = fd.op(op).map(|o| o.inputs.len()).unwrap_or(0);
    for slot in (1..nin).rev() {
        fd.op_remove_input(op, slot);
    }
    fd.op_set_input(op, src, 0);
    fd.op_set_opcode(op, OpCode::Copy);
    1
}
