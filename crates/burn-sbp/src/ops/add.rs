use alloc::string::ToString;
use alloc::vec;

use crate::{OpBuilder, OpDescriptor, OpError};

/// Registered name of the elementwise addition.
pub const ADD: &str = "Add";

/// Declares `Add`, the elementwise sum of two tensors of identical shape.
///
/// Both operands and the output share one partition: split along any axis,
/// broadcast, or partial values (the sum of partial sums is a partial sum).
pub fn add() -> Result<OpDescriptor, OpError> {
    OpBuilder::new(ADD)
        .input("a")
        .input("b")
        .output("out")
        .infer_fn(|ctx| {
            let lhs = ctx.local_input(0)?;
            let rhs = ctx.local_input(1)?;

            if lhs.shape != rhs.shape {
                return Err(OpError::ShapeMismatch {
                    op: ctx.op().to_string(),
                    lhs: lhs.shape,
                    rhs: rhs.shape,
                });
            }
            if lhs.dtype != rhs.dtype {
                return Err(OpError::DTypeMismatch {
                    op: ctx.op().to_string(),
                    lhs: lhs.dtype,
                    rhs: rhs.dtype,
                });
            }

            Ok(vec![lhs])
        })
        .sbp_fn(|ctx| {
            let slots = [ctx.inputs(), ctx.outputs()].concat();
            let rank = ctx.logical_input(0)?.shape.rank();

            for axis in 0..rank {
                ctx.new_builder().split(&slots, axis).build()?;
            }
            ctx.new_builder().broadcast(&slots).build()?;
            ctx.new_builder().partial_reduce(&slots).build()
        })
        .build()
}
