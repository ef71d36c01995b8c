use alloc::format;
use alloc::string::ToString;
use alloc::vec;

use crate::{AttrMap, AttrType, OpBuilder, OpDescriptor, OpError};

/// Registered name of the sum reduction.
pub const REDUCE_SUM: &str = "ReduceSum";

/// Declares `ReduceSum`, summing `x` along the `axis` attribute.
///
/// The reduced axis is dropped from `y` unless `keepdims` is set. Splitting
/// `x` along the reduced axis leaves every worker with a partial sum.
pub fn reduce_sum() -> Result<OpDescriptor, OpError> {
    OpBuilder::new(REDUCE_SUM)
        .input("x")
        .output("y")
        .attr("axis", AttrType::Int32)
        .attr_with_default("keepdims", false)
        .infer_fn(|ctx| {
            let mut x = ctx.local_input(0)?;
            let axis = reduced_axis(ctx.attrs(), x.shape.rank())?;

            if ctx.attrs().get::<bool>("keepdims")? {
                x.shape.dims_mut()[axis] = 1;
            } else {
                x.shape.dims_mut().remove(axis);
            }

            Ok(vec![x])
        })
        .sbp_fn(|ctx| {
            let inputs = ctx.inputs();
            let outputs = ctx.outputs();
            let rank = ctx.logical_input(0)?.shape.rank();
            let axis = reduced_axis(ctx.attrs(), rank)?;
            let keepdims = ctx.attrs().get::<bool>("keepdims")?;

            for split in 0..rank {
                let builder = ctx.new_builder().split(inputs, split);
                if split == axis {
                    builder.partial_reduce(outputs).build()?;
                } else if keepdims || split < axis {
                    builder.split(outputs, split).build()?;
                } else {
                    builder.split(outputs, split - 1).build()?;
                }
            }
            ctx.new_builder().broadcast(inputs).broadcast(outputs).build()?;
            ctx.new_builder()
                .partial_reduce(inputs)
                .partial_reduce(outputs)
                .build()
        })
        .build()
}

fn reduced_axis(attrs: &AttrMap, rank: usize) -> Result<usize, OpError> {
    let axis = attrs.dim("axis")?;
    if axis >= rank {
        return Err(OpError::InvalidAttributeValue {
            op: attrs.op().to_string(),
            attr: "axis".to_string(),
            detail: format!("axis {axis} is out of range for rank {rank}"),
        });
    }
    Ok(axis)
}
