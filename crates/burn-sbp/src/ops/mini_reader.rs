use alloc::vec;

use crate::{AttrType, DType, OpBuilder, OpDescriptor, OpError, TensorDesc};

/// Registered name of the reader operator.
pub const MINI_READER: &str = "MiniReader";

/// Width of one record: a `(value, label)` pair.
const RECORD_WIDTH: usize = 2;

/// Declares `MiniReader`, a CPU-only generator reading `(value, label)` records
/// from a partitioned dataset.
///
/// Its single output `out` has shape `[batch_size, 2]` and element type `F64`
/// before partitioning. The only accepted signature splits `out` along the
/// batch axis, so every worker reads its own share of each batch; with `W`
/// workers `batch_size` must be a multiple of `W`.
pub fn mini_reader() -> Result<OpDescriptor, OpError> {
    OpBuilder::new(MINI_READER)
        .output("out")
        .attr("data_dir", AttrType::String)
        .attr("data_part_num", AttrType::Int32)
        .attr_with_default("part_name_prefix", "part-")
        .attr_with_default("part_name_suffix_length", -1i32)
        .attr("batch_size", AttrType::Int32)
        .attr_with_default("random_shuffle", false)
        .attr_with_default("shuffle_after_epoch", false)
        .attr_with_default("seed", -1i64)
        .attr_with_default("shuffle_buffer_size", 1024i32)
        .cpu_only()
        .infer_fn(|ctx| {
            let batch_size = ctx.attrs().dim("batch_size")?;
            let out = TensorDesc::new([batch_size, RECORD_WIDTH], DType::F64);

            Ok(vec![ctx.localize(ctx.output_slot(0)?, out)?])
        })
        .sbp_fn(|ctx| {
            let outputs = ctx.outputs();
            ctx.new_builder().split(outputs, 0).build()
        })
        .build()
}
