use alloc::string::ToString;

use crate::sharding::{ParallelContext, Slot};
use crate::{AttrMap, OpError, TensorDesc};

/// View of a node handed to tensor descriptor inference callbacks.
///
/// Input descriptors are logical (global). [`local_input`](Self::local_input)
/// and [`localize`](Self::localize) turn a logical descriptor into the one seen
/// by a single worker, according to the partition the [`ParallelContext`]
/// assigns to the slot. Each slot is adjusted on its own; relationships between
/// slots are checked by the operator.
pub struct InferContext<'a> {
    op: &'a str,
    attrs: &'a AttrMap,
    parallel: &'a ParallelContext,
    inputs: &'a [Slot],
    outputs: &'a [Slot],
    logical_inputs: &'a [TensorDesc],
}

impl<'a> InferContext<'a> {
    pub(crate) fn new(
        op: &'a str,
        attrs: &'a AttrMap,
        parallel: &'a ParallelContext,
        inputs: &'a [Slot],
        outputs: &'a [Slot],
        logical_inputs: &'a [TensorDesc],
    ) -> Self {
        Self {
            op,
            attrs,
            parallel,
            inputs,
            outputs,
            logical_inputs,
        }
    }

    /// Name of the operator.
    pub fn op(&self) -> &'a str {
        self.op
    }

    /// Resolved attributes of the node.
    pub fn attrs(&self) -> &'a AttrMap {
        self.attrs
    }

    /// Slot of the `index`-th input.
    pub fn input_slot(&self, index: usize) -> Result<&'a Slot, OpError> {
        self.inputs
            .get(index)
            .ok_or_else(|| self.arity("inputs", index, self.inputs.len()))
    }

    /// Slot of the `index`-th output.
    pub fn output_slot(&self, index: usize) -> Result<&'a Slot, OpError> {
        self.outputs
            .get(index)
            .ok_or_else(|| self.arity("outputs", index, self.outputs.len()))
    }

    /// Logical descriptor of the `index`-th input.
    pub fn logical_input(&self, index: usize) -> Result<&'a TensorDesc, OpError> {
        self.logical_inputs
            .get(index)
            .ok_or_else(|| self.arity("inputs", index, self.logical_inputs.len()))
    }

    /// Descriptor of the `index`-th input as seen by one worker.
    pub fn local_input(&self, index: usize) -> Result<TensorDesc, OpError> {
        let slot = self.input_slot(index)?;
        self.localize(slot, self.logical_input(index)?.clone())
    }

    /// Turns the logical descriptor of `slot` into the per-worker one.
    ///
    /// With a single worker the descriptor is returned unchanged whatever the
    /// partition. Otherwise `Split(axis)` divides that axis by the worker count
    /// and fails with [`OpError::UnevenSplit`] when it does not divide evenly;
    /// `Broadcast` and `PartialReduce` keep the full shape.
    pub fn localize(&self, slot: &Slot, mut desc: TensorDesc) -> Result<TensorDesc, OpError> {
        let parallel_num = self.parallel.parallel_num();
        if parallel_num == 1 {
            return Ok(desc);
        }

        let spec = self
            .parallel
            .partition_of(slot)
            .ok_or_else(|| OpError::UnassignedSlot {
                op: self.op.to_string(),
                slot: slot.clone(),
            })?;

        // Broadcast and partial values keep the full shape.
        let Some(axis) = spec.split_axis() else {
            return Ok(desc);
        };

        let rank = desc.shape.rank();
        let dim = desc
            .shape
            .dims_mut()
            .get_mut(axis)
            .ok_or_else(|| OpError::InvalidSplitAxis {
                op: self.op.to_string(),
                slot: slot.clone(),
                axis,
                rank,
            })?;
        if *dim % parallel_num != 0 {
            return Err(OpError::UnevenSplit {
                op: self.op.to_string(),
                slot: slot.clone(),
                axis,
                dividend: *dim,
                divisor: parallel_num,
            });
        }
        *dim /= parallel_num;

        Ok(desc)
    }

    fn arity(&self, kind: &'static str, index: usize, actual: usize) -> OpError {
        OpError::ArityMismatch {
            op: self.op.to_string(),
            kind,
            expected: index + 1,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::{ParallelContextBuilder, PartitionSpec};
    use crate::{AttrSchema, DType};
    use alloc::vec;
    use rstest::rstest;

    fn localize(
        parallel_num: usize,
        spec: PartitionSpec,
        dims: &[usize],
    ) -> Result<TensorDesc, OpError> {
        let slot = Slot::new("x", 0);
        let attrs = AttrSchema::default()
            .validate("Identity", &Default::default())
            .unwrap();
        let parallel = ParallelContextBuilder::new(parallel_num)
            .with_partition(slot.clone(), spec)
            .build()
            .unwrap();
        let inputs = vec![slot.clone()];
        let ctx = InferContext::new("Identity", &attrs, &parallel, &inputs, &[], &[]);

        ctx.localize(&slot, TensorDesc::new(dims.to_vec(), DType::F32))
    }

    #[rstest]
    #[case(4, PartitionSpec::Split(0), &[8, 6], &[2, 6])]
    #[case(2, PartitionSpec::Split(1), &[8, 6], &[8, 3])]
    #[case(4, PartitionSpec::Split(0), &[0, 6], &[0, 6])]
    #[case(4, PartitionSpec::Broadcast, &[7, 6], &[7, 6])]
    #[case(4, PartitionSpec::PartialReduce, &[7, 6], &[7, 6])]
    fn test_localize(
        #[case] parallel_num: usize,
        #[case] spec: PartitionSpec,
        #[case] dims: &[usize],
        #[case] expected: &[usize],
    ) {
        let desc = localize(parallel_num, spec, dims).unwrap();

        assert_eq!(desc.shape.dims(), expected);
    }

    #[test]
    fn test_localize_uneven_split() {
        let err = localize(4, PartitionSpec::Split(1), &[8, 6]).unwrap_err();

        assert_eq!(
            err,
            OpError::UnevenSplit {
                op: "Identity".into(),
                slot: Slot::new("x", 0),
                axis: 1,
                dividend: 6,
                divisor: 4,
            }
        );
    }

    #[test]
    #[should_panic = "InvalidSplitAxis"]
    fn test_localize_split_axis_should_be_in_bound() {
        localize(2, PartitionSpec::Split(2), &[8, 6]).unwrap();
    }

    #[test]
    fn test_localize_single_worker_ignores_partition() {
        let desc = localize(1, PartitionSpec::Split(0), &[7, 6]).unwrap();

        assert_eq!(desc.shape.dims(), &[7, 6]);
    }

    #[test]
    #[should_panic = "UnassignedSlot"]
    fn test_localize_slot_should_be_assigned() {
        let attrs = AttrSchema::default()
            .validate("Identity", &Default::default())
            .unwrap();
        let parallel = ParallelContextBuilder::new(2).build().unwrap();
        let ctx = InferContext::new("Identity", &attrs, &parallel, &[], &[], &[]);

        ctx.localize(&Slot::new("x", 0), TensorDesc::new([4], DType::F32))
            .unwrap();
    }
}
