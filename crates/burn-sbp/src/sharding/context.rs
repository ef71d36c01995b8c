use alloc::vec::Vec;
use hashbrown::HashMap;

use super::{PartitionSpec, Signature, Slot};
use crate::OpError;

/// Read-only view of the cluster topology for one node during one compilation
/// pass.
///
/// It carries the number of parallel workers and the partition assigned to each
/// input and output slot of the node. A context with a single worker needs no
/// partitions: every slot is then the full logical tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct ParallelContext {
    /// Number of parallel workers.
    parallel_num: usize,
    /// Partition chosen for each slot.
    partitions: HashMap<Slot, PartitionSpec>,
}

impl ParallelContext {
    /// Context for a single worker.
    pub fn single() -> Self {
        ParallelContext {
            parallel_num: 1,
            partitions: HashMap::new(),
        }
    }

    /// Builds a context assigning every slot of `signature`.
    pub fn from_signature(parallel_num: usize, signature: &Signature) -> Result<Self, OpError> {
        signature
            .iter()
            .fold(
                ParallelContextBuilder::new(parallel_num),
                |builder, (slot, spec)| builder.with_partition(slot.clone(), *spec),
            )
            .build()
    }

    /// Number of parallel workers, at least 1.
    pub fn parallel_num(&self) -> usize {
        self.parallel_num
    }

    /// Partition assigned to a slot.
    pub fn partition_of(&self, slot: &Slot) -> Option<PartitionSpec> {
        self.partitions.get(slot).copied()
    }
}

/// A builder for constructing a [`ParallelContext`].
///
/// Partitions are assigned slot by slot; [`build`](Self::build) validates the
/// worker count and rejects a slot assigned twice with different partitions.
#[derive(Clone, Debug)]
pub struct ParallelContextBuilder {
    parallel_num: usize,
    partitions: Vec<(Slot, PartitionSpec)>,
}

impl ParallelContextBuilder {
    /// Creates a new [`ParallelContextBuilder`] for `parallel_num` workers.
    pub fn new(parallel_num: usize) -> Self {
        Self {
            parallel_num,
            partitions: Vec::new(),
        }
    }

    /// Assigns a partition to a slot.
    pub fn with_partition(mut self, slot: Slot, spec: PartitionSpec) -> Self {
        self.partitions.push((slot, spec));
        self
    }

    /// Builds a [`ParallelContext`] from the current configuration.
    pub fn build(self) -> Result<ParallelContext, OpError> {
        if self.parallel_num == 0 {
            return Err(OpError::InvalidParallelNum);
        }

        let mut partitions = HashMap::with_capacity(self.partitions.len());
        for (slot, spec) in self.partitions {
            if let Some(previous) = partitions.insert(slot.clone(), spec) {
                if previous != spec {
                    return Err(OpError::ConflictingPartition {
                        slot,
                        first: previous,
                        second: spec,
                    });
                }
            }
        }

        Ok(ParallelContext {
            parallel_num: self.parallel_num,
            partitions,
        })
    }
}
