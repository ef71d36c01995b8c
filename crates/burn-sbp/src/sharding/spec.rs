use alloc::string::String;
use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one input or output tensor of a node, e.g. `out_0`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot {
    /// Argument name as declared on the operator.
    name: String,
    /// Index within the argument.
    index: usize,
}

impl Slot {
    /// Constructs a new [`Slot`].
    pub fn new<S: Into<String>>(name: S, index: usize) -> Self {
        Slot {
            name: name.into(),
            index,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.index)
    }
}

/// Specifies how one tensor slot is distributed across the workers.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionSpec {
    /// Every worker holds an equal slice of the given axis.
    Split(usize),
    /// Every worker holds the full tensor.
    Broadcast,
    /// Every worker holds a full-shape partial value; the logical tensor is
    /// the reduction of all of them.
    PartialReduce,
}

impl PartitionSpec {
    /// The split axis, if this is a split.
    pub fn split_axis(&self) -> Option<usize> {
        match self {
            PartitionSpec::Split(axis) => Some(*axis),
            _ => None,
        }
    }
}

impl fmt::Display for PartitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionSpec::Split(axis) => write!(f, "S({axis})"),
            PartitionSpec::Broadcast => f.write_str("B"),
            PartitionSpec::PartialReduce => f.write_str("P"),
        }
    }
}
