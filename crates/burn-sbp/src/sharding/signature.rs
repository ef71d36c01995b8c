use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use super::{PartitionSpec, Slot};
use crate::{AttrMap, OpError, TensorDesc};

/// One consistent assignment of a [`PartitionSpec`] to every input and output
/// slot of a node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    /// Inputs first, then outputs, each in declaration order.
    assignments: Vec<(Slot, PartitionSpec)>,
}

impl Signature {
    pub(crate) fn new(assignments: Vec<(Slot, PartitionSpec)>) -> Self {
        Self { assignments }
    }

    /// Partition of a slot in this signature.
    pub fn partition_of(&self, slot: &Slot) -> Option<PartitionSpec> {
        self.assignments
            .iter()
            .find(|(s, _)| s == slot)
            .map(|(_, spec)| *spec)
    }

    /// Iterates over the slot assignments.
    pub fn iter(&self) -> impl Iterator<Item = &(Slot, PartitionSpec)> {
        self.assignments.iter()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (slot, spec)) in self.assignments.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{slot}: {spec}")?;
        }
        f.write_str(")")
    }
}

/// The signatures an operator accepts, in the order they were declared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

impl SignatureSet {
    /// Number of signatures.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether no signature was declared.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Iterates over the signatures.
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    /// Whether `signature` is part of the set.
    pub fn contains(&self, signature: &Signature) -> bool {
        self.signatures.contains(signature)
    }

    fn insert(&mut self, signature: Signature) {
        if !self.contains(&signature) {
            self.signatures.push(signature);
        }
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a Signature;
    type IntoIter = core::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.signatures.iter()
    }
}

/// View of a node handed to signature callbacks.
///
/// It exposes the node's slots, its attributes and the logical descriptors of
/// its inputs, but not the worker count: signature legality never depends on
/// how many workers run the node.
pub struct SbpContext<'a> {
    op: &'a str,
    inputs: &'a [Slot],
    outputs: &'a [Slot],
    attrs: &'a AttrMap,
    logical_inputs: &'a [TensorDesc],
    signatures: SignatureSet,
}

impl<'a> SbpContext<'a> {
    pub(crate) fn new(
        op: &'a str,
        inputs: &'a [Slot],
        outputs: &'a [Slot],
        attrs: &'a AttrMap,
        logical_inputs: &'a [TensorDesc],
    ) -> Self {
        Self {
            op,
            inputs,
            outputs,
            attrs,
            logical_inputs,
            signatures: SignatureSet::default(),
        }
    }

    /// Name of the operator.
    pub fn op(&self) -> &'a str {
        self.op
    }

    /// Input slots.
    pub fn inputs(&self) -> &'a [Slot] {
        self.inputs
    }

    /// Output slots.
    pub fn outputs(&self) -> &'a [Slot] {
        self.outputs
    }

    /// Resolved attributes of the node.
    pub fn attrs(&self) -> &'a AttrMap {
        self.attrs
    }

    /// Logical (global) descriptor of an input.
    pub fn logical_input(&self, index: usize) -> Result<&'a TensorDesc, OpError> {
        self.logical_inputs
            .get(index)
            .ok_or_else(|| OpError::ArityMismatch {
                op: self.op.to_string(),
                kind: "inputs",
                expected: index + 1,
                actual: self.logical_inputs.len(),
            })
    }

    /// Starts declaring a new signature.
    pub fn new_builder(&mut self) -> SignatureBuilder<'_, 'a> {
        SignatureBuilder {
            ctx: self,
            assignments: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> SignatureSet {
        self.signatures
    }
}

/// Accumulates the partition of every slot of one signature.
pub struct SignatureBuilder<'c, 'a> {
    ctx: &'c mut SbpContext<'a>,
    assignments: Vec<(Slot, PartitionSpec)>,
}

impl SignatureBuilder<'_, '_> {
    /// Splits all `slots` along `axis`.
    pub fn split(self, slots: &[Slot], axis: usize) -> Self {
        self.assign(slots, PartitionSpec::Split(axis))
    }

    /// Broadcasts all `slots`.
    pub fn broadcast(self, slots: &[Slot]) -> Self {
        self.assign(slots, PartitionSpec::Broadcast)
    }

    /// Marks all `slots` as partial values.
    pub fn partial_reduce(self, slots: &[Slot]) -> Self {
        self.assign(slots, PartitionSpec::PartialReduce)
    }

    /// Assigns one partition to all `slots`.
    pub fn assign(mut self, slots: &[Slot], spec: PartitionSpec) -> Self {
        self.assignments
            .extend(slots.iter().map(|slot| (slot.clone(), spec)));
        self
    }

    /// Checks that every slot of the node is assigned exactly once and adds the
    /// signature to the context. Declaring the same signature twice keeps one.
    pub fn build(self) -> Result<(), OpError> {
        let ctx = self.ctx;
        let invalid = |detail: String| OpError::InvalidSignature {
            op: ctx.op.to_string(),
            detail,
        };

        for (i, (slot, _)) in self.assignments.iter().enumerate() {
            if self.assignments[..i].iter().any(|(s, _)| s == slot) {
                return Err(invalid(format!("{slot} assigned more than once")));
            }
            if !ctx.inputs.contains(slot) && !ctx.outputs.contains(slot) {
                return Err(invalid(format!("{slot} is not a slot of the operator")));
            }
        }

        let mut assignments = Vec::with_capacity(self.assignments.len());
        for slot in ctx.inputs.iter().chain(ctx.outputs.iter()) {
            let spec = self
                .assignments
                .iter()
                .find(|(s, _)| s == slot)
                .map(|(_, spec)| *spec)
                .ok_or_else(|| invalid(format!("{slot} has no partition")))?;
            assignments.push((slot.clone(), spec));
        }

        let signature = Signature::new(assignments);
        log::trace!("operator '{}' declares signature {signature}", ctx.op);
        ctx.signatures.insert(signature);
        Ok(())
    }
}
