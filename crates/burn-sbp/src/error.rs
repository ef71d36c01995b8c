use alloc::string::String;

use crate::sharding::{PartitionSpec, Slot};
use crate::{AttrType, DType, Shape};

/// Errors raised while declaring operators, validating attributes, inferring
/// tensor descriptors or building SBP signatures.
///
/// None of these are retried: each one points at a misconfiguration that has to
/// be fixed by the caller before the graph is compiled again.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum OpError {
    /// An operator with the same name is already registered.
    #[error("operator '{name}' is already registered")]
    DuplicateOperator {
        /// Operator name.
        name: String,
    },

    /// No operator with this name is registered.
    #[error("operator '{name}' is not registered")]
    UnknownOperator {
        /// Operator name.
        name: String,
    },

    /// The registry was initialized more than once.
    #[error("operator registry is already initialized")]
    RegistryAlreadyInitialized,

    /// Two attributes with the same name were declared on one operator.
    #[error("attribute '{attr}' declared twice on operator '{op}'")]
    DuplicateAttribute {
        /// Operator name.
        op: String,
        /// Attribute name.
        attr: String,
    },

    /// The operator declaration is inconsistent.
    #[error("invalid declaration of operator '{op}': {detail}")]
    InvalidDeclaration {
        /// Operator name.
        op: String,
        /// What is wrong.
        detail: String,
    },

    /// A required attribute was not supplied.
    #[error("operator '{op}' requires attribute '{attr}'")]
    MissingRequiredAttribute {
        /// Operator name.
        op: String,
        /// Attribute name.
        attr: String,
    },

    /// An attribute that the operator does not declare was supplied or requested.
    #[error("operator '{op}' has no attribute '{attr}'")]
    UnknownAttribute {
        /// Operator name.
        op: String,
        /// Attribute name.
        attr: String,
    },

    /// An attribute value does not have the declared type.
    #[error("attribute '{attr}' of operator '{op}' expects {expected}, got {actual}")]
    TypeMismatch {
        /// Operator name.
        op: String,
        /// Attribute name.
        attr: String,
        /// Declared type.
        expected: AttrType,
        /// Type of the supplied value.
        actual: AttrType,
    },

    /// An attribute has the right type but a value the operator cannot use.
    #[error("attribute '{attr}' of operator '{op}' is invalid: {detail}")]
    InvalidAttributeValue {
        /// Operator name.
        op: String,
        /// Attribute name.
        attr: String,
        /// What is wrong.
        detail: String,
    },

    /// A split dimension is not divisible by the worker count.
    #[error(
        "operator '{op}' cannot split {slot} on axis {axis}: {dividend} is not divisible by {divisor}"
    )]
    UnevenSplit {
        /// Operator name.
        op: String,
        /// Slot being split.
        slot: Slot,
        /// Split axis.
        axis: usize,
        /// Global size of the split dimension.
        dividend: usize,
        /// Number of workers.
        divisor: usize,
    },

    /// A split axis lies outside the rank of the tensor.
    #[error("operator '{op}' cannot split {slot} on axis {axis}: tensor has rank {rank}")]
    InvalidSplitAxis {
        /// Operator name.
        op: String,
        /// Slot being split.
        slot: Slot,
        /// Split axis.
        axis: usize,
        /// Tensor rank.
        rank: usize,
    },

    /// Input shapes violate a relationship required by the operator.
    #[error("operator '{op}' got incompatible shapes {lhs} and {rhs}")]
    ShapeMismatch {
        /// Operator name.
        op: String,
        /// First shape.
        lhs: Shape,
        /// Second shape.
        rhs: Shape,
    },

    /// Inputs that must share an element type do not.
    #[error("operator '{op}' got mismatched element types {lhs:?} and {rhs:?}")]
    DTypeMismatch {
        /// Operator name.
        op: String,
        /// First element type.
        lhs: DType,
        /// Second element type.
        rhs: DType,
    },

    /// The number of input or output descriptors is wrong.
    #[error("operator '{op}' expects {expected} {kind}, got {actual}")]
    ArityMismatch {
        /// Operator name.
        op: String,
        /// Either `"inputs"` or `"outputs"`.
        kind: &'static str,
        /// Declared slot count.
        expected: usize,
        /// Received count.
        actual: usize,
    },

    /// A multi-worker context assigns no partition to a slot.
    #[error("operator '{op}' has no partition assigned to {slot}")]
    UnassignedSlot {
        /// Operator name.
        op: String,
        /// Slot without a partition.
        slot: Slot,
    },

    /// A signature does not assign every slot exactly once.
    #[error("invalid signature for operator '{op}': {detail}")]
    InvalidSignature {
        /// Operator name.
        op: String,
        /// What is wrong.
        detail: String,
    },

    /// A parallel context assigns two different partitions to one slot.
    #[error("{slot} is assigned both {first} and {second}")]
    ConflictingPartition {
        /// Slot assigned twice.
        slot: Slot,
        /// First partition.
        first: PartitionSpec,
        /// Second partition.
        second: PartitionSpec,
    },

    /// The signature callback declared nothing.
    #[error("operator '{op}' declared no valid signature")]
    EmptySignatureSet {
        /// Operator name.
        op: String,
    },

    /// The worker count is zero.
    #[error("parallel context needs at least one worker")]
    InvalidParallelNum,
}
