//! Partitioning of tensor slots across parallel workers.
//!
//! A node's inputs and outputs are each distributed with a [`PartitionSpec`]
//! (split along an axis, broadcast, or partial values awaiting a reduction).
//! A [`Signature`] assigns one spec to every slot of a node, operators declare
//! the signatures they accept through an [`SbpContext`], and the graph compiler
//! hands the chosen one back as a [`ParallelContext`] for inference.

mod context;
mod signature;
mod spec;

pub use context::*;
pub use signature::*;
pub use spec::*;
