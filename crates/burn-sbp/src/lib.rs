#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Burn operator contracts and SBP inference.
//!
//! Every operator declares its slots and attributes once through an
//! [`OpBuilder`]. For each node of a graph the compiler then:
//!
//! 1. validates the node's attribute values ([`OpDescriptor::validate_attrs`]),
//! 2. collects the split/broadcast/partial signatures the node accepts
//!    ([`OpDescriptor::signatures`]),
//! 3. picks one, and infers the per-worker output descriptors under it
//!    ([`OpDescriptor::infer`]).
//!
//! Operators live in a process-wide [`OpRegistry`] initialized once at startup.

extern crate alloc;

mod attribute;
mod error;
mod infer;
mod operator;
mod registry;
mod tensor;

pub mod ops;
pub mod sharding;

pub use attribute::*;
pub use error::*;
pub use infer::*;
pub use operator::*;
pub use registry::*;
pub use tensor::*;
