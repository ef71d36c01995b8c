use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::sharding::{ParallelContext, SbpContext, Signature, SignatureSet, Slot};
use crate::{AttrDecl, AttrMap, AttrSchema, AttrType, AttrValue, AttrValues, InferContext};
use crate::{OpError, TensorDesc};

/// Callback computing the per-worker output descriptors of a node.
pub type InferFn =
    Box<dyn Fn(&InferContext<'_>) -> Result<Vec<TensorDesc>, OpError> + Send + Sync>;

/// Callback declaring the signatures a node accepts.
pub type SbpFn = Box<dyn Fn(&mut SbpContext<'_>) -> Result<(), OpError> + Send + Sync>;

/// Devices an operator may be placed on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DeviceConstraint {
    /// No restriction.
    #[default]
    Any,
    /// The operator only runs on the host CPU.
    CpuOnly,
}

/// The contract of one operator: its slots, its attributes and the two
/// callbacks the graph compiler runs for every node of this type.
///
/// Created once through [`OpBuilder`] and read-only afterwards.
pub struct OpDescriptor {
    name: String,
    inputs: Vec<Slot>,
    outputs: Vec<Slot>,
    attrs: AttrSchema,
    device: DeviceConstraint,
    infer_fn: InferFn,
    sbp_fn: SbpFn,
}

impl OpDescriptor {
    /// Starts declaring an operator.
    pub fn builder<S: Into<String>>(name: S) -> OpBuilder {
        OpBuilder::new(name)
    }

    /// Operator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input slots in declaration order.
    pub fn inputs(&self) -> &[Slot] {
        &self.inputs
    }

    /// Output slots in declaration order.
    pub fn outputs(&self) -> &[Slot] {
        &self.outputs
    }

    /// Attribute declarations.
    pub fn attrs(&self) -> &AttrSchema {
        &self.attrs
    }

    /// Placement restriction.
    pub fn device(&self) -> DeviceConstraint {
        self.device
    }

    /// Validates the attributes supplied for a node of this operator.
    pub fn validate_attrs(&self, supplied: &AttrValues) -> Result<AttrMap, OpError> {
        self.attrs.validate(&self.name, supplied)
    }

    /// Infers the per-worker output descriptors of a node.
    ///
    /// `inputs` are the logical descriptors of the node's inputs, one per
    /// declared input slot. With more than one worker, `parallel` must assign
    /// every input and output slot, and the assignment must be one of the
    /// node's [`signatures`](Self::signatures).
    pub fn infer(
        &self,
        attrs: &AttrMap,
        parallel: &ParallelContext,
        inputs: &[TensorDesc],
    ) -> Result<Vec<TensorDesc>, OpError> {
        self.check_attrs(attrs)?;
        self.check_arity("inputs", self.inputs.len(), inputs.len())?;
        if parallel.parallel_num() > 1 {
            self.check_signature(attrs, parallel, inputs)?;
        }
        log::trace!(
            "inferring '{}' with {} workers",
            self.name,
            parallel.parallel_num()
        );

        let ctx = InferContext::new(
            &self.name,
            attrs,
            parallel,
            &self.inputs,
            &self.outputs,
            inputs,
        );
        let outputs = (self.infer_fn)(&ctx)?;
        self.check_arity("outputs", self.outputs.len(), outputs.len())?;

        Ok(outputs)
    }

    /// Collects the signatures a node accepts.
    ///
    /// The result is never empty: an operator declaring no signature fails
    /// with [`OpError::EmptySignatureSet`].
    pub fn signatures(
        &self,
        attrs: &AttrMap,
        logical_inputs: &[TensorDesc],
    ) -> Result<SignatureSet, OpError> {
        self.check_attrs(attrs)?;
        self.check_arity("inputs", self.inputs.len(), logical_inputs.len())?;

        let mut ctx = SbpContext::new(
            &self.name,
            &self.inputs,
            &self.outputs,
            attrs,
            logical_inputs,
        );
        (self.sbp_fn)(&mut ctx)?;
        let signatures = ctx.finish();
        log::trace!(
            "operator '{}' accepts {} signature(s)",
            self.name,
            signatures.len()
        );

        if signatures.is_empty() {
            return Err(OpError::EmptySignatureSet {
                op: self.name.clone(),
            });
        }
        Ok(signatures)
    }

    fn check_attrs(&self, attrs: &AttrMap) -> Result<(), OpError> {
        if attrs.op() != self.name {
            return Err(OpError::InvalidDeclaration {
                op: self.name.clone(),
                detail: format!("attributes were validated for operator '{}'", attrs.op()),
            });
        }
        Ok(())
    }

    fn check_signature(
        &self,
        attrs: &AttrMap,
        parallel: &ParallelContext,
        inputs: &[TensorDesc],
    ) -> Result<(), OpError> {
        let mut assignments = Vec::with_capacity(self.inputs.len() + self.outputs.len());
        for slot in self.inputs.iter().chain(self.outputs.iter()) {
            let spec = parallel
                .partition_of(slot)
                .ok_or_else(|| OpError::UnassignedSlot {
                    op: self.name.clone(),
                    slot: slot.clone(),
                })?;
            assignments.push((slot.clone(), spec));
        }

        let signature = Signature::new(assignments);
        if !self.signatures(attrs, inputs)?.contains(&signature) {
            return Err(OpError::InvalidSignature {
                op: self.name.clone(),
                detail: format!("{signature} is not a declared signature"),
            });
        }
        Ok(())
    }

    fn check_arity(
        &self,
        kind: &'static str,
        expected: usize,
        actual: usize,
    ) -> Result<(), OpError> {
        if expected != actual {
            return Err(OpError::ArityMismatch {
                op: self.name.clone(),
                kind,
                expected,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Debug for OpDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpDescriptor")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("attrs", &self.attrs)
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

/// A builder for constructing an [`OpDescriptor`].
///
/// Declarations are chained; every check runs once in [`build`](Self::build),
/// so a misdeclared operator fails at registration time.
pub struct OpBuilder {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    attrs: Vec<AttrDecl>,
    device: DeviceConstraint,
    infer_fn: Option<InferFn>,
    sbp_fn: Option<SbpFn>,
}

impl OpBuilder {
    /// Creates a new [`OpBuilder`] for the operator `name`.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: Vec::new(),
            device: DeviceConstraint::Any,
            infer_fn: None,
            sbp_fn: None,
        }
    }

    /// Declares an input slot.
    pub fn input<S: Into<String>>(mut self, name: S) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Declares an output slot.
    pub fn output<S: Into<String>>(mut self, name: S) -> Self {
        self.outputs.push(name.into());
        self
    }

    /// Declares a required attribute.
    pub fn attr<S: Into<String>>(self, name: S, value_type: AttrType) -> Self {
        self.attr_decl(AttrDecl::required(name, value_type))
    }

    /// Declares an optional attribute with its default.
    pub fn attr_with_default<S, V>(self, name: S, default: V) -> Self
    where
        S: Into<String>,
        V: Into<AttrValue>,
    {
        self.attr_decl(AttrDecl::with_default(name, default))
    }

    /// Declares an attribute.
    pub fn attr_decl(mut self, decl: AttrDecl) -> Self {
        self.attrs.push(decl);
        self
    }

    /// Restricts the operator to the host CPU.
    pub fn cpu_only(mut self) -> Self {
        self.device = DeviceConstraint::CpuOnly;
        self
    }

    /// Sets the tensor descriptor inference callback.
    pub fn infer_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&InferContext<'_>) -> Result<Vec<TensorDesc>, OpError> + Send + Sync + 'static,
    {
        self.infer_fn = Some(Box::new(f));
        self
    }

    /// Sets the signature callback.
    pub fn sbp_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut SbpContext<'_>) -> Result<(), OpError> + Send + Sync + 'static,
    {
        self.sbp_fn = Some(Box::new(f));
        self
    }

    /// Builds an [`OpDescriptor`] from the current declarations.
    pub fn build(self) -> Result<OpDescriptor, OpError> {
        let invalid = |detail: String| OpError::InvalidDeclaration {
            op: self.name.clone(),
            detail,
        };

        if self.name.is_empty() {
            return Err(invalid("operator name is empty".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(invalid("no output declared".to_string()));
        }
        let slot_names = self.inputs.iter().chain(self.outputs.iter());
        for (i, name) in slot_names.clone().enumerate() {
            if slot_names.clone().take(i).any(|other| other == name) {
                return Err(invalid(format!("slot '{name}' declared twice")));
            }
        }
        let infer_fn = self
            .infer_fn
            .ok_or_else(|| invalid("no inference function".to_string()))?;
        let sbp_fn = self
            .sbp_fn
            .ok_or_else(|| invalid("no signature function".to_string()))?;

        let mut attrs = AttrSchema::default();
        for decl in self.attrs {
            attrs.declare(&self.name, decl)?;
        }

        log::debug!(
            "declared operator '{}': {} input(s), {} output(s), {} attribute(s)",
            self.name,
            self.inputs.len(),
            self.outputs.len(),
            attrs.len()
        );

        Ok(OpDescriptor {
            inputs: self.inputs.into_iter().map(|name| Slot::new(name, 0)).collect(),
            outputs: self.outputs.into_iter().map(|name| Slot::new(name, 0)).collect(),
            name: self.name,
            attrs,
            device: self.device,
            infer_fn,
            sbp_fn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;
    use crate::sharding::{ParallelContextBuilder, PartitionSpec};
    use alloc::vec;

    fn identity() -> OpBuilder {
        OpBuilder::new("Identity")
            .input("x")
            .output("y")
            .infer_fn(|ctx| Ok(vec![ctx.local_input(0)?]))
            .sbp_fn(|ctx| {
                let slots = [ctx.inputs(), ctx.outputs()].concat();
                ctx.new_builder().broadcast(&slots).build()
            })
    }

    #[test]
    fn test_op_builder() {
        let op = identity().attr_with_default("scale", 1.0f32).build().unwrap();

        assert_eq!(op.name(), "Identity");
        assert_eq!(op.inputs(), &[Slot::new("x", 0)]);
        assert_eq!(op.outputs(), &[Slot::new("y", 0)]);
        assert_eq!(op.attrs().len(), 1);
        assert_eq!(op.device(), DeviceConstraint::Any);
    }

    #[test]
    #[should_panic = "DuplicateAttribute { op: \"Identity\", attr: \"scale\" }"]
    fn test_op_builder_attr_should_be_unique() {
        let _op = identity()
            .attr_with_default("scale", 1.0f32)
            .attr("scale", AttrType::Float)
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "slot 'x' declared twice"]
    fn test_op_builder_slot_should_be_unique() {
        let _op = identity().output("x").build().unwrap();
    }

    #[test]
    #[should_panic = "no signature function"]
    fn test_op_builder_needs_sbp_fn() {
        let _op = OpBuilder::new("Identity")
            .output("y")
            .infer_fn(|_| Ok(vec![]))
            .build()
            .unwrap();
    }

    #[test]
    fn test_infer_checks_arity() {
        let op = identity().build().unwrap();
        let attrs = op.validate_attrs(&AttrValues::new()).unwrap();

        let err = op
            .infer(&attrs, &ParallelContext::single(), &[])
            .unwrap_err();
        assert_eq!(
            err,
            OpError::ArityMismatch {
                op: "Identity".into(),
                kind: "inputs",
                expected: 1,
                actual: 0,
            }
        );
    }

    #[test]
    fn test_infer_checks_output_count() {
        let op = OpBuilder::new("Broken")
            .output("y")
            .infer_fn(|_| Ok(vec![]))
            .sbp_fn(|ctx| {
                let outputs = ctx.outputs();
                ctx.new_builder().split(outputs, 0).build()
            })
            .build()
            .unwrap();
        let attrs = op.validate_attrs(&AttrValues::new()).unwrap();

        assert!(matches!(
            op.infer(&attrs, &ParallelContext::single(), &[]),
            Err(OpError::ArityMismatch { kind: "outputs", .. })
        ));
    }

    #[test]
    fn test_signatures_should_not_be_empty() {
        let op = OpBuilder::new("Silent")
            .output("y")
            .infer_fn(|_| Ok(vec![TensorDesc::new([1], DType::F32)]))
            .sbp_fn(|_| Ok(()))
            .build()
            .unwrap();
        let attrs = op.validate_attrs(&AttrValues::new()).unwrap();

        assert_eq!(
            op.signatures(&attrs, &[]),
            Err(OpError::EmptySignatureSet {
                op: "Silent".into()
            })
        );
    }

    #[test]
    fn test_infer_attrs_should_belong_to_operator() {
        let op = identity().build().unwrap();
        let other = OpBuilder::new("Other")
            .output("y")
            .infer_fn(|_| Ok(vec![]))
            .sbp_fn(|_| Ok(()))
            .build()
            .unwrap();
        let attrs = other.validate_attrs(&AttrValues::new()).unwrap();
        let inputs = [TensorDesc::new([4], DType::F32)];

        let err = op
            .infer(&attrs, &ParallelContext::single(), &inputs)
            .unwrap_err();
        assert_eq!(
            err,
            OpError::InvalidDeclaration {
                op: "Identity".into(),
                detail: "attributes were validated for operator 'Other'".into(),
            }
        );
        assert!(matches!(
            op.signatures(&attrs, &inputs),
            Err(OpError::InvalidDeclaration { .. })
        ));
    }

    #[test]
    #[should_panic = "UnassignedSlot { op: \"Identity\", slot: Slot { name: \"y\", index: 0 } }"]
    fn test_infer_output_slot_should_be_assigned() {
        let op = identity().build().unwrap();
        let attrs = op.validate_attrs(&AttrValues::new()).unwrap();
        let parallel = ParallelContextBuilder::new(2)
            .with_partition(Slot::new("x", 0), PartitionSpec::Broadcast)
            .build()
            .unwrap();

        op.infer(&attrs, &parallel, &[TensorDesc::new([4], DType::F32)])
            .unwrap();
    }

    #[test]
    #[should_panic = "(x_0: B, y_0: S(0)) is not a declared signature"]
    fn test_infer_assignment_should_be_declared() {
        let op = identity().build().unwrap();
        let attrs = op.validate_attrs(&AttrValues::new()).unwrap();
        let parallel = ParallelContextBuilder::new(2)
            .with_partition(Slot::new("x", 0), PartitionSpec::Broadcast)
            .with_partition(Slot::new("y", 0), PartitionSpec::Split(0))
            .build()
            .unwrap();

        op.infer(&attrs, &parallel, &[TensorDesc::new([4], DType::F32)])
            .unwrap();
    }
}
