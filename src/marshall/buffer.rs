//! N-dimensional buffer marshalls, with and without gradient storage.

use std::sync::Arc;

use crate::access::AccessType;
use crate::binding::BoundVariable;
use crate::codegen::{emit_differential_pair, CodeGenBlock, DifferentialPair, NONE_STORAGE};
use crate::context::CallContext;
use crate::shape::LooseShape;
use crate::types::KernelType;

use super::{ContainerShape, HostValue, Marshall, MarshallError, MarshallResult, NdBuffer};

fn container_of(buffer: &NdBuffer) -> ContainerShape {
    ContainerShape {
        container: KernelType::nd_buffer(
            buffer.element.clone(),
            buffer.shape.len(),
            buffer.writable,
        ),
        element: buffer.element.clone(),
        extents: buffer.shape.clone(),
    }
}

fn buffer_storage(access: AccessType, element: &str, dims: usize) -> String {
    match access {
        AccessType::None => NONE_STORAGE.to_string(),
        AccessType::Read => format!("NDBuffer<{},{}>", element, dims),
        AccessType::Write | AccessType::ReadWrite => format!("RWNDBuffer<{},{}>", element, dims),
    }
}

// ─── Plain Buffers ─────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct NdBufferMarshall {
    shape: ContainerShape,
    writable: bool,
}

impl NdBufferMarshall {
    pub fn new(buffer: &NdBuffer) -> Self {
        Self {
            shape: container_of(buffer),
            writable: buffer.writable,
        }
    }
}

pub(super) fn buffer_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    match value {
        Some(HostValue::Buffer(buffer)) => Ok(Arc::new(NdBufferMarshall::new(buffer))),
        Some(other) => Err(MarshallError::new(format!(
            "expected an NDBuffer, got {}",
            other.kind()
        ))),
        None => Err(MarshallError::new(
            "NDBuffer host type needs a value to determine its element type",
        )),
    }
}

impl Marshall for NdBufferMarshall {
    fn type_name(&self) -> String {
        self.shape.container.full_name().to_string()
    }

    fn kernel_type(&self) -> KernelType {
        self.shape.container.clone()
    }

    fn declared_shape(&self) -> LooseShape {
        self.shape.declared_shape()
    }

    fn element_type(&self) -> KernelType {
        self.shape.element.clone()
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn reduce_type(&self, _ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType> {
        self.shape.reduce(dimensions)
    }

    fn resolve_type(&self, _ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType> {
        self.shape.resolve(bound)
    }

    fn resolve_dimensionality(
        &self,
        _ctx: &CallContext,
        vector_type: &KernelType,
    ) -> MarshallResult<usize> {
        self.shape.dimensionality(vector_type)
    }

    fn gen_calldata(
        &self,
        cgb: &mut CodeGenBlock,
        _ctx: &CallContext,
        binding: &BoundVariable,
    ) -> MarshallResult<()> {
        let access = binding.access();
        if access.derivative != AccessType::None {
            return Err(MarshallError::new(format!(
                "{} has no gradient storage for derivative access",
                self.type_name()
            )));
        }
        let primal = match access.primal {
            AccessType::None => AccessType::Read,
            other => other,
        };
        cgb.type_alias(
            &format!("_t_{}", binding.variable_name()),
            &buffer_storage(
                primal,
                self.shape.element.full_name(),
                self.shape.dims(),
            ),
        );
        Ok(())
    }
}

// ─── Differentiable Buffers ────────────────────────────────────────

/// A buffer paired with a gradient buffer of the same shape.
#[derive(Clone, Debug)]
pub struct NdDiffBufferMarshall {
    shape: ContainerShape,
    writable: bool,
    needs_grad: bool,
}

impl NdDiffBufferMarshall {
    pub fn new(buffer: &NdBuffer, needs_grad: bool) -> Self {
        Self {
            shape: container_of(buffer),
            writable: buffer.writable,
            needs_grad,
        }
    }
}

pub(super) fn diff_buffer_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    match value {
        Some(HostValue::DiffBuffer { buffer, needs_grad }) => {
            Ok(Arc::new(NdDiffBufferMarshall::new(buffer, *needs_grad)))
        }
        Some(other) => Err(MarshallError::new(format!(
            "expected an NDDifferentiableBuffer, got {}",
            other.kind()
        ))),
        None => Err(MarshallError::new(
            "NDDifferentiableBuffer host type needs a value to determine its element type",
        )),
    }
}

impl Marshall for NdDiffBufferMarshall {
    fn type_name(&self) -> String {
        format!(
            "NDDifferentiableBuffer<{},{}>",
            self.shape.element,
            self.shape.dims()
        )
    }

    fn kernel_type(&self) -> KernelType {
        self.shape.container.clone()
    }

    fn declared_shape(&self) -> LooseShape {
        self.shape.declared_shape()
    }

    fn element_type(&self) -> KernelType {
        self.shape.element.clone()
    }

    fn has_derivative(&self) -> bool {
        self.needs_grad
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn reduce_type(&self, _ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType> {
        self.shape.reduce(dimensions)
    }

    fn resolve_type(&self, _ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType> {
        self.shape.resolve(bound)
    }

    fn resolve_dimensionality(
        &self,
        _ctx: &CallContext,
        vector_type: &KernelType,
    ) -> MarshallResult<usize> {
        self.shape.dimensionality(vector_type)
    }

    fn gen_calldata(
        &self,
        cgb: &mut CodeGenBlock,
        _ctx: &CallContext,
        binding: &BoundVariable,
    ) -> MarshallResult<()> {
        let target = binding
            .vector_type()
            .ok_or_else(|| MarshallError::new("vector type has not been resolved"))?;
        let element = self.shape.element.full_name();
        let dims = self.shape.dims();
        let access = binding.access();
        emit_differential_pair(
            cgb,
            &DifferentialPair {
                name: binding.variable_name().to_string(),
                primal_storage: buffer_storage(access.primal, element, dims),
                derivative_storage: buffer_storage(access.derivative, element, dims),
                primal_target: target.full_name().to_string(),
                derivative_target: target.differential_name(),
            },
        );
        Ok(())
    }
}
