//! Marshalls for plain values, value references and scalar diff pairs.

use std::sync::Arc;

use crate::access::AccessType;
use crate::binding::BoundVariable;
use crate::codegen::{emit_differential_pair, CodeGenBlock, DifferentialPair, NONE_STORAGE};
use crate::context::CallContext;
use crate::shape::LooseShape;
use crate::types::{KernelType, ScalarType, TypeKind};

use super::{dimensionality_against, HostValue, Marshall, MarshallError, MarshallResult};

/// Resolution shared by every value-like marshall: the value's own type
/// may be consumed whole, element-wise, or converted between scalars.
fn resolve_value_type(ty: &KernelType, bound: &KernelType) -> MarshallResult<KernelType> {
    if bound.is_interface() || bound == ty {
        return Ok(ty.clone());
    }
    for dimensions in 0..=ty.shape().len() {
        if ty.reduce(dimensions).is_some_and(|t| &t == bound) {
            return Ok(bound.clone());
        }
    }
    if let (TypeKind::Scalar(_), TypeKind::Scalar(_)) = (ty.kind(), bound.kind()) {
        return Ok(bound.clone());
    }
    Err(MarshallError::new(format!(
        "cannot bind value of type {} to parameter of type {}",
        ty, bound
    )))
}

fn reduce_value_type(ty: &KernelType, dimensions: usize) -> MarshallResult<KernelType> {
    ty.reduce(dimensions).ok_or_else(|| {
        MarshallError::new(format!(
            "cannot remove {} dimensions from {}",
            dimensions, ty
        ))
    })
}

fn declared_value_shape(ty: &KernelType) -> LooseShape {
    ty.shape().into_iter().map(Some).collect()
}

fn vector_type_name(binding: &BoundVariable) -> MarshallResult<String> {
    binding
        .vector_type()
        .map(|t| t.full_name().to_string())
        .ok_or_else(|| MarshallError::new("vector type has not been resolved"))
}

fn value_storage(access: AccessType, element: &str) -> String {
    match access {
        AccessType::None => NONE_STORAGE.to_string(),
        AccessType::Read => format!("ValueType<{}>", element),
        AccessType::Write | AccessType::ReadWrite => format!("RWValueRef<{}>", element),
    }
}

fn plain_type(value: &HostValue) -> MarshallResult<KernelType> {
    if let HostValue::Vector(_, components) = value {
        if !(1..=4).contains(&components.len()) {
            return Err(MarshallError::new(format!(
                "vectors must have 1 to 4 components, got {}",
                components.len()
            )));
        }
    }
    value
        .scalar_type()
        .ok_or_else(|| MarshallError::new(format!("{} is not a plain value", value.kind())))
}

// ─── Plain Values ──────────────────────────────────────────────────

/// Immutable scalars and vectors passed by value.
#[derive(Clone, Debug)]
pub struct ValueMarshall {
    ty: KernelType,
}

impl ValueMarshall {
    pub fn new(ty: KernelType) -> Self {
        Self { ty }
    }
}

pub(super) fn value_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    let ty = match value {
        Some(value) => plain_type(value)?,
        None => KernelType::scalar(ScalarType::Float),
    };
    Ok(Arc::new(ValueMarshall::new(ty)))
}

impl Marshall for ValueMarshall {
    fn type_name(&self) -> String {
        self.ty.full_name().to_string()
    }

    fn kernel_type(&self) -> KernelType {
        self.ty.clone()
    }

    fn declared_shape(&self) -> LooseShape {
        declared_value_shape(&self.ty)
    }

    fn element_type(&self) -> KernelType {
        self.ty.clone()
    }

    fn reduce_type(&self, _ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType> {
        reduce_value_type(&self.ty, dimensions)
    }

    fn resolve_type(&self, _ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType> {
        resolve_value_type(&self.ty, bound)
    }

    fn resolve_dimensionality(
        &self,
        _ctx: &CallContext,
        vector_type: &KernelType,
    ) -> MarshallResult<usize> {
        dimensionality_against(self.ty.shape().len(), vector_type)
    }

    fn gen_calldata(
        &self,
        cgb: &mut CodeGenBlock,
        _ctx: &CallContext,
        binding: &BoundVariable,
    ) -> MarshallResult<()> {
        let element = vector_type_name(binding)?;
        cgb.type_alias(
            &format!("_t_{}", binding.variable_name()),
            &format!("ValueType<{}>", element),
        );
        Ok(())
    }
}

// ─── Value References ──────────────────────────────────────────────

/// Writable single-value reference, the host's way to receive `out` and
/// `inout` scalars.
#[derive(Clone, Debug)]
pub struct ValueRefMarshall {
    ty: KernelType,
}

impl ValueRefMarshall {
    pub fn new(ty: KernelType) -> Self {
        Self { ty }
    }
}

pub(super) fn value_ref_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    match value {
        Some(HostValue::ValueRef(inner)) => Ok(Arc::new(ValueRefMarshall::new(plain_type(inner)?))),
        Some(other) => Err(MarshallError::new(format!(
            "expected a ValueRef, got {}",
            other.kind()
        ))),
        None => Err(MarshallError::new(
            "ValueRef host type needs a value to determine its element type",
        )),
    }
}

impl Marshall for ValueRefMarshall {
    fn type_name(&self) -> String {
        format!("ValueRef<{}>", self.ty)
    }

    fn kernel_type(&self) -> KernelType {
        self.ty.clone()
    }

    fn declared_shape(&self) -> LooseShape {
        declared_value_shape(&self.ty)
    }

    fn element_type(&self) -> KernelType {
        self.ty.clone()
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn reduce_type(&self, _ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType> {
        reduce_value_type(&self.ty, dimensions)
    }

    fn resolve_type(&self, _ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType> {
        resolve_value_type(&self.ty, bound)
    }

    fn resolve_dimensionality(
        &self,
        _ctx: &CallContext,
        vector_type: &KernelType,
    ) -> MarshallResult<usize> {
        dimensionality_against(self.ty.shape().len(), vector_type)
    }

    fn gen_calldata(
        &self,
        cgb: &mut CodeGenBlock,
        _ctx: &CallContext,
        binding: &BoundVariable,
    ) -> MarshallResult<()> {
        let element = vector_type_name(binding)?;
        cgb.type_alias(
            &format!("_t_{}", binding.variable_name()),
            &value_storage(binding.access().primal, &element),
        );
        Ok(())
    }
}

// ─── Diff Pairs ────────────────────────────────────────────────────

/// A scalar primal with an attached gradient.
#[derive(Clone, Debug)]
pub struct DiffPairMarshall {
    ty: KernelType,
    needs_grad: bool,
}

impl DiffPairMarshall {
    pub fn new(ty: KernelType, needs_grad: bool) -> Self {
        Self { ty, needs_grad }
    }
}

pub(super) fn diff_pair_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    let needs_grad = match value {
        Some(HostValue::DiffPair { needs_grad, .. }) => *needs_grad,
        Some(other) => {
            return Err(MarshallError::new(format!(
                "expected a DiffPair, got {}",
                other.kind()
            )))
        }
        None => true,
    };
    Ok(Arc::new(DiffPairMarshall::new(
        KernelType::scalar(ScalarType::Float),
        needs_grad,
    )))
}

impl Marshall for DiffPairMarshall {
    fn type_name(&self) -> String {
        format!("DiffPair<{}>", self.ty)
    }

    fn kernel_type(&self) -> KernelType {
        self.ty.clone()
    }

    fn declared_shape(&self) -> LooseShape {
        declared_value_shape(&self.ty)
    }

    fn element_type(&self) -> KernelType {
        self.ty.clone()
    }

    fn has_derivative(&self) -> bool {
        self.needs_grad
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn reduce_type(&self, _ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType> {
        reduce_value_type(&self.ty, dimensions)
    }

    fn resolve_type(&self, _ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType> {
        resolve_value_type(&self.ty, bound)
    }

    fn resolve_dimensionality(
        &self,
        _ctx: &CallContext,
        vector_type: &KernelType,
    ) -> MarshallResult<usize> {
        dimensionality_against(self.ty.shape().len(), vector_type)
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
        let element = self.ty.full_name();
        let access = binding.access();
        emit_differential_pair(
            cgb,
            &DifferentialPair {
                name: binding.variable_name().to_string(),
                primal_storage: value_storage(access.primal, element),
                derivative_storage: value_storage(access.derivative, element),
                primal_target: target.full_name().to_string(),
                derivative_target: target.differential_name(),
            },
        );
        Ok(())
    }
}
