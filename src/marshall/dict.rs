use std::sync::Arc;

use crate::binding::BoundVariable;
use crate::codegen::CodeGenBlock;
use crate::context::CallContext;
use crate::shape::LooseShape;
use crate::types::KernelType;

use super::{HostValue, Marshall, MarshallError, MarshallResult};

/// Marshall for string-keyed mappings. A dict node is always a composite
/// in the binding tree; its call-data type is assembled from its children,
/// so it only answers type questions on behalf of the container.
#[derive(Clone, Debug, Default)]
pub struct DictMarshall;

pub(super) fn dict_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    match value {
        Some(HostValue::Dict(_)) => Ok(Arc::new(DictMarshall)),
        Some(other) => Err(MarshallError::new(format!(
            "expected a dict, got {}",
            other.kind()
        ))),
        None => Err(MarshallError::new(
            "dict host type cannot be used as a vectorization override",
        )),
    }
}

impl Marshall for DictMarshall {
    fn type_name(&self) -> String {
        "dict".to_string()
    }

    fn kernel_type(&self) -> KernelType {
        KernelType::interface("dict")
    }

    fn declared_shape(&self) -> LooseShape {
        Vec::new()
    }

    fn element_type(&self) -> KernelType {
        self.kernel_type()
    }

    fn has_derivative(&self) -> bool {
        true
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn reduce_type(&self, _ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType> {
        Err(MarshallError::new(format!(
            "cannot reduce a dict by {} dimensions; vectorize its fields instead",
            dimensions
        )))
    }

    fn resolve_type(&self, _ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType> {
        if bound.is_struct() {
            Ok(bound.clone())
        } else {
            Err(MarshallError::new(format!(
                "a dict can only bind to a struct, not {}",
                bound
            )))
        }
    }

    fn resolve_dimensionality(
        &self,
        _ctx: &CallContext,
        _vector_type: &KernelType,
    ) -> MarshallResult<usize> {
        Ok(0)
    }

    fn gen_calldata(
        &self,
        _cgb: &mut CodeGenBlock,
        _ctx: &CallContext,
        binding: &BoundVariable,
    ) -> MarshallResult<()> {
        Err(MarshallError::new(format!(
            "dict `{}` must be generated from its fields",
            binding.path()
        )))
    }
}
