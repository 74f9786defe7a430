use std::sync::Arc;

use crate::binding::BoundVariable;
use crate::codegen::CodeGenBlock;
use crate::context::CallContext;
use crate::shape::LooseShape;
use crate::types::KernelType;

use super::{ContainerShape, HostValue, Marshall, MarshallError, MarshallResult, TextureValue};

/// 1D, 2D and 3D textures. Each texel is one dispatch element.
#[derive(Clone, Debug)]
pub struct TextureMarshall {
    shape: ContainerShape,
    writable: bool,
}

impl TextureMarshall {
    pub fn new(texture: &TextureValue) -> Self {
        Self {
            shape: ContainerShape {
                container: KernelType::texture(
                    texture.texel.clone(),
                    texture.dims,
                    texture.writable,
                ),
                element: texture.texel.clone(),
                extents: texture.size.clone(),
            },
            writable: texture.writable,
        }
    }
}

pub(super) fn texture_factory(value: Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> {
    match value {
        Some(HostValue::Texture(texture)) => {
            if !(1..=3).contains(&texture.dims) || texture.size.len() != texture.dims {
                return Err(MarshallError::new(format!(
                    "unsupported {}-dimensional texture of size {:?}",
                    texture.dims, texture.size
                )));
            }
            Ok(Arc::new(TextureMarshall::new(texture)))
        }
        Some(other) => Err(MarshallError::new(format!(
            "expected a Texture, got {}",
            other.kind()
        ))),
        None => Err(MarshallError::new(
            "Texture host type needs a value to determine its texel type",
        )),
    }
}

impl Marshall for TextureMarshall {
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
        let prefix = if binding.access().primal.writes() {
            "RW"
        } else {
            ""
        };
        cgb.type_alias(
            &format!("_t_{}", binding.variable_name()),
            &format!(
                "{}Texture{}DType<{}>",
                prefix,
                self.shape.dims(),
                self.shape.element.full_name()
            ),
        );
        Ok(())
    }
}
