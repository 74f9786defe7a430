//! Marshalls: capability objects bridging host values to kernel types.
//!
//! A marshall knows a host value's declared shape and element type, whether
//! it can carry a derivative or be written, how to resolve the concrete
//! kernel type it vectorizes to, and how to declare its call-data
//! representation. The registry maps each [`HostKind`] to a factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::binding::BoundVariable;
use crate::codegen::CodeGenBlock;
use crate::context::CallContext;
use crate::shape::LooseShape;
use crate::types::{KernelType, TypeKind};

mod buffer;
mod dict;
mod host;
mod scalar;
mod texture;

pub use buffer::{NdBufferMarshall, NdDiffBufferMarshall};
pub use dict::DictMarshall;
pub use host::{HostKind, HostValue, NdBuffer, TextureValue};
pub use scalar::{DiffPairMarshall, ValueMarshall, ValueRefMarshall};
pub use texture::TextureMarshall;

/// Failure inside a marshall. The binding core attaches the variable path.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct MarshallError(pub String);

impl MarshallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type MarshallResult<T> = Result<T, MarshallError>;

/// Capabilities the binding core consumes from a host type.
pub trait Marshall: fmt::Debug + Send + Sync {
    /// Host-side type name, used in signatures and diagnostics.
    fn type_name(&self) -> String;

    /// Kernel type this host type maps to when named in an override.
    fn kernel_type(&self) -> KernelType;

    fn declared_shape(&self) -> LooseShape;

    fn element_type(&self) -> KernelType;

    fn has_derivative(&self) -> bool {
        false
    }

    fn is_writable(&self) -> bool {
        false
    }

    /// Kernel type left after removing `dimensions` leading dimensions.
    fn reduce_type(&self, ctx: &CallContext, dimensions: usize) -> MarshallResult<KernelType>;

    /// Concrete vectorized type when binding to the declared parameter type.
    fn resolve_type(&self, ctx: &CallContext, bound: &KernelType) -> MarshallResult<KernelType>;

    /// Number of dispatch dimensions consumed when vectorizing to
    /// `vector_type`.
    fn resolve_dimensionality(
        &self,
        ctx: &CallContext,
        vector_type: &KernelType,
    ) -> MarshallResult<usize>;

    /// Declare `_t_<name>` for a leaf variable.
    fn gen_calldata(
        &self,
        cgb: &mut CodeGenBlock,
        ctx: &CallContext,
        binding: &BoundVariable,
    ) -> MarshallResult<()>;
}

// ─── Container Helpers ─────────────────────────────────────────────

/// Shared type resolution for marshalls that wrap `dims` container
/// dimensions around an element type (buffers, textures).
#[derive(Clone, Debug)]
pub(crate) struct ContainerShape {
    pub container: KernelType,
    pub element: KernelType,
    pub extents: Vec<usize>,
}

impl ContainerShape {
    pub fn dims(&self) -> usize {
        self.extents.len()
    }

    pub fn declared_shape(&self) -> LooseShape {
        self.extents
            .iter()
            .copied()
            .chain(self.element.shape())
            .map(Some)
            .collect()
    }

    pub fn reduce(&self, dimensions: usize) -> MarshallResult<KernelType> {
        if dimensions == 0 {
            return Ok(self.container.clone());
        }
        if dimensions < self.dims() {
            return Err(MarshallError::new(format!(
                "cannot remove {} of the {} dimensions of {}",
                dimensions,
                self.dims(),
                self.container
            )));
        }
        self.element.reduce(dimensions - self.dims()).ok_or_else(|| {
            MarshallError::new(format!(
                "cannot remove {} dimensions from {}",
                dimensions, self.container
            ))
        })
    }

    pub fn resolve(&self, bound: &KernelType) -> MarshallResult<KernelType> {
        if bound.is_interface() {
            return Ok(self.element.clone());
        }
        if bound.is_resource() {
            if self.accepts_resource(bound) {
                return Ok(bound.clone());
            }
            return Err(MarshallError::new(format!(
                "cannot bind {} to parameter of type {}",
                self.container, bound
            )));
        }
        let total = self.dims() + self.element.shape().len();
        for dimensions in self.dims()..=total {
            if self.reduce(dimensions).is_ok_and(|t| &t == bound) {
                return Ok(bound.clone());
            }
        }
        Err(MarshallError::new(format!(
            "cannot bind {} to parameter of type {}",
            self.container, bound
        )))
    }

    /// A whole-resource parameter must match the container kind, element
    /// type and dimension count. A read-only container cannot fill a
    /// writable parameter.
    fn accepts_resource(&self, bound: &KernelType) -> bool {
        match (self.container.kind(), bound.kind()) {
            (
                TypeKind::NdBuffer { element: have, dims: have_dims, writable: have_rw },
                TypeKind::NdBuffer { element: want, dims: want_dims, writable: want_rw },
            )
            | (
                TypeKind::Texture { element: have, dims: have_dims, writable: have_rw },
                TypeKind::Texture { element: want, dims: want_dims, writable: want_rw },
            ) => have == want && have_dims == want_dims && (*have_rw || !*want_rw),
            _ => false,
        }
    }

    pub fn dimensionality(&self, vector_type: &KernelType) -> MarshallResult<usize> {
        dimensionality_against(self.declared_shape().len(), vector_type)
    }
}

/// Dimensions left over when a value of `declared_rank` dimensions is
/// consumed element-wise as `vector_type`.
pub(crate) fn dimensionality_against(
    declared_rank: usize,
    vector_type: &KernelType,
) -> MarshallResult<usize> {
    if vector_type.is_resource() {
        return Ok(0);
    }
    declared_rank
        .checked_sub(vector_type.shape().len())
        .ok_or_else(|| {
            MarshallError::new(format!(
                "{} has more dimensions than the {}-dimensional value",
                vector_type, declared_rank
            ))
        })
}

// ─── Registry ──────────────────────────────────────────────────────

/// Builds a marshall for a host value, or for a bare host type when no
/// value is available.
pub type MarshallFactory =
    Arc<dyn Fn(Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> + Send + Sync>;

/// Explicit host-kind → marshall registry, built once and passed to every
/// entry point.
#[derive(Clone, Default)]
pub struct MarshallRegistry {
    factories: HashMap<HostKind, MarshallFactory>,
}

impl fmt::Debug for MarshallRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.factories.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("MarshallRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl MarshallRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in scalar, reference, buffer, texture and
    /// dict marshalls.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in [
            HostKind::Int,
            HostKind::Float,
            HostKind::Bool,
            HostKind::Vector,
        ] {
            registry.register(kind, scalar::value_factory);
        }
        registry.register(HostKind::ValueRef, scalar::value_ref_factory);
        registry.register(HostKind::DiffPair, scalar::diff_pair_factory);
        registry.register(HostKind::Buffer, buffer::buffer_factory);
        registry.register(HostKind::DiffBuffer, buffer::diff_buffer_factory);
        registry.register(HostKind::Texture, texture::texture_factory);
        registry.register(HostKind::Dict, dict::dict_factory);
        registry
    }

    /// Register (or replace) the factory for a host kind.
    pub fn register<F>(&mut self, kind: HostKind, factory: F)
    where
        F: Fn(Option<&HostValue>) -> MarshallResult<Arc<dyn Marshall>> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
    }

    pub fn contains(&self, kind: HostKind) -> bool {
        self.factories.contains_key(&kind)
    }

    fn factory(&self, kind: HostKind) -> MarshallResult<&MarshallFactory> {
        self.factories
            .get(&kind)
            .ok_or_else(|| MarshallError::new(format!("no marshall registered for {}", kind)))
    }

    pub fn marshall_for_value(&self, value: &HostValue) -> MarshallResult<Arc<dyn Marshall>> {
        (self.factory(value.kind())?)(Some(value))
    }

    /// Marshall for a bare host type; factories may refuse without a value.
    pub fn marshall_for_kind(&self, kind: HostKind) -> MarshallResult<Arc<dyn Marshall>> {
        (self.factory(kind)?)(None)
    }
}
