//! Host-side argument values.

use std::fmt;

use crate::types::{KernelType, ScalarType};

/// An N-dimensional device buffer as seen from the host.
#[derive(Clone, Debug, PartialEq)]
pub struct NdBuffer {
    pub element: KernelType,
    pub shape: Vec<usize>,
    /// Bound for unordered access.
    pub writable: bool,
}

/// A device texture as seen from the host.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureValue {
    pub texel: KernelType,
    pub dims: usize,
    /// Extent per dimension, outermost first.
    pub size: Vec<usize>,
    pub writable: bool,
}

/// A call argument supplied by the host.
///
/// `Dict` is the only structured variant; every other variant binds as an
/// opaque leaf no matter how complex the value is.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Vector(ScalarType, Vec<f64>),
    /// Mutable reference to a scalar, used to read back `out` values.
    ValueRef(Box<HostValue>),
    DiffPair {
        primal: f64,
        grad: f64,
        needs_grad: bool,
    },
    Buffer(NdBuffer),
    /// Buffer with an attached gradient buffer of the same shape.
    DiffBuffer {
        buffer: NdBuffer,
        needs_grad: bool,
    },
    Texture(TextureValue),
    Dict(Vec<(String, HostValue)>),
}

/// Tag of a [`HostValue`] variant; the key marshalls are registered under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostKind {
    Int,
    Float,
    Bool,
    Vector,
    ValueRef,
    DiffPair,
    Buffer,
    DiffBuffer,
    Texture,
    Dict,
}

impl HostKind {
    pub fn name(self) -> &'static str {
        match self {
            HostKind::Int => "int",
            HostKind::Float => "float",
            HostKind::Bool => "bool",
            HostKind::Vector => "vector",
            HostKind::ValueRef => "ValueRef",
            HostKind::DiffPair => "DiffPair",
            HostKind::Buffer => "NDBuffer",
            HostKind::DiffBuffer => "NDDifferentiableBuffer",
            HostKind::Texture => "Texture",
            HostKind::Dict => "dict",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            HostKind::Int,
            HostKind::Float,
            HostKind::Bool,
            HostKind::Vector,
            HostKind::ValueRef,
            HostKind::DiffPair,
            HostKind::Buffer,
            HostKind::DiffBuffer,
            HostKind::Texture,
            HostKind::Dict,
        ]
        .into_iter()
        .find(|k| k.name() == name)
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl HostValue {
    pub fn kind(&self) -> HostKind {
        match self {
            HostValue::Int(_) => HostKind::Int,
            HostValue::Float(_) => HostKind::Float,
            HostValue::Bool(_) => HostKind::Bool,
            HostValue::Vector(..) => HostKind::Vector,
            HostValue::ValueRef(_) => HostKind::ValueRef,
            HostValue::DiffPair { .. } => HostKind::DiffPair,
            HostValue::Buffer(_) => HostKind::Buffer,
            HostValue::DiffBuffer { .. } => HostKind::DiffBuffer,
            HostValue::Texture(_) => HostKind::Texture,
            HostValue::Dict(_) => HostKind::Dict,
        }
    }

    pub fn dict<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, HostValue)>,
        S: Into<String>,
    {
        HostValue::Dict(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn buffer(element: KernelType, shape: &[usize], writable: bool) -> Self {
        HostValue::Buffer(NdBuffer {
            element,
            shape: shape.to_vec(),
            writable,
        })
    }

    pub fn diff_buffer(element: KernelType, shape: &[usize], writable: bool, needs_grad: bool) -> Self {
        HostValue::DiffBuffer {
            buffer: NdBuffer {
                element,
                shape: shape.to_vec(),
                writable,
            },
            needs_grad,
        }
    }

    pub fn texture(texel: KernelType, size: &[usize], writable: bool) -> Self {
        HostValue::Texture(TextureValue {
            texel,
            dims: size.len(),
            size: size.to_vec(),
            writable,
        })
    }

    pub fn value_ref(inner: HostValue) -> Self {
        HostValue::ValueRef(Box::new(inner))
    }

    pub fn diff_pair(primal: f64, grad: f64, needs_grad: bool) -> Self {
        HostValue::DiffPair {
            primal,
            grad,
            needs_grad,
        }
    }

    /// Kernel type of a plain scalar or vector value.
    pub fn scalar_type(&self) -> Option<KernelType> {
        match self {
            HostValue::Int(_) => Some(KernelType::scalar(ScalarType::Int)),
            HostValue::Float(_) => Some(KernelType::scalar(ScalarType::Float)),
            HostValue::Bool(_) => Some(KernelType::scalar(ScalarType::Bool)),
            HostValue::Vector(s, v) => Some(KernelType::vector(*s, v.len())),
            _ => None,
        }
    }
}
