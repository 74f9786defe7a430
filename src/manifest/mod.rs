//! Call files: a kernel function, its struct types, host arguments and
//! vectorization overrides described in TOML.
//!
//! ```toml
//! args = [1.0, { kind = "buffer", element = "float", shape = [4] }]
//!
//! [function]
//! name = "add"
//! return = "float"
//! differentiable = true
//!
//! [[function.params]]
//! name = "a"
//! type = "float"
//!
//! [[function.params]]
//! name = "b"
//! type = "float"
//!
//! [kwargs]
//! _result = { kind = "value_ref", value = 0.0 }
//! ```
//!
//! Keyword arguments and dict values are tables, so they bind in key order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::binding::{CallArgs, Override, Vectorization};
use crate::config::BindOptions;
use crate::marshall::{HostKind, HostValue};
use crate::reflection::{KernelFunction, KernelParam, Modifier};
use crate::types::{KernelField, KernelType, ModuleLayout, ScalarType, TypeLayout};

#[cfg(test)]
mod tests;

/// Prefix of an override string naming a host type instead of a kernel type.
pub const HOST_TYPE_PREFIX: &str = "host:";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid call file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("unknown scalar type '{0}'")]
    UnknownScalar(String),

    #[error("unknown modifier '{modifier}' on parameter '{param}'")]
    UnknownModifier { param: String, modifier: String },

    #[error("unknown host type '{0}'")]
    UnknownHostType(String),
}

pub type Result<T> = std::result::Result<T, ManifestError>;

// ─── File Model ────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallManifest {
    pub function: FunctionSpec,
    #[serde(default)]
    pub types: Vec<StructSpec>,
    #[serde(default)]
    pub args: Vec<ValueSpec>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, ValueSpec>,
    #[serde(default)]
    pub vectorize: VectorizeSpec,
    pub options: Option<BindOptions>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(rename = "return")]
    pub return_type: Option<String>,
    /// Receiver type for member functions.
    pub this: Option<String>,
    #[serde(default)]
    pub differentiable: bool,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructSpec {
    pub name: String,
    #[serde(default)]
    pub differentiable: bool,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorizeSpec {
    #[serde(default)]
    pub args: Vec<OverrideSpec>,
    #[serde(default)]
    pub kwargs: BTreeMap<String, OverrideSpec>,
}

/// An override as written in a call file: an axis list, a type name
/// (`host:` selects a host type) or a table of field overrides.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OverrideSpec {
    Axes(Vec<usize>),
    Name(String),
    Fields(BTreeMap<String, OverrideSpec>),
}

/// A host value as written in a call file. Plain numbers and lists are
/// scalars and float vectors; tables with a `kind` key are resources;
/// any other table is a dict.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<f64>),
    Tagged(TaggedValue),
    Dict(BTreeMap<String, ValueSpec>),
}

fn default_true() -> bool {
    true
}

fn default_scalar() -> String {
    "float".to_string()
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaggedValue {
    Vector {
        #[serde(default = "default_scalar")]
        scalar: String,
        values: Vec<f64>,
    },
    ValueRef {
        value: Box<ValueSpec>,
    },
    DiffPair {
        primal: f64,
        #[serde(default)]
        grad: f64,
        #[serde(default = "default_true")]
        needs_grad: bool,
    },
    /// An nd-buffer; `grad` attaches gradient storage and says whether
    /// gradients are requested.
    Buffer {
        element: String,
        shape: Vec<usize>,
        #[serde(default)]
        writable: bool,
        grad: Option<bool>,
    },
    Texture {
        texel: String,
        size: Vec<usize>,
        #[serde(default)]
        writable: bool,
    },
}

// ─── Conversion ────────────────────────────────────────────────────

fn lookup(layout: &dyn TypeLayout, name: &str) -> Result<KernelType> {
    layout
        .find_type_by_name(name)
        .ok_or_else(|| ManifestError::UnknownType(name.to_string()))
}

impl ValueSpec {
    pub fn to_host_value(&self, layout: &dyn TypeLayout) -> Result<HostValue> {
        Ok(match self {
            ValueSpec::Bool(v) => HostValue::Bool(*v),
            ValueSpec::Int(v) => HostValue::Int(*v),
            ValueSpec::Float(v) => HostValue::Float(*v),
            ValueSpec::List(values) => HostValue::Vector(ScalarType::Float, values.clone()),
            ValueSpec::Dict(entries) => HostValue::Dict(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_host_value(layout)?)))
                    .collect::<Result<_>>()?,
            ),
            ValueSpec::Tagged(tagged) => tagged.to_host_value(layout)?,
        })
    }
}

impl TaggedValue {
    fn to_host_value(&self, layout: &dyn TypeLayout) -> Result<HostValue> {
        Ok(match self {
            TaggedValue::Vector { scalar, values } => {
                let scalar = ScalarType::from_name(scalar)
                    .ok_or_else(|| ManifestError::UnknownScalar(scalar.clone()))?;
                HostValue::Vector(scalar, values.clone())
            }
            TaggedValue::ValueRef { value } => HostValue::value_ref(value.to_host_value(layout)?),
            TaggedValue::DiffPair {
                primal,
                grad,
                needs_grad,
            } => HostValue::diff_pair(*primal, *grad, *needs_grad),
            TaggedValue::Buffer {
                element,
                shape,
                writable,
                grad,
            } => {
                let element = lookup(layout, element)?;
                match grad {
                    Some(needs_grad) => {
                        HostValue::diff_buffer(element, shape, *writable, *needs_grad)
                    }
                    None => HostValue::buffer(element, shape, *writable),
                }
            }
            TaggedValue::Texture {
                texel,
                size,
                writable,
            } => HostValue::texture(lookup(layout, texel)?, size, *writable),
        })
    }
}

impl OverrideSpec {
    pub fn to_override(&self) -> Result<Override> {
        Ok(match self {
            OverrideSpec::Axes(axes) => Override::Axes(axes.clone()),
            OverrideSpec::Name(name) => match name.strip_prefix(HOST_TYPE_PREFIX) {
                Some(host) => Override::HostType(
                    HostKind::from_name(host)
                        .ok_or_else(|| ManifestError::UnknownHostType(host.to_string()))?,
                ),
                None => Override::TypeName(name.clone()),
            },
            OverrideSpec::Fields(fields) => Override::Fields(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_override()?)))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

// ─── Manifest ──────────────────────────────────────────────────────

impl CallManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Type layout with every declared struct registered. Structs may use
    /// structs declared before them.
    pub fn layout(&self) -> Result<ModuleLayout> {
        let mut layout = ModuleLayout::new();
        for decl in &self.types {
            let fields = decl
                .fields
                .iter()
                .map(|f| Ok(KernelField::new(&f.name, lookup(&layout, &f.ty)?)))
                .collect::<Result<Vec<_>>>()?;
            layout.register(KernelType::structure(&decl.name, fields, decl.differentiable));
        }
        Ok(layout)
    }

    pub fn function(&self, layout: &dyn TypeLayout) -> Result<KernelFunction> {
        let spec = &self.function;
        let mut function = KernelFunction::new(&spec.name).differentiable(spec.differentiable);
        for param in &spec.params {
            let mut kernel_param = KernelParam::new(&param.name, lookup(layout, &param.ty)?);
            for modifier in &param.modifiers {
                let modifier =
                    Modifier::from_name(modifier).ok_or_else(|| ManifestError::UnknownModifier {
                        param: param.name.clone(),
                        modifier: modifier.clone(),
                    })?;
                kernel_param = kernel_param.with_modifier(modifier);
            }
            function = function.with_param(kernel_param);
        }
        if let Some(ty) = &spec.return_type {
            function = function.returning(lookup(layout, ty)?);
        }
        if let Some(ty) = &spec.this {
            function = function.member_of(lookup(layout, ty)?);
        }
        Ok(function)
    }

    pub fn call_args(&self, layout: &dyn TypeLayout) -> Result<CallArgs> {
        let mut call = CallArgs::new();
        for value in &self.args {
            call = call.arg(value.to_host_value(layout)?);
        }
        for (name, value) in &self.kwargs {
            call = call.kwarg(name, value.to_host_value(layout)?);
        }
        Ok(call)
    }

    pub fn vectorization(&self) -> Result<Vectorization> {
        let mut vectorization = Vectorization::new();
        for value in &self.vectorize.args {
            vectorization = vectorization.arg(value.to_override()?);
        }
        for (name, value) in &self.vectorize.kwargs {
            vectorization = vectorization.kwarg(name, value.to_override()?);
        }
        Ok(vectorization)
    }
}
