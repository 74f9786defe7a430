//! Vectorization: explicit overrides, implicit resolution, finalize.

use std::fmt;

use tracing::{debug, trace};

use crate::context::CallContext;
use crate::diagnostic::{BindError, BindErrorKind, Result};
use crate::marshall::{HostKind, MarshallError, MarshallRegistry};
use crate::shape::Shape;
use crate::types::KernelType;

use super::{BoundCall, BoundVariable, RESULT_ARG};

/// Key of a [`Override::Fields`] entry that targets the dict itself
/// rather than one of its fields.
pub const CONTAINER_KEY: &str = "$type";

/// A caller-supplied vectorization override for one variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Override {
    /// Pin the axis mapping; the vector type is the marshall's type
    /// reduced by that many dimensions.
    Axes(Vec<usize>),
    /// Pin the vector type.
    Type(KernelType),
    /// Pin the vector type, looked up in the module layout.
    TypeName(String),
    /// Pin the vector type to the kernel type of a host type's marshall.
    HostType(HostKind),
    /// Per-field overrides for a dict argument. [`CONTAINER_KEY`] targets
    /// the dict itself.
    Fields(Vec<(String, Override)>),
}

impl Override {
    pub fn axes(axes: &[usize]) -> Self {
        Override::Axes(axes.to_vec())
    }

    pub fn fields<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Override)>,
        S: Into<String>,
    {
        Override::Fields(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Display for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Override::Axes(axes) => write!(f, "{}", Shape::new(axes.clone())),
            Override::Type(ty) => write!(f, "{}", ty),
            Override::TypeName(name) => write!(f, "{}", name),
            Override::HostType(kind) => write!(f, "host:{}", kind),
            Override::Fields(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Explicit overrides for a call, positional and by keyword.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Vectorization {
    pub args: Vec<Override>,
    pub kwargs: Vec<(String, Override)>,
}

impl Vectorization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: Override) -> Self {
        self.args.push(value);
        self
    }

    pub fn kwarg(mut self, name: &str, value: Override) -> Self {
        self.kwargs.push((name.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

fn malformed(path: &str, message: String) -> BindError {
    BindError::new(BindErrorKind::MalformedOverride, path, message)
}

// ─── Explicit Pass ─────────────────────────────────────────────────

impl BoundVariable {
    fn marshall_error(&self, e: MarshallError) -> BindError {
        BindError::new(BindErrorKind::Marshall, &self.path, e.to_string())
    }

    fn bound_type(&self) -> Result<&KernelType> {
        self.kernel.as_ref().map(|k| &k.ty).ok_or_else(|| {
            BindError::new(
                BindErrorKind::BindingLookup,
                &self.path,
                "variable is not bound to a kernel parameter".to_string(),
            )
        })
    }

    fn apply_explicit_vectorization(
        &mut self,
        ctx: &CallContext,
        registry: &MarshallRegistry,
        value: &Override,
    ) -> Result<()> {
        let fields = match (&self.children, value) {
            (Some(_), Override::Fields(fields)) => fields,
            (Some(_), other) => {
                return Err(malformed(
                    &self.path,
                    format!("dict argument cannot take override {}", other),
                )
                .with_help(format!(
                    "map its fields, or use '{}' to override the dict's type",
                    CONTAINER_KEY
                )))
            }
            (None, Override::Fields(_)) => {
                return Err(malformed(
                    &self.path,
                    "field overrides given for a value that is not a dict".to_string(),
                ))
            }
            (None, other) => return self.apply_override(ctx, registry, other),
        };

        for (key, _) in fields {
            if key != CONTAINER_KEY && self.child(key).is_none() {
                return Err(malformed(
                    &self.path,
                    format!("override names unknown field '{}'", key),
                ));
            }
        }
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if let Some((_, child_value)) = fields.iter().find(|(k, _)| *k == child.name) {
                    child.apply_explicit_vectorization(ctx, registry, child_value)?;
                }
            }
        }
        if let Some((_, container)) = fields.iter().find(|(k, _)| k == CONTAINER_KEY) {
            if let Override::Axes(_) | Override::Fields(_) = container {
                return Err(malformed(
                    &self.path,
                    format!("'{}' must name a type, got {}", CONTAINER_KEY, container),
                ));
            }
            self.apply_override(ctx, registry, container)?;
        }
        Ok(())
    }

    fn apply_override(
        &mut self,
        ctx: &CallContext,
        registry: &MarshallRegistry,
        value: &Override,
    ) -> Result<()> {
        let failed = |e: &dyn fmt::Display| {
            malformed(&self.path, format!("explicit vectorization failed: {}", e))
        };
        let vector_type = match value {
            Override::Axes(axes) => {
                let ty = self
                    .marshall
                    .reduce_type(ctx, axes.len())
                    .map_err(|e| failed(&e))?;
                self.mapping = Shape::new(axes.clone());
                ty
            }
            Override::Type(ty) => ty.clone(),
            Override::TypeName(name) => ctx
                .layout
                .find_type_by_name(name)
                .ok_or_else(|| failed(&format!("unknown type '{}'", name)))?,
            Override::HostType(kind) => registry
                .marshall_for_kind(*kind)
                .map_err(|e| failed(&e))?
                .kernel_type(),
            Override::Fields(_) => {
                return Err(malformed(
                    &self.path,
                    "field overrides cannot be nested here".to_string(),
                ))
            }
        };
        trace!(path = %self.path, ty = %vector_type, "explicit override");
        self.vector_type = Some(vector_type);
        self.explicit = Some(value.clone());
        Ok(())
    }

    // ─── Implicit Pass ─────────────────────────────────────────────

    fn apply_implicit_vectorization(&mut self, ctx: &CallContext) -> Result<()> {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.apply_implicit_vectorization(ctx)?;
            }
            let dimensionality = children
                .iter()
                .filter_map(BoundVariable::dimensionality)
                .max()
                .unwrap_or(0);
            if self.vector_type.is_none() {
                let bound = self.bound_type()?;
                let resolved = self
                    .marshall
                    .resolve_type(ctx, bound)
                    .map_err(|e| self.marshall_error(e))?;
                self.vector_type = Some(resolved);
            }
            self.dimensionality = Some(dimensionality);
            return Ok(());
        }

        if self.mapping.valid() {
            let reduced = self
                .marshall
                .reduce_type(ctx, self.mapping.len())
                .map_err(|e| self.marshall_error(e))?;
            self.vector_type = Some(reduced);
        }
        // The return slot is typed from the bound return type once every
        // other argument has been resolved.
        if self.vector_type.is_none() && self.path != RESULT_ARG {
            let bound = self.bound_type()?;
            let resolved = self
                .marshall
                .resolve_type(ctx, bound)
                .map_err(|e| self.marshall_error(e))?;
            self.vector_type = Some(resolved);
        }
        let vector_type = match &self.vector_type {
            Some(ty) => ty.clone(),
            None => self.bound_type()?.clone(),
        };

        let dimensionality = if self.mapping.valid() {
            self.mapping.max_axis().map_or(0, |axis| axis + 1)
        } else {
            self.marshall
                .resolve_dimensionality(ctx, &vector_type)
                .map_err(|e| self.marshall_error(e))?
        };
        trace!(
            path = %self.path,
            ty = %vector_type,
            dimensionality,
            "implicit vectorization"
        );
        self.vector_type = Some(vector_type);
        self.dimensionality = Some(dimensionality);
        Ok(())
    }

    // ─── Finalize ──────────────────────────────────────────────────

    fn finalize_mappings(&mut self, ctx: &CallContext) -> Result<()> {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.finalize_mappings(ctx)?;
            }
            return Ok(());
        }

        let call_rank = ctx.call_dimensionality;
        let dimensionality = self.dimensionality.ok_or_else(|| {
            BindError::new(
                BindErrorKind::Marshall,
                &self.path,
                "dimensionality has not been resolved".to_string(),
            )
        })?;

        if ctx.options.strict_broadcasting
            && !self.explicitly_vectorized()
            && dimensionality != 0
            && dimensionality != call_rank
        {
            return Err(BindError::new(
                BindErrorKind::StrictBroadcasting,
                &self.path,
                format!(
                    "'{}' has dimensionality {}, which is neither 0 nor the kernel dimensionality {}",
                    self.path, dimensionality, call_rank
                ),
            )
            .with_help("vectorize the argument explicitly or disable strict broadcasting".to_string()));
        }

        if !self.mapping.valid() {
            self.mapping = Shape::trailing(dimensionality, call_rank).ok_or_else(|| {
                BindError::new(
                    BindErrorKind::DispatchRank,
                    &self.path,
                    format!(
                        "'{}' has {} dimensions but the dispatch has only {}",
                        self.path, dimensionality, call_rank
                    ),
                )
            })?;
        }
        trace!(path = %self.path, mapping = %self.mapping, "finalized mapping");
        Ok(())
    }
}

impl BoundCall {
    /// Apply caller overrides. Arity and keyword names are checked before
    /// any variable is modified.
    pub fn apply_explicit_vectorization(
        &mut self,
        ctx: &CallContext,
        registry: &MarshallRegistry,
        overrides: &Vectorization,
    ) -> Result<()> {
        if overrides.args.len() > self.args.len() {
            return Err(BindError::call(
                BindErrorKind::OverrideArity,
                format!(
                    "{} positional overrides supplied for {} positional arguments",
                    overrides.args.len(),
                    self.args.len()
                ),
            ));
        }
        if overrides.kwargs.len() > self.kwargs.len() {
            return Err(BindError::call(
                BindErrorKind::OverrideArity,
                format!(
                    "{} keyword overrides supplied for {} keyword arguments",
                    overrides.kwargs.len(),
                    self.kwargs.len()
                ),
            ));
        }
        for (i, (name, _)) in overrides.kwargs.iter().enumerate() {
            if self.kwarg(name).is_none() {
                return Err(BindError::new(
                    BindErrorKind::OverrideArity,
                    name,
                    format!("override for unknown keyword argument '{}'", name),
                ));
            }
            if overrides.kwargs[..i].iter().any(|(n, _)| n == name) {
                return Err(BindError::new(
                    BindErrorKind::OverrideArity,
                    name,
                    format!("keyword argument '{}' overridden twice", name),
                ));
            }
        }

        debug!(
            args = overrides.args.len(),
            kwargs = overrides.kwargs.len(),
            "explicit vectorization"
        );
        for (arg, value) in self.args.iter_mut().zip(&overrides.args) {
            arg.apply_explicit_vectorization(ctx, registry, value)?;
        }
        for (name, value) in &overrides.kwargs {
            if let Some(kwarg) = self.kwargs.iter_mut().find(|v| v.name == *name) {
                kwarg.apply_explicit_vectorization(ctx, registry, value)?;
            }
        }
        Ok(())
    }

    /// Resolve vector types and dimensionalities bottom-up. Needs no
    /// global dispatch rank.
    pub fn apply_implicit_vectorization(&mut self, ctx: &CallContext) -> Result<()> {
        debug!("implicit vectorization");
        for value in self.values_mut() {
            value.apply_implicit_vectorization(ctx)?;
        }
        Ok(())
    }

    /// Assign default mappings against `ctx.call_dimensionality`,
    /// enforcing strict broadcasting when enabled.
    pub fn finalize_mappings(&mut self, ctx: &CallContext) -> Result<()> {
        debug!(call_dimensionality = ctx.call_dimensionality, "finalize mappings");
        for value in self.values_mut() {
            value.finalize_mappings(ctx)?;
        }
        Ok(())
    }
}
