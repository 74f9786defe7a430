//! Tree construction and kernel-side binding.

use tracing::{debug, trace};

use crate::access::Access;
use crate::diagnostic::{BindError, BindErrorKind, Result};
use crate::marshall::{HostValue, MarshallRegistry};
use crate::reflection::{KernelFunction, Modifier, ModifierSet};
use crate::shape::Shape;
use crate::types::KernelType;

use super::{BoundCall, BoundVariable, CallArgs, KernelBinding, RESULT_ARG, THIS_ARG};

impl BoundVariable {
    /// Build a node for `value`. Dicts recurse one level per key; every
    /// other value is a leaf paired with its registered marshall.
    pub fn new(
        registry: &MarshallRegistry,
        value: &HostValue,
        parent_path: Option<&str>,
        name: &str,
    ) -> Result<Self> {
        let path = match parent_path {
            Some(parent) => format!("{}.{}", parent, name),
            None => name.to_string(),
        };
        let marshall = registry
            .marshall_for_value(value)
            .map_err(|e| BindError::new(BindErrorKind::Marshall, &path, e.to_string()))?;

        let children = match value {
            HostValue::Dict(entries) => {
                let mut children: Vec<BoundVariable> = Vec::with_capacity(entries.len());
                for (key, entry) in entries {
                    if children.iter().any(|c| c.name == *key) {
                        return Err(BindError::new(
                            BindErrorKind::BindingLookup,
                            &path,
                            format!("field '{}' appears more than once", key),
                        ));
                    }
                    children.push(BoundVariable::new(registry, entry, Some(&path), key)?);
                }
                Some(children)
            }
            _ => None,
        };

        Ok(Self {
            name: name.to_string(),
            variable_name: name.to_string(),
            path,
            marshall,
            kernel: None,
            param_index: None,
            mapping: Shape::invalid(),
            vector_type: None,
            explicit: None,
            dimensionality: None,
            differentiable: false,
            access: Access::NONE,
            children,
        })
    }

    /// Bind a root variable to a kernel parameter (or the receiver/return
    /// slot). A positional root takes the parameter's name.
    fn bind_root(
        &mut self,
        name: &str,
        ty: &KernelType,
        modifiers: ModifierSet,
        param_index: Option<usize>,
    ) -> Result<()> {
        if self.name.is_empty() {
            self.name = name.to_string();
        }
        self.param_index = param_index;
        self.path = self.name.clone();
        self.variable_name = self.name.clone();
        self.bind_to(ty.clone(), modifiers)
    }

    fn bind_to(&mut self, ty: KernelType, modifiers: ModifierSet) -> Result<()> {
        trace!(path = %self.path, ty = %ty, "bind");
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                let field = ty.field(&child.name).ok_or_else(|| {
                    BindError::new(
                        BindErrorKind::BindingLookup,
                        &format!("{}.{}", self.path, child.name),
                        format!("type {} has no field '{}'", ty, child.name),
                    )
                })?;
                child.path = format!("{}.{}", self.path, child.name);
                child.variable_name = child.name.clone();
                child.bind_to(field.ty.clone(), modifiers.clone())?;
            }
        }
        self.kernel = Some(KernelBinding { ty, modifiers });
        Ok(())
    }
}

impl BoundCall {
    /// Build the unbound tree for a call's arguments.
    pub fn new(registry: &MarshallRegistry, call: &CallArgs) -> Result<Self> {
        let args = call
            .args
            .iter()
            .map(|value| BoundVariable::new(registry, value, None, ""))
            .collect::<Result<Vec<_>>>()?;
        let mut kwargs: Vec<BoundVariable> = Vec::with_capacity(call.kwargs.len());
        for (name, value) in &call.kwargs {
            if kwargs.iter().any(|v| v.name == *name) {
                return Err(BindError::new(
                    BindErrorKind::BindingLookup,
                    name,
                    format!("keyword argument '{}' supplied twice", name),
                ));
            }
            kwargs.push(BoundVariable::new(registry, value, None, name)?);
        }
        debug!(args = args.len(), kwargs = kwargs.len(), "built binding tree");
        Ok(Self {
            args,
            kwargs,
            function: None,
        })
    }

    /// Bind every variable to `function`: positional arguments in order,
    /// keywords by name, `_this` to the receiver (`inout`) and `_result`
    /// to the return type (`out`). Arity and keyword checks run before
    /// any variable is mutated; a missing struct field is reported while
    /// binding and aborts the call.
    pub fn bind(&mut self, function: &KernelFunction) -> Result<()> {
        let params = &function.params;
        if self.args.len() > params.len() {
            return Err(BindError::call(
                BindErrorKind::BindingLookup,
                format!(
                    "{} takes {} arguments but {} positional arguments were supplied",
                    function.name,
                    params.len(),
                    self.args.len()
                ),
            ));
        }

        let mut supplied = vec![false; params.len()];
        for slot in supplied.iter_mut().take(self.args.len()) {
            *slot = true;
        }
        for kwarg in &self.kwargs {
            match kwarg.name.as_str() {
                THIS_ARG if function.this_type.is_none() => {
                    return Err(BindError::new(
                        BindErrorKind::BindingLookup,
                        THIS_ARG,
                        format!("{} is not a member function", function.name),
                    ))
                }
                RESULT_ARG if function.return_type.is_none() => {
                    return Err(BindError::new(
                        BindErrorKind::BindingLookup,
                        RESULT_ARG,
                        format!("{} does not return a value", function.name),
                    ))
                }
                THIS_ARG | RESULT_ARG => {}
                name => {
                    let (index, _) = function.param(name).ok_or_else(|| {
                        BindError::new(
                            BindErrorKind::BindingLookup,
                            name,
                            format!("{} has no parameter named '{}'", function.name, name),
                        )
                    })?;
                    if supplied[index] {
                        return Err(BindError::new(
                            BindErrorKind::BindingLookup,
                            name,
                            format!("parameter '{}' supplied twice", name),
                        ));
                    }
                    supplied[index] = true;
                }
            }
        }
        if let Some(index) = supplied.iter().position(|s| !s) {
            return Err(BindError::call(
                BindErrorKind::BindingLookup,
                format!(
                    "missing argument for parameter '{}' of {}",
                    params[index].name, function.name
                ),
            ));
        }

        for (index, (arg, param)) in self.args.iter_mut().zip(params).enumerate() {
            arg.bind_root(&param.name, &param.ty, param.modifiers.clone(), Some(index))?;
        }
        for kwarg in &mut self.kwargs {
            let name = kwarg.name.clone();
            match name.as_str() {
                THIS_ARG => {
                    if let Some(ty) = &function.this_type {
                        let modifiers = ModifierSet::new().with(Modifier::InOut);
                        kwarg.bind_root(THIS_ARG, ty, modifiers, None)?;
                    }
                }
                RESULT_ARG => {
                    if let Some(ty) = &function.return_type {
                        let modifiers = ModifierSet::new().with(Modifier::Out);
                        kwarg.bind_root(RESULT_ARG, ty, modifiers, None)?;
                    }
                }
                name => {
                    if let Some((index, param)) = function.param(name) {
                        kwarg.bind_root(&param.name, &param.ty, param.modifiers.clone(), Some(index))?;
                    }
                }
            }
        }

        debug!(function = %function.name, "bound call");
        self.function = Some(function.clone());
        Ok(())
    }
}
