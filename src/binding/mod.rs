//! The binding tree: host arguments paired with kernel parameters.
//!
//! A call is built in sequential passes over one [`BoundCall`]:
//!
//!   1. **tree**: mirror the argument structure, one marshall per leaf,
//!      then attach kernel parameter types and modifiers (`bind`).
//!   2. **vectorize**: explicit overrides top-down, implicit type and
//!      dimensionality resolution bottom-up, then default axis mappings
//!      against the global dispatch rank (`finalize_mappings`).
//!   3. **diff**: differentiability and primal/derivative access.
//!   4. **calldata**: call-data structs, mapping constants, trampoline.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::access::Access;
use crate::marshall::{HostValue, Marshall};
use crate::reflection::{IoType, KernelFunction, ModifierSet};
use crate::shape::Shape;
use crate::types::KernelType;

mod calldata;
mod diff;
mod tree;
mod vectorize;

pub use diff::access_for;
pub use vectorize::{Override, Vectorization, CONTAINER_KEY};

/// Keyword reserved for the receiver of a member function.
pub const THIS_ARG: &str = "_this";
/// Keyword reserved for the return slot.
pub const RESULT_ARG: &str = "_result";

/// Host-side arguments of one call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<HostValue>,
    pub kwargs: Vec<(String, HostValue)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: HostValue) -> Self {
        self.args.push(value);
        self
    }

    pub fn kwarg(mut self, name: &str, value: HostValue) -> Self {
        self.kwargs.push((name.to_string(), value));
        self
    }
}

/// Kernel-side target of a bound variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelBinding {
    pub ty: KernelType,
    pub modifiers: ModifierSet,
}

// ─── Bound Variable ────────────────────────────────────────────────

/// A node of the binding tree.
///
/// Children exist only for dict arguments and never change after
/// construction; the resolution passes mutate mapping, vector type,
/// differentiability and access in place.
#[derive(Clone, Debug)]
pub struct BoundVariable {
    name: String,
    path: String,
    variable_name: String,
    marshall: Arc<dyn Marshall>,
    kernel: Option<KernelBinding>,
    param_index: Option<usize>,
    mapping: Shape,
    vector_type: Option<KernelType>,
    explicit: Option<Override>,
    dimensionality: Option<usize>,
    differentiable: bool,
    access: Access,
    children: Option<Vec<BoundVariable>>,
}

impl BoundVariable {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dot-joined names from the root, unique within a call.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Identifier used in generated code: `_t_<variable_name>` for the
    /// call-data type and `_m_<variable_name>` for the axis mapping.
    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn marshall(&self) -> &dyn Marshall {
        self.marshall.as_ref()
    }

    pub fn kernel_binding(&self) -> Option<&KernelBinding> {
        self.kernel.as_ref()
    }

    /// Index of the kernel parameter a root variable binds to.
    pub fn param_index(&self) -> Option<usize> {
        self.param_index
    }

    pub fn mapping(&self) -> &Shape {
        &self.mapping
    }

    pub fn vector_type(&self) -> Option<&KernelType> {
        self.vector_type.as_ref()
    }

    /// The override applied to this node by the explicit pass.
    pub fn explicit_override(&self) -> Option<&Override> {
        self.explicit.as_ref()
    }

    pub fn explicitly_vectorized(&self) -> bool {
        self.explicit.is_some()
    }

    /// Dispatch dimensions this variable consumes. Set by the implicit pass.
    pub fn dimensionality(&self) -> Option<usize> {
        self.dimensionality
    }

    pub fn differentiable(&self) -> bool {
        self.differentiable
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn children(&self) -> Option<&[BoundVariable]> {
        self.children.as_deref()
    }

    pub fn child(&self, name: &str) -> Option<&BoundVariable> {
        self.children()?.iter().find(|c| c.name == name)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Direction from the bound modifiers. Unbound variables read.
    pub fn io_type(&self) -> IoType {
        self.kernel
            .as_ref()
            .map_or(IoType::In, |k| k.modifiers.io_type())
    }

    pub fn no_diff(&self) -> bool {
        self.kernel.as_ref().is_some_and(|k| k.modifiers.no_diff())
    }

    /// Append this variable and its descendants' leaves, depth first.
    pub fn input_list<'a>(&'a self, out: &mut Vec<&'a BoundVariable>) {
        match &self.children {
            Some(children) => {
                for child in children {
                    child.input_list(out);
                }
            }
            None => out.push(self),
        }
    }

    fn write_signature(&self, out: &mut String) {
        let _ = write!(out, "{}:{}", self.path, self.marshall.type_name());
        if let Some(explicit) = &self.explicit {
            let _ = write!(out, "={}", explicit);
        }
        if let Some(children) = &self.children {
            out.push('{');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                child.write_signature(out);
            }
            out.push('}');
        }
    }

    fn write_description(&self, out: &mut String, depth: usize) {
        let _ = write!(
            out,
            "{}{}: {}",
            "  ".repeat(depth),
            self.path,
            self.marshall.type_name()
        );
        if let Some(ty) = &self.vector_type {
            let _ = write!(out, " -> {}", ty);
        }
        if self.mapping.valid() {
            let _ = write!(out, " {}", self.mapping);
        }
        if self.differentiable {
            out.push_str(" diff");
        }
        if self.access != Access::NONE {
            let _ = write!(out, " {}", self.access);
        }
        out.push('\n');
        if let Some(children) = &self.children {
            for child in children {
                child.write_description(out, depth + 1);
            }
        }
    }
}

// ─── Bound Call ────────────────────────────────────────────────────

/// Root of a binding tree: positional and keyword variables.
#[derive(Clone, Debug)]
pub struct BoundCall {
    args: Vec<BoundVariable>,
    kwargs: Vec<BoundVariable>,
    function: Option<KernelFunction>,
}

impl BoundCall {
    pub fn args(&self) -> &[BoundVariable] {
        &self.args
    }

    pub fn kwargs(&self) -> &[BoundVariable] {
        &self.kwargs
    }

    pub fn kwarg(&self, name: &str) -> Option<&BoundVariable> {
        self.kwargs.iter().find(|v| v.name == name)
    }

    /// The kernel function this call is bound to.
    pub fn function(&self) -> Option<&KernelFunction> {
        self.function.as_ref()
    }

    pub fn differentiable(&self) -> bool {
        self.function.as_ref().is_some_and(|f| f.differentiable)
    }

    /// Positional and keyword variables, positional first.
    pub fn values(&self) -> impl Iterator<Item = &BoundVariable> {
        self.args.iter().chain(self.kwargs.iter())
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut BoundVariable> {
        self.args.iter_mut().chain(self.kwargs.iter_mut())
    }

    /// User-supplied arguments, excluding `_this` and `_result`.
    pub fn num_function_args(&self) -> usize {
        self.args.len() + self.num_function_kwargs()
    }

    pub fn num_function_kwargs(&self) -> usize {
        self.kwargs
            .iter()
            .filter(|v| v.name != THIS_ARG && v.name != RESULT_ARG)
            .count()
    }

    pub fn has_implicit_args(&self) -> bool {
        self.args.iter().any(|v| v.vector_type.is_none())
    }

    pub fn has_implicit_mappings(&self) -> bool {
        self.args.iter().any(|v| !v.mapping.valid())
    }

    /// Every leaf variable in call order.
    pub fn input_list(&self) -> Vec<&BoundVariable> {
        let mut out = Vec::new();
        for value in self.values() {
            value.input_list(&mut out);
        }
        out
    }

    /// Global dispatch rank implied by the implicit pass: the largest
    /// dimensionality of any top-level variable.
    pub fn call_dimensionality(&self) -> usize {
        self.values()
            .filter_map(BoundVariable::dimensionality)
            .max()
            .unwrap_or(0)
    }

    /// Stable key for caching a specialization of this call: paths,
    /// marshall types and explicit overrides, nothing resolved later.
    pub fn signature(&self) -> String {
        let mut out = String::new();
        if let Some(function) = &self.function {
            out.push_str(&function.name);
        }
        out.push('(');
        for (i, value) in self.values().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            value.write_signature(&mut out);
        }
        out.push(')');
        out
    }

    pub fn signature_hash(&self) -> String {
        blake3::hash(self.signature().as_bytes()).to_hex().to_string()
    }

    /// One line per variable: path, host type, vector type, mapping,
    /// differentiability and access. Used as the source text of error
    /// reports.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(function) = &self.function {
            let _ = writeln!(out, "{}", function.name);
        }
        for value in self.values() {
            value.write_description(&mut out, 1);
        }
        out
    }
}
