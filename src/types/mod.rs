//! Kernel-side type model and the type-layout lookup used by overrides.
//!
//! Only the parts of the kernel type system that binding needs are modelled:
//! names, dimensional shape, differentiability and struct fields. The kernel
//! compiler owns everything else.

use std::collections::{HashMap, HashSet};
use std::fmt;

#[cfg(test)]
mod tests;

// ─── Scalars ───────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Half,
    Float,
    Double,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Half => "half",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(ScalarType::Bool),
            "int" => Some(ScalarType::Int),
            "uint" => Some(ScalarType::UInt),
            "half" => Some(ScalarType::Half),
            "float" => Some(ScalarType::Float),
            "double" => Some(ScalarType::Double),
            _ => None,
        }
    }

    pub fn is_floating(self) -> bool {
        matches!(self, ScalarType::Half | ScalarType::Float | ScalarType::Double)
    }
}

// ─── Kernel Types ──────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelField {
    pub name: String,
    pub ty: KernelType,
}

impl KernelField {
    pub fn new(name: &str, ty: KernelType) -> Self {
        Self {
            name: name.to_string(),
            ty,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Scalar(ScalarType),
    Vector(ScalarType, usize),
    Matrix(ScalarType, usize, usize),
    Array(Box<KernelType>, usize),
    Struct {
        fields: Vec<KernelField>,
        differentiable: bool,
    },
    NdBuffer {
        element: Box<KernelType>,
        dims: usize,
        writable: bool,
    },
    Texture {
        element: Box<KernelType>,
        dims: usize,
        writable: bool,
    },
    /// A generic parameter constrained by an interface. Accepts whatever
    /// concrete type the bound marshall naturally provides.
    Interface,
}

/// A resolved kernel-side type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelType {
    name: String,
    kind: TypeKind,
}

impl KernelType {
    pub fn scalar(scalar: ScalarType) -> Self {
        Self {
            name: scalar.name().to_string(),
            kind: TypeKind::Scalar(scalar),
        }
    }

    pub fn vector(scalar: ScalarType, len: usize) -> Self {
        Self {
            name: format!("{}{}", scalar.name(), len),
            kind: TypeKind::Vector(scalar, len),
        }
    }

    pub fn matrix(scalar: ScalarType, rows: usize, cols: usize) -> Self {
        Self {
            name: format!("{}{}x{}", scalar.name(), rows, cols),
            kind: TypeKind::Matrix(scalar, rows, cols),
        }
    }

    pub fn array(element: KernelType, len: usize) -> Self {
        Self {
            name: format!("{}[{}]", element.name, len),
            kind: TypeKind::Array(Box::new(element), len),
        }
    }

    pub fn structure(name: &str, fields: Vec<KernelField>, differentiable: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: TypeKind::Struct {
                fields,
                differentiable,
            },
        }
    }

    pub fn nd_buffer(element: KernelType, dims: usize, writable: bool) -> Self {
        let prefix = if writable { "RW" } else { "" };
        Self {
            name: format!("{}NDBuffer<{},{}>", prefix, element.name, dims),
            kind: TypeKind::NdBuffer {
                element: Box::new(element),
                dims,
                writable,
            },
        }
    }

    pub fn texture(element: KernelType, dims: usize, writable: bool) -> Self {
        let prefix = if writable { "RW" } else { "" };
        Self {
            name: format!("{}Texture{}D<{}>", prefix, dims, element.name),
            kind: TypeKind::Texture {
                element: Box::new(element),
                dims,
                writable,
            },
        }
    }

    pub fn interface(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: TypeKind::Interface,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.name
    }

    /// Name of the type's derivative counterpart.
    pub fn differential_name(&self) -> String {
        format!("{}.Differential", self.name)
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }

    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    /// Resource types are opaque: they expose no element dimensions.
    pub fn is_resource(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::NdBuffer { .. } | TypeKind::Texture { .. }
        )
    }

    pub fn differentiable(&self) -> bool {
        match &self.kind {
            TypeKind::Scalar(s) | TypeKind::Vector(s, _) | TypeKind::Matrix(s, _, _) => {
                s.is_floating()
            }
            TypeKind::Array(element, _) => element.differentiable(),
            TypeKind::Struct { differentiable, .. } => *differentiable,
            TypeKind::NdBuffer { element, .. } | TypeKind::Texture { element, .. } => {
                element.differentiable()
            }
            TypeKind::Interface => false,
        }
    }

    /// Dimensional shape of a value of this type.
    pub fn shape(&self) -> Vec<usize> {
        match &self.kind {
            TypeKind::Vector(_, n) => vec![*n],
            TypeKind::Matrix(_, r, c) => vec![*r, *c],
            TypeKind::Array(element, n) => {
                let mut shape = vec![*n];
                shape.extend(element.shape());
                shape
            }
            _ => Vec::new(),
        }
    }

    /// Strip `count` leading dimensions: `float3x4` reduced by one is
    /// `float4`, by two is `float`.
    pub fn reduce(&self, count: usize) -> Option<KernelType> {
        if count == 0 {
            return Some(self.clone());
        }
        match &self.kind {
            TypeKind::Vector(s, _) if count == 1 => Some(KernelType::scalar(*s)),
            TypeKind::Matrix(s, _, c) => match count {
                1 => Some(KernelType::vector(*s, *c)),
                2 => Some(KernelType::scalar(*s)),
                _ => None,
            },
            TypeKind::Array(element, _) => element.reduce(count - 1),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[KernelField] {
        match &self.kind {
            TypeKind::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&KernelField> {
        self.fields().iter().find(|f| f.name == name)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ─── Layout Lookup ─────────────────────────────────────────────────

/// Resolves type names against a compiled kernel module.
pub trait TypeLayout {
    fn find_type_by_name(&self, name: &str) -> Option<KernelType>;
}

/// In-memory type layout: builtin scalar/vector/matrix/resource names plus
/// registered structs and interfaces.
#[derive(Clone, Debug, Default)]
pub struct ModuleLayout {
    structs: HashMap<String, KernelType>,
    interfaces: HashSet<String>,
}

impl ModuleLayout {
    pub fn new() -> Self {
        let mut layout = Self::default();
        layout.register_interface("IDifferentiable");
        layout
    }

    pub fn register(&mut self, ty: KernelType) {
        self.structs.insert(ty.full_name().to_string(), ty);
    }

    pub fn register_interface(&mut self, name: &str) {
        self.interfaces.insert(name.to_string());
    }

    fn parse(&self, name: &str) -> Option<KernelType> {
        let name = name.trim();
        if let Some(ty) = self.structs.get(name) {
            return Some(ty.clone());
        }
        if self.interfaces.contains(name) {
            return Some(KernelType::interface(name));
        }
        if let Some(stripped) = name.strip_suffix(']') {
            let (element, len) = stripped.rsplit_once('[')?;
            let len = len.trim().parse().ok()?;
            return Some(KernelType::array(self.parse(element)?, len));
        }
        if let Some((base, args)) = parse_generic_signature(name) {
            return self.parse_generic(base, &args);
        }
        parse_numeric_type(name)
    }

    fn parse_generic(&self, base: &str, args: &[&str]) -> Option<KernelType> {
        let (writable, base) = match base.strip_prefix("RW") {
            Some(rest) => (true, rest),
            None => (false, base),
        };
        if base == "NDBuffer" {
            let [element, dims] = args else {
                return None;
            };
            return Some(KernelType::nd_buffer(
                self.parse(element)?,
                dims.trim().parse().ok()?,
                writable,
            ));
        }
        let dims = base.strip_prefix("Texture")?.strip_suffix('D')?;
        let [element] = args else {
            return None;
        };
        Some(KernelType::texture(
            self.parse(element)?,
            dims.parse().ok()?,
            writable,
        ))
    }
}

impl TypeLayout for ModuleLayout {
    fn find_type_by_name(&self, name: &str) -> Option<KernelType> {
        self.parse(name)
    }
}

/// Parse `float`, `float3` or `float3x4` style names.
fn parse_numeric_type(name: &str) -> Option<KernelType> {
    if let Some(scalar) = ScalarType::from_name(name) {
        return Some(KernelType::scalar(scalar));
    }
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let scalar = ScalarType::from_name(&name[..split])?;
    let dims = &name[split..];
    match dims.split_once('x') {
        Some((rows, cols)) => {
            let rows = parse_component_count(rows)?;
            let cols = parse_component_count(cols)?;
            Some(KernelType::matrix(scalar, rows, cols))
        }
        None => Some(KernelType::vector(scalar, parse_component_count(dims)?)),
    }
}

fn parse_component_count(text: &str) -> Option<usize> {
    let n: usize = text.parse().ok()?;
    (1..=4).contains(&n).then_some(n)
}

/// Split `Name<A,B<C>>` into `("Name", ["A", "B<C>"])`, respecting nesting.
pub fn parse_generic_signature(name: &str) -> Option<(&str, Vec<&str>)> {
    let open = name.find('<')?;
    let inner = name.strip_suffix('>')?.get(open + 1..)?;
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(inner[start..].trim());
    Some((&name[..open], args))
}
