//! Kernel function reflection: parameters, modifiers and directions.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::KernelType;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    In,
    Out,
    InOut,
    NoDiff,
}

impl Modifier {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "in" => Some(Modifier::In),
            "out" => Some(Modifier::Out),
            "inout" => Some(Modifier::InOut),
            "no_diff" | "nodiff" => Some(Modifier::NoDiff),
            _ => None,
        }
    }
}

/// Direction of a kernel parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoType {
    In,
    Out,
    InOut,
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoType::In => write!(f, "in"),
            IoType::Out => write!(f, "out"),
            IoType::InOut => write!(f, "inout"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModifierSet(BTreeSet<Modifier>);

impl ModifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, modifier: Modifier) -> Self {
        self.0.insert(modifier);
        self
    }

    pub fn contains(&self, modifier: Modifier) -> bool {
        self.0.contains(&modifier)
    }

    pub fn union(&self, other: &ModifierSet) -> ModifierSet {
        ModifierSet(self.0.union(&other.0).copied().collect())
    }

    pub fn no_diff(&self) -> bool {
        self.contains(Modifier::NoDiff)
    }

    /// `in`+`out` or bare `inout` is InOut, bare `out` is Out, anything
    /// else reads.
    pub fn io_type(&self) -> IoType {
        let have_in = self.contains(Modifier::In);
        let have_out = self.contains(Modifier::Out);
        let have_inout = self.contains(Modifier::InOut);
        if (have_in && have_out) || have_inout {
            IoType::InOut
        } else if have_out {
            IoType::Out
        } else {
            IoType::In
        }
    }
}

impl FromIterator<Modifier> for ModifierSet {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        ModifierSet(iter.into_iter().collect())
    }
}

/// A formal parameter of a kernel function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelParam {
    pub name: String,
    pub ty: KernelType,
    pub modifiers: ModifierSet,
}

impl KernelParam {
    pub fn new(name: &str, ty: KernelType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            modifiers: ModifierSet::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers = self.modifiers.with(modifier);
        self
    }
}

/// One resolved overload of a kernel function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KernelFunction {
    pub name: String,
    pub params: Vec<KernelParam>,
    pub return_type: Option<KernelType>,
    /// Receiver type for member functions.
    pub this_type: Option<KernelType>,
    pub differentiable: bool,
}

impl KernelFunction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            return_type: None,
            this_type: None,
            differentiable: false,
        }
    }

    pub fn with_param(mut self, param: KernelParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn returning(mut self, ty: KernelType) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn member_of(mut self, ty: KernelType) -> Self {
        self.this_type = Some(ty);
        self
    }

    pub fn differentiable(mut self, differentiable: bool) -> Self {
        self.differentiable = differentiable;
        self
    }

    pub fn param(&self, name: &str) -> Option<(usize, &KernelParam)> {
        self.params.iter().enumerate().find(|(_, p)| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_type_from_modifiers() {
        let set = |mods: &[Modifier]| mods.iter().copied().collect::<ModifierSet>();
        assert_eq!(set(&[]).io_type(), IoType::In);
        assert_eq!(set(&[Modifier::In]).io_type(), IoType::In);
        assert_eq!(set(&[Modifier::Out]).io_type(), IoType::Out);
        assert_eq!(set(&[Modifier::InOut]).io_type(), IoType::InOut);
        assert_eq!(set(&[Modifier::In, Modifier::Out]).io_type(), IoType::InOut);
        assert_eq!(
            set(&[Modifier::NoDiff, Modifier::Out]).io_type(),
            IoType::Out
        );
    }

    #[test]
    fn test_modifier_union() {
        let a = ModifierSet::new().with(Modifier::Out);
        let b = ModifierSet::new().with(Modifier::NoDiff);
        let u = a.union(&b);
        assert!(u.contains(Modifier::Out));
        assert!(u.no_diff());
        assert!(!a.no_diff());
    }

    #[test]
    fn test_modifier_names() {
        assert_eq!(Modifier::from_name("inout"), Some(Modifier::InOut));
        assert_eq!(Modifier::from_name("no_diff"), Some(Modifier::NoDiff));
        assert_eq!(Modifier::from_name("const"), None);
    }
}
