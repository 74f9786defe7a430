//! Access permissions and call modes.

use std::fmt;

/// How generated code touches one slot (primal or derivative) of a variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AccessType {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl AccessType {
    pub fn writes(self) -> bool {
        matches!(self, AccessType::Write | AccessType::ReadWrite)
    }

    pub fn reads(self) -> bool {
        matches!(self, AccessType::Read | AccessType::ReadWrite)
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessType::None => write!(f, "none"),
            AccessType::Read => write!(f, "read"),
            AccessType::Write => write!(f, "write"),
            AccessType::ReadWrite => write!(f, "readwrite"),
        }
    }
}

/// Primal/derivative access pair, indexed by [`PrimType`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Access {
    pub primal: AccessType,
    pub derivative: AccessType,
}

impl Access {
    pub const NONE: Access = Access::new(AccessType::None, AccessType::None);

    pub const fn new(primal: AccessType, derivative: AccessType) -> Self {
        Self { primal, derivative }
    }

    pub fn get(&self, prim: PrimType) -> AccessType {
        match prim {
            PrimType::Primal => self.primal,
            PrimType::Derivative => self.derivative,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.primal, self.derivative)
    }
}

/// The two slots a differentiable variable carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimType {
    Primal,
    Derivative,
}

impl PrimType {
    pub const ALL: [PrimType; 2] = [PrimType::Primal, PrimType::Derivative];

    /// Slot name used in generated accessor names (`load_primal`, ...).
    pub fn name(self) -> &'static str {
        match self {
            PrimType::Primal => "primal",
            PrimType::Derivative => "derivative",
        }
    }
}

/// Which evaluation a call performs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallMode {
    /// Primal evaluation.
    #[default]
    Forward,
    /// Backwards-mode gradient propagation.
    Backward,
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallMode::Forward => write!(f, "forward"),
            CallMode::Backward => write!(f, "backward"),
        }
    }
}
