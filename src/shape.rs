//! Axis mappings: which global dispatch axes a variable's local axes bind to.

use std::fmt;
use std::ops::Index;

/// A declared container shape. `None` entries are dimensions whose extent
/// is not known until a concrete value is bound.
pub type LooseShape = Vec<Option<usize>>;

/// Ordered list of dispatch-axis indices, most significant first.
///
/// An invalid shape means "not yet resolved". Two shapes compare equal
/// only when both validity and contents match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Option<Vec<usize>>,
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims: Some(dims) }
    }

    pub fn invalid() -> Self {
        Self { dims: None }
    }

    pub fn valid(&self) -> bool {
        self.dims.is_some()
    }

    /// Number of axes. An invalid shape has length 0.
    pub fn len(&self) -> usize {
        self.dims.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<usize> {
        self.dims.as_ref().and_then(|d| d.get(index).copied())
    }

    pub fn as_slice(&self) -> &[usize] {
        self.dims.as_deref().unwrap_or(&[])
    }

    /// Largest referenced axis, if any.
    pub fn max_axis(&self) -> Option<usize> {
        self.as_slice().iter().copied().max()
    }

    /// Concatenate two shapes. The result is invalid if either side is.
    pub fn concat(&self, other: &Shape) -> Shape {
        match (&self.dims, &other.dims) {
            (Some(a), Some(b)) => Shape::new(a.iter().chain(b.iter()).copied().collect()),
            _ => Shape::invalid(),
        }
    }

    /// Right-align `rank` local axes against the trailing axes of a
    /// `call_rank`-dimensional dispatch. Returns `None` when the variable
    /// has more axes than the dispatch.
    pub fn trailing(rank: usize, call_rank: usize) -> Option<Shape> {
        let first = call_rank.checked_sub(rank)?;
        Some(Shape::new((first..call_rank).collect()))
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &usize {
        &self.as_slice()[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            None => write!(f, "<invalid>"),
            Some(dims) => {
                let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
                if parts.len() == 1 {
                    write!(f, "({},)", parts[0])
                } else {
                    write!(f, "({})", parts.join(", "))
                }
            }
        }
    }
}
