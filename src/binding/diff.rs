//! Differentiability and primal/derivative access.

use tracing::{debug, trace};

use crate::access::{Access, AccessType, CallMode};
use crate::context::CallContext;
use crate::diagnostic::{BindError, BindErrorKind, Result};
use crate::reflection::IoType;

use super::{BoundCall, BoundVariable};

/// Access pair for a variable of the given direction.
///
/// Forward mode ignores differentiability: only the primal slot is
/// touched. This mirrors primal evaluation and is provisional until
/// forward-mode derivatives are supported.
pub fn access_for(mode: CallMode, differentiable: bool, io: IoType) -> Access {
    use AccessType::{None, Read, ReadWrite, Write};

    match (mode, differentiable, io) {
        (CallMode::Forward, _, IoType::In) => Access::new(Read, None),
        (CallMode::Forward, _, IoType::Out) => Access::new(Write, None),
        (CallMode::Forward, _, IoType::InOut) => Access::new(ReadWrite, None),
        (CallMode::Backward, true, IoType::In) => Access::new(Read, Write),
        (CallMode::Backward, true, IoType::Out) => Access::new(None, Read),
        (CallMode::Backward, true, IoType::InOut) => Access::new(Read, ReadWrite),
        (CallMode::Backward, false, IoType::In) => Access::new(Read, None),
        (CallMode::Backward, false, IoType::Out) => Access::new(None, None),
        (CallMode::Backward, false, IoType::InOut) => Access::new(Read, None),
    }
}

impl BoundVariable {
    fn calculate_differentiability(&mut self, mode: CallMode) -> Result<()> {
        let vector_type = self.vector_type.as_ref().ok_or_else(|| {
            BindError::new(
                BindErrorKind::Marshall,
                &self.path,
                "vector type has not been resolved".to_string(),
            )
        })?;
        self.differentiable =
            !self.no_diff() && vector_type.differentiable() && self.marshall.has_derivative();
        self.access = access_for(mode, self.differentiable, self.io_type());
        trace!(
            path = %self.path,
            differentiable = self.differentiable,
            access = %self.access,
            "differentiability"
        );

        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.calculate_differentiability(mode)?;
            }
        }
        Ok(())
    }
}

impl BoundCall {
    pub fn calculate_differentiability(&mut self, ctx: &CallContext) -> Result<()> {
        debug!(mode = %ctx.call_mode, "differentiability");
        for value in self.values_mut() {
            value.calculate_differentiability(ctx.call_mode)?;
        }
        Ok(())
    }
}
