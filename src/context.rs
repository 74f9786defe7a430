//! Per-call state shared by every binding pass.

use crate::access::CallMode;
use crate::config::BindOptions;
use crate::types::TypeLayout;

/// Read-only context for one call build.
///
/// `call_dimensionality` is the global dispatch rank. It is only meaningful
/// from the finalize step on; the pipeline infers it after the implicit
/// pass unless the caller pins it.
pub struct CallContext<'a> {
    pub layout: &'a dyn TypeLayout,
    pub call_mode: CallMode,
    pub options: BindOptions,
    pub call_dimensionality: usize,
}

impl<'a> CallContext<'a> {
    pub fn new(layout: &'a dyn TypeLayout, call_mode: CallMode, options: BindOptions) -> Self {
        Self {
            layout,
            call_mode,
            options,
            call_dimensionality: 0,
        }
    }

    pub fn with_call_dimensionality(mut self, call_dimensionality: usize) -> Self {
        self.call_dimensionality = call_dimensionality;
        self
    }
}
