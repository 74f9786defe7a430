//! Call-data code generation.
//!
//! Each top-level variable becomes a field `_t_<name> <name>` of
//! `CallData`. Leaves delegate their `_t_` type to the marshall; dicts
//! become structs whose `load_`/`store_` accessors forward field by field
//! to the children. Every variable also gets an `_m_<name>` constant
//! listing the dispatch axes it reads.

use tracing::debug;

use crate::access::{AccessType, PrimType};
use crate::codegen::{CodeGen, CodeGenBlock};
use crate::context::CallContext;
use crate::diagnostic::{BindError, BindErrorKind, Result};
use crate::reflection::IoType;
use crate::types::KernelType;

use super::{BoundCall, BoundVariable, RESULT_ARG, THIS_ARG};

fn emit_mapping_constant(cgb: &mut CodeGenBlock, variable_name: &str, axes: &[usize]) {
    if axes.is_empty() {
        cgb.append_statement(&format!("static const int _m_{} = 0", variable_name));
    } else {
        let list: Vec<String> = axes.iter().map(ToString::to_string).collect();
        cgb.append_statement(&format!(
            "static const int[] _m_{} = {{ {} }}",
            variable_name,
            list.join(",")
        ));
    }
}

fn slot_type_name(ty: &KernelType, prim: PrimType) -> String {
    match prim {
        PrimType::Primal => ty.full_name().to_string(),
        PrimType::Derivative => ty.differential_name(),
    }
}

impl BoundVariable {
    fn resolved_type(&self) -> Result<&KernelType> {
        self.vector_type.as_ref().ok_or_else(|| {
            BindError::new(
                BindErrorKind::Marshall,
                &self.path,
                "vector type has not been resolved".to_string(),
            )
        })
    }

    /// Emit this variable's call-data type and mapping constant. `depth`
    /// is 0 for top-level variables, which are also declared in
    /// `CallData`.
    pub fn gen_call_data_code(
        &self,
        cg: &mut CodeGen,
        ctx: &CallContext,
        depth: usize,
    ) -> Result<()> {
        match &self.children {
            Some(children) => {
                let vector_type = self.resolved_type()?;
                cg.call_data_structs
                    .begin_struct(&format!("_t_{}", self.variable_name));

                for child in children {
                    child.gen_call_data_code(cg, ctx, depth + 1)?;
                }
                for child in children {
                    cg.call_data_structs
                        .declare(&format!("_t_{}", child.variable_name), &child.variable_name);
                }

                for prim in PrimType::ALL {
                    if self.access.get(prim) == AccessType::None {
                        continue;
                    }
                    self.emit_accessors(&mut cg.call_data_structs, children, vector_type, prim)?;
                }
                cg.call_data_structs.end_struct();

                let full_map: Vec<usize> = (0..ctx.call_dimensionality).collect();
                emit_mapping_constant(&mut cg.call_data_structs, &self.variable_name, &full_map);
            }
            None => {
                if self.access.primal.writes() && !self.marshall.is_writable() && depth == 0 {
                    return Err(BindError::new(
                        BindErrorKind::NonWritableWrite,
                        &self.path,
                        format!(
                            "cannot write back to '{}': {} is not writable",
                            self.path,
                            self.marshall.type_name()
                        ),
                    )
                    .with_help("pass a writable value such as a ValueRef or RW buffer".to_string()));
                }
                self.marshall
                    .gen_calldata(&mut cg.call_data_structs, ctx, self)
                    .map_err(|e| BindError::new(BindErrorKind::Marshall, &self.path, e.to_string()))?;
                emit_mapping_constant(
                    &mut cg.call_data_structs,
                    &self.variable_name,
                    self.mapping.as_slice(),
                );
            }
        }

        if depth == 0 {
            cg.call_data
                .declare(&format!("_t_{}", self.variable_name), &self.variable_name);
        }
        Ok(())
    }

    fn emit_accessors(
        &self,
        cgb: &mut CodeGenBlock,
        children: &[BoundVariable],
        vector_type: &KernelType,
        prim: PrimType,
    ) -> Result<()> {
        let slot = prim.name();
        let target = slot_type_name(vector_type, prim);

        cgb.empty_line();
        cgb.empty_line();
        cgb.append_line(&format!(
            "void load_{}(IContext context, out {} value)",
            slot, target
        ));
        cgb.begin_block();
        for child in children {
            let child_type = slot_type_name(child.resolved_type()?, prim);
            cgb.declare(&child_type, &child.name);
            cgb.append_statement(&format!(
                "this.{var}.load_{slot}(ctx(context, _m_{var}),{field})",
                var = child.variable_name,
                slot = slot,
                field = child.name
            ));
            cgb.assign(&format!("value.{}", child.name), &child.name);
        }
        cgb.end_block();

        cgb.empty_line();
        cgb.append_line(&format!(
            "void store_{}(IContext context, in {} value)",
            slot, target
        ));
        cgb.begin_block();
        for child in children {
            cgb.append_statement(&format!(
                "this.{var}.store_{slot}(ctx(context, _m_{var}),value.{field})",
                var = child.variable_name,
                slot = slot,
                field = child.name
            ));
        }
        cgb.end_block();
        Ok(())
    }

    fn trampoline_argument(&self) -> Result<String> {
        let direction = match self.io_type() {
            IoType::In => "in",
            IoType::Out => "out",
            IoType::InOut => "inout",
        };
        let mut arg = format!(
            "{} {} {}",
            direction,
            self.resolved_type()?.full_name(),
            self.variable_name
        );
        if self.no_diff() || !self.differentiable {
            arg.insert_str(0, "no_diff ");
        }
        Ok(arg)
    }
}

impl BoundCall {
    /// Generate call data for every variable followed by the trampoline.
    pub fn gen_code(&self, ctx: &CallContext) -> Result<CodeGen> {
        debug!(call_dimensionality = ctx.call_dimensionality, "generating call data");
        let mut cg = CodeGen::new();
        for value in self.values() {
            value.gen_call_data_code(&mut cg, ctx, 0)?;
        }
        self.gen_trampoline(&mut cg.trampoline)?;
        Ok(cg)
    }

    /// Emit `_trampoline`, which forwards the loaded arguments to the
    /// kernel function in parameter order.
    pub fn gen_trampoline(&self, cgb: &mut CodeGenBlock) -> Result<()> {
        let function = self.function.as_ref().ok_or_else(|| {
            BindError::call(
                BindErrorKind::BindingLookup,
                "call has not been bound to a kernel function".to_string(),
            )
        })?;

        let arguments = self
            .values()
            .map(BoundVariable::trampoline_argument)
            .collect::<Result<Vec<_>>>()?;

        let mut params: Vec<&BoundVariable> = self
            .values()
            .filter(|v| v.name != THIS_ARG && v.name != RESULT_ARG)
            .collect();
        params.sort_by_key(|v| v.param_index);
        let params: Vec<&str> = params.iter().map(|v| v.variable_name.as_str()).collect();

        let mut call = match self.kwarg(THIS_ARG) {
            Some(this) => format!("{}.{}", this.variable_name, function.name),
            None => function.name.clone(),
        };
        call.push_str(&format!("({})", params.join(", ")));
        if let Some(result) = self.kwarg(RESULT_ARG) {
            call = format!("{} = {}", result.variable_name, call);
        }

        if function.differentiable {
            cgb.append_line("[Differentiable]");
        }
        cgb.append_line(&format!("void _trampoline({})", arguments.join(", ")));
        cgb.begin_block();
        cgb.append_statement(&call);
        cgb.end_block();
        Ok(())
    }
}
