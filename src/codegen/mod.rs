//! Text emission for generated call-data code.
//!
//! `CodeGenBlock` is an ordered, indentation-aware line sink. `CodeGen`
//! groups the blocks a call produces and assembles the final module text.

#[cfg(test)]
mod tests;

const INDENT: &str = "    ";

/// An indentation-aware sink of generated source lines.
#[derive(Clone, Debug, Default)]
pub struct CodeGenBlock {
    code: String,
    indent: usize,
}

impl CodeGenBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        Self {
            code: String::new(),
            indent,
        }
    }

    fn push_indent(&mut self) {
        for _ in 0..self.indent {
            self.code.push_str(INDENT);
        }
    }

    pub fn append_line(&mut self, line: &str) {
        self.push_indent();
        self.code.push_str(line);
        self.code.push('\n');
    }

    pub fn append_statement(&mut self, statement: &str) {
        self.push_indent();
        self.code.push_str(statement);
        self.code.push_str(";\n");
    }

    /// Append pre-formatted multi-line code at the current indentation.
    pub fn append_code(&mut self, code: &str) {
        for line in code.lines() {
            if line.trim().is_empty() {
                self.code.push('\n');
            } else {
                self.append_line(line);
            }
        }
    }

    pub fn empty_line(&mut self) {
        self.code.push('\n');
    }

    pub fn begin_block(&mut self) {
        self.append_line("{");
        self.indent += 1;
    }

    pub fn end_block(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.append_line("}");
    }

    pub fn begin_struct(&mut self, name: &str) {
        self.append_line(&format!("struct {}", name));
        self.begin_block();
    }

    pub fn end_struct(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.append_line("};");
    }

    pub fn declare(&mut self, ty: &str, name: &str) {
        self.append_statement(&format!("{} {}", ty, name));
    }

    pub fn assign(&mut self, target: &str, value: &str) {
        self.append_statement(&format!("{} = {}", target, value));
    }

    pub fn type_alias(&mut self, name: &str, ty: &str) {
        self.append_statement(&format!("typealias {} = {}", name, ty));
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// All generated blocks for one call.
#[derive(Clone, Debug)]
pub struct CodeGen {
    /// Per-variable call-data types and axis-mapping constants.
    pub call_data_structs: CodeGenBlock,
    /// Fields of the top-level `CallData` struct.
    pub call_data: CodeGenBlock,
    /// Entry point forwarding call data to the kernel function.
    pub trampoline: CodeGenBlock,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    pub fn new() -> Self {
        Self {
            call_data_structs: CodeGenBlock::new(),
            call_data: CodeGenBlock::with_indent(1),
            trampoline: CodeGenBlock::new(),
        }
    }

    /// Assemble the complete generated module text.
    pub fn finish(&self) -> String {
        let mut out = String::new();
        out.push_str(self.call_data_structs.as_str());
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("struct CallData\n{\n");
        out.push_str(self.call_data.as_str());
        out.push_str("};\n");
        out.push_str("ParameterBlock<CallData> call_data;\n");
        if !self.trampoline.is_empty() {
            out.push('\n');
            out.push_str(self.trampoline.as_str());
        }
        out
    }
}

// ─── Differential Pairs ────────────────────────────────────────────

/// Storage for a value that carries a primal and a derivative slot.
/// Unused slots use [`NONE_STORAGE`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DifferentialPair {
    pub name: String,
    pub primal_storage: String,
    pub derivative_storage: String,
    pub primal_target: String,
    pub derivative_target: String,
}

pub const NONE_STORAGE: &str = "NoneType";

/// Emit `_t_<name>` wrapping primal and derivative storage, with
/// `load_`/`store_` accessors for every slot that has storage.
pub fn emit_differential_pair(cgb: &mut CodeGenBlock, pair: &DifferentialPair) {
    cgb.begin_struct(&format!("_t_{}", pair.name));
    cgb.declare(&pair.primal_storage, "primal");
    cgb.declare(&pair.derivative_storage, "derivative");

    let slots = [
        ("primal", &pair.primal_storage, &pair.primal_target),
        ("derivative", &pair.derivative_storage, &pair.derivative_target),
    ];
    for (slot, storage, target) in slots {
        if storage.as_str() == NONE_STORAGE {
            continue;
        }
        cgb.empty_line();
        cgb.append_line(&format!(
            "void load_{}(IContext context, out {} value)",
            slot, target
        ));
        cgb.begin_block();
        cgb.append_statement(&format!("this.{}.load_primal(context, value)", slot));
        cgb.end_block();
        cgb.empty_line();
        cgb.append_line(&format!(
            "void store_{}(IContext context, in {} value)",
            slot, target
        ));
        cgb.begin_block();
        cgb.append_statement(&format!("this.{}.store_primal(context, value)", slot));
        cgb.end_block();
    }
    cgb.end_struct();
}
