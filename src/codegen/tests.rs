use super::*;

#[test]
fn test_nested_blocks_indent() {
    let mut cgb = CodeGenBlock::new();
    cgb.begin_struct("_t_a");
    cgb.declare("float", "x");
    cgb.append_line("void f()");
    cgb.begin_block();
    cgb.assign("x", "1.0");
    cgb.end_block();
    cgb.end_struct();
    assert_eq!(
        cgb.as_str(),
        "struct _t_a\n{\n    float x;\n    void f()\n    {\n        x = 1.0;\n    }\n};\n"
    );
}

#[test]
fn test_append_code_reindents() {
    let mut cgb = CodeGenBlock::with_indent(1);
    cgb.append_code("int a;\n\nint b;");
    assert_eq!(cgb.as_str(), "    int a;\n\n    int b;\n");
}

#[test]
fn test_unbalanced_end_does_not_underflow() {
    let mut cgb = CodeGenBlock::new();
    cgb.end_block();
    cgb.type_alias("_t_x", "ValueType<float>");
    assert_eq!(cgb.as_str(), "}\ntypealias _t_x = ValueType<float>;\n");
}

#[test]
fn test_finish_without_structs() {
    let cg = CodeGen::new();
    assert_eq!(
        cg.finish(),
        "struct CallData\n{\n};\nParameterBlock<CallData> call_data;\n"
    );
}

#[test]
fn test_differential_pair_skips_unused_slot() {
    let mut cgb = CodeGenBlock::new();
    emit_differential_pair(
        &mut cgb,
        &DifferentialPair {
            name: "x".to_string(),
            primal_storage: "NDBuffer<float,1>".to_string(),
            derivative_storage: NONE_STORAGE.to_string(),
            primal_target: "float".to_string(),
            derivative_target: "float.Differential".to_string(),
        },
    );
    let code = cgb.as_str();
    assert!(code.starts_with("struct _t_x\n{\n    NDBuffer<float,1> primal;\n    NoneType derivative;\n"));
    assert!(code.contains("void load_primal(IContext context, out float value)"));
    assert!(code.contains("void store_primal(IContext context, in float value)"));
    assert!(!code.contains("load_derivative"));
    assert!(code.ends_with("};\n"));
}
