use super::*;
use crate::access::CallMode;
use crate::binding::RESULT_ARG;
use std::fs;

const ADD: &str = r#"
args = [1.0, { kind = "buffer", element = "float", shape = [4] }]

[function]
name = "add"
return = "float"
differentiable = true

[[function.params]]
name = "a"
type = "float"

[[function.params]]
name = "b"
type = "float"

[kwargs]
_result = { kind = "value_ref", value = 0.0 }
"#;

const TRANSLATE: &str = r#"
args = [{ x = { kind = "buffer", element = "float", shape = [2, 3], writable = true }, y = 2.5 }]

[function]
name = "translate"

[[function.params]]
name = "p"
type = "Point"
modifiers = ["inout"]

[[types]]
name = "Point"
differentiable = true
fields = [{ name = "x", type = "float" }, { name = "y", type = "float" }]

[[types]]
name = "Segment"
fields = [{ name = "from", type = "Point" }, { name = "to", type = "Point" }]

[vectorize]
args = [{ x = [1, 0], y = "float" }]

[options]
strict_broadcasting = true
"#;

fn float() -> KernelType {
    KernelType::scalar(ScalarType::Float)
}

#[test]
fn test_parse_function_and_args() {
    let manifest = CallManifest::parse(ADD).unwrap();
    let layout = manifest.layout().unwrap();

    let function = manifest.function(&layout).unwrap();
    assert_eq!(function.name, "add");
    assert_eq!(function.params.len(), 2);
    assert_eq!(function.return_type, Some(float()));
    assert!(function.differentiable);

    let call = manifest.call_args(&layout).unwrap();
    assert_eq!(
        call.args,
        vec![
            HostValue::Float(1.0),
            HostValue::buffer(float(), &[4], false)
        ]
    );
    assert_eq!(
        call.kwargs,
        vec![(
            RESULT_ARG.to_string(),
            HostValue::value_ref(HostValue::Float(0.0))
        )]
    );
    assert!(manifest.vectorization().unwrap().is_empty());
    assert_eq!(manifest.options, None);
}

#[test]
fn test_structs_dicts_and_overrides() {
    let manifest = CallManifest::parse(TRANSLATE).unwrap();
    let layout = manifest.layout().unwrap();

    let segment = layout.find_type_by_name("Segment").unwrap();
    assert_eq!(segment.fields().len(), 2);
    assert!(segment.field("from").unwrap().ty.is_struct());
    assert!(layout.find_type_by_name("Point").unwrap().differentiable());

    let function = manifest.function(&layout).unwrap();
    assert!(function.params[0].modifiers.contains(Modifier::InOut));

    let call = manifest.call_args(&layout).unwrap();
    assert_eq!(
        call.args[0],
        HostValue::dict([
            ("x", HostValue::buffer(float(), &[2, 3], true)),
            ("y", HostValue::Float(2.5)),
        ])
    );

    let vectorization = manifest.vectorization().unwrap();
    assert_eq!(
        vectorization.args,
        vec![Override::fields([
            ("x", Override::axes(&[1, 0])),
            ("y", Override::TypeName("float".to_string())),
        ])]
    );
    assert_eq!(manifest.options, Some(BindOptions::strict()));
}

#[test]
fn test_tagged_values() {
    let manifest = CallManifest::parse(
        r#"
args = [
    { kind = "vector", scalar = "int", values = [1, 2, 3] },
    [0.5, 1.5],
    { kind = "diff_pair", primal = 2.0 },
    { kind = "buffer", element = "float3", shape = [16], grad = false },
    { kind = "texture", texel = "float4", size = [64, 32] },
    true,
    7,
]

[function]
name = "f"
"#,
    )
    .unwrap();
    let layout = manifest.layout().unwrap();
    let call = manifest.call_args(&layout).unwrap();
    assert_eq!(
        call.args,
        vec![
            HostValue::Vector(ScalarType::Int, vec![1.0, 2.0, 3.0]),
            HostValue::Vector(ScalarType::Float, vec![0.5, 1.5]),
            HostValue::diff_pair(2.0, 0.0, true),
            HostValue::diff_buffer(KernelType::vector(ScalarType::Float, 3), &[16], false, false),
            HostValue::texture(KernelType::vector(ScalarType::Float, 4), &[64, 32], false),
            HostValue::Bool(true),
            HostValue::Int(7),
        ]
    );
}

#[test]
fn test_host_type_override() {
    let spec = OverrideSpec::Name("host:NDBuffer".to_string());
    assert_eq!(
        spec.to_override().unwrap(),
        Override::HostType(HostKind::Buffer)
    );

    let err = OverrideSpec::Name("host:Tensor".to_string())
        .to_override()
        .unwrap_err();
    assert!(matches!(err, ManifestError::UnknownHostType(ref name) if name == "Tensor"));
}

#[test]
fn test_unknown_names_are_reported() {
    let manifest = CallManifest::parse(
        r#"
args = [{ kind = "buffer", element = "quaternion", shape = [4] }]

[function]
name = "f"

[[function.params]]
name = "a"
type = "float"
modifiers = ["const"]
"#,
    )
    .unwrap();
    let layout = manifest.layout().unwrap();

    let err = manifest.function(&layout).unwrap_err();
    assert!(matches!(err, ManifestError::UnknownModifier { ref modifier, .. } if modifier == "const"));

    let err = manifest.call_args(&layout).unwrap_err();
    assert_eq!(err.to_string(), "unknown type 'quaternion'");
}

#[test]
fn test_struct_field_must_be_declared_first() {
    let manifest = CallManifest::parse(
        r#"
[function]
name = "f"

[[types]]
name = "Segment"
fields = [{ name = "from", type = "Point" }]

[[types]]
name = "Point"
fields = [{ name = "x", type = "float" }]
"#,
    )
    .unwrap();
    let err = manifest.layout().unwrap_err();
    assert!(matches!(err, ManifestError::UnknownType(ref name) if name == "Point"));
}

#[test]
fn test_rejects_unknown_keys() {
    assert!(CallManifest::parse("[function]\nname = \"f\"\nreturns = \"float\"\n").is_err());
    assert!(CallManifest::parse("[function]\nname = \"f\"\n[outputs]\n").is_err());
    assert!(CallManifest::parse("args = []\n").is_err());
}

#[test]
fn test_load_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("call.toml");
    fs::write(&path, "[function]\nname = 3\n").unwrap();
    let err = CallManifest::load(&path).unwrap_err();
    assert!(matches!(err, ManifestError::Parse { .. }));
    assert!(err.to_string().contains("call.toml"), "got: {}", err);

    fs::write(&path, ADD).unwrap();
    assert_eq!(CallManifest::load(&path).unwrap().function.name, "add");
}

#[test]
fn test_manifest_drives_pipeline() {
    let manifest = CallManifest::parse(ADD).unwrap();
    let layout = manifest.layout().unwrap();
    let function = manifest.function(&layout).unwrap();
    let call = manifest.call_args(&layout).unwrap();
    let sig = crate::build_call_signature(
        &crate::marshall::MarshallRegistry::builtin(),
        &layout,
        &function,
        CallMode::Forward,
        manifest.options.unwrap_or_default(),
        &call,
        &manifest.vectorization().unwrap(),
    )
    .unwrap();
    assert_eq!(sig.call_dimensionality, 1);
    assert!(sig.code.contains("typealias _t_b = NDBuffer<float,1>;"));
    assert!(sig.code.contains("_result = add(a, b);"));
}
