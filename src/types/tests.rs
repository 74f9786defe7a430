use super::*;

#[test]
fn test_numeric_names() {
    assert_eq!(KernelType::scalar(ScalarType::Float).full_name(), "float");
    assert_eq!(KernelType::vector(ScalarType::Int, 3).full_name(), "int3");
    assert_eq!(
        KernelType::matrix(ScalarType::Float, 3, 4).full_name(),
        "float3x4"
    );
    assert_eq!(
        KernelType::array(KernelType::vector(ScalarType::Float, 2), 8).full_name(),
        "float2[8]"
    );
}

#[test]
fn test_resource_names() {
    let float = KernelType::scalar(ScalarType::Float);
    assert_eq!(
        KernelType::nd_buffer(float.clone(), 2, false).full_name(),
        "NDBuffer<float,2>"
    );
    assert_eq!(
        KernelType::nd_buffer(float.clone(), 1, true).full_name(),
        "RWNDBuffer<float,1>"
    );
    assert_eq!(
        KernelType::texture(KernelType::vector(ScalarType::Float, 4), 2, true).full_name(),
        "RWTexture2D<float4>"
    );
}

#[test]
fn test_shape_and_reduce() {
    let m = KernelType::matrix(ScalarType::Float, 3, 4);
    assert_eq!(m.shape(), vec![3, 4]);
    assert_eq!(m.reduce(1), Some(KernelType::vector(ScalarType::Float, 4)));
    assert_eq!(m.reduce(2), Some(KernelType::scalar(ScalarType::Float)));
    assert_eq!(m.reduce(3), None);

    let arr = KernelType::array(KernelType::vector(ScalarType::Float, 3), 5);
    assert_eq!(arr.shape(), vec![5, 3]);
    assert_eq!(arr.reduce(2), Some(KernelType::scalar(ScalarType::Float)));

    let s = KernelType::scalar(ScalarType::Int);
    assert_eq!(s.reduce(0), Some(s.clone()));
    assert_eq!(s.reduce(1), None);
}

#[test]
fn test_differentiability() {
    assert!(KernelType::scalar(ScalarType::Float).differentiable());
    assert!(!KernelType::scalar(ScalarType::Int).differentiable());
    assert!(KernelType::vector(ScalarType::Half, 2).differentiable());
    assert!(!KernelType::interface("IFoo").differentiable());
    let s = KernelType::structure(
        "Particle",
        vec![KernelField::new(
            "pos",
            KernelType::vector(ScalarType::Float, 3),
        )],
        true,
    );
    assert!(s.differentiable());
    assert_eq!(s.differential_name(), "Particle.Differential");
}

#[test]
fn test_layout_parses_builtins() {
    let layout = ModuleLayout::new();
    assert_eq!(
        layout.find_type_by_name("float3"),
        Some(KernelType::vector(ScalarType::Float, 3))
    );
    assert_eq!(
        layout.find_type_by_name("uint2x2"),
        Some(KernelType::matrix(ScalarType::UInt, 2, 2))
    );
    assert_eq!(
        layout.find_type_by_name("RWNDBuffer<float3,2>"),
        Some(KernelType::nd_buffer(
            KernelType::vector(ScalarType::Float, 3),
            2,
            true
        ))
    );
    assert_eq!(
        layout.find_type_by_name("Texture3D<float4>"),
        Some(KernelType::texture(
            KernelType::vector(ScalarType::Float, 4),
            3,
            false
        ))
    );
    assert_eq!(
        layout.find_type_by_name("int[4]"),
        Some(KernelType::array(KernelType::scalar(ScalarType::Int), 4))
    );
    assert!(layout
        .find_type_by_name("IDifferentiable")
        .is_some_and(|t| t.is_interface()));
}

#[test]
fn test_layout_rejects_unknown() {
    let layout = ModuleLayout::new();
    assert_eq!(layout.find_type_by_name("Particle"), None);
    assert_eq!(layout.find_type_by_name("float5"), None);
    assert_eq!(layout.find_type_by_name("NDBuffer<float>"), None);
}

#[test]
fn test_layout_registered_struct() {
    let mut layout = ModuleLayout::new();
    let particle = KernelType::structure(
        "Particle",
        vec![
            KernelField::new("pos", KernelType::vector(ScalarType::Float, 3)),
            KernelField::new("id", KernelType::scalar(ScalarType::Int)),
        ],
        true,
    );
    layout.register(particle.clone());
    assert_eq!(layout.find_type_by_name("Particle"), Some(particle.clone()));
    assert!(particle.field("id").is_some());
    assert!(particle.field("vel").is_none());
}

#[test]
fn test_parse_generic_signature() {
    assert_eq!(
        parse_generic_signature("NDBuffer<float,2>"),
        Some(("NDBuffer", vec!["float", "2"]))
    );
    assert_eq!(
        parse_generic_signature("Pair<Foo<a,b>, 3>"),
        Some(("Pair", vec!["Foo<a,b>", "3"]))
    );
    assert_eq!(parse_generic_signature("float"), None);
}
