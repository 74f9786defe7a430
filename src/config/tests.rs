use super::*;
use std::fs;

#[test]
fn test_default_is_lenient() {
    assert!(!BindOptions::default().strict_broadcasting);
    assert!(BindOptions::strict().strict_broadcasting);
}

#[test]
fn test_parse_options_table() {
    let opts = BindOptions::parse("[options]\nstrict_broadcasting = true\n").unwrap();
    assert!(opts.strict_broadcasting);

    let empty = BindOptions::parse("").unwrap();
    assert_eq!(empty, BindOptions::default());

    let other_tables = BindOptions::parse("[project]\nname = \"demo\"\n").unwrap();
    assert_eq!(other_tables, BindOptions::default());
}

#[test]
fn test_parse_rejects_wrong_type() {
    assert!(BindOptions::parse("[options]\nstrict_broadcasting = \"maybe\"\n").is_err());
}

#[test]
fn test_find_in_ancestor() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("kernels").join("shading");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        dir.path().join(CONFIG_FILE),
        "[options]\nstrict_broadcasting = true\n",
    )
    .unwrap();

    let found = BindOptions::find(&nested).unwrap();
    assert_eq!(found, dir.path().join(CONFIG_FILE));
    assert!(BindOptions::load(&found).unwrap().strict_broadcasting);
}

#[test]
fn test_load_missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let err = BindOptions::load(&path).unwrap_err();
    assert!(err.to_string().contains("absent.toml"), "got: {}", err);
}

#[test]
fn test_env_value_overrides_file() {
    let base = BindOptions::strict();
    assert!(!base.with_env_value(Some("off")).unwrap().strict_broadcasting);
    assert!(BindOptions::default()
        .with_env_value(Some("TRUE"))
        .unwrap()
        .strict_broadcasting);
    assert_eq!(base.with_env_value(None).unwrap(), base);
    assert!(base.with_env_value(Some("sometimes")).is_err());
}
