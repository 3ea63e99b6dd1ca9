use cfgsync_fs::{NormalizedPath, sanitize_file_stem};
use rstest::rstest;

#[test]
fn test_normalize_backslashes_to_forward() {
    let path = NormalizedPath::new("foo\\bar\\baz");
    assert_eq!(path.as_str(), "foo/bar/baz");
}

#[test]
fn test_join_paths() {
    let base = NormalizedPath::new("foo/bar");
    assert_eq!(base.join("baz").as_str(), "foo/bar/baz");
    assert_eq!(NormalizedPath::new("foo/").join("baz").as_str(), "foo/baz");
}

#[test]
fn test_parent() {
    let path = NormalizedPath::new("foo/bar/baz");
    assert_eq!(path.parent().unwrap().as_str(), "foo/bar");
}

#[test]
fn test_file_name_and_extension() {
    let path = NormalizedPath::new("queues/main_100.json");
    assert_eq!(path.file_name(), Some("main_100.json"));
    assert_eq!(path.extension(), Some("json"));
    assert_eq!(NormalizedPath::new(".cfgsync").extension(), None);
}

#[test]
fn test_canonicalize_existing_dir() {
    let temp = tempfile::tempdir().unwrap();
    let canonical = NormalizedPath::canonicalize(temp.path()).unwrap();
    assert!(canonical.is_dir());
}

#[test]
fn test_canonicalize_missing_path_fails() {
    assert!(NormalizedPath::canonicalize("/nonexistent/cfgsync/path").is_err());
}

#[rstest]
#[case("Invoices", "Invoices")]
#[case("Invoices EU", "Invoices_EU")]
#[case("a/b\\c", "a_b_c")]
#[case("__lead__", "lead")]
#[case("hook: export -> SAP", "hook_export_-_SAP")]
fn test_sanitize_cases(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(sanitize_file_stem(input), expected);
}
