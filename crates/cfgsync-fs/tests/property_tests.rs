use cfgsync_fs::{NormalizedPath, sanitize_file_stem};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_sanitized_stems_are_filesystem_safe(s in "\\PC*") {
        let stem = sanitize_file_stem(&s);

        prop_assert!(!stem.is_empty());
        prop_assert!(stem.len() <= 60);
        prop_assert!(stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        prop_assert!(!stem.starts_with('_'));
        prop_assert!(!stem.ends_with('_'));
        prop_assert!(!stem.contains("__"));
    }

    #[test]
    fn test_sanitize_is_idempotent(s in "\\PC*") {
        let once = sanitize_file_stem(&s);
        prop_assert_eq!(sanitize_file_stem(&once), once.clone());
    }

    #[test]
    fn test_normalized_paths_have_no_backslashes(s in "\\PC*") {
        let path = NormalizedPath::new(&s);
        prop_assert!(!path.as_str().contains('\\'));
    }
}
