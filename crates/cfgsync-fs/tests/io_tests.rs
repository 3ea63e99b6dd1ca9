use cfgsync_fs::{NormalizedPath, io};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_write_atomic_creates_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("queues/main_1.json"));

    io::write_atomic(&path, b"{}\n").unwrap();

    assert_eq!(fs::read_to_string(path.to_native()).unwrap(), "{}\n");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("test.json");
    fs::write(&file_path, "original").unwrap();

    io::write_atomic(&NormalizedPath::new(&file_path), b"updated").unwrap();

    assert_eq!(fs::read_to_string(&file_path).unwrap(), "updated");
}

#[test]
fn test_read_text_nonexistent_file() {
    let path = NormalizedPath::new("/nonexistent/file.json");
    let err = io::read_text(&path).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_remove_file_if_exists() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("gone.json"));
    fs::write(path.to_native(), "x").unwrap();

    assert!(io::remove_file_if_exists(&path).unwrap());
    assert!(!io::remove_file_if_exists(&path).unwrap());
    assert!(!path.exists());
}
