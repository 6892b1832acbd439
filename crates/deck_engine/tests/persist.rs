use std::fs;

use deck_engine::{ensure_output_dir, AtomicFileWriter, PersistError};
use tempfile::TempDir;

#[test]
fn creates_missing_download_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("downloads");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn second_download_replaces_the_first() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("deck.pptx", b"first").unwrap();
    assert_eq!(first.file_name().unwrap(), "deck.pptx");
    assert_eq!(fs::read(&first).unwrap(), b"first");

    let second = writer.write("deck.pptx", b"second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"second");
}

#[test]
fn no_partial_file_when_dir_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    assert!(writer.write("deck.pptx", b"data").is_err());
    assert!(!file_path.with_file_name("deck.pptx").exists());
}

#[test]
fn path_like_file_names_are_refused() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let err = writer.write("../escape.pptx", b"x").unwrap_err();
    assert!(matches!(err, PersistError::BadFileName(_)));
}
