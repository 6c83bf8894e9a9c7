use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn formats_are_detected_by_extension() {
    assert_eq!(
        DocumentFormat::from_path(Path::new("handbook.PDF")),
        Some(DocumentFormat::Pdf)
    );
    assert_eq!(
        DocumentFormat::from_path(Path::new("timetable.xlsx")),
        Some(DocumentFormat::Spreadsheet)
    );
    assert_eq!(
        DocumentFormat::from_path(Path::new("fees.xls")),
        Some(DocumentFormat::Spreadsheet)
    );
    assert_eq!(
        DocumentFormat::from_path(Path::new("faq.md")),
        Some(DocumentFormat::PlainText)
    );
    assert_eq!(DocumentFormat::from_path(Path::new("photo.jpg")), None);
    assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
}

#[test]
fn missing_folder_yields_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let scan = scan(&temp_dir.path().join("absent")).expect("missing folder is not an error");

    assert!(scan.documents.is_empty());
    assert!(scan.skipped.is_empty());
}

#[test]
fn scan_sorts_and_skips_unsupported() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let folder = temp_dir.path();

    fs::write(folder.join("b.txt"), "second").expect("write");
    fs::write(folder.join("a.txt"), "first").expect("write");
    fs::write(folder.join("logo.png"), [0_u8, 1, 2]).expect("write");
    fs::create_dir(folder.join("nested.txt")).expect("mkdir");

    let scan = scan(folder).expect("scan");

    let names: Vec<&str> = scan.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert_eq!(scan.documents[0].bytes, b"first");
    assert_eq!(scan.skipped, vec!["logo.png".to_string()]);
}

#[test]
fn store_and_clear_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let source = temp_dir.path().join("upload.txt");
    fs::write(&source, "The auditorium seats 500 people.").expect("write");

    let folder = temp_dir.path().join("kb").join("docs");
    let stored = store_files(&folder, std::slice::from_ref(&source)).expect("store");

    assert_eq!(stored, vec![folder.join("upload.txt")]);
    assert!(folder.join("upload.txt").exists());

    assert_eq!(clear_folder(&folder).expect("clear"), 1);
    assert!(!folder.join("upload.txt").exists());
    assert_eq!(clear_folder(&folder).expect("clear again"), 0);
    assert_eq!(
        clear_folder(&temp_dir.path().join("absent")).expect("absent"),
        0
    );
}
