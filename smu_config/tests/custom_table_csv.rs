use smu_config::load_custom_table_csv;
use std::io::Write;

fn write_table(content: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(content.as_bytes()).expect("write temp file");
    f
}

#[test]
fn loads_rows_as_raw_text() {
    let f = write_table("0,1.0\n0.5,2.0\n1,0.0\n");
    let rows = load_custom_table_csv(f.path()).expect("load table");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], ("0".to_string(), "1.0".to_string()));
    assert_eq!(rows[2], ("1".to_string(), "0.0".to_string()));
}

#[test]
fn short_rows_are_padded_not_rejected() {
    let f = write_table("0,1.0\njunk\n1,2.0\n");
    let rows = load_custom_table_csv(f.path()).expect("load table");
    // The malformed middle row survives as raw text; the generator drops it.
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1], ("junk".to_string(), String::new()));
}

#[test]
fn missing_file_is_an_error() {
    let err = load_custom_table_csv(std::path::Path::new("/nonexistent/table.csv"))
        .expect_err("should fail");
    assert!(format!("{err}").contains("open custom table CSV"));
}
