use core_text::TextBuffer;

// Integration-adjacent: `save` (main.rs) is a thin wrapper over
// `TextBuffer::save_file`, exercised end-to-end here against a real
// temp file rather than re-testing `gap_buffer`'s own unit coverage.
#[test]
fn edited_buffer_round_trips_through_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "hello\n").unwrap();

    let mut tb = TextBuffer::load_file(&path).unwrap();
    tb.write(" world");
    tb.save_file(&path).unwrap();

    let reloaded = TextBuffer::load_file(&path).unwrap();
    assert_eq!(reloaded.extract_string(0, reloaded.text_length()), "hello world\n");
}

#[test]
fn missing_file_is_reported_as_an_error_not_an_empty_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.txt");
    assert!(TextBuffer::load_file(&path).is_err());
}
