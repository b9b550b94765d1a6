//! E2E tests for fs.readFileSync / fs.writeFileSync

use super::harness::*;

#[test]
fn test_write_then_read() {
    let fixture = Fixture::new();
    let path = fixture.path("out.txt");
    fixture.eval(&format!(
        r#"
        fs.writeFileSync({path:?}, "hi");
        console.log(fs.readFileSync({path:?}));
        "#
    ));
    assert_eq!(fixture.run(), vec!["hi"]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi");
}

#[test]
fn test_write_truncates() {
    let fixture = Fixture::new();
    let path = fixture.path("data.txt");
    std::fs::write(&path, "a much longer original content").unwrap();
    fixture.eval(&format!(r#"fs.writeFileSync({path:?}, "short");"#));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
}

#[test]
fn test_read_existing_file() {
    let fixture = Fixture::new();
    let path = fixture.path("in.txt");
    std::fs::write(&path, "line one\nline two").unwrap();
    let value = fixture.eval(&format!("fs.readFileSync({path:?}).split('\\n').length"));
    assert_eq!(value, "2");
}

#[test]
fn test_read_missing_throws_io_error() {
    let fixture = Fixture::new();
    let path = fixture.path("missing.txt");
    fixture.eval(&format!(
        r#"
        try {{
            fs.readFileSync({path:?});
        }} catch (e) {{
            console.log(e.name, e.message.includes("missing.txt"));
        }}
        "#
    ));
    assert_eq!(fixture.run(), vec!["IOError true"]);
}

#[test]
fn test_write_into_missing_directory_throws() {
    let fixture = Fixture::new();
    let path = fixture.path("no/such/dir/file.txt");
    fixture.eval(&format!(
        r#"
        try {{
            fs.writeFileSync({path:?}, "x");
        }} catch (e) {{
            console.log(e.name);
        }}
        "#
    ));
    assert_eq!(fixture.run(), vec!["IOError"]);
}

#[test]
fn test_missing_path_argument() {
    expect_output(
        r#"try { fs.readFileSync(); } catch (e) { console.log(e.name); }"#,
        &["InvalidArgument"],
    );
}

#[cfg(unix)]
#[test]
fn test_written_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new();
    let path = fixture.path("mode.txt");
    fixture.eval(&format!(r#"fs.writeFileSync({path:?}, "x");"#));
    let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    // the process umask can only clear bits
    assert_eq!(mode & !0o644, 0);
}
