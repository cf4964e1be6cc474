//! Script files and session configuration

use luabind::{Error, Session, SessionConfig};
use std::io::Write;
use tempfile::NamedTempFile;

fn script(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(source.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_run_file() {
    let file = script(
        r#"
        greeting = "hi"
        square = function(x) return x * x end
        "#,
    );
    let session = Session::new().unwrap();
    session.run_file(file.path()).unwrap();

    assert_eq!(session.get_global::<String>("greeting").unwrap(), "hi");
    let squared: i32 = session.call_global("square", (9,)).get().unwrap();
    assert_eq!(squared, 81);
}

#[test]
fn test_run_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::new().unwrap();

    let err = session.run_file(dir.path().join("absent.lua")).unwrap_err();
    match err {
        Error::File(msg) => assert!(msg.contains("absent.lua"), "{msg}"),
        other => panic!("expected file error, got {other:?}"),
    }
    assert_eq!(session.top(), 0);
}

#[test]
fn test_file_with_syntax_error() {
    let file = script("local = 3");
    let session = Session::new().unwrap();
    let err = session.run_file(file.path()).unwrap_err();
    assert!(matches!(err, Error::Syntax(_)), "got {err:?}");

    session.run_source("ok = true").unwrap();
    assert!(session.get_global::<bool>("ok").unwrap());
}

#[test]
fn test_file_then_source() {
    let file = script("base = 10");
    let session = Session::new().unwrap();
    session
        .run_file(file.path())
        .unwrap()
        .run_source("derived = base * 2")
        .unwrap();
    assert_eq!(session.get_global::<i32>("derived").unwrap(), 20);
}

#[test]
fn test_config_from_toml() {
    let config = SessionConfig::from_toml(
        r#"
        traceback = true
        chunk_name = "=configured"
        "#,
    )
    .unwrap();
    let session = Session::with_config(config).unwrap();

    let err = session.run_source("error('oops')").unwrap_err();
    match err {
        Error::Runtime(msg) => {
            assert!(msg.starts_with("configured:1: oops"), "{msg}");
            assert!(msg.contains("stack traceback:"), "{msg}");
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert_eq!(session.top(), 0);
}

#[test]
fn test_session_without_standard_libraries() {
    let session = Session::with_config(SessionConfig::new().with_open_libs(false)).unwrap();

    session.run_source("x = 1 + 1").unwrap();
    assert_eq!(session.get_global::<i32>("x").unwrap(), 2);

    let err = session.run_source("string.rep('a', 2)").unwrap_err();
    assert!(matches!(err, Error::Runtime(_)), "got {err:?}");
}
