//! Stack discipline and failure isolation
//!
//! Whatever happens inside an operation, the session's stack depth must be
//! back where it started afterwards, and a failure must not spoil the
//! operations that follow it.

use luabind::{Error, Session, adapt, pop, push};

#[test]
fn test_depth_restored_after_every_operation() {
    let session = Session::new().unwrap();
    session
        .run_source(
            r#"
            ok = function(a) return a end
            boom = function() error("boom") end
            text = "not a number"
            "#,
        )
        .unwrap();
    assert_eq!(session.top(), 0);

    session.set_global("n", &1.5);
    assert_eq!(session.top(), 0);

    let _ = session.get_global::<f64>("n");
    assert_eq!(session.top(), 0);

    let _ = session.get_global::<f64>("text");
    assert_eq!(session.top(), 0);

    let _ = session.get_global::<Vec<i32>>("missing");
    assert_eq!(session.top(), 0);

    let _ = session.call_global("ok", (1,)).get::<i32>();
    assert_eq!(session.top(), 0);

    let _ = session.call_global("ok", ("x",)).get::<i32>();
    assert_eq!(session.top(), 0);

    let _ = session.call_global("boom", ()).get::<i32>();
    assert_eq!(session.top(), 0);

    let _ = session.call_global("boom", ()).invoke();
    assert_eq!(session.top(), 0);

    let _ = session.run_source("(");
    assert_eq!(session.top(), 0);

    let _ = session.run_source("error('x')");
    assert_eq!(session.top(), 0);
}

#[test]
fn test_depth_is_relative_to_existing_values() {
    let session = Session::new().unwrap();
    let state = session.state();

    // Values the embedding left behind are not touched
    push(state, "mine");
    push(state, &7);
    assert_eq!(session.top(), 2);

    session.run_source("f = function() error('nope') end").unwrap();
    let _ = session.call_global("f", ()).invoke();
    let _ = session.get_global::<String>("f");
    assert_eq!(session.top(), 2);

    assert_eq!(pop::<i32>(state).unwrap(), 7);
    assert_eq!(pop::<String>(state).unwrap(), "mine");
}

#[test]
fn test_runtime_error_then_still_usable() {
    let session = Session::new().unwrap();
    session
        .run_source("fail = function() error('deliberate') end")
        .unwrap();

    let err = session.call_global("fail", ()).invoke().unwrap_err();
    match &err {
        Error::Runtime(msg) => assert!(msg.ends_with("deliberate"), "{msg}"),
        other => panic!("expected runtime error, got {other:?}"),
    }

    session.set_global("later", &vec![1, 2, 3]);
    assert_eq!(
        session.get_global::<Vec<i32>>("later").unwrap(),
        vec![1, 2, 3]
    );
    session
        .run_source("double = function(x) return x * 2 end")
        .unwrap();
    let doubled: f64 = session.call_global("double", (2.5,)).get().unwrap();
    assert_eq!(doubled, 5.0);
}

#[test]
fn test_failed_decode_then_still_usable() {
    let session = Session::new().unwrap();
    session.run_source("t = { 1, 2, 'three' }").unwrap();

    let err = session.get_global::<Vec<i32>>("t").unwrap_err();
    assert_eq!(err, Error::incorrect_type("number at position 3", "string"));

    session.set_global("t", &vec!["one", "two"]);
    assert_eq!(
        session.get_global::<Vec<String>>("t").unwrap(),
        vec!["one", "two"]
    );
    assert_eq!(session.top(), 0);
}

#[test]
fn test_deferred_call_runs_exactly_once() {
    let session = Session::new().unwrap();
    session
        .run_source(
            r#"
            calls = 0
            bump = function() calls = calls + 1; return calls end
            "#,
        )
        .unwrap();
    let calls = || session.get_global::<i32>("calls").unwrap();

    let value: i32 = session.call_global("bump", ()).get().unwrap();
    assert_eq!(value, 1);
    assert_eq!(calls(), 1);

    session.call_global("bump", ()).invoke().unwrap();
    assert_eq!(calls(), 2);

    // Dropped without being resolved
    drop(session.call_global("bump", ()));
    assert_eq!(calls(), 3);

    // Constructed but not yet dropped: nothing has run
    let pending = session.call_global("bump", ());
    assert_eq!(pending.name(), "bump");
    assert_eq!(calls(), 3);
    drop(pending);
    assert_eq!(calls(), 4);

    assert_eq!(session.top(), 0);
}

#[test]
fn test_failing_deferred_call_on_drop() {
    let session = Session::new().unwrap();
    session
        .run_source("explode = function() error('in drop') end")
        .unwrap();

    // The failure is logged, not propagated
    drop(session.call_global("explode", ()));
    assert_eq!(session.top(), 0);

    session.set_global("fine", &true);
    assert!(session.get_global::<bool>("fine").unwrap());
}

#[test]
fn test_deferred_call_skipped_while_panicking() {
    let session = Session::new().unwrap();
    session
        .run_source(
            r#"
            calls = 0
            bump = function() calls = calls + 1 end
            "#,
        )
        .unwrap();

    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _pending = session.call_global("bump", ());
        panic!("unwinding past a pending call");
    }));
    assert!(unwound.is_err());

    // No script code ran during the unwind
    assert_eq!(session.get_global::<i32>("calls").unwrap(), 0);
    assert_eq!(session.top(), 0);
}

#[test]
fn test_host_errors_are_catchable_in_script() {
    let session = Session::new().unwrap();
    session.set_global("timesTwo", &adapt!(|x: i32| x * 2));
    session
        .run_source(
            r#"
            ok, message = pcall(timesTwo, "thing")
            again = timesTwo(21)
            "#,
        )
        .unwrap();

    assert!(!session.get_global::<bool>("ok").unwrap());
    let message: String = session.get_global("message").unwrap();
    assert!(
        message.contains("expected number for argument #1, found string"),
        "{message}"
    );
    assert_eq!(session.get_global::<i32>("again").unwrap(), 42);
    assert_eq!(session.top(), 0);
}

#[test]
fn test_borrowed_session_does_not_close() {
    let owner = Session::new().unwrap();
    {
        let borrowed = unsafe { Session::from_raw(owner.as_raw()) }.unwrap();
        assert!(!borrowed.is_owned());
        borrowed.set_global("shared", &"from borrowed");
        borrowed.close();
    }
    assert_eq!(
        owner.get_global::<String>("shared").unwrap(),
        "from borrowed"
    );
}

#[test]
fn test_null_engine_is_rejected() {
    let session = unsafe { Session::from_raw(std::ptr::null_mut()) };
    assert!(session.is_none());
}
