//! Round-trip properties of the value codec
//!
//! Whatever goes in through a global comes back out unchanged, and the
//! stack is empty afterwards.

use luabind::{Decode, Encode, Session, aggregate};
use proptest::prelude::*;
use std::fmt::Debug;

aggregate! {
    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        id: u32,
        label: String,
        tags: Vec<String>,
        position: (f64, f64),
        active: bool,
    }
}

fn round_trip<T: Encode + Decode + PartialEq + Debug>(session: &Session, value: &T) {
    session.set_global("value", value);
    let back: T = session.get_global("value").unwrap();
    assert_eq!(&back, value);
    assert_eq!(session.top(), 0);
}

#[test]
fn test_int_vector() {
    let session = Session::new().unwrap();
    round_trip(&session, &vec![1, 3, 4, 5]);
}

#[test]
fn test_string_vector() {
    let session = Session::new().unwrap();
    round_trip(&session, &vec!["thing".to_string(), "stuff".to_string()]);
}

#[test]
fn test_nested_tuple() {
    let session = Session::new().unwrap();
    round_trip(&session, &("thing".to_string(), 1, true, (4, false)));
}

#[test]
fn test_tuple_from_script_function() {
    let session = Session::new().unwrap();
    session
        .run_source(
            r#"
            createTuple = function()
                return { 1, false, "thing" }
            end
            "#,
        )
        .unwrap();
    let actual: (i32, bool, String) = session.call_global("createTuple", ()).get().unwrap();
    assert_eq!(actual, (1, false, "thing".to_string()));
}

#[test]
fn test_vector_of_aggregates() {
    let session = Session::new().unwrap();
    let records = vec![
        Record {
            id: 1,
            label: "first".into(),
            tags: vec![],
            position: (0.0, 0.0),
            active: true,
        },
        Record {
            id: 2,
            label: "second".into(),
            tags: vec!["a".into(), "b".into()],
            position: (-1.5, 2.25),
            active: false,
        },
    ];
    round_trip(&session, &records);
}

#[test]
fn test_script_sees_encoded_layout() {
    let session = Session::new().unwrap();
    session.set_global(
        "record",
        &Record {
            id: 9,
            label: "nine".into(),
            tags: vec!["x".into()],
            position: (3.0, 4.0),
            active: true,
        },
    );
    session
        .run_source(
            r#"
            assert(record.id == 9)
            assert(record.tags[1] == "x" and #record.tags == 1)
            assert(record.position[1] == 3 and record.position[2] == 4)
            "#,
        )
        .unwrap();
}

#[test]
fn test_fixed_array() {
    let session = Session::new().unwrap();
    round_trip(&session, &[1.5_f32, -2.0, 0.25]);
}

proptest! {
    #[test]
    fn prop_strings_round_trip(text in ".*") {
        let session = Session::new().unwrap();
        round_trip(&session, &text);
    }

    #[test]
    fn prop_integers_round_trip(values in prop::collection::vec(-(1i64 << 53)..(1i64 << 53), 0..64)) {
        let session = Session::new().unwrap();
        round_trip(&session, &values);
    }

    #[test]
    fn prop_floats_round_trip(value in prop::num::f64::NORMAL | prop::num::f64::ZERO) {
        let session = Session::new().unwrap();
        round_trip(&session, &value);
    }

    #[test]
    fn prop_nested_tuples_round_trip(
        a in any::<bool>(),
        b in any::<i32>(),
        c in "[a-z]{0,12}",
        d in prop::collection::vec(any::<u16>(), 0..8),
    ) {
        let session = Session::new().unwrap();
        round_trip(&session, &(a, (b, c), d));
    }
}
