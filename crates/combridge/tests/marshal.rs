//! Marshaling helpers: pointer-plus-count lists crossing the boundary.

use combridge::Error;
use combridge::marshal::{DefineList, StringList};

#[test]
fn string_list_round_trips() {
    let list = StringList::new(["-O2", "-Ishaders", "entry"]).expect("no interior NULs");
    assert_eq!(list.len(), 3);
    assert!(!list.is_empty());

    let back = unsafe { StringList::read_back(list.as_ptr(), list.len()) };
    assert_eq!(back, ["-O2", "-Ishaders", "entry"]);
}

#[test]
fn empty_string_list_is_valid() {
    let list = StringList::new(Vec::<String>::new()).expect("empty is fine");
    assert!(list.is_empty());
    assert!(unsafe { StringList::read_back(list.as_ptr(), 0) }.is_empty());
}

#[test]
fn interior_nul_is_rejected() {
    let err = StringList::new(["fine", "bad\0byte"]).unwrap_err();
    assert!(matches!(err, Error::InteriorNul(_)));
}

#[test]
fn define_list_round_trips_optional_values() {
    let list = DefineList::new([
        ("DEBUG", Some("1")),
        ("USE_HALF", None),
        ("MAX_LIGHTS", Some("8")),
    ])
    .expect("no interior NULs");
    assert_eq!(list.len(), 3);

    // A define without a value crosses as a null value pointer.
    let raw = unsafe { std::slice::from_raw_parts(list.as_ptr(), list.len()) };
    assert!(!raw[0].value.is_null());
    assert!(raw[1].value.is_null());

    let back = unsafe { DefineList::read_back(list.as_ptr(), list.len()) };
    assert_eq!(
        back,
        [
            ("DEBUG".to_string(), Some("1".to_string())),
            ("USE_HALF".to_string(), None),
            ("MAX_LIGHTS".to_string(), Some("8".to_string())),
        ]
    );
}
