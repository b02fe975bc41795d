//! Generated interface surface: descriptors, identities and layout caches.

use std::mem::size_of;
use std::thread;

use combridge::{Guid, HResult, Interface, com_interface, registry};

#[com_interface("1d8a1f34-6c2b-4e7d-9b0a-5f3c82d4e911")]
pub trait ICounter {
    fn get_value(&self) -> i32;
    fn set_value(&self, value: i32) -> HResult;
}

#[com_interface("7f4e2a09-91bd-47c3-8a55-0d6b9c13f7a2", extends(ICounter))]
pub trait IResettable {
    fn reset(&self) -> HResult;
}

#[com_interface]
pub trait IAnonymous {
    fn poke(&self) -> i32;
}

#[test]
fn iid_constants_carry_the_declared_guid() {
    assert_eq!(
        IID_ICOUNTER,
        Guid::new(
            0x1d8a1f34,
            0x6c2b,
            0x4e7d,
            [0x9b, 0x0a, 0x5f, 0x3c, 0x82, 0xd4, 0xe9, 0x11]
        )
    );
    assert_eq!(<ICounter as Interface>::IID, IID_ICOUNTER);
    assert!(IID_IANONYMOUS.is_zero());
}

#[test]
fn descriptor_chain_roots_at_iunknown() {
    assert_eq!(ICOUNTER_DESC.name, "ICounter");
    assert_eq!(ICOUNTER_DESC.depth(), 1);
    assert_eq!(ICOUNTER_DESC.slot_count(), 5);

    let base = IRESETTABLE_DESC.base.expect("declared with extends");
    assert_eq!(base.name, "ICounter");
    assert_eq!(IRESETTABLE_DESC.depth(), 2);
    assert_eq!(IRESETTABLE_DESC.slot_count(), 6);

    let root = base.base.expect("implicit root");
    assert_eq!(root.name, "IUnknown");
    assert!(root.base.is_none());
}

#[test]
fn flattened_layout_is_base_first() {
    let names: Vec<_> = IRESETTABLE_DESC.flatten().iter().map(|m| m.name).collect();
    assert_eq!(
        names,
        [
            "query_interface",
            "add_ref",
            "release",
            "get_value",
            "set_value",
            "reset"
        ]
    );
}

#[test]
fn slot_of_resolves_absolute_slots() {
    // The root methods pin slots 0..3; declared methods follow in order.
    assert_eq!(ICOUNTER_DESC.slot_of("query_interface"), Some(0));
    assert_eq!(ICOUNTER_DESC.slot_of("get_value"), Some(3));
    assert_eq!(ICOUNTER_DESC.slot_of("set_value"), Some(4));
    assert_eq!(IRESETTABLE_DESC.slot_of("reset"), Some(5));
    assert_eq!(ICOUNTER_DESC.slot_of("reset"), None);
}

#[test]
fn layout_cache_returns_the_identical_slice() {
    let first = registry::layout_of(&ICOUNTER_DESC);
    let second = registry::layout_of(&ICOUNTER_DESC);
    assert_eq!(first.as_ptr(), second.as_ptr());
}

#[test]
fn concurrent_first_use_agrees_on_one_layout() {
    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| registry::layout_of(&IRESETTABLE_DESC).as_ptr() as usize))
        .collect();
    let pointers: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("layout thread panicked"))
        .collect();
    assert!(pointers.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn identity_lookup_is_memoized() {
    assert_eq!(registry::uuid_of::<ICounter>(), IID_ICOUNTER);
    assert_eq!(registry::uuid_of::<ICounter>(), IID_ICOUNTER);
    assert!(registry::uuid_of::<IAnonymous>().is_zero());
}

#[test]
fn vtable_is_one_pointer_per_slot() {
    assert_eq!(size_of::<ICounterVtable>(), 5 * size_of::<usize>());
    assert_eq!(size_of::<IResettableVtable>(), 6 * size_of::<usize>());
}
