//! Managed → native direction: synthetic vtable blocks over Rust objects.
//!
//! Native callers are played by raw slot calls: read the vtable pointer at
//! the block's start, index the flattened slot and call the function pointer
//! directly, exactly as foreign code would.

use std::ffi::c_void;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use combridge::{
    ComObject, ComPtr, Guid, HResult, IID_IUNKNOWN, IUnknown, IUnknownImpl, Interface,
    InterfaceExt, RefCount, com_interface, wrap_managed, wrap_native,
};

#[com_interface("1d8a1f34-6c2b-4e7d-9b0a-5f3c82d4e911")]
pub trait ICounter {
    fn get_value(&self) -> i32;
    fn set_value(&self, value: i32) -> HResult;
}

#[com_interface("7f4e2a09-91bd-47c3-8a55-0d6b9c13f7a2", extends(ICounter))]
pub trait IResettable {
    fn reset(&self) -> HResult;
}

#[com_interface("e0c91f7b-4d26-4a38-b1c5-7a88f2e30d64")]
pub trait IUnsupported {
    fn unavailable(&self) -> i32;
}

struct Counter {
    refs: RefCount,
    value: AtomicI32,
    dropped: Arc<AtomicU32>,
}

impl Counter {
    fn new(dropped: Arc<AtomicU32>) -> Self {
        Self {
            refs: RefCount::new(),
            value: AtomicI32::new(0),
            dropped,
        }
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

impl IUnknownImpl for Counter {
    fn ref_count(&self) -> &RefCount {
        &self.refs
    }
}

impl ICounterImpl for Counter {
    fn get_value(&self) -> i32 {
        self.value.load(Ordering::Relaxed)
    }

    fn set_value(&self, value: i32) -> HResult {
        self.value.store(value, Ordering::Relaxed);
        HResult::OK
    }
}

impl IResettableImpl for Counter {
    fn reset(&self) -> HResult {
        self.value.store(0, Ordering::Relaxed);
        HResult::OK
    }
}

/// Raw slot at flattened index, as a native caller would resolve it.
unsafe fn slot(raw: *mut c_void, index: usize) -> *const c_void {
    let ptr = unsafe { ComPtr::from_raw(raw, false) }.expect("live block");
    unsafe { ptr.slot(index) }
}

#[test]
fn raw_slot_calls_reach_the_implementation() {
    let dropped = Arc::new(AtomicU32::new(0));
    let exposed = wrap_managed::<ICounter, _>(Counter::new(dropped));
    let raw = exposed.as_raw();

    // Slots 0..3 are the root methods; declared methods follow.
    assert_eq!(ICOUNTER_DESC.slot_of("get_value"), Some(3));
    assert_eq!(ICOUNTER_DESC.slot_of("set_value"), Some(4));

    let set_value: unsafe extern "system" fn(*mut c_void, i32) -> HResult =
        unsafe { mem::transmute(slot(raw, 4)) };
    let get_value: unsafe extern "system" fn(*mut c_void) -> i32 =
        unsafe { mem::transmute(slot(raw, 3)) };

    assert_eq!(unsafe { set_value(raw, 7) }, HResult::OK);
    assert_eq!(unsafe { get_value(raw) }, 7);
}

#[test]
fn derived_interface_appends_its_slots() {
    let dropped = Arc::new(AtomicU32::new(0));
    let exposed = wrap_managed::<IResettable, _>(Counter::new(dropped));
    let raw = exposed.as_raw();

    let set_value: unsafe extern "system" fn(*mut c_void, i32) -> HResult =
        unsafe { mem::transmute(slot(raw, 4)) };
    let reset: unsafe extern "system" fn(*mut c_void) -> HResult =
        unsafe { mem::transmute(slot(raw, 5)) };
    let get_value: unsafe extern "system" fn(*mut c_void) -> i32 =
        unsafe { mem::transmute(slot(raw, 3)) };

    assert_eq!(unsafe { set_value(raw, 9) }, HResult::OK);
    assert_eq!(unsafe { reset(raw) }, HResult::OK);
    assert_eq!(unsafe { get_value(raw) }, 0);
}

#[test]
fn query_interface_answers_the_descriptor_chain() {
    let dropped = Arc::new(AtomicU32::new(0));
    let exposed = wrap_managed::<IResettable, _>(Counter::new(dropped));
    let proxy = exposed.to_interface();

    // The root and every level of the base chain resolve to the same block.
    let unknown: IUnknown = proxy.cast().expect("root always answers");
    let counter: ICounter = proxy.cast().expect("base level answers");
    assert_eq!(unknown.com_ptr().as_raw(), exposed.as_raw());
    assert_eq!(unsafe { counter.set_value(3) }, HResult::OK);
    assert_eq!(unsafe { counter.get_value() }, 3);

    let probe = proxy.try_cast::<IUnsupported>().expect("probe never raises on a no");
    assert!(probe.is_none());
}

#[test]
fn query_interface_rejects_null_arguments() {
    let dropped = Arc::new(AtomicU32::new(0));
    let exposed = wrap_managed::<ICounter, _>(Counter::new(dropped));
    let raw = exposed.as_raw();

    let query: unsafe extern "system" fn(*mut c_void, *const Guid, *mut *mut c_void) -> HResult =
        unsafe { mem::transmute(slot(raw, 0)) };

    let mut out: *mut c_void = std::ptr::null_mut();
    assert_eq!(
        unsafe { query(raw, std::ptr::null(), &mut out) },
        HResult::INVALID_ARG
    );
    assert_eq!(
        unsafe { query(raw, &IID_IUNKNOWN, std::ptr::null_mut()) },
        HResult::INVALID_ARG
    );
}

#[test]
fn implementation_lives_until_the_last_reference() {
    let dropped = Arc::new(AtomicU32::new(0));
    let exposed: ComObject<ICounter> = ComObject::new(Counter::new(dropped.clone()));

    let second_owner = exposed.clone();
    let proxy = exposed.to_interface();

    drop(exposed);
    drop(second_owner);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);
    assert_eq!(unsafe { proxy.get_value() }, 0);

    drop(proxy);
    assert_eq!(dropped.load(Ordering::Relaxed), 1);
}

#[test]
fn handed_out_pointer_carries_its_own_reference() {
    let dropped = Arc::new(AtomicU32::new(0));
    let exposed = wrap_managed::<ICounter, _>(Counter::new(dropped.clone()));

    let raw = exposed.as_raw_with_ref();
    drop(exposed);
    assert_eq!(dropped.load(Ordering::Relaxed), 0);

    // The receiver wraps the pointer and its reference; dropping the proxy
    // is the matching release.
    let counter: ICounter = unsafe { wrap_native(raw, true) }.expect("non-null");
    assert_eq!(unsafe { counter.get_value() }, 0);
    drop(counter);
    assert_eq!(dropped.load(Ordering::Relaxed), 1);
}
