//! Process-wide identity and layout caches.
//!
//! Both caches are populated lazily and never evicted. First use from
//! multiple threads is serialized by the write lock with a double check, so
//! exactly one generation pass wins and the others observe its result.
//! Dispatch through already-resolved layouts takes no lock.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::descriptor::{InterfaceDesc, MethodDesc};
use crate::guid::Guid;
use crate::proxy::Interface;

fn identities() -> &'static RwLock<HashMap<TypeId, Guid>> {
    static IDENTITIES: OnceLock<RwLock<HashMap<TypeId, Guid>>> = OnceLock::new();
    IDENTITIES.get_or_init(|| RwLock::new(HashMap::new()))
}

fn layouts() -> &'static RwLock<HashMap<usize, &'static [&'static MethodDesc]>> {
    static LAYOUTS: OnceLock<RwLock<HashMap<usize, &'static [&'static MethodDesc]>>> =
        OnceLock::new();
    LAYOUTS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Identity of an interface type, memoized for the process lifetime.
///
/// Returns [`Guid::ZERO`] for interfaces declared without an identity;
/// callers performing identity-based queries must fail on the nil value
/// rather than match it.
#[must_use]
pub fn uuid_of<I: Interface>() -> Guid {
    let key = TypeId::of::<I>();
    if let Some(iid) = identities().read().expect("identity cache poisoned").get(&key) {
        return *iid;
    }
    let mut map = identities().write().expect("identity cache poisoned");
    *map.entry(key).or_insert_with(|| {
        tracing::trace!(interface = I::DESC.name, iid = %I::IID, "registered interface identity");
        I::IID
    })
}

/// Flattened method layout of an interface, computed once and cached.
///
/// The slice lives for the process lifetime; repeated calls for the same
/// descriptor return the identical slice.
#[must_use]
pub fn layout_of(desc: &'static InterfaceDesc) -> &'static [&'static MethodDesc] {
    let key = desc as *const InterfaceDesc as usize;
    if let Some(layout) = layouts().read().expect("layout cache poisoned").get(&key) {
        return layout;
    }
    let mut map = layouts().write().expect("layout cache poisoned");
    // Double check: another thread may have resolved it while we waited.
    if let Some(layout) = map.get(&key) {
        return layout;
    }
    let layout: &'static [&'static MethodDesc] = Box::leak(desc.flatten().into_boxed_slice());
    tracing::trace!(
        interface = desc.name,
        slots = layout.len(),
        "resolved vtable layout"
    );
    map.insert(key, layout);
    layout
}
