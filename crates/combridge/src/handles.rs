//! Opaque handle table anchoring implementations exposed to native code.
//!
//! A synthetic vtable block stores only an integer token, never a reference
//! to the implementation; the token resolves through this table. Anchoring
//! pins the implementation for as long as the token is live, so the backing
//! storage can be shared or dropped without the native side ever holding a
//! dangling address into managed memory.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

/// Opaque token locating an anchored implementation.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RawHandle(u64);

type Anchored = Arc<dyn Any + Send + Sync>;

fn table() -> &'static RwLock<HashMap<u64, Anchored>> {
    static TABLE: OnceLock<RwLock<HashMap<u64, Anchored>>> = OnceLock::new();
    TABLE.get_or_init(|| RwLock::new(HashMap::new()))
}

fn next_handle() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Pin an implementation and hand back the token that locates it.
pub fn anchor(object: Anchored) -> RawHandle {
    let id = next_handle();
    table()
        .write()
        .expect("handle table poisoned")
        .insert(id, object);
    tracing::trace!(handle = id, "anchored implementation");
    RawHandle(id)
}

/// Resolve a token to its anchored implementation, sharing ownership for
/// the duration of the caller's use. `None` once the token was released.
#[must_use]
pub fn resolve(handle: RawHandle) -> Option<Anchored> {
    table()
        .read()
        .expect("handle table poisoned")
        .get(&handle.0)
        .cloned()
}

/// Unpin a token. The implementation drops once the last outstanding
/// [`resolve`] clone goes away. Returns whether the token was live.
pub fn release(handle: RawHandle) -> bool {
    let removed = table()
        .write()
        .expect("handle table poisoned")
        .remove(&handle.0)
        .is_some();
    if removed {
        tracing::trace!(handle = handle.0, "released implementation anchor");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_resolve_release() {
        let handle = anchor(Arc::new(41_i32));
        let value = resolve(handle).expect("live handle");
        assert_eq!(*value.downcast::<i32>().expect("anchored an i32"), 41);
        assert!(release(handle));
        assert!(resolve(handle).is_none());
        assert!(!release(handle));
    }

    #[test]
    fn handles_are_unique() {
        let a = anchor(Arc::new(()));
        let b = anchor(Arc::new(()));
        assert_ne!(a, b);
        release(a);
        release(b);
    }
}
