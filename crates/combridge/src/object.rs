//! Managed-backed synthetic objects: the native view over a Rust object.
//!
//! [`ComObject::new`] allocates one heap block per exposed object:
//!
//! ```text
//! [ vtable pointer | opaque handle | thunk slot table ]
//!         |                              ^
//!         +------------------------------+
//! ```
//!
//! Native code receives the block's address and calls through the slot
//! table like any other COM object. Each slot is a monomorphized
//! `extern "system"` thunk that reads the opaque handle next to the vtable
//! pointer, resolves the backing implementation through the anchor table
//! and forwards into a plain trait-method call, dropping the implicit
//! `this` argument on the way in.
//!
//! The block is freed exactly once, inside `Release` when the count the
//! implementation carries reaches zero; freeing also releases the anchor.
//! There is no other deallocation path, so a live native pointer can never
//! observe a freed block short of the native side miscounting.

use std::any::type_name;
use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::handles::{self, RawHandle};
use crate::proxy::{ComPtr, Interface};
use crate::unknown::IUnknownVtable;

/// Atomic reference counter carried by implementations exposed to native
/// code. Starts at 1: the bridge-side owner holds the first reference.
#[repr(transparent)]
pub struct RefCount(AtomicU32);

impl RefCount {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU32::new(1))
    }

    /// Increment; returns the new count.
    #[inline]
    pub fn add_ref(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement; returns the new count. At zero the caller tears the
    /// object down (after an acquire fence).
    #[inline]
    pub fn release(&self) -> u32 {
        self.0.fetch_sub(1, Ordering::Release) - 1
    }

    #[inline]
    #[must_use]
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

/// Contract for implementations exposed to native code.
///
/// The implementation owns its reference count; the bridge's base thunks
/// drive it through [`IUnknownImpl::ref_count`]. Implementations shared
/// across native threads get thread safety from the atomic counter and the
/// `Send + Sync` bound.
pub trait IUnknownImpl: std::any::Any + Send + Sync {
    /// The counter backing `AddRef`/`Release` for this object.
    fn ref_count(&self) -> &RefCount;

    /// Extra identities to answer `QueryInterface` for, beyond `IUnknown`
    /// and the exposed interface's base chain. A `true` answer hands out
    /// the same pointer, so it is only correct for interfaces whose vtable
    /// is a prefix of the exposed one.
    fn supports(&self, iid: &crate::Guid) -> bool {
        let _ = iid;
        false
    }
}

/// Links an interface to the thunk table for a concrete implementation.
///
/// Implemented by `#[com_interface]` for every `T` implementing the
/// interface's `{Name}Impl` trait; the table is built at compile time, once
/// per (interface, implementation) pair.
///
/// # Safety
///
/// `VTABLE` entries must forward slot `k` to the method at flattened
/// position `k` of `Self::DESC`, for every `k`.
pub unsafe trait InterfaceVtable<T>: Interface {
    const VTABLE: Self::Vtable;
}

/// Header shared by every synthetic block, whatever the interface.
#[repr(C)]
struct SyntheticHeader {
    vtable: *const c_void,
    handle: RawHandle,
}

/// The per-object heap block: header plus the inline slot table.
#[repr(C)]
pub(crate) struct ComBox<D: Interface> {
    vtable: *const D::Vtable,
    handle: RawHandle,
    slots: D::Vtable,
}

impl<D: Interface> ComBox<D> {
    fn allocate(handle: RawHandle, slots: D::Vtable) -> NonNull<c_void> {
        let block = Box::into_raw(Box::new(ComBox::<D> {
            vtable: std::ptr::null(),
            handle,
            slots,
        }));
        unsafe {
            (*block).vtable = &raw const (*block).slots;
        }
        // Box never hands out null.
        unsafe { NonNull::new_unchecked(block as *mut c_void) }
    }

    /// Free the block and unpin its handle. Called exactly once, from the
    /// `Release` thunk at count zero.
    ///
    /// # Safety
    ///
    /// `this` must be a block allocated for `D` that no native caller will
    /// touch again.
    pub(crate) unsafe fn destroy(this: *mut c_void) {
        let block = unsafe { Box::from_raw(this as *mut ComBox<D>) };
        handles::release(block.handle);
    }
}

/// Recover the backing implementation behind a synthetic `this` pointer.
///
/// The returned [`Arc`] keeps the implementation alive for the duration of
/// the call even if the last native reference drops concurrently.
///
/// Panics if the handle was already released (a native use-after-release,
/// which the bridge cannot repair) or if the block was built for another
/// implementation type.
///
/// # Safety
///
/// `this` must point to a live synthetic block produced by this bridge.
pub unsafe fn recover<T: IUnknownImpl>(this: *mut c_void) -> Arc<T> {
    let header = unsafe { &*(this as *const SyntheticHeader) };
    let object = handles::resolve(header.handle)
        .unwrap_or_else(|| panic!("synthetic object at {this:p} used after release"));
    object
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("synthetic object at {this:p} is not a {}", type_name::<T>()))
}

/// Owner of a synthetic object exposing implementation `T` as interface `I`.
///
/// Holds one native reference; dropping the owner releases it, and the
/// block survives for as long as native holders keep their own references.
pub struct ComObject<I: Interface> {
    ptr: NonNull<c_void>,
    _interface: PhantomData<fn() -> I>,
}

// The block is only reached through extern thunks over an anchored
// Send + Sync implementation.
unsafe impl<I: Interface> Send for ComObject<I> {}
unsafe impl<I: Interface> Sync for ComObject<I> {}

impl<I: Interface> ComObject<I> {
    /// Build a synthetic vtable block backed by `value`.
    ///
    /// The `I: InterfaceVtable<T>` bound is the completeness check: a type
    /// missing any flattened method of `I` does not satisfy the `Impl`
    /// trait and fails to compile.
    pub fn new<T>(value: T) -> Self
    where
        I: InterfaceVtable<T>,
        T: IUnknownImpl,
    {
        let handle = handles::anchor(Arc::new(value));
        let ptr = ComBox::<I>::allocate(handle, <I as InterfaceVtable<T>>::VTABLE);
        tracing::debug!(
            interface = I::DESC.name,
            implementation = type_name::<T>(),
            ptr = ?ptr.as_ptr(),
            "exposed managed object"
        );
        Self {
            ptr,
            _interface: PhantomData,
        }
    }

    /// The pointer to hand to native code.
    ///
    /// Borrowed: the owner's reference keeps it alive. A native callee that
    /// stores the pointer must take its own reference via `AddRef`.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// Hand out a pointer carrying its own native reference; the owner stays
    /// intact and the receiver is responsible for the matching `Release`.
    #[must_use]
    pub fn as_raw_with_ref(&self) -> *mut c_void {
        unsafe {
            (self.unknown().add_ref)(self.ptr.as_ptr());
        }
        self.ptr.as_ptr()
    }

    /// View the synthetic object through its own proxy side, as any
    /// interface it answers `QueryInterface` for.
    pub fn to_interface(&self) -> I {
        unsafe {
            (self.unknown().add_ref)(self.ptr.as_ptr());
            let ptr = ComPtr::from_raw(self.ptr.as_ptr(), true).expect("block pointer is non-null");
            I::from_com_ptr(ptr)
        }
    }

    fn unknown(&self) -> &IUnknownVtable {
        unsafe { &**(self.ptr.as_ptr() as *const *const IUnknownVtable) }
    }
}

impl<I: Interface> Clone for ComObject<I> {
    fn clone(&self) -> Self {
        unsafe {
            (self.unknown().add_ref)(self.ptr.as_ptr());
        }
        Self {
            ptr: self.ptr,
            _interface: PhantomData,
        }
    }
}

impl<I: Interface> Drop for ComObject<I> {
    fn drop(&mut self) {
        unsafe {
            (self.unknown().release)(self.ptr.as_ptr());
        }
    }
}

impl<I: Interface> std::fmt::Debug for ComObject<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComObject<{}>({:p})", I::DESC.name, self.ptr.as_ptr())
    }
}

/// Expose a managed object to native code as interface `I`.
///
/// Shorthand for [`ComObject::new`].
pub fn wrap_managed<I, T>(value: T) -> ComObject<I>
where
    I: InterfaceVtable<T>,
    T: IUnknownImpl,
{
    ComObject::new(value)
}
