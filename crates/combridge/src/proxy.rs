//! Native-backed proxies: the managed view over a raw COM object pointer.
//!
//! A proxy is a `#[repr(transparent)]` wrapper (generated by
//! `#[com_interface]`) around a [`ComPtr`]: the stored object pointer plus a
//! flag saying whether the proxy participates in reference counting. Every
//! generated method body does the same dance: load the stored pointer,
//! dereference it to reach the vtable base, pick the typed slot and call the
//! function pointer with the object pointer as the implicit first argument.
//!
//! Identity is the raw pointer, never the wrapper type: two proxies wrapping
//! the same pointer compare equal and hash identically, whatever interface
//! view they were created through. The bridge assumes the native library does
//! not recycle an address for a logically different object while a proxy
//! still holds it; that is a documented precondition, not something the
//! bridge defends against.

use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::ptr::NonNull;

use crate::descriptor::InterfaceDesc;
use crate::guid::Guid;
use crate::result::{Error, HResult, Result};
use crate::unknown::IUnknownVtable;

/// A bridged interface type.
///
/// Implemented by `#[com_interface]` for every generated proxy wrapper.
///
/// # Safety
///
/// `Vtable` must be `#[repr(C)]` and begin with [`IUnknownVtable`] (directly
/// or through its base chain), `DESC` must describe the same method order as
/// `Vtable`, and `Self` must be `#[repr(transparent)]` over [`ComPtr`].
pub unsafe trait Interface: Sized + 'static {
    /// The typed vtable this interface dispatches through.
    type Vtable: 'static;
    /// Interface identity; [`Guid::ZERO`] if the declaration carried none.
    const IID: Guid;
    /// Runtime descriptor: identity, base chain and declared methods.
    const DESC: &'static InterfaceDesc;

    /// Wrap an untyped pointer without any checking.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live object whose vtable is layout-compatible
    /// with `Self::Vtable`.
    unsafe fn from_com_ptr(ptr: ComPtr) -> Self;

    /// The stored pointer core.
    fn com_ptr(&self) -> &ComPtr;
}

/// Untyped core of every proxy: the native object pointer and the
/// reference-counting flag.
pub struct ComPtr {
    ptr: NonNull<c_void>,
    track: bool,
}

impl ComPtr {
    /// Take a pointer returned by native code.
    ///
    /// With `track` set, the pointer carries one native reference which is
    /// released when the last clone drops. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live COM object, and with `track`
    /// set the caller must actually own a reference to hand over.
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut c_void, track: bool) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, track })
    }

    /// The stored object pointer.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// Whether drop will issue a `Release`.
    #[inline]
    #[must_use]
    pub fn tracks_ref_count(&self) -> bool {
        self.track
    }

    /// Dereference the stored pointer to the vtable base, viewed as `V`.
    ///
    /// # Safety
    ///
    /// The object's actual vtable must be layout-compatible with `V`.
    #[inline]
    pub unsafe fn vtable<V>(&self) -> &V {
        unsafe { &**(self.ptr.as_ptr() as *const *const V) }
    }

    /// Raw function pointer at flattened slot `index` (pointer-sized stride).
    ///
    /// # Safety
    ///
    /// `index` must be within the object's actual vtable.
    #[must_use]
    pub unsafe fn slot(&self, index: usize) -> *const c_void {
        unsafe {
            let vtable = *(self.ptr.as_ptr() as *const *const *const c_void);
            *vtable.add(index)
        }
    }

    /// Give up ownership without releasing; the caller takes over the
    /// native reference, if any was tracked.
    #[must_use]
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.ptr.as_ptr();
        std::mem::forget(self);
        raw
    }

    #[inline]
    fn unknown(&self) -> &IUnknownVtable {
        // Every bridged vtable begins with the IUnknown slots.
        unsafe { self.vtable::<IUnknownVtable>() }
    }
}

impl Clone for ComPtr {
    fn clone(&self) -> Self {
        if self.track {
            unsafe {
                (self.unknown().add_ref)(self.ptr.as_ptr());
            }
        }
        Self {
            ptr: self.ptr,
            track: self.track,
        }
    }
}

impl Drop for ComPtr {
    fn drop(&mut self) {
        if self.track {
            unsafe {
                (self.unknown().release)(self.ptr.as_ptr());
            }
        }
    }
}

impl PartialEq for ComPtr {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl Eq for ComPtr {}

impl Hash for ComPtr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.as_ptr().hash(state);
    }
}

impl std::fmt::Debug for ComPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ComPtr({:p}, track={})", self.ptr.as_ptr(), self.track)
    }
}

/// Wrap a raw vtable-bearing pointer produced by native code.
///
/// With `track_ref_count` set, the proxy owns one native reference and its
/// drop issues `Release`; pass `false` for borrowed pointers whose lifetime
/// the caller manages. Fails with [`Error::NullPointer`] on null.
///
/// # Safety
///
/// A non-null `ptr` must point to a live object whose vtable layout matches
/// `I`, and the address must not be reused for a different object while the
/// proxy is alive.
pub unsafe fn wrap_native<I: Interface>(ptr: *mut c_void, track_ref_count: bool) -> Result<I> {
    let ptr = unsafe { ComPtr::from_raw(ptr, track_ref_count) }.ok_or(Error::NullPointer)?;
    tracing::trace!(
        interface = I::DESC.name,
        ptr = ?ptr.as_raw(),
        track_ref_count,
        "wrapped native object"
    );
    Ok(unsafe { I::from_com_ptr(ptr) })
}

/// `QueryInterface`-based casts, available on every proxy.
pub trait InterfaceExt: Interface {
    /// Request a differently-typed view of the same underlying object.
    ///
    /// Raises [`Error::NoInterface`] when the object lacks the interface.
    fn cast<T: Interface>(&self) -> Result<T> {
        self.try_cast::<T>()?
            .ok_or(Error::NoInterface(T::DESC.name))
    }

    /// Capability probe: like [`InterfaceExt::cast`], but the "no such
    /// interface" status is the expected negative outcome and yields
    /// `Ok(None)`. Every other failing status still raises.
    fn try_cast<T: Interface>(&self) -> Result<Option<T>> {
        let iid = crate::registry::uuid_of::<T>();
        if iid.is_zero() {
            return Err(Error::MissingIdentity(T::DESC.name));
        }
        let this = self.com_ptr();
        let mut out: *mut c_void = std::ptr::null_mut();
        let status = unsafe { (this.unknown().query_interface)(this.as_raw(), &iid, &mut out) };
        if status == HResult::NO_INTERFACE {
            return Ok(None);
        }
        status.ok()?;
        // QueryInterface granted a reference along with the pointer.
        let ptr = unsafe { ComPtr::from_raw(out, true) }.ok_or(Error::Status {
            status: HResult::FAIL,
        })?;
        Ok(Some(unsafe { T::from_com_ptr(ptr) }))
    }
}

impl<I: Interface> InterfaceExt for I {}
