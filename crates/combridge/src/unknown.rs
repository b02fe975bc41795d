//! The root interface: `QueryInterface`, `AddRef`, `Release` at slots 0..3.

use std::ffi::c_void;
use std::sync::atomic::{Ordering, fence};

use crate::descriptor::{InterfaceDesc, MethodDesc};
use crate::guid::Guid;
use crate::object::{ComBox, IUnknownImpl, recover};
use crate::proxy::{ComPtr, Interface};
use crate::result::HResult;

/// Identity of the root interface.
pub const IID_IUNKNOWN: Guid = Guid::new(
    0x00000000,
    0x0000,
    0x0000,
    [0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

/// Descriptor for the root interface; every bridged interface chains to it.
pub static IUNKNOWN_DESC: InterfaceDesc = InterfaceDesc {
    name: "IUnknown",
    iid: IID_IUNKNOWN,
    base: None,
    methods: &[
        MethodDesc {
            name: "query_interface",
        },
        MethodDesc { name: "add_ref" },
        MethodDesc { name: "release" },
    ],
};

/// Vtable of the root interface. Every bridged vtable embeds this as its
/// first field, so any object pointer can be driven through it.
#[repr(C)]
pub struct IUnknownVtable {
    pub query_interface:
        unsafe extern "system" fn(*mut c_void, *const Guid, *mut *mut c_void) -> HResult,
    pub add_ref: unsafe extern "system" fn(*mut c_void) -> u32,
    pub release: unsafe extern "system" fn(*mut c_void) -> u32,
}

/// Proxy over a native object viewed as the root interface.
#[repr(transparent)]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct IUnknown(ComPtr);

unsafe impl Interface for IUnknown {
    type Vtable = IUnknownVtable;
    const IID: Guid = IID_IUNKNOWN;
    const DESC: &'static InterfaceDesc = &IUNKNOWN_DESC;

    unsafe fn from_com_ptr(ptr: ComPtr) -> Self {
        Self(ptr)
    }

    fn com_ptr(&self) -> &ComPtr {
        &self.0
    }
}

impl IUnknown {
    /// Query for another interface by identity.
    ///
    /// # Safety
    ///
    /// `iid` must point to a valid [`Guid`] and `out` to a writable pointer
    /// slot. Prefer [`crate::InterfaceExt::try_cast`] for the safe form.
    pub unsafe fn query_interface(
        &self,
        iid: *const Guid,
        out: *mut *mut c_void,
    ) -> HResult {
        unsafe { (self.0.vtable::<IUnknownVtable>().query_interface)(self.0.as_raw(), iid, out) }
    }

    /// Increment the native reference count. Returns the new count.
    ///
    /// # Safety
    ///
    /// The underlying object must still be alive.
    pub unsafe fn add_ref(&self) -> u32 {
        unsafe { (self.0.vtable::<IUnknownVtable>().add_ref)(self.0.as_raw()) }
    }

    /// Decrement the native reference count. Returns the new count; the
    /// object is gone once this reaches zero.
    ///
    /// # Safety
    ///
    /// The caller must own the reference being released and must not use
    /// the pointer again if zero is returned.
    pub unsafe fn release(&self) -> u32 {
        unsafe { (self.0.vtable::<IUnknownVtable>().release)(self.0.as_raw()) }
    }
}

impl std::fmt::Debug for IUnknown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IUnknown({:p})", self.0.as_raw())
    }
}

impl IUnknownVtable {
    /// Thunk table for the three root slots of a synthetic object.
    ///
    /// `D` is the most-derived interface the object is exposed as: its
    /// descriptor chain answers `QueryInterface` and its vtable type sizes
    /// the block freed on final release. `T` is the backing implementation.
    pub const fn new<D, T>() -> Self
    where
        D: Interface,
        T: IUnknownImpl,
    {
        unsafe extern "system" fn query_interface<D: Interface, T: IUnknownImpl>(
            this: *mut c_void,
            iid: *const Guid,
            out: *mut *mut c_void,
        ) -> HResult {
            if iid.is_null() || out.is_null() {
                return HResult::INVALID_ARG;
            }
            let object = unsafe { recover::<T>(this) };
            let iid = unsafe { &*iid };
            let mut matched = *iid == IID_IUNKNOWN;
            let mut desc = Some(D::DESC);
            while let Some(level) = desc {
                if matched {
                    break;
                }
                matched = !level.iid.is_zero() && level.iid == *iid;
                desc = level.base;
            }
            if !matched {
                matched = object.supports(iid);
            }
            if matched {
                object.ref_count().add_ref();
                unsafe { *out = this };
                HResult::OK
            } else {
                unsafe { *out = std::ptr::null_mut() };
                HResult::NO_INTERFACE
            }
        }

        unsafe extern "system" fn add_ref<T: IUnknownImpl>(this: *mut c_void) -> u32 {
            unsafe { recover::<T>(this) }.ref_count().add_ref()
        }

        unsafe extern "system" fn release<D: Interface, T: IUnknownImpl>(
            this: *mut c_void,
        ) -> u32 {
            let object = unsafe { recover::<T>(this) };
            let remaining = object.ref_count().release();
            if remaining == 0 {
                // Synchronize with every preceding release before teardown.
                fence(Ordering::Acquire);
                drop(object);
                tracing::trace!(interface = D::DESC.name, ptr = ?this, "freeing synthetic object");
                unsafe { ComBox::<D>::destroy(this) };
            }
            remaining
        }

        Self {
            query_interface: query_interface::<D, T>,
            add_ref: add_ref::<T>,
            release: release::<D, T>,
        }
    }
}
