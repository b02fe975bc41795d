//! Descriptor marshaling helpers.
//!
//! Native entry points take argument lists and name/value define tables as
//! pointer-plus-count pairs of NUL-terminated strings. These helpers own the
//! NUL-terminated storage and expose stable pointers for the duration of the
//! call; the read-back paths exist so round trips can be verified exactly.

use std::ffi::{CStr, CString, c_char};

use crate::result::Result;

/// An argument list marshaled as `*const *const c_char` plus a count.
///
/// The pointers stay valid while the list is alive; native code must not
/// retain them past the call.
#[derive(Debug)]
pub struct StringList {
    storage: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl StringList {
    /// Fails on interior NUL bytes, which cannot cross the boundary.
    pub fn new<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> Result<Self> {
        let storage = items
            .into_iter()
            .map(|s| CString::new(s.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let ptrs = storage.iter().map(|s| s.as_ptr()).collect();
        Ok(Self { storage, ptrs })
    }

    #[must_use]
    pub fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Read a pointer-plus-count list back into owned strings.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` valid NUL-terminated strings (any `ptr` is
    /// accepted for `len == 0`).
    #[must_use]
    pub unsafe fn read_back(ptr: *const *const c_char, len: usize) -> Vec<String> {
        (0..len)
            .map(|i| {
                let entry = unsafe { *ptr.add(i) };
                unsafe { CStr::from_ptr(entry) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

/// One name/value pair in a native define table.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeDefine {
    pub name: *const c_char,
    pub value: *const c_char,
}

/// A define table marshaled as `*const NativeDefine` plus a count.
///
/// A define without a value crosses as a null value pointer.
pub struct DefineList {
    storage: Vec<(CString, Option<CString>)>,
    entries: Vec<NativeDefine>,
}

impl DefineList {
    pub fn new<N, V>(defines: impl IntoIterator<Item = (N, Option<V>)>) -> Result<Self>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let storage = defines
            .into_iter()
            .map(|(name, value)| {
                let name = CString::new(name.as_ref())?;
                let value = value.map(|v| CString::new(v.as_ref())).transpose()?;
                Ok((name, value))
            })
            .collect::<Result<Vec<_>>>()?;
        let entries = storage
            .iter()
            .map(|(name, value)| NativeDefine {
                name: name.as_ptr(),
                value: value.as_ref().map_or(std::ptr::null(), |v| v.as_ptr()),
            })
            .collect();
        Ok(Self { storage, entries })
    }

    #[must_use]
    pub fn as_ptr(&self) -> *const NativeDefine {
        self.entries.as_ptr()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Read a native define table back into owned pairs.
    ///
    /// # Safety
    ///
    /// `ptr` must point to `len` valid entries whose name pointers are
    /// NUL-terminated strings and whose value pointers are either null or
    /// NUL-terminated strings.
    #[must_use]
    pub unsafe fn read_back(
        ptr: *const NativeDefine,
        len: usize,
    ) -> Vec<(String, Option<String>)> {
        (0..len)
            .map(|i| {
                let entry = unsafe { &*ptr.add(i) };
                let name = unsafe { CStr::from_ptr(entry.name) }
                    .to_string_lossy()
                    .into_owned();
                let value = if entry.value.is_null() {
                    None
                } else {
                    Some(
                        unsafe { CStr::from_ptr(entry.value) }
                            .to_string_lossy()
                            .into_owned(),
                    )
                };
                (name, value)
            })
            .collect()
    }
}
