//! Demo: both dispatch directions through one boundary call.
//!
//! A hand-rolled "native" compiler object stands in for a foreign library:
//! a heap block with a static vtable, reference counted, COM-convention
//! slots. The managed side wraps it in a typed proxy, hands it a managed
//! include resolver exposed through a synthetic vtable, and drives a
//! compile call that bounces through both directions:
//!
//! ```text
//! proxy.compile()  ──►  native compiler  ──►  resolver.resolve()
//!   (managed → native slot call)   (native → managed thunk call)
//! ```

use std::collections::HashMap;
use std::ffi::{CStr, c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use combridge::marshal::{DefineList, NativeDefine, StringList};
use combridge::{
    Guid, HResult, IID_IUNKNOWN, IUnknownImpl, IUnknownVtable, InterfaceExt, RefCount,
    com_interface, wrap_managed, wrap_native,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// =============================================================================
// Interface declarations — shared by both sides
// =============================================================================

/// Callback the native compiler uses to resolve `#include` paths against
/// managed source storage.
#[com_interface("8c3f0a52-29e4-4b6f-9d17-c05ab43f8e21")]
pub trait IIncludeHandler {
    fn resolve(&self, path: *const c_char, out_size: *mut usize) -> HResult;
}

#[com_interface("3b9d64c1-7e08-49a2-b5d3-1f2ac0e87d55")]
pub trait ICompiler {
    fn compile(
        &self,
        args: *const *const c_char,
        arg_count: usize,
        defines: *const NativeDefine,
        define_count: usize,
        includes: *mut c_void,
    ) -> HResult;
    fn diagnostic(&self) -> *const c_char;
}

// =============================================================================
// "Native" side: a compiler object with a static vtable
// =============================================================================

#[repr(C)]
struct NativeCompiler {
    vtable: *const ICompilerVtable,
    refs: AtomicU32,
}

unsafe extern "system" fn query_interface(
    this: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    let iid = unsafe { &*iid };
    if *iid == IID_IUNKNOWN || *iid == IID_ICOMPILER {
        unsafe { add_ref(this) };
        unsafe { *out = this };
        HResult::OK
    } else {
        unsafe { *out = ptr::null_mut() };
        HResult::NO_INTERFACE
    }
}

unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    let compiler = unsafe { &*(this as *const NativeCompiler) };
    compiler.refs.fetch_add(1, Ordering::Relaxed) + 1
}

unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let compiler = unsafe { &*(this as *const NativeCompiler) };
    let remaining = compiler.refs.fetch_sub(1, Ordering::Release) - 1;
    if remaining == 0 {
        drop(unsafe { Box::from_raw(this as *mut NativeCompiler) });
    }
    remaining
}

unsafe extern "system" fn compile(
    _this: *mut c_void,
    args: *const *const c_char,
    arg_count: usize,
    _defines: *const NativeDefine,
    define_count: usize,
    includes: *mut c_void,
) -> HResult {
    if includes.is_null() || (args.is_null() && arg_count > 0) {
        return HResult::INVALID_ARG;
    }
    if define_count == 0 {
        return HResult::INTERNAL_FAIL;
    }

    // The native side resolves its includes through the callback's vtable,
    // knowing nothing about what backs it.
    let vtable = unsafe { *(includes as *const *const IIncludeHandlerVtable) };
    let mut size = 0usize;
    let status = unsafe {
        ((*vtable).resolve)(includes, c"lighting/common.hlsl".as_ptr(), &mut size)
    };
    if status.is_failure() {
        return status;
    }
    info!(include_bytes = size, "native compiler resolved its include");
    HResult::OK
}

unsafe extern "system" fn diagnostic(_this: *mut c_void) -> *const c_char {
    c"no preprocessor defines given; refusing to guess a profile".as_ptr()
}

static COMPILER_VTABLE: ICompilerVtable = ICompilerVtable {
    base: IUnknownVtable {
        query_interface,
        add_ref,
        release,
    },
    compile,
    diagnostic,
};

impl NativeCompiler {
    fn spawn() -> *mut c_void {
        Box::into_raw(Box::new(NativeCompiler {
            vtable: &COMPILER_VTABLE,
            refs: AtomicU32::new(1),
        })) as *mut c_void
    }
}

// =============================================================================
// Managed side: an include resolver exposed to native code
// =============================================================================

struct SourceResolver {
    refs: RefCount,
    sources: HashMap<String, String>,
    hits: AtomicU32,
}

impl SourceResolver {
    fn new(sources: impl IntoIterator<Item = (&'static str, &'static str)>) -> Self {
        Self {
            refs: RefCount::new(),
            sources: sources
                .into_iter()
                .map(|(path, text)| (path.to_string(), text.to_string()))
                .collect(),
            hits: AtomicU32::new(0),
        }
    }
}

impl IUnknownImpl for SourceResolver {
    fn ref_count(&self) -> &RefCount {
        &self.refs
    }
}

impl IIncludeHandlerImpl for SourceResolver {
    fn resolve(&self, path: *const c_char, out_size: *mut usize) -> HResult {
        if path.is_null() || out_size.is_null() {
            return HResult::INVALID_ARG;
        }
        let path = unsafe { CStr::from_ptr(path) }.to_string_lossy();
        match self.sources.get(path.as_ref()) {
            Some(text) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                info!(path = %path, "resolved include from managed storage");
                unsafe { *out_size = text.len() };
                HResult::OK
            }
            None => HResult::NOT_FOUND,
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

fn main() -> combridge::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let compiler: ICompiler = unsafe { wrap_native(NativeCompiler::spawn(), true) }?;
    info!(?compiler, "wrapped the native compiler");

    let resolver = wrap_managed::<IIncludeHandler, _>(SourceResolver::new([(
        "lighting/common.hlsl",
        "float3 lambert(float3 n, float3 l) { return saturate(dot(n, l)); }",
    )]));

    let args = StringList::new(["-O2", "-T", "ps_5_0"])?;
    let defines = DefineList::new([("DEBUG", Some("1")), ("USE_HALF", None)])?;

    let status = unsafe {
        compiler.compile(
            args.as_ptr(),
            args.len(),
            defines.as_ptr(),
            defines.len(),
            resolver.as_raw(),
        )
    };
    status.ok()?;
    info!("compile round trip succeeded");

    // Failure path: the compiler reports an internal failure and the proxy
    // side pulls its diagnostic text across the boundary.
    let status = unsafe {
        compiler.compile(args.as_ptr(), args.len(), ptr::null(), 0, resolver.as_raw())
    };
    let err = status
        .ok_with_diagnostic(|| {
            let text = unsafe { compiler.diagnostic() };
            (!text.is_null())
                .then(|| unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned())
        })
        .expect_err("compile without defines reports an internal failure");
    info!(%err, "diagnostic crossed the boundary");

    // Capability probe: this compiler does not answer for the callback
    // interface, and the probe reports that as a plain no.
    assert!(compiler.try_cast::<IIncludeHandler>()?.is_none());

    Ok(())
}
