//! Bidirectional COM-style vtable bridge.
//!
//! Native libraries following the COM convention hand out objects as a
//! pointer to a table of function pointers, with `QueryInterface`, `AddRef`
//! and `Release` always in the first three slots and interfaces identified
//! by 128-bit UUIDs. This crate generates call-compatible dispatch in both
//! directions:
//!
//! - **Native → managed**: [`wrap_native`] turns a raw vtable-bearing
//!   pointer into a typed proxy with reference-counted lifetime and
//!   `QueryInterface`-based casts ([`InterfaceExt::cast`],
//!   [`InterfaceExt::try_cast`]).
//! - **Managed → native**: [`wrap_managed`] builds a synthetic vtable block
//!   backed by a Rust object, callable from native code like any other COM
//!   object.
//!
//! Interfaces are declared once with the [`com_interface`] attribute:
//!
//! ```ignore
//! use combridge::{HResult, com_interface};
//!
//! #[com_interface("b7e61d2f-3a84-4c11-9d52-88e1a0c3f604")]
//! pub trait ICounter {
//!     fn get_value(&self) -> i32;
//!     fn set_value(&self, value: i32) -> HResult;
//! }
//!
//! // Native → managed:
//! let counter: ICounter = unsafe { combridge::wrap_native(raw, true)? };
//! let value = unsafe { counter.get_value() };
//!
//! // Managed → native:
//! let exposed = combridge::wrap_managed::<ICounter, _>(MyCounter::default());
//! give_to_native(exposed.as_raw());
//! ```
//!
//! Boundary calls are synchronous and block the calling thread; there is no
//! cancellation. Statuses cross the boundary as [`HResult`] values and are
//! raised as [`Error`] only at the managed seam.

pub mod descriptor;
pub mod guid;
pub mod handles;
pub mod marshal;
pub mod object;
pub mod proxy;
pub mod registry;
pub mod result;
pub mod unknown;

pub use combridge_macro::com_interface;
pub use descriptor::{InterfaceDesc, MethodDesc};
pub use guid::Guid;
pub use object::{ComObject, IUnknownImpl, InterfaceVtable, RefCount, wrap_managed};
pub use proxy::{ComPtr, Interface, InterfaceExt, wrap_native};
pub use result::{Error, HResult, Result};
pub use unknown::{IID_IUNKNOWN, IUnknown, IUnknownVtable};
