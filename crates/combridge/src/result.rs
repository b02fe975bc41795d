//! Status codes and the bridge error type.
//!
//! Every boundary call returns a fixed-width status instead of unwinding.
//! The encoding matches the native library's convention: a 32-bit value with
//! the top bit as the failure flag, the next 15 bits as the facility and the
//! low 16 bits as the code, so statuses interoperate byte for byte.

/// 32-bit boundary status. Non-negative means success.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

/// Facility for codes shared with the platform's general error space.
const FACILITY_GENERAL: u16 = 0x0000;
/// Facility for platform API errors carried through unchanged.
const FACILITY_API: u16 = 0x0007;
/// Facility for codes minted by the native component itself.
const FACILITY_CORE: u16 = 0x0200;

const fn make_error(facility: u16, code: u16) -> HResult {
    HResult((((facility as u32) << 16) | (code as u32) | 0x8000_0000) as i32)
}

impl HResult {
    pub const OK: HResult = HResult(0);
    pub const FAIL: HResult = make_error(FACILITY_GENERAL, 0x4005);
    pub const NOT_IMPLEMENTED: HResult = make_error(FACILITY_GENERAL, 0x4001);
    pub const NO_INTERFACE: HResult = make_error(FACILITY_GENERAL, 0x4002);
    pub const ABORT: HResult = make_error(FACILITY_GENERAL, 0x4004);
    pub const INVALID_HANDLE: HResult = make_error(FACILITY_API, 0x0006);
    pub const INVALID_ARG: HResult = make_error(FACILITY_API, 0x0057);
    pub const OUT_OF_MEMORY: HResult = make_error(FACILITY_API, 0x000E);
    pub const BUFFER_TOO_SMALL: HResult = make_error(FACILITY_CORE, 1);
    pub const UNINITIALIZED: HResult = make_error(FACILITY_CORE, 2);
    pub const PENDING: HResult = make_error(FACILITY_CORE, 3);
    pub const CANNOT_OPEN: HResult = make_error(FACILITY_CORE, 4);
    pub const NOT_FOUND: HResult = make_error(FACILITY_CORE, 5);
    pub const INTERNAL_FAIL: HResult = make_error(FACILITY_CORE, 6);
    pub const NOT_AVAILABLE: HResult = make_error(FACILITY_CORE, 7);
    pub const TIME_OUT: HResult = make_error(FACILITY_CORE, 8);

    /// Whether the status indicates success (top bit clear).
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Whether the status indicates failure (top bit set).
    #[inline]
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Facility bits (16..31, sign bit excluded).
    #[inline]
    #[must_use]
    pub const fn facility(self) -> u16 {
        ((self.0 as u32 >> 16) & 0x7fff) as u16
    }

    /// Code bits (0..16).
    #[inline]
    #[must_use]
    pub const fn code(self) -> u16 {
        (self.0 as u32 & 0xffff) as u16
    }

    /// Name of a well-known status, if this is one.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            HResult::OK => "Ok",
            HResult::FAIL => "Fail",
            HResult::NOT_IMPLEMENTED => "NotImplemented",
            HResult::NO_INTERFACE => "NoInterface",
            HResult::ABORT => "Abort",
            HResult::INVALID_HANDLE => "InvalidHandle",
            HResult::INVALID_ARG => "InvalidArg",
            HResult::OUT_OF_MEMORY => "OutOfMemory",
            HResult::BUFFER_TOO_SMALL => "BufferTooSmall",
            HResult::UNINITIALIZED => "Uninitialized",
            HResult::PENDING => "Pending",
            HResult::CANNOT_OPEN => "CannotOpen",
            HResult::NOT_FOUND => "NotFound",
            HResult::INTERNAL_FAIL => "InternalFail",
            HResult::NOT_AVAILABLE => "NotAvailable",
            HResult::TIME_OUT => "TimeOut",
            _ => return None,
        })
    }

    /// Translate a failing status into a raised [`Error`].
    ///
    /// Callers probing for an optional capability should special-case
    /// [`HResult::NO_INTERFACE`] before calling this; it is the expected
    /// negative outcome of a probe, not an error.
    pub fn ok(self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::Status { status: self })
        }
    }

    /// Like [`HResult::ok`], but fetches diagnostic text for the
    /// internal-failure category. `fetch` runs only when the status is
    /// [`HResult::INTERNAL_FAIL`] and may pull the text from the native side.
    pub fn ok_with_diagnostic(
        self,
        fetch: impl FnOnce() -> Option<String>,
    ) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        if self == HResult::INTERNAL_FAIL
            && let Some(diagnostic) = fetch()
        {
            return Err(Error::Internal {
                status: self,
                diagnostic,
            });
        }
        Err(Error::Status { status: self })
    }
}

impl std::fmt::Debug for HResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "HResult({name})"),
            None => write!(f, "HResult({:#010x})", self.0 as u32),
        }
    }
}

impl std::fmt::Display for HResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#010x}", self.0 as u32),
        }
    }
}

/// Error raised at the managed side of the boundary.
///
/// Statuses cross the boundary as plain [`HResult`] values; the seam
/// translates failures into this type so callers get a category and, where
/// available, diagnostic text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The interface type carries the nil identity and cannot be queried for.
    #[error("interface `{0}` carries no identity and cannot be queried for")]
    MissingIdentity(&'static str),

    /// `QueryInterface` reported that the object lacks the interface.
    #[error("the underlying object does not expose interface `{0}`")]
    NoInterface(&'static str),

    /// A null pointer was handed to the bridge where an object was required.
    #[error("null native pointer passed to the bridge")]
    NullPointer,

    /// A string with an interior NUL byte cannot cross the boundary.
    #[error("string cannot cross the boundary: {0}")]
    InteriorNul(#[from] std::ffi::NulError),

    /// A boundary call returned a failing status.
    #[error("boundary call failed: {status}")]
    Status { status: HResult },

    /// Internal failure in the native component, with its diagnostic text.
    #[error("internal failure in the native component: {diagnostic}")]
    Internal { status: HResult, diagnostic: String },
}

impl Error {
    /// The status behind this error, if it originated as one.
    #[must_use]
    pub fn status(&self) -> Option<HResult> {
        match self {
            Error::Status { status } | Error::Internal { status, .. } => Some(*status),
            Error::NoInterface(_) => Some(HResult::NO_INTERFACE),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_flag_is_top_bit() {
        assert!(HResult::OK.is_success());
        for status in [
            HResult::FAIL,
            HResult::NO_INTERFACE,
            HResult::BUFFER_TOO_SMALL,
            HResult::TIME_OUT,
        ] {
            assert!(status.is_failure());
            assert_eq!(status.0 as u32 & 0x8000_0000, 0x8000_0000);
        }
    }

    #[test]
    fn wire_values_match_native_convention() {
        assert_eq!(HResult::FAIL.0 as u32, 0x8000_4005);
        assert_eq!(HResult::NOT_IMPLEMENTED.0 as u32, 0x8000_4001);
        assert_eq!(HResult::NO_INTERFACE.0 as u32, 0x8000_4002);
        assert_eq!(HResult::INVALID_ARG.0 as u32, 0x8007_0057);
        assert_eq!(HResult::OUT_OF_MEMORY.0 as u32, 0x8007_000E);
        assert_eq!(HResult::BUFFER_TOO_SMALL.0 as u32, 0x8200_0001);
        assert_eq!(HResult::TIME_OUT.0 as u32, 0x8200_0008);
    }

    #[test]
    fn facility_and_code_split() {
        assert_eq!(HResult::NOT_FOUND.facility(), 0x0200);
        assert_eq!(HResult::NOT_FOUND.code(), 5);
        assert_eq!(HResult::INVALID_ARG.facility(), 0x0007);
        assert_eq!(HResult::INVALID_ARG.code(), 0x0057);
    }

    #[test]
    fn ok_raises_on_failure_only() {
        assert!(HResult::OK.ok().is_ok());
        let err = HResult::CANNOT_OPEN.ok().unwrap_err();
        assert_eq!(err.status(), Some(HResult::CANNOT_OPEN));
    }

    #[test]
    fn diagnostic_attaches_for_internal_fail_only() {
        let err = HResult::INTERNAL_FAIL
            .ok_with_diagnostic(|| Some("stack overflow in pass 3".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        assert!(err.to_string().contains("stack overflow"));

        let err = HResult::FAIL
            .ok_with_diagnostic(|| Some("ignored".into()))
            .unwrap_err();
        assert!(matches!(err, Error::Status { .. }));
    }
}
