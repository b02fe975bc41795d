//! 128-bit interface identity.
//!
//! The field layout `(u32, u16, u16, [u8; 8])` matches the native library's
//! UUID convention byte for byte; `QueryInterface` compares these raw fields,
//! so any deviation breaks interface queries silently.

/// 128-bit globally unique interface identifier.
///
/// `Guid::ZERO` is reserved: it marks an interface that carries no identity.
/// Identity-based queries must treat it as "unidentifiable" and fail rather
/// than match it against a real interface.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    #[must_use]
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// The nil identifier; means "no identity".
    pub const ZERO: Guid = Guid::new(0, 0, 0, [0; 8]);

    /// Whether this is the nil identifier.
    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.data1 == 0
            && self.data2 == 0
            && self.data3 == 0
            && self.data4[0] == 0
            && self.data4[1] == 0
            && self.data4[2] == 0
            && self.data4[3] == 0
            && self.data4[4] == 0
            && self.data4[5] == 0
            && self.data4[6] == 0
            && self.data4[7] == 0
    }
}

impl std::fmt::Debug for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:02X}{:02X}-{:02X}{:02X}{:02X}{:02X}{:02X}{:02X}}}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_guid_is_zero() {
        assert!(Guid::ZERO.is_zero());
        assert!(!Guid::new(0, 0, 1, [0; 8]).is_zero());
    }

    #[test]
    fn display_round_trips_fields() {
        let g = Guid::new(
            0x8ba5fb08,
            0x5195,
            0x40e2,
            [0xac, 0x58, 0x0d, 0x98, 0x9c, 0x3a, 0x01, 0x02],
        );
        assert_eq!(g.to_string(), "8ba5fb08-5195-40e2-ac58-0d989c3a0102");
    }
}
