use core::fmt;

/// A four-character chunk identifier (`DXBC`, `RDEF`, `SHEX`, `RTS0`, ...).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Container magic.
    pub const DXBC: FourCC = FourCC(*b"DXBC");
    /// Resource definitions.
    pub const RDEF: FourCC = FourCC(*b"RDEF");
    /// Resource definitions (alternate ID emitted by some toolchains).
    pub const RD11: FourCC = FourCC(*b"RD11");
    /// SM4 shader bytecode.
    pub const SHDR: FourCC = FourCC(*b"SHDR");
    /// SM5 shader bytecode.
    pub const SHEX: FourCC = FourCC(*b"SHEX");
    /// Serialized D3D12 root signature.
    pub const RTS0: FourCC = FourCC(*b"RTS0");

    /// Reads a `FourCC` from its little-endian `u32` encoding.
    pub fn from_u32_le(v: u32) -> Self {
        FourCC(v.to_le_bytes())
    }

    /// Returns the little-endian `u32` encoding.
    pub fn to_u32_le(self) -> u32 {
        u32::from_le_bytes(self.0)
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC(\"{self}\")")
    }
}
