use core::fmt;

const ASN_MASK: u64 = (1 << 40) - 1;

/// Absolute slot number: 40-bit count of timeslots since the PAN started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Asn(u64);

impl Asn {
    pub const LEN: usize = 5;

    pub fn new(value: u64) -> Self {
        Self(value & ASN_MASK)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Wraps at 2^40.
    pub fn add(&self, slots: u64) -> Self {
        Self::new(self.0.wrapping_add(slots))
    }

    /// Slots from `earlier` to `self`, modulo 2^40.
    pub fn since(&self, earlier: Asn) -> u64 {
        self.0.wrapping_sub(earlier.0) & ASN_MASK
    }

    pub fn to_le_bytes(&self) -> [u8; Self::LEN] {
        let bytes = self.0.to_le_bytes();
        [bytes[0], bytes[1], bytes[2], bytes[3], bytes[4]]
    }

    pub fn from_le_bytes(bytes: [u8; Self::LEN]) -> Self {
        let mut wide = [0u8; 8];
        wide[..Self::LEN].copy_from_slice(&bytes);
        Self(u64::from_le_bytes(wide))
    }
}

impl fmt::Display for Asn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#012x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asn_wraps_at_forty_bits() {
        let last = Asn::new(ASN_MASK);
        assert_eq!(last.add(1), Asn::new(0));
        assert_eq!(Asn::new(3).since(last), 4);
        assert_eq!(Asn::new(1 << 40), Asn::new(0));
    }

    #[test]
    fn wire_form_is_five_bytes_little_endian() {
        let asn = Asn::new(0x01_0203_0405);
        assert_eq!(asn.to_le_bytes(), [0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(Asn::from_le_bytes([0x05, 0x04, 0x03, 0x02, 0x01]), asn);
    }
}
