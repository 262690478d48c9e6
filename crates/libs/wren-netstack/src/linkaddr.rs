use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NetstackError;

pub const LINKADDR_SIZE: usize = 8;

/// Link layer address of a node (IEEE 802.15.4 extended address).
///
/// The all-zero value is [`LinkAddr::NULL`]; it marks unused table entries
/// and must never be assigned to a node.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkAddr([u8; LINKADDR_SIZE]);

impl LinkAddr {
    pub const NULL: Self = Self([0u8; LINKADDR_SIZE]);

    pub const fn new(addr: [u8; LINKADDR_SIZE]) -> Self {
        Self(addr)
    }

    pub fn new_from_slice(data: &[u8]) -> Result<Self, NetstackError> {
        let addr: [u8; LINKADDR_SIZE] =
            data.try_into().map_err(|_| NetstackError::InvalidArgument)?;
        Ok(Self(addr))
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn copy_from(&mut self, from: &LinkAddr) {
        self.0 = from.0;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; LINKADDR_SIZE] {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; LINKADDR_SIZE] {
        self.0
    }
}

impl From<[u8; LINKADDR_SIZE]> for LinkAddr {
    fn from(addr: [u8; LINKADDR_SIZE]) -> Self {
        Self(addr)
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkAddr({self})")
    }
}

/// Parses `00:50:c2:ff:fe:a8:dd:dd` (separators optional).
impl FromStr for LinkAddr {
    type Err = NetstackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != LINKADDR_SIZE * 2 || !digits.is_ascii() {
            return Err(NetstackError::InvalidArgument);
        }

        let mut addr = [0u8; LINKADDR_SIZE];
        for (i, byte) in addr.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| NetstackError::InvalidArgument)?;
        }

        Ok(Self(addr))
    }
}

impl TryFrom<String> for LinkAddr {
    type Error = NetstackError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LinkAddr> for String {
    fn from(addr: LinkAddr) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: LinkAddr = LinkAddr::new([0x00, 0x50, 0xc2, 0xff, 0xfe, 0xa8, 0xdd, 0xdd]);

    #[test]
    fn comparison_is_byte_exact() {
        assert_eq!(A, A);
        for i in 0..LINKADDR_SIZE {
            let mut bytes = A.to_bytes();
            bytes[i] ^= 0x01;
            assert_ne!(A, LinkAddr::new(bytes));
        }
    }

    #[test]
    fn copy_then_compare_matches_source() {
        let mut dest = LinkAddr::NULL;
        assert!(dest.is_null());
        dest.copy_from(&A);
        assert_eq!(dest, A);
        assert!(!dest.is_null());
    }

    #[test]
    fn parses_and_prints_colon_notation() {
        let parsed: LinkAddr = "00:50:c2:ff:fe:a8:dd:dd".parse().expect("valid address");
        assert_eq!(parsed, A);
        assert_eq!(A.to_string(), "00:50:c2:ff:fe:a8:dd:dd");
        assert!("00:50:c2".parse::<LinkAddr>().is_err());
        assert!("zz:50:c2:ff:fe:a8:dd:dd".parse::<LinkAddr>().is_err());
    }

    #[test]
    fn rejects_wrong_slice_length() {
        assert!(LinkAddr::new_from_slice(&[1, 2, 3]).is_err());
        assert_eq!(LinkAddr::new_from_slice(A.as_slice()).expect("8 bytes"), A);
    }
}
