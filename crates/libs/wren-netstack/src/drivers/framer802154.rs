//! IEEE 802.15.4 MAC header framer.
//!
//! Frame control field layout (little-endian on air):
//!
//! ```text
//!  bits 0-2   frame type          bit 8      sequence number suppression
//!  bit  3     security enabled    bit 9      IE present
//!  bit  4     frame pending       bits 10-11 destination addressing mode
//!  bit  5     ack request         bits 12-13 frame version
//!  bit  6     PAN ID compression  bits 14-15 source addressing mode
//! ```
//!
//! The FCS is left to the radio.

use crate::buffer::FrameBuf;
use crate::error::{NetstackError, Result};
use crate::frame::{Address, FrameInfo, FrameType, FrameVersion, ParsedFrame};
use crate::linkaddr::{LinkAddr, LINKADDR_SIZE};
use crate::module::{Driver, Framer};
use crate::node::NodeContext;

const FCF_SECURITY: u16 = 1 << 3;
const FCF_FRAME_PENDING: u16 = 1 << 4;
const FCF_ACK_REQUEST: u16 = 1 << 5;
const FCF_PAN_ID_COMPRESSION: u16 = 1 << 6;
const FCF_SEQ_SUPPRESSION: u16 = 1 << 8;
const FCF_IE_PRESENT: u16 = 1 << 9;
const FCF_DST_MODE_SHIFT: u16 = 10;
const FCF_VERSION_SHIFT: u16 = 12;
const FCF_SRC_MODE_SHIFT: u16 = 14;

#[derive(Debug, Default, Clone, Copy)]
pub struct Framer802154;

impl Framer802154 {
    pub fn new() -> Self {
        Self
    }

    fn pan_id_compressed(info: &FrameInfo) -> bool {
        !info.dst.is_absent() && !info.src.is_absent() && info.dst_pan == info.src_pan
    }

    fn frame_control(info: &FrameInfo) -> u16 {
        let mut fcf = info.frame_type as u16;
        if info.security_enabled {
            fcf |= FCF_SECURITY;
        }
        if info.frame_pending {
            fcf |= FCF_FRAME_PENDING;
        }
        if info.ack_request {
            fcf |= FCF_ACK_REQUEST;
        }
        if Self::pan_id_compressed(info) {
            fcf |= FCF_PAN_ID_COMPRESSION;
        }
        if info.ie_present {
            fcf |= FCF_IE_PRESENT;
        }
        fcf |= u16::from(info.dst.mode()) << FCF_DST_MODE_SHIFT;
        fcf |= (info.version as u16) << FCF_VERSION_SHIFT;
        fcf |= u16::from(info.src.mode()) << FCF_SRC_MODE_SHIFT;
        fcf
    }
}

fn write_address(out: &mut FrameBuf, addr: &Address) -> Result<()> {
    match addr {
        Address::Absent => {}
        Address::Short(short) => {
            out.write_u16_le(*short)?;
        }
        Address::Extended(ext) => {
            let mut bytes = ext.to_bytes();
            bytes.reverse();
            out.write(&bytes)?;
        }
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(len).ok_or(NetstackError::InvalidFrame)?;
        let bytes = self.data.get(self.offset..end).ok_or(NetstackError::InvalidFrame)?;
        self.offset = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn address(&mut self, mode: u8) -> Result<Address> {
        match mode {
            0b00 => Ok(Address::Absent),
            0b10 => Ok(Address::Short(self.u16_le()?)),
            0b11 => {
                let mut bytes = [0u8; LINKADDR_SIZE];
                bytes.copy_from_slice(self.take(LINKADDR_SIZE)?);
                bytes.reverse();
                Ok(Address::Extended(LinkAddr::new(bytes)))
            }
            _ => Err(NetstackError::InvalidFrame),
        }
    }
}

impl Driver for Framer802154 {
    fn name(&self) -> &'static str {
        "framer-802154"
    }

    fn init(&mut self, _node: &mut NodeContext) -> Result<()> {
        Ok(())
    }
}

impl Framer for Framer802154 {
    fn header_len(&self, info: &FrameInfo) -> usize {
        let mut len = 3;
        if !info.dst.is_absent() {
            len += 2 + info.dst.len();
        }
        if !info.src.is_absent() {
            if !Self::pan_id_compressed(info) {
                len += 2;
            }
            len += info.src.len();
        }
        len
    }

    fn create(&mut self, info: &FrameInfo, payload: &[u8], out: &mut FrameBuf) -> Result<usize> {
        out.reset();
        out.write_u16_le(Self::frame_control(info))?;
        out.write_byte(info.seq)?;

        if !info.dst.is_absent() {
            out.write_u16_le(info.dst_pan)?;
            write_address(out, &info.dst)?;
        }
        if !info.src.is_absent() {
            if !Self::pan_id_compressed(info) {
                out.write_u16_le(info.src_pan)?;
            }
            write_address(out, &info.src)?;
        }

        let header_len = out.len();
        out.write(payload)?;
        log::trace!(
            "framer: {:?} seq={} {} -> {} hdr={} payload={}",
            info.frame_type,
            info.seq,
            info.src,
            info.dst,
            header_len,
            payload.len()
        );
        Ok(header_len)
    }

    fn parse(&self, frame: &[u8]) -> Result<ParsedFrame> {
        let mut reader = Reader { data: frame, offset: 0 };
        let fcf = reader.u16_le()?;

        let frame_type =
            FrameType::from_bits((fcf & 0b111) as u8).ok_or(NetstackError::InvalidFrame)?;
        let version = FrameVersion::from_bits(((fcf >> FCF_VERSION_SHIFT) & 0b11) as u8)
            .ok_or(NetstackError::InvalidFrame)?;
        let dst_mode = ((fcf >> FCF_DST_MODE_SHIFT) & 0b11) as u8;
        let src_mode = ((fcf >> FCF_SRC_MODE_SHIFT) & 0b11) as u8;
        let compressed = fcf & FCF_PAN_ID_COMPRESSION != 0;

        let seq_suppressed =
            version == FrameVersion::Ieee802154_2015 && fcf & FCF_SEQ_SUPPRESSION != 0;
        let seq = if seq_suppressed { 0 } else { reader.u8()? };

        let mut info = FrameInfo {
            frame_type,
            version,
            security_enabled: fcf & FCF_SECURITY != 0,
            frame_pending: fcf & FCF_FRAME_PENDING != 0,
            ack_request: fcf & FCF_ACK_REQUEST != 0,
            ie_present: fcf & FCF_IE_PRESENT != 0,
            seq,
            ..FrameInfo::default()
        };

        if dst_mode != 0 {
            info.dst_pan = reader.u16_le()?;
            info.dst = reader.address(dst_mode)?;
        }
        if src_mode != 0 {
            info.src_pan = if compressed && dst_mode != 0 { info.dst_pan } else { reader.u16_le()? };
            info.src = reader.address(src_mode)?;
        }

        Ok(ParsedFrame { info, header_len: reader.offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: LinkAddr = LinkAddr::new([0x00, 0x50, 0xc2, 0xff, 0xfe, 0xa8, 0xdd, 0xdd]);
    const DST: LinkAddr = LinkAddr::new([0x00, 0x50, 0xc2, 0xff, 0xfe, 0xa8, 0xdd, 0x01]);

    #[test]
    fn unicast_data_frame_matches_reference_bytes() {
        let mut framer = Framer802154::new();
        let info = FrameInfo::data(0x2a, 0xabcd, SRC, Some(DST));
        let mut out = FrameBuf::new();

        let header_len = framer.create(&info, &[0x01, 0x02], &mut out).expect("fits");
        assert_eq!(header_len, 21);
        assert_eq!(framer.header_len(&info), header_len);

        let expected: [u8; 23] = [
            0x61, 0xdc, // data, ack request, PAN compression, ext/ext, 2006
            0x2a, // seq
            0xcd, 0xab, // dst PAN
            0x01, 0xdd, 0xa8, 0xfe, 0xff, 0xc2, 0x50, 0x00, // dst
            0xdd, 0xdd, 0xa8, 0xfe, 0xff, 0xc2, 0x50, 0x00, // src
            0x01, 0x02,
        ];
        assert_eq!(out.as_slice(), &expected);
    }

    #[test]
    fn parsing_recovers_what_was_framed() {
        let mut framer = Framer802154::new();
        let mut info = FrameInfo::data(7, 0xabcd, SRC, None);
        info.security_enabled = true;
        let mut out = FrameBuf::new();
        let header_len = framer.create(&info, &[9, 9, 9], &mut out).expect("fits");

        let parsed = framer.parse(out.as_slice()).expect("valid frame");
        assert_eq!(parsed.header_len, header_len);
        assert_eq!(parsed.info, info);
        assert!(parsed.info.dst.is_broadcast());
        assert_eq!(&out.as_slice()[parsed.header_len..], &[9, 9, 9]);
    }

    #[test]
    fn uncompressed_pans_are_both_carried() {
        let mut framer = Framer802154::new();
        let mut info = FrameInfo::data(1, 0x1111, SRC, Some(DST));
        info.src_pan = 0x2222;
        let mut out = FrameBuf::new();
        framer.create(&info, &[], &mut out).expect("fits");

        let parsed = framer.parse(out.as_slice()).expect("valid frame");
        assert_eq!(parsed.info.dst_pan, 0x1111);
        assert_eq!(parsed.info.src_pan, 0x2222);
        assert_eq!(parsed.header_len, 23);
    }

    #[test]
    fn truncated_and_reserved_headers_are_rejected() {
        let framer = Framer802154::new();
        assert_eq!(framer.parse(&[0x41]), Err(NetstackError::InvalidFrame));
        // ext/ext data frame cut inside the destination address
        assert_eq!(framer.parse(&[0x41, 0xcc, 0x00, 0xcd, 0xab, 0x01]), Err(NetstackError::InvalidFrame));
        // reserved frame type 0b111
        assert_eq!(framer.parse(&[0x07, 0x00, 0x00]), Err(NetstackError::InvalidFrame));
        // reserved addressing mode 0b01
        assert_eq!(framer.parse(&[0x01, 0x04, 0x00, 0xcd, 0xab]), Err(NetstackError::InvalidFrame));
    }

    #[test]
    fn sequence_number_suppression_is_honoured_for_2015_frames() {
        let framer = Framer802154::new();
        // beacon, seq suppressed, no addressing, version 2015
        let parsed = framer.parse(&[0x00, 0x21, 0xaa]).expect("valid frame");
        assert_eq!(parsed.info.frame_type, FrameType::Beacon);
        assert_eq!(parsed.info.version, FrameVersion::Ieee802154_2015);
        assert_eq!(parsed.header_len, 2);
    }

    #[test]
    fn oversized_payload_overflows_the_frame_buffer() {
        let mut framer = Framer802154::new();
        let info = FrameInfo::data(0, 0xabcd, SRC, Some(DST));
        let mut out = FrameBuf::new();
        assert_eq!(
            framer.create(&info, &[0u8; 120], &mut out),
            Err(NetstackError::BufOverflow)
        );
    }
}
