//! Enhanced beacon information elements.
//!
//! An EB payload is a header IE list closed by the HT1 terminator followed
//! by one MLME payload IE whose nested sub-IEs carry the TSCH state:
//!
//! ```text
//!   0x00 0x3f                          HT1 header termination
//!   len|0x8800 (le)                    MLME payload IE
//!     0x06 0x1a  asn[5] join_priority  TSCH synchronization
//!     0x01 0x1c  template_id           TSCH timeslot
//!     len  0x1b  slotframes...         TSCH slotframe and link (optional)
//! ```

use netstack::{FrameBuf, FrameInfo, LinkAddr, NetstackError};

use crate::asn::Asn;
use crate::config::TschConfig;
use crate::schedule::{Link, LinkOptions, LinkType, Slotframe};

const HEADER_IE_HT1: u8 = 0x7e;
const PAYLOAD_IE_FLAG: u16 = 0x8000;
const PAYLOAD_GROUP_MLME: u16 = 0x1;
const PAYLOAD_GROUP_TERMINATION: u16 = 0xf;
const SUB_IE_LONG_FLAG: u16 = 0x8000;

const SUB_IE_SYNC: u8 = 0x1a;
const SUB_IE_SLOTFRAME_LINK: u8 = 0x1b;
const SUB_IE_TIMESLOT: u8 = 0x1c;

const SYNC_IE_LEN: usize = Asn::LEN + 1;
const SLOTFRAME_DESCRIPTOR_LEN: usize = 4;
const LINK_DESCRIPTOR_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EbError {
    #[error("truncated information element")]
    Truncated,
    #[error("no TSCH synchronization IE")]
    MissingSync,
    #[error("beacon does not fit a frame")]
    TooLarge,
}

impl From<EbError> for NetstackError {
    fn from(err: EbError) -> Self {
        match err {
            EbError::Truncated | EbError::MissingSync => NetstackError::InvalidFrame,
            EbError::TooLarge => NetstackError::BufOverflow,
        }
    }
}

/// Reasons a scanning node turns down an otherwise valid EB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EbRejection {
    #[error("join priority {advertised} above maximum {max}")]
    JoinPriority { advertised: u8, max: u8 },
    #[error("unsecured beacon while joining secured networks only")]
    Unsecured,
    #[error("PAN {found:#06x} is not {expected:#06x}")]
    PanId { found: u16, expected: u16 },
    #[error("network uptime {network} differs from local uptime {local}")]
    TimeMismatch { network: u64, local: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnhancedBeacon {
    pub asn: Asn,
    pub join_priority: u8,
    pub timeslot_template: u8,
    pub slotframes: Vec<Slotframe>,
}

impl EnhancedBeacon {
    pub fn encode(&self, out: &mut FrameBuf) -> Result<(), EbError> {
        let mut nested = FrameBuf::new();

        write_sub_ie_header(&mut nested, SUB_IE_SYNC, SYNC_IE_LEN)?;
        put(&mut nested, &self.asn.to_le_bytes())?;
        put(&mut nested, &[self.join_priority])?;

        write_sub_ie_header(&mut nested, SUB_IE_TIMESLOT, 1)?;
        put(&mut nested, &[self.timeslot_template])?;

        if !self.slotframes.is_empty() {
            let len = 1 + self
                .slotframes
                .iter()
                .map(|sf| SLOTFRAME_DESCRIPTOR_LEN + LINK_DESCRIPTOR_LEN * sf.links.len())
                .sum::<usize>();
            write_sub_ie_header(&mut nested, SUB_IE_SLOTFRAME_LINK, len)?;
            put(&mut nested, &[count_u8(self.slotframes.len())?])?;
            for slotframe in &self.slotframes {
                put(&mut nested, &[slotframe.handle])?;
                put(&mut nested, &slotframe.size.to_le_bytes())?;
                put(&mut nested, &[count_u8(slotframe.links.len())?])?;
                for link in &slotframe.links {
                    put(&mut nested, &link.timeslot.to_le_bytes())?;
                    put(&mut nested, &link.channel_offset.to_le_bytes())?;
                    put(&mut nested, &[link.options.bits()])?;
                }
            }
        }

        out.reset();
        put(out, &(u16::from(HEADER_IE_HT1) << 7).to_le_bytes())?;
        let nested_len = u16::try_from(nested.len()).map_err(|_| EbError::TooLarge)?;
        let descriptor = PAYLOAD_IE_FLAG | (PAYLOAD_GROUP_MLME << 11) | nested_len;
        put(out, &descriptor.to_le_bytes())?;
        put(out, nested.as_slice())
    }

    pub fn decode(payload: &[u8]) -> Result<Self, EbError> {
        let mut reader = Reader { data: payload, offset: 0 };

        // Header IEs up to the HT1 terminator.
        loop {
            let descriptor = reader.u16_le()?;
            if descriptor & PAYLOAD_IE_FLAG != 0 {
                return Err(EbError::MissingSync);
            }
            let element_id = ((descriptor >> 7) & 0xff) as u8;
            let len = usize::from(descriptor & 0x7f);
            if element_id == HEADER_IE_HT1 {
                break;
            }
            reader.take(len)?;
        }

        let mut beacon = None;
        while !reader.is_empty() {
            let descriptor = reader.u16_le()?;
            let group = (descriptor >> 11) & 0xf;
            let content = reader.take(usize::from(descriptor & 0x7ff))?;
            if group == PAYLOAD_GROUP_TERMINATION {
                break;
            }
            if group == PAYLOAD_GROUP_MLME {
                beacon = Some(Self::decode_mlme(content)?);
            }
        }

        beacon.ok_or(EbError::MissingSync)
    }

    fn decode_mlme(content: &[u8]) -> Result<Self, EbError> {
        let mut reader = Reader { data: content, offset: 0 };
        let mut beacon = Self::default();
        let mut synced = false;

        while !reader.is_empty() {
            let descriptor = reader.u16_le()?;
            if descriptor & SUB_IE_LONG_FLAG != 0 {
                reader.take(usize::from(descriptor & 0x7ff))?;
                continue;
            }
            let sub_id = ((descriptor >> 8) & 0x7f) as u8;
            let mut ie = Reader { data: reader.take(usize::from(descriptor & 0xff))?, offset: 0 };

            match sub_id {
                SUB_IE_SYNC => {
                    let mut asn = [0u8; Asn::LEN];
                    asn.copy_from_slice(ie.take(Asn::LEN)?);
                    beacon.asn = Asn::from_le_bytes(asn);
                    beacon.join_priority = ie.u8()?;
                    synced = true;
                }
                SUB_IE_TIMESLOT => beacon.timeslot_template = ie.u8()?,
                SUB_IE_SLOTFRAME_LINK => beacon.slotframes = decode_slotframes(&mut ie)?,
                _ => {}
            }
        }

        if synced {
            Ok(beacon)
        } else {
            Err(EbError::MissingSync)
        }
    }

    /// Checks the join policy of `config` against this beacon.
    ///
    /// `frame` is the header the beacon arrived in, `pan_id` the node's
    /// configured PAN and `now` the local uptime in ticks.
    pub fn qualify(
        &self,
        config: &TschConfig,
        frame: &FrameInfo,
        pan_id: u16,
        now: u64,
    ) -> Result<(), EbRejection> {
        if self.join_priority > config.max_join_priority {
            return Err(EbRejection::JoinPriority {
                advertised: self.join_priority,
                max: config.max_join_priority,
            });
        }
        check_frame(config, frame, pan_id)?;
        if config.check_time_at_association > 0 {
            let network = self.asn.value().saturating_mul(config.timeslot_length);
            if network.abs_diff(now) > config.check_time_at_association {
                return Err(EbRejection::TimeMismatch { network, local: now });
            }
        }
        Ok(())
    }
}

/// Security and PAN checks every accepted beacon frame must pass, including
/// resynchronizing ones from the current time source.
pub fn check_frame(config: &TschConfig, frame: &FrameInfo, pan_id: u16) -> Result<(), EbRejection> {
    if config.join_secured_only && !frame.security_enabled {
        return Err(EbRejection::Unsecured);
    }
    if config.join_my_panid_only && frame.src_pan != pan_id {
        return Err(EbRejection::PanId { found: frame.src_pan, expected: pan_id });
    }
    Ok(())
}

fn decode_slotframes(ie: &mut Reader<'_>) -> Result<Vec<Slotframe>, EbError> {
    let count = ie.u8()?;
    let mut slotframes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let handle = ie.u8()?;
        let size = ie.u16_le()?;
        let links = ie.u8()?;
        let mut slotframe = Slotframe::new(handle, size);
        for _ in 0..links {
            let timeslot = ie.u16_le()?;
            let channel_offset = ie.u16_le()?;
            let options = LinkOptions::from_bits(ie.u8()?);
            let link_type = if options.contains(LinkOptions::TX | LinkOptions::SHARED) {
                LinkType::Advertising
            } else {
                LinkType::Normal
            };
            slotframe.add_link(Link { timeslot, channel_offset, options, link_type, addr: LinkAddr::NULL });
        }
        slotframes.push(slotframe);
    }
    Ok(slotframes)
}

fn write_sub_ie_header(out: &mut FrameBuf, sub_id: u8, len: usize) -> Result<(), EbError> {
    let len = u8::try_from(len).map_err(|_| EbError::TooLarge)?;
    put(out, &[len, sub_id])
}

fn put(out: &mut FrameBuf, bytes: &[u8]) -> Result<(), EbError> {
    out.write(bytes).map(|_| ()).map_err(|_| EbError::TooLarge)
}

fn count_u8(count: usize) -> Result<u8, EbError> {
    u8::try_from(count).map_err(|_| EbError::TooLarge)
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], EbError> {
        let end = self.offset.checked_add(len).ok_or(EbError::Truncated)?;
        let bytes = self.data.get(self.offset..end).ok_or(EbError::Truncated)?;
        self.offset = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, EbError> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, EbError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Schedule;

    fn beacon() -> EnhancedBeacon {
        EnhancedBeacon {
            asn: Asn::new(0x0102),
            join_priority: 1,
            timeslot_template: 0,
            slotframes: Schedule::minimal(7).slotframes().to_vec(),
        }
    }

    #[test]
    fn minimal_beacon_matches_reference_bytes() {
        let mut out = FrameBuf::new();
        beacon().encode(&mut out).expect("fits");

        let expected: [u8; 27] = [
            0x00, 0x3f, // HT1
            0x17, 0x88, // MLME payload IE, 23 bytes
            0x06, 0x1a, 0x02, 0x01, 0x00, 0x00, 0x00, 0x01, // sync
            0x01, 0x1c, 0x00, // timeslot
            0x0a, 0x1b, 0x01, 0x00, 0x07, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x0f, // slotframe
        ];
        assert_eq!(out.as_slice(), &expected[..]);
    }

    #[test]
    fn decoding_restores_the_advertised_schedule() {
        let mut out = FrameBuf::new();
        let sent = beacon();
        sent.encode(&mut out).expect("fits");

        let received = EnhancedBeacon::decode(out.as_slice()).expect("valid");
        assert_eq!(received, sent);
        let link = received.slotframes[0].links[0];
        assert_eq!(link.link_type, LinkType::Advertising);
    }

    #[test]
    fn beacon_without_sync_ie_is_rejected() {
        let mut payload = vec![0x00, 0x3f, 0x03, 0x88, 0x01, 0x1c, 0x00];
        assert_eq!(EnhancedBeacon::decode(&payload), Err(EbError::MissingSync));
        payload.truncate(5);
        assert_eq!(EnhancedBeacon::decode(&payload), Err(EbError::Truncated));
    }

    #[test]
    fn join_policy_checks() {
        let mut config = TschConfig::default();
        let frame = FrameInfo { src_pan: 0xabcd, ..FrameInfo::default() };
        let mut eb = beacon();

        eb.join_priority = 40;
        assert_eq!(
            eb.qualify(&config, &frame, 0xabcd, 0),
            Err(EbRejection::JoinPriority { advertised: 40, max: 32 })
        );
        eb.join_priority = 32;
        assert_eq!(eb.qualify(&config, &frame, 0xabcd, 0), Ok(()));

        config.set_join_secured_only(true);
        assert_eq!(eb.qualify(&config, &frame, 0xabcd, 0), Err(EbRejection::Unsecured));
        let secured = FrameInfo { security_enabled: true, ..frame };
        assert_eq!(eb.qualify(&config, &secured, 0xabcd, 0), Ok(()));

        config.set_join_my_panid_only(true);
        assert_eq!(
            eb.qualify(&config, &secured, 0x1234, 0),
            Err(EbRejection::PanId { found: 0xabcd, expected: 0x1234 })
        );

        config.set_check_time_at_association(100);
        eb.asn = Asn::new(1000);
        assert!(matches!(
            eb.qualify(&config, &secured, 0xabcd, 0),
            Err(EbRejection::TimeMismatch { network: 10_000, local: 0 })
        ));
        assert_eq!(eb.qualify(&config, &secured, 0xabcd, 9_950), Ok(()));
    }
}
