//! Slotframes, links and channel hopping.

use core::fmt;
use core::ops::BitOr;

use netstack::LinkAddr;

use crate::asn::Asn;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkOptions(u8);

impl LinkOptions {
    pub const TX: Self = Self(0x01);
    pub const RX: Self = Self(0x02);
    pub const SHARED: Self = Self(0x04);
    pub const TIMEKEEPING: Self = Self(0x08);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LinkOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for LinkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Self::TX, "TX"),
            (Self::RX, "RX"),
            (Self::SHARED, "SH"),
            (Self::TIMEKEEPING, "TK"),
        ];
        let names: Vec<&str> =
            flags.iter().filter(|(flag, _)| self.contains(*flag)).map(|(_, name)| *name).collect();
        write!(f, "[{}]", names.join("|"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkType {
    #[default]
    Normal,
    /// May also carry enhanced beacons.
    Advertising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub timeslot: u16,
    pub channel_offset: u16,
    pub options: LinkOptions,
    pub link_type: LinkType,
    /// Neighbor served by this cell; [`LinkAddr::NULL`] for any neighbor.
    pub addr: LinkAddr,
}

impl Link {
    pub fn is_tx(&self) -> bool {
        self.options.contains(LinkOptions::TX)
    }

    pub fn is_shared(&self) -> bool {
        self.options.contains(LinkOptions::SHARED)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slotframe {
    pub handle: u8,
    pub size: u16,
    pub links: Vec<Link>,
}

impl Slotframe {
    pub fn new(handle: u8, size: u16) -> Self {
        Self { handle, size: size.max(1), links: Vec::new() }
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }

    /// Timeslot offset of `asn` within this slotframe.
    pub fn timeslot_of(&self, asn: Asn) -> u16 {
        (asn.value() % u64::from(self.size)) as u16
    }
}

/// Ordered set of slotframes. Lower handles take precedence when several
/// slotframes have a link in the same timeslot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    slotframes: Vec<Slotframe>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// One shared advertising cell at timeslot 0, channel offset 0.
    pub fn minimal(slotframe_length: u16) -> Self {
        let mut slotframe = Slotframe::new(0, slotframe_length);
        slotframe.add_link(Link {
            timeslot: 0,
            channel_offset: 0,
            options: LinkOptions::TX
                | LinkOptions::RX
                | LinkOptions::SHARED
                | LinkOptions::TIMEKEEPING,
            link_type: LinkType::Advertising,
            addr: LinkAddr::NULL,
        });
        Self::from_slotframes(vec![slotframe])
    }

    pub fn from_slotframes(mut slotframes: Vec<Slotframe>) -> Self {
        slotframes.sort_by_key(|slotframe| slotframe.handle);
        Self { slotframes }
    }

    /// Replaces a slotframe with the same handle.
    pub fn add_slotframe(&mut self, slotframe: Slotframe) {
        self.slotframes.retain(|existing| existing.handle != slotframe.handle);
        self.slotframes.push(slotframe);
        self.slotframes.sort_by_key(|slotframe| slotframe.handle);
    }

    pub fn clear(&mut self) {
        self.slotframes.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.slotframes.is_empty()
    }

    pub fn slotframes(&self) -> &[Slotframe] {
        &self.slotframes
    }

    /// Active link at `asn`, preferring transmit cells within a slotframe.
    pub fn link_at(&self, asn: Asn) -> Option<&Link> {
        self.slotframes.iter().find_map(|slotframe| {
            let timeslot = slotframe.timeslot_of(asn);
            let mut active = slotframe.links.iter().filter(|link| link.timeslot == timeslot);
            let first = active.next()?;
            if first.is_tx() {
                return Some(first);
            }
            Some(active.find(|link| link.is_tx()).unwrap_or(first))
        })
    }
}

/// Channel used at `asn` on `channel_offset`.
pub fn channel_at(asn: Asn, channel_offset: u16, hopping_sequence: &[u8]) -> Option<u8> {
    if hopping_sequence.is_empty() {
        return None;
    }
    let index = asn.value().wrapping_add(u64::from(channel_offset)) % hopping_sequence.len() as u64;
    hopping_sequence.get(index as usize).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_schedule_has_one_shared_cell() {
        let schedule = Schedule::minimal(7);
        assert_eq!(schedule.slotframes().len(), 1);

        let link = schedule.link_at(Asn::new(14)).expect("timeslot 0");
        assert!(link.is_tx() && link.is_shared());
        assert_eq!(link.link_type, LinkType::Advertising);
        assert!(link.addr.is_null());
        assert!(schedule.link_at(Asn::new(15)).is_none());
    }

    #[test]
    fn channels_follow_the_hopping_sequence() {
        let sequence = [15, 20, 25, 26];
        let hops: Vec<u8> =
            (0..5).filter_map(|asn| channel_at(Asn::new(asn), 0, &sequence)).collect();
        assert_eq!(hops, vec![15, 20, 25, 26, 15]);
        assert_eq!(channel_at(Asn::new(0), 3, &sequence), Some(26));
        assert_eq!(channel_at(Asn::new(0), 0, &[]), None);
    }

    #[test]
    fn lower_handle_wins_overlapping_timeslots() {
        let mut schedule = Schedule::minimal(7);
        let mut dedicated = Slotframe::new(1, 7);
        dedicated.add_link(Link {
            timeslot: 0,
            channel_offset: 2,
            options: LinkOptions::RX,
            link_type: LinkType::Normal,
            addr: LinkAddr::new([1; 8]),
        });
        schedule.add_slotframe(dedicated);

        assert_eq!(schedule.link_at(Asn::new(0)).map(|link| link.channel_offset), Some(0));
    }

    #[test]
    fn option_flags_debug_print() {
        let options = LinkOptions::TX | LinkOptions::SHARED;
        assert_eq!(format!("{options:?}"), "[TX|SH]");
        assert_eq!(LinkOptions::from_bits(0xff).bits(), 0x0f);
    }
}
