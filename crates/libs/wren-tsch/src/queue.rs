//! Outbound frames waiting for a transmit cell.

use std::collections::VecDeque;

use netstack::{LinkAddr, NetstackError, Result};

use crate::schedule::Link;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    Data,
    Keepalive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Outgoing {
    pub frame: Vec<u8>,
    pub kind: FrameKind,
    /// Link destination; `None` for broadcast.
    pub dst: Option<LinkAddr>,
}

/// One bounded FIFO per neighbor plus one for broadcast traffic.
#[derive(Debug)]
pub(crate) struct TxQueues {
    capacity: usize,
    broadcast: VecDeque<Outgoing>,
    neighbors: Vec<(LinkAddr, VecDeque<Outgoing>)>,
}

impl TxQueues {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), broadcast: VecDeque::new(), neighbors: Vec::new() }
    }

    pub fn push(&mut self, outgoing: Outgoing) -> Result<()> {
        let capacity = self.capacity;
        let queue = match outgoing.dst {
            Some(addr) if !addr.is_null() => self.neighbor_mut(addr),
            _ => &mut self.broadcast,
        };
        if queue.len() >= capacity {
            return Err(NetstackError::BufOverflow);
        }
        queue.push_back(outgoing);
        Ok(())
    }

    /// Frame to send in `link`: traffic for the link's neighbor, or for a
    /// cell open to any neighbor, broadcast first and then unicast. A
    /// neighbor whose queue runs empty is forgotten.
    pub fn pop_for(&mut self, link: &Link) -> Option<Outgoing> {
        let index = if !link.addr.is_null() {
            self.neighbors.iter().position(|(neighbor, _)| *neighbor == link.addr)?
        } else if let Some(outgoing) = self.broadcast.pop_front() {
            return Some(outgoing);
        } else if link.is_shared() {
            self.neighbors.iter().position(|(_, queue)| !queue.is_empty())?
        } else {
            return None;
        };

        let queue = &mut self.neighbors[index].1;
        let outgoing = queue.pop_front();
        if queue.is_empty() {
            self.neighbors.swap_remove(index);
        }
        outgoing
    }

    pub fn has_keepalive_for(&self, addr: &LinkAddr) -> bool {
        self.neighbors
            .iter()
            .filter(|(neighbor, _)| neighbor == addr)
            .any(|(_, queue)| queue.iter().any(|out| out.kind == FrameKind::Keepalive))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.broadcast.len() + self.neighbors.iter().map(|(_, queue)| queue.len()).sum::<usize>()
    }

    pub fn clear(&mut self) {
        self.broadcast.clear();
        self.neighbors.clear();
    }

    fn neighbor_mut(&mut self, addr: LinkAddr) -> &mut VecDeque<Outgoing> {
        let index = match self.neighbors.iter().position(|(neighbor, _)| *neighbor == addr) {
            Some(index) => index,
            None => {
                self.neighbors.push((addr, VecDeque::new()));
                self.neighbors.len() - 1
            }
        };
        &mut self.neighbors[index].1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{LinkOptions, LinkType};

    fn data(byte: u8, dst: Option<LinkAddr>) -> Outgoing {
        Outgoing { frame: vec![byte], kind: FrameKind::Data, dst }
    }

    fn cell(addr: LinkAddr, options: LinkOptions) -> Link {
        Link { timeslot: 0, channel_offset: 0, options, link_type: LinkType::Normal, addr }
    }

    #[test]
    fn per_neighbor_queues_are_bounded() {
        let mut queues = TxQueues::new(2);
        let peer = LinkAddr::new([1; 8]);
        queues.push(data(1, Some(peer))).expect("room");
        queues.push(data(2, Some(peer))).expect("room");
        assert_eq!(queues.push(data(3, Some(peer))), Err(NetstackError::BufOverflow));
        queues.push(data(4, None)).expect("broadcast queue is separate");
        assert_eq!(queues.len(), 3);
    }

    #[test]
    fn shared_cells_serve_broadcast_before_unicast() {
        let mut queues = TxQueues::new(4);
        let peer = LinkAddr::new([1; 8]);
        queues.push(data(1, Some(peer))).expect("room");
        queues.push(data(2, None)).expect("room");

        let shared = cell(LinkAddr::NULL, LinkOptions::TX | LinkOptions::SHARED);
        assert_eq!(queues.pop_for(&shared), Some(data(2, None)));
        assert_eq!(queues.pop_for(&shared), Some(data(1, Some(peer))));
        assert_eq!(queues.pop_for(&shared), None);
    }

    #[test]
    fn dedicated_cells_only_serve_their_neighbor() {
        let mut queues = TxQueues::new(4);
        let peer = LinkAddr::new([1; 8]);
        let other = LinkAddr::new([2; 8]);
        queues.push(data(1, Some(other))).expect("room");

        assert_eq!(queues.pop_for(&cell(peer, LinkOptions::TX)), None);
        assert_eq!(queues.pop_for(&cell(other, LinkOptions::TX)), Some(data(1, Some(other))));

        queues.push(Outgoing { frame: vec![], kind: FrameKind::Keepalive, dst: Some(peer) }).expect("room");
        assert!(queues.has_keepalive_for(&peer));
        assert!(!queues.has_keepalive_for(&other));
        queues.clear();
        assert_eq!(queues.len(), 0);
    }

    #[test]
    fn drained_neighbors_are_forgotten() {
        let mut queues = TxQueues::new(4);
        let peer = LinkAddr::new([1; 8]);
        let other = LinkAddr::new([2; 8]);

        assert_eq!(queues.pop_for(&cell(peer, LinkOptions::TX)), None);
        assert!(queues.neighbors.is_empty());

        queues.push(data(1, Some(peer))).expect("room");
        queues.push(data(2, Some(other))).expect("room");
        queues.pop_for(&cell(peer, LinkOptions::TX)).expect("queued for peer");
        assert_eq!(queues.neighbors.len(), 1);

        let shared = cell(LinkAddr::NULL, LinkOptions::TX | LinkOptions::SHARED);
        queues.pop_for(&shared).expect("queued for other");
        assert!(queues.neighbors.is_empty());
    }
}
