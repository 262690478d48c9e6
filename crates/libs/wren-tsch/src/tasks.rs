//! Due-time ordered timer queue.
//!
//! Each task kind is pending at most once; scheduling it again moves it.
//! Tasks due at the same tick run in the order they were scheduled.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TschTask {
    /// Radio poll while looking for a network.
    AssociationPoll,
    /// Next timeslot boundary.
    Slot,
    SendEb,
    SendKeepalive,
    DesyncCheck,
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Reverse<(u64, u64, TschTask)>>,
    seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: u64, task: TschTask) {
        self.cancel(task);
        self.seq += 1;
        self.heap.push(Reverse((due, self.seq, task)));
    }

    pub fn cancel(&mut self, task: TschTask) {
        self.heap.retain(|Reverse((_, _, pending))| *pending != task);
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn is_scheduled(&self, task: TschTask) -> bool {
        self.heap.iter().any(|Reverse((_, _, pending))| *pending == task)
    }

    pub fn due_time(&self, task: TschTask) -> Option<u64> {
        self.heap
            .iter()
            .find(|Reverse((_, _, pending))| *pending == task)
            .map(|Reverse((due, _, _))| *due)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse((due, _, _))| *due)
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<(u64, TschTask)> {
        if self.next_due()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse((due, _, task))| (due, task))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TaskQueue, now: u64) -> Vec<TschTask> {
        std::iter::from_fn(|| queue.pop_due(now)).map(|(_, task)| task).collect()
    }

    #[test]
    fn earliest_task_runs_first() {
        let mut queue = TaskQueue::new();
        queue.schedule(30, TschTask::SendEb);
        queue.schedule(10, TschTask::Slot);
        queue.schedule(20, TschTask::SendKeepalive);

        assert_eq!(queue.next_due(), Some(10));
        assert_eq!(drain(&mut queue, 25), vec![TschTask::Slot, TschTask::SendKeepalive]);
        assert_eq!(queue.len(), 1);
        assert_eq!(drain(&mut queue, 30), vec![TschTask::SendEb]);
    }

    #[test]
    fn ties_keep_scheduling_order() {
        let mut queue = TaskQueue::new();
        queue.schedule(5, TschTask::DesyncCheck);
        queue.schedule(5, TschTask::Slot);
        queue.schedule(5, TschTask::AssociationPoll);
        assert_eq!(
            drain(&mut queue, 5),
            vec![TschTask::DesyncCheck, TschTask::Slot, TschTask::AssociationPoll]
        );
    }

    #[test]
    fn rescheduling_moves_the_pending_task() {
        let mut queue = TaskQueue::new();
        queue.schedule(5, TschTask::SendKeepalive);
        queue.schedule(50, TschTask::SendKeepalive);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.due_time(TschTask::SendKeepalive), Some(50));
        assert!(drain(&mut queue, 49).is_empty());

        queue.cancel(TschTask::SendKeepalive);
        assert!(!queue.is_scheduled(TschTask::SendKeepalive));
        assert!(queue.is_empty());
    }
}
