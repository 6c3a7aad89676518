//! A bounded, drop-oldest FIFO of outbound/inbound packets.
//!
//! Grounded in `original_source/src/queue_msg.cpp`'s `QueueMsg`: a single
//! lock scope per operation, no condvar owned by the queue itself (the
//! engine pairs one externally), capacity 10, and `pop()` on an empty queue
//! returns `Packet::invalid()` rather than an `Option`.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::packet::Packet;

const DEFAULT_CAPACITY: usize = 10;

pub struct PacketQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Packet>>,
}

impl PacketQueue {
    pub fn new() -> PacketQueue {
        PacketQueue::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> PacketQueue {
        PacketQueue {
            capacity,
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Push a packet onto the back. If the queue is already at capacity the
    /// oldest (front) entry is dropped first. Returns `true` if a drop
    /// occurred.
    pub fn push(&self, packet: Packet) -> bool {
        let mut guard = self.inner.lock().unwrap();
        let dropped = if guard.len() >= self.capacity {
            guard.pop_front();
            true
        } else {
            false
        };
        guard.push_back(packet);
        dropped
    }

    /// Pop the oldest packet, or `Packet::invalid()` if the queue is empty.
    pub fn pop(&self) -> Packet {
        let mut guard = self.inner.lock().unwrap();
        guard.pop_front().unwrap_or_else(Packet::invalid)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn max_capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for PacketQueue {
    fn default() -> PacketQueue {
        PacketQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sequence: u16) -> Packet {
        Packet::from_fields(0x202, 0xc309, sequence, vec![])
    }

    #[test]
    fn pop_on_empty_returns_invalid_sentinel() {
        let q = PacketQueue::new();
        assert!(!q.pop().is_valid());
    }

    #[test]
    fn fifo_ordering_is_preserved() {
        let q = PacketQueue::new();
        q.push(sample(1));
        q.push(sample(2));
        assert_eq!(q.pop().sequence(), 1);
        assert_eq!(q.pop().sequence(), 2);
    }

    #[test]
    fn overflow_drops_oldest_entry() {
        let q = PacketQueue::with_capacity(10);
        for seq in 0..11 {
            q.push(sample(seq));
        }
        // sequence 0 was dropped to make room for sequence 10.
        assert_eq!(q.pop().sequence(), 1);
        assert_eq!(q.len(), 9);
    }

    #[test]
    fn clear_empties_the_queue() {
        let q = PacketQueue::new();
        q.push(sample(1));
        q.clear();
        assert!(q.is_empty());
    }
}
