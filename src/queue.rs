//! Delivery queue: the single ordered hand-off between producer
//! threads (per-device sample pumps, client-protocol servers) and the
//! one consumer thread. See `spec.md` §4.8/§5.
//!
//! Grounded on the teacher's `src/stream.rs`, whose inter-block buffer
//! is a `Mutex<VecDeque<_>>` plus a `Condvar` the reader waits on;
//! generalized from a single-producer/single-consumer sample buffer
//! into a multi-producer typed FIFO of delivery items, since the
//! teacher's own queue only ever connects two blocks in a pipeline.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::ax25::Packet;

/// Channel activity kind reported by [`DeliveryItem::ChannelBusy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Ptt,
    Dcd,
}

/// Typed union of everything that can cross the delivery queue.
#[derive(Debug, Clone)]
pub enum DeliveryItem {
    /// A fully arbitrated received frame, per `spec.md` §6 `deliver()`.
    Received {
        channel: usize,
        subchannel: usize,
        slice: usize,
        packet: Packet,
        level: f64,
        fec_kind: crate::arbiter::FecKind,
        retries: u32,
        spectrum: String,
    },
    /// A client-protocol connect request.
    ConnectRequest { client: usize, remote: Packet },
    /// A client-protocol disconnect request.
    DisconnectRequest { client: usize },
    /// A client-protocol transmit-data request; the payload is owned
    /// by this item until the consumer removes it.
    TransmitDataRequest { client: usize, data: Vec<u8> },
    /// Register a callsign for a client.
    RegisterCallsign { client: usize, callsign: String },
    /// Unregister a previously registered callsign.
    UnregisterCallsign { client: usize, callsign: String },
    /// Poll for outstanding (unacked) frames.
    OutstandingFramesRequest { client: usize },
    /// A channel busy/idle transition (PTT or DCD).
    ChannelBusy {
        channel: usize,
        subchannel: usize,
        slice: usize,
        kind: ActivityKind,
        busy: bool,
    },
    /// A successful channel seizure confirmation (ready to transmit).
    SeizeConfirm { channel: usize },
    /// A client disconnected; release any state keyed on it.
    ClientCleanup { client: usize },
}

const WARN_LEN: usize = 10;

struct Inner {
    items: VecDeque<DeliveryItem>,
    reader_waiting: bool,
}

/// Singly-ordered FIFO protected by a mutex and condition variable.
///
/// Ordering guarantee: strict FIFO across all producers (`spec.md`
/// §5); each producer's own appends are delivered to the consumer in
/// the order they were made, and the queue does not fan out to more
/// than one consumer.
pub struct DeliveryQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                reader_waiting: false,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Append an item at the tail, waking a waiting consumer. Logs a
    /// warning (does not block or reject) if the queue is already
    /// deeper than [`WARN_LEN`], which is evidence the consumer is
    /// stuck.
    pub fn append(&self, item: DeliveryItem) {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.items.push_back(item);
        if inner.items.len() > WARN_LEN {
            log::warn!(
                "delivery queue depth {} exceeds warn threshold {WARN_LEN}; consumer may be blocked",
                inner.items.len()
            );
        }
        if inner.reader_waiting {
            inner.reader_waiting = false;
            self.not_empty.notify_one();
        }
    }

    /// Block until an item is available or `timeout` elapses. Returns
    /// `true` if the wait timed out with the queue still empty.
    pub fn wait_while_empty(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if !inner.items.is_empty() {
            return false;
        }
        inner.reader_waiting = true;
        let deadline = Instant::now() + timeout;
        while inner.items.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                inner.reader_waiting = false;
                return true;
            }
            let (guard, result) = self
                .not_empty
                .wait_timeout(inner, remaining)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner = guard;
            if result.timed_out() && inner.items.is_empty() {
                inner.reader_waiting = false;
                return true;
            }
        }
        false
    }

    /// Unlink and return the head item, if any.
    pub fn remove(&self) -> Option<DeliveryItem> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.items.pop_front()
    }

    /// Current queue length, for diagnostics/tests.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_single_producer() {
        let q = DeliveryQueue::new();
        for client in 0..5 {
            q.append(DeliveryItem::DisconnectRequest { client });
        }
        for expect in 0..5 {
            match q.remove().unwrap() {
                DeliveryItem::DisconnectRequest { client } => assert_eq!(client, expect),
                _ => panic!("wrong item"),
            }
        }
        assert!(q.remove().is_none());
    }

    #[test]
    fn per_producer_fifo_across_threads() {
        let q = Arc::new(DeliveryQueue::new());
        let mut handles = Vec::new();
        for producer in 0..4 {
            let q = Arc::clone(&q);
            handles.push(thread::spawn(move || {
                for seq in 0..50 {
                    q.append(DeliveryItem::RegisterCallsign {
                        client: producer,
                        callsign: format!("{producer}:{seq}"),
                    });
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let mut last_seq = [-1i64; 4];
        let mut total = 0;
        while let Some(item) = q.remove() {
            if let DeliveryItem::RegisterCallsign { client, callsign } = item {
                let seq: i64 = callsign.split(':').nth(1).unwrap().parse().unwrap();
                assert!(seq > last_seq[client]);
                last_seq[client] = seq;
                total += 1;
            }
        }
        assert_eq!(total, 200);
    }

    #[test]
    fn wait_while_empty_times_out() {
        let q = DeliveryQueue::new();
        let timed_out = q.wait_while_empty(Duration::from_millis(20));
        assert!(timed_out);
    }

    #[test]
    fn wait_while_empty_returns_immediately_when_populated() {
        let q = DeliveryQueue::new();
        q.append(DeliveryItem::ClientCleanup { client: 0 });
        let timed_out = q.wait_while_empty(Duration::from_secs(5));
        assert!(!timed_out);
    }

    #[test]
    fn append_wakes_a_blocked_waiter() {
        let q = Arc::new(DeliveryQueue::new());
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.wait_while_empty(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        q.append(DeliveryItem::ClientCleanup { client: 1 });
        let timed_out = handle.join().unwrap();
        assert!(!timed_out);
    }
}
