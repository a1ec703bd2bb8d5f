//! Byte-pipe transports for driving [`a12_core::session::Session`] in tests.
//!
//! Two flavors are provided:
//!
//! - [`duplex_pair`]: an in-process, zero-latency pair of byte queues. Fast
//!   and fully deterministic; used by [`crate::cluster::TestCluster`] and
//!   model-based tests that only care about protocol state machines, not
//!   network conditions.
//! - [`turmoil::net::TcpStream`] directly, used by [`crate::sim_driver`] and
//!   [`crate::sim_server`] for scenarios that need real latency, partition,
//!   and packet-loss injection from Turmoil's simulated network.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

/// One direction of an in-process byte pipe.
struct PipeHalf {
    queue: Mutex<VecDeque<u8>>,
    notify: Notify,
    closed: Mutex<bool>,
}

impl PipeHalf {
    fn new() -> Self {
        Self { queue: Mutex::new(VecDeque::new()), notify: Notify::new(), closed: Mutex::new(false) }
    }

    fn push(&self, bytes: &[u8]) {
        self.queue.lock().expect("pipe mutex poisoned").extend(bytes.iter().copied());
        self.notify.notify_waiters();
    }

    fn close(&self) {
        *self.closed.lock().expect("pipe mutex poisoned") = true;
        self.notify.notify_waiters();
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        loop {
            {
                let mut queue = self.queue.lock().expect("pipe mutex poisoned");
                if !queue.is_empty() {
                    return Some(queue.drain(..).collect());
                }
                if *self.closed.lock().expect("pipe mutex poisoned") {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// One endpoint of an in-process duplex byte pipe, mimicking a transport
/// half without any actual socket or network simulation underneath.
pub struct DuplexEnd {
    outbound: Arc<PipeHalf>,
    inbound: Arc<PipeHalf>,
}

impl DuplexEnd {
    /// Writes bytes to the peer endpoint. Never blocks.
    pub fn send(&self, bytes: &[u8]) {
        self.outbound.push(bytes);
    }

    /// Awaits the next batch of bytes written by the peer since the last
    /// call. Returns `None` once the peer has closed its end.
    pub async fn recv(&self) -> Option<Vec<u8>> {
        self.inbound.recv().await
    }

    /// Closes this endpoint; the peer's next `recv` (after draining
    /// whatever is already queued) observes end-of-stream.
    pub fn close(&self) {
        self.outbound.close();
    }
}

/// Builds a connected pair of in-process duplex pipes: bytes sent on one
/// end arrive via `recv` on the other.
#[must_use]
pub fn duplex_pair() -> (DuplexEnd, DuplexEnd) {
    let a_to_b = Arc::new(PipeHalf::new());
    let b_to_a = Arc::new(PipeHalf::new());
    let a = DuplexEnd { outbound: Arc::clone(&a_to_b), inbound: Arc::clone(&b_to_a) };
    let b = DuplexEnd { outbound: b_to_a, inbound: a_to_b };
    (a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bytes_sent_on_one_end_arrive_on_the_other() {
        let (a, b) = duplex_pair();
        a.send(b"hello");
        let received = b.recv().await.unwrap();
        assert_eq!(received, b"hello");
    }

    #[tokio::test]
    async fn closing_an_end_yields_none_after_drain() {
        let (a, b) = duplex_pair();
        a.send(b"last");
        a.close();
        assert_eq!(b.recv().await, Some(b"last".to_vec()));
        assert_eq!(b.recv().await, None);
    }
}
