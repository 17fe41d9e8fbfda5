//! Lamport scalar clock.

use parking_lot::Mutex;
use std::fmt;

/// Single scalar logical timestamp with the happens-before receive rule.
///
/// Every read and mutation goes through one lock, so concurrent local
/// events on the same node serialize correctly.
pub struct LamportClock {
    /// Owning node's id
    node_id: String,

    /// Guarded counter
    counter: Mutex<u64>,
}

impl LamportClock {
    /// Create a clock owned by `node_id`, starting at 0.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            counter: Mutex::new(0),
        }
    }

    /// Get the owning node's id.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Record a local event. Returns the new time.
    pub fn tick(&self) -> u64 {
        let mut counter = self.counter.lock();
        *counter += 1;
        tracing::debug!(node = %self.node_id, time = *counter, "lamport tick");
        *counter
    }

    /// Record a message receipt stamped with `received`.
    ///
    /// Sets the counter to `max(local, received) + 1`, ordering the
    /// receive event after the send that produced `received`. Returns the
    /// new time.
    pub fn update(&self, received: u64) -> u64 {
        let mut counter = self.counter.lock();
        *counter = (*counter).max(received) + 1;
        tracing::debug!(node = %self.node_id, received, time = *counter, "lamport update");
        *counter
    }

    /// Read the current time.
    pub fn time(&self) -> u64 {
        *self.counter.lock()
    }
}

impl fmt::Display for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.time())
    }
}

impl fmt::Debug for LamportClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LamportClock")
            .field("node_id", &self.node_id)
            .field("counter", &self.time())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_advances_by_one() {
        let clock = LamportClock::new("N1");
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.time(), 2);
    }

    #[test]
    fn test_update_takes_max_plus_one() {
        let clock = LamportClock::new("N1");
        clock.tick();
        clock.tick();

        // Received time ahead of local: jump past it.
        assert_eq!(clock.update(10), 11);

        // Received time behind local: still advance by one.
        assert_eq!(clock.update(3), 12);
    }

    #[test]
    fn test_update_orders_receive_after_send() {
        let sender = LamportClock::new("A");
        let receiver = LamportClock::new("B");

        let send_time = sender.tick();
        let recv_time = receiver.update(send_time);

        assert!(recv_time > send_time);
    }

    #[test]
    fn test_concurrent_ticks_serialize() {
        use std::sync::Arc;

        let clock = Arc::new(LamportClock::new("N1"));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        clock.tick();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(clock.time(), 800);
    }

    #[test]
    fn test_display() {
        let clock = LamportClock::new("N1");
        clock.tick();
        assert_eq!(clock.to_string(), "N1:1");
    }
}
