//! Per-client session state for the store clerk.
//!
//! A [`Session`] is owned by exactly one clerk. It carries the client's
//! identity, the monotone request sequence the store uses to collapse retried
//! duplicates, and the cached leader hint.

use rand::Rng;
use uuid::Uuid;

/// Client ids are 62-bit values drawn from a cryptographically secure
/// source, unique with overwhelming probability.
const CLIENT_ID_BITS: u64 = (1 << 62) - 1;

/// Draw a fresh 62-bit client id from the v4 uuid entropy pool.
fn nrand() -> u64 {
    (Uuid::new_v4().as_u128() as u64) & CLIENT_ID_BITS
}

/// Mutable per-client state: identity, request sequence, leader hint.
///
/// The sequence is advanced once per logical operation, before the first
/// attempt; retries of that operation reuse the same value. The leader hint
/// is advisory and only updated on a confirmed response.
#[derive(Debug)]
pub struct Session {
    client_id: u64,
    seq_id: u64,
    leader_hint: usize,
    servers: usize,
}

impl Session {
    /// Create a session for a cluster of `servers` replicas.
    ///
    /// The initial leader hint is uniform random so a fleet of clients
    /// starting together does not converge on one replica.
    pub fn new(servers: usize) -> Self {
        assert!(servers > 0, "cluster must have at least one server");
        Self {
            client_id: nrand(),
            seq_id: 0,
            leader_hint: rand::rng().random_range(0..servers),
            servers,
        }
    }

    pub fn client_id(&self) -> u64 {
        self.client_id
    }

    /// Advance the sequence and return the stamp for a new logical
    /// operation. Never returns the same value twice.
    pub fn next_seq(&mut self) -> u64 {
        self.seq_id += 1;
        self.seq_id
    }

    /// The replica to try first.
    pub fn leader_hint(&self) -> usize {
        self.leader_hint
    }

    /// Record a confirmed response from `server`.
    pub fn confirm_leader(&mut self, server: usize) {
        self.leader_hint = server;
    }

    /// The replica after `server` in round-robin order.
    pub fn next_server(&self, server: usize) -> usize {
        (server + 1) % self.servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_id_fits_in_62_bits() {
        for _ in 0..64 {
            assert!(Session::new(3).client_id() < (1 << 62));
        }
    }

    #[test]
    fn sequence_is_strictly_increasing() {
        let mut session = Session::new(5);
        let mut last = 0;
        for _ in 0..100 {
            let seq = session.next_seq();
            assert!(seq > last);
            last = seq;
        }
    }

    #[test]
    fn initial_leader_hint_is_in_range() {
        for _ in 0..64 {
            let session = Session::new(7);
            assert!(session.leader_hint() < 7);
        }
    }

    #[test]
    fn round_robin_wraps() {
        let session = Session::new(3);
        assert_eq!(session.next_server(0), 1);
        assert_eq!(session.next_server(2), 0);
    }
}
