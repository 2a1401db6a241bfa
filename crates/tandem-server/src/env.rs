//! Time and randomness seam.
//!
//! The driver never reads the clock or an RNG directly. Production wires in
//! [`crate::SystemEnv`]; the simulation harness wires in a seeded RNG and a
//! virtual clock so session ids and lifetimes replay exactly.
//!
//! Implementations must keep `now()` monotonic, and a seeded implementation
//! must yield the same `random_bytes()` sequence for the same seed.

use std::time::Instant;

/// Source of time and randomness for the relay.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current time. Never earlier than a previous call.
    fn now(&self) -> Instant;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`, used for session ids.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
