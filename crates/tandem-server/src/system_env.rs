//! Wall-clock time and OS entropy for the running relay.

use std::time::Instant;

use crate::env::Environment;

/// [`Environment`] backed by the system clock and `getrandom`.
///
/// Session ids drawn from it are unpredictable to clients.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(e) = getrandom::fill(buffer) {
            // The registry probes past colliding ids.
            tracing::error!("OS entropy unavailable, session ids degrade to sequential: {}", e);
            buffer.fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionRegistry;

    #[test]
    fn clock_is_monotonic() {
        let env = SystemEnv::new();
        let earlier = env.now();
        assert!(env.now() >= earlier);
    }

    #[test]
    fn session_ids_are_distinct_and_nonzero() {
        let env = SystemEnv::new();
        let mut registry = ConnectionRegistry::new();

        let ids: Vec<_> = (0..64).map(|_| registry.register(&env)).collect();

        assert!(ids.iter().all(|id| *id != 0));
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn consecutive_draws_differ() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64());
    }
}
