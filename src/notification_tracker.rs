// Notification tracker - remembers which routes were announced and when, so the same
// origin/entry/exit/destination combination is not re-announced inside the cooldown.
//
// Records are purged lazily by `sweep()` once they are older than twice the cooldown.

use crate::connection::{ConnectionId, SystemId};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use tokio::time::{Duration, Instant};

/// Identity of an announced route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteFingerprint {
    pub origin_id: SystemId,
    pub entry_connection_id: ConnectionId,
    pub exit_connection_id: ConnectionId,
    pub destination_id: SystemId,
}

impl std::fmt::Display for RouteFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.origin_id, self.entry_connection_id, self.exit_connection_id, self.destination_id
        )
    }
}

/// Per-route cooldown tracker.
///
/// A fingerprint may fire when it has never fired or its last firing is at least
/// `cooldown` old. Recording a firing is unconditional and never rolled back, even if
/// delivery fails afterwards.
pub struct NotificationTracker {
    last_fired: DashMap<RouteFingerprint, Instant>,
    cooldown: Duration,
}

impl NotificationTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_fired: DashMap::new(),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn should_fire(&self, fingerprint: &RouteFingerprint) -> bool {
        match self.last_fired.get(fingerprint) {
            Some(at) => at.elapsed() >= self.cooldown,
            None => true,
        }
    }

    pub fn record_firing(&self, fingerprint: RouteFingerprint) {
        self.last_fired.insert(fingerprint, Instant::now());
    }

    /// `should_fire` and `record_firing` under a single entry lock.
    pub fn check_and_record(&self, fingerprint: RouteFingerprint) -> bool {
        let now = Instant::now();
        match self.last_fired.entry(fingerprint) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
            Entry::Occupied(mut slot) => {
                if now.duration_since(*slot.get()) >= self.cooldown {
                    slot.insert(now);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Drops fingerprints last fired more than `2 × cooldown` ago. Returns how many.
    pub fn sweep(&self) -> usize {
        let retention = self.cooldown * 2;
        let before = self.last_fired.len();
        self.last_fired.retain(|_, at| at.elapsed() <= retention);
        let removed = before.saturating_sub(self.last_fired.len());
        if removed > 0 {
            debug!("Swept {} expired notification records", removed);
        }
        removed
    }

    pub fn contains(&self, fingerprint: &RouteFingerprint) -> bool {
        self.last_fired.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}
