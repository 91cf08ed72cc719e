//! In-process quarantine backed by a concurrent map.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, warn};

use super::{EnvelopeQuarantine, QuarantinePolicy};
use crate::domain::{Envelope, EnvelopeId};

/// Failure counter keyed by envelope id.
///
/// A record is created on the first failure and removed either by
/// `try_release` or when the count reaches the abandonment threshold. The
/// increment, the threshold check and the removal happen while holding the
/// entry's shard lock, so concurrent reports for one id never lose updates
/// and exactly one caller observes the abandonment.
///
/// Create one per process and share it with `Arc`.
#[derive(Debug, Default)]
pub struct MemoryQuarantine {
    failures: DashMap<EnvelopeId, u32>,
    policy: QuarantinePolicy,
}

impl MemoryQuarantine {
    pub fn new(policy: QuarantinePolicy) -> Self {
        Self {
            failures: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> QuarantinePolicy {
        self.policy
    }

    /// Current failure count, if the envelope is tracked.
    pub fn failure_count(&self, envelope_id: &EnvelopeId) -> Option<u32> {
        self.failures.get(envelope_id).map(|count| *count)
    }

    /// Number of envelopes currently tracked.
    pub fn tracked(&self) -> usize {
        self.failures.len()
    }

    /// Increment the counter and return (new count, abandoned).
    fn record_failure(&self, envelope_id: &EnvelopeId) -> (u32, bool) {
        match self.failures.entry(envelope_id.clone()) {
            Entry::Occupied(mut entry) => {
                let failures = entry.get().saturating_add(1);
                if self.policy.should_abandon(failures) {
                    entry.remove();
                    (failures, true)
                } else {
                    *entry.get_mut() = failures;
                    (failures, false)
                }
            }
            Entry::Vacant(entry) => {
                if self.policy.should_abandon(1) {
                    (1, true)
                } else {
                    entry.insert(1);
                    (1, false)
                }
            }
        }
    }
}

impl EnvelopeQuarantine for MemoryQuarantine {
    fn try_to_quarantine(&self, envelope: Option<&Envelope>, cause: &str) -> bool {
        let Some(envelope) = envelope else {
            warn!(cause, "failure without a decoded envelope, abandoning");
            return true;
        };

        let envelope_id = envelope.envelope_id();
        let (failures, abandoned) = self.record_failure(envelope_id);
        if abandoned {
            warn!(
                %envelope_id,
                failures,
                max_attempts = self.policy.max_attempts,
                cause,
                "retry budget exhausted, abandoning envelope"
            );
        } else {
            debug!(
                %envelope_id,
                failures,
                max_attempts = self.policy.max_attempts,
                cause,
                "envelope failed, will retry"
            );
        }
        abandoned
    }

    fn try_release(&self, envelope: Option<&Envelope>) {
        if let Some(envelope) = envelope
            && self.failures.remove(envelope.envelope_id()).is_some()
        {
            debug!(envelope_id = %envelope.envelope_id(), "released failure record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn envelope(id: &str) -> Envelope {
        Envelope::new(EnvelopeId::new(id), Utc::now(), serde_json::json!({}))
    }

    #[test]
    fn three_failures_retry_and_the_fourth_abandons() {
        let quarantine = MemoryQuarantine::default();
        let env = envelope("e-1");

        assert!(!quarantine.try_to_quarantine(Some(&env), "boom"));
        assert!(!quarantine.try_to_quarantine(Some(&env), "boom"));
        assert!(!quarantine.try_to_quarantine(Some(&env), "boom"));
        assert_eq!(quarantine.failure_count(env.envelope_id()), Some(3));

        assert!(quarantine.try_to_quarantine(Some(&env), "boom"));
        assert_eq!(quarantine.failure_count(env.envelope_id()), None);
        assert_eq!(quarantine.tracked(), 0);
    }

    #[test]
    fn abandoned_envelope_starts_a_fresh_budget() {
        let quarantine = MemoryQuarantine::default();
        let env = envelope("e-1");
        for _ in 0..4 {
            quarantine.try_to_quarantine(Some(&env), "boom");
        }

        assert!(!quarantine.try_to_quarantine(Some(&env), "boom"));
        assert_eq!(quarantine.failure_count(env.envelope_id()), Some(1));
    }

    #[test]
    fn missing_envelope_is_always_abandoned_without_tracking() {
        let quarantine = MemoryQuarantine::default();
        let env = envelope("e-1");
        quarantine.try_to_quarantine(Some(&env), "boom");

        for _ in 0..10 {
            assert!(quarantine.try_to_quarantine(None, "decode failed"));
        }
        assert_eq!(quarantine.tracked(), 1);
        assert_eq!(quarantine.failure_count(env.envelope_id()), Some(1));
    }

    #[test]
    fn release_resets_the_budget() {
        let quarantine = MemoryQuarantine::default();
        let env = envelope("e-1");
        quarantine.try_to_quarantine(Some(&env), "boom");
        quarantine.try_to_quarantine(Some(&env), "boom");

        quarantine.try_release(Some(&env));
        assert_eq!(quarantine.failure_count(env.envelope_id()), None);

        assert!(!quarantine.try_to_quarantine(Some(&env), "boom"));
        assert_eq!(quarantine.failure_count(env.envelope_id()), Some(1));
    }

    #[test]
    fn release_is_idempotent_and_ignores_unknown_ids() {
        let quarantine = MemoryQuarantine::default();
        let env = envelope("never-failed");

        quarantine.try_release(Some(&env));
        quarantine.try_release(Some(&env));
        quarantine.try_release(None);
        assert_eq!(quarantine.tracked(), 0);
    }

    #[test]
    fn ids_are_tracked_independently() {
        let quarantine = MemoryQuarantine::default();
        let a = envelope("a");
        let b = envelope("b");
        for _ in 0..3 {
            quarantine.try_to_quarantine(Some(&a), "boom");
        }

        assert!(!quarantine.try_to_quarantine(Some(&b), "boom"));
        assert!(quarantine.try_to_quarantine(Some(&a), "boom"));
        assert_eq!(quarantine.failure_count(b.envelope_id()), Some(1));
    }

    #[test]
    fn concurrent_failures_are_not_lost() {
        let quarantine = Arc::new(MemoryQuarantine::new(QuarantinePolicy::new(u32::MAX)));
        let env = envelope("shared");
        let threads = 8;
        let per_thread = 250;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let quarantine = Arc::clone(&quarantine);
                let env = env.clone();
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        assert!(!quarantine.try_to_quarantine(Some(&env), "boom"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            quarantine.failure_count(env.envelope_id()),
            Some(threads * per_thread)
        );
    }

    #[test]
    fn concurrent_failures_abandon_exactly_once_per_budget() {
        let quarantine = Arc::new(MemoryQuarantine::default());
        let env = envelope("shared");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let quarantine = Arc::clone(&quarantine);
                let env = env.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|_| quarantine.try_to_quarantine(Some(&env), "boom"))
                        .count()
                })
            })
            .collect();
        let abandoned: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // 800 failures = 200 full budgets of 4
        assert_eq!(abandoned, 200);
        assert_eq!(quarantine.failure_count(env.envelope_id()), None);
    }
}
