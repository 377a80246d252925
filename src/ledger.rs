// =============================================================================
// Rate Ledger — current and previous funding-rate snapshots
// =============================================================================
//
// The single source of truth for "what changed since last cycle". Holds
// exactly two snapshots: `current` and `previous`. The orchestrator is the
// sole writer; every other component reads immutable references for the
// duration of one cycle.
//
// Invariant: `previous` is always the exact `current` of the immediately
// preceding cycle — change detection is strictly one-cycle-lag.

use chrono::{DateTime, Utc};

use crate::types::RateMap;

/// Two-deep snapshot ledger owned by the cycle orchestrator.
#[derive(Debug, Default)]
pub struct RateLedger {
    current: RateMap,
    previous: Option<RateMap>,
    current_at: Option<DateTime<Utc>>,
}

impl RateLedger {
    /// Create an empty ledger with no baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically rotate: `previous := current`, `current := snapshot`.
    ///
    /// On the very first call `previous` stays `None` — there is no prior
    /// baseline to diff against. Must be called exactly once per cycle,
    /// after all consumers of the old `previous` have run.
    pub fn update(&mut self, snapshot: RateMap, at: DateTime<Utc>) {
        let old = std::mem::replace(&mut self.current, snapshot);
        if self.current_at.is_some() {
            self.previous = Some(old);
        }
        self.current_at = Some(at);
    }

    /// The latest snapshot. Empty before the first update.
    pub fn current(&self) -> &RateMap {
        &self.current
    }

    /// The snapshot from the immediately preceding cycle, if any.
    pub fn previous(&self) -> Option<&RateMap> {
        self.previous.as_ref()
    }

    /// Logical timestamp of `current`, if at least one update has happened.
    pub fn current_at(&self) -> Option<DateTime<Utc>> {
        self.current_at
    }
}
