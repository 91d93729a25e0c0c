/// Shift - one time-windowed accounting bucket for a single session
///
/// Tracks:
/// - valid / invalid / stale share counts
/// - cumulative difficulty (sum of per-share difficulty, hashrate estimator)
/// - last share timestamp
///
/// All counters are lock-free atomics so share increments from the owning
/// connection never contend with metadata reads elsewhere. A shift is Active
/// until its session rotates it, after which it is Finalized and immutable.
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct Shift {
    shares: AtomicU64,
    invalid: AtomicU64,
    stale: AtomicU64,
    /// f64 running sum stored as raw bits, updated with a CAS loop.
    cumulative_difficulty: AtomicU64,
    /// Unix millis of the most recent share; 0 means no share yet.
    last_share_millis: AtomicI64,
    started_at: DateTime<Utc>,
    finalized: AtomicBool,
}

impl Shift {
    pub fn new() -> Self {
        Self {
            shares: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            stale: AtomicU64::new(0),
            cumulative_difficulty: AtomicU64::new(0f64.to_bits()),
            last_share_millis: AtomicI64::new(0),
            started_at: Utc::now(),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn shares(&self) -> u64 {
        self.shares.load(Ordering::Acquire)
    }

    pub fn increment_shares(&self) {
        self.shares.fetch_add(1, Ordering::AcqRel);
    }

    pub fn invalid(&self) -> u64 {
        self.invalid.load(Ordering::Acquire)
    }

    pub fn increment_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::AcqRel);
    }

    pub fn stale(&self) -> u64 {
        self.stale.load(Ordering::Acquire)
    }

    pub fn increment_stale(&self) {
        self.stale.fetch_add(1, Ordering::AcqRel);
    }

    pub fn cumulative_difficulty(&self) -> f64 {
        f64::from_bits(self.cumulative_difficulty.load(Ordering::Acquire))
    }

    pub fn increment_cumulative_difficulty(&self, delta: f64) {
        // fetch_update never yields Err here since the closure is total.
        let _ = self
            .cumulative_difficulty
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }

    pub fn last_share_time(&self) -> Option<DateTime<Utc>> {
        let millis = self.last_share_millis.load(Ordering::Acquire);
        if millis == 0 {
            return None;
        }
        Utc.timestamp_millis_opt(millis).single()
    }

    pub fn set_last_share_time(&self, t: DateTime<Utc>) {
        self.last_share_millis
            .store(t.timestamp_millis(), Ordering::Release);
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Mark the shift immutable. Returns false if it was already finalized,
    /// so a shift can only transition Active -> Finalized once.
    pub(crate) fn finalize(&self) -> bool {
        !self.finalized.swap(true, Ordering::AcqRel)
    }
}

impl Default for Shift {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a rotated-out shift, handed to settlement.
#[derive(Debug, Clone)]
pub struct FinalizedShift {
    shift: Arc<Shift>,
    ended_at: DateTime<Utc>,
}

impl FinalizedShift {
    pub(crate) fn new(shift: Arc<Shift>) -> Self {
        debug_assert!(shift.is_finalized());
        Self {
            shift,
            ended_at: Utc::now(),
        }
    }

    pub fn shares(&self) -> u64 {
        self.shift.shares()
    }

    pub fn invalid(&self) -> u64 {
        self.shift.invalid()
    }

    pub fn stale(&self) -> u64 {
        self.shift.stale()
    }

    pub fn cumulative_difficulty(&self) -> f64 {
        self.shift.cumulative_difficulty()
    }

    pub fn last_share_time(&self) -> Option<DateTime<Utc>> {
        self.shift.last_share_time()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.shift.started_at()
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    pub fn is_empty(&self) -> bool {
        self.shares() == 0 && self.invalid() == 0 && self.stale() == 0
    }
}
