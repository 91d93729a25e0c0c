/// Session - the accounting context bound to one live connection
///
/// Owns exactly one current Shift. Share accounting goes through the
/// record_* methods, which hold the shift slot's read guard while they
/// touch the counters; rotation takes the write guard, so every increment
/// lands wholly in either the rotated-out shift or the fresh one.
///
/// Shift ownership travels with the session's rotation cadence rather than
/// with the worker identity: a worker rebinding to a new session does not
/// disturb an in-progress shift.
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::shift::{FinalizedShift, Shift};

#[derive(Debug)]
pub struct Session {
    id: u64,
    started_at: DateTime<Utc>,
    shift: RwLock<Arc<Shift>>,
    /// Live vardiff target for this connection, f64 bits.
    difficulty: AtomicU64,
}

impl Session {
    pub fn new(id: u64, initial_difficulty: f64) -> Arc<Self> {
        Arc::new(Self {
            id,
            started_at: Utc::now(),
            shift: RwLock::new(Arc::new(Shift::new())),
            difficulty: AtomicU64::new(initial_difficulty.to_bits()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Handle to the current shift, for stats reads. Mutation goes through
    /// the record_* methods so it cannot straddle a rotation.
    pub fn shift(&self) -> Arc<Shift> {
        self.shift.read().unwrap().clone()
    }

    /// Count one accepted share at the given difficulty.
    pub fn record_share(&self, difficulty: f64) {
        let shift = self.shift.read().unwrap();
        shift.increment_shares();
        shift.increment_cumulative_difficulty(difficulty);
        shift.set_last_share_time(Utc::now());
    }

    pub fn record_invalid(&self) {
        self.shift.read().unwrap().increment_invalid();
    }

    pub fn record_stale(&self) {
        self.shift.read().unwrap().increment_stale();
    }

    pub fn set_last_share_time(&self, t: DateTime<Utc>) {
        self.shift.read().unwrap().set_last_share_time(t);
    }

    /// Swap in a fresh shift and return the previous one, finalized.
    ///
    /// Increments that began before the swap complete against the previous
    /// shift (they hold the read guard); increments starting after see the
    /// fresh one. Nothing is counted twice or dropped.
    pub fn rotate(&self) -> FinalizedShift {
        let mut slot = self.shift.write().unwrap();
        let previous = std::mem::replace(&mut *slot, Arc::new(Shift::new()));
        previous.finalize();
        FinalizedShift::new(previous)
    }

    pub fn current_difficulty(&self) -> f64 {
        f64::from_bits(self.difficulty.load(Ordering::Acquire))
    }

    pub fn set_current_difficulty(&self, difficulty: f64) {
        self.difficulty.store(difficulty.to_bits(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn record_share_updates_count_difficulty_and_time() {
        let session = Session::new(1, 1000.0);
        session.record_share(250.0);
        session.record_share(250.0);
        let shift = session.shift();
        assert_eq!(shift.shares(), 2);
        assert_eq!(shift.cumulative_difficulty(), 500.0);
        assert!(shift.last_share_time().is_some());
    }

    #[test]
    fn rotate_partitions_increments() {
        let session = Session::new(1, 1000.0);
        for _ in 0..7 {
            session.record_share(10.0);
        }
        session.record_invalid();

        let finalized = session.rotate();
        assert_eq!(finalized.shares(), 7);
        assert_eq!(finalized.invalid(), 1);
        assert_eq!(session.shift().shares(), 0);

        for _ in 0..3 {
            session.record_share(10.0);
        }
        assert_eq!(session.shift().shares(), 3);
        // rotated-out shift is frozen
        assert_eq!(finalized.shares(), 7);
        assert!(finalized.shares() > 0 && finalized.ended_at() >= finalized.started_at());
    }

    #[test]
    fn rotation_under_fire_loses_no_increment() {
        let session = Session::new(1, 1000.0);
        let writers = 4;
        let per_writer = 5_000;

        let mut handles = Vec::new();
        for _ in 0..writers {
            let session = session.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..per_writer {
                    session.record_share(1.0);
                }
            }));
        }
        let rotator = {
            let session = session.clone();
            thread::spawn(move || {
                let mut drained = Vec::new();
                for _ in 0..50 {
                    drained.push(session.rotate());
                    thread::yield_now();
                }
                drained
            })
        };
        for h in handles {
            h.join().unwrap();
        }
        let drained = rotator.join().unwrap();
        let last = session.rotate();

        let total: u64 = drained.iter().map(|s| s.shares()).sum::<u64>() + last.shares();
        assert_eq!(total, writers * per_writer);
    }

    #[test]
    fn difficulty_is_live() {
        let session = Session::new(1, 1000.0);
        assert_eq!(session.current_difficulty(), 1000.0);
        session.set_current_difficulty(4096.0);
        assert_eq!(session.current_difficulty(), 4096.0);
    }
}
