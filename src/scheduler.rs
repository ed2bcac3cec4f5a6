// src/scheduler.rs
//
// Round-robin priority over the four lanes. Which lane is serviced is
// strictly rotation; how long its green lasts comes from fuzzy inference
// on the lane's queue length.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ControlConfig;
use crate::counts::LaneCountStore;
use crate::fuzzy::{self, DurationOutcome};
use crate::types::Lane;

/// Fraction of the priority lane's queue assumed to clear during its green.
pub const PASSAGE_RATIO: f64 = 0.8;

/// One scheduling decision. Durations are in seconds, rounded to one decimal.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub tick: u64,
    pub priority_lane: Lane,
    pub priority_duration_s: f64,
    pub durations_s: BTreeMap<Lane, f64>,
    pub updated_counts: BTreeMap<Lane, u32>,
    pub fallback_used: bool,
}

/// Owns the round-robin cursor. The cursor advances exactly once per tick,
/// never skipping a lane, regardless of counts.
pub struct CycleScheduler {
    store: LaneCountStore,
    cursor: usize,
    ticks: u64,
    passage_ratio: f64,
    fallback_duration_s: f64,
}

impl CycleScheduler {
    pub fn new(store: LaneCountStore, control: &ControlConfig) -> Self {
        Self {
            store,
            cursor: 0,
            ticks: 0,
            passage_ratio: control.passage_ratio,
            fallback_duration_s: control.fallback_duration_s,
        }
    }

    /// Decisions taken so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Current raw counts, no cursor movement, no mutation.
    pub fn current_counts(&self) -> BTreeMap<Lane, u32> {
        self.store.snapshot().to_map()
    }

    /// Take one scheduling decision. `supplied` overrides individual lanes
    /// for this decision (and is persisted); the store fills the rest.
    ///
    /// The read-merge-decay-write sequence runs inside one store update, so
    /// concurrent counter writes serialize against it instead of being lost.
    pub fn tick(&mut self, supplied: Option<&BTreeMap<Lane, u32>>) -> TickOutcome {
        let priority_lane = Lane::ALL[self.cursor];
        let passage_ratio = self.passage_ratio;

        let (priority_count, updated) = self.store.update(|counts| {
            if let Some(overrides) = supplied {
                for (&lane, &count) in overrides {
                    counts.set(lane, count);
                }
            }

            let before = counts.get(priority_lane);
            let passed = (f64::from(before) * passage_ratio).floor() as u32;
            counts.set(priority_lane, before.saturating_sub(passed));
            (before, *counts)
        });

        // Priority duration reflects the queue the lane had when its green
        // was granted, before the decay.
        let (priority_seconds, mut fallback_used) = self.inferred_seconds(priority_count);

        let mut durations_s = BTreeMap::new();
        for lane in Lane::ALL {
            let count = updated.get(lane);
            let seconds = if count == 0 {
                0.0
            } else {
                let (seconds, fell_back) = self.inferred_seconds(count);
                fallback_used |= fell_back;
                round1(seconds)
            };
            durations_s.insert(lane, seconds);
        }

        self.cursor = (self.cursor + 1) % Lane::ALL.len();
        self.ticks += 1;

        TickOutcome {
            tick: self.ticks,
            priority_lane,
            priority_duration_s: round1(priority_seconds),
            durations_s,
            updated_counts: updated.to_map(),
            fallback_used,
        }
    }

    fn inferred_seconds(&self, count: u32) -> (f64, bool) {
        match fuzzy::green_duration(count) {
            DurationOutcome::Computed(seconds) => (seconds, false),
            DurationOutcome::Fallback(_) => (self.fallback_duration_s, true),
        }
    }
}

fn round1(seconds: f64) -> f64 {
    (seconds * 10.0).round() / 10.0
}
