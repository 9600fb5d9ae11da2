use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};

use aurus_ranging::DistanceSample;

/// Why an echo cycle produced no distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingStart,
    MissingEnd,
    Inverted,
}

#[derive(Debug, Clone)]
pub struct State {
    pub last_distance: Option<DistanceSample>,
    pub last_emit_ts: Option<Instant>,
    pub emitted: u64,
    pub out_of_range: u64,
    pub missing_start: u64,
    pub missing_end: u64,
    pub inverted: u64,
    pub distance_queue_full: u64,
    pub watchdog_rearms: u64,
    pub frames: u64,
    pub no_signal_frames: u64,
    pub faults: Vec<String>,
}

impl Default for State {
    fn default() -> Self {
        State {
            last_distance: None,
            last_emit_ts: None,
            emitted: 0,
            out_of_range: 0,
            missing_start: 0,
            missing_end: 0,
            inverted: 0,
            distance_queue_full: 0,
            watchdog_rearms: 0,
            frames: 0,
            no_signal_frames: 0,
            faults: Vec::new(),
        }
    }
}

pub type Blackboard = Arc<RwLock<State>>;

pub fn snapshot(bb: &Blackboard) -> State {
    (*bb.read()).clone()
}

pub fn record_emit(bb: &Blackboard, sample: DistanceSample) {
    let mut g = bb.write();
    g.emitted += 1;
    if !sample.is_in_range() {
        g.out_of_range += 1;
    }
    g.last_distance = Some(sample);
    g.last_emit_ts = Some(Instant::now());
}

pub fn record_drop(bb: &Blackboard, reason: DropReason) {
    let mut g = bb.write();
    match reason {
        DropReason::MissingStart => g.missing_start += 1,
        DropReason::MissingEnd => g.missing_end += 1,
        DropReason::Inverted => g.inverted += 1,
    }
}

pub fn record_queue_full(bb: &Blackboard) {
    bb.write().distance_queue_full += 1;
}

pub fn record_watchdog(bb: &Blackboard) {
    bb.write().watchdog_rearms += 1;
}

pub fn record_frame(bb: &Blackboard, no_signal: bool) {
    let mut g = bb.write();
    g.frames += 1;
    if no_signal {
        g.no_signal_frames += 1;
    }
}

pub fn raise_fault(bb: &Blackboard, msg: &str) {
    let mut g = bb.write();
    if !g.faults.iter().any(|s| s == msg) {
        g.faults.push(msg.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_emit_counts_out_of_range() {
        let bb = Blackboard::default();
        record_emit(&bb, DistanceSample::from_cm(34.3));
        record_emit(&bb, DistanceSample::OUT_OF_RANGE);
        let s = snapshot(&bb);
        assert_eq!(s.emitted, 2);
        assert_eq!(s.out_of_range, 1);
        assert_eq!(s.last_distance, Some(DistanceSample::OUT_OF_RANGE));
        assert!(s.last_emit_ts.is_some());
    }

    #[test]
    fn test_faults_are_deduplicated() {
        let bb = Blackboard::default();
        raise_fault(&bb, "distance queue full");
        raise_fault(&bb, "distance queue full");
        assert_eq!(snapshot(&bb).faults, vec!["distance queue full".to_string()]);
    }
}
