//! Occupancy reconciliation.
//!
//! Each tick counts as exactly one second of occupancy regardless of the
//! configured polling interval.

use crate::zone::OccupancyRecord;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    BecameOccupied(usize),
    /// Continuous occupancy of the zone just exceeded the threshold.
    NewViolation(usize),
    Cleared(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub next: Vec<OccupancyRecord>,
    pub events: Vec<TransitionEvent>,
    pub occupied_count: usize,
    pub illegal_count: usize,
}

/// Fold one tick of per-zone occupancy flags into the previous records.
///
/// The result has one record per entry of `per_zone_occupied`. Records absent
/// from `prev` start out vacant; surplus records in `prev` are dropped.
pub fn reconcile(
    prev: &[OccupancyRecord],
    per_zone_occupied: &[bool],
    threshold_secs: u32,
    now: SystemTime,
) -> Reconciliation {
    let mut next = Vec::with_capacity(per_zone_occupied.len());
    let mut events = Vec::new();

    for (index, &occupied) in per_zone_occupied.iter().enumerate() {
        let before = prev
            .get(index)
            .copied()
            .unwrap_or_else(|| OccupancyRecord::vacant(now));

        let record = match (occupied, before.occupied) {
            (true, true) => OccupancyRecord {
                occupied: true,
                violation_seconds: before.violation_seconds.saturating_add(1),
                last_updated: now,
            },
            (true, false) => {
                events.push(TransitionEvent::BecameOccupied(index));
                OccupancyRecord {
                    occupied: true,
                    violation_seconds: 0,
                    last_updated: now,
                }
            }
            (false, was_occupied) => {
                if was_occupied {
                    events.push(TransitionEvent::Cleared(index));
                }
                OccupancyRecord::vacant(now)
            }
        };

        if record.occupied && record.violation_seconds == threshold_secs.saturating_add(1) {
            events.push(TransitionEvent::NewViolation(index));
        }
        next.push(record);
    }

    let occupied_count = next.iter().filter(|r| r.occupied).count();
    let illegal_count = next
        .iter()
        .filter(|r| r.is_violating(threshold_secs))
        .count();

    Reconciliation {
        next,
        events,
        occupied_count,
        illegal_count,
    }
}
