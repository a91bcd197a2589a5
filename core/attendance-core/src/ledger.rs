//! Per-member presence accounting.
//!
//! Presence is tracked as segments. `mark_present` opens a segment,
//! `fold_segment` closes the elapsed part of it into the running total and
//! restarts it at the current tick, `mark_absent` folds and closes. Because a
//! fold only ever adds the delta since the previous fold, any number of folds
//! per tick conserve elapsed time.
//!
//! Missing records are silent no-ops: duplicate and late notifications from
//! several upstream sources are normal.

use attendance_protocol::Tick;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::identity::{normalize, IdentityKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberAttendance {
    pub display_name: String,
    /// Ticks between session start and first sighting. Never recomputed.
    pub arrival_offset_ticks: Tick,
    /// Start of the open segment; only meaningful while present.
    pub segment_start_tick: Tick,
    pub accumulated_ticks: Tick,
    pub is_present: bool,
}

/// Read-only view of one record, as handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberSnapshot {
    pub key: IdentityKey,
    pub display_name: String,
    pub arrival_offset_ticks: Tick,
    pub accumulated_ticks: Tick,
    pub is_present: bool,
}

#[derive(Debug, Default)]
pub struct AttendanceLedger {
    records: BTreeMap<IdentityKey, MemberAttendance>,
}

impl AttendanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&MemberAttendance> {
        self.records.get(key)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&MemberAttendance> {
        self.records.get(&normalize(name))
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Creates an absent record on first sighting. Later sightings only
    /// refresh the display name.
    pub fn record_arrival(&mut self, display_name: &str, tick: Tick, session_start: Tick) {
        let key = normalize(display_name);
        if let Some(record) = self.records.get_mut(&key) {
            if record.display_name != display_name {
                record.display_name = display_name.to_string();
            }
            return;
        }

        tracing::debug!(member = %key, tick, "Member first sighted");
        self.records.insert(
            key,
            MemberAttendance {
                display_name: display_name.to_string(),
                arrival_offset_ticks: tick.saturating_sub(session_start),
                segment_start_tick: tick,
                accumulated_ticks: 0,
                is_present: false,
            },
        );
    }

    pub fn mark_present(&mut self, key: &IdentityKey, tick: Tick) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };
        if record.is_present {
            return;
        }
        record.is_present = true;
        record.segment_start_tick = tick;
    }

    pub fn mark_absent(&mut self, key: &IdentityKey, tick: Tick) {
        let Some(record) = self.records.get_mut(key) else {
            return;
        };
        if !record.is_present {
            return;
        }
        fold(record, tick);
        record.is_present = false;
    }

    pub fn fold_segment(&mut self, key: &IdentityKey, tick: Tick) {
        if let Some(record) = self.records.get_mut(key) {
            fold(record, tick);
        }
    }

    pub fn fold_all(&mut self, tick: Tick) {
        for record in self.records.values_mut() {
            fold(record, tick);
        }
    }

    /// Records in ascending key order.
    pub fn snapshot(&self) -> Vec<MemberSnapshot> {
        self.records
            .iter()
            .map(|(key, record)| MemberSnapshot {
                key: key.clone(),
                display_name: record.display_name.clone(),
                arrival_offset_ticks: record.arrival_offset_ticks,
                accumulated_ticks: record.accumulated_ticks,
                is_present: record.is_present,
            })
            .collect()
    }
}

fn fold(record: &mut MemberAttendance, tick: Tick) {
    if !record.is_present {
        return;
    }
    record.accumulated_ticks += tick.saturating_sub(record.segment_start_tick);
    record.segment_start_tick = tick;
}
