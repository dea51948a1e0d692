use std::collections::HashMap;

use crate::domain::DomainError;
use crate::domain::session::ChargeDetailRecord;
use crate::domain::station::Station;
use crate::domain::status::{ConnectorStatus, ConnectorStatusUpdate, TimestampedStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome<T> {
    pub changed: Vec<T>,
    pub unchanged: Vec<T>,
}

impl<T> Default for DiffOutcome<T> {
    fn default() -> Self {
        Self {
            changed: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

fn partition_changed<T: Clone + PartialEq>(
    current: &[T],
    acknowledged: &HashMap<String, T>,
    key: impl Fn(&T) -> &str,
) -> DiffOutcome<T> {
    let mut outcome = DiffOutcome::default();

    for entity in current {
        match acknowledged.get(key(entity)) {
            Some(acked) if acked == entity => outcome.unchanged.push(entity.clone()),
            _ => outcome.changed.push(entity.clone()),
        }
    }

    outcome
}

pub fn diff_stations(
    current: &[Station],
    acknowledged: &HashMap<String, Station>,
) -> DiffOutcome<Station> {
    partition_changed(current, acknowledged, |station| station.id.as_str())
}

pub fn diff_records(
    current: &[ChargeDetailRecord],
    acknowledged: &HashMap<String, ChargeDetailRecord>,
) -> DiffOutcome<ChargeDetailRecord> {
    partition_changed(current, acknowledged, |record| record.session_id.as_str())
}

#[derive(Debug, Default, PartialEq)]
pub struct StatusDiff {
    pub changed: Vec<ConnectorStatusUpdate>,
    pub unchanged: Vec<ConnectorStatus>,
    pub rejected: Vec<(String, DomainError)>,
}

// A status counts as changed only when the status value itself moved; a
// newer timestamp carrying the same value is not a delta.
pub fn diff_statuses(
    current: &[ConnectorStatus],
    acknowledged: &HashMap<String, ConnectorStatus>,
) -> StatusDiff {
    let mut diff = StatusDiff::default();

    for status in current {
        let previous = acknowledged.get(&status.connector_id);

        if let Some(previous) = previous
            && previous.status == status.status
        {
            diff.unchanged.push(status.clone());
            continue;
        }

        let old = previous.map(|previous| TimestampedStatus {
            status: previous.status,
            timestamp: previous.timestamp,
        });
        let new = TimestampedStatus {
            status: status.status,
            timestamp: status.timestamp,
        };

        match ConnectorStatusUpdate::new(status.connector_id.clone(), old, new) {
            Ok(update) => diff.changed.push(update),
            Err(error) => diff.rejected.push((status.connector_id.clone(), error)),
        }
    }

    diff
}
