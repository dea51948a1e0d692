use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectorStatusType {
    Available,
    Occupied,
    Offline,
    Reserved,
    Unknown,
}

impl ConnectorStatusType {
    pub fn wire_name(self) -> Option<&'static str> {
        match self {
            Self::Available => Some("Available"),
            Self::Occupied => Some("Occupied"),
            Self::Offline => Some("Offline"),
            Self::Reserved => Some("Reserved"),
            Self::Unknown => None,
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "Available" => Self::Available,
            "Occupied" => Self::Occupied,
            "Offline" => Self::Offline,
            "Reserved" => Self::Reserved,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorStatus {
    pub connector_id: String,
    pub status: ConnectorStatusType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampedStatus {
    pub status: ConnectorStatusType,
    pub timestamp: DateTime<Utc>,
}

// Delta record for one connector: the value to transmit plus the value it
// replaces. `old` is absent for a connector that was never acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorStatusUpdate {
    pub connector_id: String,
    pub old: Option<TimestampedStatus>,
    pub new: TimestampedStatus,
}

impl ConnectorStatusUpdate {
    pub fn new(
        connector_id: impl Into<String>,
        old: Option<TimestampedStatus>,
        new: TimestampedStatus,
    ) -> Result<Self, DomainError> {
        let connector_id = connector_id.into();

        if let Some(previous) = &old
            && new.timestamp <= previous.timestamp
        {
            return Err(DomainError::NonMonotonicStatusUpdate(connector_id));
        }

        Ok(Self {
            connector_id,
            old,
            new,
        })
    }
}

impl Ord for ConnectorStatusUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.connector_id
            .cmp(&other.connector_id)
            .then_with(|| self.new.status.cmp(&other.new.status))
            .then_with(|| {
                self.old
                    .map(|value| value.status)
                    .cmp(&other.old.map(|value| value.status))
            })
            .then_with(|| self.new.timestamp.cmp(&other.new.timestamp))
            .then_with(|| {
                self.old
                    .map(|value| value.timestamp)
                    .cmp(&other.old.map(|value| value.timestamp))
            })
    }
}

impl PartialOrd for ConnectorStatusUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
