use chrono::{DateTime, Utc};

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierType {
    EvcoId,
    Rfid,
    Username,
    Unknown,
}

impl IdentifierType {
    pub fn wire_name(self) -> Option<&'static str> {
        match self {
            Self::EvcoId => Some("evco-id"),
            Self::Rfid => Some("rfid"),
            Self::Username => Some("username"),
            Self::Unknown => None,
        }
    }

    pub fn from_wire(value: &str) -> Self {
        match value {
            "evco-id" => Self::EvcoId,
            "rfid" => Self::Rfid,
            "username" => Self::Username,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub identifier: String,
    pub identifier_type: IdentifierType,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    start: DateTime<Utc>,
    stop: Option<DateTime<Utc>>,
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, stop: Option<DateTime<Utc>>) -> Result<Self, DomainError> {
        if let Some(stop) = stop
            && stop < start
        {
            return Err(DomainError::IntervalStopBeforeStart);
        }

        Ok(Self { start, stop })
    }

    pub fn open(start: DateTime<Utc>) -> Self {
        Self { start, stop: None }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> Option<DateTime<Utc>> {
        self.stop
    }

    pub fn contains(&self, other: &TimeInterval) -> bool {
        if other.start < self.start {
            return false;
        }

        match self.stop {
            None => true,
            Some(own_stop) => {
                other.start <= own_stop && other.stop.is_none_or(|stop| stop <= own_stop)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeDetailRecord {
    pub session_id: String,
    pub user: Identification,
    pub connector_id: String,
    pub session_interval: TimeInterval,
    pub charging_interval: Option<TimeInterval>,
    pub energy_consumed_kwh: Option<f64>,
    pub partner_identifier: Option<String>,
}

impl ChargeDetailRecord {
    pub fn new(
        session_id: impl Into<String>,
        user: Identification,
        connector_id: impl Into<String>,
        session_interval: TimeInterval,
        charging_interval: Option<TimeInterval>,
        energy_consumed_kwh: Option<f64>,
        partner_identifier: Option<String>,
    ) -> Result<Self, DomainError> {
        if let Some(charging) = &charging_interval
            && !session_interval.contains(charging)
        {
            return Err(DomainError::ChargingIntervalOutOfBounds);
        }

        if let Some(energy) = energy_consumed_kwh
            && (!energy.is_finite() || energy < 0.0)
        {
            return Err(DomainError::InvalidEnergy(energy));
        }

        Ok(Self {
            session_id: session_id.into(),
            user,
            connector_id: connector_id.into(),
            session_interval,
            charging_interval,
            energy_consumed_kwh,
            partner_identifier,
        })
    }

    pub fn is_finalized(&self) -> bool {
        self.session_interval.stop().is_some()
    }
}
