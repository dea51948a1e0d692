use thiserror::Error;

use crate::domain::session::ChargeDetailRecord;
use crate::domain::station::Station;
use crate::domain::status::ConnectorStatus;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Read(String),
    #[error("snapshot document is invalid: {0}")]
    Decode(String),
}

// The locally-known truth at one point in time. Entities are immutable per
// snapshot; the scheduler streams read it without locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoamingSnapshot {
    pub stations: Vec<Station>,
    pub statuses: Vec<ConnectorStatus>,
    pub records: Vec<ChargeDetailRecord>,
}

pub trait SnapshotSource: Send + Sync + 'static {
    fn snapshot(&self) -> Result<RoamingSnapshot, SnapshotError>;
}
