pub mod diff;
pub mod session;
pub mod snapshot;
pub mod station;
pub mod status;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("station name must not be empty")]
    EmptyStationName,
    #[error("station {0} must have at least one connector")]
    NoConnectors(String),
    #[error("interval stop must not precede its start")]
    IntervalStopBeforeStart,
    #[error("charging interval must lie within the session interval")]
    ChargingIntervalOutOfBounds,
    #[error("energy consumed must be a finite value of at least zero, got {0}")]
    InvalidEnergy(f64),
    #[error("status update for {0} must carry a timestamp later than the preceding value")]
    NonMonotonicStatusUpdate(String),
}
