use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::adapters::wire;
use crate::domain::snapshot::{RoamingSnapshot, SnapshotError, SnapshotSource};

#[derive(Debug, Clone, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    stations: Vec<Value>,
    #[serde(rename = "connector-status", default)]
    connector_status: Vec<Value>,
    #[serde(rename = "charge-detail-records", default)]
    charge_detail_records: Vec<Value>,
}

// Reads the locally-published truth from a single JSON document. The file
// is re-read on every call so an external system can update it atomically
// (write to a temp file, rename over the old one).
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn snapshot(&self) -> Result<RoamingSnapshot, SnapshotError> {
        let content = fs::read_to_string(&self.path)
            .map_err(|error| SnapshotError::Read(format!("{}: {error}", self.path.display())))?;
        let document: SnapshotDocument = serde_json::from_str(&content)
            .map_err(|error| SnapshotError::Decode(error.to_string()))?;

        let mut snapshot = RoamingSnapshot::default();

        for (index, value) in document.stations.iter().enumerate() {
            let station = wire::decode_station(value)
                .map_err(|error| SnapshotError::Decode(format!("stations[{index}]: {error}")))?;
            snapshot.stations.push(station);
        }

        for (index, value) in document.connector_status.iter().enumerate() {
            let status = wire::decode_connector_status(value).map_err(|error| {
                SnapshotError::Decode(format!("connector-status[{index}]: {error}"))
            })?;
            snapshot.statuses.push(status);
        }

        for (index, value) in document.charge_detail_records.iter().enumerate() {
            let record = wire::decode_session(value).map_err(|error| {
                SnapshotError::Decode(format!("charge-detail-records[{index}]: {error}"))
            })?;
            snapshot.records.push(record);
        }

        Ok(snapshot)
    }
}
