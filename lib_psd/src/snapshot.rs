//! Compact binary snapshots of decoded layer records, for caching decode results.

use log::debug;
use thiserror::Error;

use crate::layer::format::LayerRecord;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
}

pub fn to_snapshot(layer: &LayerRecord) -> Result<Vec<u8>, SnapshotError> {
    let bytes = bincode::serialize(layer)?;
    debug!("Snapshot of layer {:?}: {} bytes", layer.name, bytes.len());
    Ok(bytes)
}

/// Restores a record saved by [`to_snapshot`]. The channel lookup is rebuilt, so a snapshot
/// carrying duplicate channel ids is rejected.
pub fn from_snapshot(bytes: &[u8]) -> Result<LayerRecord, SnapshotError> {
    Ok(bincode::deserialize(bytes)?)
}
