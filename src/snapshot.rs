/*!
 * JSON snapshot interchange for the command line tools.
 *
 * A snapshot is one JSON document holding the current fences and the latest known device
 * positions, the same shape the monitoring backend reports. The library itself never does I/O
 * during a scan; a snapshot is loaded up front and its contents are borrowed from there.
 */

use crate::{geofence::Geofence, violation::DevicePosition, FenceWatchResult};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/** The fences and device positions to evaluate, as loaded from a snapshot file. */
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub devices: Vec<DevicePosition>,
    #[serde(default)]
    pub geofences: Vec<Geofence>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> FenceWatchResult<Self> {
        let file = File::open(path.as_ref())?;
        let snapshot = serde_json::from_reader(BufReader::new(file))?;
        Ok(snapshot)
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(text: &str) -> FenceWatchResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
