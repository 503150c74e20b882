/*!
 * Geofence violation detection for an IoT device monitoring product.
 *
 * The core of the crate is a pure, synchronous engine: given a snapshot of fences (polygons or
 * circles) and the current device positions, it reports which devices are on the wrong side of
 * which fence. Around that core sit the pieces a deployment needs: a caller-owned fence store, a
 * transition tracker for alert deduplication, a SQLite alert log, JSON snapshot interchange for
 * the command line tools, and KML export for eyeballing fences in Google Earth.
 */

pub use crate::{
    alert_database::{AlertDatabase, AlertDatabaseAddAlert, AlertRecord},
    error::FenceWatchError,
    geo::{
        destination, great_circle_distance, point_in_circle, point_in_polygon, Coord,
    },
    geofence::{generate_id, FenceRegion, FenceStyle, Geofence},
    kml::{KmlFile, KmlWriter},
    snapshot::Snapshot,
    store::GeofenceStore,
    violation::{
        check_violation, scan, DevicePosition, FencePolicy, Violation, ViolationKind,
        ViolationTracker,
    },
};

/// A result type that can bubble up any error.
pub type FenceWatchResult<T> = Result<T, Box<dyn std::error::Error>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod alert_database;
mod error;
mod geo;
mod geofence;
mod kml;
mod snapshot;
mod store;
mod violation;
