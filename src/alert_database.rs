/*!
 * Persistent warning alerts generated from geofence violations.
 *
 * Each recorded alert carries the `geofence_violation` type tag, a `warning` level, and the
 * violation's human readable message. Recording is fire-and-forget from the scan's perspective:
 * a failure here is logged by the caller and has no effect on future evaluations.
 */

use crate::{
    error::FenceWatchError,
    geo::Coord,
    violation::{Violation, ViolationKind},
    FenceWatchResult,
};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Represents a connection to the database where geofence alerts are stored.
pub struct AlertDatabase {
    conn: Connection,
}

impl AlertDatabase {
    /// Initialize a database.
    ///
    /// Initialize a database to make sure it exists and is set up properly. This should be run in
    /// the main thread before any other threads open a connection to the database to ensure
    /// consistency.
    pub fn initialize<P: AsRef<Path>>(path: P) -> FenceWatchResult<()> {
        let path = path.as_ref();

        let _conn = Self::open_database_to_write(path)?;
        Ok(())
    }

    /// Open a connection to the database to store and query alerts.
    pub fn connect<P: AsRef<Path>>(path: P) -> FenceWatchResult<Self> {
        let path = path.as_ref();

        let conn = Self::open_database_to_write(path)?;
        Ok(AlertDatabase { conn })
    }

    fn open_database_to_write(path: &Path) -> FenceWatchResult<Connection> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // A 5-second busy time out is WAY too much. If we hit this something has gone terribly wrong.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("alert_database/create_alert_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// Prepare to add alert rows to the database.
    pub fn prepare_to_add_alerts(&self) -> FenceWatchResult<AlertDatabaseAddAlert> {
        const ADD_ALERT_QUERY: &str = include_str!("alert_database/add_alert.sql");

        let add_alert_stmt = self.conn.prepare(ADD_ALERT_QUERY)?;

        Ok(AlertDatabaseAddAlert {
            add_alert_stmt,
            conn: &self.conn,
        })
    }

    /// Query alerts recorded at or after the given time, oldest first.
    pub fn query_recent_alerts(&self, since: DateTime<Utc>) -> FenceWatchResult<Vec<AlertRecord>> {
        const QUERY: &str = include_str!("alert_database/query_recent_alerts.sql");
        let mut stmt = self.conn.prepare(QUERY)?;

        let rows = stmt.query_map([since.timestamp()], |row| {
            Ok(RawAlertRow {
                id: row.get(0)?,
                alert_type: row.get(1)?,
                level: row.get(2)?,
                device_id: row.get(3)?,
                device_name: row.get(4)?,
                geofence_id: row.get(5)?,
                geofence_name: row.get(6)?,
                kind: row.get(7)?,
                lat: row.get(8)?,
                lon: row.get(9)?,
                timestamp: row.get(10)?,
                message: row.get(11)?,
            })
        })?;

        let mut alerts = vec![];
        for row in rows {
            match row.map_err(Box::from).and_then(AlertRecord::try_from) {
                Ok(alert) => alerts.push(alert),
                Err(err) => warn!("Error retrieving alert - {}", err),
            }
        }

        info!("Retrieved {} alerts from database.", alerts.len());

        Ok(alerts)
    }
}

pub struct AlertDatabaseAddAlert<'a> {
    add_alert_stmt: rusqlite::Statement<'a>,
    conn: &'a Connection,
}

impl<'a> AlertDatabaseAddAlert<'a> {
    /// Record one warning alert per violation in a single transaction.
    pub fn add(&mut self, violations: &[Violation]) -> FenceWatchResult<()> {
        if violations.is_empty() {
            return Ok(());
        }

        self.conn.execute("BEGIN TRANSACTION", [])?;

        for violation in violations {
            let res = self.add_alert_stmt.execute(rusqlite::params![
                violation.device_id,
                violation.device_name,
                violation.geofence_id,
                violation.geofence_name,
                Into::<&'static str>::into(violation.kind),
                violation.coordinates.lat,
                violation.coordinates.lon,
                violation.timestamp.timestamp(),
                violation.message,
            ]);

            // Close the transaction before propagating so the connection stays usable.
            if let Err(err) = res {
                let _ = self.conn.execute("ROLLBACK", []);
                return Err(err.into());
            }
        }

        self.conn.execute("COMMIT", [])?;

        info!("Recorded {} geofence alerts.", violations.len());

        Ok(())
    }
}

/// An alert row read back out of the database.
#[derive(Debug, Clone)]
pub struct AlertRecord {
    /// The rowid, for stable ordering of alerts recorded in the same second.
    pub id: i64,
    /// Always "geofence_violation" for rows this library writes.
    pub alert_type: String,
    /// Always "warning" for rows this library writes.
    pub level: String,
    pub device_id: i64,
    pub device_name: String,
    pub geofence_id: String,
    pub geofence_name: String,
    pub kind: ViolationKind,
    pub coordinates: Coord,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

struct RawAlertRow {
    id: i64,
    alert_type: String,
    level: String,
    device_id: i64,
    device_name: String,
    geofence_id: String,
    geofence_name: String,
    kind: String,
    lat: f64,
    lon: f64,
    timestamp: i64,
    message: String,
}

impl TryFrom<RawAlertRow> for AlertRecord {
    type Error = Box<dyn std::error::Error>;

    fn try_from(raw: RawAlertRow) -> FenceWatchResult<Self> {
        let kind: ViolationKind = raw.kind.parse().map_err(|_| FenceWatchError {
            msg: "unrecognized violation kind in alert row",
        })?;

        let timestamp = DateTime::from_timestamp(raw.timestamp, 0).ok_or(FenceWatchError {
            msg: "alert row timestamp out of range",
        })?;

        Ok(AlertRecord {
            id: raw.id,
            alert_type: raw.alert_type,
            level: raw.level,
            device_id: raw.device_id,
            device_name: raw.device_name,
            geofence_id: raw.geofence_id,
            geofence_name: raw.geofence_name,
            kind,
            coordinates: Coord {
                lat: raw.lat,
                lon: raw.lon,
            },
            timestamp,
            message: raw.message,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geo::Coord,
        geofence::Geofence,
        violation::{check_violation, DevicePosition, FencePolicy},
    };
    use chrono::Duration;

    fn sample_violations() -> Vec<Violation> {
        let mut fence = Geofence::new_polygon("dock");
        for (lon, lat) in [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)] {
            fence.add_point(Coord { lat, lon });
        }

        let strays = [
            DevicePosition {
                id: 1,
                name: "rover".to_owned(),
                longitude: 15.0,
                latitude: 15.0,
            },
            DevicePosition {
                id: 2,
                name: "buoy".to_owned(),
                longitude: -20.0,
                latitude: 40.0,
            },
        ];

        strays
            .iter()
            .filter_map(|d| check_violation(d, &fence, FencePolicy::KeepInside))
            .collect()
    }

    #[test]
    fn alerts_round_trip_through_the_database() {
        let db = AlertDatabase::connect(":memory:").expect("open in-memory db");
        let violations = sample_violations();
        assert_eq!(violations.len(), 2);

        {
            let mut adder = db.prepare_to_add_alerts().expect("prepare");
            adder.add(&violations).expect("add alerts");
        }

        let since = Utc::now() - Duration::hours(1);
        let alerts = db.query_recent_alerts(since).expect("query");

        assert_eq!(alerts.len(), 2);
        for (alert, violation) in alerts.iter().zip(&violations) {
            assert_eq!(alert.alert_type, "geofence_violation");
            assert_eq!(alert.level, "warning");
            assert_eq!(alert.device_id, violation.device_id);
            assert_eq!(alert.geofence_id, violation.geofence_id);
            assert_eq!(alert.kind, violation.kind);
            assert_eq!(alert.message, violation.message);
            assert_eq!(alert.timestamp.timestamp(), violation.timestamp.timestamp());
        }
    }

    #[test]
    fn alerts_older_than_the_cutoff_are_excluded() {
        let db = AlertDatabase::connect(":memory:").expect("open in-memory db");
        let violations = sample_violations();

        {
            let mut adder = db.prepare_to_add_alerts().expect("prepare");
            adder.add(&violations).expect("add alerts");
        }

        let future = Utc::now() + Duration::hours(1);
        let alerts = db.query_recent_alerts(future).expect("query");
        assert!(alerts.is_empty());
    }

    #[test]
    fn failed_insert_rolls_back_and_leaves_the_connection_usable() {
        let db = AlertDatabase::connect(":memory:").expect("open in-memory db");
        db.conn
            .execute_batch("CREATE UNIQUE INDEX alerts_pair ON alerts (device_id, geofence_id)")
            .expect("create index");

        let violations = sample_violations();
        let duplicates = vec![violations[0].clone(), violations[0].clone()];

        let mut adder = db.prepare_to_add_alerts().expect("prepare");
        assert!(adder.add(&duplicates).is_err());

        // The failed batch must leave no partial rows and no open transaction behind.
        adder.add(&violations).expect("add after failed batch");
        drop(adder);

        let alerts = db
            .query_recent_alerts(Utc::now() - Duration::hours(1))
            .expect("query");
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn adding_no_violations_is_a_no_op() {
        let db = AlertDatabase::connect(":memory:").expect("open in-memory db");
        let mut adder = db.prepare_to_add_alerts().expect("prepare");
        adder.add(&[]).expect("empty add");

        let alerts = db
            .query_recent_alerts(Utc::now() - Duration::hours(1))
            .expect("query");
        assert!(alerts.is_empty());
    }
}
