/*!
 * Violation policy, the batch scan, and transition tracking.
 *
 * Everything in this module is a pure function of its inputs. A scan reads the current device
 * positions and the current fence snapshot, allocates fresh [Violation] records, and retains
 * nothing, so it is safe to re-run on every position refresh from any number of callers. Rate
 * limiting and deciding what to do with the results (alerting, persistence) belong to the caller;
 * [ViolationTracker] is an optional helper for the common "only alert on a fresh violation" case.
 */

use crate::geofence::Geofence;
use crate::geo::Coord;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/** A device position supplied fresh on each evaluation. Never retained across calls. */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePosition {
    pub id: i64,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl DevicePosition {
    pub fn coord(&self) -> Coord {
        Coord {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/** Which side of the fence boundary a violation was observed on. */
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// The device was found outside a fence it must stay within.
    Outside,
    /// The device was found inside a fence it must stay out of.
    Inside,
}

/** The direction a fence is enforced in. Selected by the caller per scan. */
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum FencePolicy {
    /// Devices must remain inside the fence; being outside is a violation. The default, and the
    /// only behavior the monitoring product has historically produced.
    #[default]
    KeepInside,
    /// The fence is a restricted zone; being inside it is a violation.
    KeepOut,
}

/**
 * A record of a device found on the wrong side of a fence boundary.
 *
 * Violations are transient. They are produced fresh on every scan and never stored by the engine;
 * persisting or deduplicating them is the caller's decision.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub device_id: i64,
    pub device_name: String,
    pub geofence_id: String,
    pub geofence_name: String,
    pub kind: ViolationKind,
    /// The offending device position at evaluation time.
    pub coordinates: Coord,
    /// Evaluation time.
    pub timestamp: DateTime<Utc>,
    /// Human readable summary, e.g. "device tracker-7 is outside geofence dock".
    pub message: String,
}

impl Violation {
    fn new(device: &DevicePosition, fence: &Geofence, kind: ViolationKind) -> Self {
        let message = format!(
            "device {} is {} geofence {}",
            device.name, kind, fence.name
        );

        Violation {
            device_id: device.id,
            device_name: device.name.clone(),
            geofence_id: fence.id.clone(),
            geofence_name: fence.name.clone(),
            kind,
            coordinates: device.coord(),
            timestamp: Utc::now(),
            message,
        }
    }
}

/**
 * Check a single device against a single fence under the given policy.
 *
 * Returns `None` when the device complies with the policy, and also when the fence is not yet
 * evaluable. A half-drawn fence never produces a violation.
 */
pub fn check_violation(
    device: &DevicePosition,
    fence: &Geofence,
    policy: FencePolicy,
) -> Option<Violation> {
    let inside = fence.contains(device.coord())?;

    let kind = match policy {
        FencePolicy::KeepInside if !inside => ViolationKind::Outside,
        FencePolicy::KeepOut if inside => ViolationKind::Inside,
        _ => return None,
    };

    Some(Violation::new(device, fence, kind))
}

/**
 * Check every device against every fence and collect the violations.
 *
 * The result is ordered device-major, fence-minor: all violations for the first device across all
 * fences appear before any violation for the second device. No deduplication happens here; a
 * device violating two fences produces two records.
 */
pub fn scan(
    devices: &[DevicePosition],
    fences: &[Geofence],
    policy: FencePolicy,
) -> Vec<Violation> {
    let mut violations = vec![];

    for device in devices {
        for fence in fences {
            if let Some(violation) = check_violation(device, fence, policy) {
                violations.push(violation);
            }
        }
    }

    violations
}

/**
 * Filters repeated violations down to the ones that are new since the last scan.
 *
 * The engine itself reports a violation on every scan for as long as a device stays on the wrong
 * side of a fence. Callers that surface user-facing alerts usually only want the transition, the
 * scan where a compliant (device, fence) pair first becomes violating. This tracker keeps that
 * per-pair state between scans. A pair that returns to compliance is forgotten, so a later
 * violation of the same pair alerts again.
 */
#[derive(Debug, Default)]
pub struct ViolationTracker {
    violating: FxHashSet<(i64, String)>,
}

impl ViolationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a full scan result and return only the violations whose (device, fence) pair was not
    /// violating on the previous call.
    pub fn filter_new(&mut self, violations: Vec<Violation>) -> Vec<Violation> {
        let current: FxHashSet<(i64, String)> = violations
            .iter()
            .map(|v| (v.device_id, v.geofence_id.clone()))
            .collect();

        let new_violations = violations
            .into_iter()
            .filter(|v| !self.violating.contains(&(v.device_id, v.geofence_id.clone())))
            .collect();

        self.violating = current;

        new_violations
    }

    /// Forget all tracked state, so every current violation reports as new again.
    pub fn reset(&mut self) {
        self.violating.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geofence::Geofence;

    fn square_fence() -> Geofence {
        let mut fence = Geofence::new_polygon("dock");
        for (lon, lat) in [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)] {
            fence.add_point(Coord { lat, lon });
        }
        fence
    }

    fn device(id: i64, name: &str, lon: f64, lat: f64) -> DevicePosition {
        DevicePosition {
            id,
            name: name.to_owned(),
            longitude: lon,
            latitude: lat,
        }
    }

    #[test]
    fn device_outside_produces_an_outside_violation() {
        let fence = square_fence();
        let rover = device(1, "rover", 15.0, 15.0);

        let violation =
            check_violation(&rover, &fence, FencePolicy::KeepInside).expect("violation");

        assert_eq!(violation.kind, ViolationKind::Outside);
        assert_eq!(violation.device_id, 1);
        assert_eq!(violation.geofence_id, fence.id);
        assert_eq!(violation.coordinates, Coord {
            lat: 15.0,
            lon: 15.0
        });
        assert_eq!(violation.message, "device rover is outside geofence dock");
    }

    #[test]
    fn device_inside_produces_no_violation() {
        let fence = square_fence();
        let rover = device(1, "rover", 5.0, 5.0);

        assert!(check_violation(&rover, &fence, FencePolicy::KeepInside).is_none());
    }

    #[test]
    fn keep_out_policy_inverts_the_check() {
        let fence = square_fence();
        let intruder = device(2, "intruder", 5.0, 5.0);
        let bystander = device(3, "bystander", 15.0, 15.0);

        let violation =
            check_violation(&intruder, &fence, FencePolicy::KeepOut).expect("violation");
        assert_eq!(violation.kind, ViolationKind::Inside);
        assert_eq!(
            violation.message,
            "device intruder is inside geofence dock"
        );

        assert!(check_violation(&bystander, &fence, FencePolicy::KeepOut).is_none());
    }

    #[test]
    fn unevaluable_fences_are_skipped() {
        let mut two_vertex = Geofence::new_polygon("unfinished");
        two_vertex.add_point(Coord { lat: 0.0, lon: 0.0 });
        two_vertex.add_point(Coord { lat: 10.0, lon: 0.0 });

        let mut radiusless = Geofence::new_circle("unfinished circle");
        radiusless.add_point(Coord { lat: 0.0, lon: 0.0 });

        let far_away = device(1, "rover", 100.0, 80.0);

        for policy in [FencePolicy::KeepInside, FencePolicy::KeepOut] {
            assert!(check_violation(&far_away, &two_vertex, policy).is_none());
            assert!(check_violation(&far_away, &radiusless, policy).is_none());
        }
    }

    #[test]
    fn batch_scan_is_complete_and_device_major() {
        let fence = square_fence();
        let devices = [
            device(1, "stray", 15.0, 15.0),
            device(2, "docked", 5.0, 5.0),
        ];

        let violations = scan(&devices, std::slice::from_ref(&fence), FencePolicy::default());

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].device_id, 1);
        assert_eq!(violations[0].kind, ViolationKind::Outside);
    }

    #[test]
    fn batch_scan_does_not_deduplicate_across_fences() {
        let dock = square_fence();
        let mut yard = Geofence::new_circle("yard");
        yard.add_point(Coord { lat: 5.0, lon: 5.0 });
        yard.set_radius(1_000.0);

        let stray = [device(1, "stray", 15.0, 15.0)];
        let fences = [dock.clone(), yard];

        let violations = scan(&stray, &fences, FencePolicy::KeepInside);

        // One record per violated fence, in fence order.
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].geofence_id, dock.id);
        assert_ne!(violations[1].geofence_id, dock.id);
    }

    #[test]
    fn tracker_reports_only_transitions() {
        let fence = square_fence();
        let fences = std::slice::from_ref(&fence);
        let mut tracker = ViolationTracker::new();

        let outside = [device(1, "rover", 15.0, 15.0)];
        let inside = [device(1, "rover", 5.0, 5.0)];

        // First sighting outside is new.
        let first = tracker.filter_new(scan(&outside, fences, FencePolicy::KeepInside));
        assert_eq!(first.len(), 1);

        // Still outside on the next scan, not new.
        let second = tracker.filter_new(scan(&outside, fences, FencePolicy::KeepInside));
        assert!(second.is_empty());

        // Back inside clears the state...
        let third = tracker.filter_new(scan(&inside, fences, FencePolicy::KeepInside));
        assert!(third.is_empty());

        // ...so leaving again alerts again.
        let fourth = tracker.filter_new(scan(&outside, fences, FencePolicy::KeepInside));
        assert_eq!(fourth.len(), 1);
    }

    #[test]
    fn tracker_reset_forgets_state() {
        let fence = square_fence();
        let fences = std::slice::from_ref(&fence);
        let outside = [device(1, "rover", 15.0, 15.0)];

        let mut tracker = ViolationTracker::new();
        let _ = tracker.filter_new(scan(&outside, fences, FencePolicy::KeepInside));

        tracker.reset();

        let after_reset = tracker.filter_new(scan(&outside, fences, FencePolicy::KeepInside));
        assert_eq!(after_reset.len(), 1);
    }

    #[test]
    fn policy_names_parse_for_the_command_line() {
        assert_eq!("keep-inside".parse(), Ok(FencePolicy::KeepInside));
        assert_eq!("keep-out".parse(), Ok(FencePolicy::KeepOut));
        assert!("keep-away".parse::<FencePolicy>().is_err());
    }
}
