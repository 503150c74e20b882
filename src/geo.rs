/*!
 * Geographic calculations.
 *
 * These are the simple (approximate) spherical-Earth calculations the violation engine needs.
 * Coordinates are decimal degrees and the functions make no assumption about the datum (WGS84 vs
 * GCJ02); they treat whatever they are given as points on a sphere.
 *
 * None of these functions validate their inputs. Coordinates containing NaN or values outside the
 * valid longitude/latitude ranges produce garbage boolean/distance results rather than errors, so
 * callers are responsible for pre-filtering to longitude in [-180, 180] and latitude in [-90, 90].
 */

use serde::{Deserialize, Serialize};

/** A coordinate consisting of a latitude and a longitude in decimal degrees. */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Latitude. Should be -90 to 90, but that's not checked or enforced.
    pub lat: f64,
    /// Longitude. Should be -180 to 180, but that's not checked or enforced.
    pub lon: f64,
}

const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/**
 * The great circle distance between two points, in meters.
 *
 * This is the standard haversine calculation. Identical points yield exactly 0.0 because every
 * term of the formula is exactly zero when the deltas are zero; there is no short circuit.
 */
pub fn great_circle_distance(a: Coord, b: Coord) -> f64 {
    let lat_a = a.lat * DEG2RAD;
    let lat_b = b.lat * DEG2RAD;

    let dlat2 = (lat_b - lat_a) / 2.0;
    let dlon2 = (b.lon - a.lon) * DEG2RAD / 2.0;

    let sin2_dlat = f64::sin(dlat2) * f64::sin(dlat2);
    let sin2_dlon = f64::sin(dlon2) * f64::sin(dlon2);

    let h = sin2_dlat + f64::cos(lat_a) * f64::cos(lat_b) * sin2_dlon;

    2.0 * EARTH_RADIUS_M * f64::atan2(f64::sqrt(h), f64::sqrt(1.0 - h))
}

/**
 * Test a point against a closed polygon boundary with the ray casting (even-odd) rule.
 *
 * The vertices describe a possibly non-convex, possibly self-intersecting boundary that is
 * implicitly closed; the last vertex connects back to the first. A horizontal ray is extended from
 * the test point towards +x (east) and each boundary crossing toggles the inside flag.
 *
 * Degenerate horizontal edges never straddle the ray because of the strict comparison on the
 * y-coordinates, so they are implicitly skipped. A consequence of the classic algorithm is that
 * points exactly on the boundary have implementation-defined containment. That ambiguity is
 * deliberately preserved here.
 */
pub fn point_in_polygon(point: Coord, vertices: &[Coord]) -> bool {
    // Fewer than three vertices cannot enclose any area.
    if vertices.len() < 3 {
        return false;
    }

    let x = point.lon;
    let y = point.lat;

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = (vertices[i].lon, vertices[i].lat);
        let (xj, yj) = (vertices[j].lon, vertices[j].lat);

        if ((yi > y) != (yj > y)) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }

        j = i;
    }

    inside
}

/**
 * Test whether a point lies within (or exactly on) a circle of the given radius in meters.
 *
 * The boundary is inclusive; a point exactly radius meters from the center counts as inside.
 */
pub fn point_in_circle(point: Coord, center: Coord, radius_m: f64) -> bool {
    great_circle_distance(point, center) <= radius_m
}

/**
 * The point reached by traveling a distance (meters) from an origin along an initial bearing
 * (degrees clockwise from north) on a great circle.
 *
 * Used to trace approximate circle outlines for export, not for violation checks.
 */
pub fn destination(origin: Coord, bearing_deg: f64, distance_m: f64) -> Coord {
    let lat1 = origin.lat * DEG2RAD;
    let lon1 = origin.lon * DEG2RAD;
    let bearing = bearing_deg * DEG2RAD;
    let angular = distance_m / EARTH_RADIUS_M;

    let lat2 = f64::asin(
        f64::sin(lat1) * f64::cos(angular) + f64::cos(lat1) * f64::sin(angular) * f64::cos(bearing),
    );
    let lon2 = lon1
        + f64::atan2(
            f64::sin(bearing) * f64::sin(angular) * f64::cos(lat1),
            f64::cos(angular) - f64::sin(lat1) * f64::sin(lat2),
        );

    Coord {
        lat: lat2 / DEG2RAD,
        lon: lon2 / DEG2RAD,
    }
}
