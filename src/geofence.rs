/*!
 * Geofence regions and their lifecycle.
 *
 * A [Geofence] is a named region, either a polygon or a circle, that device positions are tested
 * against. Fences are built up interactively: a polygon gains boundary vertices one at a time and
 * a circle gets its center and radius in separate steps. Until a fence has enough geometry to
 * answer a containment question it is simply not evaluable, and the violation scan skips it
 * silently. A half-drawn fence is never an error.
 */

use crate::geo::{self, Coord};
use rand::Rng;
use serde::{Deserialize, Serialize};

/**
 * The geometry of a fence, either a polygon boundary or a circle.
 *
 * Modeled as a sum type so each variant only carries the fields that mean something for its kind.
 * The circle's center and radius are optional because they are filled in one draw step at a time.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FenceRegion {
    /// An ordered boundary, implicitly closed. Insertion order is significant.
    Polygon { vertices: Vec<Coord> },
    /// A circle around a center point with a radius in meters.
    Circle {
        #[serde(default)]
        center: Option<Coord>,
        #[serde(default)]
        radius: Option<f64>,
    },
}

/** Cosmetic presentation attributes for a fence. No behavioral meaning. */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FenceStyle {
    /// Fill color as "#RRGGBB".
    pub fill_color: String,
    /// Stroke color as "#RRGGBB".
    pub stroke_color: String,
    /// Stroke weight in display pixels.
    pub stroke_weight: f64,
}

impl Default for FenceStyle {
    fn default() -> Self {
        FenceStyle {
            fill_color: "#1791fc".to_owned(),
            stroke_color: "#0b5fbd".to_owned(),
            stroke_weight: 2.0,
        }
    }
}

/** A named region that device positions are tested against. */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geofence {
    /// Unique opaque identifier, assigned at creation and never reused.
    pub id: String,
    /// Display label.
    pub name: String,
    #[serde(flatten)]
    pub region: FenceRegion,
    #[serde(default)]
    pub style: FenceStyle,
}

impl Geofence {
    /// Create an empty polygon fence with a freshly generated id.
    pub fn new_polygon<S: Into<String>>(name: S) -> Self {
        Geofence {
            id: generate_id(),
            name: name.into(),
            region: FenceRegion::Polygon { vertices: vec![] },
            style: FenceStyle::default(),
        }
    }

    /// Create a circle fence with a freshly generated id and no geometry yet.
    pub fn new_circle<S: Into<String>>(name: S) -> Self {
        Geofence {
            id: generate_id(),
            name: name.into(),
            region: FenceRegion::Circle {
                center: None,
                radius: None,
            },
            style: FenceStyle::default(),
        }
    }

    /// Add a boundary point during a draw interaction.
    ///
    /// For a polygon this appends a vertex. For a circle the first point becomes the center and
    /// any further points are ignored.
    pub fn add_point(&mut self, point: Coord) {
        match &mut self.region {
            FenceRegion::Polygon { vertices } => vertices.push(point),
            FenceRegion::Circle { center, .. } => {
                if center.is_none() {
                    *center = Some(point);
                }
            }
        }
    }

    /// Set the radius in meters. Has no effect on a polygon fence.
    pub fn set_radius(&mut self, radius_m: f64) {
        if let FenceRegion::Circle { radius, .. } = &mut self.region {
            *radius = Some(radius_m);
        }
    }

    /// Can this fence answer a containment question yet?
    ///
    /// A polygon needs at least three vertices, a circle needs a center and a radius.
    pub fn is_evaluable(&self) -> bool {
        match &self.region {
            FenceRegion::Polygon { vertices } => vertices.len() >= 3,
            FenceRegion::Circle { center, radius } => center.is_some() && radius.is_some(),
        }
    }

    /// Test whether a point is inside this fence.
    ///
    /// Returns `None` when the fence is not evaluable. The circle boundary is inclusive, the
    /// polygon boundary has the even-odd ambiguity documented in
    /// [point_in_polygon](crate::point_in_polygon).
    pub fn contains(&self, point: Coord) -> Option<bool> {
        match &self.region {
            FenceRegion::Polygon { vertices } => {
                if vertices.len() < 3 {
                    None
                } else {
                    Some(geo::point_in_polygon(point, vertices))
                }
            }
            FenceRegion::Circle { center, radius } => {
                let center = (*center)?;
                let radius = (*radius)?;
                Some(geo::point_in_circle(point, center, radius))
            }
        }
    }
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

/**
 * Produce a short opaque identifier for a newly created fence.
 *
 * A random base-36 string of length 9, unique with overwhelming probability over the lifetime of
 * a session. Collisions are not detected or retried.
 */
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();

    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_ids_are_distinct_and_fixed_length() {
        let a = generate_id();
        let b = generate_id();

        assert_eq!(a.len(), ID_LEN);
        assert_eq!(b.len(), ID_LEN);
        assert_ne!(a, b);
        assert!(a.bytes().all(|c| ID_ALPHABET.contains(&c)));
    }

    #[test]
    fn half_drawn_fences_are_not_evaluable() {
        let mut polygon = Geofence::new_polygon("dock");
        assert!(!polygon.is_evaluable());
        assert_eq!(polygon.contains(Coord { lat: 0.0, lon: 0.0 }), None);

        polygon.add_point(Coord { lat: 0.0, lon: 0.0 });
        polygon.add_point(Coord { lat: 0.0, lon: 1.0 });
        assert!(!polygon.is_evaluable());

        polygon.add_point(Coord { lat: 1.0, lon: 0.5 });
        assert!(polygon.is_evaluable());

        let mut circle = Geofence::new_circle("yard");
        assert!(!circle.is_evaluable());

        circle.add_point(Coord {
            lat: 40.0,
            lon: 116.0,
        });
        assert!(!circle.is_evaluable());
        assert_eq!(
            circle.contains(Coord {
                lat: 40.0,
                lon: 116.0
            }),
            None
        );

        circle.set_radius(500.0);
        assert!(circle.is_evaluable());
        assert_eq!(
            circle.contains(Coord {
                lat: 40.0,
                lon: 116.0
            }),
            Some(true)
        );
    }

    #[test]
    fn circle_ignores_extra_draw_points() {
        let mut circle = Geofence::new_circle("yard");
        circle.add_point(Coord {
            lat: 40.0,
            lon: 116.0,
        });
        circle.add_point(Coord { lat: 0.0, lon: 0.0 });
        circle.set_radius(100.0);

        // The second point must not have displaced the center.
        assert_eq!(
            circle.contains(Coord {
                lat: 40.0,
                lon: 116.0
            }),
            Some(true)
        );
        assert_eq!(circle.contains(Coord { lat: 0.0, lon: 0.0 }), Some(false));
    }

    #[test]
    fn snapshot_region_tags_round_trip() {
        let mut fence = Geofence::new_polygon("harbor");
        fence.add_point(Coord { lat: 0.0, lon: 0.0 });
        fence.add_point(Coord { lat: 1.0, lon: 0.0 });
        fence.add_point(Coord { lat: 1.0, lon: 1.0 });

        let text = serde_json::to_string(&fence).expect("serialize");
        assert!(text.contains(r#""kind":"polygon""#));

        let back: Geofence = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back.id, fence.id);
        assert!(back.is_evaluable());

        let circle_text = r#"{
            "id": "abc123xyz",
            "name": "depot",
            "kind": "circle",
            "center": { "lat": 39.9, "lon": 116.4 },
            "radius": 250.0
        }"#;
        let circle: Geofence = serde_json::from_str(circle_text).expect("deserialize circle");
        assert!(circle.is_evaluable());
    }
}
