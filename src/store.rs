/*!
 * An explicit, caller-owned geofence repository.
 *
 * The store owns the fences the user has drawn and hands out snapshots for scanning. The scan
 * functions only ever receive a borrowed slice and never retain a reference, so the store is the
 * single place fences live between evaluations. Insertion order is preserved because the scan's
 * fence-minor ordering is defined by it.
 */

use crate::geofence::Geofence;

/** Holds the current set of fences in creation order. */
#[derive(Debug, Default)]
pub struct GeofenceStore {
    fences: Vec<Geofence>,
}

impl GeofenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new polygon fence, returning a mutable handle for the draw interaction.
    pub fn create_polygon<S: Into<String>>(&mut self, name: S) -> &mut Geofence {
        self.fences.push(Geofence::new_polygon(name));
        self.fences.last_mut().unwrap()
    }

    /// Create a new circle fence, returning a mutable handle for the draw interaction.
    pub fn create_circle<S: Into<String>>(&mut self, name: S) -> &mut Geofence {
        self.fences.push(Geofence::new_circle(name));
        self.fences.last_mut().unwrap()
    }

    /// Add an already constructed fence, e.g. one loaded from a snapshot file.
    pub fn add(&mut self, fence: Geofence) {
        self.fences.push(fence);
    }

    // Fence counts are UI-scale (a handful per installation), linear lookup is fine.

    pub fn get(&self, id: &str) -> Option<&Geofence> {
        self.fences.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Geofence> {
        self.fences.iter_mut().find(|f| f.id == id)
    }

    /// Remove a fence by id, preserving the order of the rest.
    pub fn delete(&mut self, id: &str) -> Option<Geofence> {
        let index = self.fences.iter().position(|f| f.id == id)?;
        Some(self.fences.remove(index))
    }

    /// The current snapshot, in creation order. This is what gets passed to a scan.
    pub fn fences(&self) -> &[Geofence] {
        &self.fences
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::Coord;

    #[test]
    fn create_lookup_delete_round_trip() {
        let mut store = GeofenceStore::new();

        let dock_id = {
            let dock = store.create_polygon("dock");
            dock.add_point(Coord { lat: 0.0, lon: 0.0 });
            dock.id.clone()
        };
        let yard_id = {
            let yard = store.create_circle("yard");
            yard.add_point(Coord {
                lat: 40.0,
                lon: 116.0,
            });
            yard.set_radius(250.0);
            yard.id.clone()
        };

        assert_eq!(store.len(), 2);
        assert_ne!(dock_id, yard_id);
        assert_eq!(store.get(&dock_id).map(|f| f.name.as_str()), Some("dock"));

        let removed = store.delete(&dock_id).expect("dock present");
        assert_eq!(removed.name, "dock");
        assert!(store.get(&dock_id).is_none());
        assert_eq!(store.fences().len(), 1);
        assert_eq!(store.fences()[0].id, yard_id);
    }

    #[test]
    fn order_is_creation_order() {
        let mut store = GeofenceStore::new();
        for name in ["a", "b", "c"] {
            store.create_polygon(name);
        }

        let names: Vec<_> = store.fences().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
