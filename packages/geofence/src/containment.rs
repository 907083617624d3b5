//! R-tree index over containment regions.

use std::collections::BTreeSet;

use geo::{BoundingRect, Contains, MultiPolygon};
use rstar::{AABB, RTree, RTreeObject};
use trackwatch_geometry::to_point;
use trackwatch_geometry_models::GeoPoint;

use crate::Region;

struct RegionEntry {
    id: String,
    envelope: AABB<[f64; 2]>,
    area: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-region lookups over a fixed set of regions.
///
/// Regions may overlap; a point reports every region containing it.
pub struct RegionIndex {
    tree: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Bulk-loads the index.
    #[must_use]
    pub fn new(regions: &[Region]) -> Self {
        let entries = regions
            .iter()
            .map(|region| RegionEntry {
                id: region.id().to_string(),
                envelope: compute_envelope(region.area()),
                area: region.area().clone(),
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Ids of every region strictly containing `point`, in sorted order.
    #[must_use]
    pub fn containing(&self, point: GeoPoint) -> BTreeSet<String> {
        let query_env = AABB::from_point([point.longitude, point.latitude]);
        let target = to_point(point);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.area.contains(&target))
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Number of indexed regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn compute_envelope(area: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    area.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: &str, min: f64, max: f64) -> Region {
        Region::polygon(
            id,
            id.to_uppercase(),
            &[
                GeoPoint::new(min, min),
                GeoPoint::new(min, max),
                GeoPoint::new(max, max),
                GeoPoint::new(max, min),
            ],
        )
        .unwrap()
    }

    #[test]
    fn overlapping_regions_are_all_reported() {
        let index = RegionIndex::new(&[square("outer", 0.0, 10.0), square("inner", 2.0, 4.0)]);
        let ids = index.containing(GeoPoint::new(3.0, 3.0));
        let expected = ["inner", "outer"].map(String::from);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn point_outside_every_region_is_empty() {
        let index = RegionIndex::new(&[square("a", 0.0, 1.0)]);
        assert!(index.containing(GeoPoint::new(5.0, 5.0)).is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn empty_index_contains_nothing() {
        let index = RegionIndex::new(&[]);
        assert!(index.is_empty());
        assert!(index.containing(GeoPoint::new(0.0, 0.0)).is_empty());
    }
}
