//! DBSCAN over haversine distance.
//!
//! See <https://en.wikipedia.org/wiki/DBSCAN>. Labels are `0` while a point
//! is unvisited, [`NOISE`] for points in no cluster, and `1..` for cluster
//! ids in the order clusters are seeded. `0` never survives a run.

use trackwatch_geometry::haversine_km;
use trackwatch_geometry_models::GeoPoint;

/// Label of a point that belongs to no cluster.
pub const NOISE: i32 = -1;

const UNVISITED: i32 = 0;

/// Clusters `points` and returns one label per point, in input order.
///
/// A point is a neighbor of `p` when it is strictly closer than `eps_km`
/// (every located point is its own neighbor). A point with fewer than
/// `min_cluster_size` neighbors is noise unless a later cluster claims it as
/// a border point. A `None` point has no coordinates: it is nobody's
/// neighbor, not even its own, so it always ends up as noise.
///
/// Deterministic: the same input always yields the same labels.
#[must_use]
pub fn dbscan(points: &[Option<GeoPoint>], eps_km: f64, min_cluster_size: usize) -> Vec<i32> {
    let mut labels = vec![UNVISITED; points.len()];
    let mut current_cluster = 0;

    for p in 0..points.len() {
        if labels[p] != UNVISITED {
            continue;
        }

        let neighbors = radius_query(points, p, eps_km);

        if neighbors.len() < min_cluster_size {
            labels[p] = NOISE;
        } else {
            current_cluster += 1;
            grow_cluster(
                points,
                &mut labels,
                p,
                neighbors,
                current_cluster,
                eps_km,
                min_cluster_size,
            );
        }
    }

    log::debug!(
        "dbscan: {} points, {current_cluster} clusters, {} noise",
        points.len(),
        labels.iter().filter(|l| **l == NOISE).count()
    );

    labels
}

/// Expands cluster `cluster` from seed `p` by walking a FIFO queue of
/// neighbors. Noise points reached here become border points and are not
/// expanded; unvisited points are claimed and, if they are core points,
/// their neighbors are appended to the queue. Already-claimed points that
/// show up again in the queue are skipped.
fn grow_cluster(
    points: &[Option<GeoPoint>],
    labels: &mut [i32],
    p: usize,
    mut queue: Vec<usize>,
    cluster: i32,
    eps_km: f64,
    min_cluster_size: usize,
) {
    labels[p] = cluster;

    let mut i = 0;
    while i < queue.len() {
        let pn = queue[i];

        if labels[pn] == NOISE {
            labels[pn] = cluster;
        } else if labels[pn] == UNVISITED {
            labels[pn] = cluster;

            let pn_neighbors = radius_query(points, pn, eps_km);
            if pn_neighbors.len() >= min_cluster_size {
                queue.extend(pn_neighbors);
            }
        }

        i += 1;
    }
}

/// Indexes of all points strictly within `eps_km` of point `p`.
fn radius_query(points: &[Option<GeoPoint>], p: usize, eps_km: f64) -> Vec<usize> {
    let Some(current) = points[p] else {
        return Vec::new();
    };

    points
        .iter()
        .enumerate()
        .filter_map(|(pn, point)| {
            let point = (*point)?;
            let distance = haversine_km(
                current.longitude,
                current.latitude,
                point.longitude,
                point.latitude,
            );
            (distance < eps_km).then_some(pn)
        })
        .collect()
}
