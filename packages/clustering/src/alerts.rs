//! Alert record normalization and cluster reduction.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use trackwatch_geometry_models::GeoPoint;

use crate::ClusteringError;
use crate::dbscan::dbscan;

/// An opaque alert payload. Only its coordinates matter for clustering.
pub type AlertRecord = Map<String, Value>;

/// Key added to each representative alert with the size of its cluster.
pub const NUM_CLUSTERED_ALERTS: &str = "num_clustered_alerts";

/// Returns a copy of `alert` with `lat`/`long` renamed to
/// `latitude`/`longitude`. An alias overwrites an existing full-name key.
#[must_use]
pub fn normalize_alert(alert: &AlertRecord) -> AlertRecord {
    let mut normalized = alert.clone();
    if let Some(lat) = normalized.remove("lat") {
        normalized.insert("latitude".to_string(), lat);
    }
    if let Some(long) = normalized.remove("long") {
        normalized.insert("longitude".to_string(), long);
    }
    normalized
}

/// Reads the `latitude`/`longitude` of a normalized alert.
///
/// Accepts numbers and numeric strings. Returns `None` if either key is
/// missing, unparseable or non-finite.
#[must_use]
pub fn alert_point(alert: &AlertRecord) -> Option<GeoPoint> {
    let latitude = coordinate(alert.get("latitude")?)?;
    let longitude = coordinate(alert.get("longitude")?)?;
    Some(GeoPoint::new(longitude, latitude))
}

fn coordinate(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Groups alerts by positive cluster label.
///
/// Groups are ordered by the first appearance of their label in `labels`;
/// members keep input order. Noise is dropped.
#[must_use]
pub fn group_alerts(alerts: &[AlertRecord], labels: &[i32]) -> Vec<Vec<AlertRecord>> {
    let mut group_index: BTreeMap<i32, usize> = BTreeMap::new();
    let mut groups: Vec<Vec<AlertRecord>> = Vec::new();

    for (label, alert) in labels.iter().zip(alerts) {
        if *label <= 0 {
            continue;
        }
        let idx = *group_index.entry(*label).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(alert.clone());
    }

    groups
}

/// Reduces `alerts` to one representative per spatial cluster.
///
/// Alerts are normalized, clustered with [`dbscan`] using `radius_km` and
/// `min_cluster_size`, and each cluster is replaced by its first member (in
/// input order) with [`NUM_CLUSTERED_ALERTS`] set to the cluster size. The
/// representative is not a centroid. Noise alerts are dropped.
///
/// # Errors
///
/// Returns [`ClusteringError::InvalidRadius`] if `radius_km` is not a
/// positive, finite number.
pub fn cluster_alerts(
    alerts: &[AlertRecord],
    radius_km: f64,
    min_cluster_size: usize,
) -> Result<Vec<AlertRecord>, ClusteringError> {
    if !radius_km.is_finite() || radius_km <= 0.0 {
        return Err(ClusteringError::InvalidRadius { radius_km });
    }

    let normalized: Vec<AlertRecord> = alerts.iter().map(normalize_alert).collect();
    let points: Vec<Option<GeoPoint>> = normalized.iter().map(alert_point).collect();

    let missing = points.iter().filter(|p| p.is_none()).count();
    if missing > 0 {
        log::warn!(
            "{missing} of {} alerts have no usable coordinates",
            alerts.len()
        );
    }

    let labels = dbscan(&points, radius_km, min_cluster_size);

    let representatives: Vec<AlertRecord> = group_alerts(&normalized, &labels)
        .into_iter()
        .filter_map(|group| {
            let size = group.len();
            let mut representative = group.into_iter().next()?;
            representative.insert(NUM_CLUSTERED_ALERTS.to_string(), Value::from(size));
            Some(representative)
        })
        .collect();

    log::info!(
        "Clustered {} alerts into {} representatives (radius {radius_km} km)",
        alerts.len(),
        representatives.len()
    );

    Ok(representatives)
}

/// Parses a JSON array of alert objects.
///
/// # Errors
///
/// * [`ClusteringError::Json`] if `json` is not valid JSON or not an array.
/// * [`ClusteringError::NotAnObject`] if an element is not an object.
pub fn parse_alerts(json: &str) -> Result<Vec<AlertRecord>, ClusteringError> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| match value {
            Value::Object(map) => Ok(map),
            _ => Err(ClusteringError::NotAnObject { index }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert(value: Value) -> AlertRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn deforestation_alerts() -> Vec<AlertRecord> {
        [
            (98.449_875, 15.966_125),
            (98.489_125, 15.965_625),
            (97.923_375, 15.963_875),
            (98.505_875, 15.959_125),
            (97.958_375, 15.957_375),
            (98.529_625, 15.957_125),
            (98.622_125, 15.953_125),
            (98.443_375, 15.951_375),
            (97.936_875, 15.950_125),
            (97.937_375, 15.945_625),
        ]
        .iter()
        .enumerate()
        .map(|(i, (long, lat))| {
            alert(json!({
                "year": 2020,
                "long": long,
                "lat": lat,
                "julian_day": 65 + i,
                "confidence": 2,
            }))
        })
        .collect()
    }

    #[test]
    fn normalizes_lat_long_aliases() {
        let raw = alert(json!({
            "year": 2020,
            "long": 98.449_875,
            "lat": 15.966_125,
            "julian_day": 65,
            "confidence": 2
        }));
        let expected = alert(json!({
            "year": 2020,
            "longitude": 98.449_875,
            "latitude": 15.966_125,
            "julian_day": 65,
            "confidence": 2
        }));
        assert_eq!(normalize_alert(&raw), expected);
        assert!(raw.contains_key("lat"), "input must not be mutated");
    }

    #[test]
    fn reads_numeric_and_string_coordinates() {
        let numeric = alert(json!({"latitude": 1.5, "longitude": 2.5}));
        let text = alert(json!({"latitude": "1.5", "longitude": " 2.5 "}));
        assert_eq!(alert_point(&numeric), Some(GeoPoint::new(2.5, 1.5)));
        assert_eq!(alert_point(&text), Some(GeoPoint::new(2.5, 1.5)));
        assert_eq!(alert_point(&alert(json!({"latitude": 1.5}))), None);
        let flag = alert(json!({"latitude": true, "longitude": 1.0}));
        assert_eq!(alert_point(&flag), None);
    }

    #[test]
    fn groups_in_order_of_first_label_appearance() {
        let alerts: Vec<AlertRecord> = (0..4).map(|i| alert(json!({"i": i}))).collect();
        let groups = group_alerts(&alerts, &[2, 1, -1, 2]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0]["i"], 0);
        assert_eq!(groups[0][1]["i"], 3);
        assert_eq!(groups[1][0]["i"], 1);
    }

    #[test]
    fn clustering_reduces_alert_volume() {
        let alerts = deforestation_alerts();
        let clustered = cluster_alerts(&alerts, 4.0, 1).unwrap();

        assert_eq!(clustered.len(), 4);
        assert!(clustered.len() < alerts.len());
        for representative in &clustered {
            assert!(representative.contains_key(NUM_CLUSTERED_ALERTS));
            assert!(representative.contains_key("latitude"));
        }
    }

    #[test]
    fn cluster_sizes_sum_to_input_length_with_min_size_one() {
        let alerts = deforestation_alerts();
        let clustered = cluster_alerts(&alerts, 4.0, 1).unwrap();
        let total: u64 = clustered
            .iter()
            .map(|a| a[NUM_CLUSTERED_ALERTS].as_u64().unwrap())
            .sum();
        assert_eq!(total, alerts.len() as u64);
    }

    #[test]
    fn representative_is_first_member() {
        let clustered = cluster_alerts(&deforestation_alerts(), 4.0, 1).unwrap();
        // Cluster 1 is alerts 0 and 7; alert 0 represents it.
        assert_eq!(clustered[0]["julian_day"], 65);
        assert_eq!(clustered[0][NUM_CLUSTERED_ALERTS], 2);
        // Cluster 3 is alerts 2, 4, 8 and 9.
        assert_eq!(clustered[2]["julian_day"], 67);
        assert_eq!(clustered[2][NUM_CLUSTERED_ALERTS], 4);
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(matches!(
            cluster_alerts(&deforestation_alerts(), 0.0, 1),
            Err(ClusteringError::InvalidRadius { .. })
        ));
        assert!(matches!(
            cluster_alerts(&deforestation_alerts(), f64::NAN, 1),
            Err(ClusteringError::InvalidRadius { .. })
        ));
    }

    #[test]
    fn parses_alert_arrays() {
        let json = r#"[{"lat": 1, "long": 2}, {"latitude": 3, "longitude": 4}]"#;
        let alerts = parse_alerts(json).unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(matches!(
            parse_alerts("[1, 2]"),
            Err(ClusteringError::NotAnObject { index: 0 })
        ));
        assert!(matches!(parse_alerts("{}"), Err(ClusteringError::Json(_))));
    }
}
