//! Observation and alert input files.

use std::io::Read;
use std::path::{Path, PathBuf};

use trackwatch_analyzers::ProgressCallback;
use trackwatch_analyzers_models::Observation;
use trackwatch_clustering::{AlertRecord, ClusteringError, parse_alerts};

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Alerts(#[from] ClusteringError),
}

/// Reads observations from a CSV file with a
/// `subject_id,recorded_at,latitude,longitude` header. `recorded_at` is
/// RFC 3339.
///
/// # Errors
///
/// * [`InputError::Io`] if the file cannot be opened.
/// * [`InputError::Csv`] for a malformed row.
pub fn read_observations(
    path: &Path,
    progress: &dyn ProgressCallback,
) -> Result<Vec<Observation>, InputError> {
    let file = std::fs::File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let observations = read_observations_from(file, progress)?;
    log::info!(
        "Read {} observation(s) from {}",
        observations.len(),
        path.display()
    );
    Ok(observations)
}

/// # Errors
///
/// Returns [`InputError::Csv`] for a malformed row.
pub fn read_observations_from(
    reader: impl Read,
    progress: &dyn ProgressCallback,
) -> Result<Vec<Observation>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut observations = Vec::new();
    for row in reader.deserialize::<Observation>() {
        observations.push(row?);
        progress.inc(1);
    }

    progress.finish(format!("{} observation(s)", observations.len()));
    Ok(observations)
}

/// Reads a JSON array of alert objects.
///
/// # Errors
///
/// * [`InputError::Io`] if the file cannot be read.
/// * [`InputError::Alerts`] if it is not an array of objects.
pub fn read_alerts(path: &Path) -> Result<Vec<AlertRecord>, InputError> {
    let json = std::fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_alerts(&json)?)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use trackwatch_analyzers::NullProgress;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn reads_observation_rows() {
        let csv = "\
subject_id, recorded_at, latitude, longitude
0b9e4a8c-3c1d-4f6e-8d2a-7e5b9c1f3a20, 2024-06-01T00:00:00Z, -1.30, 36.80
0b9e4a8c-3c1d-4f6e-8d2a-7e5b9c1f3a20, 2024-06-01T01:30:00+00:00, -1.31, 36.82
";
        let observations = read_observations_from(csv.as_bytes(), &NullProgress).unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(
            observations[0].subject_id,
            Uuid::parse_str("0b9e4a8c-3c1d-4f6e-8d2a-7e5b9c1f3a20").unwrap()
        );
        assert_eq!(
            observations[1].recorded_at,
            Utc.with_ymd_and_hms(2024, 6, 1, 1, 30, 0).unwrap()
        );
        assert!((observations[1].longitude - 36.82).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_row_is_a_csv_error() {
        let csv = "\
subject_id,recorded_at,latitude,longitude
not-a-uuid,2024-06-01T00:00:00Z,-1.3,36.8
";
        assert!(matches!(
            read_observations_from(csv.as_bytes(), &NullProgress),
            Err(InputError::Csv(_))
        ));
    }
}
