#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Operator CLI for trackwatch.
//!
//! * `cluster` reduces a JSON array of alerts to one representative per
//!   DBSCAN cluster.
//! * `crossings` reports geofence crossings for observations in a CSV file.
//! * `analyze` runs every configured analyzer for every configured subject
//!   and prints the resulting events as JSON lines.
//!
//! Uses `indicatif-log-bridge` (via [`trackwatch_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod config;
mod input;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use trackwatch_analyzers::{
    AnalysisRunner, AnalyzerContext, BatchRunner, CancellationToken, Clock, CollectingEventSink,
    InMemoryObservationSource, InMemoryQuietPeriodStore, InMemoryResultHistory, ManualClock,
    SystemClock, build_analyzer,
};
use trackwatch_cli_utils::{IndicatifProgress, MultiProgress};
use trackwatch_clustering::cluster_alerts;
use trackwatch_geofence::{
    GeofenceAnalysisParams, WarnLevel, calc_crossings, load_geofences_geojson, load_regions_geojson,
};
use trackwatch_geometry_models::Fix;
use trackwatch_trajectory::{Trajectory, TrajectoryFilter};
use uuid::Uuid;

use crate::config::TrackwatchConfig;

/// Analyze tracked-subject positions for alerts.
#[derive(Parser)]
#[command(name = "trackwatch")]
#[command(about = "Analyze tracked-subject positions for alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster alerts and print one representative per cluster.
    Cluster {
        /// JSON array of alert objects with `latitude`/`longitude`.
        #[arg(long)]
        input: PathBuf,

        /// Neighborhood radius in kilometers.
        #[arg(long, default_value_t = 4.0)]
        radius_km: f64,

        /// Minimum number of alerts in a cluster.
        #[arg(long, default_value_t = 1)]
        min_cluster_size: usize,
    },

    /// Report geofence crossings.
    Crossings {
        /// `GeoJSON` fences (polygons or lines).
        #[arg(long)]
        fences: PathBuf,

        /// `GeoJSON` containment regions.
        #[arg(long)]
        regions: Option<PathBuf>,

        /// Observations CSV.
        #[arg(long)]
        observations: PathBuf,

        /// Warn level assigned to every fence (WARNING or CRITICAL).
        #[arg(long, default_value = "CRITICAL")]
        warn_level: WarnLevel,
    },

    /// Run the configured analyzers over an observations file.
    Analyze {
        /// `trackwatch.toml`.
        #[arg(long)]
        config: PathBuf,

        /// Observations CSV.
        #[arg(long)]
        observations: PathBuf,

        /// Evaluate look-back windows as of this RFC 3339 time instead of
        /// now.
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Validate the configuration and build every analyzer without
        /// running them.
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = trackwatch_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster {
            input,
            radius_km,
            min_cluster_size,
        } => cmd_cluster(&input, radius_km, min_cluster_size),
        Commands::Crossings {
            fences,
            regions,
            observations,
            warn_level,
        } => cmd_crossings(
            &multi,
            &fences,
            regions.as_deref(),
            &observations,
            warn_level,
        ),
        Commands::Analyze {
            config,
            observations,
            now,
            dry_run,
        } => cmd_analyze(&multi, &config, &observations, now, dry_run),
    }
}

fn cmd_cluster(
    input: &Path,
    radius_km: f64,
    min_cluster_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let alerts = input::read_alerts(input)?;
    let representatives = cluster_alerts(&alerts, radius_km, min_cluster_size)?;
    println!("{}", serde_json::to_string_pretty(&representatives)?);
    Ok(())
}

fn cmd_crossings(
    multi: &MultiProgress,
    fences: &Path,
    regions: Option<&Path>,
    observations: &Path,
    warn_level: WarnLevel,
) -> Result<(), Box<dyn std::error::Error>> {
    let geofences = load_geofences_geojson(&std::fs::read_to_string(fences)?, warn_level)?;
    let regions = match regions {
        Some(path) => load_regions_geojson(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };

    let progress = IndicatifProgress::records_bar(multi, "Reading observations");
    let observations = input::read_observations(observations, progress.as_ref())?;

    let mut fixes_by_subject: BTreeMap<Uuid, Vec<Fix>> = BTreeMap::new();
    for observation in &observations {
        fixes_by_subject
            .entry(observation.subject_id)
            .or_default()
            .push(observation.to_fix());
    }

    let filter = TrajectoryFilter::default();
    let trajectories: Vec<Trajectory> = fixes_by_subject
        .into_iter()
        .map(|(subject_id, fixes)| {
            Trajectory::build_filtered(subject_id, fixes, &filter)
        })
        .collect();

    let params = GeofenceAnalysisParams::new(geofences, regions);
    let result = calc_crossings(&params, &trajectories);
    log::info!(
        "{} crossing(s) across {} subject(s)",
        result.crossings.len(),
        trajectories.len()
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_analyze(
    multi: &MultiProgress,
    config_path: &Path,
    observations: &Path,
    now: Option<DateTime<Utc>>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = TrackwatchConfig::load(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let context = AnalyzerContext::new(config.load_catalog(base_dir)?);
    let jobs = config.jobs()?;

    if dry_run {
        let mut failures = 0_usize;
        for job in &jobs {
            for analyzer_config in &job.configs {
                let name = &analyzer_config.name;
                let kind = analyzer_config.kind();
                match build_analyzer(&job.subject, analyzer_config, &context) {
                    Ok(_) => println!("ok    {} / {name} ({kind})", job.subject.name),
                    Err(e) => {
                        failures += 1;
                        println!("error {} / {name}: {e}", job.subject.name);
                    }
                }
            }
        }
        log::info!(
            "Dry run: {} subject(s), {failures} analyzer error(s)",
            jobs.len()
        );
        return Ok(());
    }

    let clock: Arc<dyn Clock> = match now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };

    let mut source = InMemoryObservationSource::with_clock(clock.clone());
    for (subtype, filter) in &config.subtype_filters {
        source = source.with_subtype_filter(subtype.clone(), filter.clone());
    }
    let progress = IndicatifProgress::records_bar(multi, "Reading observations");
    source.extend(input::read_observations(observations, progress.as_ref())?)?;

    let sink = Arc::new(CollectingEventSink::new());
    let runner = AnalysisRunner::new(
        Arc::new(source),
        Arc::new(InMemoryResultHistory::new()),
        sink.clone(),
        Arc::new(InMemoryQuietPeriodStore::with_clock(clock)),
    );
    let batch = BatchRunner::new(runner, context);

    let progress = IndicatifProgress::subjects_bar(multi, "Analyzing");
    let summary = batch.run(&jobs, &CancellationToken::new(), progress.as_ref());

    for event in sink.events()? {
        println!("{}", serde_json::to_string(&event)?);
    }

    log::info!(
        "{} subject(s), {} run(s), {} quiet, {} insufficient, {} failed, {} result(s), {} event(s)",
        summary.subjects,
        summary.analyzers_run,
        summary.quiet_skipped,
        summary.insufficient_data,
        summary.failures,
        summary.results,
        summary.events
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_level_is_parsed_from_its_screaming_name() {
        let cli = Cli::try_parse_from([
            "trackwatch",
            "crossings",
            "--fences",
            "fences.geojson",
            "--observations",
            "observations.csv",
            "--warn-level",
            "WARNING",
        ])
        .unwrap();

        let Commands::Crossings { warn_level, .. } = cli.command else {
            panic!("expected the crossings command");
        };
        assert_eq!(warn_level, WarnLevel::Warning);
    }

    #[test]
    fn warn_level_defaults_to_critical() {
        let args = "trackwatch crossings --fences f --observations o".split(' ');
        let cli = Cli::try_parse_from(args).unwrap();

        let Commands::Crossings { warn_level, .. } = cli.command else {
            panic!("expected the crossings command");
        };
        assert_eq!(warn_level, WarnLevel::Critical);
    }

    #[test]
    fn unknown_warn_level_is_rejected() {
        let args = "trackwatch crossings --fences f --observations o".split(' ');
        let result = Cli::try_parse_from(args.chain(["--warn-level", "AMBER"]));
        assert!(result.is_err());
    }

    #[test]
    fn analyze_accepts_an_rfc3339_now() {
        let cli = Cli::try_parse_from([
            "trackwatch",
            "analyze",
            "--config",
            "trackwatch.toml",
            "--observations",
            "observations.csv",
            "--now",
            "2024-06-01T00:00:00Z",
            "--dry-run",
        ])
        .unwrap();

        let Commands::Analyze { now, dry_run, .. } = cli.command else {
            panic!("expected the analyze command");
        };
        let expected = "2024-06-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(now, Some(expected));
        assert!(dry_run);
    }
}
