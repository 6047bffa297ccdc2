use std::{
    collections::{hash_map::Entry, HashMap},
    fs,
    path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use crate::distances::{accumulate_path, PathSettings};
use crate::geolocations::LocationResolver;
use crate::plotting::PathRenderer;
use crate::records::{file_stem, write_site_csv, write_summary};
use crate::structs::{SitePath, SiteSummary, TraceRecord};

/// Drives the per-site work: accumulate, then hand the result to the CSV
/// writer and the map renderer. Sites are handled one after another.
pub struct SiteOrchestrator<R, P> {
    resolver: R,
    renderer: P,
    settings: PathSettings,
    output_dir: PathBuf,
}

impl<R: LocationResolver, P: PathRenderer> SiteOrchestrator<R, P> {
    pub fn new(resolver: R, renderer: P, settings: PathSettings, output_dir: PathBuf) -> Self {
        Self {
            resolver,
            renderer,
            settings,
            output_dir,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn renderer(&self) -> &P {
        &self.renderer
    }

    /// Processes every site in order and returns a summary for each site
    /// that had hops to trace.
    pub async fn run(&mut self, sites: &[TraceRecord]) -> Vec<SiteSummary> {
        info!(count = sites.len(), "found sites to process");
        for record in sites {
            info!(site = %record.site, hops = record.hops.len(), "queued");
            let stem = file_stem(&record.site);
            if stem != record.site {
                warn!(site = %record.site, %stem, "site name altered for output file names");
            }
        }
        for (earlier, later) in file_name_clashes(sites) {
            warn!(%earlier, %later, "sites share output file names, later site overwrites");
        }

        let mut summaries = Vec::with_capacity(sites.len());
        for record in sites {
            if record.hops.is_empty() {
                warn!(site = %record.site, "skipping site with no valid hops");
                continue;
            }
            summaries.push(self.process_site(record).await);
        }

        info!("processing complete");
        for summary in &summaries {
            info!(
                site = %summary.site,
                resolved = summary.resolved,
                hops = summary.hops,
                total_km = %format!("{:.2}", summary.total_distance_km),
                "total distance"
            );
        }

        summaries
    }

    async fn process_site(&mut self, record: &TraceRecord) -> SiteSummary {
        info!(site = %record.site, "processing traceroute");

        let path = accumulate_path(&mut self.resolver, &record.hops, &self.settings).await;
        info!(
            site = %record.site,
            total_km = %format!("{:.2}", path.total_km),
            "route traced"
        );

        self.write_outputs(&record.site, &path);

        SiteSummary {
            site: record.site.clone(),
            hops: path.hops.len(),
            resolved: path.resolved_count(),
            total_distance_km: round_km(path.total_km),
        }
    }

    /// The CSV and the map are independent: a failure writing one is logged
    /// and does not prevent the other.
    fn write_outputs(&mut self, site: &str, path: &SitePath) {
        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            error!(site, dir = %self.output_dir.display(), error = %e, "failed to create output directory");
            return;
        }

        match write_site_csv(&self.output_dir, site, &path.hops) {
            Ok(csv) => info!(site, file = %csv.display(), "CSV data saved"),
            Err(e) => error!(site, error = %e, "failed to write CSV"),
        }

        if path.points.len() < 2 {
            warn!(site, "not enough location data to create map");
            return;
        }
        match self.renderer.render(site, &path.points, &self.output_dir) {
            Ok(map) => info!(site, file = %map.display(), "map saved"),
            Err(e) => error!(site, error = %e, "failed to render map"),
        }
    }
}

/// Writes `summary.json`, logging rather than returning a failure: by the
/// time it runs every site's own artifacts are already on disk.
pub fn save_summary(dir: &Path, summaries: &[SiteSummary]) -> Option<PathBuf> {
    match write_summary(dir, summaries) {
        Ok(path) => {
            info!(file = %path.display(), "summary saved");
            Some(path)
        }
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "failed to write summary");
            None
        }
    }
}

/// Pairs of traced sites whose output files would land on the same path.
fn file_name_clashes(sites: &[TraceRecord]) -> Vec<(&str, &str)> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut clashes = Vec::new();

    for record in sites.iter().filter(|r| !r.hops.is_empty()) {
        match seen.entry(file_stem(&record.site)) {
            Entry::Occupied(e) => clashes.push((*e.get(), record.site.as_str())),
            Entry::Vacant(e) => {
                e.insert(record.site.as_str());
            }
        }
    }

    clashes
}

/// Distances are kept at full precision and rounded only when reported.
fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocations::{FixtureResolver, ResolutionFailure};
    use crate::records::OutputError;
    use crate::structs::{Coordinate, Location, PathPoint};
    use rstest::rstest;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingRenderer {
        rendered: Vec<(String, usize)>,
    }

    impl PathRenderer for RecordingRenderer {
        fn render(
            &mut self,
            site: &str,
            points: &[PathPoint],
            dir: &Path,
        ) -> Result<PathBuf, OutputError> {
            self.rendered.push((site.to_string(), points.len()));
            Ok(dir.join(format!("{site}.svg")))
        }
    }

    struct FailingRenderer;

    impl PathRenderer for FailingRenderer {
        fn render(&mut self, _: &str, _: &[PathPoint], _: &Path) -> Result<PathBuf, OutputError> {
            Err(OutputError::Render("renderer unavailable".into()))
        }
    }

    fn settings() -> PathSettings {
        PathSettings {
            source: Coordinate::new(6.9318, 79.8863),
            source_label: "Source".into(),
            request_delay: Duration::ZERO,
        }
    }

    fn record(site: &str, hops: &[&str]) -> TraceRecord {
        TraceRecord {
            site: site.into(),
            hops: hops.iter().map(|h| h.to_string()).collect(),
        }
    }

    fn google() -> Location {
        Location {
            address: "8.8.8.8".into(),
            latitude: 37.75,
            longitude: -97.82,
            city: "Wichita".into(),
            region: "Kansas".into(),
            country: "United States".into(),
            country_code: "US".into(),
            isp: "Google LLC".into(),
        }
    }

    #[tokio::test]
    async fn test_run_writes_csv_and_map_per_site() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FixtureResolver::new()
            .with_failure("10.0.0.1", ResolutionFailure::Timeout)
            .with_location(google());
        let mut orchestrator = SiteOrchestrator::new(
            resolver,
            RecordingRenderer::default(),
            settings(),
            dir.path().to_path_buf(),
        );

        let summaries = orchestrator
            .run(&[record("example", &["10.0.0.1", "8.8.8.8"])])
            .await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].hops, 2);
        assert_eq!(summaries[0].resolved, 1);
        assert_eq!(orchestrator.renderer().rendered, vec![("example".to_string(), 2)]);

        let csv = std::fs::read_to_string(dir.path().join("example_hops.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("1,10.0.0.1,Unknown,Unknown,Unknown,N/A,N/A"));
    }

    #[tokio::test]
    async fn test_all_failures_write_csv_but_no_map() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = SiteOrchestrator::new(
            FixtureResolver::new(),
            RecordingRenderer::default(),
            settings(),
            dir.path().to_path_buf(),
        );

        let summaries = orchestrator
            .run(&[record("dark", &["10.0.0.1", "10.0.0.2", "10.0.0.3"])])
            .await;

        assert!(orchestrator.renderer().rendered.is_empty());
        assert_eq!(summaries[0].resolved, 0);
        assert_eq!(summaries[0].total_distance_km, 0.0);

        let csv = std::fs::read_to_string(dir.path().join("dark_hops.csv")).unwrap();
        let rows: Vec<_> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.ends_with("Unknown,Unknown,Unknown,N/A,N/A")));
    }

    #[tokio::test]
    async fn test_empty_site_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = SiteOrchestrator::new(
            FixtureResolver::new().with_location(google()),
            RecordingRenderer::default(),
            settings(),
            dir.path().to_path_buf(),
        );

        let summaries = orchestrator
            .run(&[record("empty", &[]), record("full", &["8.8.8.8"])])
            .await;

        let names: Vec<_> = summaries.iter().map(|s| s.site.as_str()).collect();
        assert_eq!(names, vec!["full"]);
        assert!(!dir.path().join("empty_hops.csv").exists());
        assert_eq!(orchestrator.resolver().lookups(), ["8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_render_failure_does_not_stop_later_sites() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = SiteOrchestrator::new(
            FixtureResolver::new().with_location(google()),
            FailingRenderer,
            settings(),
            dir.path().to_path_buf(),
        );

        let summaries = orchestrator
            .run(&[record("a", &["8.8.8.8"]), record("b", &["8.8.8.8"])])
            .await;

        assert_eq!(summaries.len(), 2);
        assert!(dir.path().join("a_hops.csv").exists());
        assert!(dir.path().join("b_hops.csv").exists());
    }

    #[tokio::test]
    async fn test_csv_failure_still_renders_map() {
        let dir = tempfile::tempdir().unwrap();
        // a directory where the CSV should go makes File::create fail
        std::fs::create_dir(dir.path().join("example_hops.csv")).unwrap();
        let mut orchestrator = SiteOrchestrator::new(
            FixtureResolver::new().with_location(google()),
            RecordingRenderer::default(),
            settings(),
            dir.path().to_path_buf(),
        );

        let summaries = orchestrator.run(&[record("example", &["8.8.8.8"])]).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(orchestrator.renderer().rendered, vec![("example".to_string(), 2)]);
    }

    #[rstest]
    fn test_save_summary_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, "").unwrap();

        assert_eq!(save_summary(&blocked, &[]), None);
        assert_eq!(
            save_summary(dir.path(), &[]),
            Some(dir.path().join("summary.json"))
        );
    }

    #[rstest]
    fn test_file_name_clashes() {
        let sites = [
            record("a/b", &["1.1.1.1"]),
            record("c", &["1.1.1.1"]),
            record("a:b", &["1.1.1.1"]),
            record("a b", &[]),
        ];

        assert_eq!(file_name_clashes(&sites), vec![("a/b", "a:b")]);
    }

    #[rstest]
    fn test_distinct_sites_do_not_clash() {
        let sites = [record("google.com", &["1.1.1.1"]), record("wikipedia.org", &["1.1.1.1"])];

        assert!(file_name_clashes(&sites).is_empty());
    }

    #[rstest]
    #[case(1234.5678, 1234.57)]
    #[case(0.004, 0.0)]
    fn test_round_km(#[case] km: f64, #[case] expected: f64) {
        assert_eq!(round_km(km), expected);
    }
}
