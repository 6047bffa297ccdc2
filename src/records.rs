use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use crate::structs::{HopOutcome, SiteSummary};

const HEADER: [&str; 7] = [
    "Hop",
    "IP Address",
    "Country",
    "City",
    "ISP",
    "Distance (km)",
    "Cumulative Distance (km)",
];
const UNKNOWN: &str = "Unknown";
const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render map: {0}")]
    Render(String),
}

/// The site name with everything but alphanumerics, `.`, `-` and `_`
/// replaced by `_`. Distinct sites can map to the same stem.
pub fn file_stem(site: &str) -> String {
    site.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Builds `<dir>/<stem><suffix>` for a site.
pub fn site_file(dir: &Path, site: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{}{suffix}", file_stem(site)))
}

/// Writes one row per hop, resolved or not.
pub fn write_hops<W: io::Write>(writer: W, hops: &[HopOutcome]) -> Result<(), OutputError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    for hop in hops {
        let index = hop.hop_index.to_string();
        match (hop.location(), hop.distance_km()) {
            (Some(location), Some(distance_km)) => {
                let distance = format!("{distance_km:.2}");
                let cumulative = format!("{:.2}", hop.cumulative_km);
                wtr.write_record([
                    index.as_str(),
                    location.address.as_str(),
                    location.country.as_str(),
                    location.city.as_str(),
                    location.isp.as_str(),
                    distance.as_str(),
                    cumulative.as_str(),
                ])?;
            }
            _ => wtr.write_record([
                index.as_str(),
                hop.address.as_str(),
                UNKNOWN,
                UNKNOWN,
                UNKNOWN,
                NOT_APPLICABLE,
                NOT_APPLICABLE,
            ])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `<site>_hops.csv` under `dir` and returns its path.
pub fn write_site_csv(dir: &Path, site: &str, hops: &[HopOutcome]) -> Result<PathBuf, OutputError> {
    let path = site_file(dir, site, "_hops.csv");
    write_hops(File::create(&path)?, hops)?;
    Ok(path)
}

/// Writes the per-site totals of a run as `summary.json`.
pub fn write_summary(dir: &Path, summaries: &[SiteSummary]) -> Result<PathBuf, OutputError> {
    fs::create_dir_all(dir)?;
    let path = dir.join("summary.json");
    let output = File::create(&path)?;
    serde_json::to_writer_pretty(output, summaries)?;
    Ok(path)
}
