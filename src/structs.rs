use crate::geolocations::ResolutionFailure;

/// A site block from the trace capture: the destination name and the hop
/// addresses that were accepted for it, in the order they appeared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub site: String,
    pub hops: Vec<String>,
}

#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A resolved hop. Only ever built from a successful lookup.
#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq)]
pub struct Location {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub region: String,
    pub country: String,
    pub country_code: String,
    pub isp: String,
}

impl Location {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// `"<city>, <country code>"`, used as the marker label.
    pub fn label(&self) -> String {
        format!("{}, {}", self.city, self.country_code)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
    pub detail: String,
    pub is_source: bool,
}

impl PathPoint {
    pub fn source(at: Coordinate, label: &str) -> Self {
        Self {
            latitude: at.latitude,
            longitude: at.longitude,
            label: label.to_string(),
            detail: "Your location".to_string(),
            is_source: true,
        }
    }

    pub fn hop(location: &Location, distance_km: f64) -> Self {
        Self {
            latitude: location.latitude,
            longitude: location.longitude,
            label: location.label(),
            detail: format!(
                "IP: {}\nISP: {}\nDistance: {:.2} km",
                location.address, location.isp, distance_km
            ),
            is_source: false,
        }
    }
}

#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HopResolution {
    Resolved { location: Location, distance_km: f64 },
    Unresolved(ResolutionFailure),
}

#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq)]
pub struct HopOutcome {
    /// 1-based position within the site's accepted hops.
    pub hop_index: usize,
    /// The address as it appeared in the trace.
    pub address: String,
    pub resolution: HopResolution,
    pub cumulative_km: f64,
}

impl HopOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution, HopResolution::Resolved { .. })
    }

    pub fn location(&self) -> Option<&Location> {
        match &self.resolution {
            HopResolution::Resolved { location, .. } => Some(location),
            HopResolution::Unresolved(_) => None,
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        match self.resolution {
            HopResolution::Resolved { distance_km, .. } => Some(distance_km),
            HopResolution::Unresolved(_) => None,
        }
    }
}

/// Everything the accumulator produces for one site.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePath {
    pub points: Vec<PathPoint>,
    pub hops: Vec<HopOutcome>,
    pub total_km: f64,
}

impl SitePath {
    pub fn resolved_count(&self) -> usize {
        self.hops.iter().filter(|h| h.is_resolved()).count()
    }
}

#[derive(Debug, serde::Deserialize, serde::Serialize, Clone, PartialEq)]
pub struct SiteSummary {
    pub site: String,
    pub hops: usize,
    pub resolved: usize,
    pub total_distance_km: f64,
}
