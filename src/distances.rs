use std::time::Duration;

use tokio::time;
use tracing::{info, warn};

use crate::geolocations::LocationResolver;
use crate::structs::{Coordinate, HopOutcome, HopResolution, PathPoint, SitePath};

/// Fixed inputs of path accumulation.
#[derive(Debug, Clone)]
pub struct PathSettings {
    pub source: Coordinate,
    pub source_label: String,
    /// Pause between consecutive lookups for the same site.
    pub request_delay: Duration,
}

/// Ellipsoidal (WGS-84, Vincenty) distance in kilometers.
pub fn geodesic_km(from: Coordinate, to: Coordinate) -> f64 {
    let a = geoutils::Location::new(from.latitude, from.longitude);
    let b = geoutils::Location::new(to.latitude, to.longitude);

    match a.distance_to(&b) {
        Ok(distance) => distance.meters() / 1000f64,
        Err(e) => {
            // Vincenty does not converge for nearly antipodal points
            warn!(?from, ?to, error = %e, "falling back to haversine distance");
            a.haversine_distance_to(&b).meters() / 1000f64
        }
    }
}

/// Resolves every hop in order and chains the resolved ones into a path
/// starting at the source.
///
/// A failed hop leaves the path untouched: the next resolved hop is measured
/// from the last point that did resolve.
pub async fn accumulate_path<R: LocationResolver>(
    resolver: &mut R,
    hops: &[String],
    settings: &PathSettings,
) -> SitePath {
    let mut points = vec![PathPoint::source(settings.source, &settings.source_label)];
    let mut outcomes = Vec::with_capacity(hops.len());
    let mut previous = settings.source;
    let mut cumulative_km = 0.0;

    for (i, address) in hops.iter().enumerate() {
        let hop_index = i + 1;
        if i > 0 {
            time::sleep(settings.request_delay).await;
        }

        let resolution = match resolver.resolve(address).await {
            Ok(location) => {
                let distance_km = geodesic_km(previous, location.coordinate());
                cumulative_km += distance_km;
                previous = location.coordinate();
                points.push(PathPoint::hop(&location, distance_km));

                info!(
                    hop = hop_index,
                    %address,
                    location = %location.label(),
                    distance_km = %format!("{distance_km:.2}"),
                    "hop resolved"
                );
                HopResolution::Resolved {
                    location,
                    distance_km,
                }
            }
            Err(failure) => {
                warn!(hop = hop_index, %address, reason = %failure, "failed to get location");
                HopResolution::Unresolved(failure)
            }
        };

        outcomes.push(HopOutcome {
            hop_index,
            address: address.clone(),
            resolution,
            cumulative_km,
        });
    }

    SitePath {
        points,
        hops: outcomes,
        total_km: cumulative_km,
    }
}
