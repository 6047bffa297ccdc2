use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    net::IpAddr,
    path::Path,
    time::Duration,
};

use dns_lookup::lookup_host;
use ipinfo::{IpDetails, IpError, IpErrorKind, IpInfo, IpInfoConfig};
use tokio::{task, time};
use tracing::debug;

use crate::structs::Location;

/// Why a hop could not be placed on the map. All variants are treated the
/// same by the accumulator; the reason is only carried for reporting.
#[derive(Debug, Clone, PartialEq, thiserror::Error, serde::Deserialize, serde::Serialize)]
pub enum ResolutionFailure {
    #[error("lookup timed out")]
    Timeout,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("incomplete data: {0}")]
    IncompleteData(String),
    #[error("unparseable response: {0}")]
    ParseError(String),
}

/// Maps a hop address to a geographic location.
#[allow(async_fn_in_trait)]
pub trait LocationResolver {
    async fn resolve(&mut self, address: &str) -> Result<Location, ResolutionFailure>;
}

/// Headroom given to the HTTP client so that the per-call deadline in
/// [`IpInfoResolver::resolve`] always expires first.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(1);

/// Live lookups against ipinfo.io.
pub struct IpInfoResolver {
    ipinfo: IpInfo,
    timeout: Duration,
}

impl IpInfoResolver {
    pub fn new(token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let config = IpInfoConfig {
            token,
            timeout: timeout + CLIENT_TIMEOUT_SLACK,
            ..Default::default()
        };
        let ipinfo = IpInfo::new(config)
            .map_err(|e| anyhow::anyhow!("failed to construct ipinfo client: {e}"))?;

        Ok(Self { ipinfo, timeout })
    }

    async fn lookup(&mut self, address: &str) -> Result<Location, ResolutionFailure> {
        let ip = to_ip(address).await?;
        let details = self
            .ipinfo
            .lookup(&ip.to_string())
            .await
            .map_err(from_ip_error)?;

        to_location(details)
    }
}

impl LocationResolver for IpInfoResolver {
    async fn resolve(&mut self, address: &str) -> Result<Location, ResolutionFailure> {
        let timeout = self.timeout;
        time::timeout(timeout, self.lookup(address))
            .await
            .map_err(|_| ResolutionFailure::Timeout)?
    }
}

/// mtr prints hostnames unless run with `-n`; those go through DNS first.
async fn to_ip(address: &str) -> Result<IpAddr, ResolutionFailure> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }

    let host = address.to_string();
    let ips = task::spawn_blocking(move || lookup_host(&host))
        .await
        .map_err(|e| ResolutionFailure::NetworkError(e.to_string()))?
        .map_err(|e| ResolutionFailure::NetworkError(format!("dns lookup for {address}: {e}")))?;

    let ip = ips.first().copied().ok_or_else(|| {
        ResolutionFailure::NetworkError(format!("dns lookup for {address} returned nothing"))
    })?;
    debug!(%address, %ip, "resolved hostname");
    Ok(ip)
}

fn from_ip_error(e: IpError) -> ResolutionFailure {
    match e.kind() {
        IpErrorKind::TimeOutError => ResolutionFailure::Timeout,
        // reqwest reports its own deadline as a client error
        IpErrorKind::HTTPClientError if e.to_string().contains("timed out") => {
            ResolutionFailure::Timeout
        }
        IpErrorKind::ParseError => ResolutionFailure::ParseError(e.to_string()),
        _ => ResolutionFailure::NetworkError(e.to_string()),
    }
}

fn to_location(details: IpDetails) -> Result<Location, ResolutionFailure> {
    if details.bogon == Some(true) {
        return Err(ResolutionFailure::IncompleteData(format!(
            "{} is a bogon address",
            details.ip
        )));
    }
    if details.loc.trim().is_empty() {
        return Err(ResolutionFailure::IncompleteData(format!(
            "no coordinates for {}",
            details.ip
        )));
    }
    let (latitude, longitude) = parse_loc(&details.loc)?;

    let country = details
        .country_name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| or_unknown(&details.country));
    let country_code = if details.country.is_empty() {
        "??".to_string()
    } else {
        details.country.clone()
    };

    Ok(Location {
        address: details.ip.clone(),
        latitude,
        longitude,
        city: or_unknown(&details.city),
        region: or_unknown(&details.region),
        country,
        country_code,
        isp: details
            .org
            .as_deref()
            .map(or_unknown)
            .unwrap_or_else(|| "Unknown".to_string()),
    })
}

/// ipinfo reports coordinates as a single `"<lat>,<lon>"` string.
fn parse_loc(loc: &str) -> Result<(f64, f64), ResolutionFailure> {
    let malformed = || ResolutionFailure::ParseError(format!("malformed loc '{loc}'"));

    let (lat, lon) = loc.split_once(',').ok_or_else(malformed)?;
    let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
    let lon: f64 = lon.trim().parse().map_err(|_| malformed())?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(malformed());
    }

    Ok((lat, lon))
}

fn or_unknown(value: &str) -> String {
    if value.trim().is_empty() {
        "Unknown".to_string()
    } else {
        value.to_string()
    }
}

/// Offline resolver backed by known answers, e.g. a JSON dump of earlier
/// lookups. Addresses without an entry fail with `IncompleteData`.
#[derive(Debug, Default)]
pub struct FixtureResolver {
    answers: HashMap<String, Result<Location, ResolutionFailure>>,
    lookups: Vec<String>,
}

impl FixtureResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of locations, keyed by their `address`.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let input = File::open(path)?;
        let locations: Vec<Location> = serde_json::from_reader(BufReader::new(input))?;

        Ok(locations
            .into_iter()
            .fold(Self::new(), |resolver, location| resolver.with_location(location)))
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.answers.insert(location.address.clone(), Ok(location));
        self
    }

    pub fn with_failure(mut self, address: &str, failure: ResolutionFailure) -> Self {
        self.answers.insert(address.to_string(), Err(failure));
        self
    }

    /// Every address looked up so far, in call order.
    pub fn lookups(&self) -> &[String] {
        &self.lookups
    }
}

impl LocationResolver for FixtureResolver {
    async fn resolve(&mut self, address: &str) -> Result<Location, ResolutionFailure> {
        self.lookups.push(address.to_string());
        self.answers.get(address).cloned().unwrap_or_else(|| {
            Err(ResolutionFailure::IncompleteData(format!(
                "no known location for {address}"
            )))
        })
    }
}
