use dotenv::dotenv;
use tracing::{error, info};

use tracemap::{
    config::Config,
    geolocations::{FixtureResolver, IpInfoResolver, LocationResolver},
    pipeline::{save_summary, SiteOrchestrator},
    plotting::SvgMapRenderer,
    structs::TraceRecord,
    trace::load_trace,
};

async fn run<R: LocationResolver>(
    resolver: R,
    config: Config,
    sites: &[TraceRecord],
) -> anyhow::Result<()> {
    let mut orchestrator =
        SiteOrchestrator::new(resolver, SvgMapRenderer, config.path, config.output_dir.clone());
    let summaries = orchestrator.run(sites).await;

    save_summary(&config.output_dir, &summaries);

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env is fine, everything has a default
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let sites = match load_trace(&config.trace_file) {
        Ok(sites) => sites,
        Err(e) => {
            error!(error = %e, "could not read trace file");
            Vec::new()
        }
    };
    if sites.is_empty() {
        error!("no sites found in the input file, please check the file format");
        return Ok(());
    }

    match config.fixtures.clone() {
        Some(path) => {
            info!(file = %path.display(), "resolving from fixtures");
            run(FixtureResolver::from_json_file(&path)?, config, &sites).await
        }
        None => {
            let resolver = IpInfoResolver::new(config.token.clone(), config.resolver_timeout)?;
            run(resolver, config, &sites).await
        }
    }
}
