//! Runs in its own test binary because it points the process-wide HTTPS
//! proxy at a listener that never answers.

use std::{
    env,
    net::TcpListener,
    thread,
    time::{Duration, Instant},
};

use tracemap::geolocations::{IpInfoResolver, LocationResolver, ResolutionFailure};

#[tokio::test]
async fn test_unresponsive_service_times_out_at_configured_deadline() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let proxy = format!("http://{}", listener.local_addr().unwrap());
    thread::spawn(move || {
        // hold every connection open without replying
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });

    for key in ["NO_PROXY", "no_proxy", "HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"] {
        env::remove_var(key);
    }
    env::set_var("HTTPS_PROXY", &proxy);
    env::set_var("https_proxy", &proxy);

    let timeout = Duration::from_secs(4);
    let mut resolver = IpInfoResolver::new(None, timeout).unwrap();

    let started = Instant::now();
    let result = resolver.resolve("8.8.8.8").await;
    let elapsed = started.elapsed();

    assert_eq!(result, Err(ResolutionFailure::Timeout));
    assert!(elapsed >= timeout, "gave up after {elapsed:?}");
    assert!(elapsed < timeout + Duration::from_secs(1), "gave up after {elapsed:?}");
}
