mod config;
mod enricher;
mod error;
mod geocode;
mod model;
mod pipeline;
mod render;
mod route_provider;
mod sampler;
mod server;
mod simulator;
mod traffic;
mod traffic_color;
mod weather;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::AppConfig;
use enricher::RouteTrafficEnricher;
use geocode::OrsGeocoder;
use log::{info, warn};
use pipeline::RequestPipeline;
use route_provider::OrsRouteProvider;
use server::{AppState, build_router};
use simulator::{SimulatedTrafficGenerator, SystemClock};
use tokio::net::TcpListener;
use traffic::{TomTomTrafficProbe, TrafficDataSource};
use weather::OpenWeatherFactSource;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .format_timestamp_secs()
        .target(env_logger::Target::Stderr)
        .init();
    info!("Starting traffic-routes");

    let config = AppConfig::from_env()?;
    for (name, key) in [
        ("TOMTOM_API_KEY", &config.tomtom_api_key),
        ("ORS_API_KEY", &config.ors_api_key),
        ("OPENWEATHER_API_KEY", &config.openweather_api_key),
    ] {
        if key.is_empty() {
            warn!("{} is not set, the matching provider will degrade", name);
        }
    }

    let traffic = Arc::new(TrafficDataSource::new(
        Arc::new(TomTomTrafficProbe::new(&config)?),
        SimulatedTrafficGenerator::new(Arc::new(SystemClock)),
        &config,
    ));
    let pipeline = RequestPipeline::new(
        Arc::new(OrsGeocoder::new(&config)?),
        Arc::new(OrsRouteProvider::new(&config)?),
        Arc::new(OpenWeatherFactSource::new(&config)?),
        RouteTrafficEnricher::new(traffic, config.max_traffic_points),
    );

    info!("Request cap {:?}", config.request_timeout);
    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        request_timeout: config.request_timeout,
    });
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
