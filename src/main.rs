//! Builds and plots the implied volatility surface for one ticker
//!
//! 1. List the symbol's option expiries on Yahoo Finance
//! 2. Fetch every expiry's chain, one after another
//! 3. Flatten calls (or puts) into an (expiry, strike, IV) surface
//! 4. Save the 3D plot and show it in a window

use iv_surface::api::{MarketDataProvider, YahooClient};
use iv_surface::config::Config;
use iv_surface::error::Result;
use iv_surface::models::build_volatility_surface;
use iv_surface::utils::{build_mesh, plot_volatility_surface};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?.with_args(std::env::args());
    config.init_logging()?;

    let surface_cfg = &config.surface;
    info!(
        "Starting volatility surface for {} ({}, log scale: {})",
        surface_cfg.symbol, surface_cfg.option_type, surface_cfg.use_log
    );

    let client = YahooClient::new(config.yahoo.clone())?;
    let expiries = client.expiry_dates(&surface_cfg.symbol).await?;

    let surface = build_volatility_surface(
        &client,
        &surface_cfg.symbol,
        &expiries,
        surface_cfg.option_type,
        surface_cfg.use_log,
    )
    .await?;

    if !surface.skipped().is_empty() {
        let dates: Vec<String> = surface.skipped().iter().map(|s| s.expiry.label()).collect();
        warn!(
            "{} of {} expiries had no {} data: {}",
            dates.len(),
            expiries.len(),
            surface.option_type(),
            dates.join(", ")
        );
    }

    let mesh = build_mesh(&surface, surface_cfg.grid_strikes)?;
    plot_volatility_surface(
        &surface,
        &mesh,
        surface_cfg.save_path.as_deref(),
        surface_cfg.show,
    )?;

    info!("Done");
    Ok(())
}
