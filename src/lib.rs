//! # iv-surface
//!
//! Fetches option chains for a ticker from Yahoo Finance, flattens the implied
//! volatilities of every listed expiry into a scattered (expiry, strike, IV)
//! surface, and renders it as a 3D trisurface.
//!
//! ## Pipeline
//!
//! 1. List the expiries for a symbol ([`api::MarketDataProvider::expiry_dates`])
//! 2. Fetch each expiry's chain in order and extract calls or puts
//!    ([`models::build_volatility_surface`])
//! 3. Optionally regularise onto a strike grid ([`models::interpolate_grid`])
//! 4. Mesh and plot ([`utils::build_mesh`], [`utils::plot_volatility_surface`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use iv_surface::api::{MarketDataProvider, YahooClient};
//! use iv_surface::config::YahooConfig;
//! use iv_surface::models::{build_volatility_surface, OptionType};
//! use iv_surface::utils::{build_mesh, plot_volatility_surface};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> iv_surface::error::Result<()> {
//!     let client = YahooClient::new(YahooConfig::default())?;
//!     let expiries = client.expiry_dates("WBD").await?;
//!
//!     let surface =
//!         build_volatility_surface(&client, "WBD", &expiries, OptionType::Call, true).await?;
//!     let mesh = build_mesh(&surface, None)?;
//!
//!     plot_volatility_surface(&surface, &mesh, Some(Path::new("volatility_surface.png")), false)?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use api::{MarketDataProvider, YahooClient};
pub use config::Config;
pub use error::{Result, SurfaceError};
