//! End-to-end surface assembly against an in-memory provider.

use iv_surface::api::MarketDataProvider;
use iv_surface::error::{Result, SurfaceError};
use iv_surface::models::{
    build_volatility_surface, interpolate_grid, Expiry, OptionChain, OptionRow, OptionType,
};
use iv_surface::utils::build_mesh;
use std::cell::RefCell;
use std::collections::HashMap;

/// Serves canned chains and records the order they were requested in
#[derive(Default)]
struct StaticProvider {
    expiries: Vec<Expiry>,
    chains: HashMap<i64, OptionChain>,
    failing: Option<i64>,
    requested: RefCell<Vec<String>>,
}

impl StaticProvider {
    fn with_chain(mut self, date: &str, calls: &[(f64, f64)], puts: &[(f64, f64)]) -> Self {
        let expiry: Expiry = date.parse().unwrap();
        let rows = |pairs: &[(f64, f64)]| -> Vec<OptionRow> {
            pairs.iter().map(|&(k, iv)| OptionRow::new(k, iv)).collect()
        };
        self.chains.insert(
            expiry.timestamp,
            OptionChain {
                expiry: expiry.clone(),
                calls: rows(calls),
                puts: rows(puts),
            },
        );
        self.expiries.push(expiry);
        self
    }

    fn failing_on(mut self, date: &str) -> Self {
        self.failing = Some(date.parse::<Expiry>().unwrap().timestamp);
        self
    }
}

impl MarketDataProvider for StaticProvider {
    async fn expiry_dates(&self, symbol: &str) -> Result<Vec<Expiry>> {
        if symbol == "NOPE" {
            return Err(SurfaceError::ProviderError("No options data returned".to_string()));
        }
        Ok(self.expiries.clone())
    }

    async fn option_chain(&self, _symbol: &str, expiry: &Expiry) -> Result<OptionChain> {
        self.requested.borrow_mut().push(expiry.label());
        if self.failing == Some(expiry.timestamp) {
            return Err(SurfaceError::NetworkError("connection reset".to_string()));
        }
        Ok(self
            .chains
            .get(&expiry.timestamp)
            .cloned()
            .unwrap_or_else(|| OptionChain::new(expiry.clone())))
    }
}

fn two_expiry_provider() -> StaticProvider {
    StaticProvider::default()
        .with_chain("2024-01-19", &[(50.0, 0.30), (55.0, 0.32)], &[])
        .with_chain("2024-02-16", &[], &[])
}

#[tokio::test]
async fn log_surface_skips_empty_expiry() {
    let provider = two_expiry_provider();
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let surface = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, true)
        .await
        .unwrap();

    assert_eq!(surface.expiry_indices(), &[0, 0]);
    assert_eq!(surface.strikes(), &[50.0, 55.0]);
    assert!((surface.volatilities()[0] - 0.30_f64.ln()).abs() < 1e-12);
    assert!((surface.volatilities()[1] - 0.32_f64.ln()).abs() < 1e-12);

    // The expiry list comes back unchanged
    assert_eq!(surface.expiries(), expiries.as_slice());
    assert_eq!(surface.expiries().len(), 2);

    assert_eq!(surface.skipped().len(), 1);
    assert_eq!(surface.skipped()[0].index, 1);
    assert_eq!(surface.skipped()[0].expiry.label(), "2024-02-16");
}

#[tokio::test]
async fn without_log_flag_values_are_raw() {
    let provider = two_expiry_provider();
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let surface = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, false)
        .await
        .unwrap();

    assert_eq!(surface.volatilities(), &[0.30, 0.32]);
    assert!(!surface.log_scale());
}

#[tokio::test]
async fn empty_puts_table_contributes_nothing() {
    let provider = StaticProvider::default()
        .with_chain("2024-01-19", &[(50.0, 0.30)], &[])
        .with_chain("2024-02-16", &[(50.0, 0.31)], &[(45.0, 0.40), (50.0, 0.35)]);
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let surface = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Put, false)
        .await
        .unwrap();

    assert_eq!(surface.expiry_indices(), &[1, 1]);
    assert_eq!(surface.strikes(), &[45.0, 50.0]);
    assert_eq!(surface.volatilities(), &[0.40, 0.35]);
    assert_eq!(surface.skipped()[0].index, 0);
    assert_eq!(surface.slice(0).len(), 0);
}

#[tokio::test]
async fn gaps_in_expiry_indices_are_not_renumbered() {
    let provider = StaticProvider::default()
        .with_chain("2024-01-19", &[(50.0, 0.30)], &[])
        .with_chain("2024-02-16", &[], &[])
        .with_chain("2024-03-15", &[(50.0, 0.28), (60.0, 0.33)], &[]);
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let surface = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, false)
        .await
        .unwrap();

    assert_eq!(surface.expiry_indices(), &[0, 2, 2]);
    assert_eq!(surface.contributing_indices(), vec![0, 2]);
    assert_eq!(surface.strikes().len(), surface.volatilities().len());
    assert_eq!(surface.expiry_indices().len(), surface.volatilities().len());
}

#[tokio::test]
async fn chains_are_fetched_in_expiry_order() {
    let provider = StaticProvider::default()
        .with_chain("2024-03-15", &[(50.0, 0.3)], &[])
        .with_chain("2024-01-19", &[(50.0, 0.3)], &[])
        .with_chain("2024-02-16", &[(50.0, 0.3)], &[]);
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let surface = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, false)
        .await
        .unwrap();

    assert_eq!(
        *provider.requested.borrow(),
        vec!["2024-03-15", "2024-01-19", "2024-02-16"]
    );
    // Index tags follow list position, not calendar order
    assert_eq!(surface.expiry_indices(), &[0, 1, 2]);
}

#[tokio::test]
async fn provider_failure_aborts_the_build() {
    let provider = two_expiry_provider().failing_on("2024-02-16");
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let result =
        build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, false).await;
    assert!(matches!(result, Err(SurfaceError::NetworkError(_))));

    assert!(matches!(
        provider.expiry_dates("NOPE").await,
        Err(SurfaceError::ProviderError(_))
    ));
}

#[tokio::test]
async fn non_positive_volatility_fails_under_log() {
    let provider = StaticProvider::default()
        .with_chain("2024-01-19", &[(50.0, 0.30), (55.0, 0.0)], &[]);
    let expiries = provider.expiry_dates("WBD").await.unwrap();

    let result =
        build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, true).await;
    assert!(matches!(result, Err(SurfaceError::DomainError { .. })));

    // The same chain is fine without the transform
    let raw = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, false)
        .await
        .unwrap();
    assert_eq!(raw.volatilities(), &[0.30, 0.0]);
}

#[tokio::test]
async fn empty_expiry_list_gives_empty_surface() {
    let provider = StaticProvider::default();
    let surface = build_volatility_surface(&provider, "WBD", &[], OptionType::Call, true)
        .await
        .unwrap();
    assert!(surface.is_empty());
    assert!(surface.expiries().is_empty());
    assert!(matches!(
        interpolate_grid(&surface, 10),
        Err(SurfaceError::EmptySurface)
    ));
}

#[tokio::test]
async fn assembled_surface_meshes_and_grids() {
    let provider = StaticProvider::default()
        .with_chain("2024-01-19", &[(45.0, 0.36), (50.0, 0.30), (55.0, 0.32)], &[])
        .with_chain("2024-02-16", &[], &[])
        .with_chain("2024-03-15", &[(45.0, 0.33), (50.0, 0.29), (55.0, 0.30), (60.0, 0.34)], &[]);
    let expiries = provider.expiry_dates("WBD").await.unwrap();
    let surface = build_volatility_surface(&provider, "WBD", &expiries, OptionType::Call, true)
        .await
        .unwrap();

    let mesh = build_mesh(&surface, None).unwrap();
    assert_eq!(mesh.len(), 3 + 4 - 2);

    let grid = interpolate_grid(&surface, 4).unwrap();
    assert_eq!(grid.expiry_indices, vec![0, 1, 2]);
    // The skipped middle expiry sits halfway between its neighbours at K=50
    let k50 = grid.strikes.iter().position(|&k| (k - 50.0).abs() < 1e-9).unwrap();
    let expected = 0.5 * (0.30_f64.ln() + 0.29_f64.ln());
    assert!((grid.values[[1, k50]] - expected).abs() < 1e-12);
}
