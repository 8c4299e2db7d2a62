//! Implied volatility extraction and surface assembly
//!
//! A [`VolatilitySurface`] is three parallel sequences (expiry index, strike,
//! implied volatility) accumulated across an ordered expiry list. Rows are kept
//! in append order; nothing is sorted, deduplicated or interpolated here.

use crate::api::MarketDataProvider;
use crate::error::{Result, SurfaceError};
use crate::models::option::{Expiry, OptionChain, OptionType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One (expiry index, strike, volatility) point of the surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSample {
    pub expiry_index: usize,
    pub strike: f64,
    pub volatility: f64,
}

/// An expiry that contributed no rows to the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedExpiry {
    /// Position in the expiry list
    pub index: usize,
    pub expiry: Expiry,
}

/// Scattered implied volatility samples across expiries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilitySurface {
    symbol: String,
    option_type: OptionType,
    log_scale: bool,
    expiries: Vec<Expiry>,
    expiry_indices: Vec<usize>,
    strikes: Vec<f64>,
    volatilities: Vec<f64>,
    skipped: Vec<SkippedExpiry>,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl VolatilitySurface {
    /// Create an empty surface over an expiry list
    pub fn new(
        symbol: impl Into<String>,
        option_type: OptionType,
        log_scale: bool,
        expiries: Vec<Expiry>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            option_type,
            log_scale,
            expiries,
            expiry_indices: Vec::new(),
            strikes: Vec::new(),
            volatilities: Vec::new(),
            skipped: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Append one expiry's strikes and volatilities, tagged with `expiry_index`.
    pub fn push_slice(&mut self, expiry_index: usize, strikes: &[f64], volatilities: &[f64]) -> Result<()> {
        if strikes.len() != volatilities.len() {
            return Err(SurfaceError::VolatilityError(format!(
                "Strikes and volatilities are misaligned for expiry {}: {} strikes, {} volatilities",
                expiry_index,
                strikes.len(),
                volatilities.len()
            )));
        }
        if expiry_index >= self.expiries.len() {
            return Err(SurfaceError::VolatilityError(format!(
                "Expiry index {} is outside the expiry list of length {}",
                expiry_index,
                self.expiries.len()
            )));
        }

        self.expiry_indices
            .extend(std::iter::repeat(expiry_index).take(strikes.len()));
        self.strikes.extend_from_slice(strikes);
        self.volatilities.extend_from_slice(volatilities);
        Ok(())
    }

    /// Note that the expiry at `index` contributed nothing
    pub fn record_skipped(&mut self, index: usize) {
        if let Some(expiry) = self.expiries.get(index) {
            self.skipped.push(SkippedExpiry {
                index,
                expiry: expiry.clone(),
            });
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    /// Whether the volatilities are natural logs
    pub fn log_scale(&self) -> bool {
        self.log_scale
    }

    /// The expiry list the surface was built over, unchanged
    pub fn expiries(&self) -> &[Expiry] {
        &self.expiries
    }

    pub fn expiry_indices(&self) -> &[usize] {
        &self.expiry_indices
    }

    pub fn strikes(&self) -> &[f64] {
        &self.strikes
    }

    pub fn volatilities(&self) -> &[f64] {
        &self.volatilities
    }

    pub fn skipped(&self) -> &[SkippedExpiry] {
        &self.skipped
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.volatilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volatilities.is_empty()
    }

    /// Samples in append order
    pub fn samples(&self) -> impl Iterator<Item = SurfaceSample> + '_ {
        self.expiry_indices
            .iter()
            .zip(&self.strikes)
            .zip(&self.volatilities)
            .map(|((&expiry_index, &strike), &volatility)| SurfaceSample {
                expiry_index,
                strike,
                volatility,
            })
    }

    /// Samples tagged with one expiry index, in append order
    pub fn slice(&self, expiry_index: usize) -> Vec<SurfaceSample> {
        self.samples()
            .filter(|s| s.expiry_index == expiry_index)
            .collect()
    }

    /// Expiry indices that contributed at least one row, ascending
    pub fn contributing_indices(&self) -> Vec<usize> {
        let mut indices = self.expiry_indices.clone();
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Consume the surface into `(expiry_indices, strikes, volatilities, expiries)`
    pub fn into_parts(self) -> (Vec<usize>, Vec<f64>, Vec<f64>, Vec<Expiry>) {
        (self.expiry_indices, self.strikes, self.volatilities, self.expiries)
    }

    /// One-line description for logs and the viewer
    pub fn summary(&self) -> String {
        format!(
            "{} {}: {} samples across {} of {} expiries ({} skipped){}",
            self.symbol,
            self.option_type,
            self.len(),
            self.contributing_indices().len(),
            self.expiries.len(),
            self.skipped.len(),
            if self.log_scale { ", log IV" } else { "" }
        )
    }
}

/// Natural logarithm of every value.
///
/// Zero, negative and NaN inputs have no logarithm and fail with
/// [`SurfaceError::DomainError`].
pub fn log_transform(values: &[f64]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|&value| {
            if value > 0.0 {
                Ok(value.ln())
            } else {
                Err(SurfaceError::DomainError { value })
            }
        })
        .collect()
}

/// Implied volatilities of the selected table, in row order
pub fn calculate_implied_volatility(
    chain: &OptionChain,
    option_type: OptionType,
    use_log: bool,
) -> Result<Vec<f64>> {
    let volatilities: Vec<f64> = chain
        .table(option_type)
        .iter()
        .map(|row| row.implied_volatility)
        .collect();

    if use_log {
        log_transform(&volatilities)
    } else {
        Ok(volatilities)
    }
}

/// Strikes of the selected table, positionally aligned with
/// [`calculate_implied_volatility`] on the same chain
pub fn extract_strikes(chain: &OptionChain, option_type: OptionType) -> Vec<f64> {
    chain.table(option_type).iter().map(|row| row.strike).collect()
}

/// Fetch every expiry's chain in order and flatten it into a surface.
///
/// Expiries whose selected table is empty are logged and listed in
/// [`VolatilitySurface::skipped`]; their index is simply absent from the
/// output. Provider errors abort the whole build.
pub async fn build_volatility_surface<P: MarketDataProvider>(
    provider: &P,
    symbol: &str,
    expiries: &[Expiry],
    option_type: OptionType,
    use_log: bool,
) -> Result<VolatilitySurface> {
    info!(
        "Building {} volatility surface for {} over {} expiries",
        option_type,
        symbol,
        expiries.len()
    );

    let mut surface = VolatilitySurface::new(symbol, option_type, use_log, expiries.to_vec());

    for (index, expiry) in expiries.iter().enumerate() {
        let chain = provider.option_chain(symbol, expiry).await?;
        let volatilities = calculate_implied_volatility(&chain, option_type, use_log)?;

        if volatilities.is_empty() {
            warn!(%expiry, "No {} data found in option chain", option_type);
            surface.record_skipped(index);
            continue;
        }

        let strikes = extract_strikes(&chain, option_type);
        debug!("Expiry {} ({}): {} rows", index, expiry, strikes.len());
        surface.push_slice(index, &strikes, &volatilities)?;
    }

    info!("{}", surface.summary());
    Ok(surface)
}
