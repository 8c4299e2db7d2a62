//! Market data providers
//!
//! [`MarketDataProvider`] is the seam between the surface pipeline and wherever
//! option chains come from. [`YahooClient`] is the network implementation.

mod yahoo;

pub use yahoo::YahooClient;

use crate::error::Result;
use crate::models::{Expiry, OptionChain};

/// Source of expiry lists and option chains
#[allow(async_fn_in_trait)]
pub trait MarketDataProvider {
    /// Expiries listed for `symbol`, in provider order
    async fn expiry_dates(&self, symbol: &str) -> Result<Vec<Expiry>>;

    /// Calls and puts for one expiry of `symbol`
    async fn option_chain(&self, symbol: &str, expiry: &Expiry) -> Result<OptionChain>;
}
