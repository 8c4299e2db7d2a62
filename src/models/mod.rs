//! Data models for option chains and volatility surfaces
//!
//! This module contains the option chain snapshot types, the scattered
//! volatility surface assembled from them, and its regular-grid counterpart.

mod grid;
mod option;
mod volatility;

pub use grid::*;
pub use option::*;
pub use volatility::*;
