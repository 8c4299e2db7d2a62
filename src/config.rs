use crate::error::{Result, SurfaceError};
use crate::models::OptionType;
use dotenv::dotenv;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SYMBOL: &str = "WBD";
pub const DEFAULT_SAVE_PATH: &str = "volatility_surface.png";
pub const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Configuration for the Yahoo Finance client
#[derive(Debug, Clone, Deserialize)]
pub struct YahooConfig {
    /// Base URL of the options API
    pub base_url: String,
    /// Per-request timeout; `None` leaves the client default in place
    pub timeout: Option<Duration>,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

/// What to build and how to show it
#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceConfig {
    /// Underlying ticker symbol
    pub symbol: String,
    /// Calls or puts
    pub option_type: OptionType,
    /// Natural-log transform the implied volatilities
    pub use_log: bool,
    /// Where to write the figure, if anywhere
    pub save_path: Option<PathBuf>,
    /// Open the interactive window after rendering
    pub show: bool,
    /// Interpolate onto a regular grid with this many strikes before meshing
    pub grid_strikes: Option<usize>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            option_type: OptionType::Call,
            use_log: true,
            save_path: Some(PathBuf::from(DEFAULT_SAVE_PATH)),
            show: true,
            grid_strikes: None,
        }
    }
}

/// Configuration for the application
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Surface pipeline settings
    pub surface: SurfaceConfig,
    /// Data provider settings
    pub yahoo: YahooConfig,
    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SurfaceConfig::default();

        let symbol = lookup("VOLSURF_SYMBOL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.symbol);

        let option_type = match lookup("VOLSURF_OPTION_TYPE") {
            Some(raw) => raw.parse::<OptionType>()?,
            None => defaults.option_type,
        };

        let use_log = match lookup("VOLSURF_USE_LOG") {
            Some(raw) => parse_bool("VOLSURF_USE_LOG", &raw)?,
            None => defaults.use_log,
        };

        // An explicitly empty path turns saving off
        let save_path = match lookup("VOLSURF_SAVE_PATH") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(PathBuf::from(raw.trim())),
            None => defaults.save_path,
        };

        let show = match lookup("VOLSURF_SHOW") {
            Some(raw) => parse_bool("VOLSURF_SHOW", &raw)?,
            None => defaults.show,
        };

        let grid_strikes = lookup("VOLSURF_GRID_STRIKES")
            .map(|raw| parse_number::<usize>("VOLSURF_GRID_STRIKES", &raw))
            .transpose()?;

        let base_url = lookup("VOLSURF_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout = lookup("VOLSURF_HTTP_TIMEOUT_SECS")
            .map(|raw| parse_number::<u64>("VOLSURF_HTTP_TIMEOUT_SECS", &raw))
            .transpose()?
            .map(Duration::from_secs);

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Config {
            surface: SurfaceConfig {
                symbol,
                option_type,
                use_log,
                save_path,
                show,
                grid_strikes,
            },
            yahoo: YahooConfig { base_url, timeout },
            log_level,
        })
    }

    /// Override the ticker with the first positional command-line argument, if any
    pub fn with_args<I: IntoIterator<Item = String>>(mut self, args: I) -> Self {
        if let Some(symbol) = args.into_iter().nth(1).filter(|s| !s.trim().is_empty()) {
            self.surface.symbol = symbol.trim().to_string();
        }
        self
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> Result<()> {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| SurfaceError::ConfigError(format!("Failed to initialise logging: {}", e)))?;

        Ok(())
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(SurfaceError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        SurfaceError::ConfigError(format!("{} must be a non-negative integer, got '{}'", key, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_stock_run() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.surface.symbol, "WBD");
        assert_eq!(config.surface.option_type, OptionType::Call);
        assert!(config.surface.use_log);
        assert_eq!(
            config.surface.save_path,
            Some(PathBuf::from("volatility_surface.png"))
        );
        assert!(config.surface.show);
        assert_eq!(config.surface.grid_strikes, None);
        assert_eq!(config.yahoo.base_url, DEFAULT_BASE_URL);
        assert!(config.yahoo.timeout.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn reads_every_variable() {
        let config = config_from(&[
            ("VOLSURF_SYMBOL", " aapl "),
            ("VOLSURF_OPTION_TYPE", "Puts"),
            ("VOLSURF_USE_LOG", "no"),
            ("VOLSURF_SAVE_PATH", "out/surface.svg"),
            ("VOLSURF_SHOW", "0"),
            ("VOLSURF_GRID_STRIKES", "40"),
            ("VOLSURF_BASE_URL", "http://localhost:8080/"),
            ("VOLSURF_HTTP_TIMEOUT_SECS", "15"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();

        assert_eq!(config.surface.symbol, "aapl");
        assert_eq!(config.surface.option_type, OptionType::Put);
        assert!(!config.surface.use_log);
        assert_eq!(config.surface.save_path, Some(PathBuf::from("out/surface.svg")));
        assert!(!config.surface.show);
        assert_eq!(config.surface.grid_strikes, Some(40));
        assert_eq!(config.yahoo.base_url, "http://localhost:8080");
        assert_eq!(config.yahoo.timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn empty_save_path_disables_saving() {
        let config = config_from(&[("VOLSURF_SAVE_PATH", "")]).unwrap();
        assert!(config.surface.save_path.is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config_from(&[("VOLSURF_OPTION_TYPE", "straddles")]),
            Err(SurfaceError::ConfigError(_))
        ));
        assert!(matches!(
            config_from(&[("VOLSURF_USE_LOG", "maybe")]),
            Err(SurfaceError::ConfigError(_))
        ));
        assert!(matches!(
            config_from(&[("VOLSURF_GRID_STRIKES", "-3")]),
            Err(SurfaceError::ConfigError(_))
        ));
    }

    #[test]
    fn first_positional_argument_overrides_symbol() {
        let config = config_from(&[("VOLSURF_SYMBOL", "SPY")])
            .unwrap()
            .with_args(vec!["iv-surface".to_string(), "QQQ".to_string()]);
        assert_eq!(config.surface.symbol, "QQQ");

        let untouched = config_from(&[("VOLSURF_SYMBOL", "SPY")])
            .unwrap()
            .with_args(vec!["iv-surface".to_string()]);
        assert_eq!(untouched.surface.symbol, "SPY");
    }
}
