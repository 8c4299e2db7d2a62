use thiserror::Error;

/// Error types for the iv-surface library
#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Cannot take the logarithm of non-positive implied volatility {value}")]
    DomainError { value: f64 },

    #[error("Volatility calculation error: {0}")]
    VolatilityError(String),

    #[error("Volatility surface has no samples to plot")]
    EmptySurface,

    #[error("Plotting error: {0}")]
    PlotError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("GUI error: {0}")]
    GuiError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
