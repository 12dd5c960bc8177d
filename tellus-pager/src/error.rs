use thiserror::Error;

/// Network/transport failure while fetching a tile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("fetch timed out")]
    TimedOut,
    #[error("fetch cancelled")]
    Cancelled,
}

/// Malformed payload handed to the decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Invalid tile database configuration, surfaced at setup and fatal to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no source url templates configured")]
    NoTemplates,
    #[error("minzoom {minzoom} exceeds maxzoom {maxzoom}")]
    ZoomRange { minzoom: u32, maxzoom: u32 },
    #[error("maxzoom {maxzoom} exceeds the supported depth {limit}")]
    ZoomTooDeep { maxzoom: u32, limit: u32 },
    #[error("bounds rectangle has non-positive area")]
    EmptyBounds,
    #[error("tile size must be non-zero")]
    ZeroTileSize,
    #[error("invalid configuration json: {0}")]
    Json(String),
    #[error("pager requires at least one content stream")]
    NoStreams,
    #[error("worker runtime setup failed: {0}")]
    Runtime(String),
}

/// Terminal error for one fetch+decode task.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("load task panicked")]
    Panicked,
}
