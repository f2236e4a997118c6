use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("invalid bounding box {bbox:?}: {reason}")]
    InvalidExtent { bbox: [f64; 4], reason: &'static str },
}

#[derive(Debug, Error)]
pub enum LayerError {
    #[error("image {image_id}: {source}")]
    InvalidExtent {
        image_id: String,
        #[source]
        source: GeometryError,
    },

    #[error("imagery adapter rejected image {image_id}: {source}")]
    Adapter {
        image_id: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("failed to decode catalog: {0}")]
    Decode(#[from] simd_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown unit system {0:?} (expected \"metric\" or \"imperial\")")]
    InvalidUnits(String),
}
