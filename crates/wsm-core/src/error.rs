//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Bundle not found: {path}")]
    BundleNotFound { path: PathBuf },

    #[error("Failed to parse spec from {origin}: {message}")]
    SpecParse { origin: String, message: String },

    #[error("No chart matching '{chart}' found in {dir}")]
    ChartNotFoundInBundle { chart: String, dir: PathBuf },

    #[error("Values type conflict at '{path}': a mapping cannot be merged with a scalar")]
    TypeConflict { path: String },

    #[error("Expected a mapping at '{path}', found {found}")]
    NotAMapping { path: String, found: &'static str },

    #[error("Invalid values path '{path}'")]
    InvalidPath { path: String },

    #[error("Values file not found: {path}")]
    ValuesFileNotFound { path: PathBuf },

    #[error("Invalid chart archive {path}: {message}")]
    InvalidChart { path: PathBuf, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid chart pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
