//! wsm core - data model for the W&B server manager
//!
//! This crate provides the types every other wsm crate builds on:
//! - `Values`: configuration tree with deep merge support
//! - `Spec` / `ChartRef`: chart source plus values
//! - `Bundle`: the on-disk layout used for airgapped installs
//! - `ChartArchive`: chart metadata read from a `.tgz`
//! - `normalize_image`: `wandb/*` image tag normalization

pub mod archive;
pub mod bundle;
pub mod error;
pub mod images;
pub mod spec;
pub mod values;

pub use archive::{ChartArchive, ChartMetadata};
pub use bundle::Bundle;
pub use error::{CoreError, Result};
pub use images::{normalize_image, normalize_images};
pub use spec::{ChartRef, Spec};
pub use values::{ConflictPolicy, LocalValues, Values};
