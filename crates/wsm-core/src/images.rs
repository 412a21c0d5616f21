//! Container image reference normalization
//!
//! Images published under the `wandb/` namespace are reduced to a plain
//! `major.minor.patch` tag so that daily and build-tagged references collapse
//! onto the release they were cut from.

use std::collections::BTreeSet;

use semver::Version;

/// Namespace whose tags get normalized
pub const WANDB_IMAGE_PREFIX: &str = "wandb/";

/// Normalize a single image reference
///
/// `wandb/server:0.9.1-daily.123` and `wandb/server:v0.9.1` both become
/// `wandb/server:0.9.1`. References outside `wandb/`, references without
/// exactly one `:`, and tags that are not a semantic version (optionally
/// `v`-prefixed) are returned unchanged.
#[must_use]
pub fn normalize_image(image: &str) -> String {
    if !image.starts_with(WANDB_IMAGE_PREFIX) {
        return image.to_string();
    }

    let mut parts = image.split(':');
    let (Some(repo), Some(tag), None) = (parts.next(), parts.next(), parts.next()) else {
        return image.to_string();
    };

    let unprefixed = tag.strip_prefix('v').unwrap_or(tag);
    let base = match unprefixed.find(['-', '+']) {
        Some(idx) if idx > 0 => &unprefixed[..idx],
        _ => unprefixed,
    };

    match Version::parse(base) {
        Ok(v) => format!("{}:{}.{}.{}", repo, v.major, v.minor, v.patch),
        Err(_) => image.to_string(),
    }
}

/// Normalize, deduplicate and sort a batch of references
#[must_use]
pub fn normalize_images<I, S>(images: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    images
        .into_iter()
        .map(|image| normalize_image(image.as_ref()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
