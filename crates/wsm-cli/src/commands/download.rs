//! Download command: build an offline bundle

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::Path;
use wsm_core::Bundle;
use wsm_repo::{ImagePuller, Platform};

use super::{Context, collect_images};
use crate::display;
use crate::error::{CliError, Result};

/// Concurrent image pulls unless overridden
pub const DEFAULT_CONCURRENCY: usize = 4;

pub async fn run(ctx: &Context, output: &Path, platform: &str, concurrency: usize) -> Result<()> {
    let platform: Platform = platform.parse()?;
    let sets = collect_images(ctx).await?;

    let images = bundle_images(&sets.operator, &sets.wandb);
    if images.is_empty() {
        return Err(CliError::bundle("No images to download"));
    }

    let bundle = Bundle::create(output)?;
    let spec_path = bundle.write_spec(&sets.spec)?;
    display::step(format!("Wrote {}", spec_path.display()));

    for chart in [&sets.operator_chart, &sets.app_chart] {
        let file_name = chart
            .file_name()
            .ok_or_else(|| CliError::bundle(format!("invalid chart path {}", chart.display())))?;
        let dest = bundle.charts_dir().join(file_name);
        tokio::fs::copy(chart, &dest).await?;
        display::step(format!("Wrote {}", dest.display()));
    }

    display::step(format!(
        "Pulling {} images for {} ({} at a time)",
        images.len(),
        platform,
        concurrency.max(1)
    ));

    let puller = ImagePuller::new(platform);
    let bar = ProgressBar::new(images.len() as u64);
    if let Ok(template) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        bar.set_style(template);
    }

    let failures: Vec<(String, String)> = stream::iter(images.iter())
        .map(|reference| {
            let dest = bundle.image_archive_path(reference);
            let puller = &puller;
            let bar = &bar;
            async move {
                let result = puller.pull_to(reference, &dest).await;
                bar.inc(1);
                bar.set_message(reference.clone());
                result.map_err(|e| (reference.clone(), e.to_string()))
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|result| async move { result.err() })
        .collect()
        .await;
    bar.finish_and_clear();

    if !failures.is_empty() {
        for (reference, error) in &failures {
            display::warning(format!("{}: {}", reference, error));
        }
        return Err(CliError::Image {
            message: format!("{} of {} images failed to download", failures.len(), images.len()),
        });
    }

    display::success(format!("Bundle written to {}", bundle.root().display()));
    Ok(())
}

/// Operator and application images, deduplicated and sorted
fn bundle_images(operator: &[String], wandb: &[String]) -> Vec<String> {
    operator
        .iter()
        .chain(wandb)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
