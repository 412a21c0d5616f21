//! List command

use console::style;
use wsm_repo::Platform;

use super::{Context, collect_images};
use crate::display;
use crate::error::Result;

pub async fn run(ctx: &Context, platform: &str) -> Result<()> {
    let platform: Platform = platform.parse()?;
    let sets = collect_images(ctx).await?;

    println!("Images for {}\n", style(&platform).bold());
    display::image_set("Operator", &sets.operator);
    println!();
    display::image_set("W&B", &sets.wandb);
    Ok(())
}
