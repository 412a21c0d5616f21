//! Deploy command

use wsm_kube::{DeployOptions, DeploySpinner, HelmCli, KubeCluster, Orchestrator};

use super::Context;
use crate::display;
use crate::error::Result;

pub async fn run(ctx: &Context, options: &DeployOptions) -> Result<()> {
    let channel = ctx.channel()?;
    let charts = ctx.chart_repository()?;
    let helm = HelmCli::from_env();
    let cluster = KubeCluster::new();
    let spinner = DeploySpinner::new();

    display::step(format!("Deploying W&B to namespace {}", options.namespace));

    let report = Orchestrator::new(&channel, &charts, &helm, &cluster)
        .with_observer(&spinner)
        .deploy(options)
        .await?;

    display::deploy_report(&report);
    Ok(())
}
