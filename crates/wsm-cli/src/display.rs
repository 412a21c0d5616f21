//! Terminal output helpers

use console::style;
use wsm_kube::{DeployReport, DeployStrategy};

pub fn step(message: impl std::fmt::Display) {
    println!("{} {}", style("→").blue().bold(), message);
}

pub fn success(message: impl std::fmt::Display) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn warning(message: impl std::fmt::Display) {
    eprintln!("{} {}", style("⚠").yellow(), message);
}

/// Print a titled, already sorted set of image references
pub fn image_set(title: &str, images: &[String]) {
    println!("{} ({})", style(title).cyan().bold(), images.len());
    for image in images {
        println!("  {}", image);
    }
}

pub fn deploy_report(report: &DeployReport) {
    match report.strategy {
        DeployStrategy::Helm => {
            success("W&B installed with helm");
        }
        DeployStrategy::Operator => {
            if let Some(staged) = &report.staged_chart {
                println!(
                    "  chart staged in ConfigMap {} ({})",
                    style(&staged.config_map).cyan(),
                    style(&staged.in_cluster_path).dim()
                );
            }
            if let (Some(name), Some(version)) = (&report.chart.name, &report.chart.version) {
                println!("  chart {} {}", style(name).cyan(), style(version).yellow());
            }
            success("WeightsAndBiases resource applied; the operator takes it from here");
        }
    }
}
