//! Terminal progress for deploys

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::orchestrator::{DeployStage, StageObserver};

/// Spinner that prints one line per stage and clears itself when the
/// deploy ends
pub struct DeploySpinner {
    bar: ProgressBar,
}

impl DeploySpinner {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(template);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Spinner that draws nothing, for non-interactive output
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }
}

impl Default for DeploySpinner {
    fn default() -> Self {
        Self::new()
    }
}

impl StageObserver for DeploySpinner {
    fn on_stage(&self, stage: DeployStage) {
        match stage {
            DeployStage::Done => {
                self.bar.finish_and_clear();
                self.bar
                    .println(format!("{} Deploy complete", style("✓").green().bold()));
            }
            DeployStage::Failed => {
                self.bar.finish_and_clear();
            }
            stage => {
                self.bar
                    .println(format!("{} {}", style("→").cyan(), capitalize(&stage.to_string())));
                self.bar.set_message(format!("{stage}..."));
            }
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
