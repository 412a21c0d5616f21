//! wsm - deploy and manage W&B Server on Kubernetes

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use wsm_kube::{DEFAULT_NAMESPACE, DeployOptions, DeployStrategy};
use wsm_repo::{CHANNEL_URL_ENV, DEFAULT_CHANNEL_URL, Endpoints};

mod commands;
mod display;
mod error;
mod exit_codes;

const DEFAULT_PLATFORM: &str = "linux/amd64";

#[derive(Parser)]
#[command(name = "wsm")]
#[command(version)]
#[command(about = "Deploy and manage W&B Server on Kubernetes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Release channel endpoint
    #[arg(long, global = true, env = CHANNEL_URL_ENV, default_value = DEFAULT_CHANNEL_URL)]
    channel_url: String,

    /// License sent to the release channel
    #[arg(long, global = true, env = "WANDB_LICENSE", hide_env_values = true)]
    license: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy W&B Server to the current cluster
    Deploy {
        /// Offline bundle created by `wsm download`
        #[arg(short, long)]
        bundle: Option<PathBuf>,

        /// Application chart archive
        #[arg(short, long)]
        chart: Option<PathBuf>,

        /// Operator chart archive
        #[arg(short, long)]
        operator_chart: Option<PathBuf>,

        /// Values file; top-level `wandb` and `operator` keys split the two
        #[arg(short, long)]
        values: Option<PathBuf>,

        /// Namespace for the operator
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Ship the application chart inside the cluster
        #[arg(short, long)]
        airgapped: bool,

        /// Install the application chart directly, without the operator
        #[arg(long, hide = true)]
        helm: bool,
    },

    /// Download charts and images into an offline bundle
    Download {
        /// Bundle directory
        #[arg(long, default_value = "bundle")]
        output: PathBuf,

        /// Image platform
        #[arg(short, long, default_value = DEFAULT_PLATFORM)]
        platform: String,

        /// Concurrent image pulls
        #[arg(long, default_value_t = commands::download::DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },

    /// List the images a deploy would run
    List {
        /// Image platform
        #[arg(short, long, default_value = DEFAULT_PLATFORM)]
        platform: String,
    },

    /// Move a helm-managed install under the operator
    Migrate {
        /// Namespace of the existing install
        #[arg(short, long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// WeightsAndBiases resource to apply
        #[arg(short, long, default_value = commands::migrate::DEFAULT_RESOURCE_FILE)]
        file: PathBuf,
    },

    /// Open the W&B console through a port-forward
    Console,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let ctx = commands::Context {
        endpoints: Endpoints::default().with_channel_url(cli.channel_url),
        license: cli.license.filter(|l| !l.is_empty()),
    };

    let result = match cli.command {
        Commands::Deploy {
            bundle,
            chart,
            operator_chart,
            values,
            namespace,
            airgapped,
            helm,
        } => {
            let options = DeployOptions {
                namespace,
                airgapped,
                strategy: if helm {
                    DeployStrategy::Helm
                } else {
                    DeployStrategy::Operator
                },
                bundle,
                chart,
                operator_chart,
                values_file: values,
                license: ctx.license.clone(),
                helm_repo_url: ctx.endpoints.helm_repo_url.clone(),
                ..DeployOptions::default()
            };
            commands::deploy::run(&ctx, &options).await
        }

        Commands::Download {
            output,
            platform,
            concurrency,
        } => commands::download::run(&ctx, &output, &platform, concurrency).await,

        Commands::List { platform } => commands::list::run(&ctx, &platform).await,

        Commands::Migrate { namespace, file } => {
            commands::migrate::run(&ctx, &namespace, &file).await
        }

        Commands::Console => commands::console::run().await,
    };

    let code = match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    ExitCode::from(code as u8)
}
