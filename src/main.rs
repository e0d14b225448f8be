use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;

#[derive(Parser)]
#[command(name = "projgen")]
#[command(about = "Generate or extend a project from a plain-language requirement using a local model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Report the files that would be written without touching disk")]
    dry_run: bool,

    #[arg(long, global = true, help = "Print progress events as JSON lines")]
    json: bool,

    #[arg(long, global = true, help = "Settings file (defaults to projgen.yml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Base URL of the inference API")]
    api_url: Option<String>,

    #[arg(long, global = true, help = "Model name")]
    model: Option<String>,

    #[arg(long, global = true, help = "Request timeout in seconds")]
    timeout_secs: Option<u64>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct RequirementArgs {
    #[arg(long, help = "Requirement text")]
    requirement: Option<String>,

    #[arg(long, help = "File containing the requirement")]
    requirement_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create a new project from a requirement")]
    New {
        #[arg(long, help = "Directory the project is created in")]
        root: PathBuf,

        #[command(flatten)]
        requirement: RequirementArgs,
    },

    #[command(about = "Modify an existing project according to a requirement")]
    Update {
        #[arg(long, help = "Root directory of the existing project")]
        root: PathBuf,

        #[command(flatten)]
        requirement: RequirementArgs,
    },

    #[command(about = "Write the file blocks of a saved model response")]
    Extract {
        #[arg(help = "File holding the model response")]
        response_file: PathBuf,

        #[arg(long, help = "Directory the files are written under")]
        root: PathBuf,
    },

    #[command(about = "Print the effective inference settings")]
    Settings,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "projgen=debug" } else { "projgen=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
        json: cli.json,
    };
    let overrides = cli::SettingsOverrides {
        api_url: cli.api_url,
        model: cli.model,
        timeout_secs: cli.timeout_secs,
    };

    match cli.command {
        Commands::New { root, requirement } => {
            let settings = cli::resolve_settings(cli.config, overrides)?;
            let requirement =
                cli::load_requirement(requirement.requirement, requirement.requirement_file)?;
            cli::create_project(root, requirement, settings, &config).await?;
        }
        Commands::Update { root, requirement } => {
            let settings = cli::resolve_settings(cli.config, overrides)?;
            let requirement =
                cli::load_requirement(requirement.requirement, requirement.requirement_file)?;
            cli::update_project(root, requirement, settings, &config).await?;
        }
        Commands::Extract {
            response_file,
            root,
        } => {
            cli::extract_response(&response_file, &root, &config)?;
        }
        Commands::Settings => {
            let settings = cli::resolve_settings(cli.config, overrides)?;
            cli::show_settings(&settings, &config)?;
        }
    }

    Ok(())
}
