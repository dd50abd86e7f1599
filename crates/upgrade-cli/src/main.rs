mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{Backend, Settings};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "upgrade-hook",
    about = "Run package upgrade actions once per content change, phase by phase",
    version,
    propagate_version = true
)]
struct Cli {
    /// Package directory (default: auto-detect from package.yaml)
    #[arg(long, global = true, env = "UPGRADE_HOOK_PACKAGE")]
    package: Option<PathBuf>,

    /// Status store directory (default: <package>/.upgrade-status)
    #[arg(long, global = true, env = "UPGRADE_HOOK_STORE")]
    store: Option<PathBuf>,

    /// Status store backend
    #[arg(long, global = true, value_enum, default_value_t = Backend::File)]
    backend: Backend,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full install attempt: PREPARE, INSTALLED, END
    #[command(disable_version_flag = true)]
    Install {
        /// Active runmode (repeatable or comma separated)
        #[arg(long = "runmode", env = "UPGRADE_HOOK_RUNMODES", value_delimiter = ',')]
        runmodes: Vec<String>,

        /// Version to record (default: the package version)
        #[arg(long)]
        version: Option<String>,
    },

    /// Show which actions would run or be skipped, without running anything
    Plan {
        /// Active runmode (repeatable or comma separated)
        #[arg(long = "runmode", env = "UPGRADE_HOOK_RUNMODES", value_delimiter = ',')]
        runmodes: Vec<String>,
    },

    /// List upgrade groups with their configuration and actions
    List,

    /// Show the recorded status of the package
    Status,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Install { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let package = root::resolve_package(cli.package.as_deref());
    let settings = Settings {
        package,
        store: cli.store,
        backend: cli.backend,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Install { runmodes, version } => {
            cmd::install::run(&settings, runmodes, version.as_deref())
        }
        Commands::Plan { runmodes } => cmd::plan::run(&settings, runmodes),
        Commands::List => cmd::list::run(&settings),
        Commands::Status => cmd::status::run(&settings),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
