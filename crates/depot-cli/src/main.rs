use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use depot_core::{ArgumentError, PackageVersion};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod flows;
mod render;

use flows::{
    run_doctor_command, run_install_command, run_list_command, run_repo_command,
    run_uninstall_command, CommandOutcome, DeployContext,
};
use render::{current_output_style, eprint_status};

pub(crate) const LOG_ENV_VAR: &str = "DEPOT_LOG";
const VERBOSE_DIRECTIVES: &[&str] = &[
    "depot=debug",
    "depot_core=debug",
    "depot_registry=debug",
    "depot_installer=debug",
];

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(about = "Versioned package deployment tool", long_about = None)]
struct Cli {
    /// Root directory for packages, state and cache.
    #[arg(long, global = true)]
    prefix: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Install(InstallArgs),
    Uninstall {
        id: String,
        #[arg(long, value_parser = parse_version_arg)]
        version: Option<PackageVersion>,
    },
    List {
        #[arg(long)]
        json: bool,
    },
    #[command(subcommand)]
    Repo(RepoCommands),
    Doctor,
    Completions {
        shell: Shell,
    },
}

#[derive(Args, Debug)]
struct InstallArgs {
    id: String,
    /// full, update or side-by-side.
    #[arg(long, default_value = "full")]
    deployment_type: String,
    #[arg(long)]
    force: bool,
    #[arg(long = "system-profile")]
    system_profiles: Vec<String>,
    #[arg(long = "build-profile")]
    build_profiles: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum RepoCommands {
    Add {
        name: String,
        url: String,
        #[arg(long, default_value_t = 0)]
        priority: u32,
    },
    List,
    Remove {
        name: String,
    },
    Enable {
        name: String,
    },
    Disable {
        name: String,
    },
}

fn parse_version_arg(value: &str) -> std::result::Result<PackageVersion, String> {
    PackageVersion::parse(value).map_err(|err| format!("{err:#}"))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let style = current_output_style();
    match run_cli(cli) {
        Ok(CommandOutcome::Completed) => {}
        Ok(CommandOutcome::Failed) => std::process::exit(1),
        Err(err) => {
            eprint_status(style, "error", &format!("{err:#}"));
            std::process::exit(exit_code_for_error(&err));
        }
    }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::registry()
        .with(build_env_filter(
            std::env::var(LOG_ENV_VAR).ok().as_deref(),
            verbose,
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub(crate) fn build_env_filter(configured: Option<&str>, verbose: bool) -> EnvFilter {
    let mut filter = configured
        .filter(|value| !value.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    if verbose {
        for directive in VERBOSE_DIRECTIVES {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

pub(crate) fn exit_code_for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ArgumentError>().is_some() {
        2
    } else {
        1
    }
}

fn run_cli(cli: Cli) -> Result<CommandOutcome> {
    let style = current_output_style();

    match cli.command {
        Commands::Install(args) => {
            run_install_command(&DeployContext::open(cli.prefix)?, args, style)
        }
        Commands::Uninstall { id, version } => run_uninstall_command(
            &DeployContext::open(cli.prefix)?,
            &id,
            version.as_ref(),
            style,
        ),
        Commands::List { json } => run_list_command(&DeployContext::open(cli.prefix)?, json),
        Commands::Repo(repo) => run_repo_command(&DeployContext::open(cli.prefix)?, repo, style),
        Commands::Doctor => run_doctor_command(&DeployContext::open(cli.prefix)?),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "depot", &mut std::io::stdout());
            Ok(CommandOutcome::Completed)
        }
    }
}
