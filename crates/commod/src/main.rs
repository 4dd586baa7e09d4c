use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    check_compatibility, install_mod, list_mods, plan_install, probe_game, validate_manifest,
    CheckArgs, InstallArgs, ModsArgs, PlanArgs, ProbeArgs, ValidateArgs,
};
use miette::Result;
use tracing_subscriber::EnvFilter;

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify a game copy and list its installed content
    Probe {
        /// Game directory; defaults to the configured one
        #[arg(short, long)]
        game: Option<String>,
    },
    /// Validate a mod manifest or a zipped mod
    Validate {
        /// Path to manifest.yaml or to a .zip archive
        #[arg(short, long)]
        manifest: String,

        /// Don't require the payload folders to exist
        #[arg(long)]
        skip_data: bool,
    },
    /// Check whether a mod can be installed onto a game copy
    Check {
        #[arg(short, long)]
        manifest: String,

        #[arg(short, long)]
        game: Option<String>,
    },
    /// Show what an install would copy
    Plan {
        #[arg(short, long)]
        manifest: String,

        /// Install every option with its default choice
        #[arg(long)]
        full: bool,

        /// Option choice as name=value (yes, skip or a setting name)
        #[arg(short, long = "option")]
        options: Vec<String>,
    },
    /// Install a mod onto a game copy
    Install {
        #[arg(short, long)]
        manifest: String,

        #[arg(short, long)]
        game: Option<String>,

        #[arg(long)]
        full: bool,

        #[arg(short, long = "option")]
        options: Vec<String>,
    },
    /// List the mods of a distribution folder
    Mods {
        /// Distribution folder; defaults to the configured one
        #[arg(short, long)]
        distribution: Option<String>,
    },
    /// Manage the commod configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Set the default game directory
    SetGame { path: String },
    /// Set the default distribution folder
    SetDistribution { path: String },
    /// Reset the configuration to defaults
    Reset,
}

fn parse_args() -> Args {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "commod=debug,commod_lib=debug,commod_manifest=debug,commod_game=debug"
    } else {
        "commod=info,commod_lib=info,commod_manifest=warn,commod_game=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = parse_args();
    init_logging(args.verbose);

    match args.command {
        Commands::Probe { game } => probe_game(ProbeArgs { game }),
        Commands::Validate {
            manifest,
            skip_data,
        } => validate_manifest(ValidateArgs {
            manifest,
            skip_data,
        }),
        Commands::Check { manifest, game } => check_compatibility(CheckArgs { manifest, game }),
        Commands::Plan {
            manifest,
            full,
            options,
        } => plan_install(PlanArgs {
            manifest,
            full,
            options,
        }),
        Commands::Install {
            manifest,
            game,
            full,
            options,
        } => install_mod(InstallArgs {
            manifest,
            game,
            full,
            options,
        }),
        Commands::Mods { distribution } => list_mods(ModsArgs { distribution }),
        Commands::Config { command } => match command {
            ConfigCommands::Show => commands::show_config(),
            ConfigCommands::SetGame { path } => commands::set_game_path(path),
            ConfigCommands::SetDistribution { path } => commands::set_distribution_dir(path),
            ConfigCommands::Reset => commands::reset_config(),
        },
    }
}
