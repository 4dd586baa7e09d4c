use crate::errors::CliError;
use crate::println_pad;
use crate::utils::config;
use camino::Utf8PathBuf;
use colored::Colorize;
use commod_lib::ModCatalog;

pub struct ModsArgs {
    pub distribution: Option<String>,
}

pub fn list_mods(args: ModsArgs) -> miette::Result<()> {
    let distribution = args
        .distribution
        .map(Utf8PathBuf::from)
        .or_else(|| config::load_config().distribution_dir)
        .ok_or(CliError::DistributionNotSet)?;

    let mut catalog = ModCatalog::new(distribution);
    let summary = catalog.refresh().map_err(CliError::from)?;

    println_pad!(
        "{} {} {}",
        "📚 Mods in".bright_blue().bold(),
        catalog.mods_dir().as_str().bright_cyan().bold(),
        format!("({} loaded, {} failed)", summary.loaded, summary.failed).dimmed()
    );

    for entry in catalog.entries() {
        let manifest = &entry.manifest;
        let packed = if manifest.archive.is_some() {
            " [packed]".bright_yellow()
        } else {
            "".normal()
        };
        println_pad!(
            "   {} {} {}{}",
            "•".bright_cyan(),
            manifest.display_name.bright_white().bold(),
            format!("{} {}", manifest.name, manifest.version).dimmed(),
            packed
        );
    }

    let errors = catalog.errors();
    if !errors.is_empty() {
        println_pad!("\n{}", "✗ Failed to load:".bright_red().bold());
        for error in errors {
            println_pad!("   {} {}", error.path.as_str().bright_white(), error.message.dimmed());
        }
    }

    Ok(())
}
