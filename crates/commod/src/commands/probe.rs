use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{config, resolve_game_path};
use colored::Colorize;
use commod_lib::{GameCopy, ModCatalog, ModManifest};

pub struct ProbeArgs {
    pub game: Option<String>,
}

/// Manifests of the configured distribution, used for nicer names.
pub(crate) fn known_manifests() -> Vec<ModManifest> {
    let Some(distribution) = config::load_config().distribution_dir else {
        return Vec::new();
    };

    let mut catalog = ModCatalog::new(distribution);
    match catalog.refresh() {
        Ok(_) => catalog.manifests().cloned().collect(),
        Err(e) => {
            tracing::debug!("Distribution not loaded: {}", e);
            Vec::new()
        }
    }
}

pub fn probe_game(args: ProbeArgs) -> miette::Result<()> {
    let root = resolve_game_path(args.game)?;
    let game = GameCopy::probe(&root).map_err(CliError::from)?;

    println_pad!(
        "{} {}",
        "🎮 Game copy:".bright_blue().bold(),
        game.root.as_str().bright_cyan().bold()
    );
    println_pad!(
        "{} {}",
        "⚙️  Executable:".bright_green(),
        game.exe_path.as_str().bright_white()
    );
    println_pad!(
        "{} {}",
        "🏷️ Version:".bright_green(),
        game.exe_version.to_string().bright_white().bold()
    );
    println_pad!(
        "{} {}",
        "🗺️  Installment:".bright_green(),
        game.installment.as_str().bright_white()
    );
    println_pad!(
        "{} {}",
        "🔧 Patched:".bright_green(),
        if game.patched { "yes".bright_white() } else { "no".dimmed() }
    );

    if game.installed.is_empty() {
        println_pad!("\n{}", "No content installed".dimmed());
        return Ok(());
    }

    println_pad!("\n{}", "📦 Installed content:".bright_magenta().bold());
    for description in game.installed_descriptions(&known_manifests()).values() {
        let mut lines = description.lines();
        if let Some(first) = lines.next() {
            println_pad!("   {} {}", "•".bright_cyan(), first.bright_white().bold());
        }
        for line in lines {
            println_pad!("     {}", line.dimmed());
        }
    }

    Ok(())
}
