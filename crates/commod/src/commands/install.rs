use crate::commands::plan::print_plan;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{load_manifest, resolve_game_path, settings_from_args};
use camino::Utf8PathBuf;
use colored::Colorize;
use commod_lib::settings::{available_choices, needs_custom_install};
use commod_lib::{
    assess_reinstall, Choice, CopyProgress, GameCopy, InstallSettings, Installer, ModManifest,
};
use commod_manifest::OptionalContent;
use inquire::{Confirm, Select};

pub struct InstallArgs {
    pub manifest: String,
    pub game: Option<String>,
    pub full: bool,
    pub options: Vec<String>,
}

fn choice_label(option: &OptionalContent, choice: &Choice) -> String {
    match choice {
        Choice::Yes => "Install".to_string(),
        Choice::Skip => "Skip".to_string(),
        Choice::Setting(name) => option
            .setting(name)
            .map(|setting| format!("{} - {}", setting.name, setting.description))
            .unwrap_or_else(|| name.clone()),
    }
}

fn prompt_option(option: &OptionalContent) -> Result<Choice, CliError> {
    let choices = available_choices(option);
    let labels: Vec<String> = choices
        .iter()
        .map(|choice| choice_label(option, choice))
        .collect();

    let default = option
        .default_option
        .as_ref()
        .and_then(|name| {
            choices
                .iter()
                .position(|choice| matches!(choice, Choice::Setting(s) if s == name))
        })
        .unwrap_or(0);

    let message = format!("{}: {}", option.display_name, option.description);
    let picked = Select::new(&message, labels)
        .with_starting_cursor(default)
        .raw_prompt()?;

    Ok(choices[picked.index].clone())
}

/// Asks the user for every option, unless defaults are acceptable.
fn prompt_settings(manifest: &ModManifest) -> Result<InstallSettings, CliError> {
    if manifest.optional_content.is_empty() {
        return Ok(InstallSettings::full(manifest));
    }

    if !needs_custom_install(manifest) {
        let use_defaults = Confirm::new("Install with all options and their default settings?")
            .with_default(true)
            .prompt()?;
        if use_defaults {
            return Ok(InstallSettings::full(manifest));
        }
    }

    let mut settings = InstallSettings::new(Choice::Yes);
    for option in &manifest.optional_content {
        let choice = prompt_option(option)?;
        settings.options.insert(option.name.clone(), choice);
    }
    Ok(settings)
}

pub fn install_mod(args: InstallArgs) -> miette::Result<()> {
    let root = resolve_game_path(args.game)?;
    let mut game = GameCopy::probe(&root).map_err(CliError::from)?;
    let manifest = load_manifest(&Utf8PathBuf::from(&args.manifest), true)?;

    println_pad!(
        "{} {} {} {}",
        "📦 Installing".bright_blue().bold(),
        manifest.display_name.bright_cyan().bold(),
        "onto".bright_blue(),
        game.display_name().bright_white()
    );

    let locked = assess_reinstall(&manifest, &game.installed).and_then(|reinstall| {
        if let Some(warning) = &reinstall.warning {
            println_pad!("{} {}", "⚠".bright_yellow(), warning.bright_yellow());
        }
        reinstall.locked_settings
    });

    let settings = match locked {
        Some(settings) => settings,
        None if args.full || !args.options.is_empty() => {
            settings_from_args(&manifest, args.full, &args.options)?
        }
        None => prompt_settings(&manifest)?,
    };

    let installer = Installer::default()
        .with_progress(|progress: CopyProgress<'_>| {
            tracing::debug!(
                "[{}/{}] {} ({} bytes)",
                progress.current,
                progress.total,
                progress.name,
                progress.size
            );
        })
        .with_status(|status: &str| {
            println_pad!("{}", status.bright_white().dimmed());
        });

    let outcome = installer
        .install(&mut game, &manifest, &settings)
        .map_err(CliError::from)?;

    for line in &outcome.descriptions {
        println_pad!("{}", line.bright_white());
    }
    print_plan(&outcome.plan);
    for change in &outcome.patch_changes {
        println_pad!("   {} {}", "🔧".bright_cyan(), change.bright_white());
    }
    for warning in &outcome.warnings {
        println_pad!("{} {}", "⚠".bright_yellow(), warning.bright_yellow());
    }

    println_pad!(
        "\n{} {}",
        "✅ Installed successfully!".bright_green().bold(),
        format!("({} files, {} bytes)", outcome.copied.files, outcome.copied.bytes).dimmed()
    );

    Ok(())
}
