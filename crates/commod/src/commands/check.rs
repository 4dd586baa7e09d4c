use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{load_manifest, resolve_game_path};
use camino::Utf8PathBuf;
use colored::Colorize;
use commod_lib::{assess_reinstall, check_requirements, GameCopy, RequirementStatus, PATCHER_VERSION};

pub struct CheckArgs {
    pub manifest: String,
    pub game: Option<String>,
}

fn print_status(kind: &str, status: &RequirementStatus) {
    let mark = if status.ok {
        "✓".bright_green()
    } else {
        "✗".bright_red()
    };
    println_pad!(
        "   {} {} {}",
        mark,
        format!("{kind}:").bright_white(),
        status.requirement.name.bright_cyan().bold()
    );
    for message in &status.messages {
        println_pad!("       {}", message.bright_yellow());
    }
}

pub fn check_compatibility(args: CheckArgs) -> miette::Result<()> {
    let root = resolve_game_path(args.game)?;
    let game = GameCopy::probe(&root).map_err(CliError::from)?;
    let manifest = load_manifest(&Utf8PathBuf::from(&args.manifest), true)?;

    println_pad!(
        "{} {} {} {}",
        "🔗 Checking".bright_blue().bold(),
        manifest.display_name.bright_cyan().bold(),
        "against".bright_blue(),
        game.display_name().bright_white()
    );

    let mut ok = true;
    if !manifest.compatible_with_installment(game.installment.as_str()) {
        ok = false;
        println_pad!(
            "   {} made for '{}', game copy is '{}'",
            "✗".bright_red(),
            manifest.installment,
            game.installment
        );
    }
    if !manifest.compatible_with_patcher(PATCHER_VERSION) {
        ok = false;
        println_pad!(
            "   {} needs patcher version {}, this is {}",
            "✗".bright_red(),
            manifest.patcher_version_requirement,
            PATCHER_VERSION
        );
    }

    let report = check_requirements(&manifest, &game.installed);
    for status in &report.requirements {
        print_status("requires", status);
    }
    for status in &report.incompatibilities {
        print_status("incompatible with", status);
    }

    if let Some(reinstall) = assess_reinstall(&manifest, &game.installed) {
        println_pad!(
            "\n{} {}",
            "ℹ Already installed, version".bright_yellow(),
            reinstall.previous.version.bright_white()
        );
        if let Some(warning) = &reinstall.warning {
            println_pad!("   {}", warning.bright_yellow());
        }
        ok &= reinstall.can_reinstall;
    }

    if ok && report.ok {
        println_pad!("\n{}", "✅ Mod can be installed".bright_green().bold());
        Ok(())
    } else {
        Err(CliError::RequirementsNotMet {
            name: manifest.name,
        }
        .into())
    }
}
