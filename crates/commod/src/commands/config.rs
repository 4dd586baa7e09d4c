use crate::utils::config::{self, AppConfig};
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use commod_game::{is_valid_game_dir, validate_game_dir};
use miette::Result;

/// Print a config path entry with status indicator
fn print_path_config(name: &str, path: Option<&Utf8PathBuf>, validator: impl Fn(&Utf8Path) -> bool) {
    match path {
        Some(p) => {
            let status = if validator(p.as_path()) {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", format!("{}:", name).bright_white(), p, status);
        }
        None => {
            println!(
                "  {} {}",
                format!("{}:", name).bright_white(),
                "(not set)".bright_yellow()
            );
        }
    }
}

fn update_config(update: impl FnOnce(&mut AppConfig)) -> Result<()> {
    let mut cfg = config::load_config();
    update(&mut cfg);
    config::save_config(&cfg).map_err(|e| miette::miette!("Failed to save config: {}", e))
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);
    print_path_config("game_path", cfg.game_path.as_ref(), is_valid_game_dir);
    print_path_config("distribution_dir", cfg.distribution_dir.as_ref(), |p| {
        p.join("mods").is_dir()
    });
    println!();
    Ok(())
}

pub fn set_game_path(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(path);
    if let Err(e) = validate_game_dir(&path) {
        eprintln!(
            "  {}",
            "The path must point to the game folder containing hta.exe and data/.".bright_yellow()
        );
        eprintln!("  {} {}", "•".bright_red(), e);
        return Err(miette::miette!("Invalid game directory"));
    }

    update_config(|cfg| cfg.game_path = Some(path.clone()))?;

    println!("{}", "✓ Game path set successfully!".bright_green().bold());
    println!();
    println!("  {} {}", "Path:".bright_white().bold(), path.as_str().bright_green());
    Ok(())
}

pub fn set_distribution_dir(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(path);
    if !path.is_dir() {
        return Err(miette::miette!("Not a directory: {}", path));
    }
    if !path.join("mods").is_dir() {
        eprintln!(
            "  {}",
            "No 'mods' folder yet, it will be created on first use".bright_yellow()
        );
    }

    update_config(|cfg| cfg.distribution_dir = Some(path.clone()))?;

    println!(
        "{}",
        "✓ Distribution folder set successfully!".bright_green().bold()
    );
    println!();
    println!("  {} {}", "Path:".bright_white().bold(), path.as_str().bright_green());
    Ok(())
}

pub fn reset_config() -> Result<()> {
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    config::save_config(&AppConfig::default())
        .map_err(|e| miette::miette!("Failed to reset config: {}", e))?;

    println!("{}", "✓ Configuration reset to defaults".bright_green().bold());
    println!();
    println!("  {} {}", "Config file:".bright_white().bold(), config_path);
    Ok(())
}
