use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use commod_lib::{Choice, InstallSettings, ModManifest};
use commod_manifest::{load_manifest_file, load_zip_manifest};
use std::collections::BTreeMap;

pub mod config;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Splits a `name=value` option argument.
pub fn parse_option_arg(argument: &str) -> Result<(String, Choice), CliError> {
    match argument.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim().to_string(), Choice::parse(value.trim())))
        }
        _ => Err(CliError::invalid_option_argument(argument)),
    }
}

/// Builds install settings from `--full` and `--option` arguments.
///
/// Options not named on the command line are skipped; the base content is
/// always installed.
pub fn settings_from_args(
    manifest: &ModManifest,
    full: bool,
    options: &[String],
) -> Result<InstallSettings, CliError> {
    let mut settings = if full {
        InstallSettings::full(manifest)
    } else {
        let skipped: BTreeMap<String, Choice> = manifest
            .optional_content
            .iter()
            .map(|option| (option.name.clone(), Choice::Skip))
            .collect();
        InstallSettings {
            base: Choice::Yes,
            options: skipped,
        }
    };

    for argument in options {
        let (name, choice) = parse_option_arg(argument)?;
        settings.options.insert(name, choice);
    }
    Ok(settings)
}

/// Resolves `--game`, falling back to the configured game directory.
pub fn resolve_game_path(game: Option<String>) -> Result<Utf8PathBuf, CliError> {
    game.map(Utf8PathBuf::from)
        .or_else(|| config::load_config().game_path)
        .ok_or(CliError::GamePathNotSet)
}

/// Loads a manifest file, or the manifest inside a `.zip` archive.
pub fn load_manifest(path: &Utf8Path, check_data: bool) -> Result<ModManifest, CliError> {
    let manifest = if is_zip(path) {
        load_zip_manifest(path, check_data)?
    } else {
        load_manifest_file(path, check_data)?
    };
    Ok(manifest)
}

pub fn is_zip(path: &Utf8Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("zip"))
}
