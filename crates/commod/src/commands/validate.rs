use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{is_zip, load_manifest};
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use commod_manifest::{read_zip_manifest, validate_manifest as validate_value, DataCheck};
use miette::IntoDiagnostic;

pub struct ValidateArgs {
    pub manifest: String,
    pub skip_data: bool,
}

pub fn validate_manifest(args: ValidateArgs) -> miette::Result<()> {
    let path = Utf8PathBuf::from(&args.manifest);

    println_pad!(
        "{} {}",
        "🔍 Validating:".bright_blue().bold(),
        path.as_str().bright_cyan().bold()
    );

    let report = if is_zip(&path) {
        let zipped = read_zip_manifest(&path).map_err(CliError::from)?;
        let data = if args.skip_data {
            DataCheck::Skip
        } else {
            DataCheck::Archive(&zipped.listing)
        };
        validate_value(&zipped.value, data)
    } else {
        let contents = std::fs::read_to_string(&path).into_diagnostic()?;
        let value: serde_yaml::Value = serde_yaml::from_str(&contents).into_diagnostic()?;
        let mod_root = path.parent().unwrap_or(Utf8Path::new("."));
        let data = if args.skip_data {
            DataCheck::Skip
        } else {
            DataCheck::Directory(mod_root)
        };
        validate_value(&value, data)
    };

    if !report.is_valid() {
        for diagnostic in report.diagnostics() {
            println_pad!("   {} {}", "✗".bright_red(), diagnostic.to_string().bright_white());
        }
        return Err(CliError::manifest_invalid(path, report.diagnostics().len()).into());
    }

    // Schema-valid manifests can still fail construction, e.g. on a bad default_option.
    let manifest = load_manifest(&path, !args.skip_data)?;

    println_pad!(
        "{} {} {}",
        "✅ Manifest is valid:".bright_green().bold(),
        manifest.display_name.bright_white().bold(),
        format!("(version {}, build {})", manifest.version, manifest.build).dimmed()
    );
    if !manifest.optional_content.is_empty() {
        println_pad!("\n{}", "🧩 Optional content:".bright_magenta().bold());
        for option in &manifest.optional_content {
            println_pad!(
                "   {} {} - {}",
                "•".bright_cyan(),
                option.name.bright_cyan().bold(),
                option.display_name.bright_white()
            );
            for setting in &option.install_settings {
                println_pad!("       {} {}", setting.name.bright_white(), setting.description.dimmed());
            }
        }
    }

    Ok(())
}
