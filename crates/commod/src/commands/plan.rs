use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{load_manifest, settings_from_args};
use camino::Utf8PathBuf;
use colored::Colorize;
use commod_lib::{describe, plan_install as build_plan, InstallPlan, PlanSource};

pub struct PlanArgs {
    pub manifest: String,
    pub full: bool,
    pub options: Vec<String>,
}

pub(crate) fn print_plan(plan: &InstallPlan) {
    println_pad!("\n{}", "📂 Copy order:".bright_magenta().bold());
    for root in &plan.roots {
        let label = match &root.source {
            PlanSource::Base => "base".to_string(),
            PlanSource::Option(option) => option.clone(),
            PlanSource::Setting { option, setting } => format!("{option}/{setting}"),
        };
        println_pad!(
            "   {} {} {}",
            "•".bright_cyan(),
            label.bright_cyan().bold(),
            root.path.as_str().dimmed()
        );
    }
}

pub fn plan_install(args: PlanArgs) -> miette::Result<()> {
    let manifest = load_manifest(&Utf8PathBuf::from(&args.manifest), false)?;
    let settings = settings_from_args(&manifest, args.full, &args.options)?;
    let plan = build_plan(&manifest, &settings).map_err(CliError::from)?;

    println_pad!(
        "{} {}",
        "📋 Install plan for".bright_blue().bold(),
        manifest.display_name.bright_cyan().bold()
    );
    for line in describe(&manifest, &settings) {
        println_pad!("{}", line.bright_white());
    }
    print_plan(&plan);

    Ok(())
}
