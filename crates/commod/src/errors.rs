use camino::Utf8PathBuf;
use commod_game::running_game_exes;
use commod_manifest::ManifestError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("No game directory given")]
    #[diagnostic(
        code(config::game_path_missing),
        help("Pass --game <dir> or run 'commod config set-game <dir>'")
    )]
    GamePathNotSet,

    #[error("No distribution folder given")]
    #[diagnostic(
        code(config::distribution_missing),
        help("Pass --distribution <dir> or run 'commod config set-distribution <dir>'")
    )]
    DistributionNotSet,

    #[error("Invalid option choice: {argument}")]
    #[diagnostic(
        code(args::invalid_option),
        help("Options are given as name=value, e.g. --option extra=yes or --option skins=hd")
    )]
    InvalidOptionArgument { argument: String },

    #[error("Manifest {path} has {problems} problem(s)")]
    #[diagnostic(
        code(manifest::invalid),
        help("Fix the problems listed above and validate again")
    )]
    ManifestInvalid { path: Utf8PathBuf, problems: usize },

    #[error("Requirements not met for '{name}'")]
    #[diagnostic(
        code(install::requirements_not_met),
        help("Install the missing content first, or use a clean game copy")
    )]
    RequirementsNotMet { name: String },

    #[error("Game is running: {path}")]
    #[diagnostic(
        code(game::running),
        help("Close the game before modding it. Running game processes: {processes}")
    )]
    GameRunning { path: Utf8PathBuf, processes: String },

    #[error("Mod is still packed in {archive}")]
    #[diagnostic(
        code(install::packed_mod),
        help("Extract the archive next to itself and point --manifest at the extracted manifest.yaml")
    )]
    PackedMod { archive: Utf8PathBuf },

    #[error("Game copy is in an inconsistent state")]
    #[diagnostic(
        code(game::inconsistent),
        help("The executable and the installed content record disagree. Reinstall the game and mod a clean copy")
    )]
    InconsistentGameCopy {
        #[source]
        source: commod_lib::Error,
    },

    #[error("Mod engine error")]
    #[diagnostic(code(commod::engine))]
    Engine {
        #[source]
        source: commod_lib::Error,
    },

    #[error("Manifest error")]
    #[diagnostic(
        code(manifest::load_failed),
        help("Check the manifest for YAML syntax errors")
    )]
    Manifest {
        #[from]
        source: ManifestError,
    },

    #[error("Prompt failed")]
    #[diagnostic(code(cli::prompt_failed))]
    Prompt {
        #[from]
        source: inquire::InquireError,
    },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl From<commod_lib::Error> for CliError {
    fn from(source: commod_lib::Error) -> Self {
        use commod_lib::Error as E;
        match source {
            E::Game(commod_game::Error::ExeIsRunning(path)) => Self::game_running(path),
            E::RequirementsNotMet { name, .. } => Self::RequirementsNotMet { name },
            E::PackedMod { archive, .. } => Self::PackedMod { archive },
            E::Manifest(source) => Self::Manifest { source },
            E::HasManifestButUnpatched(_) | E::PatchedButDoesntHaveManifest(_) => {
                Self::InconsistentGameCopy { source }
            }
            source => Self::Engine { source },
        }
    }
}

impl CliError {
    pub fn invalid_option_argument(argument: impl Into<String>) -> Self {
        Self::InvalidOptionArgument {
            argument: argument.into(),
        }
    }

    /// Names the running game processes so the user knows what to close.
    pub fn game_running(path: Utf8PathBuf) -> Self {
        let running = running_game_exes();
        let processes = if running.is_empty() {
            "none found".to_string()
        } else {
            running
                .iter()
                .map(|exe| exe.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self::GameRunning { path, processes }
    }

    pub fn manifest_invalid(path: Utf8PathBuf, problems: usize) -> Self {
        Self::ManifestInvalid { path, problems }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_exe_maps_to_game_running() {
        let path = Utf8PathBuf::from("/games/ExMachina/hta.exe");
        let error = CliError::from(commod_lib::Error::Game(commod_game::Error::ExeIsRunning(
            path.clone(),
        )));
        match error {
            CliError::GameRunning {
                path: reported,
                processes,
            } => {
                assert_eq!(reported, path);
                assert!(!processes.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn requirement_failure_keeps_mod_name() {
        let error = CliError::from(commod_lib::Error::RequirementsNotMet {
            name: "my_mod".to_string(),
            messages: vec![],
        });
        assert!(matches!(error, CliError::RequirementsNotMet { name } if name == "my_mod"));
    }
}
