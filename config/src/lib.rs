//! Editor-facing configuration.
//!
//! The bridge never reaches into the editor's settings storage; it receives
//! a read-only [`Settings`] snapshot at construction and again whenever the
//! user changes something. This crate defines that snapshot and loads it
//! from the user's TOML configuration file when running outside an editor.

use std::path::{Path, PathBuf};

use eyre::Context;
use serde::{Deserialize, Serialize};

/// When (if ever) the server should be launched without an explicit
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AutoLaunch {
    #[default]
    Off,
    OnStart,
    OnRubyFileOpen,
    OnCustomExtension,
}

/// What "run selected" should do when the selection is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RunSelectedEmpty {
    #[default]
    Prompt,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Root of the Sonic Pi install.
    pub root_dir: Option<PathBuf>,
    /// Interpreter to launch the server with, when the bundled one should
    /// not be used.
    pub interpreter: Option<PathBuf>,
    pub auto_launch: AutoLaunch,
    /// File extension that triggers auto-launch under
    /// [`AutoLaunch::OnCustomExtension`].
    pub custom_extension: String,
    pub run_selected_empty: RunSelectedEmpty,
    pub clear_log_on_run: bool,
    pub safe_mode: bool,
    pub invert_stereo: bool,
    pub force_mono: bool,
    pub flash_background_color: String,
    pub flash_text_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_dir: None,
            interpreter: None,
            auto_launch: AutoLaunch::default(),
            custom_extension: String::new(),
            run_selected_empty: RunSelectedEmpty::default(),
            clear_log_on_run: true,
            safe_mode: true,
            invert_stereo: false,
            force_mono: false,
            flash_background_color: "#ff6347".to_owned(),
            flash_text_color: "#ffffff".to_owned(),
        }
    }
}

impl Settings {
    /// Load from the user's configuration file, falling back to defaults
    /// when none exists yet.
    pub fn load_default() -> eyre::Result<Self> {
        let Some(path) = default_path() else {
            tracing::debug!("no config directory available, using defaults");
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> eyre::Result<Self> {
        let contents = std::fs::read_to_string(path).wrap_err("reading configuration contents")?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> eyre::Result<Self> {
        toml::from_str(contents).wrap_err("parsing configuration")
    }
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sonic-bridge/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        assert_eq!(Settings::from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn policies_parse_from_kebab_case() {
        let settings = Settings::from_toml(
            r#"
root-dir = "/opt/sonic-pi"
auto-launch = "on-ruby-file-open"
run-selected-empty = "always"
safe-mode = false
invert-stereo = true
"#,
        )
        .unwrap();
        assert_eq!(settings.root_dir, Some(PathBuf::from("/opt/sonic-pi")));
        assert_eq!(settings.auto_launch, AutoLaunch::OnRubyFileOpen);
        assert_eq!(settings.run_selected_empty, RunSelectedEmpty::Always);
        assert!(!settings.safe_mode);
        assert!(settings.invert_stereo);
        // untouched fields keep their defaults
        assert!(settings.clear_log_on_run);
    }

    #[test]
    fn load_from_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "force-mono = true\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert!(settings.force_mono);
    }

    #[test]
    fn invalid_policy_is_an_error() {
        assert!(Settings::from_toml("auto-launch = \"sometimes\"").is_err());
    }
}
