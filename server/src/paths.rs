//! Install layout resolution.
//!
//! Everything the bridge needs on disk hangs off the configured install
//! root; only the interpreter can be overridden separately (on Linux it is
//! commonly the system `ruby` rather than the bundled one).

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("no install root directory configured")]
    MissingRoot,

    #[error("required install path missing: {}", .0.display())]
    MissingPath(PathBuf),

    #[error("could not determine the user's home directory")]
    MissingHome,
}

/// Resolved locations inside (and derived from) the install root.
#[derive(Debug, Clone)]
pub struct InstallPaths {
    pub root: PathBuf,
    pub interpreter: PathBuf,
    pub server_script: PathBuf,
    pub port_discovery_script: PathBuf,
    pub init_script: PathBuf,
    pub samples_dir: PathBuf,
    /// Per-user state directory (`~/.sonic-pi`).
    pub user_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl InstallPaths {
    /// Resolve and validate the layout. Every script the session needs must
    /// exist up front; reporting a missing path here lets the editor point
    /// the user at their settings instead of failing halfway through start.
    pub fn resolve(
        root: &Path,
        interpreter_override: Option<&Path>,
    ) -> Result<Self, ConfigurationError> {
        let interpreter = match interpreter_override {
            Some(interpreter) => interpreter.to_path_buf(),
            None => root.join("app/server/native/ruby/bin/ruby"),
        };
        let server_script = root.join("app/server/ruby/bin/sonic-pi-server.rb");
        let port_discovery_script = root.join("app/server/ruby/bin/port-discovery.rb");
        let init_script = root.join("app/server/ruby/bin/init-script.rb");
        let samples_dir = root.join("etc/samples");

        for required in [
            &interpreter,
            &server_script,
            &port_discovery_script,
            &init_script,
        ] {
            if !required.exists() {
                return Err(ConfigurationError::MissingPath(required.clone()));
            }
        }

        let home = dirs::home_dir().ok_or(ConfigurationError::MissingHome)?;
        let user_dir = home.join(".sonic-pi");
        let log_dir = user_dir.join("log");

        Ok(Self {
            root: root.to_path_buf(),
            interpreter,
            server_script,
            port_discovery_script,
            init_script,
            samples_dir,
            user_dir,
            log_dir,
        })
    }

    /// Create the log directory if it does not exist yet.
    pub fn ensure_log_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.log_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold_install(root: &Path) {
        let bin = root.join("app/server/ruby/bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(root.join("app/server/native/ruby/bin")).unwrap();
        std::fs::write(root.join("app/server/native/ruby/bin/ruby"), "").unwrap();
        std::fs::write(bin.join("sonic-pi-server.rb"), "").unwrap();
        std::fs::write(bin.join("port-discovery.rb"), "").unwrap();
        std::fs::write(bin.join("init-script.rb"), "").unwrap();
    }

    #[test]
    fn complete_layout_resolves() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_install(dir.path());
        let paths = InstallPaths::resolve(dir.path(), None).unwrap();
        assert!(paths.server_script.ends_with("sonic-pi-server.rb"));
        assert!(paths.user_dir.ends_with(".sonic-pi"));
    }

    #[test]
    fn interpreter_override_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_install(dir.path());
        let system_ruby = dir.path().join("ruby");
        std::fs::write(&system_ruby, "").unwrap();
        let paths = InstallPaths::resolve(dir.path(), Some(&system_ruby)).unwrap();
        assert_eq!(paths.interpreter, system_ruby);
    }

    #[test]
    fn missing_script_is_named() {
        let dir = tempfile::tempdir().unwrap();
        scaffold_install(dir.path());
        std::fs::remove_file(dir.path().join("app/server/ruby/bin/init-script.rb")).unwrap();
        let err = InstallPaths::resolve(dir.path(), None).unwrap_err();
        assert!(
            matches!(&err, ConfigurationError::MissingPath(path) if path.ends_with("init-script.rb")),
            "{err}"
        );
    }
}
