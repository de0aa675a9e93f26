//! Configuration file loader with multi-source merging

use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Path list of project roots, separated like `PATH`.
pub const ALLOWED_ROOTS_VAR: &str = "HERD_ALLOWED_ROOTS";
/// `1`/`true` disables the project allow-list.
pub const UNRESTRICTED_VAR: &str = "HERD_UNRESTRICTED";

const PROJECT_FILES: [&str; 2] = ["herd.toml", ".herd.toml"];

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `HERD_*` environment variables (`__` separates sections), plus
    ///    `HERD_ALLOWED_ROOTS` and `HERD_UNRESTRICTED`
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./herd.toml` or `./.herd.toml`
    /// 4. XDG config: `$XDG_CONFIG_HOME/herd/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(&global_path));
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(
            Env::prefixed("HERD_")
                .ignore(&["ALLOWED_ROOTS", "UNRESTRICTED"])
                .split("__"),
        );

        let mut config: FileConfig = figment.extract().map_err(Box::new)?;
        apply_project_env(
            &mut config,
            std::env::var_os(ALLOWED_ROOTS_VAR),
            std::env::var(UNRESTRICTED_VAR).ok(),
        );
        Ok(config)
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        let mut config = FileConfig::default();
        apply_project_env(
            &mut config,
            std::env::var_os(ALLOWED_ROOTS_VAR),
            std::env::var(UNRESTRICTED_VAR).ok(),
        );
        config
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/herd/config.toml if set,
    /// otherwise falls back to ~/.config/herd/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("herd").join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Print the config file locations being used (for debugging)
    pub fn print_config_sources(config_path: Option<&PathBuf>) {
        println!("Configuration sources (in priority order):");
        println!("  [ENV  ] HERD_* variables, {ALLOWED_ROOTS_VAR}, {UNRESTRICTED_VAR}");

        if let Some(path) = config_path {
            let mark = if path.exists() { "FOUND" } else { "MISSING" };
            println!("  [{mark}] Explicit: {}", path.display());
        }

        if let Some(path) = Self::project_config_path() {
            println!("  [FOUND] Project: {}", path.display());
        } else {
            println!("  [     ] Project: ./herd.toml or ./.herd.toml");
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}

/// Apply the dedicated project-policy variables on top of `config`.
fn apply_project_env(
    config: &mut FileConfig,
    allowed_roots: Option<OsString>,
    unrestricted: Option<String>,
) {
    if let Some(roots) = allowed_roots {
        let roots: Vec<PathBuf> = std::env::split_paths(&roots)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if !roots.is_empty() {
            config.projects.allowed_roots = roots;
        }
    }
    if let Some(flag) = unrestricted {
        config.projects.unrestricted =
            matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults_is_valid() {
        let config = ConfigLoader::load_defaults();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_global_config_path_returns_some() {
        let path = ConfigLoader::global_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.ends_with("herd/config.toml"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[stream]\nreconnect_delay_ms = 750").unwrap();

        let config = ConfigLoader::load(Some(&path)).unwrap();
        assert_eq!(config.stream.reconnect_delay_ms, 750);
        assert_eq!(config.backend.command, "opencode");
    }

    #[test]
    fn test_allowed_roots_env_uses_path_separator() {
        let mut config = FileConfig::default();
        let joined = std::env::join_paths(["/home/dev/a", "/srv/b"]).unwrap();
        apply_project_env(&mut config, Some(joined), None);
        assert_eq!(
            config.projects.allowed_roots,
            vec![PathBuf::from("/home/dev/a"), PathBuf::from("/srv/b")]
        );
        assert!(!config.projects.unrestricted);
    }

    #[test]
    fn test_unrestricted_env_flag() {
        let mut config = FileConfig::default();
        apply_project_env(&mut config, None, Some("TRUE".to_string()));
        assert!(config.projects.unrestricted);

        apply_project_env(&mut config, None, Some("0".to_string()));
        assert!(!config.projects.unrestricted);
    }
}
