pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::{BarConfig, ConfigMessage};

/// Environment variable naming a config file to use instead of the
/// discovered one.
pub const CONFIG_ENV: &str = "STATLINE_CONFIG";

/// Load configuration from `path`, `$STATLINE_CONFIG`, or the platform
/// config directory, in that order.
///
/// An explicitly named file must exist and parse. When nothing is named and
/// the default file is absent, the defaults are returned. Validation
/// warnings are logged; validation errors fail the load.
pub fn load(path: Option<&str>) -> Result<BarConfig> {
    let explicit = path
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

    let config_path = match explicit {
        Some(p) => p,
        None => match discover_config() {
            Some(p) => p,
            None => {
                tracing::debug!("no config file, using defaults");
                return Ok(BarConfig::default());
            }
        },
    };

    load_file(&config_path)
}

fn load_file(config_path: &Path) -> Result<BarConfig> {
    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config: BarConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    for msg in config.validate() {
        match msg {
            ConfigMessage::Warning(w) => {
                tracing::warn!("config warning in {}: {}", config_path.display(), w);
            }
            ConfigMessage::Error(e) => {
                anyhow::bail!("config error in {}: {}", config_path.display(), e);
            }
        }
    }

    tracing::debug!("loaded config from {}", config_path.display());
    Ok(config)
}

/// The default config file, if it exists.
pub fn discover_config() -> Option<PathBuf> {
    let candidate = config_dir().ok()?.join("config.toml");
    candidate.exists().then_some(candidate)
}

/// Return the platform-specific config directory (~/.config/statline on Linux).
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("statline"))
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bar.toml");
        std::fs::write(&path, "status_command = \"date\"\ncolors = false\n").unwrap();

        let config = load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.status_command.as_deref(), Some("date"));
        assert!(!config.colors);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let err = load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[test]
    fn validation_error_fails_the_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bar.toml");
        std::fs::write(&path, "separator_symbol = \"\"\n").unwrap();

        let err = load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("separator_symbol"));
    }

    #[test]
    fn config_dir_is_namespaced() {
        if let Ok(dir) = config_dir() {
            assert!(dir.ends_with("statline"));
        }
    }
}
