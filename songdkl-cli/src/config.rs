//! Configuration file loading
//!
//! A TOML file with the same layout as [`PipelineConfig`]; every field is
//! optional. Command-line flags are applied on top afterwards.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use songdkl::PipelineConfig;

/// `<config dir>/songdkl/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("songdkl").join("config.toml"))
}

/// Parse a config file
pub fn load_file(path: &Path) -> Result<PipelineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Load the explicit config file, else the default one if present, else defaults
///
/// Returns the config and the file it came from.
pub fn load(explicit: Option<&Path>) -> Result<(PipelineConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((load_file(path)?, Some(path.to_path_buf())));
    }

    match default_config_path() {
        Some(path) if path.exists() => Ok((load_file(&path)?, Some(path))),
        _ => Ok((PipelineConfig::default(), None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songdkl::{BasisPolicy, CovarianceType};
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "n_basis = 30\nbasis = \"random\"\n\n[gmm]\ncovariance_type = \"diag\"\n",
        )
        .unwrap();

        let (config, source) = load(Some(&path)).unwrap();
        assert_eq!(source, Some(path));
        assert_eq!(config.n_basis, 30);
        assert_eq!(config.basis, BasisPolicy::Random);
        assert_eq!(config.gmm.covariance_type, CovarianceType::Diag);
        assert_eq!(config.max_wavs, PipelineConfig::default().max_wavs);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "n_basis = 30\nn_clusters = 9\n").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_path_location() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("songdkl/config.toml"));
        }
    }
}
