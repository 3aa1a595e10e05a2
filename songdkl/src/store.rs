//! Persisted feature arrays
//!
//! A prepared directory is saved as `<dir name>.songdkl.json`: the N x D
//! feature matrix plus where and when it was computed.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SongDklError};

/// Extension of feature store files
pub const STORE_SUFFIX: &str = ".songdkl.json";

/// Feature matrix with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsdStore {
    /// Directory the features were prepared from
    pub source: PathBuf,
    pub created_at: DateTime<Utc>,
    /// One row per syllable
    pub psds: Array2<f64>,
}

impl PsdStore {
    pub fn new<P: Into<PathBuf>>(source: P, psds: Array2<f64>) -> Self {
        Self {
            source: source.into(),
            created_at: Utc::now(),
            psds,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let writer = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(writer, self)?;
        info!(
            "Saved {} x {} features to {}",
            self.psds.nrows(),
            self.psds.ncols(),
            path.display()
        );
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(fs::File::open(path)?);
        let store: Self = serde_json::from_reader(reader)?;
        debug!(
            "Loaded {} x {} features from {}",
            store.psds.nrows(),
            store.psds.ncols(),
            path.display()
        );
        Ok(store)
    }
}

/// Whether `path` names a feature store file
pub fn is_store_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| name.ends_with(STORE_SUFFIX))
}

/// Store file for `dir_path`, placed in `output_dir`
pub fn store_path(dir_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let name = dir_name(dir_path)?;
    Ok(output_dir.join(format!("{}{}", name, STORE_SUFFIX)))
}

/// Final component of a directory path, resolving `.` and friends
pub fn dir_name(dir_path: &Path) -> Result<String> {
    let resolved = if dir_path.file_name().is_some() {
        dir_path.to_path_buf()
    } else {
        fs::canonicalize(dir_path)?
    };
    resolved
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            SongDklError::invalid_parameter(format!(
                "cannot name output for directory {}",
                dir_path.display()
            ))
        })
}

/// Save a feature matrix for `dir_path` into `output_dir`
pub fn save_psds(psds: &Array2<f64>, dir_path: &Path, output_dir: &Path) -> Result<PathBuf> {
    let path = store_path(dir_path, output_dir)?;
    PsdStore::new(dir_path, psds.clone()).save(&path)?;
    Ok(path)
}

/// Load the feature matrix from a store file
pub fn load_psds<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    Ok(PsdStore::load(path)?.psds)
}
