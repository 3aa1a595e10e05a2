//! Dataset preparation: WAV directory to feature matrix
//!
//! ```text
//! *.wav (sorted, capped) ──par──> SyllablesFromWav ──par──> feature rows ──> N x D
//! ```
//!
//! Both parallel stages map over an immutable, ordered input and collect in
//! the same order, so the row order depends only on file names.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use rayon::prelude::*;
use songdkl_audio::{Segmenter, SyllablesFromWav};
use songdkl_features::SpectralFeaturizer;
use tracing::{debug, info, warn};

use crate::annotation::write_annotations;
use crate::config::PipelineConfig;
use crate::error::{Result, SongDklError};
use crate::store::{dir_name, is_store_path, load_psds, save_psds, STORE_SUFFIX};

/// Segmentation and features for one directory
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    /// One record per successfully segmented file, in file order
    pub syllables: Vec<SyllablesFromWav>,
    /// One row per syllable
    pub psds: Array2<f64>,
}

/// `*.wav` files in `dir`, sorted by name, at most `max_wavs`
pub fn wav_paths(dir: &Path, max_wavs: usize) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext == "wav");
        if is_wav && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    paths.truncate(max_wavs);
    Ok(paths)
}

/// Stack equal-length rows, keeping at most `max_rows`
fn stack_rows(rows: Vec<Vec<f64>>, max_rows: usize) -> Result<Array2<f64>> {
    let n = rows.len().min(max_rows);
    let dim = rows.first().map_or(0, Vec::len);

    let mut flat = Vec::with_capacity(n * dim);
    for row in rows.into_iter().take(n) {
        if row.len() != dim {
            return Err(SongDklError::DimensionMismatch {
                expected: dim,
                actual: row.len(),
            });
        }
        flat.extend(row);
    }

    Array2::from_shape_vec((n, dim), flat)
        .map_err(|e| SongDklError::invalid_parameter(format!("cannot build feature matrix: {}", e)))
}

/// Segment and featurize every WAV in `dir`
///
/// Files that cannot be read or segmented are skipped with a warning, as
/// are zero-variance clips. Mixing sample rates that produce different
/// feature lengths is a dimension mismatch.
pub fn prep(dir: &Path, config: &PipelineConfig) -> Result<PreparedDataset> {
    config.validate()?;
    info!(
        "Preparing dataset from {} with max_wavs={} and max_num_psds={}",
        dir.display(),
        config.max_wavs,
        config.max_num_psds
    );

    let paths = wav_paths(dir, config.max_wavs)?;
    if paths.is_empty() {
        warn!("No .wav files found in {}", dir.display());
    }

    info!("Segmenting {} .wav files", paths.len());
    let segmenter = Segmenter::new(config.segment.clone())?;
    let syllables: Vec<SyllablesFromWav> = paths
        .par_iter()
        .map(|path| (path, segmenter.segment_wav(path)))
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|(path, result)| match result {
            Ok(syls) => Some(syls),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    info!("Computing PSDs from syllable segments");
    let featurizer = SpectralFeaturizer::new(config.features.clone())?;
    let per_file = syllables
        .par_iter()
        .map(|syls| featurizer.featurize_clips(&syls.segmentation.clips))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let rows: Vec<Vec<f64>> = per_file.into_iter().flatten().collect();
    debug!("{} feature vectors before truncation", rows.len());
    let psds = stack_rows(rows, config.max_num_psds)?;
    info!(
        "Prepared {} feature vectors of length {} from {} files",
        psds.nrows(),
        psds.ncols(),
        syllables.len()
    );

    Ok(PreparedDataset { syllables, psds })
}

/// Prepare each directory and save its features and annotations
///
/// `output_dirs` may be empty (write next to each input), hold one directory
/// (shared by every input), or one per input. Returns the store paths.
pub fn prep_and_save(
    dirs: &[PathBuf],
    output_dirs: &[PathBuf],
    config: &PipelineConfig,
) -> Result<Vec<PathBuf>> {
    let outputs: Vec<PathBuf> = match output_dirs.len() {
        0 => dirs.to_vec(),
        1 => vec![output_dirs[0].clone(); dirs.len()],
        n if n == dirs.len() => output_dirs.to_vec(),
        n => {
            return Err(SongDklError::invalid_parameter(format!(
                "got {} output directories for {} input directories; give one, \
                 or one per input",
                n,
                dirs.len()
            )))
        }
    };

    let mut saved = Vec::with_capacity(dirs.len());
    for (dir, output) in dirs.iter().zip(&outputs) {
        let dataset = prep(dir, config)?;
        fs::create_dir_all(output)?;

        info!("Saving syllable segmentation to {}", output.display());
        write_annotations(&dataset.syllables, &dir_name(dir)?, output)?;

        saved.push(save_psds(&dataset.psds, dir, output)?);
    }
    Ok(saved)
}

/// Load a saved feature store, or prepare a WAV directory
///
/// Loaded stores are truncated to `max_num_psds` rows. Any other path,
/// including a single `.wav` file, is rejected.
pub fn load_or_prep(path: &Path, config: &PipelineConfig) -> Result<Array2<f64>> {
    if is_store_path(path) {
        info!("Loading features from {}", path.display());
        let psds = load_psds(path)?;
        let n = psds.nrows().min(config.max_num_psds);
        return Ok(psds.slice(s![..n, ..]).to_owned());
    }

    if path.is_dir() {
        return Ok(prep(path, config)?.psds);
    }

    Err(SongDklError::invalid_parameter(format!(
        "{} is neither a directory of .wav files nor a feature store (*{})",
        path.display(),
        STORE_SUFFIX
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wav_paths_sorted_and_capped() {
        let dir = TempDir::new().unwrap();
        for name in ["c.wav", "a.wav", "b.wav", "notes.txt", "d.WAV.bak"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let paths = wav_paths(dir.path(), 2).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn test_stack_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let m = stack_rows(rows, 2).unwrap();
        assert_eq!(m.dim(), (2, 2));
        assert_eq!(m[[1, 0]], 3.0);
    }

    #[test]
    fn test_stack_rows_mismatch() {
        let rows = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            stack_rows(rows, 10),
            Err(SongDklError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_output_dir_count_mismatch() {
        let dirs = vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")];
        let outputs = vec![PathBuf::from("x"), PathBuf::from("y")];
        assert!(matches!(
            prep_and_save(&dirs, &outputs, &PipelineConfig::default()),
            Err(SongDklError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_or_prep_rejects_single_wav() {
        let dir = TempDir::new().unwrap();
        let wav = dir.path().join("a.wav");
        fs::write(&wav, b"RIFF\0\0\0\0WAVE").unwrap();
        assert!(matches!(
            load_or_prep(&wav, &PipelineConfig::default()),
            Err(SongDklError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_or_prep_rejects_other_files() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("bird.json");
        fs::write(&notes, b"{}").unwrap();
        assert!(matches!(
            load_or_prep(&notes, &PipelineConfig::default()),
            Err(SongDklError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_load_or_prep_missing_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nowhere");
        assert!(matches!(
            load_or_prep(&missing, &PipelineConfig::default()),
            Err(SongDklError::InvalidParameter(_))
        ));
    }
}
