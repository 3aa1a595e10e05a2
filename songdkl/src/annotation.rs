//! Segmentation annotations as CSV
//!
//! Every segment gets the placeholder label `-`. Onsets and offsets are
//! written in seconds (millisecond precision) and in samples.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use songdkl_audio::SyllablesFromWav;
use tracing::debug;

use crate::error::{Result, SongDklError};

/// Label written for every segment
pub const PLACEHOLDER_LABEL: &str = "-";

const SEGMENT_HEADER: &str = "label,onset_s,offset_s,onset_sample,offset_sample";

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            SongDklError::invalid_parameter(format!("no file name in {}", path.display()))
        })
}

/// Per-file annotation path, `<wav name>-threshold-<value>.csv`
pub fn annotation_path(syllables: &SyllablesFromWav, output_dir: &Path) -> Result<PathBuf> {
    let wav_name = file_name(&syllables.wav_path)?;
    Ok(output_dir.join(format!(
        "{}-threshold-{}.csv",
        wav_name, syllables.segmentation.threshold
    )))
}

fn segment_rows(syllables: &SyllablesFromWav) -> impl Iterator<Item = String> + '_ {
    let rate = syllables.sample_rate as f64;
    syllables
        .segmentation
        .ranges
        .iter()
        .map(move |&(start, stop)| {
            format!(
                "{},{:.3},{:.3},{},{}",
                PLACEHOLDER_LABEL,
                start as f64 / rate,
                stop as f64 / rate,
                start,
                stop
            )
        })
}

/// Write one file's segments
pub fn write_annotation(syllables: &SyllablesFromWav, output_dir: &Path) -> Result<PathBuf> {
    let path = annotation_path(syllables, output_dir)?;
    let mut out = BufWriter::new(fs::File::create(&path)?);
    writeln!(out, "{}", SEGMENT_HEADER)?;
    for row in segment_rows(syllables) {
        writeln!(out, "{}", row)?;
    }
    out.flush()?;

    debug!(
        "Wrote {} segments to {}",
        syllables.segmentation.len(),
        path.display()
    );
    Ok(path)
}

/// Write every file's segments plus a combined `<dir name>.annot.csv`
///
/// The combined file adds the source WAV, the per-file annotation and a
/// sequence index to each row.
pub fn write_annotations(
    all: &[SyllablesFromWav],
    dir_name: &str,
    output_dir: &Path,
) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let combined_path = output_dir.join(format!("{}.annot.csv", dir_name));
    let mut combined = BufWriter::new(fs::File::create(&combined_path)?);
    writeln!(combined, "{},notated_path,annot_path,sequence", SEGMENT_HEADER)?;

    for (sequence, syllables) in all.iter().enumerate() {
        let annot_path = write_annotation(syllables, output_dir)?;
        for row in segment_rows(syllables) {
            writeln!(
                combined,
                "{},{},{},{}",
                row,
                syllables.wav_path.display(),
                annot_path.display(),
                sequence
            )?;
        }
    }
    combined.flush()?;

    Ok(combined_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use songdkl_audio::{Segmentation, SyllableClip};
    use tempfile::TempDir;

    fn syllables(name: &str) -> SyllablesFromWav {
        let ranges = vec![(1600, 3200), (8000, 12000)];
        let clips = ranges
            .iter()
            .map(|&(a, b)| SyllableClip::new(a, b, 32000, vec![1.0; b - a]).unwrap())
            .collect();
        SyllablesFromWav {
            segmentation: Segmentation {
                clips,
                ranges,
                threshold: 37.5,
            },
            wav_path: PathBuf::from(format!("/songs/{}", name)),
            sample_rate: 32000,
        }
    }

    #[test]
    fn test_per_file_annotation() {
        let dir = TempDir::new().unwrap();
        let path = write_annotation(&syllables("a.wav"), dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "a.wav-threshold-37.5.csv");

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], SEGMENT_HEADER);
        assert_eq!(lines[1], "-,0.050,0.100,1600,3200");
        assert_eq!(lines[2], "-,0.250,0.375,8000,12000");
    }

    #[test]
    fn test_combined_annotation() {
        let dir = TempDir::new().unwrap();
        let all = vec![syllables("a.wav"), syllables("b.wav")];
        let path = write_annotations(&all, "bird", dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "bird.annot.csv");

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 5);
        assert!(text.lines().nth(3).unwrap().contains("/songs/b.wav"));
        assert!(text.lines().nth(4).unwrap().ends_with(",1"));
        assert!(dir.path().join("b.wav-threshold-37.5.csv").exists());
    }
}
