//! Mono waveforms and the syllable clips cut out of them

use std::path::Path;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::error::{AudioError, Result};

/// A mono recording: sample rate plus samples
///
/// Integer WAV samples are kept at their native integer scale (a 16-bit
/// recording spans roughly ±32768), not rescaled to ±1.0. The segmentation
/// thresholds operate on that scale.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    sample_rate: u32,
    samples: Vec<f64>,
}

impl Waveform {
    /// Create a waveform from raw samples
    pub fn new(sample_rate: u32, samples: Vec<f64>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::invalid_parameter("Sample rate cannot be zero"));
        }

        Ok(Self {
            sample_rate,
            samples,
        })
    }

    /// Load a mono WAV file
    ///
    /// Multi-channel files are rejected.
    pub fn from_wav<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();

        if spec.channels != 1 {
            return Err(AudioError::invalid_parameter(format!(
                "{} has {} channels, only mono recordings are supported",
                path.display(),
                spec.channels
            )));
        }

        let samples: Vec<f64> = match spec.sample_format {
            SampleFormat::Int => reader
                .samples::<i32>()
                .map(|s| s.map(f64::from))
                .collect::<std::result::Result<_, _>>()?,
            SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<std::result::Result<_, _>>()?,
        };

        debug!(
            "Loaded {}: {} Hz, {} bits, {} samples",
            path.display(),
            spec.sample_rate,
            spec.bits_per_sample,
            samples.len()
        );

        Self::new(spec.sample_rate, samples)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Number of samples spanned by `ms` milliseconds at this waveform's rate
    pub fn ms_to_samples(&self, ms: f64) -> f64 {
        ms * self.sample_rate as f64 / 1000.0
    }
}

/// A contiguous run of samples cut out of a [`Waveform`]
#[derive(Debug, Clone, PartialEq)]
pub struct SyllableClip {
    /// First sample index in the source waveform
    pub start: usize,
    /// One past the last sample index in the source waveform
    pub stop: usize,
    /// Sample rate of the source waveform
    pub sample_rate: u32,
    samples: Vec<f64>,
}

impl SyllableClip {
    /// A clip of `samples` spanning `[start, stop)` of its source
    ///
    /// The range must be ordered and as long as `samples`; the rate must be
    /// positive.
    pub fn new(start: usize, stop: usize, sample_rate: u32, samples: Vec<f64>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AudioError::invalid_parameter("Sample rate cannot be zero"));
        }
        if stop < start || stop - start != samples.len() {
            return Err(AudioError::invalid_parameter(format!(
                "clip range [{}, {}) does not match its {} samples",
                start,
                stop,
                samples.len()
            )));
        }

        Ok(Self {
            start,
            stop,
            sample_rate,
            samples,
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Onset in seconds
    pub fn onset_secs(&self) -> f64 {
        self.start as f64 / self.sample_rate as f64
    }

    /// Offset in seconds
    pub fn offset_secs(&self) -> f64 {
        self.stop as f64 / self.sample_rate as f64
    }
}
