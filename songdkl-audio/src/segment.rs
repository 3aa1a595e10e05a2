//! Syllable segmentation
//!
//! ```text
//! Waveform ──▶ high-pass (filtfilt) ──▶ |x| * boxcar ──▶ threshold policy
//!                                                          │
//!   SyllableClip ◀── duration filter ◀── label runs ◀── pad gaps (512)
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::envelope::{label_runs, pad_gaps, smooth_rectify, threshold, ThresholdPolicy};
use crate::error::{AudioError, Result};
use crate::filter::IirFilter;
use crate::waveform::{SyllableClip, Waveform};

/// Boxcar width used for the segmentation envelope
pub const DEFAULT_SMOOTH_WINDOW_MS: f64 = 10.0;
/// Shortest syllable kept
pub const DEFAULT_MIN_SYL_DUR_MS: f64 = 10.0;
/// Gap-bridging window in samples
pub const DEFAULT_PAD_WIDTH: usize = 512;

/// Segmentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentConfig {
    /// Envelope smoothing window in milliseconds (default: 10)
    pub smooth_window_ms: f64,

    /// Minimum syllable duration in milliseconds (default: 10)
    /// Runs no longer than this are dropped
    pub min_syl_dur_ms: f64,

    /// Envelope threshold policy (default: half-otsu)
    pub threshold: ThresholdPolicy,

    /// Width of the gap-bridging window in samples (default: 512)
    pub pad_width: usize,

    /// Return high-pass filtered clips instead of raw samples (default: false)
    pub syls_filtered: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            smooth_window_ms: DEFAULT_SMOOTH_WINDOW_MS,
            min_syl_dur_ms: DEFAULT_MIN_SYL_DUR_MS,
            threshold: ThresholdPolicy::default(),
            pad_width: DEFAULT_PAD_WIDTH,
            syls_filtered: false,
        }
    }
}

impl SegmentConfig {
    /// Set envelope smoothing window
    pub fn smooth_window(mut self, ms: f64) -> Self {
        self.smooth_window_ms = ms;
        self
    }

    /// Set minimum syllable duration
    pub fn min_syl_dur(mut self, ms: f64) -> Self {
        self.min_syl_dur_ms = ms;
        self
    }

    /// Set threshold policy
    pub fn threshold(mut self, policy: ThresholdPolicy) -> Self {
        self.threshold = policy;
        self
    }

    /// Set gap-bridging window
    pub fn pad_width(mut self, samples: usize) -> Self {
        self.pad_width = samples;
        self
    }

    /// Return filtered clips
    pub fn syls_filtered(mut self, filtered: bool) -> Self {
        self.syls_filtered = filtered;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.smooth_window_ms > 0.0) || !self.smooth_window_ms.is_finite() {
            return Err(AudioError::invalid_parameter(
                "smooth_window_ms must be positive",
            ));
        }

        if !(self.min_syl_dur_ms >= 0.0) || !self.min_syl_dur_ms.is_finite() {
            return Err(AudioError::invalid_parameter(
                "min_syl_dur_ms must be non-negative",
            ));
        }

        if self.pad_width == 0 {
            return Err(AudioError::invalid_parameter("pad_width must be positive"));
        }

        if let ThresholdPolicy::Explicit(value) = self.threshold {
            ThresholdPolicy::explicit(value)?;
        }

        Ok(())
    }
}

/// Clips, ranges and threshold found in one waveform
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub clips: Vec<SyllableClip>,
    /// `[start, stop)` sample ranges, one per clip
    pub ranges: Vec<(usize, usize)>,
    /// Envelope threshold the policy chose
    pub threshold: f64,
}

impl Segmentation {
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn into_parts(self) -> (Vec<SyllableClip>, Vec<(usize, usize)>, f64) {
        (self.clips, self.ranges, self.threshold)
    }
}

/// Every syllable found in one WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct SyllablesFromWav {
    pub segmentation: Segmentation,
    pub wav_path: PathBuf,
    pub sample_rate: u32,
}

/// Cuts waveforms into syllable clips
#[derive(Debug, Clone)]
pub struct Segmenter {
    config: SegmentConfig,
    filter: IirFilter,
}

impl Segmenter {
    /// Create a segmenter; the configuration is validated up front
    pub fn new(config: SegmentConfig) -> Result<Self> {
        config.validate()?;
        let filter = IirFilter::song_highpass()?;
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Segment one waveform
    ///
    /// A silent waveform yields no clips. A waveform too short to filter or
    /// smooth is a segmentation error.
    pub fn segment(&self, waveform: &Waveform) -> Result<Segmentation> {
        let rate = waveform.sample_rate();
        let filtered = self.filter.filtfilt(waveform.samples())?;

        let envelope = smooth_rectify(&filtered, rate, self.config.smooth_window_ms)?;
        let thresh = self.config.threshold.compute(&envelope)?;
        let mask = pad_gaps(&threshold(&envelope, thresh), self.config.pad_width);

        let min_len = waveform.ms_to_samples(self.config.min_syl_dur_ms);
        let ranges: Vec<(usize, usize)> = label_runs(&mask)
            .into_iter()
            .filter(|&(start, stop)| (stop - start) as f64 > min_len)
            .collect();

        let source = if self.config.syls_filtered {
            filtered.as_slice()
        } else {
            waveform.samples()
        };
        let clips = ranges
            .iter()
            .map(|&(start, stop)| SyllableClip::new(start, stop, rate, source[start..stop].to_vec()))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Segmented {} samples at {} Hz: threshold {:.3}, {} syllables",
            waveform.len(),
            rate,
            thresh,
            clips.len()
        );

        Ok(Segmentation {
            clips,
            ranges,
            threshold: thresh,
        })
    }

    /// Load and segment one WAV file
    pub fn segment_wav<P: AsRef<Path>>(&self, path: P) -> Result<SyllablesFromWav> {
        let path = path.as_ref();
        let waveform = Waveform::from_wav(path)?;
        let segmentation = self.segment(&waveform)?;

        Ok(SyllablesFromWav {
            segmentation,
            wav_path: path.to_path_buf(),
            sample_rate: waveform.sample_rate(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    /// Tone bursts at 3 kHz separated by silence
    fn bursts(rate: u32, bursts: &[(f64, f64)], total_secs: f64) -> Waveform {
        let n = (total_secs * rate as f64) as usize;
        let mut samples = vec![0.0; n];
        for &(on, off) in bursts {
            let start = (on * rate as f64) as usize;
            let stop = (off * rate as f64) as usize;
            for (i, s) in samples[start..stop].iter_mut().enumerate() {
                *s = 8000.0 * (2.0 * PI * 3000.0 * i as f64 / rate as f64).sin();
            }
        }
        Waveform::new(rate, samples).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = SegmentConfig::default();
        assert_eq!(config.smooth_window_ms, 10.0);
        assert_eq!(config.min_syl_dur_ms, 10.0);
        assert_eq!(config.threshold, ThresholdPolicy::HalfOtsu);
        assert_eq!(config.pad_width, 512);
        assert!(!config.syls_filtered);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(SegmentConfig::default().smooth_window(0.0).validate().is_err());
        assert!(SegmentConfig::default().min_syl_dur(-1.0).validate().is_err());
        assert!(SegmentConfig::default().pad_width(0).validate().is_err());
        assert!(SegmentConfig::default()
            .threshold(ThresholdPolicy::Explicit(f64::NAN))
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_threshold_forms() {
        let config: SegmentConfig = from_json(r#"{"threshold": "half-average"}"#);
        assert_eq!(config.threshold, ThresholdPolicy::HalfAverage);
        let config: SegmentConfig = from_json(r#"{"threshold": 120}"#);
        assert_eq!(config.threshold, ThresholdPolicy::Explicit(120.0));
    }

    fn from_json(json: &str) -> SegmentConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_finds_bursts() {
        let wav = bursts(32000, &[(0.1, 0.2), (0.5, 0.58)], 1.0);
        let segmenter = Segmenter::new(SegmentConfig::default()).unwrap();
        let seg = segmenter.segment(&wav).unwrap();

        assert_eq!(seg.len(), 2);
        assert!(seg.threshold > 0.0);
        for (clip, &(start, stop)) in seg.clips.iter().zip(&seg.ranges) {
            assert_eq!(clip.start, start);
            assert_eq!(clip.stop, stop);
            assert_eq!(clip.len(), stop - start);
            assert_eq!(clip.samples(), &wav.samples()[start..stop]);
        }
        // padding widens each burst by about half the pad window on each side
        let (start, stop) = seg.ranges[0];
        assert!(start < 3200 && start > 3200 - 600, "start={}", start);
        assert!(stop > 6400 && stop < 6400 + 600, "stop={}", stop);
    }

    #[test]
    fn test_silence_yields_no_clips() {
        let wav = Waveform::new(32000, vec![0.0; 32000]).unwrap();
        let segmenter = Segmenter::new(SegmentConfig::default()).unwrap();
        let seg = segmenter.segment(&wav).unwrap();
        assert!(seg.is_empty());
        assert!(seg.ranges.is_empty());
    }

    #[test]
    fn test_too_short_is_error() {
        let wav = Waveform::new(32000, vec![1.0; 10]).unwrap();
        let segmenter = Segmenter::new(SegmentConfig::default()).unwrap();
        assert!(matches!(
            segmenter.segment(&wav),
            Err(AudioError::Segmentation(_))
        ));

        // Long enough to filter, shorter than the 320-sample boxcar
        let wav = Waveform::new(32000, vec![1.0; 100]).unwrap();
        assert!(matches!(
            segmenter.segment(&wav),
            Err(AudioError::Segmentation(_))
        ));
    }

    #[test]
    fn test_filtered_clips() {
        let wav = bursts(32000, &[(0.1, 0.2)], 0.5);
        let segmenter =
            Segmenter::new(SegmentConfig::default().syls_filtered(true)).unwrap();
        let seg = segmenter.segment(&wav).unwrap();
        assert_eq!(seg.len(), 1);
        let (start, stop) = seg.ranges[0];
        // filtered samples differ from the raw ones
        assert_ne!(seg.clips[0].samples(), &wav.samples()[start..stop]);
    }
}
