//! Songdkl Audio
//!
//! Birdsong loading and syllable segmentation.
//!
//! ## Features
//!
//! - Mono WAV loading at native integer scale via hound
//! - Elliptic high-pass design and zero-phase forward-backward filtering
//! - Smoothed rectified amplitude envelope
//! - Otsu, mean-based or fixed envelope thresholds
//! - Gap bridging and run labeling into `[start, stop)` sample ranges
//!
//! ## Architecture
//!
//! ```text
//! WAV file (hound)
//!   │
//!   ├─> Waveform (rate + samples)
//!   │     │
//!   │     ├─> IirFilter::song_highpass -> filtfilt
//!   │     │
//!   │     └─> envelope: smooth_rectify -> ThresholdPolicy -> pad_gaps -> label_runs
//!   │
//!   └─> Segmenter -> Segmentation { clips, ranges, threshold }
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use songdkl_audio::{SegmentConfig, Segmenter, ThresholdPolicy};
//!
//! let config = SegmentConfig::default().threshold(ThresholdPolicy::HalfAverage);
//! let segmenter = Segmenter::new(config)?;
//! let syllables = segmenter.segment_wav("bird/song_001.wav")?;
//! println!("{} syllables", syllables.segmentation.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod elliptic;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod segment;
pub mod waveform;

pub use envelope::ThresholdPolicy;
pub use error::{AudioError, Result};
pub use filter::IirFilter;
pub use segment::{SegmentConfig, Segmentation, Segmenter, SyllablesFromWav};
pub use waveform::{SyllableClip, Waveform};
