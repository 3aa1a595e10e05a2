//! Command-line arguments

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use songdkl::{BasisPolicy, CovarianceType, PipelineConfig, ThresholdPolicy};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(name = "songdkl")]
#[command(about = "Birdsong similarity by Kullback-Leibler divergence of syllable mixtures")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Song D(KL) between two birds
    Calculate {
        /// Reference bird: WAV directory or saved feature store
        path1: PathBuf,

        /// Comparison bird: WAV directory or saved feature store
        path2: PathBuf,

        /// Mixture components for the reference bird
        n_syl1: usize,

        /// Mixture components for the comparison bird
        n_syl2: usize,

        #[command(flatten)]
        common: CommonArgs,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Estimate how many syllable types a bird sings
    Numsyls {
        /// WAV directory or saved feature store
        path: PathBuf,

        #[command(flatten)]
        common: CommonArgs,

        /// Smallest component count tried
        #[arg(long)]
        min_components: Option<usize>,

        /// Component count the sweep stops before
        #[arg(long)]
        max_components: Option<usize>,

        /// Folds for held-out BIC; 1 scores on the training data
        #[arg(long)]
        n_splits: Option<usize>,

        /// Feature vectors computed per syllable
        #[arg(long)]
        psds_per_syl: Option<usize>,

        /// Print the full result, including the BIC curve, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Segment and featurize directories, saving features and annotations
    Prep {
        /// WAV directories
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Where to save; one shared directory or one per input (default: the input)
        #[arg(short, long, num_args = 1..)]
        output_dir: Vec<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options every subcommand accepts
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// TOML config file (default: <config dir>/songdkl/config.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum WAV files read per directory
    #[arg(long)]
    pub max_wavs: Option<usize>,

    /// Maximum feature vectors kept per bird
    #[arg(long)]
    pub max_num_psds: Option<usize>,

    /// Basis set size
    #[arg(long)]
    pub n_basis: Option<usize>,

    /// Basis selection: first or random
    #[arg(long)]
    pub basis: Option<BasisPolicy>,

    /// Segmentation threshold: half-otsu, half-average or a number
    #[arg(long)]
    pub threshold: Option<ThresholdPolicy>,

    /// Mixture covariance: full, tied, diag or spherical
    #[arg(long)]
    pub covariance_type: Option<CovarianceType>,

    /// Seed for random basis selection and mixture initialization
    #[arg(long)]
    pub seed: Option<u64>,
}

impl CommonArgs {
    /// Overlay the flags that were given onto `config`
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(n) = self.max_wavs {
            config.max_wavs = n;
        }
        if let Some(n) = self.max_num_psds {
            config.max_num_psds = n;
        }
        if let Some(n) = self.n_basis {
            config.n_basis = n;
        }
        if let Some(basis) = self.basis {
            config.basis = basis;
        }
        if let Some(threshold) = self.threshold {
            config.segment.threshold = threshold;
        }
        if let Some(covariance_type) = self.covariance_type {
            config.gmm.covariance_type = covariance_type;
        }
        if let Some(seed) = self.seed {
            config.basis_seed = Some(seed);
            config.gmm.random_state = seed;
        }
        config
    }
}

/// Overlay the `numsyls`-only flags
pub fn apply_sweep(
    mut config: PipelineConfig,
    min_components: Option<usize>,
    max_components: Option<usize>,
    n_splits: Option<usize>,
    psds_per_syl: Option<usize>,
) -> PipelineConfig {
    if let Some(n) = min_components {
        config.min_components = n;
    }
    if let Some(n) = max_components {
        config.max_components = n;
    }
    if let Some(n) = n_splits {
        config.n_splits = n;
    }
    if let Some(n) = psds_per_syl {
        config.features.psds_per_syl = n;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_calculate() {
        let cli = Cli::try_parse_from([
            "songdkl", "calculate", "tutor", "pupil", "9", "7", "--n-basis", "30", "--basis",
            "random", "--seed", "3", "-v",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), Level::DEBUG);

        let Command::Calculate { path1, path2, n_syl1, n_syl2, common, json } = cli.command else {
            panic!("expected calculate");
        };
        assert_eq!(path1, PathBuf::from("tutor"));
        assert_eq!(path2, PathBuf::from("pupil"));
        assert_eq!((n_syl1, n_syl2), (9, 7));
        assert!(!json);

        let config = common.apply(PipelineConfig::default());
        assert_eq!(config.n_basis, 30);
        assert_eq!(config.basis, BasisPolicy::Random);
        assert_eq!(config.basis_seed, Some(3));
        assert_eq!(config.gmm.random_state, 3);
    }

    #[test]
    fn test_parse_numsyls_sweep() {
        let cli = Cli::try_parse_from([
            "songdkl",
            "numsyls",
            "bird",
            "--min-components",
            "3",
            "--max-components",
            "12",
            "--n-splits",
            "2",
            "--psds-per-syl",
            "2",
            "--threshold",
            "half-average",
            "--covariance-type",
            "diag",
        ])
        .unwrap();

        let Command::Numsyls {
            common,
            min_components,
            max_components,
            n_splits,
            psds_per_syl,
            ..
        } = cli.command
        else {
            panic!("expected numsyls");
        };
        let config = apply_sweep(
            common.apply(PipelineConfig::default()),
            min_components,
            max_components,
            n_splits,
            psds_per_syl,
        );
        assert_eq!((config.min_components, config.max_components), (3, 12));
        assert_eq!(config.n_splits, 2);
        assert_eq!(config.features.psds_per_syl, 2);
        assert_eq!(config.segment.threshold, ThresholdPolicy::HalfAverage);
        assert_eq!(config.gmm.covariance_type, CovarianceType::Diag);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_prep_outputs() {
        let cli =
            Cli::try_parse_from(["songdkl", "prep", "a", "b", "--output-dir", "x", "y", "-q"])
                .unwrap();
        assert_eq!(cli.log_level(), Level::ERROR);
        let Command::Prep { dirs, output_dir, .. } = cli.command else {
            panic!("expected prep");
        };
        assert_eq!(dirs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(output_dir, vec![PathBuf::from("x"), PathBuf::from("y")]);
    }

    #[test]
    fn test_unset_flags_keep_file_values() {
        let file = PipelineConfig::default().n_basis(12).max_wavs(3);
        let config = CommonArgs::default().apply(file.clone());
        assert_eq!(config, file);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(Cli::try_parse_from(["songdkl", "numsyls", "bird", "--basis", "middle"]).is_err());
        assert!(
            Cli::try_parse_from(["songdkl", "numsyls", "bird", "--covariance-type", "banded"])
                .is_err()
        );
        assert!(Cli::try_parse_from(["songdkl", "numsyls", "bird", "--threshold", "-2"]).is_err());
        assert!(Cli::try_parse_from(["songdkl", "calculate", "a", "b", "x", "3"]).is_err());
        assert!(Cli::try_parse_from(["songdkl", "prep"]).is_err());
    }
}
