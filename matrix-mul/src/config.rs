//! Run configuration shared by every rank.

use clap::ValueEnum;

pub const DEFAULT_N: usize = 200;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_DISPLAY_THRESHOLD: usize = 20;
pub const DEFAULT_VERIFY_LIMIT: usize = 200;

/// When the coordinator recomputes the sequential product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerifyMode {
    /// Verify when N is at most the verify limit.
    Auto,
    Always,
    Never,
}

/// How a rank computes its local block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMode {
    Sequential,
    /// Rows of the local block are spread over the rayon pool.
    Parallel,
}

/// Everything a run needs besides the communicator.
///
/// Built once per run and cloned to every rank, so N has a single source.
/// The process count always comes from the communicator.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub n: usize,
    pub seed: u64,
    pub display_threshold: usize,
    pub verify: VerifyMode,
    pub verify_limit: usize,
    pub compute: ComputeMode,
}

impl RunConfig {
    pub fn with_n(n: usize) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    pub fn should_verify(&self) -> bool {
        match self.verify {
            VerifyMode::Auto => self.n <= self.verify_limit,
            VerifyMode::Always => true,
            VerifyMode::Never => false,
        }
    }

    pub fn should_display(&self) -> bool {
        self.n <= self.display_threshold
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n: DEFAULT_N,
            seed: DEFAULT_SEED,
            display_threshold: DEFAULT_DISPLAY_THRESHOLD,
            verify: VerifyMode::Auto,
            verify_limit: DEFAULT_VERIFY_LIMIT,
            compute: ComputeMode::Sequential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_verification_is_capped() {
        let mut config = RunConfig::with_n(DEFAULT_VERIFY_LIMIT);
        assert!(config.should_verify());
        config.n += 1;
        assert!(!config.should_verify());
        config.verify = VerifyMode::Always;
        assert!(config.should_verify());
    }

    #[test]
    fn small_runs_are_displayed() {
        assert!(RunConfig::with_n(4).should_display());
        assert!(!RunConfig::default().should_display());
    }
}
