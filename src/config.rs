//! Configuration types for dark-mode conversion jobs.
//!
//! All job behaviour is controlled through [`JobConfig`], built via its
//! [`JobConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share configs across tasks, serialise them for logging, and diff two
//! runs to understand why their outputs differ.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::UmbraError;

/// Upper bound on the worker pool regardless of core count.
pub const MAX_WORKERS: usize = 16;

/// Configuration for one conversion job.
///
/// Built via [`JobConfig::builder()`] or [`JobConfig::default()`].
///
/// # Example
/// ```rust
/// use umbra_pdf::{JobConfig, ResolutionTier};
///
/// let config = JobConfig::builder()
///     .resolution(ResolutionTier::Medium)
///     .workers(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Rasterisation resolution tier. Default: [`ResolutionTier::Low`].
    pub resolution: ResolutionTier,

    /// Worker concurrency limit, which is also the batch size. Default:
    /// `min(available cores, 16)`.
    ///
    /// One limit serves both stages: the transform stage fans batches out
    /// across runtime worker threads, the reassembly stage across
    /// lightweight tasks. Raising it past the core count buys nothing for
    /// the pixel loop and only widens the I/O fan-out.
    pub workers: usize,

    /// Lifetime of the presigned URLs handed back to the caller.
    /// Default: one hour.
    pub presign_ttl: Duration,

    /// How long the first-page preview outlives the job before its
    /// deferred deletion fires. Default: one hour.
    pub preview_retention: Duration,

    /// Interval of the full-store sweep. Default: one hour.
    pub sweep_interval: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            resolution: ResolutionTier::Low,
            workers: default_workers(),
            presign_ttl: Duration::from_secs(3600),
            preview_retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }

    /// Rasterisation DPI for the configured tier.
    pub fn dpi(&self) -> u32 {
        self.resolution.dpi()
    }
}

/// `min(available cores, 16)`.
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

/// Builder for [`JobConfig`].
#[derive(Debug)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn resolution(mut self, tier: ResolutionTier) -> Self {
        self.config.resolution = tier;
        self
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.config.workers = n;
        self
    }

    pub fn presign_ttl(mut self, ttl: Duration) -> Self {
        self.config.presign_ttl = ttl;
        self
    }

    pub fn preview_retention(mut self, retention: Duration) -> Self {
        self.config.preview_retention = retention;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, UmbraError> {
        let c = &self.config;
        if c.workers == 0 {
            return Err(UmbraError::InvalidConfig("workers must be ≥ 1".into()));
        }
        if c.presign_ttl.is_zero() {
            return Err(UmbraError::InvalidConfig(
                "presign TTL must be non-zero".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Rasterisation quality, mapped to fixed DPI values.
///
/// Three tiers exist because DPI trades directly against page-image size
/// and transform time: a 900-DPI A4 page is a ~70-megapixel raster. Low is
/// plenty for on-screen reading; High is for print-quality output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    /// 300 DPI. (default)
    #[default]
    Low,
    /// 600 DPI.
    Medium,
    /// 900 DPI.
    High,
}

impl ResolutionTier {
    /// The DPI this tier rasterises at.
    pub fn dpi(self) -> u32 {
        match self {
            ResolutionTier::Low => 300,
            ResolutionTier::Medium => 600,
            ResolutionTier::High => 900,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let c = JobConfig::default();
        assert!(c.workers >= 1);
        assert!(c.workers <= MAX_WORKERS);
        assert_eq!(c.dpi(), 300);
    }

    #[test]
    fn tier_dpi_mapping() {
        assert_eq!(ResolutionTier::Low.dpi(), 300);
        assert_eq!(ResolutionTier::Medium.dpi(), 600);
        assert_eq!(ResolutionTier::High.dpi(), 900);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = JobConfig::builder().workers(0).build().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn builder_sets_fields() {
        let c = JobConfig::builder()
            .resolution(ResolutionTier::High)
            .workers(4)
            .preview_retention(Duration::from_secs(120))
            .build()
            .unwrap();
        assert_eq!(c.dpi(), 900);
        assert_eq!(c.workers, 4);
        assert_eq!(c.preview_retention, Duration::from_secs(120));
    }
}
