//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.download_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.download_concurrency must be > 0".into(),
            ));
        }
        if self.pipeline.resize_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.resize_concurrency must be > 0".into(),
            ));
        }
        if self.pipeline.buffer_size == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.buffer_size must be > 0".into(),
            ));
        }
        if self.limits.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.fetch_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.max_download_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_download_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.general.input_subdir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "general.input_subdir must not be empty".into(),
            ));
        }
        if self.general.output_subdir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "general.output_subdir must not be empty".into(),
            ));
        }
        if self.general.input_subdir == self.general.output_subdir {
            return Err(ConfigError::ValidationError(
                "general.input_subdir and general.output_subdir must differ".into(),
            ));
        }
        Ok(())
    }
}
