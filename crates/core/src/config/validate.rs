use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - CRF is within the x264/x265 range (0-51)
/// - max_width and audio bitrate are not 0
/// - concurrency is at least 1
/// - extension is set and has no leading dot
/// - source and output paths differ
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let profile = &config.profile;
    if profile.crf > 51 {
        return Err(ConfigError::ValidationError(format!(
            "profile.crf must be between 0 and 51, got {}",
            profile.crf
        )));
    }

    if profile.max_width == 0 {
        return Err(ConfigError::ValidationError(
            "profile.max_width cannot be 0".to_string(),
        ));
    }

    if profile.audio_bitrate_kbps == 0 {
        return Err(ConfigError::ValidationError(
            "profile.audio_bitrate_kbps cannot be 0".to_string(),
        ));
    }

    if config.batch.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "batch.concurrency cannot be 0".to_string(),
        ));
    }

    let extension = &config.batch.extension;
    if extension.is_empty() || extension.starts_with('.') {
        return Err(ConfigError::ValidationError(
            "batch.extension must be set without a leading dot".to_string(),
        ));
    }

    if config.paths.source_dir == config.paths.output_dir {
        return Err(ConfigError::ValidationError(
            "paths.output_dir must differ from paths.source_dir".to_string(),
        ));
    }

    Ok(())
}
