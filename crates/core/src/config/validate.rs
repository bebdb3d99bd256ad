use super::{types::Config, ConfigError};
use crate::orchestrator::{MAX_DURATION_SECS, MIN_DURATION_SECS};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Durations are inside the supported clip range
/// - Intake ceiling, engine timeout, CRF and frame rate are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    check_duration("batch.default_duration_secs", config.batch.default_duration_secs)?;
    check_duration("single_shot.duration_secs", config.single_shot.duration_secs)?;

    if config.intake.max_file_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "intake.max_file_bytes cannot be 0".to_string(),
        ));
    }

    if config.engine.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.engine.crf > 51 {
        return Err(ConfigError::ValidationError(format!(
            "engine.crf must be within 0-51, got {}",
            config.engine.crf
        )));
    }

    if config.engine.fps == 0 {
        return Err(ConfigError::ValidationError(
            "engine.fps cannot be 0".to_string(),
        ));
    }

    Ok(())
}

fn check_duration(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{} must be within {}-{} seconds, got {}",
            field, MIN_DURATION_SECS, MAX_DURATION_SECS, value
        )));
    }
    Ok(())
}
