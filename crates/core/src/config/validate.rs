use super::{types::Config, ConfigError};
use crate::sequencer::{ImageNaming, MAX_CONFLICT_RETRIES};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Sequencer timeout and batch size are positive
/// - Conflict retries stay within the hard ceiling
/// - Templated image naming has a base URL
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let sequencer = &config.sequencer;

    if sequencer.store_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "sequencer.store_timeout_ms must be greater than 0".to_string(),
        ));
    }

    if sequencer.max_conflict_retries > MAX_CONFLICT_RETRIES {
        return Err(ConfigError::ValidationError(format!(
            "sequencer.max_conflict_retries cannot exceed {} (got {})",
            MAX_CONFLICT_RETRIES, sequencer.max_conflict_retries
        )));
    }

    if sequencer.max_batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "sequencer.max_batch_size must be greater than 0".to_string(),
        ));
    }

    if let ImageNaming::Templated { base_url } = &sequencer.image_naming {
        if base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "sequencer.image_naming.base_url cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ServerConfig};
    use crate::sequencer::SequencerConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            database: DatabaseConfig::default(),
            sequencer: SequencerConfig::default(),
        };
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.sequencer.store_timeout_ms = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_retry_ceiling() {
        let mut config = Config::default();
        config.sequencer.max_conflict_retries = MAX_CONFLICT_RETRIES;
        assert!(validate_config(&config).is_ok());

        config.sequencer.max_conflict_retries = MAX_CONFLICT_RETRIES + 1;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_conflict_retries"));
    }

    #[test]
    fn test_validate_zero_batch_size_fails() {
        let mut config = Config::default();
        config.sequencer.max_batch_size = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_templated_naming_requires_base_url() {
        let mut config = Config::default();
        config.sequencer.image_naming = ImageNaming::Templated {
            base_url: "  ".to_string(),
        };
        assert!(validate_config(&config).is_err());

        config.sequencer.image_naming = ImageNaming::Templated {
            base_url: "https://cdn.example.com".to_string(),
        };
        assert!(validate_config(&config).is_ok());
    }
}
