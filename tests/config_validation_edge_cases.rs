//! # Configuration Validation Edge Cases
//!
//! Boundary conditions and error messages of `Config::validate`.

#[cfg(test)]
mod tests {
    use channel_router::config::Config;
    use std::time::Duration;

    #[test]
    fn test_sync_frequency_edge_cases() {
        let mut config = Config::for_test();

        config.sync_frequency = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Sync frequency"));

        // Very short intervals only warn
        config.sync_frequency = 1;
        assert!(config.validate().is_ok());
        assert_eq!(config.sync_interval(), Duration::from_secs(1));

        for seconds in [5, 60, 300, 86_400] {
            config.sync_frequency = seconds;
            assert!(config.validate().is_ok(), "sync frequency {} should be valid", seconds);
        }
    }

    #[test]
    fn test_store_path_edge_cases() {
        let mut config = Config::for_test();

        config.store_path = "".to_string();
        assert!(config.validate().unwrap_err().contains("store path"));

        config.store_path = "   ".to_string();
        assert!(config.validate().is_err());

        config.store_path = "/var/lib/router/channels.json".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_and_log_level() {
        let mut config = Config::for_test();

        config.environment = "qa".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid environment"));

        for environment in ["development", "staging", "production"] {
            config.environment = environment.to_string();
            assert!(config.validate().is_ok(), "environment {} should be valid", environment);
        }

        config.log_level = "verbose".to_string();
        assert!(config.validate().unwrap_err().contains("Invalid log level"));

        for level in ["error", "warn", "info", "debug", "trace"] {
            config.log_level = level.to_string();
            assert!(config.validate().is_ok(), "log level {} should be valid", level);
        }
    }

    #[test]
    fn test_cache_disabled_in_production_is_allowed() {
        let mut config = Config::for_test();
        config.environment = "production".to_string();
        config.memory_cache_enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pick_arguments_must_pair() {
        let mut config = Config::for_test();

        config.group = Some("default".to_string());
        assert!(config.validate().is_err());
        assert!(config.pick_request().is_none());

        config.model = Some("gpt-4".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.pick_request(), Some(("default", "gpt-4", 0)));
    }
}
