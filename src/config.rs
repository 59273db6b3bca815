#[cfg(feature = "cli")]
use clap::Parser;
use std::time::Duration;

/// # Channel Router Configuration
///
/// Configuration read from command-line arguments, environment variables
/// and an optional `.env` file.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "channel-router"))]
#[cfg_attr(feature = "cli", command(about = "Priority-tiered weighted channel routing for an LLM API gateway"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // CHANNEL CACHE
    // =============================================================================

    /// Keep channels in an in-memory routing index; when off every lookup goes to the store
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "MEMORY_CACHE_ENABLED", default_value = "true", action = clap::ArgAction::Set)
    )]
    pub memory_cache_enabled: bool,

    /// Seconds between full reloads of the routing index
    #[cfg_attr(feature = "cli", arg(long, env = "SYNC_FREQUENCY", default_value = "60"))]
    pub sync_frequency: u64,

    /// JSON file holding the channel and ability snapshot
    #[cfg_attr(feature = "cli", arg(long, env = "CHANNEL_STORE_PATH", default_value = "channels.json"))]
    pub store_path: String,

    // =============================================================================
    // ONE-SHOT PICK
    // =============================================================================

    /// Group to pick a channel for (requires --model); the process exits after printing it
    #[cfg_attr(feature = "cli", arg(long, requires = "model"))]
    pub group: Option<String>,

    /// Model to pick a channel for
    #[cfg_attr(feature = "cli", arg(long, requires = "group"))]
    pub model: Option<String>,

    /// Number of failed attempts so far, selects the failover tier
    #[cfg_attr(feature = "cli", arg(long, default_value = "0"))]
    pub retry: usize,

    // =============================================================================
    // LOGGING
    // =============================================================================

    /// Log level (error, warn, info, debug, trace)
    #[cfg_attr(feature = "cli", arg(long, env = "RUST_LOG", default_value = "info"))]
    pub log_level: String,

    /// Environment (development, staging, production)
    #[cfg_attr(feature = "cli", arg(long, env = "ENVIRONMENT", default_value = "development"))]
    pub environment: String,
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` if present, parses arguments, sets up logging and exits
    /// the process with a message when validation fails.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();

        let config = Self::parse();

        config.setup_logging();

        if let Err(err) = config.validate() {
            eprintln!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with the cache on and a one-minute sync.
    pub fn for_test() -> Self {
        Self {
            memory_cache_enabled: true,
            sync_frequency: 60,
            store_path: "channels.json".to_string(),
            group: None,
            model: None,
            retry: 0,
            log_level: "info".to_string(),
            environment: "development".to_string(),
        }
    }

    /// Interval between routing index rebuilds.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_frequency)
    }

    /// The (group, model, retry) triple when a one-shot pick was requested.
    pub fn pick_request(&self) -> Option<(&str, &str, usize)> {
        match (&self.group, &self.model) {
            (Some(group), Some(model)) => Some((group.as_str(), model.as_str(), self.retry)),
            _ => None,
        }
    }

    /// Filter directives: the configured level for this crate, `warn` for
    /// everything else.
    pub fn log_filter(&self) -> String {
        format!("warn,channel_router={}", self.log_level)
    }

    #[cfg(feature = "cli")]
    fn setup_logging(&self) {
        let filter = tracing_subscriber::EnvFilter::new(self.log_filter());
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Validate configuration values and provide helpful error messages.
    ///
    /// Hard errors are returned; questionable but usable values only print a
    /// warning.
    pub fn validate(&self) -> Result<(), String> {
        if self.sync_frequency == 0 {
            return Err("Sync frequency must be greater than 0 seconds.".to_string());
        }
        if self.sync_frequency < 5 {
            eprintln!(
                "⚠️  Warning: Sync frequency of {} seconds reloads every channel very often. \
                Consider 30-300 seconds unless the store is cheap to read.",
                self.sync_frequency
            );
        }

        if self.store_path.trim().is_empty() {
            return Err("Channel store path cannot be empty. Please specify a JSON snapshot file.".to_string());
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.environment.as_str()) {
            return Err(format!(
                "Invalid environment '{}'. Valid options are: {}",
                self.environment,
                valid_environments.join(", ")
            ));
        }

        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log level '{}'. Valid options are: {}",
                self.log_level,
                valid_log_levels.join(", ")
            ));
        }

        if self.environment == "production" {
            if !self.memory_cache_enabled {
                eprintln!(
                    "⚠️  Warning: Memory cache is disabled in production. \
                    Every channel pick will read the whole store."
                );
            }
            if self.log_level == "debug" || self.log_level == "trace" {
                eprintln!(
                    "⚠️  Warning: Using debug/trace logging in production logs every channel lookup."
                );
            }
        }

        if self.group.is_some() != self.model.is_some() {
            return Err("--group and --model must be given together.".to_string());
        }

        Ok(())
    }
}
