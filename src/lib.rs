//! PEDI-AIR companion service core library
//!
//! Vitals simulation, triage, caregiver chat and the advice gateway, plus the
//! HTTP API that exposes them.

pub mod api;
pub mod core;
pub mod models;
pub mod telemetry;

/// Application configuration
pub mod config {
    use std::time::Duration;

    use serde::Deserialize;

    use crate::core::simulator::{SimulationMode, SimulatorTiming};
    use crate::core::triage::TriagePolicy;

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(default)]
    pub struct Config {
        pub server: ServerConfig,
        pub simulator: SimulatorConfig,
        pub triage: TriagePolicy,
        pub advice: AdviceConfig,
        pub logging: LoggingConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
    }

    impl Default for ServerConfig {
        fn default() -> Self {
            Self {
                host: "127.0.0.1".to_string(),
                port: 5174,
            }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct SimulatorConfig {
        pub danger_interval_ms: u64,
        pub safe_interval_ms: u64,
        pub initial_mode: SimulationMode,
    }

    impl Default for SimulatorConfig {
        fn default() -> Self {
            let timing = SimulatorTiming::default();
            Self {
                danger_interval_ms: timing.danger.as_millis() as u64,
                safe_interval_ms: timing.safe.as_millis() as u64,
                initial_mode: SimulationMode::Danger,
            }
        }
    }

    impl SimulatorConfig {
        pub fn validate(&self) -> Result<(), config::ConfigError> {
            if self.danger_interval_ms == 0 || self.safe_interval_ms == 0 {
                return Err(config::ConfigError::Message(
                    "simulator intervals must be at least 1 ms".to_string(),
                ));
            }
            Ok(())
        }

        pub fn timing(&self) -> SimulatorTiming {
            SimulatorTiming {
                danger: Duration::from_millis(self.danger_interval_ms),
                safe: Duration::from_millis(self.safe_interval_ms),
            }
        }
    }

    #[derive(Clone, Deserialize)]
    #[serde(default)]
    pub struct AdviceConfig {
        pub api_key: Option<String>,
        pub base_url: String,
        pub model: String,
        pub timeout_secs: u64,
        pub temperature: f32,
    }

    impl Default for AdviceConfig {
        fn default() -> Self {
            Self {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4.1-mini".to_string(),
                timeout_secs: 20,
                temperature: 0.3,
            }
        }
    }

    impl AdviceConfig {
        /// Configured key, else `OPENAI_API_KEY`.
        pub fn resolved_api_key(&self) -> Option<String> {
            self.api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .filter(|key| !key.trim().is_empty())
        }

        pub fn timeout(&self) -> Duration {
            Duration::from_secs(self.timeout_secs)
        }
    }

    // Hand-written so the credential never ends up in logs.
    impl std::fmt::Debug for AdviceConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("AdviceConfig")
                .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
                .field("base_url", &self.base_url)
                .field("model", &self.model)
                .field("timeout_secs", &self.timeout_secs)
                .field("temperature", &self.temperature)
                .finish()
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(default)]
    pub struct LoggingConfig {
        pub filter: String,
        pub json: bool,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                filter: "info".to_string(),
                json: false,
            }
        }
    }

    /// Load configuration from file
    pub fn load_config() -> Result<Config, config::ConfigError> {
        let env = std::env::var("PEDIAIR_ENV").unwrap_or_else(|_| "development".into());

        let settings = config::Config::builder()
            // Start with default settings
            .add_source(config::File::with_name("config/default").required(false))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables
            .add_source(config::Environment::with_prefix("PEDIAIR").separator("__"))
            .build()?
            .try_deserialize::<Config>()?;

        settings.simulator.validate()?;
        Ok(settings)
    }

}
