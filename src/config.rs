use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_main_timeout_ms")]
    pub main_timeout_ms: u64,

    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    #[serde(default)]
    pub election_policy: ElectionPolicy,

    #[serde(default = "default_canvas_width")]
    pub canvas_width: u32,

    #[serde(default = "default_canvas_height")]
    pub canvas_height: u32,

    #[serde(default = "default_color")]
    pub default_color: String,

    /// Number of peers the demo binary starts on the shared bus
    #[serde(default = "default_demo_peers")]
    pub demo_peers: usize,
}

/// How a MAIN peer reacts to a competing leadership claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ElectionPolicy {
    /// Step down whenever another peer announces itself as MAIN
    #[default]
    YieldToNewest,
    /// Of two competing claimants, the lexicographically smaller id keeps MAIN
    LowestIdWins,
}

impl std::fmt::Display for ElectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionPolicy::YieldToNewest => write!(f, "yield_to_newest"),
            ElectionPolicy::LowestIdWins => write!(f, "lowest_id_wins"),
        }
    }
}

/// Timer settings used by a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub heartbeat_interval: Duration,
    pub main_timeout: Duration,
    pub startup_grace: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Config::default().timing()
    }
}

impl Timing {
    /// Heartbeats must tick, and MAIN must get more than one period before
    /// followers give up on it
    pub fn validate(&self) -> AppResult<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(AppError::invalid_value(
                "heartbeat_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.main_timeout <= self.heartbeat_interval {
            return Err(AppError::invalid_value(
                "main_timeout_ms",
                "must be longer than heartbeat_interval_ms",
            ));
        }
        Ok(())
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    500
}

fn default_main_timeout_ms() -> u64 {
    2000
}

fn default_startup_grace_ms() -> u64 {
    500
}

fn default_channel_name() -> String {
    "figures_sync".to_string()
}

fn default_canvas_width() -> u32 {
    800
}

fn default_canvas_height() -> u32 {
    600
}

fn default_color() -> String {
    "#FF0000".to_string()
}

fn default_demo_peers() -> usize {
    3
}

impl Config {
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let settings: Config = config.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration in environment, using defaults: {}", e);
            Config::default()
        });

        Ok(settings.with_valid_timing())
    }

    /// Replace inconsistent timer settings with the defaults
    pub fn with_valid_timing(self) -> Self {
        if let Err(e) = self.timing().validate() {
            tracing::warn!("Invalid timings in environment, using defaults: {}", e);
            return Self {
                heartbeat_interval_ms: default_heartbeat_interval_ms(),
                main_timeout_ms: default_main_timeout_ms(),
                startup_grace_ms: default_startup_grace_ms(),
                ..self
            };
        }
        self
    }

    pub fn timing(&self) -> Timing {
        Timing {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            main_timeout: Duration::from_millis(self.main_timeout_ms),
            startup_grace: Duration::from_millis(self.startup_grace_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            main_timeout_ms: default_main_timeout_ms(),
            startup_grace_ms: default_startup_grace_ms(),
            channel_name: default_channel_name(),
            election_policy: ElectionPolicy::default(),
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            default_color: default_color(),
            demo_peers: default_demo_peers(),
        }
    }
}
