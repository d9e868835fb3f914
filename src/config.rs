//! Engine configuration: timing budgets for the async runner and rule
//! constants for the resolver. Loaded from RON with per-field defaults and
//! optionally overridden from the environment.
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl BattleConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Construct configuration from defaults plus process environment variables.
    ///
    /// Environment variables:
    /// - `PVP_TURN_TIMER_SECS` - Seconds a human side has to choose (default: 120)
    /// - `PVP_THINK_MIN_MS` - Lower bound of the AI think budget (default: 200)
    /// - `PVP_THINK_MAX_MS` - Upper bound of the AI think budget (default: 800)
    /// - `PVP_CATALOG_TTL_SECS` - Catalog cache entry lifetime (default: 300)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        if let Some(secs) = read_env::<u64>("PVP_TURN_TIMER_SECS") {
            self.timing.turn_timer = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = read_env::<u64>("PVP_THINK_MIN_MS") {
            self.timing.think_budget_min = Duration::from_millis(ms);
        }
        if let Some(ms) = read_env::<u64>("PVP_THINK_MAX_MS") {
            self.timing.think_budget_max = Duration::from_millis(ms);
        }
        if let Some(secs) = read_env::<u64>("PVP_CATALOG_TTL_SECS") {
            self.timing.catalog_ttl = Duration::from_secs(secs);
        }
        if self.timing.think_budget_max < self.timing.think_budget_min {
            self.timing.think_budget_max = self.timing.think_budget_min;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub turn_timer: Duration,
    pub think_budget_min: Duration,
    pub think_budget_max: Duration,
    pub catalog_ttl: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            turn_timer: Duration::from_secs(120),
            think_budget_min: Duration::from_millis(200),
            think_budget_max: Duration::from_millis(800),
            catalog_ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub weather_turns: u8,
    pub extended_weather_turns: u8,
    pub terrain_turns: u8,
    pub screen_turns: u8,
    pub extended_screen_turns: u8,
    pub trick_room_turns: u8,
    pub gravity_turns: u8,
    pub magic_room_turns: u8,
    pub stasis_turns: u8,
    pub tailwind_turns: u8,
    pub delayed_attack_turns: u8,
    pub wish_turns: u8,
    pub taunt_turns: u8,
    pub max_spikes_layers: u8,
    pub max_toxic_spikes_layers: u8,
    pub dynamax_turns: u8,
    pub protect_decay_enabled: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            weather_turns: 5,
            extended_weather_turns: 8,
            terrain_turns: 5,
            screen_turns: 5,
            extended_screen_turns: 8,
            trick_room_turns: 5,
            gravity_turns: 5,
            magic_room_turns: 5,
            stasis_turns: 5,
            tailwind_turns: 4,
            delayed_attack_turns: 2,
            wish_turns: 2,
            taunt_turns: 3,
            max_spikes_layers: 3,
            max_toxic_spikes_layers: 2,
            dynamax_turns: 3,
            protect_decay_enabled: true,
        }
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}
