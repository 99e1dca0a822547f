use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpriteSpawnMode {
    /// Neighborhood predicates evaluated over the whole grid.
    #[default]
    Scan,
    /// Probabilistic spawns capped by resource levels and tile counts.
    Aggregate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_day_duration_secs")]
    pub day_duration_secs: u64,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
    #[serde(default = "default_base_tile_count")]
    pub base_tile_count: usize,
    #[serde(default = "default_starting_carbon")]
    pub starting_carbon: i64,
    #[serde(default = "default_event_interval_ms")]
    pub event_interval_ms: u64,
    #[serde(default = "default_event_cooldown_ms")]
    pub event_cooldown_ms: u64,
    #[serde(default = "default_event_bootstrap_delay_ms")]
    pub event_bootstrap_delay_ms: u64,
    #[serde(default = "default_event_history_cap")]
    pub event_history_cap: usize,
    #[serde(default = "default_event_effect_scale")]
    pub event_effect_scale: f64,
    #[serde(default = "default_sprite_refresh_interval_ms")]
    pub sprite_refresh_interval_ms: u64,
    #[serde(default)]
    pub sprite_spawn_mode: SpriteSpawnMode,
    #[serde(default = "default_advisory_interval_ms")]
    pub advisory_interval_ms: u64,
    #[serde(default)]
    pub auto_respond: bool,
    #[serde(default = "default_save_directory")]
    pub save_directory: String,
    #[serde(default = "default_autosave_interval_ms")]
    pub autosave_interval_ms: u64,
    /// 0 picks a random seed at startup.
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

fn default_tick_interval_ms() -> u64 {
    1000
}
fn default_day_duration_secs() -> u64 {
    1440
}
fn default_history_cap() -> usize {
    50
}
fn default_base_tile_count() -> usize {
    7
}
fn default_starting_carbon() -> i64 {
    1000
}
fn default_event_interval_ms() -> u64 {
    60_000
}
fn default_event_cooldown_ms() -> u64 {
    30_000
}
fn default_event_bootstrap_delay_ms() -> u64 {
    5_000
}
fn default_event_history_cap() -> usize {
    50
}
fn default_event_effect_scale() -> f64 {
    1.0
}
fn default_sprite_refresh_interval_ms() -> u64 {
    30_000
}
fn default_advisory_interval_ms() -> u64 {
    60_000
}
fn default_save_directory() -> String {
    "./saves".to_string()
}
fn default_autosave_interval_ms() -> u64 {
    5_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            tick_interval_ms: default_tick_interval_ms(),
            day_duration_secs: default_day_duration_secs(),
            history_cap: default_history_cap(),
            base_tile_count: default_base_tile_count(),
            starting_carbon: default_starting_carbon(),
            event_interval_ms: default_event_interval_ms(),
            event_cooldown_ms: default_event_cooldown_ms(),
            event_bootstrap_delay_ms: default_event_bootstrap_delay_ms(),
            event_history_cap: default_event_history_cap(),
            event_effect_scale: default_event_effect_scale(),
            sprite_refresh_interval_ms: default_sprite_refresh_interval_ms(),
            sprite_spawn_mode: SpriteSpawnMode::default(),
            advisory_interval_ms: default_advisory_interval_ms(),
            auto_respond: false,
            save_directory: default_save_directory(),
            autosave_interval_ms: default_autosave_interval_ms(),
            seed: 0,
            log_level: default_log_level(),
            log_format: default_log_format(),
            catalog_path: None,
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    /// Like `from_file`, but a missing file yields the defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        let positive = [
            ("tick_interval_ms", self.tick_interval_ms, 1000),
            ("day_duration_secs", self.day_duration_secs, 1440),
            ("event_interval_ms", self.event_interval_ms, 60000),
            ("sprite_refresh_interval_ms", self.sprite_refresh_interval_ms, 30000),
            ("advisory_interval_ms", self.advisory_interval_ms, 60000),
            ("autosave_interval_ms", self.autosave_interval_ms, 5000),
        ];
        for (name, value, example) in positive {
            if value == 0 {
                errors.push(format!(
                    "{} must be > 0, got {}. Example: {} = {}",
                    name, value, name, example
                ));
            }
        }

        if self.history_cap == 0 {
            errors.push(format!(
                "history_cap must be > 0, got {}. Example: history_cap = 50",
                self.history_cap
            ));
        }

        if self.event_history_cap == 0 {
            errors.push(format!(
                "event_history_cap must be > 0, got {}. Example: event_history_cap = 50",
                self.event_history_cap
            ));
        }

        if self.base_tile_count == 0 || self.base_tile_count > 64 {
            errors.push(format!(
                "base_tile_count must be 1-64, got {}. Example: base_tile_count = 7",
                self.base_tile_count
            ));
        }

        if !self.event_effect_scale.is_finite() || self.event_effect_scale < 0.0 {
            errors.push(format!(
                "event_effect_scale must be >= 0.0, got {}. Example: event_effect_scale = 1.0",
                self.event_effect_scale
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            errors.push(format!(
                "log_format must be one of {:?}, got '{}'. Example: log_format = \"text\"",
                valid_formats, self.log_format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn test_path() -> PathBuf {
        PathBuf::from("test-config.toml")
    }

    #[test]
    fn valid_config_loads_all_fields() {
        let toml = r#"
            tick_interval_ms = 500
            day_duration_secs = 600
            history_cap = 20
            base_tile_count = 8
            starting_carbon = 2500
            event_interval_ms = 30000
            event_cooldown_ms = 10000
            event_bootstrap_delay_ms = 1000
            event_history_cap = 10
            event_effect_scale = 1.5
            sprite_refresh_interval_ms = 15000
            sprite_spawn_mode = "aggregate"
            advisory_interval_ms = 120000
            auto_respond = true
            save_directory = "./data"
            autosave_interval_ms = 2000
            seed = 42
            log_level = "debug"
            log_format = "json"
            catalog_path = "tiles.toml"
        "#;
        let config = SimulationConfig::from_toml_str(toml, &test_path()).unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.day_duration_secs, 600);
        assert_eq!(config.history_cap, 20);
        assert_eq!(config.base_tile_count, 8);
        assert_eq!(config.starting_carbon, 2500);
        assert_eq!(config.event_interval_ms, 30000);
        assert_eq!(config.event_cooldown_ms, 10000);
        assert_eq!(config.event_bootstrap_delay_ms, 1000);
        assert_eq!(config.event_history_cap, 10);
        assert_eq!(config.event_effect_scale, 1.5);
        assert_eq!(config.sprite_refresh_interval_ms, 15000);
        assert_eq!(config.sprite_spawn_mode, SpriteSpawnMode::Aggregate);
        assert_eq!(config.advisory_interval_ms, 120000);
        assert!(config.auto_respond);
        assert_eq!(config.save_directory, "./data");
        assert_eq!(config.autosave_interval_ms, 2000);
        assert_eq!(config.seed, 42);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, "json");
        assert_eq!(config.catalog_path, Some(PathBuf::from("tiles.toml")));
    }

    #[test]
    fn defaults_applied_for_empty_config() {
        let config = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.day_duration_secs, 1440);
        assert_eq!(config.history_cap, 50);
        assert_eq!(config.base_tile_count, 7);
        assert_eq!(config.starting_carbon, 1000);
        assert_eq!(config.event_interval_ms, 60000);
        assert_eq!(config.event_cooldown_ms, 30000);
        assert_eq!(config.event_bootstrap_delay_ms, 5000);
        assert_eq!(config.sprite_spawn_mode, SpriteSpawnMode::Scan);
        assert!(!config.auto_respond);
        assert_eq!(config.save_directory, "./saves");
        assert_eq!(config.log_format, "text");
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn default_impl_matches_empty_toml() {
        let parsed = SimulationConfig::from_toml_str("", &test_path()).unwrap();
        let built = SimulationConfig::default();
        assert_eq!(parsed.tick_interval_ms, built.tick_interval_ms);
        assert_eq!(parsed.history_cap, built.history_cap);
        assert_eq!(parsed.save_directory, built.save_directory);
        assert!(built.validate().is_ok());
    }

    #[test]
    fn zero_intervals_rejected() {
        let err =
            SimulationConfig::from_toml_str("tick_interval_ms = 0", &test_path()).unwrap_err();
        assert!(err.contains("tick_interval_ms"));
        assert!(err.contains("> 0"));
    }

    #[test]
    fn invalid_base_tile_count_rejected() {
        let err =
            SimulationConfig::from_toml_str("base_tile_count = 0", &test_path()).unwrap_err();
        assert!(err.contains("base_tile_count"));
    }

    #[test]
    fn invalid_log_level_rejected() {
        let err =
            SimulationConfig::from_toml_str(r#"log_level = "verbose""#, &test_path()).unwrap_err();
        assert!(err.contains("log_level"));
    }

    #[test]
    fn unknown_spawn_mode_rejected() {
        let err = SimulationConfig::from_toml_str(r#"sprite_spawn_mode = "swarm""#, &test_path())
            .unwrap_err();
        assert!(err.contains("test-config.toml"));
    }

    #[test]
    fn multiple_errors_reported_together() {
        let toml = "history_cap = 0\nday_duration_secs = 0\nevent_effect_scale = -2.0\nlog_format = \"xml\"";
        let err = SimulationConfig::from_toml_str(toml, &test_path()).unwrap_err();
        assert!(err.contains("history_cap"));
        assert!(err.contains("day_duration_secs"));
        assert!(err.contains("event_effect_scale"));
        assert!(err.contains("log_format"));
    }

    #[test]
    fn from_file_loads_valid_config() {
        let mut tmp = NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(tmp, "starting_carbon = 400").unwrap();
        let config = SimulationConfig::from_file(tmp.path()).unwrap();
        assert_eq!(config.starting_carbon, 400);
    }

    #[test]
    fn missing_file_error_or_default() {
        let missing = Path::new("/nonexistent/config.toml");
        let err = SimulationConfig::from_file(missing).unwrap_err();
        assert!(err.contains("Cannot read"));
        let config = SimulationConfig::from_file_or_default(missing).unwrap();
        assert_eq!(config.base_tile_count, 7);
    }
}
