use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ─── Persisted config ────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Executable to attach to; empty picks the first running client.
    pub process_name: String,
    pub poll_interval_ms: u64,
    pub log_level: String,
    /// Include the full combatant list in each printed snapshot.
    pub print_combatants: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            process_name: String::new(),
            poll_interval_ms: 1000,
            log_level: "info".into(),
            print_combatants: false,
        }
    }
}

pub fn config_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl ProbeConfig {
    pub fn load() -> Self {
        let path = config_dir().join("enmity-probe.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                info!("Loaded config from {}", path.display());
                Self::parse(&content)
            }
            Err(_) => {
                info!("No config file found, creating default config");
                let config = Self::default();
                config.save();
                config
            }
        }
    }

    fn parse(content: &str) -> Self {
        toml::from_str(content).unwrap_or_else(|e| {
            error!("Invalid config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn save(&self) {
        let path = config_dir().join("enmity-probe.toml");
        match toml::to_string_pretty(self) {
            Ok(content) => {
                if let Err(e) = std::fs::write(&path, content) {
                    error!("Failed to save config: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize config: {}", e),
        }
    }

    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = ProbeConfig::parse("poll_interval_ms = 250\n");
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.process_name, "");
        assert_eq!(config.log_level, "info");
        assert!(!config.print_combatants);
    }

    #[test]
    fn test_invalid_toml_falls_back() {
        assert_eq!(ProbeConfig::parse("poll_interval_ms = \"fast\""), ProbeConfig::default());
    }

    #[test]
    fn test_level_filter() {
        let mut config = ProbeConfig::default();
        config.log_level = "debug".into();
        assert_eq!(config.level_filter(), log::LevelFilter::Debug);
        config.log_level = "loud".into();
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = ProbeConfig {
            process_name: "ffxiv_dx11.exe".into(),
            poll_interval_ms: 500,
            log_level: "trace".into(),
            print_combatants: true,
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(ProbeConfig::parse(&text), config);
    }
}
