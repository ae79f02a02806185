// Server settings from TRANSIT_* environment variables.

use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub gtfs_dir: PathBuf,
    pub seed_occupancy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8000,
            gtfs_dir: PathBuf::from("gtfs"),
            seed_occupancy: true,
        }
    }
}

impl ServerConfig {
    pub const BIND_ADDR_VAR: &'static str = "TRANSIT_BIND_ADDR";
    pub const PORT_VAR: &'static str = "TRANSIT_PORT";
    pub const GTFS_DIR_VAR: &'static str = "TRANSIT_GTFS_DIR";
    pub const SEED_VAR: &'static str = "TRANSIT_SEED_OCCUPANCY";

    /// Reads the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset or unparsable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        ServerConfig {
            bind_addr: lookup(Self::BIND_ADDR_VAR)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.bind_addr),
            port: parse_or(&lookup, Self::PORT_VAR, defaults.port),
            gtfs_dir: lookup(Self::GTFS_DIR_VAR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.gtfs_dir),
            seed_occupancy: lookup(Self::SEED_VAR)
                .map(|v| parse_flag(&v, defaults.seed_occupancy))
                .unwrap_or(defaults.seed_occupancy),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  {}='{}' is invalid, using {}", key, raw, default);
            default
        }),
    }
}

fn parse_flag(raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config_from(&[]), ServerConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = config_from(&[
            ("TRANSIT_BIND_ADDR", "127.0.0.1"),
            ("TRANSIT_PORT", "9090"),
            ("TRANSIT_GTFS_DIR", "/data/gtfs"),
            ("TRANSIT_SEED_OCCUPANCY", "false"),
        ]);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.gtfs_dir, PathBuf::from("/data/gtfs"));
        assert!(!config.seed_occupancy);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = config_from(&[
            ("TRANSIT_PORT", "eighty"),
            ("TRANSIT_SEED_OCCUPANCY", "maybe"),
            ("TRANSIT_BIND_ADDR", "  "),
        ]);
        assert_eq!(config.port, 8000);
        assert!(config.seed_occupancy);
        assert_eq!(config.bind_addr, "0.0.0.0");
    }
}
