use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::sequencer::SequencerConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sequencer: SequencerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("manga-admin.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::{ChapterTurns, ImageNaming};

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "manga-admin.db");
        assert_eq!(config.sequencer.max_conflict_retries, 1);
    }

    #[test]
    fn test_deserialize_server_section() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_deserialize_with_custom_database_path() {
        let toml = r#"
[database]
path = "/data/catalog.sqlite"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "/data/catalog.sqlite"
        );
    }

    #[test]
    fn test_deserialize_sequencer_section() {
        let toml = r#"
[sequencer]
store_timeout_ms = 2500
max_conflict_retries = 2
chapter_turns = "always"

[sequencer.image_naming]
mode = "templated"
base_url = "https://cdn.example.com/pages"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sequencer.store_timeout_ms, 2500);
        assert_eq!(config.sequencer.max_conflict_retries, 2);
        assert_eq!(config.sequencer.chapter_turns, ChapterTurns::Always);
        assert_eq!(
            config.sequencer.image_naming,
            ImageNaming::Templated {
                base_url: "https://cdn.example.com/pages".to_string()
            }
        );
    }

    #[test]
    fn test_config_serializes_to_json() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["server"]["port"], 8080);
        assert_eq!(json["sequencer"]["chapter_turns"], "auto");
        assert_eq!(json["sequencer"]["image_naming"]["mode"], "passthrough");
    }
}
