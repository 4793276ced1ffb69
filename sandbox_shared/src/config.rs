//! Configuration system.
//!
//! Loads server configuration from JSON strings/files (file IO left to app).

use serde::{Deserialize, Serialize};

use crate::clock::DEFAULT_MAX_CATCH_UP;

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Fixed simulation tick rate.
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    /// Snapshot broadcast rate; decoupled from the simulation rate.
    #[serde(default = "default_net_tick_hz")]
    pub net_tick_hz: u32,
    /// Maximum broadcast ticks fired per iteration after a stall.
    #[serde(default = "default_max_catch_up")]
    pub max_catch_up: u32,
    /// Path to the mods directory.
    #[serde(default = "default_mods_dir")]
    pub mods_dir: String,
}

fn default_tick_hz() -> u32 {
    60
}

fn default_net_tick_hz() -> u32 {
    32
}

fn default_max_catch_up() -> u32 {
    DEFAULT_MAX_CATCH_UP
}

fn default_mods_dir() -> String {
    "mods".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: default_tick_hz(),
            net_tick_hz: default_net_tick_hz(),
            max_catch_up: default_max_catch_up(),
            mods_dir: default_mods_dir(),
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_fields_take_defaults() {
        let cfg = ServerConfig::from_json_str(r#"{"server_addr":"0.0.0.0:9"}"#).unwrap();
        assert_eq!(cfg.server_addr, "0.0.0.0:9");
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.net_tick_hz, 32);
        assert_eq!(cfg.mods_dir, "mods");
    }
}
