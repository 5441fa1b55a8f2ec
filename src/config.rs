use crate::game::constants::{
    ARENA_HEIGHT, ARENA_WIDTH, PLAYER_TIMEOUT_SECS, READ_TIMEOUT_SECS, REAP_INTERVAL_SECS,
    TICK_MS,
};
use crate::game::types::WorldSettings;
use anyhow::bail;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub tick_ms: u64,
    pub arena_width: i32,
    pub arena_height: i32,
    pub player_timeout_secs: u64,
    pub reap_interval_secs: u64,
    pub read_timeout_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        Self {
            port: parse_or(&lookup, "PORT", 8080),
            tick_ms: parse_or(&lookup, "TICK_MS", TICK_MS),
            arena_width: parse_or(&lookup, "ARENA_WIDTH", ARENA_WIDTH),
            arena_height: parse_or(&lookup, "ARENA_HEIGHT", ARENA_HEIGHT),
            player_timeout_secs: parse_or(&lookup, "PLAYER_TIMEOUT_SECS", PLAYER_TIMEOUT_SECS),
            reap_interval_secs: parse_or(&lookup, "REAP_INTERVAL_SECS", REAP_INTERVAL_SECS),
            read_timeout_secs: parse_or(&lookup, "READ_TIMEOUT_SECS", READ_TIMEOUT_SECS),
        }
        .validate()
    }

    fn validate(self) -> anyhow::Result<Self> {
        if self.arena_width <= 0 || self.arena_height <= 0 {
            bail!(
                "ARENA_WIDTH and ARENA_HEIGHT must be positive (got {}x{})",
                self.arena_width,
                self.arena_height
            );
        }
        if self.tick_ms == 0 || self.reap_interval_secs == 0 || self.read_timeout_secs == 0 {
            bail!("TICK_MS, REAP_INTERVAL_SECS and READ_TIMEOUT_SECS must be non-zero");
        }
        Ok(self)
    }

    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            width: self.arena_width,
            height: self.arena_height,
            player_timeout_ms: (self.player_timeout_secs as i64).saturating_mul(1000),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
