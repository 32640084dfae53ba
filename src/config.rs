//! Application configuration, extracted from the environment.

use anyhow::Context;
use figment::{Figment, providers::Env};
use serde::Deserialize;

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_api_base_url() -> String {
    "https://v3.football.api-sports.io".to_owned()
}

fn default_upstream_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string for the shared cache store.
    pub database_url: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Upstream API key. Optional at boot; fetches fail without it.
    #[serde(default)]
    pub football_api_key: Option<String>,
    #[serde(default = "default_api_base_url")]
    pub football_api_base_url: String,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
}

impl Config {
    pub fn load() -> Result<Self, anyhow::Error> {
        Figment::new()
            .merge(Env::raw())
            .extract()
            .context("Failed to load config")
    }
}
