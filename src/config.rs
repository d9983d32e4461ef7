use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::events::EventStreamConfig;
use crate::session::SessionSettings;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub signaling: SignalingConfig,

    /// Event stream tuning; every field has a default
    #[serde(default)]
    pub events: EventStreamConfig,

    /// Session settings used before the repository has anything saved
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Deserialize)]
pub struct SignalingConfig {
    /// Control-plane base URL, e.g. "https://api.example.com/v1/"
    pub base_url: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn signaling_url(&self) -> Result<Url> {
        Url::parse(&self.signaling.base_url)
            .with_context(|| format!("Invalid signaling base URL: {}", self.signaling.base_url))
    }
}
