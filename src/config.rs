use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_STATE_PATH: &str = ".course-risk-state.json";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub state_path: PathBuf,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let max_connections = match lookup("COMPANION_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("COMPANION_MAX_CONNECTIONS must be a number, got {raw:?}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            state_path: lookup("COMPANION_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
            max_connections,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}
