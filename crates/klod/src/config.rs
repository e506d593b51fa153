//! Settings loaded from config files and the environment.

use std::env;
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use klod_anthropic_model::{AnthropicConfig, AnthropicConfigBuilder};

/// Error returned when the settings are unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No API key was configured.
    #[error("ANTHROPIC_API_KEY not set in environment or config file")]
    MissingApiKey,
}

/// Returns the config files to try, in order.
///
/// The user-wide files come first; `.env` in the working directory is a
/// last resort for project-specific setups.
pub fn config_file_candidates(home: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = vec![];
    if let Some(home) = home {
        candidates.push(home.join(".config").join("klod").join("config"));
        candidates.push(home.join(".klod.env"));
    }
    candidates.push(PathBuf::from(".env"));
    candidates
}

/// Loads the first readable config file into the process environment.
///
/// Variables that are already set are left untouched. Returns the path
/// that was loaded, or the error of the last candidate if none could be.
pub fn load_config_file() -> Result<PathBuf, dotenvy::Error> {
    let home = dirs::home_dir();
    let mut last_err = None;
    for path in config_file_candidates(home.as_deref()) {
        match dotenvy::from_path(&path) {
            Ok(()) => {
                debug!("loaded config from {}", path.display());
                return Ok(path);
            }
            Err(err) => {
                trace!("skipping config {}: {err}", path.display());
                last_err = Some(err);
            }
        }
    }
    // `.env` is always a candidate, so there is at least one error.
    Err(last_err.unwrap_or_else(|| {
        dotenvy::Error::Io(std::io::Error::from(std::io::ErrorKind::NotFound))
    }))
}

/// Settings of one client run.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// The API key sent with every request.
    pub api_key: String,
    /// The model identifier, empty when not configured.
    pub model: String,
    /// The system prompt, if any.
    pub system_prompt: Option<String>,
    /// A custom API endpoint base.
    pub base_url: Option<String>,
    /// Where to mirror the transcript, if session logging is enabled.
    pub session_log: Option<PathBuf>,
}

impl Settings {
    /// Reads the settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(
            |key| env::var(key).ok(),
            dirs::home_dir(),
            Local::now(),
        )
    }

    /// Reads the settings through `lookup`.
    ///
    /// `home` and `now` are used to derive the default session log path.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
        now: DateTime<Local>,
    ) -> Result<Self, ConfigError> {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let api_key =
            var("ANTHROPIC_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let logging_enabled =
            matches!(var("KLOD_LOGS").as_deref(), Some("true" | "1"));
        let session_log = logging_enabled.then(|| {
            var("KLOD_LOG_FILE").map(PathBuf::from).unwrap_or_else(|| {
                let state_dir = var("XDG_STATE_HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| {
                        home.unwrap_or_default().join(".local").join("state")
                    });
                state_dir
                    .join("klod")
                    .join("sessions")
                    .join(format!("{}.log", now.format("%Y-%m-%d_%H-%M-%S")))
            })
        });

        Ok(Self {
            api_key,
            model: var("MODEL").unwrap_or_default(),
            system_prompt: var("SYSTEM_PROMPT"),
            base_url: var("ANTHROPIC_BASE_URL"),
            session_log,
        })
    }

    /// Builds the provider configuration.
    pub fn provider_config(&self) -> AnthropicConfig {
        let mut builder = AnthropicConfigBuilder::with_api_key(&self.api_key)
            .with_model(&self.model);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        builder.build()
    }
}

impl Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<deducted>")
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("base_url", &self.base_url)
            .field("session_log", &self.session_log)
            .finish()
    }
}
