use crate::cli::Cli;
use crate::error::{Error, Result};
use agent::llm::{UserLocation, WebSearch};
use std::path::PathBuf;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const API_BASE_VAR: &str = "OPENAI_BASE_URL";

/// Everything a research run needs, resolved from the command line and the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_key: String,
    pub api_base: Option<String>,
    pub data_dir: PathBuf,
    pub model: String,
    pub search_model: String,
    pub web_search: WebSearch,
    pub concurrency: usize,
}

/// Loads `.env` from the working directory; variables already set in the
/// environment win. Must run before argument parsing so `env` fallbacks see it.
pub fn load_env_file() -> Result<Option<PathBuf>> {
    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(Error::Config(format!("failed to read .env: {}", err))),
    }
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::from_parts(
            cli,
            std::env::var(API_KEY_VAR).ok(),
            std::env::var(API_BASE_VAR).ok(),
        )
    }

    pub fn from_parts(cli: &Cli, api_key: Option<String>, api_base: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} environment variable is required (set it in your shell or a .env file)",
                    API_KEY_VAR
                ))
            })?;

        if cli.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }

        let location = UserLocation {
            city: cli.location_city.clone(),
            region: cli.location_region.clone(),
            country: cli.location_country.clone(),
            timezone: cli.location_timezone.clone(),
        };

        Ok(Self {
            api_key,
            api_base: api_base.filter(|base| !base.trim().is_empty()),
            data_dir: cli.data_dir.clone(),
            model: cli.model.clone(),
            search_model: cli.search_model.clone(),
            web_search: WebSearch {
                context_size: cli.search_context_size.into(),
                user_location: (!location.is_empty()).then_some(location),
            },
            concurrency: cli.concurrency,
        })
    }
}
