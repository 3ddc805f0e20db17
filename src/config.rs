use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub request_timeout: u64,
    pub stream_request_timeout: Option<u64>,
    pub request_body_max_size: usize,
    pub completion_model: String,
    pub completion_temperature: f64,
    pub completion_max_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct TomlConfigRaw {
    openai_api_key: Option<String>,
    openai_base_url: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
    request_timeout: Option<u64>,
    stream_request_timeout: Option<u64>,
    request_body_max_size: Option<usize>,
    completion_model: Option<String>,
    completion_temperature: Option<f64>,
    completion_max_tokens: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let toml_config = read_toml_config("config.toml")?.unwrap_or_default();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .or(toml_config.openai_api_key)
            .ok_or_else(|| {
                "OPENAI_API_KEY not found in environment variables and config.toml".to_string()
            })?;

        let openai_base_url = env::var("OPENAI_BASE_URL")
            .ok()
            .or(toml_config.openai_base_url)
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let host = env::var("HOST")
            .ok()
            .or(toml_config.host)
            .unwrap_or_else(|| "0.0.0.0".to_string());

        let port = env_u16_with_fallback("PORT", toml_config.port.unwrap_or(8080));
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .or(toml_config.log_level)
            .unwrap_or_else(|| "INFO".to_string());

        let request_timeout =
            env_u64_with_fallback("REQUEST_TIMEOUT", toml_config.request_timeout.unwrap_or(90));

        let stream_request_timeout = env_optional_u64("STREAM_REQUEST_TIMEOUT")
            .or(toml_config.stream_request_timeout)
            .filter(|value| *value > 0);

        let request_body_max_size = env_usize_with_fallback(
            "REQUEST_BODY_MAX_SIZE",
            toml_config.request_body_max_size.unwrap_or(64 * 1024),
        );

        let completion_model = env::var("COMPLETION_MODEL")
            .ok()
            .or(toml_config.completion_model)
            .unwrap_or_else(|| "text-davinci-003".to_string());

        let completion_temperature = env_f64_with_fallback(
            "COMPLETION_TEMPERATURE",
            toml_config.completion_temperature.unwrap_or(0.4),
        );

        let completion_max_tokens = env_u32_with_fallback(
            "COMPLETION_MAX_TOKENS",
            toml_config.completion_max_tokens.unwrap_or(500),
        );

        validate_completion_params(completion_temperature, completion_max_tokens)?;

        Ok(Self {
            openai_api_key,
            openai_base_url,
            host,
            port,
            log_level,
            request_timeout,
            stream_request_timeout,
            request_body_max_size,
            completion_model,
            completion_temperature,
            completion_max_tokens,
        })
    }

    pub fn validate_openai_api_key_format(&self) -> bool {
        self.openai_api_key.starts_with("sk-")
    }
}

fn validate_completion_params(temperature: f64, max_tokens: u32) -> Result<(), String> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(format!(
            "COMPLETION_TEMPERATURE must be between 0.0 and 2.0, got {temperature}"
        ));
    }
    if max_tokens == 0 {
        return Err("COMPLETION_MAX_TOKENS must be > 0".to_string());
    }

    Ok(())
}

fn read_toml_config(path: &str) -> Result<Option<TomlConfigRaw>, String> {
    let config_path = Path::new(path);

    if !config_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(config_path)
        .map_err(|error| format!("Failed to read {}: {}", config_path.display(), error))?;

    let parsed = toml::from_str::<TomlConfigRaw>(&content)
        .map_err(|error| format!("Failed to parse {}: {}", config_path.display(), error))?;

    Ok(Some(parsed))
}

fn env_u16_with_fallback(key: &str, fallback: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn env_u32_with_fallback(key: &str, fallback: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn env_u64_with_fallback(key: &str, fallback: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn env_f64_with_fallback(key: &str, fallback: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<f64>().ok())
        .unwrap_or(fallback)
}

fn env_optional_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}

fn env_usize_with_fallback(key: &str, fallback: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(fallback)
}
