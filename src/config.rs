use crate::error::{Error, Result};
use crate::services::llm_service::LlmProvider;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub preferred_llm: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub llm_timeout_secs: u64,
    pub quiz_question_count: usize,
    pub public_rps: u32,
    pub cors_origins: Vec<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:8000".to_string(),
            preferred_llm: LlmProvider::OpenAi,
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            llm_timeout_secs: 60,
            quiz_question_count: 25,
            public_rps: 50,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let defaults = Self::default();

        let preferred_llm = match get_env_opt("PREFERRED_LLM") {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid value for PREFERRED_LLM: {}", e)))?,
            None => defaults.preferred_llm,
        };

        Ok(Self {
            server_address: get_env_opt("SERVER_ADDRESS").unwrap_or(defaults.server_address),
            preferred_llm,
            openai_api_key: get_env_opt("OPENAI_API_KEY"),
            openai_model: get_env_opt("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: get_env_opt("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            gemini_api_key: get_env_opt("GEMINI_API_KEY"),
            gemini_model: get_env_opt("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: get_env_opt("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            llm_timeout_secs: get_env_parse_or("LLM_TIMEOUT_SECS", defaults.llm_timeout_secs)?,
            quiz_question_count: get_env_parse_or("QUIZ_QUESTION_COUNT", defaults.quiz_question_count)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", defaults.public_rps)?,
            cors_origins: get_env_opt("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
        })
    }
}

/// Unset and empty variables are treated the same.
fn get_env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_env_opt(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_when_unset() {
        let value: u64 = get_env_parse_or("QUIZFLOW_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("QUIZFLOW_TEST_BAD_NUMBER", "many");
        let err = get_env_parse_or::<u32>("QUIZFLOW_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("QUIZFLOW_TEST_BAD_NUMBER")));
    }
}
