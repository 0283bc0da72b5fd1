use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: Option<String>,
    pub media_token_secret: Option<String>,
    pub media_token_ttl_secs: u64,
    pub execution_backend_url: Option<String>,
    pub execution_timeout_secs: u64,
    pub api_rps: u32,
    pub no_show_grace_minutes: i64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: env::var("DATABASE_URL").ok(),
            media_token_secret: env::var("MEDIA_TOKEN_SECRET").ok(),
            media_token_ttl_secs: get_env_parse_or("MEDIA_TOKEN_TTL_SECS", 3600)?,
            execution_backend_url: env::var("EXECUTION_BACKEND_URL").ok(),
            execution_timeout_secs: get_env_parse_or("EXECUTION_TIMEOUT_SECS", 30)?,
            api_rps: get_env_parse_or("API_RPS", 50)?,
            no_show_grace_minutes: get_env_parse_or("NO_SHOW_GRACE_MINUTES", 15)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
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
