use std::env;
use std::path::PathBuf;

use crate::errors::BotError;

/// The one page this bot knows how to drive.
pub const TARGET_URL: &str = "https://uma.komoejoy.com/event/dailygift/";

/// Model used when the `model` env var is not set.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Runtime configuration, sourced from the environment (the binary loads
/// `.env` first) plus a couple of CLI-overridable paths.
///
/// The env names are lowercase where the original deployment used lowercase;
/// existing `.env` files keep working unchanged.
#[derive(Debug, Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    /// Raw `name=value; name2=value2` header string used to seed the cookie
    /// jar when no cookie file exists yet.
    pub cookie_header: Option<String>,
    /// Without a key the CAPTCHA step escalates to manual assistance.
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub target_url: String,
    pub cookie_path: PathBuf,
    pub log_dir: PathBuf,
    pub headless: bool,
}

impl Config {
    /// Build a config from the process environment.
    ///
    /// Fails fast on missing credentials so no browser is launched for a run
    /// that cannot log in.
    pub fn from_env() -> Result<Self, BotError> {
        let username = require_env("login_username")?;
        let password = require_env("login_password")?;

        Ok(Self {
            username,
            password,
            cookie_header: optional_env("cookie"),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            gemini_model: optional_env("model")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            target_url: TARGET_URL.to_string(),
            cookie_path: PathBuf::from("cookies.json"),
            log_dir: PathBuf::from("logs"),
            headless: true,
        })
    }
}

fn require_env(key: &str) -> Result<String, BotError> {
    optional_env(key).ok_or_else(|| BotError::Config(format!("{key} is not set")))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
