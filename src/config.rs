//! Configuration loading.
//!
//! Settings come from an optional TOML file (`cadenza.toml`, or the path in
//! `CADENZA_CONFIG_PATH`) overridden by `CADENZA_*` environment variables;
//! a `.env` file is honored if present.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Prompt shown before each interactive read.
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Whether to print the banner at session start.
    #[serde(default = "default_banner")]
    pub banner: bool,

    /// Startup script executed into the namespace before the session starts.
    #[serde(default)]
    pub startup_path: Option<String>,
}

fn default_prompt() -> String {
    ">>> ".to_string()
}

fn default_banner() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            banner: default_banner(),
            startup_path: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from files and the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        builder = match std::env::var("CADENZA_CONFIG_PATH") {
            Ok(path) => builder.add_source(config::File::with_name(&path)),
            Err(_) => builder.add_source(config::File::with_name("cadenza").required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix("CADENZA"));

        let cfg: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.prompt.is_empty() {
            bail!("prompt must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.prompt, ">>> ");
        assert!(cfg.banner);
        assert!(cfg.startup_path.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let cfg: Config = toml::from_str(
            r#"
            prompt = "% "
            banner = false
            startup_path = "profile.czn"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.prompt, "% ");
        assert!(!cfg.banner);
        assert_eq!(cfg.startup_path.as_deref(), Some("profile.czn"));
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let cfg = Config {
            prompt: String::new(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    #[ignore] // Mutates process environment; run single-threaded
    fn test_env_override() {
        std::env::set_var("CADENZA_PROMPT", "$ ");
        let cfg = Config::load().unwrap();
        assert_eq!(cfg.prompt, "$ ");
        std::env::remove_var("CADENZA_PROMPT");
    }
}
