use anyhow::{bail, Context};

use crate::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL};

const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerMode {
    /// Deterministic rule-based composer, no network.
    Static,
    /// Gemini-backed composer.
    Generative,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub composer_mode: ComposerMode,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("PORT") {
            Some(v) => v.parse::<u16>().with_context(|| format!("PORT must be a port number, got '{v}'"))?,
            None => 8080,
        };

        let gemini_api_key = lookup("GEMINI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != DEMO_KEY);

        let composer_mode = match lookup("STYLIST_COMPOSER").as_deref().map(str::trim) {
            None | Some("") if gemini_api_key.is_some() => ComposerMode::Generative,
            None | Some("") => ComposerMode::Static,
            Some(m) if m.eq_ignore_ascii_case("static") => ComposerMode::Static,
            Some(m) if m.eq_ignore_ascii_case("genai") => ComposerMode::Generative,
            Some(other) => bail!("STYLIST_COMPOSER must be 'static' or 'genai', got '{other}'"),
        };

        if composer_mode == ComposerMode::Generative && gemini_api_key.is_none() {
            bail!("STYLIST_COMPOSER=genai requires GEMINI_API_KEY");
        }

        Ok(Self {
            port,
            gemini_api_key,
            gemini_api_base: lookup("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            composer_mode,
        })
    }
}
