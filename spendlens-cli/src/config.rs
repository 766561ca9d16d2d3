use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_spendlens_home;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub ingest: IngestSection,
    pub dashboard: DashboardSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Informational; any OpenAI-compatible chat completions endpoint works.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSection {
    pub statements_dir: PathBuf,
    pub output: PathBuf,
    /// YYYY-MM-DD; earlier records are dropped.
    pub cutoff: String,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub data: PathBuf,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "gemma2-9b-it".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.0,
            timeout_secs: 30,
        }
    }
}

impl Default for IngestSection {
    fn default() -> Self {
        Self {
            statements_dir: PathBuf::from("statements"),
            output: PathBuf::from("finances.csv"),
            cutoff: "2024-01-01".to_string(),
            concurrency: 1,
        }
    }
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            data: PathBuf::from("finances.csv"),
        }
    }
}

impl IngestSection {
    pub fn cutoff_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(self.cutoff.trim(), "%Y-%m-%d")
            .with_context(|| format!("ingest.cutoff must be YYYY-MM-DD, got {:?}", self.cutoff))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_spendlens_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_config(cfg: &Config) -> Result<PathBuf> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(p)
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let p = save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let p = config_path()?;
    let cfg = load_config_from(&p)?;
    let source = if p.exists() { p.display().to_string() } else { "built-in defaults".to_string() };
    println!("# {source}");
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}
