use std::{env, fs, path::PathBuf};

use anyhow::Result;
use directories::ProjectDirs;
use serde::Deserialize;

use crate::autosize::SearchConfig;
use crate::types::OutputFormat;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub search_floor: u32,
    pub search_step: u32,
    pub max_search_iterations: u32,
    pub recalculate_explicit: bool,
    pub default_output: OutputFormat,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    address: Option<String>,
    port: Option<u16>,
    search_floor: Option<u32>,
    search_step: Option<u32>,
    max_search_iterations: Option<u32>,
    recalculate_explicit: Option<bool>,
    default_output: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let search = SearchConfig::default();
        Self {
            address: "0.0.0.0".to_string(),
            port: 8080,
            search_floor: search.floor,
            search_step: search.step,
            max_search_iterations: search.max_iterations,
            recalculate_explicit: search.recalculate_explicit,
            default_output: OutputFormat::Human,
        }
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = anyhow::Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let d = Config::default();
        let default_output = match raw.default_output {
            Some(v) => v.parse::<OutputFormat>()?,
            None => d.default_output,
        };
        Ok(Self {
            address: raw.address.unwrap_or(d.address),
            port: raw.port.unwrap_or(d.port),
            search_floor: raw.search_floor.unwrap_or(d.search_floor),
            search_step: raw.search_step.unwrap_or(d.search_step),
            max_search_iterations: raw.max_search_iterations.unwrap_or(d.max_search_iterations),
            recalculate_explicit: raw.recalculate_explicit.unwrap_or(d.recalculate_explicit),
            default_output,
        })
    }
}

impl Config {
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut cfg = if let Some(path) = path {
            let raw = fs::read_to_string(path)?;
            Config::try_from(toml::from_str::<RawConfig>(&raw)?)?
        } else {
            let default_path = default_config_path();
            if default_path.exists() {
                let raw = fs::read_to_string(&default_path)?;
                Config::try_from(toml::from_str::<RawConfig>(&raw)?)?
            } else {
                Config::default()
            }
        };

        if let Ok(v) = env::var("DBCALC_ADDRESS") {
            cfg.address = v;
        }
        maybe_env(&mut cfg.port, "DBCALC_PORT");
        maybe_env(&mut cfg.search_floor, "DBCALC_SEARCH_FLOOR");
        maybe_env(&mut cfg.search_step, "DBCALC_SEARCH_STEP");
        maybe_env(&mut cfg.max_search_iterations, "DBCALC_MAX_SEARCH_ITERATIONS");
        maybe_env(&mut cfg.recalculate_explicit, "DBCALC_RECALCULATE_EXPLICIT");
        if let Ok(v) = env::var("DBCALC_DEFAULT_OUTPUT") {
            cfg.default_output = v.parse()?;
        }
        validate(&cfg)?;
        Ok(cfg)
    }

    pub fn search(&self) -> SearchConfig {
        SearchConfig {
            floor: self.search_floor,
            step: self.search_step,
            max_iterations: self.max_search_iterations,
            recalculate_explicit: self.recalculate_explicit,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("com", "dbcalc", "dbcalc")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".dbcalc"))
        .join("config.toml")
}

fn validate(cfg: &Config) -> Result<()> {
    if cfg.address.trim().is_empty() {
        anyhow::bail!("DBCALC_ADDRESS must not be empty");
    }
    if cfg.search_floor == 0 {
        anyhow::bail!("search_floor must be at least 1");
    }
    if cfg.search_step == 0 {
        anyhow::bail!("search_step must be at least 1");
    }
    if cfg.max_search_iterations == 0 {
        anyhow::bail!("max_search_iterations must be at least 1");
    }
    Ok(())
}

fn maybe_env<T: std::str::FromStr>(val: &mut T, key: &str) {
    if let Ok(v) = env::var(key) {
        if let Ok(n) = v.trim().parse::<T>() {
            *val = n;
        }
    }
}
