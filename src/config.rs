use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::driver::IngestConfig;
use crate::ingest::resolver::StrategyKind;
use crate::mail::segmenter::SubjectStrip;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 30;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub db_path: Option<String>,
    pub interchange_path: Option<String>,
    pub model_path: Option<String>,
    pub lookback_days: Option<i64>,
    pub date_strategies: Option<Vec<StrategyKind>>,
    pub subject_strip: Option<SubjectStrip>,
    pub ollama_url: Option<String>,
    pub ollama_model: Option<String>,
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_events"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

fn in_config_dir(name: &str) -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push(name);
    Ok(p)
}

/// Load the default config file, writing a template on first use.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let sample = Config::template();
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

impl Config {
    fn template() -> Self {
        Self {
            db_path: None,
            interchange_path: None,
            model_path: None,
            lookback_days: Some(DEFAULT_LOOKBACK_DAYS),
            date_strategies: Some(vec![StrategyKind::Rendered]),
            subject_strip: Some(SubjectStrip::LegacyOffset),
            ollama_url: Some("http://127.0.0.1:11434".to_string()),
            ollama_model: Some("llama3".to_string()),
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        let defaults = IngestConfig::default();
        IngestConfig {
            subject_strip: self.subject_strip.unwrap_or(defaults.subject_strip),
            date_strategies: self
                .date_strategies
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.date_strategies),
        }
    }

    pub fn lookback_days(&self) -> i64 {
        self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS)
    }

    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or("http://127.0.0.1:11434")
    }

    pub fn ollama_model(&self) -> &str {
        self.ollama_model.as_deref().unwrap_or("llama3")
    }
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf> {
    match &cfg.db_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => in_config_dir("emails.db"),
    }
}

pub fn resolve_interchange_path(cfg: &Config) -> Result<PathBuf> {
    match &cfg.interchange_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => in_config_dir("parsed_emails.json"),
    }
}

pub fn resolve_model_path(cfg: &Config) -> Result<PathBuf> {
    match &cfg.model_path {
        Some(p) => Ok(PathBuf::from(p)),
        None => in_config_dir("event_classifier.json"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        let ingest = cfg.ingest_config();
        assert_eq!(ingest.subject_strip, SubjectStrip::LegacyOffset);
        assert_eq!(ingest.date_strategies, vec![StrategyKind::Rendered]);
        assert_eq!(cfg.lookback_days(), 30);
        assert_eq!(cfg.ollama_model(), "llama3");
    }

    #[test]
    fn strategies_and_strip_are_configurable() {
        let cfg: Config = toml::from_str(
            r#"
            db_path = "/tmp/x.db"
            date_strategies = ["rendered", "header", "sent_line", "reply_marker"]
            subject_strip = "re_prefix"
            lookback_days = 7
            "#,
        )
        .unwrap();
        let ingest = cfg.ingest_config();
        assert_eq!(ingest.subject_strip, SubjectStrip::RePrefix);
        assert_eq!(
            ingest.date_strategies,
            vec![
                StrategyKind::Rendered,
                StrategyKind::Header,
                StrategyKind::SentLine,
                StrategyKind::ReplyMarker
            ]
        );
        assert_eq!(cfg.lookback_days(), 7);
        assert_eq!(resolve_db_path(&cfg).unwrap(), PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn empty_strategy_list_falls_back_to_rendered() {
        let cfg: Config = toml::from_str("date_strategies = []").unwrap();
        assert_eq!(cfg.ingest_config().date_strategies, vec![StrategyKind::Rendered]);
    }

    #[test]
    fn template_round_trips() {
        let s = toml::to_string_pretty(&Config::template()).unwrap();
        let cfg: Config = toml::from_str(&s).unwrap();
        assert_eq!(cfg.ollama_url(), "http://127.0.0.1:11434");
        assert_eq!(cfg.subject_strip, Some(SubjectStrip::LegacyOffset));
    }
}
