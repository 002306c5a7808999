use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = ".MoodJournal";
const CONFIG_FILE: &str = "config.json";
pub const API_KEY_ENV: &str = "MOODJOURNAL_AI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub report_dir: PathBuf,
    pub api_port: u16,
    pub min_year: i32,
    pub max_year: i32,
    pub expose_error_details: bool,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub ai_api_base_url: String,
    pub ai_model: String,
    pub ai_timeout_seconds: u64,
    pub analysis_timeout_ms: u64,
    pub atmosphere_timeout_ms: u64,
    pub summary_timeout_ms: u64,
    pub reply_timeout_ms: u64,
    pub analysis_max_chars: usize,
    pub atmosphere_max_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            db_path: root.join("db").join("journal.db"),
            report_dir: default_report_dir(),
            api_port: 7891,
            min_year: 1900,
            max_year: 2100,
            expose_error_details: false,
            ai_enabled: true,
            ai_api_key: None,
            ai_api_base_url: "https://api.openai.com/v1".to_string(),
            ai_model: "gpt-4o-mini".to_string(),
            ai_timeout_seconds: 20,
            analysis_timeout_ms: 10_000,
            atmosphere_timeout_ms: 8_000,
            summary_timeout_ms: 10_000,
            reply_timeout_ms: 15_000,
            analysis_max_chars: 2000,
            atmosphere_max_chars: 1000,
        }
    }
}

/// The slice of configuration the analyzer guards need.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisLimits {
    pub analysis_timeout: Duration,
    pub atmosphere_timeout: Duration,
    pub summary_timeout: Duration,
    pub reply_timeout: Duration,
    pub analysis_max_chars: usize,
    pub atmosphere_max_chars: usize,
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads the config file, writing the defaults first when none exists.
    /// An existing file that fails to load is reported, never replaced.
    pub fn load_or_init() -> Result<Self> {
        Self::load_or_init_at(&Self::config_path()?)
    }

    pub fn load_or_init_at(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        set_mode_600(path)?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.min_year > self.max_year {
            bail!("min_year ({}) must not exceed max_year ({})", self.min_year, self.max_year);
        }

        let positive = [
            ("analysis_timeout_ms", self.analysis_timeout_ms),
            ("atmosphere_timeout_ms", self.atmosphere_timeout_ms),
            ("summary_timeout_ms", self.summary_timeout_ms),
            ("reply_timeout_ms", self.reply_timeout_ms),
            ("analysis_max_chars", self.analysis_max_chars as u64),
            ("atmosphere_max_chars", self.atmosphere_max_chars as u64),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, value)| *value == 0) {
            bail!("{key} must be greater than zero");
        }

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.display()
            )
        })?;

        Ok(())
    }

    /// Environment variable first, then the config file value.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                self.ai_api_key
                    .clone()
                    .filter(|value| !value.trim().is_empty())
            })
    }

    pub fn analysis_limits(&self) -> AnalysisLimits {
        AnalysisLimits {
            analysis_timeout: Duration::from_millis(self.analysis_timeout_ms),
            atmosphere_timeout: Duration::from_millis(self.atmosphere_timeout_ms),
            summary_timeout: Duration::from_millis(self.summary_timeout_ms),
            reply_timeout: Duration::from_millis(self.reply_timeout_ms),
            analysis_max_chars: self.analysis_max_chars,
            atmosphere_max_chars: self.atmosphere_max_chars,
        }
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);

        match normalized {
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "min_year" => {
                let year = parse_year(value, "min_year")?;
                if year > self.max_year {
                    bail!("min_year ({year}) must not exceed max_year ({})", self.max_year);
                }
                self.min_year = year;
            }
            "max_year" => {
                let year = parse_year(value, "max_year")?;
                if year < self.min_year {
                    bail!("max_year ({year}) must not precede min_year ({})", self.min_year);
                }
                self.max_year = year;
            }
            "expose_error_details" => {
                self.expose_error_details = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("expose_error_details must be true/false"))?;
            }
            "ai_enabled" => {
                self.ai_enabled = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("ai_enabled must be true/false"))?;
            }
            "ai_api_key" => {
                self.ai_api_key = (!value.trim().is_empty()).then_some(value.to_string());
            }
            "ai_api_base_url" => {
                self.ai_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "ai_model" => {
                self.ai_model = value.trim().to_string();
            }
            "ai_timeout_seconds" => {
                self.ai_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("ai_timeout_seconds must be a number"))?
                    .max(5);
            }
            "analysis_timeout_ms" => {
                self.analysis_timeout_ms = parse_millis(value, "analysis_timeout_ms")?;
            }
            "atmosphere_timeout_ms" => {
                self.atmosphere_timeout_ms = parse_millis(value, "atmosphere_timeout_ms")?;
            }
            "summary_timeout_ms" => {
                self.summary_timeout_ms = parse_millis(value, "summary_timeout_ms")?;
            }
            "reply_timeout_ms" => {
                self.reply_timeout_ms = parse_millis(value, "reply_timeout_ms")?;
            }
            "analysis_max_chars" => {
                self.analysis_max_chars = parse_char_limit(value, "analysis_max_chars")?;
            }
            "atmosphere_max_chars" => {
                self.atmosphere_max_chars = parse_char_limit(value, "atmosphere_max_chars")?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, report_dir|report.dir, api_port|api.port, min_year|calendar.min_year, max_year|calendar.max_year, expose_error_details|api.expose_error_details, ai_enabled|ai.enabled, ai_api_key|ai.api_key, ai_api_base_url|ai.base_url, ai_model|ai.model, ai_timeout_seconds|ai.timeout_seconds, analysis_timeout_ms|ai.analysis_timeout_ms, atmosphere_timeout_ms|ai.atmosphere_timeout_ms, summary_timeout_ms|ai.summary_timeout_ms, reply_timeout_ms|ai.reply_timeout_ms, analysis_max_chars|ai.analysis_max_chars, atmosphere_max_chars|ai.atmosphere_max_chars"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "min_year" => Some(self.min_year.to_string()),
            "max_year" => Some(self.max_year.to_string()),
            "expose_error_details" => Some(self.expose_error_details.to_string()),
            "ai_enabled" => Some(self.ai_enabled.to_string()),
            "ai_api_key" => Some(
                self.ai_api_key
                    .as_ref()
                    .map(|_| "***set***".to_string())
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "ai_api_base_url" => Some(self.ai_api_base_url.clone()),
            "ai_model" => Some(self.ai_model.clone()),
            "ai_timeout_seconds" => Some(self.ai_timeout_seconds.to_string()),
            "analysis_timeout_ms" => Some(self.analysis_timeout_ms.to_string()),
            "atmosphere_timeout_ms" => Some(self.atmosphere_timeout_ms.to_string()),
            "summary_timeout_ms" => Some(self.summary_timeout_ms.to_string()),
            "reply_timeout_ms" => Some(self.reply_timeout_ms.to_string()),
            "analysis_max_chars" => Some(self.analysis_max_chars.to_string()),
            "atmosphere_max_chars" => Some(self.atmosphere_max_chars.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "report_dir" | "report.dir" => "report_dir",
        "api_port" | "api.port" => "api_port",
        "min_year" | "calendar.min_year" => "min_year",
        "max_year" | "calendar.max_year" => "max_year",
        "expose_error_details" | "api.expose_error_details" => "expose_error_details",
        "ai_enabled" | "ai.enabled" => "ai_enabled",
        "ai_api_key" | "ai.api_key" => "ai_api_key",
        "ai_api_base_url" | "ai.base_url" => "ai_api_base_url",
        "ai_model" | "ai.model" => "ai_model",
        "ai_timeout_seconds" | "ai.timeout_seconds" => "ai_timeout_seconds",
        "analysis_timeout_ms" | "ai.analysis_timeout_ms" => "analysis_timeout_ms",
        "atmosphere_timeout_ms" | "ai.atmosphere_timeout_ms" => "atmosphere_timeout_ms",
        "summary_timeout_ms" | "ai.summary_timeout_ms" => "summary_timeout_ms",
        "reply_timeout_ms" | "ai.reply_timeout_ms" => "reply_timeout_ms",
        "analysis_max_chars" | "ai.analysis_max_chars" => "analysis_max_chars",
        "atmosphere_max_chars" | "ai.atmosphere_max_chars" => "atmosphere_max_chars",
        _ => key,
    }
}

fn parse_year(value: &str, key: &str) -> Result<i32> {
    value
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|year| (1000..=9999).contains(year))
        .ok_or_else(|| anyhow!("{key} must be a 4-digit year"))
}

fn parse_millis(value: &str, key: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|millis| *millis > 0)
        .ok_or_else(|| anyhow!("{key} must be a positive number of milliseconds"))
}

fn parse_char_limit(value: &str, key: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|limit| *limit > 0)
        .ok_or_else(|| anyhow!("{key} must be a positive number of characters"))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("MoodJournal")
        .join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
