use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const ENV_FILE: &str = ".env";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const API_KEY_VAR: &str = "APPTWEAK_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub apptweak: ApptweakConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApptweakConfig {
    #[serde(default = "default_charts_url")]
    pub charts_url: String,
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_charts_url() -> String {
    "https://public-api.apptweak.com/api/public/store/charts/top-results/current.json".to_string()
}
fn default_metadata_url() -> String {
    "https://public-api.apptweak.com/api/public/store/apps/metadata.json".to_string()
}
fn default_device() -> String { "iphone".to_string() }
fn default_request_timeout() -> u64 { 30_000 }

impl Default for ApptweakConfig {
    fn default() -> Self {
        Self {
            charts_url: default_charts_url(),
            metadata_url: default_metadata_url(),
            device: default_device(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// What to do when a page or batch request fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Drop the page/batch and carry on.
    #[default]
    Skip,
    /// Re-issue up to N more times, then skip.
    Retry(u32),
    /// Fail the whole run.
    Abort,
}

impl ErrorPolicy {
    pub fn max_attempts(self) -> u32 {
        match self {
            ErrorPolicy::Retry(extra) => extra.saturating_add(1),
            ErrorPolicy::Skip | ErrorPolicy::Abort => 1,
        }
    }
}

/// What to do with a release date that cannot be parsed.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MalformedDatePolicy {
    #[default]
    Skip,
    Fail,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_apps")]
    pub max_apps: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause after every upstream request (AppTweak rate limit).
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default)]
    pub chart_errors: ErrorPolicy,
    #[serde(default)]
    pub metadata_errors: ErrorPolicy,
    #[serde(default)]
    pub malformed_dates: MalformedDatePolicy,
}

fn default_page_size() -> u32 { 100 }
fn default_max_apps() -> u32 { 1000 }
fn default_batch_size() -> usize { 5 }
fn default_request_delay() -> u64 { 600 }
fn default_window_days() -> i64 { 270 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_apps: default_max_apps(),
            batch_size: default_batch_size(),
            request_delay_ms: default_request_delay(),
            window_days: default_window_days(),
            chart_errors: ErrorPolicy::Skip,
            metadata_errors: ErrorPolicy::Skip,
            malformed_dates: MalformedDatePolicy::Skip,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            anyhow::bail!("pipeline.page_size must be at least 1");
        }
        if self.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be at least 1");
        }
        if self.window_days < 0 {
            anyhow::bail!("pipeline.window_days cannot be negative");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf { PathBuf::from(".") }

impl Default for ExportConfig {
    fn default() -> Self {
        Self { output_dir: default_output_dir() }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise `config.toml` is used when present
    /// and built-in defaults when not.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        for (key, value) in parse_env_lines(&content) {
            if std::env::var(&key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }

    /// API key comes from the environment (or .env), else is prompted for.
    /// A prompted key is saved to .env for future runs.
    pub fn api_key() -> Result<String> {
        match std::env::var(API_KEY_VAR) {
            Ok(key) if !sanitize_key(&key).is_empty() => Ok(sanitize_key(&key)),
            _ => {
                let key = prompt("AppTweak API Key")?;
                save_env_var(API_KEY_VAR, &key);
                Ok(key)
            }
        }
    }
}

/// KEY=VALUE pairs from a .env body; comments, blanks and quotes handled.
fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    // Strip BOM if present (common on Windows-created files)
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .lines()
        .map(|line| line.trim().trim_matches('\r'))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = sanitize_key(&input);
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Append a KEY=VALUE line to .env and set it in the current process.
fn save_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let path = Path::new(ENV_FILE);
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    if let Err(e) = std::fs::write(path, contents) {
        tracing::warn!(error = %e, "could not save API key to .env");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert_eq!(config.pipeline.page_size, 100);
        assert_eq!(config.pipeline.max_apps, 1000);
        assert_eq!(config.pipeline.batch_size, 5);
        assert_eq!(config.pipeline.request_delay_ms, 600);
        assert_eq!(config.pipeline.window_days, 270);
        assert_eq!(config.apptweak.device, "iphone");
        assert_eq!(config.pipeline.chart_errors, ErrorPolicy::Skip);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.pipeline.page_size, 100);
        assert_eq!(config.pipeline.metadata_errors, ErrorPolicy::Skip);
        assert_eq!(config.pipeline.malformed_dates, MalformedDatePolicy::Skip);
        assert!(config.apptweak.charts_url.ends_with("/charts/top-results/current.json"));
        assert_eq!(config.export.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_error_policy_variants() {
        let config = Config::parse(
            r#"
            [pipeline]
            chart_errors = { retry = 3 }
            metadata_errors = "abort"
            malformed_dates = "fail"
            "#,
        )
        .unwrap();
        assert_eq!(config.pipeline.chart_errors, ErrorPolicy::Retry(3));
        assert_eq!(config.pipeline.chart_errors.max_attempts(), 4);
        assert_eq!(config.pipeline.metadata_errors, ErrorPolicy::Abort);
        assert_eq!(config.pipeline.metadata_errors.max_attempts(), 1);
        assert_eq!(config.pipeline.malformed_dates, MalformedDatePolicy::Fail);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = Config::parse("[pipeline]\nbatch_size = 0\n").unwrap_err();
        assert!(format!("{:#}", err).contains("batch_size"));
    }

    #[test]
    fn test_parse_env_lines() {
        let body = "\u{feff}# comment\nAPPTWEAK_API_KEY=\"abc123\"\r\n\nOTHER = 'x'\nnot a pair\n";
        let pairs = parse_env_lines(body);
        assert_eq!(
            pairs,
            vec![
                ("APPTWEAK_API_KEY".to_string(), "abc123".to_string()),
                ("OTHER".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("  abc\u{200b}\r\n"), "abc");
    }
}
