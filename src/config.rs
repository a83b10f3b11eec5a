use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{WebGenError, WebGenResult};

/// Environment override for `[interpreter] base_url`.
pub const INTERPRETER_URL_ENV: &str = "WEBGEN_INTERPRETER_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Origin of the command interpreter; `/api/commands` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Sent as `userId` with commands and used for history lookups.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Client-side timeout for one interpreter call. Unset means wait
    /// indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_id: None,
            timeout_ms: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Pause between highlighting an element and acting on it.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    /// Pause after every action.
    #[serde(default = "default_pacing_delay")]
    pub pacing_delay_ms: u64,
    /// Fraction of the viewport height covered by one scroll action.
    #[serde(default = "default_scroll_fraction")]
    pub scroll_fraction: f64,
    #[serde(default = "default_click_highlight")]
    pub click_highlight: String,
    #[serde(default = "default_fill_highlight")]
    pub fill_highlight: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            pacing_delay_ms: default_pacing_delay(),
            scroll_fraction: default_scroll_fraction(),
            click_highlight: default_click_highlight(),
            fill_highlight: default_fill_highlight(),
        }
    }
}

fn default_settle_delay() -> u64 {
    200
}

fn default_pacing_delay() -> u64 {
    800
}

fn default_scroll_fraction() -> f64 {
    0.8
}

fn default_click_highlight() -> String {
    "2px solid red".to_string()
}

fn default_fill_highlight() -> String {
    "2px solid blue".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Tried in order when a search-like descriptor does not resolve.
    #[serde(default = "default_search_fallbacks")]
    pub search_fallbacks: Vec<String>,
    #[serde(default = "default_marketplaces")]
    pub marketplaces: Vec<MarketplaceEntry>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_fallbacks: default_search_fallbacks(),
            marketplaces: default_marketplaces(),
        }
    }
}

/// A site whose search box ignores a synthetic Enter key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceEntry {
    pub name: String,
    /// Regex matched against the page hostname.
    pub host_pattern: String,
    /// Explicit submit control clicked after a fill.
    pub submit_selector: String,
}

fn default_search_fallbacks() -> Vec<String> {
    vec![
        r#"input[type="search"]"#.to_string(),
        "#twotabsearchtextbox".to_string(),
        r#"[name="field-keywords"]"#.to_string(),
    ]
}

fn default_marketplaces() -> Vec<MarketplaceEntry> {
    vec![MarketplaceEntry {
        name: "amazon".to_string(),
        host_pattern: "amazon".to_string(),
        submit_selector: "#nav-search-submit-button".to_string(),
    }]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// JSONL file receiving one record per command attempt.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl MetricsConfig {
    /// Configured path, or `<local data dir>/WebGen/metrics.jsonl`,
    /// falling back to the working directory.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match dirs::data_local_dir() {
            Some(dir) => dir.join("WebGen").join("metrics.jsonl"),
            None => PathBuf::from("metrics.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// DevTools endpoint of an already running Chrome. Launches a new
    /// browser when unset or unreachable.
    #[serde(default = "default_debug_url")]
    pub debug_url: Option<String>,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            debug_url: default_debug_url(),
            headless: false,
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

fn default_debug_url() -> Option<String> {
    Some("http://127.0.0.1:9222".to_string())
}

fn default_idle_timeout() -> u64 {
    300
}

fn resolve_config_path() -> WebGenResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(WebGenError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> WebGenResult<AppConfig> {
    let mut config: AppConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load `explicit`, or search the default locations when `None`.
pub fn load_config(explicit: Option<&Path>) -> WebGenResult<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => resolve_config_path()?,
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(
        path = %path.display(),
        interpreter = %config.interpreter.base_url,
        "config loaded"
    );
    Ok(config)
}

/// Config for a run. An explicit path must load; the default-location
/// search falls back to defaults when nothing usable is found.
pub fn load_or_default(explicit: Option<&Path>) -> WebGenResult<AppConfig> {
    if explicit.is_some() {
        return load_config(explicit);
    }
    match load_config(None) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(error = %e, "using default configuration");
            let mut config = AppConfig::default();
            apply_env_overrides(&mut config);
            Ok(config)
        }
    }
}

pub fn save_config(config: &AppConfig, path: &Path) -> WebGenResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = std::env::var(INTERPRETER_URL_ENV) {
        if !url.trim().is_empty() {
            config.interpreter.base_url = url.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.executor.settle_delay_ms, 200);
        assert_eq!(config.executor.pacing_delay_ms, 800);
        assert!((config.executor.scroll_fraction - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.resolver.search_fallbacks.len(), 3);
        assert_eq!(config.resolver.marketplaces[0].submit_selector, "#nav-search-submit-button");
        assert_eq!(config.interpreter.timeout_ms, None);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = parse_config(
            r##"
            [executor]
            pacing_delay_ms = 50

            [resolver]
            search_fallbacks = ["#search"]

            [[resolver.marketplaces]]
            name = "ebay"
            host_pattern = "(^|\\.)ebay\\."
            submit_selector = "#gh-btn"
            "##,
        )
        .unwrap();
        assert_eq!(config.executor.pacing_delay_ms, 50);
        assert_eq!(config.executor.settle_delay_ms, 200);
        assert_eq!(config.resolver.search_fallbacks, vec!["#search".to_string()]);
        assert_eq!(config.resolver.marketplaces.len(), 1);
        assert_eq!(config.resolver.marketplaces[0].name, "ebay");
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.interpreter.timeout_ms = Some(1500);
        config.browser.headless = true;
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.interpreter.timeout_ms, Some(1500));
        assert!(loaded.browser.headless);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn explicit_path_never_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_or_default(Some(&dir.path().join("typo.toml"))),
            Err(WebGenError::Io(_))
        ));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[interpreter\nbase_url = 3").unwrap();
        assert!(matches!(
            load_or_default(Some(&broken)),
            Err(WebGenError::TomlDe(_))
        ));

        let good = dir.path().join("config.toml");
        std::fs::write(&good, "[executor]\npacing_delay_ms = 10\n").unwrap();
        assert_eq!(load_or_default(Some(&good)).unwrap().executor.pacing_delay_ms, 10);
    }
}
