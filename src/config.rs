//! Configuration management for wmscout.
//!
//! All settings come from the environment (a `.env` file is loaded before
//! anything else). Every value has a default so a bare `wmscout serve`
//! works out of the box.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default keyword list when `SEARCH_KEYWORDS` is unset.
pub const DEFAULT_KEYWORDS: &str = "webmethods";

/// Proxy settings for outbound requests.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    /// Proxy URL in the form `http://host:port`.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Runtime settings for the whole process.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Admin API listen port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: PathBuf,
    /// CORS origins for the admin API; empty means allow any.
    pub allowed_origins: Vec<String>,
    /// Keywords a candidate must match to be kept.
    pub search_keywords: Vec<String>,
    /// Cap on records collected per adapter run.
    pub max_items_per_category: usize,
    /// Hard deadline for a single HTTP request.
    pub request_timeout: Duration,
    /// Attempt budget for a single logical fetch.
    pub max_retries: u32,
    /// Size of the global concurrency gate.
    pub max_concurrent_requests: usize,
    /// Inter-request jitter bounds for the default domain profile.
    pub scrape_delay_min: Duration,
    pub scrape_delay_max: Duration,
    /// Fetch through a headless browser (requires the `browser` feature).
    pub use_browser: bool,
    /// User agent presented to robots.txt.
    pub robots_user_agent: String,
    /// Age after which non-flagged records are physically removed.
    pub content_max_age_days: i64,
    /// Whether the cron scheduler runs.
    pub auto_scrape_enabled: bool,
    /// Cron expression for scheduled runs.
    pub scrape_cron_schedule: String,
    /// Optional outbound proxy.
    pub proxy: Option<ProxySettings>,
    /// Console log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// Directory for the structured file logs.
    pub log_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: PathBuf::from("wmscout.db"),
            allowed_origins: Vec::new(),
            search_keywords: vec![DEFAULT_KEYWORDS.to_string()],
            max_items_per_category: 500,
            request_timeout: Duration::from_millis(30_000),
            max_retries: 3,
            max_concurrent_requests: 3,
            scrape_delay_min: Duration::from_millis(2_000),
            scrape_delay_max: Duration::from_millis(5_000),
            use_browser: false,
            robots_user_agent: "wmscout".to_string(),
            content_max_age_days: 90,
            auto_scrape_enabled: false,
            scrape_cron_schedule: "0 */6 * * *".to_string(),
            proxy: None,
            log_level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let proxy = env_var("PROXY_HOST").map(|host| ProxySettings {
            host,
            port: parse_env("PROXY_PORT", 8080),
            username: env_var("PROXY_USERNAME"),
            password: env_var("PROXY_PASSWORD"),
        });

        Self {
            port: parse_env("PORT", defaults.port),
            database_path: env_var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            allowed_origins: parse_list(env_var("ALLOWED_ORIGINS")),
            search_keywords: {
                let keywords = parse_list(env_var("SEARCH_KEYWORDS"))
                    .into_iter()
                    .map(|k| k.to_lowercase())
                    .collect::<Vec<_>>();
                if keywords.is_empty() {
                    defaults.search_keywords
                } else {
                    keywords
                }
            },
            max_items_per_category: parse_env(
                "MAX_ITEMS_PER_CATEGORY",
                defaults.max_items_per_category,
            ),
            request_timeout: Duration::from_millis(parse_env("REQUEST_TIMEOUT", 30_000u64)),
            max_retries: parse_env("MAX_RETRIES", defaults.max_retries),
            max_concurrent_requests: parse_env(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            scrape_delay_min: Duration::from_millis(parse_env("SCRAPE_DELAY_MIN", 2_000u64)),
            scrape_delay_max: Duration::from_millis(parse_env("SCRAPE_DELAY_MAX", 5_000u64)),
            use_browser: parse_bool(env_var("USE_BROWSER")),
            robots_user_agent: env_var("ROBOTS_USER_AGENT").unwrap_or(defaults.robots_user_agent),
            content_max_age_days: parse_env("CONTENT_MAX_AGE_DAYS", defaults.content_max_age_days),
            auto_scrape_enabled: parse_bool(env_var("AUTO_SCRAPE_ENABLED")),
            scrape_cron_schedule: env_var("SCRAPE_CRON_SCHEDULE")
                .unwrap_or(defaults.scrape_cron_schedule),
            proxy,
            log_level: env_var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: env_var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr + Copy>(name: &str, default: T) -> T {
    env_var(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True" | "yes"))
        .unwrap_or(false)
}

fn parse_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_concurrent_requests, 3);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.request_timeout, Duration::from_millis(30_000));
        assert_eq!(settings.content_max_age_days, 90);
        assert_eq!(settings.search_keywords, vec!["webmethods"]);
        assert_eq!(settings.scrape_cron_schedule, "0 */6 * * *");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(Some("true".to_string())));
        assert!(parse_bool(Some("1".to_string())));
        assert!(!parse_bool(Some("0".to_string())));
        assert!(!parse_bool(Some("no".to_string())));
        assert!(!parse_bool(None));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(Some("a, b ,c".to_string())), vec!["a", "b", "c"]);
        assert!(parse_list(Some("  ".to_string())).is_empty());
        assert!(parse_list(None).is_empty());
    }
}
